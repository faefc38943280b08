// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A blocking future/promise runtime: continuations, cooperative
//! cancellation, composition, and parallel algorithms, over pluggable
//! executors.
//!
//! A [`Future`] is the read side of an operation state; the write side is a
//! task launched with [`spawn`] / [`defer`], a [`Promise`], or a
//! [`PackagedTask`]. Futures compose through continuations
//! ([`Future::then`]), conjunctions ([`when_all`], the `&` operator),
//! disjunctions ([`when_any`], the `|` operator), and cancel cooperatively
//! through [`StopToken`]s. The [`algorithm`] module builds fork-join
//! parallel algorithms on top.
//!
//! The only capability required of an executor is
//! [`execute`](executor::Executor::execute); the bundled
//! [`ThreadPool`](executor::ThreadPool) and
//! [`InlineExecutor`](executor::InlineExecutor) cover the common cases.
//!
//! ```
//! use vow::{executor::ThreadPool, spawn, when_all};
//!
//! let pool = ThreadPool::new(2);
//!
//! let answer = spawn(&pool, || 6 * 7).then(|x| x.to_string());
//! assert_eq!(answer.get().unwrap(), "42");
//!
//! let all = when_all((spawn(&pool, || 1), spawn(&pool, || 2)));
//! let (a, b) = all.get().unwrap();
//! assert_eq!(a.get().unwrap() + b.get().unwrap(), 3);
//! ```

pub mod adaptor;
pub mod algorithm;
mod continuations;
mod error;
pub mod executor;
mod future;
mod launch;
pub(crate) mod loom;
mod options;
mod promise;
mod state;
pub mod stop;
mod task;
#[cfg(all(test, not(loom)))]
mod test_util;

pub use adaptor::{WhenAll, WhenAny, WhenAnyResult, wait_for_any, when_all, when_any};
#[cfg(not(loom))]
pub use adaptor::{wait_for_any_for, wait_for_any_until};
pub use error::{Error, ErrorKind, Payload, Status};
pub use future::{Future, FutureLike, SharedFuture, is_ready, wait_for_all};
#[cfg(not(loom))]
pub use future::{wait_for_all_for, wait_for_all_until};
pub use launch::{Launch, defer, spawn, spawn_stoppable};
pub use promise::Promise;
pub use stop::{StopCallback, StopSource, StopToken};
pub use task::PackagedTask;
