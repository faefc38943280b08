// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Adaptors that build new futures from existing ones: continuations
//! ([`Future::then`](crate::Future::then) and friends), conjunctions
//! ([`when_all`]), disjunctions ([`when_any`]), and the blocking
//! [`wait_for_any`] multiplexer.

mod then;
mod waiter;
mod when_all;
mod when_any;

pub use waiter::wait_for_any;
#[cfg(not(loom))]
pub use waiter::{wait_for_any_for, wait_for_any_until};
pub use when_all::{
    ElemMarker, ErasedChild, FnMarker, FutureMarker, FutureSequence, IntoFutureElem,
    IntoFutureSeq, SeqMarker, WhenAll, when_all,
};
pub use when_any::{WhenAny, WhenAnyResult, when_any};
