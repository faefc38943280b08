// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The executor capability consumed by the runtime, and the two bundled
//! implementations.
//!
//! The core only requires [`Executor::execute`]; everything else about how
//! work items are scheduled (threads, queues, stealing) is the executor's
//! business.

mod inline;
mod pool;

use crate::loom::Arc;
use std::num::NonZeroUsize;
use std::sync::OnceLock;

pub use inline::InlineExecutor;
pub use pool::ThreadPool;

/// A unit of work: a move-only, run-once callable.
pub type Work = Box<dyn FnOnce() + Send + 'static>;

/// Capability to run work items.
///
/// Implementations may run the item synchronously on the calling thread
/// (see [`InlineExecutor`]) or hand it to other threads. The item is moved,
/// never copied, and runs exactly once.
pub trait Executor: Send + Sync {
    /// Enqueue or run `work`.
    fn execute(&self, work: Work);

    /// How many work items this executor can usefully run in parallel.
    ///
    /// Used as a hint by the parallel-algorithm partitioners.
    fn concurrency_hint(&self) -> usize {
        hardware_concurrency()
    }

    /// Whether `execute` runs the work item on the calling thread.
    ///
    /// Parallel algorithms collapse to their serial implementation when this
    /// returns `true`, since forking would gain nothing.
    fn runs_inline(&self) -> bool {
        false
    }
}

impl Executor for Arc<dyn Executor> {
    fn execute(&self, work: Work) {
        (**self).execute(work);
    }

    fn concurrency_hint(&self) -> usize {
        (**self).concurrency_hint()
    }

    fn runs_inline(&self) -> bool {
        (**self).runs_inline()
    }
}

/// Number of hardware threads, at least 1.
pub fn hardware_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// The process-wide default [`ThreadPool`].
///
/// Created on first use with one worker per hardware thread. Used by the
/// launch and adaptor entry points that take no explicit executor.
pub fn default_executor() -> &'static ThreadPool {
    static DEFAULT: OnceLock<ThreadPool> = OnceLock::new();
    DEFAULT.get_or_init(|| ThreadPool::with_name(hardware_concurrency(), "vow-default"))
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn default_executor_is_shared() {
        let a = default_executor();
        let b = default_executor();
        assert_eq!(a.worker_count(), b.worker_count());
        assert!(a.concurrency_hint() >= 1);
    }
}
