// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::executor::Work;
use crate::loom::atomic::{AtomicBool, Ordering};
use crate::loom::{Mutex, lock};
use smallvec::SmallVec;

/// Ordered list of run-after-ready callbacks attached to an operation state.
///
/// Appends are accepted until the state completes and the list is drained
/// once, in FIFO order, on the completing thread. An append that loses the
/// race gets its callback handed back and must dispatch it through the
/// state's executor instead.
pub(crate) struct ContinuationList {
    /// Flipped under the queue lock, so a pusher that observes `true` while
    /// holding the lock knows the drain has already completed.
    run_requested: AtomicBool,
    queue: Mutex<SmallVec<[Work; 4]>>,
}

// === impl ContinuationList ===

impl ContinuationList {
    pub(crate) fn new() -> Self {
        Self {
            run_requested: AtomicBool::new(false),
            queue: Mutex::new(SmallVec::new()),
        }
    }

    pub(crate) fn is_run_requested(&self) -> bool {
        self.run_requested.load(Ordering::Acquire)
    }

    /// Appends a callback, or hands it back if the drain already ran.
    pub(crate) fn push(&self, work: Work) -> Result<(), Work> {
        let mut queue = lock(&self.queue);
        if self.run_requested.load(Ordering::Acquire) {
            return Err(work);
        }
        queue.push(work);
        Ok(())
    }

    /// Drains the list in FIFO order.
    ///
    /// The lock is held across the callback invocations; a concurrent
    /// [`push`](Self::push) blocks until the drain completes and is then
    /// rejected. Callback bodies must not touch this list again (they post
    /// to an executor).
    pub(crate) fn request_run(&self) -> bool {
        let mut queue = lock(&self.queue);
        if self.run_requested.swap(true, Ordering::AcqRel) {
            return false;
        }
        for work in queue.drain(..) {
            work();
        }
        true
    }
}

impl core::fmt::Debug for ContinuationList {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ContinuationList")
            .field("run_requested", &self.is_run_requested())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loom;
    use crate::loom::Arc;
    use crate::loom::atomic::AtomicUsize;

    #[test]
    fn drains_in_fifo_order() {
        loom::model(|| {
            let list = ContinuationList::new();
            let order = Arc::new(Mutex::new(Vec::new()));

            for i in 0..3 {
                let order = order.clone();
                assert!(list.push(Box::new(move || lock(&order).push(i))).is_ok());
            }

            assert!(list.request_run());
            assert_eq!(*lock(&order), vec![0, 1, 2]);
        });
    }

    #[test]
    fn second_drain_is_noop() {
        loom::model(|| {
            let list = ContinuationList::new();
            let fired = Arc::new(AtomicUsize::new(0));
            let handle = fired.clone();
            let pushed = list.push(Box::new(move || {
                handle.fetch_add(1, Ordering::SeqCst);
            }));
            assert!(pushed.is_ok());

            assert!(list.request_run());
            assert!(!list.request_run());
            assert_eq!(fired.load(Ordering::SeqCst), 1);
        });
    }

    #[test]
    fn push_after_drain_is_rejected() {
        loom::model(|| {
            let list = ContinuationList::new();
            list.request_run();
            assert!(list.push(Box::new(|| {})).is_err());
        });
    }

    #[test]
    fn concurrent_push_runs_exactly_once() {
        loom::model(|| {
            let list = Arc::new(ContinuationList::new());
            let fired = Arc::new(AtomicUsize::new(0));

            let pusher = {
                let list = list.clone();
                let fired = fired.clone();
                loom::thread::spawn(move || {
                    let callback = {
                        let fired = fired.clone();
                        Box::new(move || {
                            fired.fetch_add(1, Ordering::SeqCst);
                        })
                    };
                    if let Err(callback) = list.push(callback) {
                        // the drain has completed; dispatch on this thread,
                        // standing in for the state's executor
                        callback();
                    }
                })
            };

            list.request_run();
            pusher.join().unwrap();

            assert_eq!(fired.load(Ordering::SeqCst), 1);
        });
    }
}
