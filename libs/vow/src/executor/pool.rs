// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use super::{Executor, Work};
use crate::loom::atomic::{AtomicBool, Ordering};
use crate::loom::{Arc, Condvar, Mutex, lock};
use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::PoisonError;
use std::thread::JoinHandle;

/// A fixed-size worker pool over a shared injector queue.
///
/// Handles are cheap to clone and all refer to the same pool. When the last
/// handle is dropped the workers finish the queued work and exit; the drop
/// blocks until they have joined.
#[derive(Clone)]
pub struct ThreadPool {
    shared: Arc<Shared>,
    // kept only for its drop; workers never hold it, so the last user
    // handle going away is what shuts the pool down
    _guard: Arc<ShutdownGuard>,
}

struct Shared {
    queue: Mutex<VecDeque<Work>>,
    available: Condvar,
    shutdown: AtomicBool,
    size: usize,
}

struct ShutdownGuard {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

// === impl ThreadPool ===

impl ThreadPool {
    /// Creates a pool with `size` workers (at least one).
    pub fn new(size: usize) -> Self {
        Self::with_name(size, "vow-worker")
    }

    /// Creates a pool whose worker threads are named `{name}-{index}`.
    ///
    /// # Panics
    ///
    /// Panics if the operating system refuses to spawn a worker thread.
    pub fn with_name(size: usize, name: &str) -> Self {
        let size = size.max(1);
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            shutdown: AtomicBool::new(false),
            size,
        });

        let workers = (0..size)
            .map(|id| {
                let shared = shared.clone();
                std::thread::Builder::new()
                    .name(format!("{name}-{id}"))
                    .spawn(move || worker(&shared, id))
                    .expect("failed to spawn pool worker")
            })
            .collect();

        Self {
            _guard: Arc::new(ShutdownGuard {
                shared: shared.clone(),
                workers: Mutex::new(workers),
            }),
            shared,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.shared.size
    }

    /// Number of work items currently queued (not yet picked up).
    pub fn queued(&self) -> usize {
        lock(&self.shared.queue).len()
    }
}

impl Executor for ThreadPool {
    fn execute(&self, work: Work) {
        lock(&self.shared.queue).push_back(work);
        self.shared.available.notify_one();
    }

    fn concurrency_hint(&self) -> usize {
        self.shared.size
    }
}

impl core::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("workers", &self.shared.size)
            .field("queued", &self.queued())
            .finish()
    }
}

// === impl ShutdownGuard ===

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.available.notify_all();

        for handle in lock(&self.workers).drain(..) {
            // a worker that panicked already logged it; nothing to salvage
            let _ = handle.join();
        }
    }
}

fn worker(shared: &Shared, id: usize) {
    let _span = tracing::debug_span!("pool worker", worker = id).entered();

    loop {
        let work = {
            let mut queue = lock(&shared.queue);
            loop {
                if let Some(work) = queue.pop_front() {
                    break Some(work);
                }
                if shared.shutdown.load(Ordering::Acquire) {
                    break None;
                }
                queue = shared
                    .available
                    .wait(queue)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        };

        let Some(work) = work else { break };

        if catch_unwind(AssertUnwindSafe(work)).is_err() {
            tracing::warn!(worker = id, "work item panicked");
        }
    }

    tracing::trace!(worker = id, "worker exiting");
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use crate::loom::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn runs_submitted_work() {
        let _trace = crate::test_util::trace_init();

        let pool = ThreadPool::new(2);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..64 {
            let counter = counter.clone();
            pool.execute(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }

        // dropping the last handle drains the queue before joining
        drop(pool);
        assert_eq!(counter.load(Ordering::SeqCst), 64);
    }

    #[test]
    fn survives_panicking_work() {
        let pool = ThreadPool::new(1);
        let counter = Arc::new(AtomicUsize::new(0));

        pool.execute(Box::new(|| panic!("boom")));
        let handle = counter.clone();
        pool.execute(Box::new(move || {
            handle.fetch_add(1, Ordering::SeqCst);
        }));

        drop(pool);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clones_share_the_pool() {
        let pool = ThreadPool::new(1);
        let other = pool.clone();
        assert_eq!(pool.worker_count(), other.worker_count());

        let counter = Arc::new(AtomicUsize::new(0));
        let handle = counter.clone();
        other.execute(Box::new(move || {
            handle.fetch_add(1, Ordering::SeqCst);
        }));
        drop(other);

        // the pool is still alive through the first handle
        while counter.load(Ordering::SeqCst) == 0 {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(pool.worker_count(), 1);
    }
}
