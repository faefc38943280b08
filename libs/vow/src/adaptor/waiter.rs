// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Blocking wait over several futures at once.
//!
//! A [`WaiterForAny`] registers a ready-notifier on every continuable
//! child; a child that cannot notify gets a blocking waiter task posted to
//! the default executor on its behalf. Notifiers hold only a [`Weak`]
//! reference, so when the waiting call returns (normally or by unwind) the
//! registrations decay into no-ops.

use crate::executor::{Executor, Work, default_executor};
use crate::future::FutureLike;
use crate::loom::{Arc, Condvar, Mutex, Weak, lock};
use std::sync::PoisonError;
#[cfg(not(loom))]
use std::time::{Duration, Instant};

pub(crate) struct WaiterForAny {
    inner: Arc<WaiterInner>,
}

struct WaiterInner {
    winner: Mutex<Option<usize>>,
    ready: Condvar,
}

// === impl WaiterForAny ===

impl WaiterForAny {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(WaiterInner {
                winner: Mutex::new(None),
                ready: Condvar::new(),
            }),
        }
    }

    /// A hook recording `index` as the winner when invoked. Inert once the
    /// waiter is gone.
    pub(crate) fn notifier(&self, index: usize) -> Work {
        let weak: Weak<WaiterInner> = Arc::downgrade(&self.inner);
        Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                let mut winner = lock(&inner.winner);
                if winner.is_none() {
                    *winner = Some(index);
                    inner.ready.notify_all();
                }
            }
        })
    }

    /// Blocks until some notifier fired; returns the winning index.
    pub(crate) fn wait(&self) -> usize {
        let mut winner = lock(&self.inner.winner);
        loop {
            if let Some(index) = *winner {
                return index;
            }
            winner = self
                .inner
                .ready
                .wait(winner)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    #[cfg(not(loom))]
    pub(crate) fn wait_until(&self, deadline: Instant) -> Option<usize> {
        let mut winner = lock(&self.inner.winner);
        loop {
            if let Some(index) = *winner {
                return Some(index);
            }
            let remaining = deadline
                .checked_duration_since(Instant::now())
                .filter(|r| !r.is_zero())?;
            winner = self
                .inner
                .ready
                .wait_timeout(winner, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

fn register<F: FutureLike>(waiter: &WaiterForAny, futures: &[F]) -> Option<usize> {
    for (index, future) in futures.iter().enumerate() {
        let hook = waiter.notifier(index);
        if let Err(hook) = future.on_ready(hook) {
            if future.is_ready() {
                return Some(index);
            }
            // the child cannot notify; park a blocking waiter on its behalf
            let block = future.make_waiter();
            default_executor().execute(Box::new(move || {
                block();
                hook();
            }));
        }
    }
    None
}

/// Blocks until any future in `futures` is ready and returns its index.
///
/// Deferred futures are driven by waiter tasks on the default executor.
///
/// # Panics
///
/// Panics if `futures` is empty.
pub fn wait_for_any<F: FutureLike>(futures: &[F]) -> usize {
    assert!(!futures.is_empty(), "wait_for_any over no futures");

    if let Some(index) = futures.iter().position(FutureLike::is_ready) {
        return index;
    }
    let waiter = WaiterForAny::new();
    if let Some(index) = register(&waiter, futures) {
        return index;
    }
    waiter.wait()
}

/// Bounded [`wait_for_any`]: `None` if nothing completed before `deadline`.
///
/// # Panics
///
/// Panics if `futures` is empty.
#[cfg(not(loom))]
pub fn wait_for_any_until<F: FutureLike>(futures: &[F], deadline: Instant) -> Option<usize> {
    assert!(!futures.is_empty(), "wait_for_any over no futures");

    if let Some(index) = futures.iter().position(FutureLike::is_ready) {
        return Some(index);
    }
    let waiter = WaiterForAny::new();
    if let Some(index) = register(&waiter, futures) {
        return Some(index);
    }
    waiter.wait_until(deadline)
}

/// Bounded [`wait_for_any`] with a relative timeout.
#[cfg(not(loom))]
pub fn wait_for_any_for<F: FutureLike>(futures: &[F], timeout: Duration) -> Option<usize> {
    match Instant::now().checked_add(timeout) {
        Some(deadline) => wait_for_any_until(futures, deadline),
        None => Some(wait_for_any(futures)),
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use crate::executor::ThreadPool;
    use crate::launch::{defer, spawn};
    use crate::promise::Promise;
    use std::time::Duration;

    #[test]
    fn returns_the_ready_index() {
        let pool = ThreadPool::new(2);
        let slow = spawn(&pool, || {
            std::thread::sleep(Duration::from_millis(50));
            1u32
        });
        let fast = spawn(&pool, || 2u32);

        let futures = [slow, fast];
        let index = wait_for_any(&futures);
        assert!(futures[index].is_ready());

        // the slow future must still be joinable
        let [slow, fast] = futures;
        assert_eq!(slow.get().unwrap(), 1);
        assert_eq!(fast.get().unwrap(), 2);
    }

    #[test]
    fn drives_non_continuable_children() {
        let mut promise = Promise::new();
        let futures = [promise.future().unwrap()];

        assert_eq!(wait_for_any_for(&futures, Duration::from_millis(10)), None);

        promise.set(3u32).unwrap();
        assert_eq!(wait_for_any(&futures), 0);
    }

    #[test]
    fn deferred_children_run_on_waiter_tasks() {
        let futures = [defer(|| 5u32)];
        let index = wait_for_any(&futures);
        assert_eq!(index, 0);
        let [f] = futures;
        assert_eq!(f.get().unwrap(), 5);
    }

    #[test]
    fn timeout_expires_without_winners() {
        let mut promise = Promise::<u32>::new();
        let futures = [promise.future().unwrap()];
        assert!(wait_for_any_until(&futures, Instant::now()).is_none());
        promise.set(0).unwrap();
    }
}
