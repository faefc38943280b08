// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::error::Error;
use crate::future::Future;
use crate::loom::Arc;
use crate::options::Options;
use crate::state::{Failure, OpState};
use core::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// A callable bound to an operation state.
///
/// Calling the task runs the callable with the given arguments and
/// completes the state with its result, or with the captured panic. A task
/// can be called at most once per [`reset`](PackagedTask::reset); resetting
/// re-arms it with a fresh state, abandoning (and thereby breaking) the old
/// one if it was never completed.
pub struct PackagedTask<A, T> {
    f: Box<dyn FnMut(A) -> T + Send>,
    state: Option<Arc<OpState<T>>>,
    future_taken: bool,
}

// === impl PackagedTask ===

impl<A, T: Send + 'static> PackagedTask<A, T> {
    pub fn new(f: impl FnMut(A) -> T + Send + 'static) -> Self {
        Self {
            f: Box::new(f),
            state: Some(Arc::new(OpState::eager(Options::empty(), None, None))),
            future_taken: false,
        }
    }

    /// Returns the future paired with the current state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyRetrieved`] if the future for the current
    /// state was already taken, or [`Error::NoState`] after the task ran
    /// without being reset.
    pub fn future(&mut self) -> Result<Future<T>, Error> {
        let Some(state) = &self.state else {
            return Err(Error::NoState);
        };
        if self.future_taken {
            return Err(Error::AlreadyRetrieved);
        }
        self.future_taken = true;
        Ok(Future::from_state(state.clone()))
    }

    /// Runs the callable and completes the state.
    ///
    /// A panic in the callable is captured into the state instead of
    /// unwinding through this call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoState`] when the task already ran and was not
    /// reset.
    pub fn call(&mut self, args: A) -> Result<(), Error> {
        let Some(state) = self.state.take() else {
            return Err(Error::NoState);
        };

        let result = catch_unwind(AssertUnwindSafe(|| (self.f)(args))).map_err(Failure::panicked);
        // the task is this state's only producer
        let completed = state.complete(result).is_ok();
        debug_assert!(completed);
        Ok(())
    }

    /// Re-arms the task with a fresh state.
    ///
    /// If the previous state was never completed, the old future observes a
    /// broken promise.
    pub fn reset(&mut self) {
        if let Some(state) = self.state.take() {
            let _ = state.complete(Err(Failure::BrokenPromise));
        }
        self.state = Some(Arc::new(OpState::eager(Options::empty(), None, None)));
        self.future_taken = false;
    }
}

impl<A, T> Drop for PackagedTask<A, T> {
    fn drop(&mut self) {
        // an armed task that never ran leaves a broken promise behind
        if let Some(state) = self.state.take() {
            let _ = state.complete(Err(Failure::BrokenPromise));
        }
    }
}

impl<A, T> fmt::Debug for PackagedTask<A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackagedTask")
            .field("armed", &self.state.is_some())
            .field("future_taken", &self.future_taken)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::loom;

    #[test]
    fn call_completes_the_future() {
        loom::model(|| {
            let mut task = PackagedTask::new(|(a, b): (u32, u32)| a + b);
            let future = task.future().unwrap();

            task.call((2, 3)).unwrap();
            assert_eq!(future.get().unwrap(), 5);
        });
    }

    #[test]
    fn call_twice_reports_no_state() {
        loom::model(|| {
            let mut task = PackagedTask::new(|x: u32| x);
            task.call(1).unwrap();
            assert_eq!(task.call(2).unwrap_err().kind(), ErrorKind::NoState);
        });
    }

    #[test]
    fn panic_is_captured() {
        loom::model(|| {
            let mut task = PackagedTask::new(|(): ()| -> u32 { panic!("exploded") });
            let future = task.future().unwrap();

            task.call(()).unwrap();
            let err = future.get().unwrap_err();
            assert!(err.is_panic());
        });
    }

    #[test]
    fn reset_rearms_and_breaks_the_old_state() {
        loom::model(|| {
            let mut task = PackagedTask::new(|x: u32| x * 2);
            let old = task.future().unwrap();

            task.reset();
            assert_eq!(old.get().unwrap_err().kind(), ErrorKind::BrokenPromise);

            let fresh = task.future().unwrap();
            task.call(4).unwrap();
            assert_eq!(fresh.get().unwrap(), 8);
        });
    }

    #[test]
    fn dropping_an_armed_task_breaks_the_promise() {
        loom::model(|| {
            let mut task = PackagedTask::new(|x: u32| x);
            let future = task.future().unwrap();
            drop(task);

            assert_eq!(future.get().unwrap_err().kind(), ErrorKind::BrokenPromise);
        });
    }

    #[test]
    fn future_taken_once_per_reset() {
        loom::model(|| {
            let mut task = PackagedTask::new(|x: u32| x);
            let _future = task.future().unwrap();
            assert_eq!(task.future().unwrap_err().kind(), ErrorKind::AlreadyRetrieved);

            task.reset();
            assert!(task.future().is_ok());
        });
    }
}
