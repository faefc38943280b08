// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::error::{Error, Payload};
use crate::future::Future;
use crate::loom::Arc;
use crate::options::Options;
use crate::state::{Failure, OpState};
use core::fmt;

/// Write-side handle to an operation state.
///
/// A promise is completed at most once, through [`set`](Promise::set) or
/// [`set_error`](Promise::set_error). Dropping an incomplete promise breaks
/// it: the paired [`Future`] observes [`Error::BrokenPromise`].
///
/// `Promise<()>` doubles as a one-shot event: `set(())` releases every
/// thread blocked in the future's `wait`.
pub struct Promise<T> {
    state: Arc<OpState<T>>,
    future_taken: bool,
    completed: bool,
}

// === impl Promise ===

impl<T: Send + 'static> Promise<T> {
    pub fn new() -> Self {
        Self {
            // promise-backed states have no task and no executor; `then` on
            // their futures falls back to the polling strategy
            state: Arc::new(OpState::eager(Options::empty(), None, None)),
            future_taken: false,
            completed: false,
        }
    }

    /// Returns the read-side handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyRetrieved`] on the second and later calls.
    pub fn future(&mut self) -> Result<Future<T>, Error> {
        if self.future_taken {
            return Err(Error::AlreadyRetrieved);
        }
        self.future_taken = true;
        Ok(Future::from_state(self.state.clone()))
    }

    /// Completes the state with `value`.
    ///
    /// # Errors
    ///
    /// Hands `value` back if the promise was already satisfied.
    #[allow(clippy::missing_panics_doc, reason = "internal assertion")]
    pub fn set(&mut self, value: T) -> Result<(), T> {
        match self.state.complete(Ok(value)) {
            Ok(()) => {
                self.completed = true;
                Ok(())
            }
            Err(Ok(value)) => Err(value),
            // the state rejected us, so it cannot have given back our error
            Err(Err(_)) => unreachable!(),
        }
    }

    /// Completes the state with an error payload, rethrown at `get`.
    ///
    /// # Errors
    ///
    /// Hands `payload` back if the promise was already satisfied.
    #[allow(clippy::missing_panics_doc, reason = "internal assertion")]
    pub fn set_error(&mut self, payload: Payload) -> Result<(), Payload> {
        match self.state.complete(Err(Failure::panicked(payload))) {
            Ok(()) => {
                self.completed = true;
                Ok(())
            }
            Err(Err(Failure::Panicked(Some(payload)))) => Err(payload),
            Err(_) => unreachable!(),
        }
    }

    /// Whether this promise has already been completed.
    pub fn is_satisfied(&self) -> bool {
        self.completed
    }
}

impl<T: Send + 'static> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        if !self.completed {
            // the consumer may already be gone; nothing to report then
            let _ = self.state.complete(Err(Failure::BrokenPromise));
        }
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("future_taken", &self.future_taken)
            .field("completed", &self.completed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::loom;

    #[test]
    fn set_and_get() {
        loom::model(|| {
            let mut promise = Promise::new();
            let future = promise.future().unwrap();

            let handle = loom::thread::spawn(move || {
                promise.set(42).unwrap();
            });

            assert_eq!(future.get().unwrap(), 42);
            handle.join().unwrap();
        });
    }

    #[test]
    fn future_retrieved_once() {
        loom::model(|| {
            let mut promise = Promise::<u32>::new();
            let _future = promise.future().unwrap();
            assert_eq!(
                promise.future().unwrap_err().kind(),
                ErrorKind::AlreadyRetrieved
            );
        });
    }

    #[test]
    fn double_set_hands_value_back() {
        loom::model(|| {
            let mut promise = Promise::new();
            promise.set(1).unwrap();
            assert_eq!(promise.set(2).unwrap_err(), 2);
            assert!(promise.is_satisfied());
        });
    }

    #[test]
    fn dropping_breaks_the_promise() {
        loom::model(|| {
            let mut promise = Promise::<u32>::new();
            let future = promise.future().unwrap();
            drop(promise);

            assert!(future.is_ready());
            assert_eq!(future.get().unwrap_err().kind(), ErrorKind::BrokenPromise);
        });
    }

    #[test]
    fn error_payload_rethrows_at_get() {
        loom::model(|| {
            let mut promise = Promise::<u32>::new();
            let future = promise.future().unwrap();
            promise.set_error(Box::new("nope")).unwrap();

            let err = future.get().unwrap_err();
            assert!(err.is_panic());
            let payload = err.try_into_panic().unwrap();
            assert_eq!(*payload.downcast::<&str>().unwrap(), "nope");
        });
    }

    #[test]
    fn event_promise_releases_waiters() {
        loom::model(|| {
            let mut promise = Promise::<()>::new();
            let future = promise.future().unwrap();

            let handle = loom::thread::spawn(move || {
                future.wait();
            });

            promise.set(()).unwrap();
            handle.join().unwrap();
        });
    }
}
