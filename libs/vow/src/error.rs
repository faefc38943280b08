// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::any::Any;
use core::fmt;

/// The payload of a panic captured from a user task.
pub type Payload = Box<dyn Any + Send + 'static>;

/// Outcome of a bounded wait on a future.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Status {
    /// The future completed within the wait.
    Ready,
    /// The wait elapsed before the future completed.
    Timeout,
    /// The future is deferred; its task has not been started and a bounded
    /// wait will not start it.
    Deferred,
}

/// Discriminant of an [`Error`], for comparisons.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    BrokenPromise,
    AlreadySatisfied,
    AlreadyRetrieved,
    NoState,
    Deferred,
    Panicked,
}

/// Errors reported by future and promise operations.
///
/// Interface misuse (everything except [`Error::Panicked`]) is reported
/// synchronously at the offending call. A panic thrown by a user task is
/// captured where the task ran and resurfaces from `get`.
#[derive(Debug)]
pub enum Error {
    /// The producer handle was destroyed without completing the state.
    BrokenPromise,
    /// The state was already completed once.
    AlreadySatisfied,
    /// The future handle for this producer was already retrieved.
    AlreadyRetrieved,
    /// The handle has no shared state (already consumed or reset).
    NoState,
    /// The operation is not valid on a deferred state.
    Deferred,
    /// The user task panicked. The payload is `None` when another holder of
    /// a shared state already claimed it.
    Panicked(Option<Payload>),
}

// === impl Error ===

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::BrokenPromise => ErrorKind::BrokenPromise,
            Error::AlreadySatisfied => ErrorKind::AlreadySatisfied,
            Error::AlreadyRetrieved => ErrorKind::AlreadyRetrieved,
            Error::NoState => ErrorKind::NoState,
            Error::Deferred => ErrorKind::Deferred,
            Error::Panicked(_) => ErrorKind::Panicked,
        }
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, Error::Panicked(_))
    }

    /// Recover the panic payload, so it can be resumed with
    /// [`std::panic::resume_unwind`].
    ///
    /// # Errors
    ///
    /// Returns `self` back when this error is not a panic, or when the
    /// payload was already claimed through another shared handle.
    pub fn try_into_panic(self) -> Result<Payload, Error> {
        match self {
            Error::Panicked(Some(payload)) => Ok(payload),
            other => Err(other),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BrokenPromise => f.write_str("broken promise"),
            Error::AlreadySatisfied => f.write_str("promise already satisfied"),
            Error::AlreadyRetrieved => f.write_str("future already retrieved"),
            Error::NoState => f.write_str("no associated state"),
            Error::Deferred => f.write_str("operation invalid on a deferred future"),
            Error::Panicked(_) => f.write_str("task panicked"),
        }
    }
}

impl core::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_match_variants() {
        assert_eq!(Error::BrokenPromise.kind(), ErrorKind::BrokenPromise);
        assert_eq!(Error::Panicked(None).kind(), ErrorKind::Panicked);
        assert!(Error::Panicked(None).is_panic());
        assert!(!Error::NoState.is_panic());
    }

    #[test]
    fn panic_payload_roundtrip() {
        let err = Error::Panicked(Some(Box::new("boom")));
        let payload = err.try_into_panic().unwrap();
        assert_eq!(*payload.downcast::<&str>().unwrap(), "boom");

        let err = Error::NoState;
        assert_eq!(err.try_into_panic().unwrap_err().kind(), ErrorKind::NoState);
    }
}
