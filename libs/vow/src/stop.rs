// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Cooperative cancellation.
//!
//! A [`StopSource`] owns a monotonic stop flag and a list of registered
//! callbacks; [`StopToken`]s are read-only views of the same state. A stop
//! request transitions the flag `false → true` exactly once, runs every
//! registered callback on the requesting thread, and only then becomes
//! observable through [`StopToken::stop_requested`] on other threads.

use crate::loom::atomic::{AtomicBool, AtomicU64, Ordering};
use crate::loom::{Arc, Mutex, lock};
use core::fmt;

/// Callback invoked when stop is requested.
type Callback = Box<dyn FnOnce() + Send>;

struct StopInner {
    /// Observable flag. Stored *after* callbacks have run.
    requested: AtomicBool,
    callbacks: Mutex<CallbackState>,
    next_id: AtomicU64,
}

enum CallbackState {
    /// Stop has not been requested; registrations queue here.
    Armed(Vec<(u64, Callback)>),
    /// Stop was requested; later registrations fire immediately.
    Stopped,
}

/// Owning side of a cooperative stop signal.
///
/// Cloning a source yields another handle to the *same* stop state; a stop
/// request through any clone is visible through all of them.
#[derive(Clone)]
pub struct StopSource {
    inner: Arc<StopInner>,
}

/// Read-only view of a [`StopSource`]'s stop state.
#[derive(Clone)]
pub struct StopToken {
    inner: Arc<StopInner>,
}

/// Registration of a stop callback, deregistered on drop.
///
/// Returned by [`StopToken::on_stop`]. If the callback has not run by the
/// time this guard is dropped, it never will.
#[must_use = "dropping the guard deregisters the callback"]
pub struct StopCallback {
    inner: Arc<StopInner>,
    id: u64,
}

// === impl StopSource ===

impl StopSource {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StopInner {
                requested: AtomicBool::new(false),
                callbacks: Mutex::new(CallbackState::Armed(Vec::new())),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Returns a token observing this source.
    pub fn token(&self) -> StopToken {
        StopToken {
            inner: self.inner.clone(),
        }
    }

    /// Requests stop, running all registered callbacks on this thread.
    ///
    /// Returns `true` if this call caused the transition, `false` if stop
    /// was already requested.
    pub fn request_stop(&self) -> bool {
        let callbacks = {
            let mut state = lock(&self.inner.callbacks);
            match core::mem::replace(&mut *state, CallbackState::Stopped) {
                CallbackState::Armed(callbacks) => callbacks,
                CallbackState::Stopped => return false,
            }
        };

        // Callbacks run outside the lock so they may register against other
        // tokens of the same source without deadlocking.
        for (_, callback) in callbacks {
            callback();
        }

        self.inner.requested.store(true, Ordering::Release);
        tracing::trace!("stop requested");
        true
    }

    pub fn stop_requested(&self) -> bool {
        self.inner.requested.load(Ordering::Acquire)
    }

    pub(crate) fn same_state(&self, other: &StopSource) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for StopSource {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StopSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopSource")
            .field("stop_requested", &self.stop_requested())
            .finish()
    }
}

// === impl StopToken ===

impl StopToken {
    pub fn stop_requested(&self) -> bool {
        self.inner.requested.load(Ordering::Acquire)
    }

    /// Registers `callback` to run when stop is requested.
    ///
    /// If stop was already requested the callback runs immediately on the
    /// calling thread and the returned guard is inert.
    pub fn on_stop(&self, callback: impl FnOnce() + Send + 'static) -> StopCallback {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        let run_now = {
            let mut state = lock(&self.inner.callbacks);
            match &mut *state {
                CallbackState::Armed(callbacks) => {
                    callbacks.push((id, Box::new(callback)));
                    None
                }
                CallbackState::Stopped => Some(callback),
            }
        };
        if let Some(callback) = run_now {
            callback();
        }

        StopCallback {
            inner: self.inner.clone(),
            id,
        }
    }
}

impl fmt::Debug for StopToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopToken")
            .field("stop_requested", &self.stop_requested())
            .finish()
    }
}

// === impl StopCallback ===

impl Drop for StopCallback {
    fn drop(&mut self) {
        let mut state = lock(&self.inner.callbacks);
        if let CallbackState::Armed(callbacks) = &mut *state {
            callbacks.retain(|(id, _)| *id != self.id);
        }
    }
}

impl fmt::Debug for StopCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopCallback").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loom;
    use crate::loom::atomic::{AtomicUsize, Ordering};

    #[test]
    fn request_is_monotonic() {
        loom::model(|| {
            let source = StopSource::new();
            assert!(!source.stop_requested());
            assert!(source.request_stop());
            assert!(!source.request_stop());
            assert!(source.stop_requested());
            assert!(source.token().stop_requested());
        });
    }

    #[test]
    fn callbacks_run_exactly_once() {
        loom::model(|| {
            let source = StopSource::new();
            let fired = Arc::new(AtomicUsize::new(0));

            let token = source.token();
            let guard = token.on_stop({
                let fired = fired.clone();
                move || {
                    fired.fetch_add(1, Ordering::SeqCst);
                }
            });

            let other = source.clone();
            let handle = loom::thread::spawn(move || other.request_stop());
            let won = source.request_stop();
            let other_won = handle.join().unwrap();

            // exactly one caller wins the transition
            assert!(won ^ other_won);
            assert_eq!(fired.load(Ordering::SeqCst), 1);
            drop(guard);
        });
    }

    #[test]
    fn late_registration_fires_inline() {
        loom::model(|| {
            let source = StopSource::new();
            source.request_stop();

            let fired = Arc::new(AtomicUsize::new(0));
            let _guard = source.token().on_stop({
                let fired = fired.clone();
                move || {
                    fired.fetch_add(1, Ordering::SeqCst);
                }
            });
            assert_eq!(fired.load(Ordering::SeqCst), 1);
        });
    }

    #[test]
    fn dropped_guard_deregisters() {
        loom::model(|| {
            let source = StopSource::new();
            let fired = Arc::new(AtomicUsize::new(0));

            let guard = source.token().on_stop({
                let fired = fired.clone();
                move || {
                    fired.fetch_add(1, Ordering::SeqCst);
                }
            });
            drop(guard);

            source.request_stop();
            assert_eq!(fired.load(Ordering::SeqCst), 0);
        });
    }
}
