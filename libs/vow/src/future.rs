// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Read-side handles.
//!
//! [`Future`] is the unique handle: `get` moves the result out exactly
//! once. [`SharedFuture`] is its cloneable sibling: `get` copies the result
//! any number of times, through any number of handles.

#[cfg(not(loom))]
use crate::error::Status;
use crate::error::Error;
use crate::executor::Work;
use crate::loom::Arc;
use crate::options::Options;
use crate::state::{Failure, OpState};
use crate::stop::StopToken;
use core::fmt;
#[cfg(not(loom))]
use std::time::{Duration, Instant};

/// Common read-side surface of every future type in this crate, including
/// the [`WhenAll`](crate::adaptor::WhenAll) / [`WhenAny`](crate::adaptor::WhenAny)
/// composites.
pub trait FutureLike {
    type Output;

    /// Non-blocking readiness probe.
    fn is_ready(&self) -> bool;

    /// Blocks until ready. Drives a deferred task inline on first call.
    fn wait(&self);

    /// Bounded wait until `deadline`. Never starts a deferred task.
    #[cfg(not(loom))]
    fn wait_until(&self, deadline: Instant) -> Status;

    /// Bounded wait for `timeout`. Never starts a deferred task.
    #[cfg(not(loom))]
    fn wait_for(&self, timeout: Duration) -> Status;

    /// Waits, then consumes the handle and returns the result.
    ///
    /// # Errors
    ///
    /// Reports a broken promise, or a panic captured from the producing
    /// task.
    fn get(self) -> Result<Self::Output, Error>
    where
        Self: Sized;

    /// Attach a run-on-ready callback, or get it handed back when the
    /// future is already ready or does not support continuations.
    ///
    /// Implementation detail of the combinators.
    #[doc(hidden)]
    fn on_ready(&self, hook: Work) -> Result<(), Work>;

    /// A callable that blocks until this future is ready, independent of
    /// the handle's lifetime.
    ///
    /// Implementation detail of the combinators.
    #[doc(hidden)]
    fn make_waiter(&self) -> Work;
}

/// Blocks until every future in `futures` is ready.
pub fn wait_for_all<'a, F, I>(futures: I)
where
    F: FutureLike + 'a,
    I: IntoIterator<Item = &'a F>,
{
    for future in futures {
        future.wait();
    }
}

/// Bounded [`wait_for_all`]: `Ready` only if every future completed before
/// `deadline`.
#[cfg(not(loom))]
pub fn wait_for_all_until<'a, F, I>(futures: I, deadline: Instant) -> Status
where
    F: FutureLike + 'a,
    I: IntoIterator<Item = &'a F>,
{
    for future in futures {
        match future.wait_until(deadline) {
            Status::Ready => {}
            other => return other,
        }
    }
    Status::Ready
}

/// Bounded [`wait_for_all`] with a relative timeout.
#[cfg(not(loom))]
pub fn wait_for_all_for<'a, F, I>(futures: I, timeout: Duration) -> Status
where
    F: FutureLike + 'a,
    I: IntoIterator<Item = &'a F>,
{
    match Instant::now().checked_add(timeout) {
        Some(deadline) => wait_for_all_until(futures, deadline),
        None => {
            wait_for_all(futures);
            Status::Ready
        }
    }
}

/// Non-blocking readiness probe, as a free function.
pub fn is_ready<F: FutureLike>(future: &F) -> bool {
    future.is_ready()
}

/// Unique read-side handle to an operation state.
pub struct Future<T> {
    // `None` only after the handle was consumed by `get`, `share`,
    // `detach`, or an adaptor
    state: Option<Arc<OpState<T>>>,
}

// === impl Future ===

impl<T> Future<T> {
    pub(crate) fn from_state(state: Arc<OpState<T>>) -> Self {
        Self { state: Some(state) }
    }

    pub(crate) fn state(&self) -> &Arc<OpState<T>> {
        // `None` is unobservable: every consuming method takes `self`
        self.state.as_ref().unwrap()
    }

    /// Consumes the handle without running the join-on-drop protocol.
    pub(crate) fn take_state(mut self) -> Arc<OpState<T>> {
        self.state.take().unwrap()
    }

    pub fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    /// Blocks until the result is available.
    ///
    /// On a deferred future this runs the captured task inline, driving its
    /// antecedents first.
    pub fn wait(&self) {
        self.state().wait();
    }

    #[cfg(not(loom))]
    pub fn wait_until(&self, deadline: Instant) -> Status {
        self.state().wait_until(deadline)
    }

    #[cfg(not(loom))]
    pub fn wait_for(&self, timeout: Duration) -> Status {
        self.state().wait_for(timeout)
    }

    /// Waits, then moves the result out.
    ///
    /// # Errors
    ///
    /// Reports a broken promise, or a panic captured from the task.
    pub fn get(self) -> Result<T, Error> {
        self.take_state().take()
    }

    /// Converts this handle into a [`SharedFuture`].
    pub fn share(self) -> SharedFuture<T> {
        SharedFuture {
            state: self.take_state(),
        }
    }

    /// Surrenders interest in the result without waiting.
    ///
    /// The task keeps running; its result is dropped by the producer side.
    /// Unlike a plain drop, detaching a stoppable future neither requests
    /// stop nor joins.
    pub fn detach(self) {
        let _ = self.take_state();
    }

    /// Requests stop on a stoppable future. Returns `false` when the future
    /// is not stoppable or stop was already requested.
    pub fn request_stop(&self) -> bool {
        self.state().request_stop()
    }

    /// The stop token observed by the task, if this future is stoppable.
    pub fn stop_token(&self) -> Option<StopToken> {
        self.state().stop_source().map(crate::stop::StopSource::token)
    }
}

impl<T> Drop for Future<T> {
    fn drop(&mut self) {
        let Some(state) = self.state.take() else {
            return;
        };
        // dropping an eager stoppable future that has not completed
        // requests stop, then joins; a deferred task never started, so
        // there is nothing to join
        let options = state.options();
        if options.contains(Options::STOPPABLE)
            && !options.contains(Options::DEFERRED)
            && !state.is_ready()
        {
            state.request_stop();
            state.wait();
        }
    }
}

impl<T: Send + 'static> FutureLike for Future<T> {
    type Output = T;

    fn is_ready(&self) -> bool {
        Future::is_ready(self)
    }

    fn wait(&self) {
        Future::wait(self);
    }

    #[cfg(not(loom))]
    fn wait_until(&self, deadline: Instant) -> Status {
        Future::wait_until(self, deadline)
    }

    #[cfg(not(loom))]
    fn wait_for(&self, timeout: Duration) -> Status {
        Future::wait_for(self, timeout)
    }

    fn get(self) -> Result<T, Error> {
        Future::get(self)
    }

    fn on_ready(&self, hook: Work) -> Result<(), Work> {
        self.state().attach_continuation(hook)
    }

    fn make_waiter(&self) -> Work {
        let state = self.state().clone();
        Box::new(move || state.wait())
    }
}

impl<T> fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            Some(state) => f.debug_tuple("Future").field(state).finish(),
            None => f.write_str("Future(<consumed>)"),
        }
    }
}

/// Shared read-side handle; clones observe the same state.
pub struct SharedFuture<T> {
    state: Arc<OpState<T>>,
}

// === impl SharedFuture ===

impl<T> SharedFuture<T> {
    pub(crate) fn state(&self) -> &Arc<OpState<T>> {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    pub fn wait(&self) {
        self.state.wait();
    }

    #[cfg(not(loom))]
    pub fn wait_until(&self, deadline: Instant) -> Status {
        self.state.wait_until(deadline)
    }

    #[cfg(not(loom))]
    pub fn wait_for(&self, timeout: Duration) -> Status {
        self.state.wait_for(timeout)
    }

    pub fn request_stop(&self) -> bool {
        self.state.request_stop()
    }

    pub fn stop_token(&self) -> Option<StopToken> {
        self.state.stop_source().map(crate::stop::StopSource::token)
    }
}

impl<T: Clone> SharedFuture<T> {
    /// Waits, then reads the result by clone.
    ///
    /// Every holder observes the same value. A captured panic payload is an
    /// exception: the first caller to ask for it takes it, later callers
    /// see only the panic kind.
    ///
    /// # Errors
    ///
    /// Reports a broken promise, or a panic captured from the task.
    pub fn get(&self) -> Result<T, Error> {
        self.state.clone_result().map_err(Failure::into_error)
    }
}

impl<T> Clone for SharedFuture<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> FutureLike for SharedFuture<T> {
    type Output = T;

    fn is_ready(&self) -> bool {
        SharedFuture::is_ready(self)
    }

    fn wait(&self) {
        SharedFuture::wait(self);
    }

    #[cfg(not(loom))]
    fn wait_until(&self, deadline: Instant) -> Status {
        SharedFuture::wait_until(self, deadline)
    }

    #[cfg(not(loom))]
    fn wait_for(&self, timeout: Duration) -> Status {
        SharedFuture::wait_for(self, timeout)
    }

    fn get(self) -> Result<T, Error> {
        SharedFuture::get(&self)
    }

    fn on_ready(&self, hook: Work) -> Result<(), Work> {
        self.state.attach_continuation(hook)
    }

    fn make_waiter(&self) -> Work {
        let state = self.state.clone();
        Box::new(move || state.wait())
    }
}

impl<T> fmt::Debug for SharedFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedFuture").field(&self.state).finish()
    }
}

// handles move between producer and consumer threads
static_assertions::assert_impl_all!(Future<u32>: Send, Sync);
static_assertions::assert_impl_all!(SharedFuture<u32>: Send, Sync, Clone);
static_assertions::assert_impl_all!(StopToken: Send, Sync, Clone);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loom;
    use crate::promise::Promise;

    #[test]
    fn share_reads_repeatedly() {
        loom::model(|| {
            let mut promise = Promise::new();
            let shared = promise.future().unwrap().share();
            promise.set(5).unwrap();

            assert_eq!(SharedFuture::get(&shared).unwrap(), 5);
            assert_eq!(SharedFuture::get(&shared).unwrap(), 5);
            let other = shared.clone();
            assert_eq!(SharedFuture::get(&other).unwrap(), 5);
        });
    }

    #[cfg(not(loom))]
    #[test]
    fn timed_wait_statuses() {
        let mut promise = Promise::new();
        let future = promise.future().unwrap();

        assert_eq!(future.wait_for(Duration::ZERO), Status::Timeout);
        promise.set(1).unwrap();
        assert_eq!(future.wait_for(Duration::ZERO), Status::Ready);
        assert_eq!(future.get().unwrap(), 1);
    }

    #[cfg(not(loom))]
    #[test]
    fn wait_for_all_over_a_range() {
        let mut promises: Vec<Promise<u32>> = (0..3).map(|_| Promise::new()).collect();
        let futures: Vec<_> = promises.iter_mut().map(|p| p.future().unwrap()).collect();

        assert_eq!(
            wait_for_all_for(&futures, Duration::ZERO),
            Status::Timeout
        );

        for (i, promise) in promises.iter_mut().enumerate() {
            promise.set(i as u32).unwrap();
        }
        wait_for_all(&futures);
        assert!(futures.iter().all(Future::is_ready));
    }
}
