// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The operation state shared between one producer and its future handles.
//!
//! The state transitions `Empty → Ready` exactly once (or `Deferred →
//! Running → Ready` for deferred states) and the result slot is immutable
//! after that. Completion stores the result, wakes all waiters, then drains
//! the continuation list in FIFO order on the completing thread.

use crate::continuations::ContinuationList;
#[cfg(not(loom))]
use crate::error::Status;
use crate::error::{Error, Payload};
use crate::executor::{Executor, Work};
use crate::loom::{Arc, Condvar, Mutex, lock};
use crate::options::Options;
use crate::stop::StopSource;
use core::fmt;
use core::mem;
use std::sync::PoisonError;
#[cfg(not(loom))]
use std::time::{Duration, Instant};

/// Why a state completed without a value.
pub(crate) enum Failure {
    /// The producer went away without completing.
    BrokenPromise,
    /// The task panicked. The payload is taken by the first consumer that
    /// asks for it; later shared consumers only see the kind.
    Panicked(Option<Payload>),
}

pub(crate) type TaskResult<T> = Result<T, Failure>;

// === impl Failure ===

impl Failure {
    pub(crate) fn panicked(payload: Payload) -> Self {
        Failure::Panicked(Some(payload))
    }

    pub(crate) fn into_error(self) -> Error {
        match self {
            Failure::BrokenPromise => Error::BrokenPromise,
            Failure::Panicked(payload) => Error::Panicked(payload),
        }
    }

    /// Read for a shared holder: the panic payload moves out exactly once.
    fn take_shared(&mut self) -> Failure {
        match self {
            Failure::BrokenPromise => Failure::BrokenPromise,
            Failure::Panicked(payload) => Failure::Panicked(payload.take()),
        }
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::BrokenPromise => f.write_str("BrokenPromise"),
            Failure::Panicked(_) => f.write_str("Panicked"),
        }
    }
}

/// The captured task of an always-deferred state.
pub(crate) struct DeferredTask<T> {
    /// Drives the antecedent first when the deferred task is a
    /// continuation. This is what makes deferred chains composable without
    /// each state knowing its ancestor's type.
    pub(crate) wait_callback: Option<Box<dyn FnOnce() + Send>>,
    /// The task itself; panics are already converted to [`Failure`] inside.
    pub(crate) task: Box<dyn FnOnce() -> TaskResult<T> + Send>,
}

enum Lifecycle<T> {
    /// Eager state awaiting its producer.
    Empty,
    /// Deferred state whose task has not been started.
    Deferred(DeferredTask<T>),
    /// Deferred task currently executing on the first waiting thread.
    Running,
    Ready(TaskResult<T>),
    /// The result was moved out by a unique handle.
    Taken,
}

impl<T> Lifecycle<T> {
    fn name(&self) -> &'static str {
        match self {
            Lifecycle::Empty => "Empty",
            Lifecycle::Deferred(_) => "Deferred",
            Lifecycle::Running => "Running",
            Lifecycle::Ready(_) => "Ready",
            Lifecycle::Taken => "Taken",
        }
    }
}

/// Shared record behind every producer and future handle.
pub(crate) struct OpState<T> {
    options: Options,
    lifecycle: Mutex<Lifecycle<T>>,
    ready: Condvar,
    continuations: Option<ContinuationList>,
    stop: Option<StopSource>,
    executor: Option<Arc<dyn Executor>>,
}

// === impl OpState ===

impl<T> OpState<T> {
    pub(crate) fn eager(
        options: Options,
        executor: Option<Arc<dyn Executor>>,
        stop: Option<StopSource>,
    ) -> Self {
        debug_assert!(!options.contains(Options::DEFERRED));
        debug_assert_eq!(options.contains(Options::HAS_EXECUTOR), executor.is_some());
        debug_assert_eq!(options.contains(Options::STOPPABLE), stop.is_some());
        Self {
            continuations: options
                .contains(Options::CONTINUABLE)
                .then(ContinuationList::new),
            options,
            lifecycle: Mutex::new(Lifecycle::Empty),
            ready: Condvar::new(),
            stop,
            executor,
        }
    }

    pub(crate) fn deferred(
        options: Options,
        task: DeferredTask<T>,
        stop: Option<StopSource>,
    ) -> Self {
        debug_assert!(options.contains(Options::DEFERRED));
        Self {
            continuations: options
                .contains(Options::CONTINUABLE)
                .then(ContinuationList::new),
            options,
            lifecycle: Mutex::new(Lifecycle::Deferred(task)),
            ready: Condvar::new(),
            stop,
            executor: None,
        }
    }

    pub(crate) fn options(&self) -> Options {
        self.options
    }

    pub(crate) fn executor(&self) -> Option<&Arc<dyn Executor>> {
        self.executor.as_ref()
    }

    pub(crate) fn stop_source(&self) -> Option<&StopSource> {
        self.stop.as_ref()
    }

    pub(crate) fn request_stop(&self) -> bool {
        self.stop.as_ref().is_some_and(StopSource::request_stop)
    }

    pub(crate) fn is_deferred(&self) -> bool {
        self.options.contains(Options::DEFERRED)
    }

    /// Non-blocking readiness probe.
    pub(crate) fn is_ready(&self) -> bool {
        matches!(
            &*lock(&self.lifecycle),
            Lifecycle::Ready(_) | Lifecycle::Taken
        )
    }

    /// Transitions to `Ready` exactly once.
    ///
    /// # Errors
    ///
    /// Hands the result back if the state was already satisfied.
    pub(crate) fn complete(&self, result: TaskResult<T>) -> Result<(), TaskResult<T>> {
        {
            let mut lifecycle = lock(&self.lifecycle);
            match &*lifecycle {
                Lifecycle::Empty | Lifecycle::Running => {}
                Lifecycle::Deferred(_) | Lifecycle::Ready(_) | Lifecycle::Taken => {
                    return Err(result);
                }
            }
            tracing::trace!(ok = result.is_ok(), "state ready");
            *lifecycle = Lifecycle::Ready(result);
            self.ready.notify_all();
        }

        if let Some(continuations) = &self.continuations {
            continuations.request_run();
        }
        Ok(())
    }

    /// Blocks until the state is ready.
    ///
    /// On a deferred state whose task has not run, this drives the wait
    /// callback and then the task inline on the calling thread.
    pub(crate) fn wait(&self) {
        let mut lifecycle = lock(&self.lifecycle);
        loop {
            match &*lifecycle {
                Lifecycle::Ready(_) | Lifecycle::Taken => return,
                Lifecycle::Deferred(_) => {
                    let Lifecycle::Deferred(task) =
                        mem::replace(&mut *lifecycle, Lifecycle::Running)
                    else {
                        unreachable!()
                    };
                    drop(lifecycle);
                    self.run_deferred(task);
                    return;
                }
                Lifecycle::Empty | Lifecycle::Running => {
                    lifecycle = self
                        .ready
                        .wait(lifecycle)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }

    /// Bounded wait. Never drives a deferred task.
    #[cfg(not(loom))]
    pub(crate) fn wait_until(&self, deadline: Instant) -> Status {
        let mut lifecycle = lock(&self.lifecycle);
        loop {
            match &*lifecycle {
                Lifecycle::Ready(_) | Lifecycle::Taken => return Status::Ready,
                Lifecycle::Deferred(_) => return Status::Deferred,
                Lifecycle::Empty | Lifecycle::Running => {
                    let Some(remaining) = deadline.checked_duration_since(Instant::now()).filter(|r| !r.is_zero()) else {
                        return Status::Timeout;
                    };
                    lifecycle = self
                        .ready
                        .wait_timeout(lifecycle, remaining)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
        }
    }

    #[cfg(not(loom))]
    pub(crate) fn wait_for(&self, timeout: Duration) -> Status {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.wait_until(deadline),
            // timeout too far out to represent: an unbounded wait, except on
            // deferred states which still report their status
            None => {
                if self.is_deferred() && !self.is_ready() {
                    Status::Deferred
                } else {
                    self.wait();
                    Status::Ready
                }
            }
        }
    }

    /// Waits, then moves the result out. Unique-handle read.
    pub(crate) fn take(&self) -> Result<T, Error> {
        self.take_result().map_err(Failure::into_error)
    }

    /// Waits, then moves the raw result out, for forwarding into a
    /// continuation's state.
    pub(crate) fn take_result(&self) -> TaskResult<T> {
        self.wait();
        let mut lifecycle = lock(&self.lifecycle);
        match mem::replace(&mut *lifecycle, Lifecycle::Taken) {
            Lifecycle::Ready(result) => result,
            other => unreachable!("result taken twice through a unique handle ({})", other.name()),
        }
    }

    /// Waits, then reads the result by clone. Shared-handle read.
    pub(crate) fn clone_result(&self) -> TaskResult<T>
    where
        T: Clone,
    {
        self.wait();
        let mut lifecycle = lock(&self.lifecycle);
        match &mut *lifecycle {
            Lifecycle::Ready(Ok(value)) => Ok(value.clone()),
            Lifecycle::Ready(Err(failure)) => Err(failure.take_shared()),
            other => unreachable!("shared state read while {}", other.name()),
        }
    }

    /// Appends a run-on-ready callback, or hands it back if the state
    /// completed first (the caller dispatches through an executor) or the
    /// state has no continuation list at all.
    pub(crate) fn attach_continuation(&self, work: Work) -> Result<(), Work> {
        match &self.continuations {
            Some(continuations) => continuations.push(work),
            None => Err(work),
        }
    }

    fn run_deferred(&self, task: DeferredTask<T>) {
        let _span = tracing::trace_span!("drive deferred task").entered();
        if let Some(wait_callback) = task.wait_callback {
            wait_callback();
        }
        let result = (task.task)();

        let completed = self.complete(result).is_ok();
        debug_assert!(completed, "deferred state completed twice");
    }
}

impl<T> fmt::Debug for OpState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpState")
            .field("lifecycle", &lock(&self.lifecycle).name())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Producer-side ownership of a state, embedded in work items.
///
/// A work item that is dropped without running (an executor shutting down,
/// a queue being cleared) must not strand its consumers: the guard breaks
/// the promise instead.
pub(crate) struct ProducerGuard<T> {
    state: Option<Arc<OpState<T>>>,
}

// === impl ProducerGuard ===

impl<T> ProducerGuard<T> {
    pub(crate) fn new(state: Arc<OpState<T>>) -> Self {
        Self { state: Some(state) }
    }

    /// Completes the state; the producer is consumed.
    pub(crate) fn complete(mut self, result: TaskResult<T>) {
        // `None` is unobservable, `complete` is the only consuming method
        let state = self.state.take().unwrap();
        let completed = state.complete(result).is_ok();
        debug_assert!(completed, "state completed by someone else's hand");
    }
}

impl<T> Drop for ProducerGuard<T> {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            let _ = state.complete(Err(Failure::BrokenPromise));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::loom;

    fn plain() -> OpState<u32> {
        OpState::eager(Options::empty(), None, None)
    }

    #[test]
    fn completes_exactly_once() {
        loom::model(|| {
            let state = plain();
            assert!(state.complete(Ok(1)).is_ok());
            // the second completion gets its value handed back
            assert!(matches!(state.complete(Ok(2)), Err(Ok(2))));
            assert!(state.is_ready());
            assert_eq!(state.take().unwrap(), 1);
        });
    }

    #[test]
    fn wait_blocks_until_complete() {
        loom::model(|| {
            let state = Arc::new(plain());
            let producer = state.clone();

            let handle = loom::thread::spawn(move || {
                producer.complete(Ok(7)).map_err(drop).unwrap();
            });

            state.wait();
            assert_eq!(state.take().unwrap(), 7);
            handle.join().unwrap();
        });
    }

    #[test]
    fn failure_surfaces_as_error() {
        loom::model(|| {
            let state = plain();
            state.complete(Err(Failure::BrokenPromise)).map_err(drop).unwrap();
            assert_eq!(state.take().unwrap_err().kind(), ErrorKind::BrokenPromise);
        });
    }

    #[cfg(not(loom))]
    #[test]
    fn timed_wait_statuses() {
        let state = plain();
        assert_eq!(state.wait_for(Duration::ZERO), Status::Timeout);

        state.complete(Ok(3)).map_err(drop).unwrap();
        assert_eq!(state.wait_for(Duration::ZERO), Status::Ready);
    }

    #[cfg(not(loom))]
    #[test]
    fn timed_wait_does_not_drive_deferred() {
        let state = OpState::deferred(
            Options::DEFERRED,
            DeferredTask {
                wait_callback: None,
                task: Box::new(|| Ok(9)),
            },
            None,
        );
        assert_eq!(state.wait_for(Duration::ZERO), Status::Deferred);
        assert!(!state.is_ready());

        // an unbounded wait runs the task inline
        state.wait();
        assert_eq!(state.take().unwrap(), 9);
    }

    #[test]
    fn deferred_wait_callback_runs_first() {
        use crate::loom::atomic::{AtomicUsize, Ordering};

        loom::model(|| {
            let order = Arc::new(AtomicUsize::new(0));
            let cb_order = order.clone();
            let task_order = order.clone();

            let state = OpState::deferred(
                Options::DEFERRED,
                DeferredTask {
                    wait_callback: Some(Box::new(move || {
                        cb_order
                            .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
                            .unwrap();
                    })),
                    task: Box::new(move || {
                        task_order
                            .compare_exchange(1, 2, Ordering::SeqCst, Ordering::SeqCst)
                            .unwrap();
                        Ok(0)
                    }),
                },
                None,
            );

            state.wait();
            assert_eq!(order.load(Ordering::SeqCst), 2);
        });
    }

    #[test]
    fn shared_read_clones_and_takes_payload_once() {
        loom::model(|| {
            let state: OpState<String> = OpState::eager(Options::SHARED, None, None);
            state.complete(Ok("x".to_owned())).map_err(drop).unwrap();
            assert_eq!(state.clone_result().unwrap(), "x");
            assert_eq!(state.clone_result().unwrap(), "x");

            let state: OpState<String> = OpState::eager(Options::SHARED, None, None);
            state
                .complete(Err(Failure::panicked(Box::new("boom"))))
                .map_err(drop)
                .unwrap();
            let first = state.clone_result().unwrap_err();
            assert!(matches!(first, Failure::Panicked(Some(_))));
            let second = state.clone_result().unwrap_err();
            assert!(matches!(second, Failure::Panicked(None)));
        });
    }

    #[test]
    fn continuations_fire_on_complete() {
        use crate::loom::atomic::{AtomicUsize, Ordering};

        loom::model(|| {
            let state: OpState<u32> = OpState::eager(Options::CONTINUABLE, None, None);
            let fired = Arc::new(AtomicUsize::new(0));

            let handle = fired.clone();
            let attached = state.attach_continuation(Box::new(move || {
                handle.fetch_add(1, Ordering::SeqCst);
            }));
            assert!(attached.is_ok());

            state.complete(Ok(1)).map_err(drop).unwrap();
            assert_eq!(fired.load(Ordering::SeqCst), 1);

            // late attachment is handed back for executor dispatch
            assert!(state.attach_continuation(Box::new(|| {})).is_err());
        });
    }
}
