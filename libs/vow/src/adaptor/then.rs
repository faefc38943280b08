// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Continuation attachment.
//!
//! [`continue_with`] is the single entry point every `then`-shaped adaptor
//! funnels through. The strategy depends on the source:
//!
//! - deferred source: the continuation becomes another deferred state whose
//!   wait callback drives the source first, then runs the callback inline
//! - eager, continuable source: a continuation is registered that posts the
//!   callback to the executor once the source completes
//! - eager, non-continuable source (promise- or task-backed): a polling
//!   work item is posted immediately; it blocks on the source, then runs
//!   the callback
//!
//! If the source completed with an error the callback is never invoked;
//! the error moves into the new state unchanged.

use crate::executor::{Executor, Work, default_executor};
use crate::future::{Future, SharedFuture};
use crate::loom::Arc;
use crate::options::Options;
use crate::state::{DeferredTask, Failure, OpState, ProducerGuard, TaskResult};
use crate::stop::{StopSource, StopToken};
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Read-side capabilities `continue_with` needs from a continuation source.
pub(crate) trait ReadSource: Send + Sized + 'static {
    type Value: Send + 'static;

    fn options(&self) -> Options;

    /// A handle that can attach a run-on-ready callback to the source's
    /// state after the source itself has been moved into the task.
    fn attacher(&self) -> Box<dyn FnOnce(Work) -> Result<(), Work> + Send>;

    /// A callback driving the source to completion, for deferred chains.
    fn wait_callback(&self) -> Box<dyn FnOnce() + Send>;

    /// Waits for the source and reads its raw result.
    fn read(self) -> TaskResult<Self::Value>;
}

// === impl ReadSource ===

impl<T: Send + 'static> ReadSource for Future<T> {
    type Value = T;

    fn options(&self) -> Options {
        self.state().options()
    }

    fn attacher(&self) -> Box<dyn FnOnce(Work) -> Result<(), Work> + Send> {
        let state = self.state().clone();
        Box::new(move |work| state.attach_continuation(work))
    }

    fn wait_callback(&self) -> Box<dyn FnOnce() + Send> {
        let state = self.state().clone();
        Box::new(move || state.wait())
    }

    fn read(self) -> TaskResult<T> {
        self.take_state().take_result()
    }
}

impl<T: Clone + Send + 'static> ReadSource for SharedFuture<T> {
    type Value = T;

    fn options(&self) -> Options {
        self.state().options()
    }

    fn attacher(&self) -> Box<dyn FnOnce(Work) -> Result<(), Work> + Send> {
        let state = self.state().clone();
        Box::new(move |work| state.attach_continuation(work))
    }

    fn wait_callback(&self) -> Box<dyn FnOnce() + Send> {
        let state = self.state().clone();
        Box::new(move || state.wait())
    }

    fn read(self) -> TaskResult<T> {
        self.state().clone_result()
    }
}

/// The executor a continuation of `state` dispatches through: the state's
/// own, or the process default.
pub(crate) fn executor_of<T>(state: &OpState<T>) -> Arc<dyn Executor> {
    state
        .executor()
        .cloned()
        .unwrap_or_else(|| Arc::new(default_executor().clone()))
}

/// Adapts a user callback into the raw result-to-result shape: errors pass
/// through untouched, values are fed to the callback, and a panicking
/// callback fails the continuation's state.
pub(crate) fn wrap_continuation<T, U, F>(
    f: F,
) -> impl FnOnce(TaskResult<T>) -> TaskResult<U> + Send + 'static
where
    F: FnOnce(T) -> U + Send + 'static,
    T: Send + 'static,
    U: Send + 'static,
{
    move |result| match result {
        Ok(value) => catch_unwind(AssertUnwindSafe(move || f(value))).map_err(Failure::panicked),
        Err(failure) => Err(failure),
    }
}

/// Builds the continuation state for `g(src result)` and wires it to `src`
/// per the strategy table in the module docs.
pub(crate) fn continue_with<S, U, G>(
    src: S,
    exec: Arc<dyn Executor>,
    stop: Option<StopSource>,
    g: G,
) -> Future<U>
where
    S: ReadSource,
    U: Send + 'static,
    G: FnOnce(TaskResult<S::Value>) -> TaskResult<U> + Send + 'static,
{
    if src.options().contains(Options::DEFERRED) {
        let mut options = Options::DEFERRED;
        if stop.is_some() {
            options |= Options::STOPPABLE;
        }
        let task = DeferredTask {
            wait_callback: Some(src.wait_callback()),
            task: Box::new(move || g(src.read())),
        };
        return Future::from_state(Arc::new(OpState::deferred(options, task, stop)));
    }

    let mut options = Options::CONTINUABLE | Options::HAS_EXECUTOR;
    if stop.is_some() {
        options |= Options::STOPPABLE;
    }
    let state = Arc::new(OpState::eager(options, Some(exec.clone()), stop));

    let src_is_continuable = src.options().contains(Options::CONTINUABLE);
    let attacher = src.attacher();

    let producer = ProducerGuard::new(state.clone());
    let task: Work = Box::new(move || {
        let result = g(src.read());
        producer.complete(result);
    });

    if src_is_continuable {
        let post: Work = {
            let exec = exec.clone();
            Box::new(move || exec.execute(task))
        };
        if let Err(post) = attacher(post) {
            // lost the race with completion; dispatch through the executor
            post();
        }
    } else {
        exec.execute(task);
    }

    Future::from_state(state)
}

// === continuation methods ===

impl<T: Send + 'static> Future<T> {
    /// Chains `f` to run when this future completes, on the future's
    /// executor (or the process default).
    ///
    /// The value is passed to `f` directly; a tuple value arrives whole and
    /// is taken apart with an ordinary tuple pattern. If this future
    /// completes with an error, `f` never runs and the error moves into the
    /// returned future.
    ///
    /// ```
    /// use vow::{executor::InlineExecutor, spawn};
    ///
    /// let f = spawn(&InlineExecutor, || 2).then(|x| x * 3).then(|y| y + 1);
    /// assert_eq!(f.get().unwrap(), 7);
    /// ```
    pub fn then<U, F>(self, f: F) -> Future<U>
    where
        F: FnOnce(T) -> U + Send + 'static,
        U: Send + 'static,
    {
        let exec = executor_of(self.state());
        continue_with(self, exec, None, wrap_continuation(f))
    }

    /// [`then`](Future::then) with an explicit executor for the
    /// continuation.
    pub fn then_on<E, U, F>(self, ex: &E, f: F) -> Future<U>
    where
        E: Executor + Clone + 'static,
        F: FnOnce(T) -> U + Send + 'static,
        U: Send + 'static,
    {
        continue_with(self, Arc::new(ex.clone()), None, wrap_continuation(f))
    }

    /// [`then`](Future::then) with a stop token as the callback's leading
    /// argument.
    ///
    /// The token observes this future's own stop source when it has one
    /// (unique stoppable parent); otherwise the continuation gets a fresh
    /// source of its own.
    pub fn then_stoppable<U, F>(self, f: F) -> Future<U>
    where
        F: FnOnce(StopToken, T) -> U + Send + 'static,
        U: Send + 'static,
    {
        let source = self.state().stop_source().cloned().unwrap_or_default();
        let token = source.token();
        let exec = executor_of(self.state());
        continue_with(
            self,
            exec,
            Some(source),
            wrap_continuation(move |value| f(token, value)),
        )
    }
}

impl<T: Clone + Send + 'static> SharedFuture<T> {
    /// Chains `f` to run with a copy of this future's value.
    ///
    /// Shared futures never share their stop source with continuations.
    pub fn then<U, F>(&self, f: F) -> Future<U>
    where
        F: FnOnce(T) -> U + Send + 'static,
        U: Send + 'static,
    {
        let exec = executor_of(self.state());
        continue_with(self.clone(), exec, None, wrap_continuation(f))
    }

    /// [`then`](SharedFuture::then) with an explicit executor.
    pub fn then_on<E, U, F>(&self, ex: &E, f: F) -> Future<U>
    where
        E: Executor + Clone + 'static,
        F: FnOnce(T) -> U + Send + 'static,
        U: Send + 'static,
    {
        continue_with(self.clone(), Arc::new(ex.clone()), None, wrap_continuation(f))
    }
}

// === future-of-future unwrapping ===

impl<T: Send + 'static> Future<Future<T>> {
    /// Collapses one level of nesting: the returned future completes with
    /// the inner future's result, errors included.
    pub fn flatten(self) -> Future<T> {
        let exec = executor_of(self.state());
        continue_with(self, exec, None, |result| match result {
            Ok(inner) => inner.take_state().take_result(),
            Err(failure) => Err(failure),
        })
    }
}

impl<T: Clone + Send + 'static> Future<SharedFuture<T>> {
    /// Collapses one level of nesting over a shared inner future.
    pub fn flatten(self) -> Future<T> {
        let exec = executor_of(self.state());
        continue_with(self, exec, None, |result| match result {
            Ok(inner) => inner.state().clone_result(),
            Err(failure) => Err(failure),
        })
    }
}

macro_rules! impl_tuple_flatten {
    ($($T:ident => $idx:tt),+) => {
        impl<$($T: Send + 'static),+> Future<($(Future<$T>,)+)> {
            /// Awaits every future in the tuple and completes with the
            /// tuple of their values. The first error wins; later elements
            /// are dropped unread.
            pub fn flatten(self) -> Future<($($T,)+)> {
                let exec = executor_of(self.state());
                continue_with(self, exec, None, |result| match result {
                    Ok(inner) => Ok(($(inner.$idx.take_state().take_result()?,)+)),
                    Err(failure) => Err(failure),
                })
            }
        }
    };
}

impl_tuple_flatten!(A => 0);
impl_tuple_flatten!(A => 0, B => 1);
impl_tuple_flatten!(A => 0, B => 1, C => 2);
impl_tuple_flatten!(A => 0, B => 1, C => 2, D => 3);
impl_tuple_flatten!(A => 0, B => 1, C => 2, D => 3, E => 4);
