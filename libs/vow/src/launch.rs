// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Launching tasks as futures.
//!
//! [`spawn`] submits eagerly: the state is allocated, the work item goes to
//! the executor, and the returned [`Future`] observes its completion.
//! [`defer`] records the task instead; it runs inline on the thread that
//! first waits. The [`Launch`] builder combines the strategy with stop
//! support and stop-source sharing.

use crate::executor::Executor;
use crate::future::Future;
use crate::loom::Arc;
use crate::options::Options;
use crate::state::{DeferredTask, Failure, OpState, ProducerGuard};
use crate::stop::{StopSource, StopToken};
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Builder combining launch options.
///
/// ```
/// use vow::{Launch, executor::InlineExecutor};
///
/// let future = Launch::new().deferred().spawn(&InlineExecutor, || 2 + 2);
/// assert_eq!(future.get().unwrap(), 4);
/// ```
#[derive(Debug, Default)]
pub struct Launch {
    deferred: bool,
    stop_source: Option<StopSource>,
}

// === impl Launch ===

impl Launch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the task in the state instead of submitting it; it runs
    /// inline on the first thread that waits.
    pub fn deferred(mut self) -> Self {
        self.deferred = true;
        self
    }

    /// Use `source` instead of a fresh stop source, so several futures
    /// cooperate on one cancellation signal. Implies nothing unless the
    /// task is launched with [`spawn_stoppable`](Launch::spawn_stoppable).
    pub fn stop_source(mut self, source: StopSource) -> Self {
        self.stop_source = Some(source);
        self
    }

    /// Launches `f` and returns the future over its result.
    ///
    /// For a deferred launch the executor is not used; the task runs on the
    /// waiting thread.
    pub fn spawn<E, F, T>(self, ex: &E, f: F) -> Future<T>
    where
        E: Executor + Clone + 'static,
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        if self.deferred {
            launch_deferred(None, f)
        } else {
            launch_eager(ex, None, f)
        }
    }

    /// Launches `f` with a stop token; the future requests stop and joins
    /// when dropped before completion.
    pub fn spawn_stoppable<E, F, T>(self, ex: &E, f: F) -> Future<T>
    where
        E: Executor + Clone + 'static,
        F: FnOnce(StopToken) -> T + Send + 'static,
        T: Send + 'static,
    {
        let source = self.stop_source.unwrap_or_default();
        let token = source.token();
        if self.deferred {
            launch_deferred(Some(source), move || f(token))
        } else {
            launch_eager(ex, Some(source), move || f(token))
        }
    }
}

/// Launches `f` eagerly on `ex`. Shorthand for [`Launch::spawn`].
pub fn spawn<E, F, T>(ex: &E, f: F) -> Future<T>
where
    E: Executor + Clone + 'static,
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    Launch::new().spawn(ex, f)
}

/// Launches `f` eagerly with a stop token. Shorthand for
/// [`Launch::spawn_stoppable`].
pub fn spawn_stoppable<E, F, T>(ex: &E, f: F) -> Future<T>
where
    E: Executor + Clone + 'static,
    F: FnOnce(StopToken) -> T + Send + 'static,
    T: Send + 'static,
{
    Launch::new().spawn_stoppable(ex, f)
}

/// Records `f` as a deferred task; it runs inline on the first `wait`.
pub fn defer<F, T>(f: F) -> Future<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    launch_deferred(None, f)
}

#[tracing::instrument(skip_all)]
fn launch_eager<E, F, T>(ex: &E, stop: Option<StopSource>, f: F) -> Future<T>
where
    E: Executor + Clone + 'static,
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let exec: Arc<dyn Executor> = Arc::new(ex.clone());

    let mut options = Options::CONTINUABLE | Options::HAS_EXECUTOR;
    if stop.is_some() {
        options |= Options::STOPPABLE;
    }
    let state = Arc::new(OpState::eager(options, Some(exec.clone()), stop));

    let producer = ProducerGuard::new(state.clone());
    exec.execute(Box::new(move || {
        let result = catch_unwind(AssertUnwindSafe(f)).map_err(Failure::panicked);
        producer.complete(result);
    }));

    Future::from_state(state)
}

fn launch_deferred<F, T>(stop: Option<StopSource>, f: F) -> Future<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let mut options = Options::DEFERRED;
    if stop.is_some() {
        options |= Options::STOPPABLE;
    }
    let task = DeferredTask {
        wait_callback: None,
        task: Box::new(move || catch_unwind(AssertUnwindSafe(f)).map_err(Failure::panicked)),
    };
    Future::from_state(Arc::new(OpState::deferred(options, task, stop)))
}
