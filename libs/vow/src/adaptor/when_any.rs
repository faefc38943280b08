// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Future disjunctions.
//!
//! [`when_any`] builds a composite over the same input shapes as
//! [`when_all`](crate::adaptor::when_all), ready as soon as *one* child
//! is. Its value is a [`WhenAnyResult`]: the winning index plus the whole
//! input sequence. The winner may itself have completed with an error.
//!
//! Losing children are *not* cancelled; they keep running and stay in the
//! sequence for the consumer to await or drop. Callers expecting
//! structured-concurrency semantics must stop the losers themselves.

use crate::adaptor::then::{ReadSource, continue_with, wrap_continuation};
use crate::adaptor::when_all::{FutureSequence, IntoFutureSeq, watch_child};
#[cfg(not(loom))]
use crate::error::Status;
use crate::error::Error;
use crate::executor::{Executor, Work, default_executor};
use crate::future::{Future, FutureLike, SharedFuture};
use crate::loom::Arc;
use crate::options::Options;
use crate::state::{OpState, TaskResult};
use core::fmt;
use core::ops::BitOr;
#[cfg(not(loom))]
use std::time::{Duration, Instant};

/// Value of a ready [`WhenAny`]: which child finished first, and the whole
/// input sequence (winner included, losers still running or ready).
pub struct WhenAnyResult<S> {
    pub index: usize,
    pub tasks: S,
}

// === impl WhenAnyResult ===

impl<T: Send + 'static> WhenAnyResult<Vec<Future<T>>> {
    /// Takes the winning future out of a homogeneous sequence.
    pub fn take_winner(mut self) -> Future<T> {
        self.tasks.swap_remove(self.index)
    }

    /// Reads the winner's value directly.
    ///
    /// # Errors
    ///
    /// Propagates the winner's own error.
    pub fn winner_value(self) -> Result<T, Error> {
        self.take_winner().get()
    }
}

impl<T: Send + 'static, const N: usize> WhenAnyResult<[Future<T>; N]> {
    /// Takes the winning future out of a homogeneous sequence.
    #[expect(clippy::missing_panics_doc, reason = "index is always in range")]
    pub fn take_winner(self) -> Future<T> {
        let index = self.index;
        self.tasks
            .into_iter()
            .nth(index)
            .expect("winner index out of range")
    }

    /// Reads the winner's value directly.
    ///
    /// # Errors
    ///
    /// Propagates the winner's own error.
    pub fn winner_value(self) -> Result<T, Error> {
        self.take_winner().get()
    }
}

macro_rules! impl_homogeneous_winner {
    ($Tuple:ty => $($idx:tt),+) => {
        impl<T: Send + 'static> WhenAnyResult<$Tuple> {
            /// Takes the winning future out of a homogeneous tuple.
            #[allow(clippy::missing_panics_doc, reason = "index is always in range")]
            pub fn take_winner(self) -> Future<T> {
                match self.index {
                    $($idx => self.tasks.$idx,)+
                    _ => unreachable!("winner index out of range"),
                }
            }

            /// Reads the winner's value directly.
            ///
            /// # Errors
            ///
            /// Propagates the winner's own error.
            pub fn winner_value(self) -> Result<T, Error> {
                self.take_winner().get()
            }
        }
    };
}

impl_homogeneous_winner!((Future<T>,) => 0);
impl_homogeneous_winner!((Future<T>, Future<T>) => 0, 1);
impl_homogeneous_winner!((Future<T>, Future<T>, Future<T>) => 0, 1, 2);
impl_homogeneous_winner!((Future<T>, Future<T>, Future<T>, Future<T>) => 0, 1, 2, 3);
impl_homogeneous_winner!((Future<T>, Future<T>, Future<T>, Future<T>, Future<T>) => 0, 1, 2, 3, 4);

impl<S> fmt::Debug for WhenAnyResult<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WhenAnyResult")
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

/// Composite future over a sequence of children; ready when the first one
/// is. Produced by [`when_any`] and the `|` operator.
pub struct WhenAny<S> {
    seq: Option<S>,
    gate: Arc<OpState<usize>>,
}

// === impl WhenAny ===

impl<S: FutureSequence> WhenAny<S> {
    pub(crate) fn new(seq: S) -> Self {
        let gate = Arc::new(OpState::eager(Options::CONTINUABLE, None, None));

        if seq.is_empty() {
            // an empty disjunction is immediately ready; its index is
            // meaningless and the task list has nothing to take
            let _ = gate.complete(Ok(0));
        }

        let mut index = 0;
        seq.for_each_child(&mut |child| {
            let hook: Work = {
                let gate = gate.clone();
                Box::new(move || {
                    // completion rejects every index after the first
                    let _ = gate.complete(Ok(index));
                })
            };
            watch_child(child, hook);
            index += 1;
        });

        Self {
            seq: Some(seq),
            gate,
        }
    }

    pub(crate) fn release(mut self) -> S {
        self.seq.take().expect("composite already consumed")
    }

    pub fn is_ready(&self) -> bool {
        self.gate.is_ready()
    }

    pub fn wait(&self) {
        self.gate.wait();
    }

    #[cfg(not(loom))]
    pub fn wait_until(&self, deadline: Instant) -> Status {
        self.gate.wait_until(deadline)
    }

    #[cfg(not(loom))]
    pub fn wait_for(&self, timeout: Duration) -> Status {
        self.gate.wait_for(timeout)
    }

    /// Waits for the first ready child.
    ///
    /// # Errors
    ///
    /// Never fails; the `Result` mirrors the other future types. An errored
    /// winner surfaces when its own result is read.
    #[expect(clippy::missing_panics_doc, reason = "internal assertion")]
    pub fn get(mut self) -> Result<WhenAnyResult<S>, Error> {
        let index = self.gate.take()?;
        Ok(WhenAnyResult {
            index,
            tasks: self.seq.take().unwrap(),
        })
    }

    /// Chains `f` over the [`WhenAnyResult`].
    pub fn then<U, F>(self, f: F) -> Future<U>
    where
        F: FnOnce(WhenAnyResult<S>) -> U + Send + 'static,
        U: Send + 'static,
    {
        let exec: Arc<dyn Executor> = Arc::new(default_executor().clone());
        continue_with(self, exec, None, wrap_continuation(f))
    }
}

impl<S: FutureSequence> FutureLike for WhenAny<S> {
    type Output = WhenAnyResult<S>;

    fn is_ready(&self) -> bool {
        WhenAny::is_ready(self)
    }

    fn wait(&self) {
        WhenAny::wait(self);
    }

    #[cfg(not(loom))]
    fn wait_until(&self, deadline: Instant) -> Status {
        WhenAny::wait_until(self, deadline)
    }

    #[cfg(not(loom))]
    fn wait_for(&self, timeout: Duration) -> Status {
        WhenAny::wait_for(self, timeout)
    }

    fn get(self) -> Result<WhenAnyResult<S>, Error> {
        WhenAny::get(self)
    }

    fn on_ready(&self, hook: Work) -> Result<(), Work> {
        self.gate.attach_continuation(hook)
    }

    fn make_waiter(&self) -> Work {
        let gate = self.gate.clone();
        Box::new(move || gate.wait())
    }
}

impl<S: FutureSequence> ReadSource for WhenAny<S> {
    type Value = WhenAnyResult<S>;

    fn options(&self) -> Options {
        self.gate.options()
    }

    fn attacher(&self) -> Box<dyn FnOnce(Work) -> Result<(), Work> + Send> {
        let gate = self.gate.clone();
        Box::new(move |work| gate.attach_continuation(work))
    }

    fn wait_callback(&self) -> Box<dyn FnOnce() + Send> {
        let gate = self.gate.clone();
        Box::new(move || gate.wait())
    }

    fn read(mut self) -> TaskResult<WhenAnyResult<S>> {
        let index = self.gate.take_result()?;
        Ok(WhenAnyResult {
            index,
            tasks: self.seq.take().expect("composite already consumed"),
        })
    }
}

impl<S> fmt::Debug for WhenAny<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WhenAny")
            .field("ready", &self.gate.is_ready())
            .finish_non_exhaustive()
    }
}

/// Builds a composite future that is ready as soon as any input is.
///
/// Accepts the same input shapes as [`when_all`](super::when_all). Losers
/// are not cancelled.
pub fn when_any<S, M>(input: S) -> WhenAny<S::Seq>
where
    S: IntoFutureSeq<M>,
{
    WhenAny::new(input.into_seq())
}

// === operator | ===

impl<A: Send + 'static, B: Send + 'static> BitOr<Future<B>> for Future<A> {
    type Output = WhenAny<(Future<A>, Future<B>)>;

    fn bitor(self, rhs: Future<B>) -> Self::Output {
        WhenAny::new((self, rhs))
    }
}

impl<A: Send + 'static, B: Clone + Send + 'static> BitOr<SharedFuture<B>> for Future<A> {
    type Output = WhenAny<(Future<A>, SharedFuture<B>)>;

    fn bitor(self, rhs: SharedFuture<B>) -> Self::Output {
        WhenAny::new((self, rhs))
    }
}

impl<A: Clone + Send + 'static, B: Send + 'static> BitOr<Future<B>> for SharedFuture<A> {
    type Output = WhenAny<(SharedFuture<A>, Future<B>)>;

    fn bitor(self, rhs: Future<B>) -> Self::Output {
        WhenAny::new((self, rhs))
    }
}

impl<A: Clone + Send + 'static, B: Clone + Send + 'static> BitOr<SharedFuture<B>>
    for SharedFuture<A>
{
    type Output = WhenAny<(SharedFuture<A>, SharedFuture<B>)>;

    fn bitor(self, rhs: SharedFuture<B>) -> Self::Output {
        WhenAny::new((self, rhs))
    }
}

macro_rules! impl_bitor_flatten {
    ($($T:ident $idx:tt),+) => {
        impl<$($T: FutureLike + Send + 'static,)+ Z: Send + 'static> BitOr<Future<Z>>
            for WhenAny<($($T,)+)>
        {
            type Output = WhenAny<($($T,)+ Future<Z>,)>;

            fn bitor(self, rhs: Future<Z>) -> Self::Output {
                let seq = self.release();
                WhenAny::new(($(seq.$idx,)+ rhs,))
            }
        }

        impl<$($T: FutureLike + Send + 'static,)+ Z: Send + 'static>
            BitOr<WhenAny<($($T,)+)>> for Future<Z>
        {
            type Output = WhenAny<(Future<Z>, $($T,)+)>;

            fn bitor(self, rhs: WhenAny<($($T,)+)>) -> Self::Output {
                let seq = rhs.release();
                WhenAny::new((self, $(seq.$idx,)+))
            }
        }
    };
}

impl_bitor_flatten!(A 0, B 1);
impl_bitor_flatten!(A 0, B 1, C 2);
impl_bitor_flatten!(A 0, B 1, C 2, D 3);
