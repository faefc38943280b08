// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Future conjunctions.
//!
//! [`when_all`] builds a composite future over a tuple, `Vec`, or array of
//! child futures (callables are lifted onto the default executor first).
//! The composite becomes ready when every child is ready; its value is the
//! sequence of the now-ready children, so an errored child never errors the
//! composite. The error surfaces when that child's own result is read.
//!
//! `f1 & f2` is the operator form. Conjoining conjunctions *flattens*:
//! `(f1 & f2) & f3` yields a composite over three children, not a nested
//! pair.

use crate::adaptor::then::{ReadSource, continue_with, wrap_continuation};
#[cfg(not(loom))]
use crate::error::Status;
use crate::error::Error;
use crate::executor::{Executor, Work, default_executor};
use crate::future::{Future, FutureLike, SharedFuture};
use crate::launch::spawn;
use crate::loom::Arc;
use crate::loom::atomic::{AtomicUsize, Ordering};
use crate::options::Options;
use crate::state::{OpState, TaskResult};
use core::fmt;
use core::marker::PhantomData;
use core::ops::BitAnd;
#[cfg(not(loom))]
use std::time::{Duration, Instant};

/// Erased view of one composite child.
#[doc(hidden)]
pub trait ErasedChild {
    fn ready(&self) -> bool;
    fn watch(&self, hook: Work) -> Result<(), Work>;
    fn waiter(&self) -> Work;
}

impl<F: FutureLike> ErasedChild for F {
    fn ready(&self) -> bool {
        self.is_ready()
    }

    fn watch(&self, hook: Work) -> Result<(), Work> {
        self.on_ready(hook)
    }

    fn waiter(&self) -> Work {
        self.make_waiter()
    }
}

/// A sequence of child futures owned by a composite.
///
/// Implemented for tuples up to arity 5, `Vec`s, and arrays.
pub trait FutureSequence: Send + 'static {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn for_each_child(&self, f: &mut dyn FnMut(&dyn ErasedChild));
}

impl<F: FutureLike + Send + 'static> FutureSequence for Vec<F> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn for_each_child(&self, f: &mut dyn FnMut(&dyn ErasedChild)) {
        for child in self {
            f(child);
        }
    }
}

impl<F: FutureLike + Send + 'static, const N: usize> FutureSequence for [F; N] {
    fn len(&self) -> usize {
        N
    }

    fn for_each_child(&self, f: &mut dyn FnMut(&dyn ErasedChild)) {
        for child in self {
            f(child);
        }
    }
}

macro_rules! impl_future_sequence {
    ($len:expr => $($T:ident $idx:tt),+) => {
        impl<$($T: FutureLike + Send + 'static),+> FutureSequence for ($($T,)+) {
            fn len(&self) -> usize {
                $len
            }

            fn for_each_child(&self, f: &mut dyn FnMut(&dyn ErasedChild)) {
                $(f(&self.$idx);)+
            }
        }
    };
}

impl_future_sequence!(1 => A 0);
impl_future_sequence!(2 => A 0, B 1);
impl_future_sequence!(3 => A 0, B 1, C 2);
impl_future_sequence!(4 => A 0, B 1, C 2, D 3);
impl_future_sequence!(5 => A 0, B 1, C 2, D 3, E 4);

/// Marker: the element is already a future.
pub enum FutureMarker {}

/// Marker: the element is a callable to be lifted by `spawn`.
pub struct FnMarker<R>(PhantomData<R>);

/// Marker: the input is a runtime-sized sequence of futures.
pub enum SeqMarker {}

/// Marker: the input is a single element (future or callable).
pub struct ElemMarker<M>(PhantomData<M>);

/// One element of a combinator input: a future, or a callable lifted to a
/// future on the default executor.
pub trait IntoFutureElem<M> {
    type Fut: FutureLike + Send + 'static;

    fn into_elem(self) -> Self::Fut;
}

impl<F: FutureLike + Send + 'static> IntoFutureElem<FutureMarker> for F {
    type Fut = F;

    fn into_elem(self) -> F {
        self
    }
}

impl<F, R> IntoFutureElem<FnMarker<R>> for F
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    type Fut = Future<R>;

    fn into_elem(self) -> Future<R> {
        spawn(default_executor(), self)
    }
}

/// Conversion of combinator inputs into an owned child sequence.
pub trait IntoFutureSeq<M> {
    type Seq: FutureSequence;

    fn into_seq(self) -> Self::Seq;
}

impl<F, M> IntoFutureSeq<ElemMarker<M>> for F
where
    F: IntoFutureElem<M>,
{
    type Seq = (F::Fut,);

    fn into_seq(self) -> Self::Seq {
        (self.into_elem(),)
    }
}

impl<F: FutureLike + Send + 'static> IntoFutureSeq<SeqMarker> for Vec<F> {
    type Seq = Vec<F>;

    fn into_seq(self) -> Self::Seq {
        self
    }
}

impl<F: FutureLike + Send + 'static, const N: usize> IntoFutureSeq<SeqMarker> for [F; N] {
    type Seq = [F; N];

    fn into_seq(self) -> Self::Seq {
        self
    }
}

macro_rules! impl_into_future_seq {
    ($($T:ident $M:ident $idx:tt),+) => {
        impl<$($T: IntoFutureElem<$M>, $M),+> IntoFutureSeq<($($M,)+)> for ($($T,)+) {
            type Seq = ($($T::Fut,)+);

            fn into_seq(self) -> Self::Seq {
                ($(self.$idx.into_elem(),)+)
            }
        }
    };
}

impl_into_future_seq!(A MA 0);
impl_into_future_seq!(A MA 0, B MB 1);
impl_into_future_seq!(A MA 0, B MB 1, C MC 2);
impl_into_future_seq!(A MA 0, B MB 1, C MC 2, D MD 3);
impl_into_future_seq!(A MA 0, B MB 1, C MC 2, D MD 3, E ME 4);

/// Registers `hook` to run when `child` becomes ready, falling back to an
/// immediate call (already ready) or a posted blocking waiter (cannot
/// notify).
pub(crate) fn watch_child(child: &dyn ErasedChild, hook: Work) {
    match child.watch(hook) {
        Ok(()) => {}
        Err(hook) => {
            if child.ready() {
                hook();
            } else {
                let block = child.waiter();
                default_executor().execute(Box::new(move || {
                    block();
                    hook();
                }));
            }
        }
    }
}

/// Composite future over a sequence of children; ready when all of them
/// are. Produced by [`when_all`] and the `&` operator.
pub struct WhenAll<S> {
    seq: Option<S>,
    gate: Arc<OpState<()>>,
}

// === impl WhenAll ===

impl<S: FutureSequence> WhenAll<S> {
    pub(crate) fn new(seq: S) -> Self {
        let gate = Arc::new(OpState::eager(Options::CONTINUABLE, None, None));

        let remaining = Arc::new(AtomicUsize::new(seq.len()));
        if seq.is_empty() {
            // an empty conjunction is vacuously ready
            let _ = gate.complete(Ok(()));
        } else {
            seq.for_each_child(&mut |child| {
                let hook: Work = {
                    let gate = gate.clone();
                    let remaining = remaining.clone();
                    Box::new(move || {
                        if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                            let _ = gate.complete(Ok(()));
                        }
                    })
                };
                watch_child(child, hook);
            });
        }

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

    /// Waits for every child, then returns the sequence of ready futures.
    ///
    /// # Errors
    ///
    /// Never fails; the `Result` mirrors the other future types. Errored
    /// children surface when their own results are read.
    #[expect(clippy::missing_panics_doc, reason = "internal assertion")]
    pub fn get(mut self) -> Result<S, Error> {
        self.gate.take()?;
        Ok(self.seq.take().unwrap())
    }

    /// Chains `f` over the ready child sequence.
    pub fn then<U, F>(self, f: F) -> Future<U>
    where
        F: FnOnce(S) -> U + Send + 'static,
        U: Send + 'static,
    {
        let exec: Arc<dyn Executor> = Arc::new(default_executor().clone());
        continue_with(self, exec, None, wrap_continuation(f))
    }
}

impl<S: FutureSequence> FutureLike for WhenAll<S> {
    type Output = S;

    fn is_ready(&self) -> bool {
        WhenAll::is_ready(self)
    }

    fn wait(&self) {
        WhenAll::wait(self);
    }

    #[cfg(not(loom))]
    fn wait_until(&self, deadline: Instant) -> Status {
        WhenAll::wait_until(self, deadline)
    }

    #[cfg(not(loom))]
    fn wait_for(&self, timeout: Duration) -> Status {
        WhenAll::wait_for(self, timeout)
    }

    fn get(self) -> Result<S, Error> {
        WhenAll::get(self)
    }

    fn on_ready(&self, hook: Work) -> Result<(), Work> {
        self.gate.attach_continuation(hook)
    }

    fn make_waiter(&self) -> Work {
        let gate = self.gate.clone();
        Box::new(move || gate.wait())
    }
}

impl<S: FutureSequence> ReadSource for WhenAll<S> {
    type Value = S;

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

    fn read(mut self) -> TaskResult<S> {
        self.gate.take_result()?;
        Ok(self.seq.take().unwrap())
    }
}

impl<S> fmt::Debug for WhenAll<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WhenAll")
            .field("ready", &self.gate.is_ready())
            .finish_non_exhaustive()
    }
}

/// Builds a composite future that is ready when every input is.
///
/// Accepts a tuple of futures and/or callables (lifted onto the default
/// executor), a `Vec` of futures, an array of futures, or a single future.
///
/// ```
/// use vow::{executor::InlineExecutor, spawn, when_all};
///
/// let all = when_all((spawn(&InlineExecutor, || 1), || 2));
/// let (a, b) = all.get().unwrap();
/// assert_eq!(a.get().unwrap() + b.get().unwrap(), 3);
/// ```
pub fn when_all<S, M>(input: S) -> WhenAll<S::Seq>
where
    S: IntoFutureSeq<M>,
{
    WhenAll::new(input.into_seq())
}

// === operator & ===

impl<A: Send + 'static, B: Send + 'static> BitAnd<Future<B>> for Future<A> {
    type Output = WhenAll<(Future<A>, Future<B>)>;

    fn bitand(self, rhs: Future<B>) -> Self::Output {
        WhenAll::new((self, rhs))
    }
}

impl<A: Send + 'static, B: Clone + Send + 'static> BitAnd<SharedFuture<B>> for Future<A> {
    type Output = WhenAll<(Future<A>, SharedFuture<B>)>;

    fn bitand(self, rhs: SharedFuture<B>) -> Self::Output {
        WhenAll::new((self, rhs))
    }
}

impl<A: Clone + Send + 'static, B: Send + 'static> BitAnd<Future<B>> for SharedFuture<A> {
    type Output = WhenAll<(SharedFuture<A>, Future<B>)>;

    fn bitand(self, rhs: Future<B>) -> Self::Output {
        WhenAll::new((self, rhs))
    }
}

impl<A: Clone + Send + 'static, B: Clone + Send + 'static> BitAnd<SharedFuture<B>>
    for SharedFuture<A>
{
    type Output = WhenAll<(SharedFuture<A>, SharedFuture<B>)>;

    fn bitand(self, rhs: SharedFuture<B>) -> Self::Output {
        WhenAll::new((self, rhs))
    }
}

// conjoining a conjunction flattens, so `&` chains build flat tuples
macro_rules! impl_bitand_flatten {
    ($($T:ident $idx:tt),+) => {
        impl<$($T: FutureLike + Send + 'static,)+ Z: Send + 'static> BitAnd<Future<Z>>
            for WhenAll<($($T,)+)>
        {
            type Output = WhenAll<($($T,)+ Future<Z>,)>;

            fn bitand(self, rhs: Future<Z>) -> Self::Output {
                let seq = self.release();
                WhenAll::new(($(seq.$idx,)+ rhs,))
            }
        }

        impl<$($T: FutureLike + Send + 'static,)+ Z: Clone + Send + 'static>
            BitAnd<SharedFuture<Z>> for WhenAll<($($T,)+)>
        {
            type Output = WhenAll<($($T,)+ SharedFuture<Z>,)>;

            fn bitand(self, rhs: SharedFuture<Z>) -> Self::Output {
                let seq = self.release();
                WhenAll::new(($(seq.$idx,)+ rhs,))
            }
        }

        impl<$($T: FutureLike + Send + 'static,)+ Z: Send + 'static>
            BitAnd<WhenAll<($($T,)+)>> for Future<Z>
        {
            type Output = WhenAll<(Future<Z>, $($T,)+)>;

            fn bitand(self, rhs: WhenAll<($($T,)+)>) -> Self::Output {
                let seq = rhs.release();
                WhenAll::new((self, $(seq.$idx,)+))
            }
        }

        impl<$($T: FutureLike + Send + 'static,)+ Z: Clone + Send + 'static>
            BitAnd<WhenAll<($($T,)+)>> for SharedFuture<Z>
        {
            type Output = WhenAll<(SharedFuture<Z>, $($T,)+)>;

            fn bitand(self, rhs: WhenAll<($($T,)+)>) -> Self::Output {
                let seq = rhs.release();
                WhenAll::new((self, $(seq.$idx,)+))
            }
        }
    };
}

impl_bitand_flatten!(A 0, B 1);
impl_bitand_flatten!(A 0, B 1, C 2);
impl_bitand_flatten!(A 0, B 1, C 2, D 3);

macro_rules! impl_bitand_concat {
    (($($L:ident $li:tt),+), ($($R:ident $ri:tt),+)) => {
        impl<$($L: FutureLike + Send + 'static,)+ $($R: FutureLike + Send + 'static),+>
            BitAnd<WhenAll<($($R,)+)>> for WhenAll<($($L,)+)>
        {
            type Output = WhenAll<($($L,)+ $($R,)+)>;

            fn bitand(self, rhs: WhenAll<($($R,)+)>) -> Self::Output {
                let lhs = self.release();
                let rhs = rhs.release();
                WhenAll::new(($(lhs.$li,)+ $(rhs.$ri,)+))
            }
        }
    };
}

impl_bitand_concat!((A 0, B 1), (C 0, D 1));
impl_bitand_concat!((A 0, B 1), (C 0, D 1, E 2));
impl_bitand_concat!((A 0, B 1, C 2), (D 0, E 1));

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use crate::executor::{InlineExecutor, ThreadPool};
    use crate::launch::defer;
    use crate::promise::Promise;
    use std::time::Duration;

    #[test]
    fn tuple_conjunction() {
        let pool = ThreadPool::new(2);
        let all = when_all((
            spawn(&pool, || 1u32),
            spawn(&pool, || 2.5f64),
            spawn(&pool, || "x".to_owned()),
        ));

        let (a, b, c) = all.get().unwrap();
        assert_eq!(a.get().unwrap(), 1);
        assert!((b.get().unwrap() - 2.5).abs() < f64::EPSILON);
        assert_eq!(c.get().unwrap(), "x");
    }

    #[test]
    fn lifts_callables() {
        let all = when_all((|| 1u32, || 2u32));
        let (a, b) = all.get().unwrap();
        assert_eq!(a.get().unwrap() + b.get().unwrap(), 3);
    }

    #[test]
    fn range_conjunction() {
        let pool = ThreadPool::new(4);
        let futures: Vec<_> = (0..16u32).map(|i| spawn(&pool, move || i)).collect();

        let ready = when_all(futures).get().unwrap();
        let total: u32 = ready.into_iter().map(|f| f.get().unwrap()).sum();
        assert_eq!(total, (0..16u32).sum());
    }

    #[test]
    fn empty_conjunction_is_ready() {
        let all = when_all(Vec::<Future<u32>>::new());
        assert!(all.is_ready());
        assert!(all.get().unwrap().is_empty());
    }

    #[test]
    fn errored_child_does_not_error_the_composite() {
        let pool = ThreadPool::new(2);
        let all = when_all((spawn(&pool, || 1u32), spawn(&pool, || -> u32 { panic!("child") })));

        let (ok, bad) = all.get().unwrap();
        assert_eq!(ok.get().unwrap(), 1);
        assert!(bad.get().unwrap_err().is_panic());
    }

    #[test]
    fn waits_for_non_continuable_children() {
        let mut promise = Promise::new();
        let all = when_all((promise.future().unwrap(),));
        assert_eq!(all.wait_for(Duration::from_millis(10)), Status::Timeout);

        promise.set(5u32).unwrap();
        let (f,) = all.get().unwrap();
        assert_eq!(f.get().unwrap(), 5);
    }

    #[test]
    fn drives_deferred_children() {
        let all = when_all((defer(|| 1u32), defer(|| 2u32)));
        let (a, b) = all.get().unwrap();
        assert_eq!(a.get().unwrap() + b.get().unwrap(), 3);
    }

    #[test]
    fn operator_chains_flatten_left_and_right() {
        let e = InlineExecutor;
        let (f1, f2, f3) = (spawn(&e, || 1u32), spawn(&e, || 2u32), spawn(&e, || 3u32));
        let left: WhenAll<(Future<u32>, Future<u32>, Future<u32>)> = (f1 & f2) & f3;
        let (a, b, c) = left.get().unwrap();
        assert_eq!(
            a.get().unwrap() + b.get().unwrap() + c.get().unwrap(),
            6
        );

        let (f1, f2, f3) = (spawn(&e, || 1u32), spawn(&e, || 2u32), spawn(&e, || 3u32));
        let right: WhenAll<(Future<u32>, Future<u32>, Future<u32>)> = f1 & (f2 & f3);
        let (a, b, c) = right.get().unwrap();
        assert_eq!(
            a.get().unwrap() + b.get().unwrap() + c.get().unwrap(),
            6
        );
    }

    #[test]
    fn composite_concatenation() {
        let e = InlineExecutor;
        let lhs = spawn(&e, || 1u32) & spawn(&e, || 2u32);
        let rhs = spawn(&e, || 3u32) & spawn(&e, || 4u32);

        let all = lhs & rhs;
        let (a, b, c, d) = all.get().unwrap();
        let total =
            a.get().unwrap() + b.get().unwrap() + c.get().unwrap() + d.get().unwrap();
        assert_eq!(total, 10);
    }

    #[test]
    fn then_over_the_ready_sequence() {
        let pool = ThreadPool::new(2);
        let sum = when_all((spawn(&pool, || 20u32), spawn(&pool, || 22u32)))
            .then(|(a, b)| a.get().unwrap() + b.get().unwrap());
        assert_eq!(sum.get().unwrap(), 42);
    }

    #[test]
    fn composites_nest_as_children() {
        let e = InlineExecutor;
        let inner = when_all((spawn(&e, || 1u32),));
        let outer = when_all((inner, spawn(&e, || 2u32)));

        let (inner, f) = outer.get().unwrap();
        let (g,) = inner.get().unwrap();
        assert_eq!(g.get().unwrap() + f.get().unwrap(), 3);
    }
}
