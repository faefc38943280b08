// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Parallel algorithms over slices.
//!
//! Every algorithm here is an instance of one recursive skeleton: ask the
//! partitioner for a split point, fork the right half onto the executor,
//! recurse into the left half inline, then join. Forked results that are
//! not ready by the time the left side finishes are recorded and combined
//! at the top, after the recursion.
//!
//! Each algorithm comes in two forms: a bare entry point using the default
//! executor and partitioner (`count_if`), and an `_on` form taking both
//! explicitly (`count_if_on`). On an executor that runs work inline the
//! skeleton collapses to the serial loop.

mod count;
mod find;
mod for_each;
mod partitioner;
mod quantifiers;
mod reduce;

pub use count::{count, count_if, count_if_on, count_on};
pub use find::{find, find_if, find_if_not, find_if_not_on, find_if_on, find_on};
pub use for_each::{for_each, for_each_on};
pub use partitioner::{
    HalvePartitioner, Partitioner, ThreadPartitioner, default_grain_size, default_partitioner,
};
pub use quantifiers::{all_of, all_of_on, any_of, any_of_on, none_of, none_of_on};
pub use reduce::{reduce, reduce_on};

use crate::executor::Executor;
use crate::future::Future;
use crate::launch::spawn;
use crate::loom::atomic::{AtomicBool, Ordering};
use crate::loom::{Arc, Mutex, lock};
use core::mem;

/// Cooperative early-exit flag shared by every fork of one algorithm run.
///
/// Set when a short-circuiting algorithm has already decided its result;
/// serial loops poll it and bail out with a vacuous value.
pub(crate) struct EarlyExit(AtomicBool);

// === impl EarlyExit ===

impl EarlyExit {
    fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    fn set(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub(crate) fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// What a serial leaf sees: its chunk, the chunk's offset into the full
/// slice, the positional branch code of this leaf, and the early-exit flag.
pub(crate) struct SerialInput<'a, T> {
    pub(crate) chunk: &'a [T],
    pub(crate) offset: usize,
    pub(crate) branch: u64,
    pub(crate) cancel: &'a EarlyExit,
}

/// Recursion deeper than the 64-bit branch code stops splitting. In
/// practice the partitioner grain prevents this long before.
const MAX_DEPTH: u32 = 64;

struct Ctx<'a, T, R, Ser, Comb> {
    exec: &'a Arc<dyn Executor>,
    data: &'a [T],
    serial: &'a Ser,
    combine: &'a Comb,
    /// Result already decides the whole run; raise the early-exit flag.
    short_circuit: Option<fn(&R) -> bool>,
    cancel: &'a EarlyExit,
    /// Forked futures that were not ready when their parent finished.
    pending: &'a Mutex<Vec<Future<R>>>,
}

/// Joins every recorded fork on drop, so an unwinding user callback can
/// never leave a forked task borrowing the input slice.
struct DrainGuard<'a, R> {
    pending: &'a Mutex<Vec<Future<R>>>,
    cancel: &'a EarlyExit,
}

impl<R> Drop for DrainGuard<'_, R> {
    fn drop(&mut self) {
        self.cancel.set();
        loop {
            let Some(future) = lock(self.pending).pop() else {
                break;
            };
            future.wait();
        }
    }
}

/// Runs `serial` over `data` with fork-join parallelism on `exec`.
///
/// The skeleton guarantees that every forked task has completed before it
/// returns, on success and on unwind both. That guarantee is what makes the
/// lifetime erasure in [`Ctx::fork`] sound.
pub(crate) fn bisect<T, R, P, Ser, Comb>(
    exec: &Arc<dyn Executor>,
    partitioner: P,
    data: &[T],
    serial: Ser,
    combine: Comb,
    short_circuit: Option<fn(&R) -> bool>,
) -> R
where
    T: Sync,
    R: Send + 'static,
    P: Partitioner,
    Ser: Fn(SerialInput<'_, T>) -> R + Sync,
    Comb: Fn(R, R) -> R + Sync,
{
    let cancel = EarlyExit::new();

    if exec.runs_inline() {
        return serial(SerialInput {
            chunk: data,
            offset: 0,
            branch: 0,
            cancel: &cancel,
        });
    }

    let pending = Mutex::new(Vec::new());
    let ctx = Ctx {
        exec,
        data,
        serial: &serial,
        combine: &combine,
        short_circuit,
        cancel: &cancel,
        pending: &pending,
    };

    let guard = DrainGuard {
        pending: &pending,
        cancel: &cancel,
    };

    let mut acc = ctx.run(partitioner, 0, data.len(), 0, 0);

    // join the recorded forks; tasks may record more while we drain
    loop {
        let next = lock(&pending).pop();
        let Some(future) = next else { break };
        acc = combine(acc, join(future));
    }

    mem::forget(guard);
    acc
}

impl<T, R, Ser, Comb> Ctx<'_, T, R, Ser, Comb>
where
    T: Sync,
    R: Send + 'static,
    Ser: Fn(SerialInput<'_, T>) -> R + Sync,
    Comb: Fn(R, R) -> R + Sync,
{
    fn run<P: Partitioner>(
        &self,
        mut partitioner: P,
        first: usize,
        last: usize,
        level: u32,
        branch: u64,
    ) -> R {
        let middle = if level >= MAX_DEPTH {
            last
        } else {
            partitioner.split(first, last)
        };

        if middle == last || middle == first {
            return (self.serial)(SerialInput {
                chunk: &self.data[first..last],
                offset: first,
                branch,
                cancel: self.cancel,
            });
        }

        // fork [middle, last), recurse into [first, middle) inline
        let rhs_branch = branch | 1 << (MAX_DEPTH - 1 - level);
        let rhs = self.fork(partitioner.clone(), middle, last, level + 1, rhs_branch);
        let lhs = self.run(partitioner, first, middle, level + 1, branch);

        if self.short_circuit.is_some_and(|decides| decides(&lhs)) {
            self.cancel.set();
        }

        if rhs.is_ready() {
            (self.combine)(lhs, join(rhs))
        } else {
            lock(self.pending).push(rhs);
            lhs
        }
    }

    fn fork<P: Partitioner>(
        &self,
        partitioner: P,
        first: usize,
        last: usize,
        level: u32,
        branch: u64,
    ) -> Future<R> {
        let task: Box<dyn FnOnce() -> R + Send + '_> =
            Box::new(move || self.run(partitioner, first, last, level, branch));

        // Safety: the task borrows `self` and, through it, the input slice.
        // Both outlive the task because `bisect` joins every forked future
        // before returning, including on unwind (`DrainGuard`). Extending
        // the lifetime to `'static` is therefore only visible to the
        // executor's type signature, never to a dangling access.
        let task: Box<dyn FnOnce() -> R + Send + 'static> = unsafe { mem::transmute(task) };

        spawn(self.exec, task)
    }
}

/// Unwraps a forked task's result, resuming a captured callback panic on
/// the joining thread.
fn join<R>(future: Future<R>) -> R {
    match future.get() {
        Ok(value) => value,
        Err(err) => match err.try_into_panic() {
            Ok(payload) => std::panic::resume_unwind(payload),
            // forked tasks always complete their state
            Err(err) => unreachable!("forked task failed without panicking: {err}"),
        },
    }
}
