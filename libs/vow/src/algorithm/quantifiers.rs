// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! `all_of` / `any_of` / `none_of`.
//!
//! All three short-circuit: the first chunk that decides the result raises
//! the shared early-exit flag, remaining chunks bail out with the vacuous
//! value, and the skeleton still joins every fork before returning.

use super::{Partitioner, SerialInput, bisect, default_partitioner};
use crate::executor::{Executor, default_executor};
use crate::loom::Arc;

fn every_on<E, P, T, F>(ex: &E, partitioner: P, data: &[T], pred: F) -> bool
where
    E: Executor + Clone + 'static,
    P: Partitioner,
    T: Sync,
    F: Fn(&T) -> bool + Sync,
{
    let exec: Arc<dyn Executor> = Arc::new(ex.clone());
    bisect(
        &exec,
        partitioner,
        data,
        |input: SerialInput<'_, T>| {
            for item in input.chunk {
                if input.cancel.is_set() {
                    // some chunk already failed; our answer is irrelevant
                    return true;
                }
                if !pred(item) {
                    return false;
                }
            }
            true
        },
        |a, b| a && b,
        Some(|holds: &bool| !*holds),
    )
}

/// Whether `pred` holds for every element. Vacuously true on empty input.
pub fn all_of_on<E, P, T, F>(ex: &E, partitioner: P, data: &[T], pred: F) -> bool
where
    E: Executor + Clone + 'static,
    P: Partitioner,
    T: Sync,
    F: Fn(&T) -> bool + Sync,
{
    every_on(ex, partitioner, data, pred)
}

/// [`all_of_on`] with the default executor and partitioner.
pub fn all_of<T, F>(data: &[T], pred: F) -> bool
where
    T: Sync,
    F: Fn(&T) -> bool + Sync,
{
    all_of_on(default_executor(), default_partitioner(data.len()), data, pred)
}

/// Whether `pred` holds for at least one element. False on empty input.
pub fn any_of_on<E, P, T, F>(ex: &E, partitioner: P, data: &[T], pred: F) -> bool
where
    E: Executor + Clone + 'static,
    P: Partitioner,
    T: Sync,
    F: Fn(&T) -> bool + Sync,
{
    !every_on(ex, partitioner, data, |item| !pred(item))
}

/// [`any_of_on`] with the default executor and partitioner.
pub fn any_of<T, F>(data: &[T], pred: F) -> bool
where
    T: Sync,
    F: Fn(&T) -> bool + Sync,
{
    any_of_on(default_executor(), default_partitioner(data.len()), data, pred)
}

/// Whether `pred` holds for no element. Vacuously true on empty input.
pub fn none_of_on<E, P, T, F>(ex: &E, partitioner: P, data: &[T], pred: F) -> bool
where
    E: Executor + Clone + 'static,
    P: Partitioner,
    T: Sync,
    F: Fn(&T) -> bool + Sync,
{
    every_on(ex, partitioner, data, |item| !pred(item))
}

/// [`none_of_on`] with the default executor and partitioner.
pub fn none_of<T, F>(data: &[T], pred: F) -> bool
where
    T: Sync,
    F: Fn(&T) -> bool + Sync,
{
    none_of_on(default_executor(), default_partitioner(data.len()), data, pred)
}
