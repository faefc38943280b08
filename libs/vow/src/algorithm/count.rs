// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use super::{Partitioner, SerialInput, bisect, default_partitioner};
use crate::executor::{Executor, default_executor};
use crate::loom::Arc;

/// Number of elements satisfying `pred`.
pub fn count_if_on<E, P, T, F>(ex: &E, partitioner: P, data: &[T], pred: F) -> usize
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
        |input: SerialInput<'_, T>| input.chunk.iter().filter(|&item| pred(item)).count(),
        |a, b| a + b,
        None,
    )
}

/// [`count_if_on`] with the default executor and partitioner.
pub fn count_if<T, F>(data: &[T], pred: F) -> usize
where
    T: Sync,
    F: Fn(&T) -> bool + Sync,
{
    count_if_on(default_executor(), default_partitioner(data.len()), data, pred)
}

/// Number of elements equal to `value`.
pub fn count_on<E, P, T>(ex: &E, partitioner: P, data: &[T], value: &T) -> usize
where
    E: Executor + Clone + 'static,
    P: Partitioner,
    T: PartialEq + Sync,
{
    count_if_on(ex, partitioner, data, |item| item == value)
}

/// [`count_on`] with the default executor and partitioner.
pub fn count<T>(data: &[T], value: &T) -> usize
where
    T: PartialEq + Sync,
{
    count_on(default_executor(), default_partitioner(data.len()), data, value)
}
