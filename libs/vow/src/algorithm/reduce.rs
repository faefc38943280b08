// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use super::{Partitioner, SerialInput, bisect, default_partitioner};
use crate::executor::{Executor, default_executor};
use crate::loom::Arc;

/// Folds `data` into `init` with `op`.
///
/// Chunks fold independently and their partial results combine in
/// unspecified order, so `op` must be associative and commutative for a
/// deterministic result (integer addition is; float addition is not, up to
/// rounding).
pub fn reduce_on<E, P, T, Op>(ex: &E, partitioner: P, data: &[T], init: T, op: Op) -> T
where
    E: Executor + Clone + 'static,
    P: Partitioner,
    T: Clone + Send + Sync + 'static,
    Op: Fn(T, T) -> T + Sync,
{
    let exec: Arc<dyn Executor> = Arc::new(ex.clone());
    let partial = bisect(
        &exec,
        partitioner,
        data,
        |input: SerialInput<'_, T>| {
            let mut items = input.chunk.iter().cloned();
            items
                .next()
                .map(|seed| items.fold(seed, |acc, item| op(acc, item)))
        },
        |a, b| match (a, b) {
            (Some(a), Some(b)) => Some(op(a, b)),
            (Some(a), None) => Some(a),
            (None, b) => b,
        },
        None,
    );

    match partial {
        Some(total) => op(init, total),
        None => init,
    }
}

/// [`reduce_on`] with the default executor and partitioner.
pub fn reduce<T, Op>(data: &[T], init: T, op: Op) -> T
where
    T: Clone + Send + Sync + 'static,
    Op: Fn(T, T) -> T + Sync,
{
    reduce_on(default_executor(), default_partitioner(data.len()), data, init, op)
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use crate::algorithm::{HalvePartitioner, ThreadPartitioner};
    use crate::executor::{InlineExecutor, ThreadPool};
    use proptest::prelude::*;

    #[test]
    fn sums_a_range() {
        let data: Vec<u64> = (1..=10_000).collect();
        let pool = ThreadPool::new(4);

        let total = reduce_on(&pool, HalvePartitioner::new(128), &data, 0, |a, b| a + b);
        assert_eq!(total, 50_005_000);

        let total = reduce_on(&InlineExecutor, HalvePartitioner::new(128), &data, 0, |a, b| {
            a + b
        });
        assert_eq!(total, 50_005_000);
    }

    #[test]
    fn init_is_folded_exactly_once() {
        let data = vec![1u64; 64];
        let total = reduce(&data, 1000, |a, b| a + b);
        assert_eq!(total, 1064);
    }

    #[test]
    fn empty_input_yields_init() {
        let data: [u64; 0] = [];
        assert_eq!(reduce(&data, 7, |a, b| a + b), 7);
    }

    #[test]
    fn works_with_the_thread_partitioner() {
        let data: Vec<u64> = (0..5000).collect();
        let pool = ThreadPool::new(4);
        let total = reduce_on(&pool, ThreadPartitioner::new(16), &data, 0, |a, b| a + b);
        assert_eq!(total, data.iter().sum());
    }

    proptest! {
        #[test]
        fn matches_the_serial_fold(
            data in prop::collection::vec(0u64..1000, 0..300),
            grain in 1usize..48,
        ) {
            let total = reduce_on(
                default_executor(),
                HalvePartitioner::new(grain),
                &data,
                0,
                |a, b| a + b,
            );
            prop_assert_eq!(total, data.iter().sum::<u64>());
        }
    }
}
