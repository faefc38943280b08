// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use super::{Partitioner, SerialInput, bisect, default_partitioner};
use crate::executor::{Executor, default_executor};
use crate::loom::Arc;

/// Applies `f` to every element, forking per the partitioner.
///
/// There is no ordering guarantee between elements of different chunks, so
/// side effects should commute.
pub fn for_each_on<E, P, T, F>(ex: &E, partitioner: P, data: &[T], f: F)
where
    E: Executor + Clone + 'static,
    P: Partitioner,
    T: Sync,
    F: Fn(&T) + Sync,
{
    let exec: Arc<dyn Executor> = Arc::new(ex.clone());
    bisect(
        &exec,
        partitioner,
        data,
        |input: SerialInput<'_, T>| {
            for item in input.chunk {
                f(item);
            }
        },
        |(), ()| (),
        None,
    );
}

/// [`for_each_on`] with the default executor and partitioner.
pub fn for_each<T, F>(data: &[T], f: F)
where
    T: Sync,
    F: Fn(&T) + Sync,
{
    for_each_on(default_executor(), default_partitioner(data.len()), data, f);
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use crate::algorithm::HalvePartitioner;
    use crate::executor::{InlineExecutor, ThreadPool};
    use crate::loom::atomic::{AtomicU64, Ordering};

    #[test]
    fn visits_every_element() {
        let data: Vec<u64> = (1..=1000).collect();
        let sum = AtomicU64::new(0);

        for_each(&data, |x| {
            sum.fetch_add(*x, Ordering::Relaxed);
        });
        assert_eq!(sum.load(Ordering::Relaxed), 500_500);
    }

    #[test]
    fn aggregate_matches_the_serial_run() {
        let data: Vec<u64> = (0..777).collect();
        let pool = ThreadPool::new(4);

        let parallel = AtomicU64::new(0);
        for_each_on(&pool, HalvePartitioner::new(10), &data, |x| {
            parallel.fetch_add(x * 3, Ordering::Relaxed);
        });

        let serial = AtomicU64::new(0);
        for_each_on(&InlineExecutor, HalvePartitioner::new(10), &data, |x| {
            serial.fetch_add(x * 3, Ordering::Relaxed);
        });

        assert_eq!(
            parallel.load(Ordering::Relaxed),
            serial.load(Ordering::Relaxed)
        );
    }

    #[test]
    fn empty_input_is_a_noop() {
        let data: [u32; 0] = [];
        for_each(&data, |_| panic!("must not be called"));
    }
}
