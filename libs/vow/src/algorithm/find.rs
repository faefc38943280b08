// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! `find_if` and friends.
//!
//! Chunks race each other, so the *leftmost* match has to be recovered
//! after the fact: every leaf carries a positional branch code (left forks
//! clear a bit, right forks set it, one bit per level), and candidates are
//! merged by numeric branch order. The 64-bit code bounds the recursion
//! depth; the skeleton stops splitting past that, far beyond what any
//! partitioner grain allows in practice.
//!
//! These algorithms do not raise the early-exit flag: a match found in one
//! chunk says nothing about chunks to its left, so every chunk scans fully
//! and the leftmost candidate wins at the join.

use super::{Partitioner, SerialInput, bisect, default_partitioner};
use crate::executor::{Executor, default_executor};
use crate::loom::Arc;

/// A candidate match: the element's index and its leaf's branch code.
#[derive(Copy, Clone, Debug)]
struct Candidate {
    found: Option<usize>,
    branch: u64,
}

fn leftmost(a: Candidate, b: Candidate) -> Candidate {
    match (a.found, b.found) {
        (Some(_), Some(_)) => {
            if a.branch <= b.branch {
                a
            } else {
                b
            }
        }
        (Some(_), None) => a,
        (None, Some(_)) => b,
        (None, None) => a,
    }
}

/// Index of the leftmost element satisfying `pred`.
pub fn find_if_on<E, P, T, F>(ex: &E, partitioner: P, data: &[T], pred: F) -> Option<usize>
where
    E: Executor + Clone + 'static,
    P: Partitioner,
    T: Sync,
    F: Fn(&T) -> bool + Sync,
{
    let exec: Arc<dyn Executor> = Arc::new(ex.clone());
    let candidate = bisect(
        &exec,
        partitioner,
        data,
        |input: SerialInput<'_, T>| {
            let found = input
                .chunk
                .iter()
                .position(|item| pred(item))
                .map(|i| input.offset + i);
            Candidate {
                found,
                branch: input.branch,
            }
        },
        leftmost,
        None,
    );
    candidate.found
}

/// [`find_if_on`] with the default executor and partitioner.
pub fn find_if<T, F>(data: &[T], pred: F) -> Option<usize>
where
    T: Sync,
    F: Fn(&T) -> bool + Sync,
{
    find_if_on(default_executor(), default_partitioner(data.len()), data, pred)
}

/// Index of the leftmost element *not* satisfying `pred`.
pub fn find_if_not_on<E, P, T, F>(ex: &E, partitioner: P, data: &[T], pred: F) -> Option<usize>
where
    E: Executor + Clone + 'static,
    P: Partitioner,
    T: Sync,
    F: Fn(&T) -> bool + Sync,
{
    find_if_on(ex, partitioner, data, |item| !pred(item))
}

/// [`find_if_not_on`] with the default executor and partitioner.
pub fn find_if_not<T, F>(data: &[T], pred: F) -> Option<usize>
where
    T: Sync,
    F: Fn(&T) -> bool + Sync,
{
    find_if_not_on(default_executor(), default_partitioner(data.len()), data, pred)
}

/// Index of the leftmost element equal to `value`.
pub fn find_on<E, P, T>(ex: &E, partitioner: P, data: &[T], value: &T) -> Option<usize>
where
    E: Executor + Clone + 'static,
    P: Partitioner,
    T: PartialEq + Sync,
{
    find_if_on(ex, partitioner, data, |item| item == value)
}

/// [`find_on`] with the default executor and partitioner.
pub fn find<T>(data: &[T], value: &T) -> Option<usize>
where
    T: PartialEq + Sync,
{
    find_on(default_executor(), default_partitioner(data.len()), data, value)
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use crate::algorithm::HalvePartitioner;
    use crate::executor::{InlineExecutor, ThreadPool};
    use proptest::prelude::*;

    #[test]
    fn finds_the_leftmost_match() {
        let mut data = vec![0u32; 4096];
        data[100] = 1;
        data[4000] = 1;

        let pool = ThreadPool::new(4);
        // a tiny grain forces deep forking, so the race is real
        assert_eq!(
            find_if_on(&pool, HalvePartitioner::new(8), &data, |x| *x == 1),
            Some(100)
        );
        assert_eq!(
            find_if_on(&InlineExecutor, HalvePartitioner::new(8), &data, |x| *x == 1),
            Some(100)
        );
    }

    #[test]
    fn reports_absence() {
        let data: Vec<u32> = (0..1000).collect();
        assert_eq!(find_if(&data, |x| *x > 5000), None);
    }

    #[test]
    fn find_if_not_inverts() {
        let data = vec![2u32, 2, 2, 5, 2];
        assert_eq!(find_if_not(&data, |x| *x == 2), Some(3));
    }

    #[test]
    fn find_matches_values() {
        let data = vec![4u32, 8, 15, 16, 23, 42];
        assert_eq!(find(&data, &16), Some(3));
        assert_eq!(find(&data, &99), None);
    }

    proptest! {
        #[test]
        fn matches_the_serial_position(
            data in prop::collection::vec(0u8..4, 0..300),
            grain in 1usize..32,
        ) {
            let parallel = find_if_on(
                default_executor(),
                HalvePartitioner::new(grain),
                &data,
                |x| *x == 0,
            );
            prop_assert_eq!(parallel, data.iter().position(|x| *x == 0));
        }
    }
}
