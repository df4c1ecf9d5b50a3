// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Randomized checks that every strategy and pool size agrees with a
//! sequential fold.

use forkreduce::{
    ChunkSet, CpuPinningPolicy, Error, ForkJoinPool, ForkJoinPoolBuilder, Reduction, Strategy,
    Sum, ThreadCount,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;
use std::sync::Arc;

const NUM_ROUNDS: usize = 50;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn pool(num_threads: usize) -> ForkJoinPool {
    ForkJoinPoolBuilder {
        num_threads: ThreadCount::try_from(num_threads).unwrap(),
        cpu_pinning: CpuPinningPolicy::No,
    }
    .build()
}

fn random_strategy(rng: &mut ChaCha12Rng, len: usize) -> Strategy {
    if rng.random_bool(0.5) {
        Strategy::Recursive {
            threshold: rng.random_range(1..=len.max(1) * 2),
        }
    } else {
        Strategy::Chunked {
            partitions: rng.random_range(1..=len.max(1) * 2),
        }
    }
}

/// Sum that panics on the item at a given index.
struct FaultAt(usize);

impl Reduction<i64> for FaultAt {
    type Output = i64;

    fn identity(&self) -> i64 {
        0
    }

    fn accumulate(&self, accumulator: i64, index: usize, item: &i64) -> i64 {
        if index == self.0 {
            panic!("fault at index {index}");
        }
        accumulator + item
    }

    fn combine(&self, left: i64, right: i64) -> i64 {
        left + right
    }
}

/// Polynomial hash of the items, which depends on their order.
struct OrderedHash;

const HASH_BASE: u64 = 1_000_003;

impl Reduction<u8> for OrderedHash {
    /// Hash and `HASH_BASE` to the power of the number of items.
    type Output = (u64, u64);

    fn identity(&self) -> (u64, u64) {
        (0, 1)
    }

    fn accumulate(&self, (hash, power): (u64, u64), _index: usize, item: &u8) -> (u64, u64) {
        (
            hash.wrapping_mul(HASH_BASE).wrapping_add(u64::from(*item)),
            power.wrapping_mul(HASH_BASE),
        )
    }

    fn combine(
        &self,
        (left, left_power): (u64, u64),
        (right, right_power): (u64, u64),
    ) -> (u64, u64) {
        (
            left.wrapping_mul(right_power).wrapping_add(right),
            left_power.wrapping_mul(right_power),
        )
    }
}

#[test]
fn test_random_sums() {
    init_logger();
    let mut rng = ChaCha12Rng::seed_from_u64(42);
    let pools = [1, 2, 3, 8].map(pool);
    for _ in 0..NUM_ROUNDS {
        let len = rng.random_range(0..20_000);
        let input: Arc<[i64]> = (0..len)
            .map(|_| rng.random_range(-1_000_000..1_000_000))
            .collect();
        let expected = input.iter().sum::<i64>();
        let strategy = random_strategy(&mut rng, len);
        for pool in &pools {
            assert_eq!(
                pool.reduce(input.clone(), strategy, Sum::new()),
                Ok(expected),
                "{strategy:?} on {} threads",
                pool.num_threads()
            );
        }
    }
}

#[test]
fn test_random_order_dependent_reduction() {
    init_logger();
    let mut rng = ChaCha12Rng::seed_from_u64(43);
    let pool = pool(4);
    for _ in 0..NUM_ROUNDS {
        let len = rng.random_range(0..5_000);
        let input: Arc<[u8]> = (0..len).map(|_| rng.random()).collect();
        let expected = input.iter().fold(OrderedHash.identity(), |acc, item| {
            OrderedHash.accumulate(acc, 0, item)
        });
        let strategy = random_strategy(&mut rng, len);
        assert_eq!(
            pool.reduce(input, strategy, OrderedHash),
            Ok(expected),
            "{strategy:?}"
        );
    }
}

#[test]
fn test_random_faults() {
    init_logger();
    let mut rng = ChaCha12Rng::seed_from_u64(44);
    let pools = [1, 4].map(pool);
    for _ in 0..NUM_ROUNDS {
        let len = rng.random_range(1..10_000);
        let input: Arc<[i64]> = (0..len as i64).collect();
        let fault = rng.random_range(0..len);
        let strategy = random_strategy(&mut rng, len);
        for pool in &pools {
            assert_eq!(
                pool.reduce(input.clone(), strategy, FaultAt(fault)),
                Err(Error::TaskFault {
                    message: format!("fault at index {fault}")
                }),
                "{strategy:?} on {} threads",
                pool.num_threads()
            );
        }
    }
}

#[test]
fn test_random_plans() {
    let mut rng = ChaCha12Rng::seed_from_u64(45);
    for _ in 0..1000 {
        let length = rng.random_range(0..100_000);
        let partitions = rng.random_range(1..1_000);
        let chunks = ChunkSet::plan(length, partitions).unwrap();
        assert_eq!(chunks.len(), partitions);
        assert_eq!(chunks.chunk_size(), length.div_ceil(partitions));
        let mut next = 0;
        for range in &chunks {
            assert_eq!(range.start, next);
            assert!(range.end >= range.start);
            assert!(range.len() <= chunks.chunk_size());
            next = range.end;
        }
        assert_eq!(next, length);
    }
}
