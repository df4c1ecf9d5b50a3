// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Reduction strategies: recursive fork-join, or a fixed number of chunks.

use crate::aggregate;
use crate::core::{ForkJoinPool, JoinHandle};
use crate::error::Error;
use crate::macros::log_debug;
use crate::plan::ChunkSet;
use crate::reduce::{reduce_range, Reduction, Sum};
use crate::task::ForkJoinTask;
use std::ops::Add;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Default size below which the recursive strategy reduces a range
/// sequentially.
pub const DEFAULT_THRESHOLD: usize = 4096;

/// Strategy to split a reduction into tasks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Recursively split the input in halves, until ranges have fewer than
    /// `threshold` items.
    Recursive {
        /// Ranges with fewer items are reduced sequentially. Must be at least 1.
        threshold: usize,
    },
    /// Split the input into `partitions` contiguous chunks of equal size
    /// (except the last ones), each reduced by an independent task.
    Chunked {
        /// Number of chunks. Must be at least 1.
        partitions: usize,
    },
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::Recursive {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl ForkJoinPool {
    /// Reduces the input on this pool with the given strategy.
    ///
    /// Fails with [`Error::InvalidThreshold`] or [`Error::InvalidRange`] if the
    /// strategy has a zero threshold or zero partitions, and with
    /// [`Error::TaskFault`] if the reduction panicked on any item.
    pub fn reduce<T, R>(
        &self,
        input: impl Into<Arc<[T]>>,
        strategy: Strategy,
        reduction: R,
    ) -> Result<R::Output, Error>
    where
        T: Send + Sync + 'static,
        R: Reduction<T>,
    {
        let input = input.into();
        match strategy {
            Strategy::Recursive { threshold } => {
                log_debug!(
                    "[main thread] Reducing {} items recursively with threshold {threshold}",
                    input.len()
                );
                let len = input.len();
                let task = ForkJoinTask::new(self, input, 0..len, threshold, reduction)?;
                self.invoke(move || task.execute())?
            }
            Strategy::Chunked { partitions } => {
                let chunks = ChunkSet::plan(input.len(), partitions)?;
                log_debug!(
                    "[main thread] Reducing {} items in {partitions} chunks of {}",
                    input.len(),
                    chunks.chunk_size()
                );
                let reduction = Arc::new(reduction);
                let handles = chunks
                    .into_iter()
                    .map(|range| {
                        let input = input.clone();
                        let reduction = reduction.clone();
                        self.submit(move || reduce_range(&*reduction, &input, range))
                    })
                    .collect::<Result<Vec<JoinHandle<R::Output>>, Error>>()?;
                panic::catch_unwind(AssertUnwindSafe(|| {
                    aggregate::combine(&*reduction, handles.into_iter().map(JoinHandle::join))
                }))
                .map_err(Error::from_panic)?
            }
        }
    }

    /// Computes the sum of the input with the recursive strategy and the
    /// [`DEFAULT_THRESHOLD`].
    ///
    /// ```
    /// # use forkreduce::ForkJoinPoolBuilder;
    /// let pool = ForkJoinPoolBuilder::default().build();
    /// let input = (1..=100_000).collect::<Vec<u64>>();
    /// assert_eq!(pool.sum(input), Ok(50_000 * 100_001));
    /// ```
    pub fn sum<T>(&self, input: impl Into<Arc<[T]>>) -> Result<T, Error>
    where
        T: Copy + Default + Add<Output = T> + Send + Sync + 'static,
    {
        self.sum_with_threshold(input, DEFAULT_THRESHOLD)
    }

    /// Computes the sum of the input with the recursive strategy and the given
    /// threshold.
    pub fn sum_with_threshold<T>(
        &self,
        input: impl Into<Arc<[T]>>,
        threshold: usize,
    ) -> Result<T, Error>
    where
        T: Copy + Default + Add<Output = T> + Send + Sync + 'static,
    {
        self.reduce(input, Strategy::Recursive { threshold }, Sum::new())
    }

    /// Computes the sum of the input by splitting it into the given number of
    /// chunks.
    pub fn sum_chunked<T>(&self, input: impl Into<Arc<[T]>>, partitions: usize) -> Result<T, Error>
    where
        T: Copy + Default + Add<Output = T> + Send + Sync + 'static,
    {
        self.reduce(input, Strategy::Chunked { partitions }, Sum::new())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::{CpuPinningPolicy, ForkJoinPoolBuilder, ThreadCount};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pool(num_threads: usize) -> ForkJoinPool {
        ForkJoinPoolBuilder {
            num_threads: ThreadCount::try_from(num_threads).unwrap(),
            cpu_pinning: CpuPinningPolicy::No,
        }
        .build()
    }

    /// Reduction that concatenates strings, to check that the combination
    /// order follows the index order even though it isn't commutative.
    struct Concat;

    impl Reduction<char> for Concat {
        type Output = String;

        fn identity(&self) -> String {
            String::new()
        }

        fn accumulate(&self, mut accumulator: String, _index: usize, item: &char) -> String {
            accumulator.push(*item);
            accumulator
        }

        fn combine(&self, mut left: String, right: String) -> String {
            left.push_str(&right);
            left
        }
    }

    #[test]
    fn test_default_strategy() {
        assert_eq!(
            Strategy::default(),
            Strategy::Recursive {
                threshold: DEFAULT_THRESHOLD
            }
        );
    }

    #[test]
    fn test_sum_strategies_agree() {
        let pool = pool(4);
        let input: Arc<[i64]> = (-5_000..10_000).collect();
        let expected = input.iter().sum::<i64>();
        assert_eq!(pool.sum(input.clone()), Ok(expected));
        assert_eq!(pool.sum_with_threshold(input.clone(), 50), Ok(expected));
        assert_eq!(pool.sum_chunked(input.clone(), 1), Ok(expected));
        assert_eq!(pool.sum_chunked(input, 7), Ok(expected));
    }

    #[test]
    fn test_sum_empty_input() {
        let pool = pool(2);
        let input: Vec<u64> = Vec::new();
        assert_eq!(pool.sum(input.clone()), Ok(0));
        assert_eq!(pool.sum_with_threshold(input.clone(), 1), Ok(0));
        assert_eq!(pool.sum_chunked(input.clone(), 1), Ok(0));
        assert_eq!(pool.sum_chunked(input, 16), Ok(0));
    }

    #[test]
    fn test_invalid_strategies() {
        let pool = pool(2);
        let input = vec![1_u64, 2, 3];
        assert_eq!(
            pool.sum_with_threshold(input.clone(), 0),
            Err(Error::InvalidThreshold)
        );
        assert!(matches!(
            pool.sum_chunked(input, 0),
            Err(Error::InvalidRange(_))
        ));
    }

    #[test]
    fn test_non_commutative_order() {
        let pool = pool(4);
        let text = "the quick brown fox jumps over the lazy dog".repeat(100);
        let input = text.chars().collect::<Vec<char>>();
        for strategy in [
            Strategy::Recursive { threshold: 1 },
            Strategy::Recursive { threshold: 16 },
            Strategy::Chunked { partitions: 1 },
            Strategy::Chunked { partitions: 13 },
        ] {
            assert_eq!(pool.reduce(input.clone(), strategy, Concat), Ok(text.clone()));
        }
    }

    #[test]
    fn test_chunked_runs_one_task_per_chunk() {
        /// Reduction counting the leaf reductions that start.
        struct CountLeaves(Arc<AtomicUsize>);

        impl Reduction<u32> for CountLeaves {
            type Output = u64;

            fn identity(&self) -> u64 {
                self.0.fetch_add(1, Ordering::SeqCst);
                0
            }

            fn accumulate(&self, accumulator: u64, _index: usize, item: &u32) -> u64 {
                accumulator + u64::from(*item)
            }

            fn combine(&self, left: u64, right: u64) -> u64 {
                left + right
            }
        }

        let pool = pool(3);
        let counter = Arc::new(AtomicUsize::new(0));
        let input = vec![1_u32; 1000];
        let sum = pool.reduce(
            input,
            Strategy::Chunked { partitions: 8 },
            CountLeaves(counter.clone()),
        );
        assert_eq!(sum, Ok(1000));
        // One identity per chunk, plus one for the aggregation.
        assert_eq!(counter.load(Ordering::SeqCst), 9);
    }
}
