// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

#![doc = include_str!("../README.md")]
#![forbid(missing_docs, unsafe_code)]

mod aggregate;
mod core;
mod error;
mod macros;
mod plan;
mod reduce;
mod strategy;
mod task;

pub use aggregate::combine;
pub use crate::core::{
    CpuPinningPolicy, ForkJoinPool, ForkJoinPoolBuilder, JoinHandle, ThreadCount,
};
pub use error::Error;
pub use plan::ChunkSet;
pub use reduce::{reduce_range, Reduction, Sum};
pub use strategy::{Strategy, DEFAULT_THRESHOLD};
pub use task::ForkJoinTask;

use std::ops::Add;
use std::sync::Arc;

/// Computes the sum of the input on the [global pool](ForkJoinPool::global),
/// with the recursive strategy and the [`DEFAULT_THRESHOLD`].
///
/// ```
/// let input = (1..=1000).collect::<Vec<u64>>();
/// assert_eq!(forkreduce::sum(input), Ok(500 * 1001));
/// ```
pub fn sum<T>(input: impl Into<Arc<[T]>>) -> Result<T, Error>
where
    T: Copy + Default + Add<Output = T> + Send + Sync + 'static,
{
    ForkJoinPool::global().sum(input)
}

/// Computes the sum of the input on the [global pool](ForkJoinPool::global),
/// with the recursive strategy and the given threshold.
pub fn sum_with_threshold<T>(input: impl Into<Arc<[T]>>, threshold: usize) -> Result<T, Error>
where
    T: Copy + Default + Add<Output = T> + Send + Sync + 'static,
{
    ForkJoinPool::global().sum_with_threshold(input, threshold)
}

/// Computes the sum of the input on the [global pool](ForkJoinPool::global),
/// split into the given number of chunks.
pub fn sum_chunked<T>(input: impl Into<Arc<[T]>>, partitions: usize) -> Result<T, Error>
where
    T: Copy + Default + Add<Output = T> + Send + Sync + 'static,
{
    ForkJoinPool::global().sum_chunked(input, partitions)
}
