// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Reduction operators and the sequential leaf reducer.

use std::marker::PhantomData;
use std::ops::{Add, Range};

/// Trait representing an operator to reduce items into an output.
///
/// Partial outputs of disjoint ranges are merged with
/// [`combine()`](Self::combine). The recursive strategy always combines a left
/// range with the adjacent right range, and the chunked strategy combines
/// chunks in index order, so `combine` must be associative, and
/// [`identity()`](Self::identity) must be neutral for it. Implementations that
/// also want results independent of the task layout with other combination
/// orders must additionally make `combine` commutative.
///
/// Panicking in any of these functions is reported as a
/// [`TaskFault`](crate::Error::TaskFault) to the caller of the reduction.
///
/// ```
/// # use forkreduce::{ForkJoinPoolBuilder, Reduction, Strategy};
/// /// Counts the even items.
/// struct CountEven;
///
/// impl Reduction<u64> for CountEven {
///     type Output = usize;
///
///     fn identity(&self) -> usize {
///         0
///     }
///
///     fn accumulate(&self, accumulator: usize, _index: usize, item: &u64) -> usize {
///         accumulator + (*item % 2 == 0) as usize
///     }
///
///     fn combine(&self, left: usize, right: usize) -> usize {
///         left + right
///     }
/// }
///
/// let pool = ForkJoinPoolBuilder::default().build();
/// let input = (0..1000).collect::<Vec<u64>>();
/// let count = pool
///     .reduce(input, Strategy::Recursive { threshold: 64 }, CountEven)
///     .unwrap();
/// assert_eq!(count, 500);
/// ```
pub trait Reduction<Item>: Send + Sync + 'static {
    /// Type of the partial and final results.
    type Output: Send + 'static;

    /// Returns the result of reducing an empty range.
    fn identity(&self) -> Self::Output;

    /// Accumulates the item at the given index into the accumulator.
    fn accumulate(&self, accumulator: Self::Output, index: usize, item: &Item) -> Self::Output;

    /// Combines the results of two adjacent ranges, `left` preceding `right`.
    fn combine(&self, left: Self::Output, right: Self::Output) -> Self::Output;
}

/// Reduction computing the sum of the items.
///
/// The identity is [`Default::default()`], i.e. zero for the primitive numeric
/// types. Integer overflow follows the arithmetic semantics of the build
/// profile: it is a task fault in debug builds, but silently wraps in release
/// builds, in which case the returned sum is wrong. When the total may not fit
/// in `T`, implement a [`Reduction`] with a wider output type instead:
///
/// ```
/// # use forkreduce::{ForkJoinPoolBuilder, Reduction, Strategy};
/// /// Sums bytes into a `u64`.
/// struct WideSum;
///
/// impl Reduction<u8> for WideSum {
///     type Output = u64;
///
///     fn identity(&self) -> u64 {
///         0
///     }
///
///     fn accumulate(&self, accumulator: u64, _index: usize, item: &u8) -> u64 {
///         accumulator + u64::from(*item)
///     }
///
///     fn combine(&self, left: u64, right: u64) -> u64 {
///         left + right
///     }
/// }
///
/// let pool = ForkJoinPoolBuilder::default().build();
/// let input = vec![u8::MAX; 1000];
/// let sum = pool.reduce(input, Strategy::Chunked { partitions: 4 }, WideSum);
/// assert_eq!(sum, Ok(255_000));
/// ```
pub struct Sum<T> {
    _item: PhantomData<fn() -> T>,
}

impl<T> Sum<T> {
    /// Creates a sum reduction.
    pub fn new() -> Self {
        Self { _item: PhantomData }
    }
}

impl<T> Default for Sum<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Reduction<T> for Sum<T>
where
    T: Copy + Default + Add<Output = T> + Send + 'static,
{
    type Output = T;

    fn identity(&self) -> T {
        T::default()
    }

    fn accumulate(&self, accumulator: T, _index: usize, item: &T) -> T {
        accumulator + *item
    }

    fn combine(&self, left: T, right: T) -> T {
        left + right
    }
}

/// Sequentially reduces the items of `input` in the given range, in index
/// order.
///
/// An empty range yields [`Reduction::identity()`] without reading the input,
/// whatever its bounds. A non-empty range must be included in
/// `0..input.len()`, otherwise this panics.
pub fn reduce_range<Item, R: Reduction<Item> + ?Sized>(
    reduction: &R,
    input: &[Item],
    range: Range<usize>,
) -> R::Output {
    if range.is_empty() {
        return reduction.identity();
    }
    let start = range.start;
    input[range]
        .iter()
        .enumerate()
        .fold(reduction.identity(), |accumulator, (offset, item)| {
            reduction.accumulate(accumulator, start + offset, item)
        })
}
