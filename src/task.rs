// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Recursive divide-and-conquer reduction tasks.

use crate::core::{ForkJoinPool, Registry};
use crate::error::Error;
use crate::reduce::{reduce_range, Reduction};
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A recursive reduction task over a range of a shared input.
///
/// Executing the task either reduces its range sequentially, if the range has
/// fewer items than the threshold, or splits it in two halves: the right half
/// is forked onto the pool as a new task while the left half is executed on
/// the current thread, after which the right half is joined and both results
/// are combined. This bounds the number of forked tasks awaiting a join to the
/// recursion depth, `log2(len / threshold)`.
///
/// All the tasks split from the same root share an abort flag, raised when any
/// of them faults. Tasks that start afterwards neither split nor reduce, so a
/// faulted reduction stops occupying the pool shortly after its error is
/// returned.
///
/// ```
/// # use forkreduce::{ForkJoinPoolBuilder, ForkJoinTask, Sum};
/// # use std::sync::Arc;
/// let pool = ForkJoinPoolBuilder::default().build();
/// let input: Arc<[u64]> = (1..=1000).collect();
/// let task = ForkJoinTask::new(&pool, input, 0..1000, 50, Sum::new()).unwrap();
/// assert_eq!(pool.invoke(move || task.execute()), Ok(Ok(500 * 1001)));
/// ```
pub struct ForkJoinTask<T, R> {
    /// Pool to fork sub-tasks onto.
    registry: Arc<Registry>,
    /// Input shared by all the tasks.
    input: Arc<[T]>,
    /// Range of the input reduced by this task.
    range: Range<usize>,
    /// Ranges with fewer items are reduced sequentially.
    threshold: usize,
    /// Operator to reduce items with.
    reduction: Arc<R>,
    /// Raised when any task of the tree faulted.
    aborted: Arc<AtomicBool>,
}

impl<T, R> ForkJoinTask<T, R>
where
    T: Send + Sync + 'static,
    R: Reduction<T>,
{
    /// Creates a task reducing the given range of the input, forking
    /// sub-tasks onto the given pool.
    ///
    /// Fails with [`Error::InvalidThreshold`] if the threshold is zero, and
    /// with [`Error::InvalidRange`] if the range isn't included in the input.
    pub fn new(
        pool: &ForkJoinPool,
        input: Arc<[T]>,
        range: Range<usize>,
        threshold: usize,
        reduction: R,
    ) -> Result<Self, Error> {
        if threshold == 0 {
            return Err(Error::InvalidThreshold);
        }
        if range.start > range.end || range.end > input.len() {
            return Err(Error::InvalidRange(format!(
                "range {range:?} isn't included in an input of {} elements",
                input.len()
            )));
        }
        Ok(Self {
            registry: pool.registry().clone(),
            input,
            range,
            threshold,
            reduction: Arc::new(reduction),
            aborted: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Returns the range reduced by this task.
    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    /// Returns the size below which ranges are reduced sequentially.
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Executes this task on the current thread, forking sub-tasks onto the
    /// pool.
    ///
    /// This is meant to run on a worker thread of the pool (e.g. via
    /// [`ForkJoinPool::invoke()`]), but works from any thread.
    ///
    /// If the reduction panics in this task or in any sub-task, this returns
    /// [`Error::TaskFault`] and no partial result. Sub-tasks already forked
    /// aren't awaited in that case: they are detached, and skip their work
    /// when they eventually run.
    pub fn execute(self) -> Result<R::Output, Error> {
        let aborted = self.aborted.clone();
        let result = self.execute_inner();
        if result.is_err() {
            aborted.store(true, Ordering::Relaxed);
        }
        result
    }

    fn execute_inner(self) -> Result<R::Output, Error> {
        // The root of the tree already returns an error, so this output is
        // never combined into a result.
        if self.aborted.load(Ordering::Relaxed) {
            return Ok(self.reduction.identity());
        }

        let len = self.range.len();
        // A single item cannot be split further, whatever the threshold.
        if len < self.threshold || len < 2 {
            return panic::catch_unwind(AssertUnwindSafe(|| {
                reduce_range(&*self.reduction, &self.input, self.range.clone())
            }))
            .map_err(Error::from_panic);
        }

        let (left, right) = self.split();
        let reduction = left.reduction.clone();
        let right = left.registry.spawn(move || right.execute())?;
        let left = left.execute()?;
        let right = right.join()??;
        Ok(reduction.combine(left, right))
    }

    /// Splits this task at the middle of its range. The left task gets the
    /// first `len / 2` items, rounded down.
    fn split(self) -> (Self, Self) {
        let mid = self.range.start + self.range.len() / 2;
        let left = Self {
            registry: self.registry.clone(),
            input: self.input.clone(),
            range: self.range.start..mid,
            threshold: self.threshold,
            reduction: self.reduction.clone(),
            aborted: self.aborted.clone(),
        };
        let right = Self {
            range: mid..self.range.end,
            ..self
        };
        (left, right)
    }
}
