// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Partitioning of an input into contiguous chunks.

use crate::error::Error;
use std::ops::Range;

/// An ordered set of disjoint, contiguous ranges covering `0..length` exactly
/// once.
///
/// Every chunk except possibly the trailing ones has the same size
/// `ceil(length / partitions)`. When the chunks don't divide the input evenly,
/// the last non-empty chunk is truncated and any further chunks are empty
/// ranges `length..length`.
///
/// ```
/// # use forkreduce::ChunkSet;
/// let chunks = ChunkSet::plan(10, 3).unwrap();
/// assert_eq!(chunks.chunk_size(), 4);
/// assert_eq!(chunks.ranges(), &[0..4, 4..8, 8..10]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkSet {
    /// Number of items in each full chunk.
    chunk_size: usize,
    /// The chunks, in index order.
    ranges: Vec<Range<usize>>,
}

impl ChunkSet {
    /// Splits `0..length` into `partitions` chunks.
    ///
    /// Fails with [`Error::InvalidRange`] if `partitions` is zero.
    pub fn plan(length: usize, partitions: usize) -> Result<Self, Error> {
        if partitions == 0 {
            return Err(Error::InvalidRange(format!(
                "cannot split {length} elements into 0 partitions"
            )));
        }

        let chunk_size = length.div_ceil(partitions);
        let ranges = (0..partitions)
            .map(|i| {
                let start = i.saturating_mul(chunk_size).min(length);
                let end = (i + 1).saturating_mul(chunk_size).min(length);
                start..end
            })
            .collect();

        Ok(Self { chunk_size, ranges })
    }

    /// Returns the size of a full chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Returns the number of chunks, which is the requested number of
    /// partitions (including empty chunks).
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Always false: a plan has at least one chunk.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Returns the chunk at the given index, if any.
    pub fn get(&self, index: usize) -> Option<&Range<usize>> {
        self.ranges.get(index)
    }

    /// Returns all the chunks, in index order.
    pub fn ranges(&self) -> &[Range<usize>] {
        &self.ranges
    }

    /// Returns an iterator over the chunks, in index order.
    pub fn iter(&self) -> std::slice::Iter<'_, Range<usize>> {
        self.ranges.iter()
    }
}

impl IntoIterator for ChunkSet {
    type Item = Range<usize>;
    type IntoIter = std::vec::IntoIter<Range<usize>>;

    fn into_iter(self) -> Self::IntoIter {
        self.ranges.into_iter()
    }
}

impl<'a> IntoIterator for &'a ChunkSet {
    type Item = &'a Range<usize>;
    type IntoIter = std::slice::Iter<'a, Range<usize>>;

    fn into_iter(self) -> Self::IntoIter {
        self.ranges.iter()
    }
}
