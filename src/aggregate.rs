// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Combination of the results of independently submitted tasks.

use crate::error::Error;
use crate::reduce::Reduction;

/// Combines the results of consecutive chunks, in order, into a single output.
///
/// All the results are consumed before returning, and the first error (in
/// chunk order) is returned if any chunk failed. An empty sequence yields
/// [`Reduction::identity()`].
pub fn combine<Item, R: Reduction<Item> + ?Sized>(
    reduction: &R,
    results: impl IntoIterator<Item = Result<R::Output, Error>>,
) -> Result<R::Output, Error> {
    let mut accumulator = Ok(reduction.identity());
    for result in results {
        accumulator = match (accumulator, result) {
            (Ok(acc), Ok(output)) => Ok(reduction.combine(acc, output)),
            (Err(e), _) | (Ok(_), Err(e)) => Err(e),
        };
    }
    accumulator
}
