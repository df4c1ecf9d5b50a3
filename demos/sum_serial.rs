// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Simple program that computes the sum of a slice sequentially, with the
//! leaf reducer on the whole input.

use forkreduce::{reduce_range, Sum};
use std::hint::black_box;
use std::time::Instant;

fn main() {
    let input_size = 200_000_000;

    let input = (1..=input_size).collect::<Vec<u64>>();
    let start = Instant::now();
    let sum = reduce_range(&Sum::new(), black_box(&input), 0..input.len());
    println!("sum = {sum} ({:?})", start.elapsed());
}
