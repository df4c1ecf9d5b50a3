// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Simple program that computes the sum of a slice with recursive fork-join
//! tasks.

use forkreduce::{CpuPinningPolicy, ForkJoinPoolBuilder, ThreadCount};
use std::hint::black_box;
use std::time::Instant;

fn main() {
    let pool = ForkJoinPoolBuilder {
        num_threads: ThreadCount::AvailableParallelism,
        cpu_pinning: CpuPinningPolicy::IfSupported,
    }
    .build();

    let input_size = 200_000_000;
    let threshold = 50;

    let input = (1..=input_size).collect::<Vec<u64>>();
    let start = Instant::now();
    match pool.sum_with_threshold(black_box(input), threshold) {
        Ok(sum) => println!("sum = {sum} ({:?})", start.elapsed()),
        Err(e) => eprintln!("reduction failed: {e}"),
    }
}
