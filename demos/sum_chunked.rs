// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Simple program that computes the sum of a slice split into a fixed number
//! of chunks.

use forkreduce::{CpuPinningPolicy, ForkJoinPoolBuilder, ThreadCount};
use std::hint::black_box;
use std::sync::Arc;
use std::time::Instant;

fn main() {
    let pool = ForkJoinPoolBuilder {
        num_threads: ThreadCount::AvailableParallelism,
        cpu_pinning: CpuPinningPolicy::IfSupported,
    }
    .build();

    let input_size = 200_000_000;

    let input: Arc<[u64]> = (1..=input_size).collect();
    for partitions in [1, 4] {
        let start = Instant::now();
        match pool.sum_chunked(black_box(input.clone()), partitions) {
            Ok(sum) => println!(
                "sum = {sum} with {partitions} partitions ({:?})",
                start.elapsed()
            ),
            Err(e) => eprintln!("reduction failed: {e}"),
        }
    }
}
