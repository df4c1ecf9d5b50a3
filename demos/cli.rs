// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! CLI tool to time parallel reductions.

use clap::{Parser, ValueEnum};
use forkreduce::{CpuPinningPolicy, ForkJoinPoolBuilder, Strategy, Sum, ThreadCount};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;
use std::hint::black_box;
use std::num::NonZeroUsize;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let pool = ForkJoinPoolBuilder {
        num_threads: match cli.num_threads {
            Some(num_threads) => ThreadCount::Count(num_threads),
            None => ThreadCount::AvailableParallelism,
        },
        cpu_pinning: if cli.pin_threads {
            CpuPinningPolicy::IfSupported
        } else {
            CpuPinningPolicy::No
        },
    }
    .build();

    let strategy = match cli.strategy {
        StrategyCli::Recursive => Strategy::Recursive {
            threshold: cli.threshold,
        },
        StrategyCli::Chunked => Strategy::Chunked {
            partitions: cli.partitions,
        },
    };

    let input: Arc<[u64]> = match cli.input {
        InputCli::Sequence => (1..=cli.input_size).collect(),
        InputCli::Random => {
            let mut rng = ChaCha12Rng::seed_from_u64(cli.seed);
            (0..cli.input_size)
                .map(|_| rng.random_range(0..1_000_000))
                .collect()
        }
    };
    println!(
        "Reducing {} items on {} threads with {strategy:?}",
        input.len(),
        pool.num_threads()
    );

    for i in 0..cli.repeat {
        let start = Instant::now();
        match pool.reduce(black_box(input.clone()), strategy, Sum::new()) {
            Ok(sum) => println!("[run {i}] sum = {sum} ({:?})", start.elapsed()),
            Err(e) => {
                eprintln!("[run {i}] reduction failed: {e}");
                return ExitCode::FAILURE;
            }
        }
    }
    ExitCode::SUCCESS
}

/// CLI tool to time parallel reductions.
#[derive(Parser, Debug, PartialEq, Eq)]
#[command(version)]
struct Cli {
    /// Number of worker threads. Default to the available parallelism.
    #[arg(long)]
    num_threads: Option<NonZeroUsize>,

    /// Whether to pin worker threads to CPUs.
    #[arg(long, default_value_t = false)]
    pin_threads: bool,

    /// Policy to split the input into tasks.
    #[arg(long, value_enum, default_value_t = StrategyCli::Recursive)]
    strategy: StrategyCli,

    /// Size below which ranges are reduced sequentially. Used only for the
    /// recursive strategy.
    #[arg(long, default_value_t = forkreduce::DEFAULT_THRESHOLD)]
    threshold: usize,

    /// Number of chunks. Used only for the chunked strategy.
    #[arg(long, default_value_t = 4)]
    partitions: usize,

    /// Input to reduce.
    #[arg(long, value_enum, default_value_t = InputCli::Sequence)]
    input: InputCli,

    /// Number of items in the input.
    #[arg(long, default_value_t = 10_000_000)]
    input_size: u64,

    /// Seed of the random input.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Number of times to run the reduction.
    #[arg(long, default_value_t = 1)]
    repeat: usize,
}

/// Policy to split the input into tasks.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum StrategyCli {
    /// Recursively split ranges in halves down to a threshold.
    Recursive,
    /// Split the input into a fixed number of chunks.
    Chunked,
}

/// Input to reduce.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum InputCli {
    /// The integers from 1 to the input size.
    Sequence,
    /// Uniformly random integers below one million, from a seeded generator.
    Random,
}
