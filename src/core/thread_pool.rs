// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A fork-join thread pool with work stealing.

use super::job::JoinHandle;
use super::registry::{current_worker, Registry, WorkerContext};
use crate::error::Error;
use crate::macros::{log_debug, log_error, log_warn};
// Platforms that support `libc::sched_setaffinity()`.
#[cfg(all(
    not(miri),
    any(
        target_os = "android",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "linux"
    )
))]
use nix::{
    sched::{sched_setaffinity, CpuSet},
    unistd::Pid,
};
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle as ThreadJoinHandle;

/// Number of threads to spawn in a thread pool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ThreadCount {
    /// Spawn the number of threads returned by
    /// [`std::thread::available_parallelism()`], or a single thread if it
    /// cannot be determined.
    #[default]
    AvailableParallelism,
    /// Spawn the given number of threads.
    Count(NonZeroUsize),
}

impl ThreadCount {
    /// Resolves the number of threads to spawn.
    pub fn count(self) -> NonZeroUsize {
        match self {
            ThreadCount::AvailableParallelism => {
                std::thread::available_parallelism().unwrap_or_else(|_e| {
                    log_warn!("Getting the available parallelism failed: {_e}");
                    NonZeroUsize::MIN
                })
            }
            ThreadCount::Count(count) => count,
        }
    }
}

impl TryFrom<usize> for ThreadCount {
    type Error = <NonZeroUsize as TryFrom<usize>>::Error;

    fn try_from(thread_count: usize) -> Result<Self, Self::Error> {
        let count = NonZeroUsize::try_from(thread_count)?;
        Ok(ThreadCount::Count(count))
    }
}

/// Policy to pin worker threads to CPUs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CpuPinningPolicy {
    /// Don't pin worker threads to CPUs.
    #[default]
    No,
    /// Pin each worker thread to a CPU, if CPU pinning is supported and
    /// implemented on this platform.
    IfSupported,
    /// Pin each worker thread to a CPU. If CPU pinning isn't supported on this
    /// platform (or not implemented), building a thread pool will panic.
    Always,
}

/// A builder for [`ForkJoinPool`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ForkJoinPoolBuilder {
    /// Number of worker threads to spawn in the pool.
    pub num_threads: ThreadCount,
    /// Policy to pin worker threads to CPUs.
    pub cpu_pinning: CpuPinningPolicy,
}

impl ForkJoinPoolBuilder {
    /// Spawns a thread pool.
    ///
    /// ```
    /// # use forkreduce::{CpuPinningPolicy, ForkJoinPoolBuilder, ThreadCount};
    /// let pool = ForkJoinPoolBuilder {
    ///     num_threads: ThreadCount::AvailableParallelism,
    ///     cpu_pinning: CpuPinningPolicy::No,
    /// }
    /// .build();
    ///
    /// let input = (1..=10).collect::<Vec<u64>>();
    /// assert_eq!(pool.sum(input).unwrap(), 5 * 11);
    /// ```
    pub fn build(&self) -> ForkJoinPool {
        ForkJoinPool::new(self)
    }
}

/// A fixed-size pool of worker threads executing fork-join tasks.
///
/// Each worker owns a local queue of tasks. Tasks submitted from a worker
/// thread (i.e. forked by another task) go to that worker's queue, tasks
/// submitted from any other thread go to a shared queue, and idle workers
/// steal from the shared queue and from each other.
///
/// Dropping the pool stops accepting submissions from outside the pool, waits
/// until all the queued tasks have run, and joins the worker threads.
pub struct ForkJoinPool {
    /// Queues and synchronization state shared with the worker threads.
    registry: Arc<Registry>,
    /// Handles to all the worker threads in the pool.
    threads: Vec<WorkerThreadHandle>,
}

/// Handle to a worker thread in a thread pool.
struct WorkerThreadHandle {
    /// Thread handle object.
    handle: ThreadJoinHandle<()>,
}

impl ForkJoinPool {
    /// Creates a new thread pool using the given parameters.
    fn new(builder: &ForkJoinPoolBuilder) -> Self {
        let num_threads: usize = builder.num_threads.count().into();
        let cpu_pinning = builder.cpu_pinning;
        let (registry, workers) = Registry::new(num_threads);

        #[cfg(any(
            miri,
            not(any(
                target_os = "android",
                target_os = "dragonfly",
                target_os = "freebsd",
                target_os = "linux"
            ))
        ))]
        match cpu_pinning {
            CpuPinningPolicy::No => (),
            CpuPinningPolicy::IfSupported => {
                log_warn!("Pinning threads to CPUs is not implemented on this platform.")
            }
            CpuPinningPolicy::Always => {
                panic!("Pinning threads to CPUs is not implemented on this platform.")
            }
        }

        let threads = workers
            .into_iter()
            .enumerate()
            .map(|(id, local)| {
                let context = WorkerContext::new(id, registry.clone(), local);
                WorkerThreadHandle {
                    handle: std::thread::spawn(move || {
                        pin_current_thread(id, cpu_pinning);
                        context.run()
                    }),
                }
            })
            .collect();
        log_debug!("[main thread] Spawned threads");

        Self { registry, threads }
    }

    /// Returns a lazily initialized pool shared by the whole process, with one
    /// worker thread per available CPU.
    ///
    /// This pool is never shut down.
    pub fn global() -> &'static ForkJoinPool {
        static GLOBAL: OnceLock<ForkJoinPool> = OnceLock::new();
        GLOBAL.get_or_init(|| ForkJoinPoolBuilder::default().build())
    }

    /// Returns the number of worker threads that have been spawned in this
    /// thread pool.
    pub fn num_threads(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.registry.num_threads()).unwrap_or(NonZeroUsize::MIN)
    }

    /// Queues the given function for execution on the pool, without waiting
    /// for it.
    ///
    /// The returned handle allows to wait for the function's output with
    /// [`JoinHandle::join()`]. Fails with [`Error::PoolShutDown`] if called
    /// from outside the pool after [`shutdown()`](Self::shutdown).
    pub fn submit<F, T>(&self, f: F) -> Result<JoinHandle<T>, Error>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.registry.spawn(f)
    }

    /// Executes the given function on the pool and waits for its output.
    ///
    /// ```
    /// # use forkreduce::ForkJoinPoolBuilder;
    /// let pool = ForkJoinPoolBuilder::default().build();
    /// assert_eq!(pool.invoke(|| 6 * 7), Ok(42));
    /// ```
    pub fn invoke<F, T>(&self, f: F) -> Result<T, Error>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.submit(f)?.join()
    }

    /// Runs both functions, potentially in parallel, and returns both outputs.
    ///
    /// The second function is forked onto the pool while the first one runs on
    /// the calling thread. If either function panics, this returns
    /// [`Error::TaskFault`] (in which case the other output is discarded).
    ///
    /// ```
    /// # use forkreduce::ForkJoinPoolBuilder;
    /// let pool = ForkJoinPoolBuilder::default().build();
    /// let input = (0..=1000).collect::<Vec<u64>>();
    /// let (left, right) = input.split_at(input.len() / 2);
    /// let (left, right) = (left.to_vec(), right.to_vec());
    /// let (a, b) = pool
    ///     .join(
    ///         move || left.iter().sum::<u64>(),
    ///         move || right.iter().sum::<u64>(),
    ///     )
    ///     .unwrap();
    /// assert_eq!(a + b, 500 * 1001);
    /// ```
    pub fn join<A, B, RA, RB>(&self, oper_a: A, oper_b: B) -> Result<(RA, RB), Error>
    where
        A: FnOnce() -> RA + Send + 'static,
        B: FnOnce() -> RB + Send + 'static,
        RA: Send + 'static,
        RB: Send + 'static,
    {
        let handle_b = self.submit(oper_b)?;
        let a = panic::catch_unwind(AssertUnwindSafe(oper_a)).map_err(Error::from_panic)?;
        let b = handle_b.join()?;
        Ok((a, b))
    }

    /// Stops accepting submissions from outside the pool.
    ///
    /// Tasks already queued still run to completion, and tasks running on the
    /// pool can still fork new tasks. The worker threads exit once all the
    /// queues are drained.
    pub fn shutdown(&self) {
        self.registry.shutdown();
    }

    /// Returns whether [`shutdown()`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.registry.is_shut_down()
    }

    /// Returns the registry, to fork tasks onto this pool.
    pub(crate) fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }
}

impl Drop for ForkJoinPool {
    /// Joins all the threads in the pool.
    #[allow(clippy::single_match, clippy::unused_enumerate_index)]
    fn drop(&mut self) {
        self.registry.shutdown();

        // A thread cannot join itself. The workers still exit on their own once
        // the queues are drained.
        if current_worker(&self.registry).is_some() {
            log_warn!("[worker thread] Pool dropped from one of its own tasks, detaching threads");
            self.threads.clear();
            return;
        }

        log_debug!("[main thread] Joining threads in the pool...");
        for (_i, t) in self.threads.drain(..).enumerate() {
            let result = t.handle.join();
            match result {
                Ok(_) => log_debug!("[main thread] Thread {_i} joined with result: {result:?}"),
                Err(_) => log_error!("[main thread] Thread {_i} joined with result: {result:?}"),
            }
        }
        log_debug!("[main thread] Joined threads.");

        #[cfg(feature = "log_parallelism")]
        self.registry.print_statistics();
    }
}

/// Pins the current worker thread to the CPU with the same index, according to
/// the given policy.
#[cfg(all(
    not(miri),
    any(
        target_os = "android",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "linux"
    )
))]
fn pin_current_thread(id: usize, cpu_pinning: CpuPinningPolicy) {
    match cpu_pinning {
        CpuPinningPolicy::No => (),
        CpuPinningPolicy::IfSupported => {
            let mut cpu_set = CpuSet::new();
            if let Err(_e) = cpu_set.set(id) {
                log_warn!("Failed to set CPU affinity for thread #{id}: {_e}");
            } else if let Err(_e) = sched_setaffinity(Pid::from_raw(0), &cpu_set) {
                log_warn!("Failed to set CPU affinity for thread #{id}: {_e}");
            } else {
                log_debug!("Pinned thread #{id} to CPU #{id}");
            }
        }
        CpuPinningPolicy::Always => {
            let mut cpu_set = CpuSet::new();
            if let Err(e) = cpu_set.set(id) {
                panic!("Failed to set CPU affinity for thread #{id}: {e}");
            } else if let Err(e) = sched_setaffinity(Pid::from_raw(0), &cpu_set) {
                panic!("Failed to set CPU affinity for thread #{id}: {e}");
            } else {
                log_debug!("Pinned thread #{id} to CPU #{id}");
            }
        }
    }
}

#[cfg(any(
    miri,
    not(any(
        target_os = "android",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "linux"
    ))
))]
fn pin_current_thread(_id: usize, _cpu_pinning: CpuPinningPolicy) {}
