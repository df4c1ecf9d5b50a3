// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Units of work queued on the pool, and handles to their results.

use super::registry::Registry;
use super::sync::Status;
use crate::error::Error;
use crate::macros::log_error;
use crossbeam_utils::CachePadded;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// A type-erased unit of work. Running a job never unwinds: panics are
/// captured into the job's result slot.
pub struct Job(Box<dyn FnOnce() + Send>);

impl Job {
    /// Creates a job running the given function, together with a handle to
    /// its future result.
    pub fn new<F, T>(registry: &Arc<Registry>, f: F) -> (Job, JoinHandle<T>)
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let result = Arc::new(JobResult::new());
        let slot = result.clone();
        let job = Job(Box::new(move || {
            let output = panic::catch_unwind(AssertUnwindSafe(f));
            if output.is_err() {
                log_error!("[thread {:?}] A task panicked", thread::current().id());
            }
            slot.complete(output);
        }));
        let handle = JoinHandle {
            result,
            registry: registry.clone(),
        };
        (job, handle)
    }

    /// Runs this job on the current thread.
    pub fn run(self) {
        (self.0)()
    }
}

/// Something a thread can wait on until it is set.
pub trait Latch {
    /// Returns whether the latch is set, without blocking.
    fn probe(&self) -> bool;

    /// Blocks until the latch is set.
    fn wait(&self);

    /// Blocks until the latch is set, or until the timeout elapses.
    fn park(&self, timeout: Duration);
}

/// Result slot of a job, set exactly once when the job completes.
struct JobResult<T> {
    /// Whether the output has been written.
    done: CachePadded<AtomicBool>,
    /// Output of the job, or the payload of its panic.
    output: Status<Option<thread::Result<T>>>,
}

impl<T> JobResult<T> {
    fn new() -> Self {
        Self {
            done: CachePadded::new(AtomicBool::new(false)),
            output: Status::new(None),
        }
    }

    fn complete(&self, output: thread::Result<T>) {
        self.output.notify_all(Some(output));
        self.done.store(true, Ordering::Release);
    }

    fn take(&self) -> thread::Result<T> {
        self.output
            .wait_while(|output| output.is_none())
            .take()
            .expect("a job result is only taken once")
    }
}

impl<T> Latch for JobResult<T> {
    fn probe(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    fn wait(&self) {
        drop(self.output.wait_while(|output| output.is_none()));
    }

    fn park(&self, timeout: Duration) {
        drop(
            self.output
                .wait_timeout_while(timeout, |output| output.is_none()),
        );
    }
}

/// Handle to the result of a task submitted to a
/// [`ForkJoinPool`](crate::ForkJoinPool).
///
/// Dropping the handle detaches the task: it still runs to completion, but its
/// result is discarded.
pub struct JoinHandle<T> {
    /// Slot where the task writes its output.
    result: Arc<JobResult<T>>,
    /// Pool that executes the task.
    registry: Arc<Registry>,
}

impl<T> JoinHandle<T> {
    /// Returns whether the task has completed (successfully or not).
    pub fn is_finished(&self) -> bool {
        self.result.probe()
    }

    /// Waits for the task to complete and returns its output.
    ///
    /// When called from a worker thread of the same pool, the worker keeps
    /// executing other queued tasks while waiting, so that awaiting never
    /// starves the pool, even with a single worker thread.
    ///
    /// If the task panicked, this returns [`Error::TaskFault`].
    pub fn join(self) -> Result<T, Error> {
        self.registry.wait_until(&*self.result);
        self.result.take().map_err(Error::from_panic)
    }
}
