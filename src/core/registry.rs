// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Shared state of a work-stealing pool: the job queues, the sleep protocol of
//! idle workers, and the context of each worker thread.

use super::job::{Job, JoinHandle, Latch};
use super::sync::Status;
use crate::error::Error;
use crate::macros::log_debug;
#[cfg(feature = "log_parallelism")]
use crate::macros::log_info;
use crossbeam_deque::{Injector, Stealer, Worker};
use crossbeam_utils::{Backoff, CachePadded};
use std::cell::RefCell;
use std::rc::Rc;
#[cfg(feature = "log_parallelism")]
use std::sync::atomic::AtomicU64;
use std::sync::atomic::{fence, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How long a worker waiting on a join sleeps before looking for new work to
/// steal.
const PARK_TIMEOUT: Duration = Duration::from_micros(100);

thread_local! {
    /// Context of the worker thread running on this thread, if any.
    static CURRENT_WORKER: RefCell<Option<Rc<WorkerContext>>> = const { RefCell::new(None) };
}

/// State of a worker thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    /// The thread may have new jobs to run.
    Ready,
    /// The pool is shut down and all the queues are drained: the thread must
    /// exit.
    Finished,
}

/// Job queues and synchronization state shared by all the worker threads of a
/// pool, as well as by the handles to its jobs.
pub struct Registry {
    /// Queue of jobs submitted from outside the pool.
    injector: Injector<Job>,
    /// Stealing ends of the workers' local queues.
    stealers: Vec<Stealer<Job>>,
    /// Number of worker threads currently sleeping (or about to).
    num_sleeping: CachePadded<AtomicUsize>,
    /// Whether the pool is shut down. Idle workers sleep on this status.
    shutdown: Status<bool>,
    /// Per-worker counters.
    #[cfg(feature = "log_parallelism")]
    statistics: Box<[CachePadded<WorkerStatistics>]>,
}

impl Registry {
    /// Creates a registry for the given number of worker threads, returning
    /// the local queue of each worker.
    pub fn new(num_threads: usize) -> (Arc<Self>, Vec<Worker<Job>>) {
        let workers = (0..num_threads)
            .map(|_| Worker::new_lifo())
            .collect::<Vec<_>>();
        let registry = Registry {
            injector: Injector::new(),
            stealers: workers.iter().map(Worker::stealer).collect(),
            num_sleeping: CachePadded::new(AtomicUsize::new(0)),
            shutdown: Status::new(false),
            #[cfg(feature = "log_parallelism")]
            statistics: (0..num_threads)
                .map(|_| CachePadded::new(WorkerStatistics::default()))
                .collect(),
        };
        (Arc::new(registry), workers)
    }

    /// Returns the number of worker threads.
    pub fn num_threads(&self) -> usize {
        self.stealers.len()
    }

    /// Queues the given function for execution and returns a handle to its
    /// result.
    ///
    /// On a worker thread of this pool, the job is pushed to the worker's local
    /// queue, where it is executed next by this worker unless another worker
    /// steals it first. Otherwise it is pushed to the shared queue, which fails
    /// once the pool is shut down.
    pub fn spawn<F, T>(self: &Arc<Self>, f: F) -> Result<JoinHandle<T>, Error>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (job, handle) = Job::new(self, f);
        match current_worker(self) {
            Some(worker) => worker.local.push(job),
            None => {
                // Pushing under the lock orders this submission with the exit
                // decision of the workers.
                let shutdown = self.shutdown.lock();
                if *shutdown {
                    return Err(Error::PoolShutDown);
                }
                self.injector.push(job);
            }
        }
        self.wake_sleeper();
        Ok(handle)
    }

    /// Wakes up one sleeping worker thread, if any.
    fn wake_sleeper(&self) {
        // Pairs with the fence in `sleep()`: either the sleeper sees the new job,
        // or this sees the sleeper.
        fence(Ordering::SeqCst);
        if self.num_sleeping.load(Ordering::SeqCst) != 0 {
            self.shutdown.wake_one();
        }
    }

    /// Returns whether any queue contains a job.
    fn has_work(&self) -> bool {
        !self.injector.is_empty() || self.stealers.iter().any(|stealer| !stealer.is_empty())
    }

    /// Blocks until the given latch is set.
    ///
    /// A worker thread of this pool keeps running jobs in the meantime.
    pub fn wait_until(self: &Arc<Self>, latch: &impl Latch) {
        if latch.probe() {
            return;
        }
        match current_worker(self) {
            Some(worker) => worker.help_until(latch),
            None => latch.wait(),
        }
    }

    /// Puts the calling worker thread to sleep until there is new work or the
    /// pool is shut down.
    fn sleep(&self, _worker_id: usize) -> WorkerState {
        #[cfg(feature = "log_parallelism")]
        self.statistics[_worker_id]
            .sleeps
            .fetch_add(1, Ordering::Relaxed);

        self.num_sleeping.fetch_add(1, Ordering::SeqCst);
        fence(Ordering::SeqCst);

        let guard = self
            .shutdown
            .wait_while(|shutdown| !*shutdown && !self.has_work());
        let state = if *guard && !self.has_work() {
            WorkerState::Finished
        } else {
            WorkerState::Ready
        };
        drop(guard);

        self.num_sleeping.fetch_sub(1, Ordering::SeqCst);
        state
    }

    /// Stops accepting jobs from outside the pool, and lets the worker threads
    /// exit once all the queues are drained.
    pub fn shutdown(&self) {
        log_debug!("[main thread] Notifying threads to finish...");
        self.shutdown.notify_all(true);
    }

    /// Returns whether the pool is shut down.
    pub fn is_shut_down(&self) -> bool {
        *self.shutdown.lock()
    }

    /// Logs the counters of each worker thread.
    #[cfg(feature = "log_parallelism")]
    pub fn print_statistics(&self) {
        for (id, statistics) in self.statistics.iter().enumerate() {
            log_info!(
                "[thread {id}] Executed {} jobs ({} stolen), slept {} times",
                statistics.executed.load(Ordering::Relaxed),
                statistics.stolen.load(Ordering::Relaxed),
                statistics.sleeps.load(Ordering::Relaxed),
            );
        }
    }
}

/// Counters of the activity of a worker thread.
#[cfg(feature = "log_parallelism")]
#[derive(Default)]
struct WorkerStatistics {
    /// Number of jobs executed.
    executed: AtomicU64,
    /// Number of jobs stolen from the shared queue or from other workers.
    stolen: AtomicU64,
    /// Number of times the worker went to sleep.
    sleeps: AtomicU64,
}

/// Returns the context of the current thread if it is a worker of the given
/// pool.
pub(crate) fn current_worker(registry: &Arc<Registry>) -> Option<Rc<WorkerContext>> {
    CURRENT_WORKER.with(|current| {
        current
            .borrow()
            .as_ref()
            .filter(|worker| Arc::ptr_eq(&worker.registry, registry))
            .cloned()
    })
}

/// Context owned by a worker thread.
pub struct WorkerContext {
    /// Thread index.
    id: usize,
    /// Pool that this thread belongs to.
    registry: Arc<Registry>,
    /// Local queue of jobs forked by this thread.
    local: Worker<Job>,
}

impl WorkerContext {
    /// Creates the context of the worker thread with the given index.
    pub fn new(id: usize, registry: Arc<Registry>, local: Worker<Job>) -> Self {
        Self {
            id,
            registry,
            local,
        }
    }

    /// Main function run by this thread: runs jobs until the pool is shut down
    /// and drained.
    pub fn run(self) {
        let id = self.id;
        let worker = Rc::new(self);
        CURRENT_WORKER.with(|current| *current.borrow_mut() = Some(worker.clone()));

        let backoff = Backoff::new();
        loop {
            if let Some(job) = worker.find_job() {
                job.run();
                backoff.reset();
            } else if !backoff.is_completed() {
                backoff.snooze();
            } else {
                log_debug!("[thread {id}] Going to sleep");
                match worker.registry.sleep(id) {
                    WorkerState::Ready => backoff.reset(),
                    WorkerState::Finished => break,
                }
            }
        }

        log_debug!("[thread {id}] Received finish signal");
        CURRENT_WORKER.with(|current| *current.borrow_mut() = None);
    }

    /// Runs queued jobs until the latch is set.
    fn help_until(&self, latch: &impl Latch) {
        let backoff = Backoff::new();
        while !latch.probe() {
            if let Some(job) = self.find_job() {
                job.run();
                backoff.reset();
            } else if !backoff.is_completed() {
                backoff.snooze();
            } else {
                latch.park(PARK_TIMEOUT);
            }
        }
    }

    /// Pops a job from the local queue, or steals one.
    fn find_job(&self) -> Option<Job> {
        let job = self.local.pop().or_else(|| self.steal());
        #[cfg(feature = "log_parallelism")]
        if job.is_some() {
            self.registry.statistics[self.id]
                .executed
                .fetch_add(1, Ordering::Relaxed);
        }
        job
    }

    /// Steals a batch of jobs from the shared queue, or else one job from
    /// another worker, starting with the next one to avoid all the threads
    /// targeting the same victim.
    fn steal(&self) -> Option<Job> {
        let stealers = &self.registry.stealers;
        let num_threads = stealers.len();
        let job = std::iter::repeat_with(|| {
            self.registry
                .injector
                .steal_batch_and_pop(&self.local)
                .or_else(|| {
                    (1..num_threads)
                        .map(|offset| stealers[(self.id + offset) % num_threads].steal())
                        .collect()
                })
        })
        .find(|steal| !steal.is_retry())
        .and_then(|steal| steal.success());

        #[cfg(feature = "log_parallelism")]
        if job.is_some() {
            self.registry.statistics[self.id]
                .stolen
                .fetch_add(1, Ordering::Relaxed);
        }
        job
    }
}
