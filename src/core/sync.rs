// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Synchronization primitives

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// An ergonomic wrapper around a [`Mutex`]-[`Condvar`] pair.
///
/// The mutex only protects plain state that is never left half-updated, so a
/// poisoned lock is recovered rather than propagated.
pub struct Status<T> {
    mutex: Mutex<T>,
    condvar: Condvar,
}

impl<T> Status<T> {
    /// Creates a new status initialized with the given value.
    pub fn new(t: T) -> Self {
        Self {
            mutex: Mutex::new(t),
            condvar: Condvar::new(),
        }
    }

    /// Locks the status.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets the status to the given value and notifies all waiting threads.
    pub fn notify_all(&self, t: T) {
        *self.lock() = t;
        self.condvar.notify_all();
    }

    /// Wakes up one thread waiting on this status, after synchronizing with
    /// the lock so that a thread about to wait cannot miss the notification.
    pub fn wake_one(&self) {
        drop(self.lock());
        self.condvar.notify_one();
    }

    /// Waits until the predicate is false on this status.
    ///
    /// This returns a [`MutexGuard`], allowing to further inspect or modify the
    /// status.
    pub fn wait_while(&self, predicate: impl FnMut(&mut T) -> bool) -> MutexGuard<'_, T> {
        self.condvar
            .wait_while(self.lock(), predicate)
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Waits until the predicate is false on this status, or until the
    /// timeout elapses.
    pub fn wait_timeout_while(
        &self,
        timeout: Duration,
        predicate: impl FnMut(&mut T) -> bool,
    ) -> MutexGuard<'_, T> {
        let (guard, _timeout) = self
            .condvar
            .wait_timeout_while(self.lock(), timeout, predicate)
            .unwrap_or_else(PoisonError::into_inner);
        guard
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn test_status_notify_all() {
        let status = Arc::new(Status::new(false));
        let waiters = (0..4)
            .map(|_| {
                let status = status.clone();
                std::thread::spawn(move || *status.wait_while(|ready| !*ready))
            })
            .collect::<Vec<_>>();

        status.notify_all(true);
        for waiter in waiters {
            assert!(waiter.join().unwrap());
        }
    }

    #[test]
    fn test_status_wait_timeout() {
        let status = Status::new(0);
        let start = Instant::now();
        let guard = status.wait_timeout_while(Duration::from_millis(10), |x| *x == 0);
        assert_eq!(*guard, 0);
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn test_status_recovers_from_poison() {
        let status = Arc::new(Status::new(1));
        let poisoner = status.clone();
        std::thread::spawn(move || {
            let _guard = poisoner.lock();
            panic!("poisoning the lock");
        })
        .join()
        .unwrap_err();

        *status.lock() += 1;
        assert_eq!(*status.lock(), 2);
    }
}
