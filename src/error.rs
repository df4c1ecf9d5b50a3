// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Errors returned by the reduction engine.

use std::any::Any;
use thiserror::Error;

/// Errors that can abort a reduction.
///
/// A fault anywhere in a task tree aborts the whole top-level computation:
/// results already computed by sibling tasks are discarded, never combined
/// with a faulted one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The input couldn't be partitioned as requested.
    #[error("invalid range: {0}")]
    InvalidRange(String),
    /// The recursive strategy was configured with a zero threshold.
    #[error("invalid threshold: the threshold must be at least 1")]
    InvalidThreshold,
    /// A task panicked while executing.
    #[error("task fault: {message}")]
    TaskFault {
        /// Message extracted from the panic payload.
        message: String,
    },
    /// The pool doesn't accept new submissions because it is shutting down.
    #[error("the thread pool is shut down")]
    PoolShutDown,
}

impl Error {
    /// Converts the payload of a caught panic into a [`Error::TaskFault`].
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "task panicked with a non-string payload".to_owned()
        };
        Error::TaskFault { message }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_from_panic_str() {
        let payload = std::panic::catch_unwind(|| panic!("arithmetic panic")).unwrap_err();
        assert_eq!(
            Error::from_panic(payload),
            Error::TaskFault {
                message: "arithmetic panic".to_owned()
            }
        );
    }

    #[test]
    fn test_from_panic_formatted() {
        let index = 42;
        let payload = std::panic::catch_unwind(|| panic!("fault at index {index}")).unwrap_err();
        assert_eq!(
            Error::from_panic(payload),
            Error::TaskFault {
                message: "fault at index 42".to_owned()
            }
        );
    }

    #[test]
    fn test_from_panic_other_payload() {
        let payload = std::panic::catch_unwind(|| std::panic::panic_any(123_u32)).unwrap_err();
        assert!(matches!(Error::from_panic(payload), Error::TaskFault { .. }));
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Error::InvalidRange("zero partitions".to_owned()).to_string(),
            "invalid range: zero partitions"
        );
        assert_eq!(
            Error::PoolShutDown.to_string(),
            "the thread pool is shut down"
        );
    }
}
