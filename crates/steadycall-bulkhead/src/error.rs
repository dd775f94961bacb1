//! Error types for bulkheads.

use std::time::Duration;
use steadycall_core::{InvocationError, TargetKey};

/// Errors returned when a bulkhead does not admit a call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BulkheadError {
    /// Every slot is busy and the wait queue is full.
    #[error("bulkhead `{key}` is full: max concurrent calls ({max_concurrent_calls}) reached")]
    BulkheadFull {
        key: TargetKey,
        /// Configured capacity.
        max_concurrent_calls: usize,
    },
    /// A queued call waited longer than `max_wait_duration`.
    #[error("timed out after {waited:?} waiting for bulkhead `{key}`")]
    Timeout {
        key: TargetKey,
        waited: Duration,
        /// Configured capacity.
        max_concurrent_calls: usize,
    },
}

impl BulkheadError {
    /// The bulkhead that rejected the call.
    pub fn key(&self) -> &TargetKey {
        match self {
            BulkheadError::BulkheadFull { key, .. } | BulkheadError::Timeout { key, .. } => key,
        }
    }
}

/// Result type for bulkhead operations.
pub type Result<T> = std::result::Result<T, BulkheadError>;

// A timed-out wait is still a capacity rejection: nothing was sent.
impl From<BulkheadError> for InvocationError {
    fn from(err: BulkheadError) -> Self {
        match err {
            BulkheadError::BulkheadFull {
                key,
                max_concurrent_calls,
            }
            | BulkheadError::Timeout {
                key,
                max_concurrent_calls,
                ..
            } => InvocationError::BulkheadFull {
                key,
                max_concurrent_calls,
            },
        }
    }
}
