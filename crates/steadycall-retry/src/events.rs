use std::time::{Duration, Instant};
use steadycall_core::{FailureKind, InvocationEvent};

/// Events emitted while deciding retries for one logical call.
#[derive(Debug, Clone)]
pub enum RetryEvent {
    /// A retry was scheduled after `delay`.
    Retry {
        retry: String,
        timestamp: Instant,
        /// Retry number, 1 for the first retry.
        attempt: usize,
        delay: Duration,
    },
    /// The call produced a response that is handed back to the caller.
    Success {
        retry: String,
        timestamp: Instant,
        attempts: usize,
    },
    /// A retryable outcome arrived but no attempts were left.
    Exhausted {
        retry: String,
        timestamp: Instant,
        attempts: usize,
    },
    /// A failure that must not be retried, e.g. a response timeout on a
    /// non-idempotent call.
    NotRetried {
        retry: String,
        timestamp: Instant,
        kind: FailureKind,
    },
    /// A retry was skipped because the shared budget ran dry.
    BudgetExhausted {
        retry: String,
        timestamp: Instant,
        attempt: usize,
    },
}

impl InvocationEvent for RetryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RetryEvent::Retry { .. } => "retry",
            RetryEvent::Success { .. } => "success",
            RetryEvent::Exhausted { .. } => "exhausted",
            RetryEvent::NotRetried { .. } => "not_retried",
            RetryEvent::BudgetExhausted { .. } => "budget_exhausted",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RetryEvent::Retry { timestamp, .. }
            | RetryEvent::Success { timestamp, .. }
            | RetryEvent::Exhausted { timestamp, .. }
            | RetryEvent::NotRetried { timestamp, .. }
            | RetryEvent::BudgetExhausted { timestamp, .. } => *timestamp,
        }
    }

    fn source(&self) -> &str {
        match self {
            RetryEvent::Retry { retry, .. }
            | RetryEvent::Success { retry, .. }
            | RetryEvent::Exhausted { retry, .. }
            | RetryEvent::NotRetried { retry, .. }
            | RetryEvent::BudgetExhausted { retry, .. } => retry,
        }
    }
}
