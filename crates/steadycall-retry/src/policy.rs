//! The retry decision.
//!
//! Whether an outcome may be retried depends on one question: could the
//! backend already have processed the request? Rejections by a breaker or a
//! bulkhead and connect failures never reached it, so they are always safe
//! to retry. Response-phase failures may have, so they are only retried for
//! calls that are idempotent or explicitly marked retryable. A response
//! status matching the result predicate is retried for any call.

use crate::backoff::IntervalFunction;
use std::sync::Arc;
use std::time::Duration;
use steadycall_core::{FailureKind, InvocationError, StatusResponse};

/// Decides whether a response status asks for a retry.
pub type ResultPredicate = Arc<dyn Fn(u16) -> bool + Send + Sync>;

/// What one attempt produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A response with this status arrived, successful or not.
    Response(u16),
    /// The attempt failed.
    Failure(FailureKind),
}

impl Outcome {
    /// Classifies an attempt result.
    ///
    /// An [`InvocationError::Application`] error still carries a response,
    /// so it classifies by its status.
    pub fn of<T>(result: &Result<T, InvocationError>) -> Self
    where
        T: StatusResponse,
    {
        match result {
            Ok(response) => Outcome::Response(response.status()),
            Err(InvocationError::Application { status, .. }) => Outcome::Response(*status),
            Err(err) => Outcome::Failure(err.kind()),
        }
    }

    /// True for a successful response.
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Response(status) if status.is_success())
    }
}

/// Result of [`RetryPolicy::should_retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after `wait`.
    Retry { wait: Duration },
    /// Hand the outcome to the caller.
    DoNotRetry,
}

impl RetryDecision {
    pub fn is_retry(&self) -> bool {
        matches!(self, RetryDecision::Retry { .. })
    }
}

/// Which attempt budget a retryable outcome draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryTrigger {
    /// The result predicate matched a response.
    Result,
    /// The attempt failed in a retryable way.
    Error,
}

/// Attempt limits and waits, split between result and error retries.
#[derive(Clone)]
pub struct RetryPolicy {
    pub(crate) max_attempts_on_result: usize,
    pub(crate) max_attempts_on_error: usize,
    pub(crate) result_interval: Arc<dyn IntervalFunction>,
    pub(crate) error_interval: Arc<dyn IntervalFunction>,
    pub(crate) retry_on_result: Option<ResultPredicate>,
}

impl RetryPolicy {
    /// Which budget `outcome` draws from, or `None` when it must not be
    /// retried at all.
    ///
    /// `retryable` is true for idempotent calls and calls explicitly marked
    /// retryable.
    pub fn trigger(&self, outcome: Outcome, retryable: bool) -> Option<RetryTrigger> {
        match outcome {
            Outcome::Response(status) => {
                if self
                    .retry_on_result
                    .as_ref()
                    .is_some_and(|predicate| predicate(status))
                {
                    Some(RetryTrigger::Result)
                } else if retryable && !status.is_success() {
                    Some(RetryTrigger::Error)
                } else {
                    None
                }
            }
            Outcome::Failure(kind) => match kind {
                FailureKind::CircuitOpen
                | FailureKind::BulkheadFull
                | FailureKind::ConnectFailure => Some(RetryTrigger::Error),
                FailureKind::ResponseFailure | FailureKind::Application if retryable => {
                    Some(RetryTrigger::Error)
                }
                FailureKind::ResponseFailure
                | FailureKind::Application
                | FailureKind::NoInstances => None,
            },
        }
    }

    /// Total attempts allowed for outcomes of `trigger`, the first one
    /// included.
    pub fn max_attempts(&self, trigger: RetryTrigger) -> usize {
        match trigger {
            RetryTrigger::Result => self.max_attempts_on_result,
            RetryTrigger::Error => self.max_attempts_on_error,
        }
    }

    /// Decides what to do after `outcome`.
    ///
    /// `attempt` is the number of attempts so far that ended in an outcome
    /// of the same trigger, this one included.
    pub fn should_retry(&self, attempt: usize, outcome: Outcome, retryable: bool) -> RetryDecision {
        match self.trigger(outcome, retryable) {
            Some(trigger) if attempt < self.max_attempts(trigger) => RetryDecision::Retry {
                wait: self.wait(trigger, attempt),
            },
            _ => RetryDecision::DoNotRetry,
        }
    }

    fn wait(&self, trigger: RetryTrigger, attempt: usize) -> Duration {
        let retry_index = attempt.saturating_sub(1);
        match trigger {
            RetryTrigger::Result => self.result_interval.next_interval(retry_index),
            RetryTrigger::Error => self.error_interval.next_interval(retry_index),
        }
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts_on_result", &self.max_attempts_on_result)
            .field("max_attempts_on_error", &self.max_attempts_on_error)
            .field("retry_on_result", &self.retry_on_result.is_some())
            .finish()
    }
}
