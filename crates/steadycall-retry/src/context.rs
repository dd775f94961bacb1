use crate::config::RetryConfig;
use crate::events::RetryEvent;
use crate::policy::{Outcome, RetryDecision, RetryTrigger};
use std::sync::Arc;
use std::time::Instant;
use steadycall_core::FailureKind;

#[cfg(feature = "metrics")]
use metrics::counter;

/// Retry bookkeeping of one logical call.
///
/// Feed every attempt outcome to [`on_outcome`](Self::on_outcome); it counts
/// attempts per trigger, consults the shared budget and emits events.
#[derive(Debug)]
pub struct RetryContext {
    config: Arc<RetryConfig>,
    retryable: bool,
    attempts: usize,
    result_attempts: usize,
    error_attempts: usize,
    retries: usize,
}

impl RetryContext {
    /// Starts the bookkeeping for a call.
    ///
    /// `retryable` marks idempotent calls and calls explicitly declared
    /// safe to resend.
    pub fn new(config: Arc<RetryConfig>, retryable: bool) -> Self {
        Self {
            config,
            retryable,
            attempts: 0,
            result_attempts: 0,
            error_attempts: 0,
            retries: 0,
        }
    }

    /// Attempts seen so far.
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Retries scheduled so far.
    pub fn retries(&self) -> usize {
        self.retries
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Records the outcome of an attempt and decides what comes next.
    pub fn on_outcome(&mut self, outcome: Outcome) -> RetryDecision {
        self.attempts += 1;
        let policy = &self.config.policy;

        let Some(trigger) = policy.trigger(outcome, self.retryable) else {
            self.finish_without_retry(outcome);
            return RetryDecision::DoNotRetry;
        };

        let attempt = match trigger {
            RetryTrigger::Result => {
                self.result_attempts += 1;
                self.result_attempts
            }
            RetryTrigger::Error => {
                self.error_attempts += 1;
                self.error_attempts
            }
        };

        let wait = match policy.should_retry(attempt, outcome, self.retryable) {
            RetryDecision::Retry { wait } => wait,
            RetryDecision::DoNotRetry => {
                self.emit(RetryEvent::Exhausted {
                    retry: self.config.name.clone(),
                    timestamp: Instant::now(),
                    attempts: self.attempts,
                });

                #[cfg(feature = "tracing")]
                tracing::debug!(retry = %self.config.name, attempts = self.attempts, ?outcome, "retries exhausted");

                #[cfg(feature = "metrics")]
                counter!("retry_calls_total", "retry" => self.config.name.clone(), "result" => "exhausted")
                    .increment(1);

                return RetryDecision::DoNotRetry;
            }
        };

        if let Some(budget) = &self.config.budget {
            if !budget.try_withdraw() {
                self.emit(RetryEvent::BudgetExhausted {
                    retry: self.config.name.clone(),
                    timestamp: Instant::now(),
                    attempt: self.retries + 1,
                });

                #[cfg(feature = "tracing")]
                tracing::warn!(retry = %self.config.name, "retry budget exhausted");

                #[cfg(feature = "metrics")]
                counter!("retry_budget_exhausted_total", "retry" => self.config.name.clone())
                    .increment(1);

                return RetryDecision::DoNotRetry;
            }
        }

        self.retries += 1;
        self.emit(RetryEvent::Retry {
            retry: self.config.name.clone(),
            timestamp: Instant::now(),
            attempt: self.retries,
            delay: wait,
        });

        #[cfg(feature = "tracing")]
        tracing::debug!(
            retry = %self.config.name,
            attempt = self.retries,
            wait_ms = wait.as_millis() as u64,
            ?outcome,
            "scheduling retry"
        );

        #[cfg(feature = "metrics")]
        counter!("retry_attempts_total", "retry" => self.config.name.clone()).increment(1);

        RetryDecision::Retry { wait }
    }

    fn finish_without_retry(&self, outcome: Outcome) {
        let kind = match outcome {
            Outcome::Response(_) if outcome.is_success() => {
                if let Some(budget) = &self.config.budget {
                    budget.deposit();
                }
                self.emit(RetryEvent::Success {
                    retry: self.config.name.clone(),
                    timestamp: Instant::now(),
                    attempts: self.attempts,
                });

                #[cfg(feature = "metrics")]
                counter!("retry_calls_total", "retry" => self.config.name.clone(), "result" => "success")
                    .increment(1);
                return;
            }
            Outcome::Response(_) => FailureKind::Application,
            Outcome::Failure(kind) => kind,
        };

        self.emit(RetryEvent::NotRetried {
            retry: self.config.name.clone(),
            timestamp: Instant::now(),
            kind,
        });

        #[cfg(feature = "tracing")]
        tracing::debug!(retry = %self.config.name, ?kind, retryable = self.retryable, "failure not retried");

        #[cfg(feature = "metrics")]
        counter!("retry_calls_total", "retry" => self.config.name.clone(), "result" => "not_retried")
            .increment(1);
    }

    fn emit(&self, event: RetryEvent) {
        self.config.event_listeners.emit(&event);
    }
}
