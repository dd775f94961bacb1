use crate::backoff::{ExponentialBackoff, FixedInterval, IntervalFunction, RandomizedInterval};
use crate::budget::RetryBudget;
use crate::events::RetryEvent;
use crate::policy::{ResultPredicate, RetryPolicy};
use crate::status;
use std::sync::Arc;
use std::time::Duration;
use steadycall_core::events::{EventListeners, FnListener};
use steadycall_core::FailureKind;

const DEFAULT_WAIT: Duration = Duration::from_millis(500);

/// Retry configuration of one client.
pub struct RetryConfig {
    pub(crate) policy: RetryPolicy,
    pub(crate) event_listeners: EventListeners<RetryEvent>,
    pub(crate) name: String,
    pub(crate) budget: Option<Arc<dyn RetryBudget>>,
}

impl RetryConfig {
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Name of the client, used in events and logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn budget(&self) -> Option<&Arc<dyn RetryBudget>> {
        self.budget.as_ref()
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfigBuilder::new().build()
    }
}

impl std::fmt::Debug for RetryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryConfig")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("budget", &self.budget.as_ref().map(|b| b.balance()))
            .finish()
    }
}

/// Builder for [`RetryConfig`].
pub struct RetryConfigBuilder {
    max_attempts_on_result: usize,
    max_attempts_on_error: usize,
    result_interval: Option<Arc<dyn IntervalFunction>>,
    error_interval: Option<Arc<dyn IntervalFunction>>,
    retry_on_result: Option<Arc<dyn Fn(u16) -> bool + Send + Sync>>,
    retry_signal_statuses: bool,
    event_listeners: EventListeners<RetryEvent>,
    name: String,
    budget: Option<Arc<dyn RetryBudget>>,
}

impl RetryConfigBuilder {
    /// Creates a builder with defaults.
    ///
    /// Defaults:
    /// - max attempts: 3 for both results and errors, the first attempt included
    /// - wait: fixed 500ms
    /// - results are never retried
    /// - retry signal statuses are not recognised
    /// - no budget
    pub fn new() -> Self {
        Self {
            max_attempts_on_result: 3,
            max_attempts_on_error: 3,
            result_interval: None,
            error_interval: None,
            retry_on_result: None,
            retry_signal_statuses: false,
            event_listeners: EventListeners::new(),
            name: "default".to_string(),
            budget: None,
        }
    }

    /// Maximum attempts for both result and error retries.
    ///
    /// Includes the first attempt, so `3` means at most two retries.
    pub fn max_attempts(mut self, max_attempts: usize) -> Self {
        let max_attempts = max_attempts.max(1);
        self.max_attempts_on_result = max_attempts;
        self.max_attempts_on_error = max_attempts;
        self
    }

    /// Maximum attempts when the result predicate asks for a retry.
    pub fn max_attempts_on_result(mut self, max_attempts: usize) -> Self {
        self.max_attempts_on_result = max_attempts.max(1);
        self
    }

    /// Maximum attempts when attempts fail.
    pub fn max_attempts_on_error(mut self, max_attempts: usize) -> Self {
        self.max_attempts_on_error = max_attempts.max(1);
        self
    }

    /// Fixed wait before every retry.
    ///
    /// Default: 500ms
    pub fn wait_duration(self, wait: Duration) -> Self {
        self.backoff(FixedInterval::new(wait))
    }

    /// Fixed wait with jitter: each wait is drawn from
    /// `wait * (1 ± randomization_factor / 2)`.
    pub fn randomized_wait(self, wait: Duration, randomization_factor: f64) -> Self {
        self.backoff(RandomizedInterval::new(
            FixedInterval::new(wait),
            randomization_factor,
        ))
    }

    /// Exponential backoff doubling from `initial_interval`.
    pub fn exponential_backoff(self, initial_interval: Duration) -> Self {
        self.backoff(ExponentialBackoff::new(initial_interval))
    }

    /// Interval function for both result and error retries.
    pub fn backoff<I>(mut self, interval_fn: I) -> Self
    where
        I: IntervalFunction + 'static,
    {
        let interval_fn: Arc<dyn IntervalFunction> = Arc::new(interval_fn);
        self.result_interval = Some(Arc::clone(&interval_fn));
        self.error_interval = Some(interval_fn);
        self
    }

    /// Interval function for result retries only.
    pub fn result_backoff<I>(mut self, interval_fn: I) -> Self
    where
        I: IntervalFunction + 'static,
    {
        self.result_interval = Some(Arc::new(interval_fn));
        self
    }

    /// Interval function for error retries only.
    pub fn error_backoff<I>(mut self, interval_fn: I) -> Self
    where
        I: IntervalFunction + 'static,
    {
        self.error_interval = Some(Arc::new(interval_fn));
        self
    }

    /// Retries responses whose status matches `predicate`.
    ///
    /// ```rust
    /// use steadycall_retry::RetryConfig;
    ///
    /// let config = RetryConfig::builder()
    ///     .retry_on_result(|status| status == 503)
    ///     .max_attempts_on_result(2)
    ///     .build();
    /// ```
    pub fn retry_on_result<F>(mut self, predicate: F) -> Self
    where
        F: Fn(u16) -> bool + Send + Sync + 'static,
    {
        self.retry_on_result = Some(Arc::new(predicate));
        self
    }

    /// Also retries responses carrying [`status::CIRCUIT_OPEN`] or
    /// [`status::RETRYABLE_IO`], for any call.
    ///
    /// Combines with [`retry_on_result`](Self::retry_on_result) whichever is
    /// called first.
    ///
    /// [`status::CIRCUIT_OPEN`]: crate::status::CIRCUIT_OPEN
    /// [`status::RETRYABLE_IO`]: crate::status::RETRYABLE_IO
    pub fn retry_on_signal_statuses(mut self) -> Self {
        self.retry_signal_statuses = true;
        self
    }

    /// Shares a budget limiting retries across every call using this
    /// configuration.
    pub fn budget(mut self, budget: Arc<dyn RetryBudget>) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Default: "default"
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback when a retry is scheduled.
    ///
    /// The callback receives the retry number (1 for the first retry) and
    /// the wait before it.
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Retry { attempt, delay, .. } = event {
                f(*attempt, *delay);
            }
        }));
        self
    }

    /// Registers a callback when a call returns a response.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Success { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    /// Registers a callback when a retryable outcome has no attempts left.
    pub fn on_exhausted<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Exhausted { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    /// Registers a callback when a failure is handed back without a retry.
    pub fn on_not_retried<F>(mut self, f: F) -> Self
    where
        F: Fn(FailureKind) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::NotRetried { kind, .. } = event {
                f(*kind);
            }
        }));
        self
    }

    /// Registers a callback when the budget vetoes a retry.
    pub fn on_budget_exhausted<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::BudgetExhausted { attempt, .. } = event {
                f(*attempt);
            }
        }));
        self
    }

    pub fn build(self) -> RetryConfig {
        crate::describe_metrics();
        let default_interval = || -> Arc<dyn IntervalFunction> {
            Arc::new(FixedInterval::new(DEFAULT_WAIT))
        };
        let retry_on_result: Option<ResultPredicate> =
            match (self.retry_on_result, self.retry_signal_statuses) {
                (Some(predicate), true) => Some(Arc::new(move |code| {
                    status::is_retry_signal(code) || predicate(code)
                })),
                (None, true) => Some(Arc::new(status::is_retry_signal)),
                (predicate, false) => predicate,
            };
        RetryConfig {
            policy: RetryPolicy {
                max_attempts_on_result: self.max_attempts_on_result,
                max_attempts_on_error: self.max_attempts_on_error,
                result_interval: self.result_interval.unwrap_or_else(default_interval),
                error_interval: self.error_interval.unwrap_or_else(default_interval),
                retry_on_result,
            },
            event_listeners: self.event_listeners,
            name: self.name,
            budget: self.budget,
        }
    }
}

impl Default for RetryConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
