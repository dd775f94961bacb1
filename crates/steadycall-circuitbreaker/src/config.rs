use crate::classifier::{NonSuccessClassifier, ResultClassifier, SharedClassifier};
use crate::events::CircuitBreakerEvent;
use crate::CircuitState;
use std::sync::Arc;
use std::time::Duration;
use steadycall_core::{EventListeners, FnListener};

/// Type of rolling window used to compute the failure rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlidingWindowType {
    /// The last N recorded outcomes.
    CountBased,
    /// Outcomes recorded within the last D.
    TimeBased,
}

/// Configuration shared by every breaker created from it.
///
/// One config usually describes one logical client; the registry stamps out
/// a breaker per `host:port#method` from it.
#[derive(Clone)]
pub struct CircuitBreakerConfig {
    pub(crate) failure_rate_threshold: f64,
    pub(crate) sliding_window_type: SlidingWindowType,
    pub(crate) sliding_window_size: usize,
    pub(crate) sliding_window_duration: Option<Duration>,
    pub(crate) wait_duration_in_open: Duration,
    pub(crate) permitted_calls_in_half_open: usize,
    pub(crate) minimum_number_of_calls: usize,
    pub(crate) classifier: SharedClassifier,
    pub(crate) slow_call_duration_threshold: Option<Duration>,
    pub(crate) slow_call_rate_threshold: f64,
    pub(crate) event_listeners: EventListeners<CircuitBreakerEvent>,
    pub(crate) name: String,
}

impl CircuitBreakerConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// Name of the client this configuration belongs to.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn failure_rate_threshold(&self) -> f64 {
        self.failure_rate_threshold
    }

    pub fn minimum_number_of_calls(&self) -> usize {
        self.minimum_number_of_calls
    }

    pub fn wait_duration_in_open(&self) -> Duration {
        self.wait_duration_in_open
    }

    /// Classifies a response status with the configured classifier.
    pub fn is_failure_status(&self, status: u16) -> bool {
        self.classifier.is_failure(status)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        CircuitBreakerConfigBuilder::new().build()
    }
}

impl std::fmt::Debug for CircuitBreakerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerConfig")
            .field("name", &self.name)
            .field("failure_rate_threshold", &self.failure_rate_threshold)
            .field("sliding_window_type", &self.sliding_window_type)
            .field("sliding_window_size", &self.sliding_window_size)
            .field("sliding_window_duration", &self.sliding_window_duration)
            .field("wait_duration_in_open", &self.wait_duration_in_open)
            .field(
                "permitted_calls_in_half_open",
                &self.permitted_calls_in_half_open,
            )
            .field("minimum_number_of_calls", &self.minimum_number_of_calls)
            .finish_non_exhaustive()
    }
}

/// Builder for [`CircuitBreakerConfig`].
pub struct CircuitBreakerConfigBuilder {
    failure_rate_threshold: f64,
    sliding_window_type: SlidingWindowType,
    sliding_window_size: usize,
    sliding_window_duration: Option<Duration>,
    wait_duration_in_open: Duration,
    permitted_calls_in_half_open: usize,
    minimum_number_of_calls: Option<usize>,
    classifier: SharedClassifier,
    slow_call_duration_threshold: Option<Duration>,
    slow_call_rate_threshold: f64,
    event_listeners: EventListeners<CircuitBreakerEvent>,
    name: String,
}

impl CircuitBreakerConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            failure_rate_threshold: 0.5,
            sliding_window_type: SlidingWindowType::CountBased,
            sliding_window_size: 100,
            sliding_window_duration: None,
            wait_duration_in_open: Duration::from_secs(60),
            permitted_calls_in_half_open: 1,
            minimum_number_of_calls: None,
            classifier: Arc::new(NonSuccessClassifier),
            slow_call_duration_threshold: None,
            slow_call_rate_threshold: 1.0,
            event_listeners: EventListeners::new(),
            name: String::from("default"),
        }
    }

    /// Failure rate (0.0 to 1.0) at or above which the breaker opens.
    ///
    /// Default: 0.5
    pub fn failure_rate_threshold(mut self, rate: f64) -> Self {
        self.failure_rate_threshold = rate;
        self
    }

    /// Default: CountBased
    pub fn sliding_window_type(mut self, window_type: SlidingWindowType) -> Self {
        self.sliding_window_type = window_type;
        self
    }

    /// Number of outcomes kept by a count-based window.
    ///
    /// Default: 100
    pub fn sliding_window_size(mut self, size: usize) -> Self {
        self.sliding_window_size = size.max(1);
        self
    }

    /// Span of a time-based window. Required for `TimeBased`.
    ///
    /// Default: None
    pub fn sliding_window_duration(mut self, duration: Duration) -> Self {
        self.sliding_window_duration = Some(duration);
        self
    }

    /// How long the breaker stays open before admitting a trial call.
    ///
    /// Default: 60 seconds
    pub fn wait_duration_in_open(mut self, duration: Duration) -> Self {
        self.wait_duration_in_open = duration;
        self
    }

    /// Number of trial calls admitted while half-open. That many successes close
    /// the breaker; any failure reopens it.
    ///
    /// Default: 1
    pub fn permitted_calls_in_half_open(mut self, n: usize) -> Self {
        self.permitted_calls_in_half_open = n.max(1);
        self
    }

    /// Outcomes required in the window before the failure rate is evaluated.
    ///
    /// Default: same as `sliding_window_size`
    pub fn minimum_number_of_calls(mut self, n: usize) -> Self {
        self.minimum_number_of_calls = Some(n.max(1));
        self
    }

    /// Replaces the response classifier.
    ///
    /// Default: every non-2xx status is a failure
    pub fn classifier<C>(mut self, classifier: C) -> Self
    where
        C: ResultClassifier + 'static,
    {
        self.classifier = Arc::new(classifier);
        self
    }

    /// Calls at least this slow are tracked as slow calls.
    ///
    /// Default: None (slow call detection disabled)
    pub fn slow_call_duration_threshold(mut self, duration: Duration) -> Self {
        self.slow_call_duration_threshold = Some(duration);
        self
    }

    /// Slow call rate at or above which the breaker opens.
    ///
    /// Default: 1.0
    pub fn slow_call_rate_threshold(mut self, rate: f64) -> Self {
        self.slow_call_rate_threshold = rate;
        self
    }

    /// Name of the client, used in logs and metrics labels.
    ///
    /// Default: `default`
    pub fn name<N: Into<String>>(mut self, n: N) -> Self {
        self.name = n.into();
        self
    }

    /// Registers a callback for state transitions.
    ///
    /// The callback receives the breaker key, the previous state and the new
    /// state.
    ///
    /// ```rust
    /// use steadycall_circuitbreaker::{CircuitBreakerConfig, CircuitState};
    ///
    /// let config = CircuitBreakerConfig::builder()
    ///     .on_state_transition(|breaker, from, to| {
    ///         if to == CircuitState::Open {
    ///             eprintln!("{breaker} opened (was {from:?})");
    ///         }
    ///     })
    ///     .build();
    /// ```
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::StateTransition {
                    breaker,
                    from_state,
                    to_state,
                    ..
                } = event
                {
                    f(breaker, *from_state, *to_state);
                }
            }));
        self
    }

    /// Registers a callback for granted permissions.
    pub fn on_call_permitted<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::CallPermitted { state, .. } = event {
                    f(*state);
                }
            }));
        self
    }

    /// Registers a callback for denied permissions. Receives the breaker key.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::CallRejected { breaker, .. } = event {
                    f(breaker);
                }
            }));
        self
    }

    /// Registers a callback for recorded successes.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::SuccessRecorded { state, .. } = event {
                    f(*state);
                }
            }));
        self
    }

    /// Registers a callback for recorded failures.
    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::FailureRecorded { state, .. } = event {
                    f(*state);
                }
            }));
        self
    }

    /// Registers a callback for permissions released without an outcome.
    pub fn on_permission_released<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::PermissionReleased { state, .. } = event {
                    f(*state);
                }
            }));
        self
    }

    /// Registers a callback for dispatched calls cancelled by the caller.
    pub fn on_call_cancelled<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::CallCancelled { duration, .. } = event {
                    f(*duration);
                }
            }));
        self
    }

    /// Registers a callback for slow calls. Only fires when
    /// `slow_call_duration_threshold` is set.
    pub fn on_slow_call<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::SlowCallDetected { duration, .. } = event {
                    f(*duration);
                }
            }));
        self
    }

    /// Builds the configuration.
    ///
    /// # Panics
    ///
    /// Panics if a time-based window has no duration.
    pub fn build(self) -> CircuitBreakerConfig {
        if self.sliding_window_type == SlidingWindowType::TimeBased
            && self.sliding_window_duration.is_none()
        {
            panic!("sliding_window_duration must be set when using TimeBased sliding window");
        }

        crate::describe_metrics();

        CircuitBreakerConfig {
            failure_rate_threshold: self.failure_rate_threshold,
            sliding_window_type: self.sliding_window_type,
            sliding_window_size: self.sliding_window_size,
            sliding_window_duration: self.sliding_window_duration,
            wait_duration_in_open: self.wait_duration_in_open,
            permitted_calls_in_half_open: self.permitted_calls_in_half_open,
            minimum_number_of_calls: self
                .minimum_number_of_calls
                .unwrap_or(self.sliding_window_size),
            classifier: self.classifier,
            slow_call_duration_threshold: self.slow_call_duration_threshold,
            slow_call_rate_threshold: self.slow_call_rate_threshold,
            event_listeners: self.event_listeners,
            name: self.name,
        }
    }
}

impl Default for CircuitBreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
