use crate::config::{CircuitBreakerConfig, SlidingWindowType};
use crate::events::CircuitBreakerEvent;
#[cfg(feature = "metrics")]
use metrics::{counter, gauge, histogram};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// State of a circuit breaker.
///
/// The ordering is the selection preference: a closed breaker sorts before a
/// half-open one, which sorts before an open one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum CircuitState {
    /// Calls flow and outcomes are recorded.
    Closed = 0,
    /// A limited number of trial calls are admitted.
    HalfOpen = 1,
    /// Calls are rejected until the wait duration has elapsed.
    Open = 2,
}

impl CircuitState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => CircuitState::HalfOpen,
            2 => CircuitState::Open,
            _ => CircuitState::Closed,
        }
    }

    /// Short label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::HalfOpen => "half_open",
            CircuitState::Open => "open",
        }
    }
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitMetrics {
    pub state: CircuitState,
    /// Outcomes currently in the rolling window.
    pub total_calls: usize,
    pub failure_count: usize,
    pub success_count: usize,
    pub slow_call_count: usize,
    /// Failures over recorded outcomes, 0.0 when the window is empty.
    pub failure_rate: f64,
    pub slow_call_rate: f64,
    /// Permissions granted and not yet resolved by an outcome or release.
    pub in_flight: usize,
    pub time_since_state_change: Duration,
}

#[derive(Debug, Clone, Copy)]
struct CallRecord {
    at: Instant,
    is_failure: bool,
    is_slow: bool,
}

pub(crate) struct Circuit {
    breaker: String,
    state: CircuitState,
    state_atomic: Arc<AtomicU8>,
    last_state_change: Instant,
    window: VecDeque<CallRecord>,
    failures: usize,
    slow_calls: usize,
    half_open_acquired: usize,
    half_open_successes: usize,
    in_flight: usize,
    generation: u64,
}

impl Circuit {
    pub(crate) fn new(breaker: String, state_atomic: Arc<AtomicU8>) -> Self {
        state_atomic.store(CircuitState::Closed as u8, Ordering::Release);
        Self {
            breaker,
            state: CircuitState::Closed,
            state_atomic,
            last_state_change: Instant::now(),
            window: VecDeque::new(),
            failures: 0,
            slow_calls: 0,
            half_open_acquired: 0,
            half_open_successes: 0,
            in_flight: 0,
            generation: 0,
        }
    }

    pub(crate) fn state(&self) -> CircuitState {
        self.state
    }

    /// True when `generation` is the state permissions are currently granted in.
    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    pub(crate) fn metrics(&mut self, config: &CircuitBreakerConfig) -> CircuitMetrics {
        self.evict(config);
        let total_calls = self.window.len();
        let (failure_rate, slow_call_rate) = if total_calls > 0 {
            (
                self.failures as f64 / total_calls as f64,
                self.slow_calls as f64 / total_calls as f64,
            )
        } else {
            (0.0, 0.0)
        };

        CircuitMetrics {
            state: self.state,
            total_calls,
            failure_count: self.failures,
            success_count: total_calls - self.failures,
            slow_call_count: self.slow_calls,
            failure_rate,
            slow_call_rate,
            in_flight: self.in_flight,
            time_since_state_change: self.last_state_change.elapsed(),
        }
    }

    /// Grants a permission, returning the generation it belongs to.
    pub(crate) fn try_acquire(&mut self, config: &CircuitBreakerConfig) -> Option<u64> {
        if self.state == CircuitState::Open
            && self.last_state_change.elapsed() >= config.wait_duration_in_open
        {
            self.transition_to(CircuitState::HalfOpen, config);
        }

        let permitted = match self.state {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen => {
                if self.half_open_acquired < config.permitted_calls_in_half_open {
                    self.half_open_acquired += 1;
                    true
                } else {
                    false
                }
            }
        };

        if permitted {
            self.in_flight += 1;
            config
                .event_listeners
                .emit(&CircuitBreakerEvent::CallPermitted {
                    breaker: self.breaker.clone(),
                    timestamp: Instant::now(),
                    state: self.state,
                });
        } else {
            config
                .event_listeners
                .emit(&CircuitBreakerEvent::CallRejected {
                    breaker: self.breaker.clone(),
                    timestamp: Instant::now(),
                    state: self.state,
                });

            #[cfg(feature = "metrics")]
            counter!("circuitbreaker_calls_total", "circuitbreaker" => self.breaker.clone(), "outcome" => "rejected").increment(1);
        }

        permitted.then_some(self.generation)
    }

    /// Returns a permission granted before the last transition.
    ///
    /// Its outcome says nothing about the current state, so only the
    /// in-flight count changes.
    pub(crate) fn discard(&mut self, config: &CircuitBreakerConfig) {
        self.in_flight = self.in_flight.saturating_sub(1);
        config
            .event_listeners
            .emit(&CircuitBreakerEvent::PermissionReleased {
                breaker: self.breaker.clone(),
                timestamp: Instant::now(),
                state: self.state,
            });
    }

    pub(crate) fn release(&mut self, config: &CircuitBreakerConfig) {
        self.in_flight = self.in_flight.saturating_sub(1);
        if self.state == CircuitState::HalfOpen {
            self.half_open_acquired = self.half_open_acquired.saturating_sub(1);
        }
        config
            .event_listeners
            .emit(&CircuitBreakerEvent::PermissionReleased {
                breaker: self.breaker.clone(),
                timestamp: Instant::now(),
                state: self.state,
            });
    }

    pub(crate) fn cancelled(&mut self, config: &CircuitBreakerConfig, duration: Duration) {
        self.release(config);
        config
            .event_listeners
            .emit(&CircuitBreakerEvent::CallCancelled {
                breaker: self.breaker.clone(),
                timestamp: Instant::now(),
                duration,
            });
    }

    pub(crate) fn record_success(&mut self, config: &CircuitBreakerConfig, duration: Duration) {
        self.in_flight = self.in_flight.saturating_sub(1);
        let is_slow = self.note_slow(config, duration);

        config
            .event_listeners
            .emit(&CircuitBreakerEvent::SuccessRecorded {
                breaker: self.breaker.clone(),
                timestamp: Instant::now(),
                state: self.state,
                duration,
            });

        #[cfg(feature = "metrics")]
        {
            counter!("circuitbreaker_calls_total", "circuitbreaker" => self.breaker.clone(), "outcome" => "success").increment(1);
            histogram!("circuitbreaker_call_duration_seconds", "circuitbreaker" => self.breaker.clone())
                .record(duration.as_secs_f64());
        }

        match self.state {
            CircuitState::Open => {}
            CircuitState::HalfOpen => {
                self.half_open_successes += 1;
                if self.half_open_successes >= config.permitted_calls_in_half_open {
                    self.transition_to(CircuitState::Closed, config);
                }
            }
            CircuitState::Closed => {
                self.push(config, false, is_slow);
                self.evaluate_window(config);
            }
        }
    }

    pub(crate) fn record_failure(&mut self, config: &CircuitBreakerConfig, duration: Duration) {
        self.in_flight = self.in_flight.saturating_sub(1);
        let is_slow = self.note_slow(config, duration);

        config
            .event_listeners
            .emit(&CircuitBreakerEvent::FailureRecorded {
                breaker: self.breaker.clone(),
                timestamp: Instant::now(),
                state: self.state,
                duration,
            });

        #[cfg(feature = "metrics")]
        {
            counter!("circuitbreaker_calls_total", "circuitbreaker" => self.breaker.clone(), "outcome" => "failure").increment(1);
            histogram!("circuitbreaker_call_duration_seconds", "circuitbreaker" => self.breaker.clone())
                .record(duration.as_secs_f64());
        }

        match self.state {
            CircuitState::Open => {}
            CircuitState::HalfOpen => self.transition_to(CircuitState::Open, config),
            CircuitState::Closed => {
                self.push(config, true, is_slow);
                self.evaluate_window(config);
            }
        }
    }

    pub(crate) fn force_open(&mut self, config: &CircuitBreakerConfig) {
        self.transition_to(CircuitState::Open, config);
    }

    pub(crate) fn force_closed(&mut self, config: &CircuitBreakerConfig) {
        self.transition_to(CircuitState::Closed, config);
    }

    pub(crate) fn reset(&mut self, config: &CircuitBreakerConfig) {
        self.transition_to(CircuitState::Closed, config);
        self.clear_window();
    }

    fn note_slow(&self, config: &CircuitBreakerConfig, duration: Duration) -> bool {
        let is_slow = config
            .slow_call_duration_threshold
            .map(|threshold| duration >= threshold)
            .unwrap_or(false);

        if is_slow {
            config
                .event_listeners
                .emit(&CircuitBreakerEvent::SlowCallDetected {
                    breaker: self.breaker.clone(),
                    timestamp: Instant::now(),
                    duration,
                    state: self.state,
                });

            #[cfg(feature = "metrics")]
            counter!("circuitbreaker_slow_calls_total", "circuitbreaker" => self.breaker.clone())
                .increment(1);
        }
        is_slow
    }

    fn push(&mut self, config: &CircuitBreakerConfig, is_failure: bool, is_slow: bool) {
        match config.sliding_window_type {
            SlidingWindowType::CountBased => {
                while self.window.len() >= config.sliding_window_size {
                    self.pop_front();
                }
            }
            SlidingWindowType::TimeBased => self.evict(config),
        }

        self.window.push_back(CallRecord {
            at: Instant::now(),
            is_failure,
            is_slow,
        });
        if is_failure {
            self.failures += 1;
        }
        if is_slow {
            self.slow_calls += 1;
        }
    }

    fn evict(&mut self, config: &CircuitBreakerConfig) {
        let Some(span) = config.sliding_window_duration else {
            return;
        };
        if config.sliding_window_type != SlidingWindowType::TimeBased {
            return;
        }
        let now = Instant::now();
        while let Some(record) = self.window.front() {
            if now.duration_since(record.at) > span {
                self.pop_front();
            } else {
                break;
            }
        }
    }

    fn pop_front(&mut self) {
        if let Some(record) = self.window.pop_front() {
            if record.is_failure {
                self.failures -= 1;
            }
            if record.is_slow {
                self.slow_calls -= 1;
            }
        }
    }

    fn clear_window(&mut self) {
        self.window.clear();
        self.failures = 0;
        self.slow_calls = 0;
    }

    fn evaluate_window(&mut self, config: &CircuitBreakerConfig) {
        let total = self.window.len();
        let minimum = match config.sliding_window_type {
            SlidingWindowType::CountBased => config
                .minimum_number_of_calls
                .min(config.sliding_window_size),
            SlidingWindowType::TimeBased => config.minimum_number_of_calls,
        };
        if total == 0 || total < minimum {
            return;
        }

        let failure_rate = self.failures as f64 / total as f64;
        let slow_call_rate = self.slow_calls as f64 / total as f64;

        let should_open = failure_rate >= config.failure_rate_threshold
            || (config.slow_call_duration_threshold.is_some()
                && slow_call_rate >= config.slow_call_rate_threshold);

        if should_open {
            self.transition_to(CircuitState::Open, config);
        }
    }

    fn transition_to(&mut self, state: CircuitState, config: &CircuitBreakerConfig) {
        if self.state == state {
            return;
        }

        let from_state = self.state;

        config
            .event_listeners
            .emit(&CircuitBreakerEvent::StateTransition {
                breaker: self.breaker.clone(),
                timestamp: Instant::now(),
                from_state,
                to_state: state,
            });

        #[cfg(feature = "tracing")]
        tracing::info!(breaker = %self.breaker, from = from_state.as_str(), to = state.as_str(), "circuit state transition");

        #[cfg(feature = "metrics")]
        {
            counter!(
                "circuitbreaker_transitions_total",
                "circuitbreaker" => self.breaker.clone(),
                "from" => from_state.as_str(),
                "to" => state.as_str()
            )
            .increment(1);
            gauge!("circuitbreaker_state", "circuitbreaker" => self.breaker.clone())
                .set(state as u8 as f64);
        }

        self.state = state;
        self.generation = self.generation.wrapping_add(1);
        self.state_atomic.store(state as u8, Ordering::Release);
        self.last_state_change = Instant::now();
        self.half_open_acquired = 0;
        self.half_open_successes = 0;
        self.clear_window();
    }
}
