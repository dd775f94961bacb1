//! Per-target circuit breakers.
//!
//! A breaker watches the outcomes of calls to one `host:port#method` target
//! and stops sending calls there once the failure rate in its rolling window
//! crosses a threshold.
//!
//! ## States
//! - **Closed**: calls flow, outcomes are recorded
//! - **Open**: permission is denied until `wait_duration_in_open` elapses
//! - **Half-Open**: a limited number of trial calls decide between closing and reopening
//!
//! ## Usage
//!
//! Breakers are explicit about permission: a caller asks for a [`Permit`],
//! makes the call, then hands the permit back with exactly one of success,
//! error, result or release. A permit granted before the breaker last changed
//! state is returned without its outcome being recorded, so a call admitted
//! while closed can never decide a half-open trial.
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::{Duration, Instant};
//! use steadycall_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
//! use steadycall_core::TargetKey;
//!
//! let config = CircuitBreakerConfig::builder()
//!     .failure_rate_threshold(0.5)
//!     .minimum_number_of_calls(2)
//!     .build();
//! let breaker = CircuitBreaker::new(
//!     TargetKey::method("10.0.0.7", 8080, "GET /users"),
//!     Arc::new(config),
//! );
//!
//! for _ in 0..2 {
//!     let permit = breaker.try_acquire_permission().expect("closed");
//!     let start = Instant::now();
//!     // ... the call fails ...
//!     breaker.on_error(permit, start.elapsed());
//! }
//! assert_eq!(breaker.state(), CircuitState::Open);
//! assert!(breaker.try_acquire_permission().is_none());
//! ```
//!
//! ## Registry
//!
//! [`CircuitBreakerRegistry`] creates breakers lazily, one per key, with the
//! configuration registered for the calling client or the default one.
//!
//! ## Streams
//!
//! [`CircuitBreakerStreamExt::circuit_breaker`] gates a stream of responses
//! on breaker permission and records its outcome.

use crate::circuit::Circuit;
#[cfg(feature = "metrics")]
use metrics::{describe_counter, describe_gauge, describe_histogram};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::time::Duration;
use steadycall_core::{InvocationError, StatusResponse, TargetKey};

pub use circuit::{CircuitMetrics, CircuitState};
pub use classifier::{FnClassifier, NonSuccessClassifier, ResultClassifier};
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder, SlidingWindowType};
pub use error::CircuitBreakerError;
pub use events::CircuitBreakerEvent;
pub use registry::CircuitBreakerRegistry;
pub use stream::{CircuitBreakerStream, CircuitBreakerStreamExt};

mod circuit;
pub mod classifier;
mod config;
mod error;
mod events;
mod registry;
mod stream;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

pub(crate) fn describe_metrics() {
    #[cfg(feature = "metrics")]
    METRICS_INIT.call_once(|| {
        describe_counter!(
            "circuitbreaker_calls_total",
            "Total number of calls seen by circuit breakers, by outcome"
        );
        describe_counter!(
            "circuitbreaker_transitions_total",
            "Total number of circuit breaker state transitions"
        );
        describe_counter!(
            "circuitbreaker_slow_calls_total",
            "Total number of slow calls detected"
        );
        describe_gauge!(
            "circuitbreaker_state",
            "Current state of the circuit breaker (0 closed, 1 half-open, 2 open)"
        );
        describe_histogram!(
            "circuitbreaker_call_duration_seconds",
            "Duration of calls recorded by circuit breakers"
        );
    });
}

/// Permission to make one call through a [`CircuitBreaker`].
///
/// Hand it back to the breaker that granted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a permit must be resolved with an outcome or released"]
pub struct Permit {
    generation: u64,
}

/// A circuit breaker for one target.
///
/// All methods are synchronous and cheap; the state lives behind a short
/// critical section so a breaker can be consulted from selection code and
/// from `Drop` impls alike.
pub struct CircuitBreaker {
    key: TargetKey,
    circuit: Mutex<Circuit>,
    state_atomic: Arc<AtomicU8>,
    config: Arc<CircuitBreakerConfig>,
}

impl CircuitBreaker {
    /// Creates a closed breaker for `key`.
    pub fn new(key: TargetKey, config: Arc<CircuitBreakerConfig>) -> Self {
        let state_atomic = Arc::new(AtomicU8::new(CircuitState::Closed as u8));
        Self {
            circuit: Mutex::new(Circuit::new(key.to_string(), Arc::clone(&state_atomic))),
            key,
            state_atomic,
            config,
        }
    }

    /// The target this breaker guards.
    pub fn key(&self) -> &TargetKey {
        &self.key
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Asks for permission to make one call.
    ///
    /// A granted permit must later be resolved by exactly one of
    /// [`on_success`](Self::on_success), [`on_error`](Self::on_error),
    /// [`on_result`](Self::on_result), [`release_permission`](Self::release_permission)
    /// or [`on_cancelled`](Self::on_cancelled).
    pub fn try_acquire_permission(&self) -> Option<Permit> {
        let generation = self.circuit.lock().try_acquire(&self.config);

        #[cfg(feature = "tracing")]
        {
            if generation.is_some() {
                tracing::trace!(breaker = %self.key, "circuit breaker permitted call");
            } else {
                tracing::debug!(breaker = %self.key, "circuit breaker rejected call");
            }
        }

        generation.map(|generation| Permit { generation })
    }

    /// Like [`try_acquire_permission`](Self::try_acquire_permission) but
    /// returns the denial as an [`InvocationError::CircuitOpen`].
    pub fn acquire_permission(&self) -> Result<Permit, InvocationError> {
        self.try_acquire_permission()
            .ok_or_else(|| InvocationError::CircuitOpen {
                key: self.key.clone(),
            })
    }

    /// Records a successful call.
    pub fn on_success(&self, permit: Permit, duration: Duration) {
        self.resolve(permit, |circuit, config| circuit.record_success(config, duration));
    }

    /// Records a failed call.
    pub fn on_error(&self, permit: Permit, duration: Duration) {
        self.resolve(permit, |circuit, config| circuit.record_failure(config, duration));
    }

    /// Records a call that produced `response`, classified by status.
    pub fn on_result<R>(&self, permit: Permit, duration: Duration, response: &R)
    where
        R: StatusResponse + ?Sized,
    {
        if self.config.is_failure_status(response.status()) {
            self.on_error(permit, duration);
        } else {
            self.on_success(permit, duration);
        }
    }

    /// Returns a permit without recording any outcome.
    pub fn release_permission(&self, permit: Permit) {
        self.resolve(permit, |circuit, config| circuit.release(config));
    }

    /// Returns the permit of a dispatched call that the caller abandoned.
    ///
    /// The outcome is unknown, so nothing is recorded in the window.
    pub fn on_cancelled(&self, permit: Permit, duration: Duration) {
        self.resolve(permit, |circuit, config| circuit.cancelled(config, duration));
    }

    fn resolve(&self, permit: Permit, record: impl FnOnce(&mut Circuit, &CircuitBreakerConfig)) {
        let mut circuit = self.circuit.lock();
        if circuit.is_current(permit.generation) {
            record(&mut *circuit, &self.config);
        } else {
            #[cfg(feature = "tracing")]
            tracing::debug!(breaker = %self.key, "discarding outcome granted in an earlier state");
            circuit.discard(&self.config);
        }
    }

    /// Current state, read without locking.
    ///
    /// An open breaker whose wait has elapsed still reports `Open` until the
    /// next permission request moves it to half-open.
    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state_atomic.load(Ordering::Acquire))
    }

    /// True when the breaker is currently open.
    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// Snapshot of window statistics.
    pub fn metrics(&self) -> CircuitMetrics {
        self.circuit.lock().metrics(&self.config)
    }

    /// Forces the breaker open.
    pub fn force_open(&self) {
        self.circuit.lock().force_open(&self.config);
    }

    /// Forces the breaker closed.
    pub fn force_closed(&self) {
        self.circuit.lock().force_closed(&self.config);
    }

    /// Closes the breaker and forgets every recorded outcome.
    pub fn reset(&self) {
        self.circuit.lock().reset(&self.config);
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("key", &self.key)
            .field("state", &self.state())
            .finish()
    }
}
