//! Declarative client configuration.
//!
//! [`ClientSettings`] describes one logical client and deserializes from any
//! serde format. Every field has a default, durations are milliseconds, and
//! the sections convert into the component builders:
//!
//! ```rust
//! use steadycall::ClientSettings;
//!
//! let settings: ClientSettings = serde_json::from_str(r#"{
//!     "response_timeout_ms": 2000,
//!     "retryable_paths": ["/orders/*/cancel"],
//!     "retry": { "max_attempts": 4 },
//!     "circuit_breaker": { "minimum_number_of_calls": 10 }
//! }"#).unwrap();
//!
//! assert_eq!(settings.connect_timeout_ms, 500);
//! assert!(settings.retryable_paths().matches("/orders/7/cancel"));
//! let retry = settings.retry.config("orders");
//! assert_eq!(retry.name(), "orders");
//! ```

use crate::paths::RetryablePaths;
use crate::transport::TransportOptions;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use steadycall_bulkhead::BulkheadConfig;
use steadycall_circuitbreaker::{CircuitBreakerConfig, SlidingWindowType};
use steadycall_retry::{ExponentialBackoff, FixedInterval, RandomizedInterval, RetryConfig};

/// Settings for every named client, keyed by client name.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientsSettings {
    pub configs: HashMap<String, ClientSettings>,
}

impl ClientsSettings {
    pub fn client(&self, name: &str) -> Option<&ClientSettings> {
        self.configs.get(name)
    }
}

/// Settings of one logical client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Service to look up in the directory. Defaults to the client name.
    pub service_name: Option<String>,
    /// Paths retried on response-phase failures whatever their method.
    pub retryable_paths: Vec<String>,
    pub connect_timeout_ms: u64,
    pub response_timeout_ms: u64,
    pub retry: RetrySettings,
    pub circuit_breaker: CircuitBreakerSettings,
    pub bulkhead: BulkheadSettings,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            service_name: None,
            retryable_paths: Vec::new(),
            connect_timeout_ms: 500,
            response_timeout_ms: 8_000,
            retry: RetrySettings::default(),
            circuit_breaker: CircuitBreakerSettings::default(),
            bulkhead: BulkheadSettings::default(),
        }
    }
}

impl ClientSettings {
    /// The directory service name, falling back to `client`.
    pub fn service_name_or<'a>(&'a self, client: &'a str) -> &'a str {
        self.service_name.as_deref().unwrap_or(client)
    }

    pub fn transport_options(&self) -> TransportOptions {
        TransportOptions::new(
            Duration::from_millis(self.connect_timeout_ms),
            Duration::from_millis(self.response_timeout_ms),
        )
    }

    pub fn retryable_paths(&self) -> RetryablePaths {
        RetryablePaths::new(self.retryable_paths.iter().cloned())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Attempts per call, the first one included.
    pub max_attempts: usize,
    pub wait_duration_ms: u64,
    /// Grows the wait geometrically when set.
    pub backoff_multiplier: Option<f64>,
    /// Caps the grown wait.
    pub max_wait_duration_ms: Option<u64>,
    /// Spreads each wait by `±factor/2`.
    pub randomization_factor: Option<f64>,
    /// Response statuses that are retried like failures.
    pub retry_on_statuses: Vec<u16>,
    /// Retries the 581 and 582 statuses for any call.
    pub retry_on_signal_statuses: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            wait_duration_ms: 500,
            backoff_multiplier: None,
            max_wait_duration_ms: None,
            randomization_factor: None,
            retry_on_statuses: Vec::new(),
            retry_on_signal_statuses: false,
        }
    }
}

impl RetrySettings {
    pub fn config(&self, name: &str) -> RetryConfig {
        let wait = Duration::from_millis(self.wait_duration_ms);
        let mut builder = RetryConfig::builder()
            .name(name)
            .max_attempts(self.max_attempts);

        builder = match (self.backoff_multiplier, self.randomization_factor) {
            (Some(multiplier), factor) => {
                let mut backoff = ExponentialBackoff::new(wait).multiplier(multiplier);
                if let Some(max) = self.max_wait_duration_ms {
                    backoff = backoff.max_interval(Duration::from_millis(max));
                }
                match factor {
                    Some(factor) => builder.backoff(RandomizedInterval::new(backoff, factor)),
                    None => builder.backoff(backoff),
                }
            }
            (None, Some(factor)) => {
                builder.backoff(RandomizedInterval::new(FixedInterval::new(wait), factor))
            }
            (None, None) => builder.wait_duration(wait),
        };

        if !self.retry_on_statuses.is_empty() {
            let statuses = self.retry_on_statuses.clone();
            builder = builder.retry_on_result(move |status| statuses.contains(&status));
        }
        if self.retry_on_signal_statuses {
            builder = builder.retry_on_signal_statuses();
        }
        builder.build()
    }
}

/// Window kind as written in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    CountBased,
    TimeBased,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    pub failure_rate_threshold: f64,
    pub sliding_window_type: WindowKind,
    pub sliding_window_size: usize,
    /// Required for `time_based` windows.
    pub sliding_window_duration_ms: Option<u64>,
    /// Defaults to `sliding_window_size`.
    pub minimum_number_of_calls: Option<usize>,
    pub wait_duration_in_open_ms: u64,
    pub permitted_calls_in_half_open: usize,
    pub slow_call_duration_threshold_ms: Option<u64>,
    pub slow_call_rate_threshold: f64,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 0.5,
            sliding_window_type: WindowKind::CountBased,
            sliding_window_size: 100,
            sliding_window_duration_ms: None,
            minimum_number_of_calls: None,
            wait_duration_in_open_ms: 60_000,
            permitted_calls_in_half_open: 1,
            slow_call_duration_threshold_ms: None,
            slow_call_rate_threshold: 1.0,
        }
    }
}

impl CircuitBreakerSettings {
    /// Builds the breaker configuration.
    ///
    /// # Panics
    ///
    /// Panics for a `time_based` window without `sliding_window_duration_ms`.
    pub fn config(&self, name: &str) -> CircuitBreakerConfig {
        let window_type = match self.sliding_window_type {
            WindowKind::CountBased => SlidingWindowType::CountBased,
            WindowKind::TimeBased => SlidingWindowType::TimeBased,
        };
        let mut builder = CircuitBreakerConfig::builder()
            .name(name)
            .failure_rate_threshold(self.failure_rate_threshold)
            .sliding_window_type(window_type)
            .sliding_window_size(self.sliding_window_size)
            .wait_duration_in_open(Duration::from_millis(self.wait_duration_in_open_ms))
            .permitted_calls_in_half_open(self.permitted_calls_in_half_open)
            .slow_call_rate_threshold(self.slow_call_rate_threshold);

        if let Some(ms) = self.sliding_window_duration_ms {
            builder = builder.sliding_window_duration(Duration::from_millis(ms));
        }
        if let Some(n) = self.minimum_number_of_calls {
            builder = builder.minimum_number_of_calls(n);
        }
        if let Some(ms) = self.slow_call_duration_threshold_ms {
            builder = builder.slow_call_duration_threshold(Duration::from_millis(ms));
        }
        builder.build()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BulkheadSettings {
    pub max_concurrent_calls: usize,
    pub max_queue_depth: usize,
    pub max_wait_duration_ms: Option<u64>,
}

impl Default for BulkheadSettings {
    fn default() -> Self {
        Self {
            max_concurrent_calls: 25,
            max_queue_depth: 0,
            max_wait_duration_ms: None,
        }
    }
}

impl BulkheadSettings {
    pub fn config(&self, name: &str) -> BulkheadConfig {
        BulkheadConfig::builder()
            .name(name)
            .max_concurrent_calls(self.max_concurrent_calls)
            .max_queue_depth(self.max_queue_depth)
            .max_wait_duration(self.max_wait_duration_ms.map(Duration::from_millis))
            .build()
    }
}
