//! Error taxonomy for a single logical call.
//!
//! Every failure that can end an attempt is classified into a
//! [`FailureKind`]. The kind decides two things: what the circuit breaker
//! records, and whether the retry engine may try again. The important split
//! is between failures where the request provably never reached the backend
//! (circuit open, bulkhead full, connect failure) and failures where it may
//! already have been processed (response-phase failures).

use crate::key::TargetKey;
use std::fmt;

/// Which phase of the exchange a transport failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportPhase {
    /// The request was not delivered: refused, unreachable, reset before
    /// the write finished.
    Connect,
    /// The request was delivered but no complete response came back.
    Response,
}

impl fmt::Display for TransportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportPhase::Connect => f.write_str("connect"),
            TransportPhase::Response => f.write_str("response"),
        }
    }
}

/// Failure reported by a transport adapter.
///
/// Adapters that know the phase set it explicitly. Otherwise the phase is
/// inferred from the message: read timeouts and anything mentioning a
/// response count as [`TransportPhase::Response`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    phase: Option<TransportPhase>,
    timeout: bool,
    message: String,
}

impl TransportError {
    /// A failure whose phase is inferred from `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            phase: None,
            timeout: false,
            message: message.into(),
        }
    }

    /// The request never left this process.
    pub fn connect(message: impl Into<String>) -> Self {
        Self {
            phase: Some(TransportPhase::Connect),
            timeout: false,
            message: message.into(),
        }
    }

    /// The request was sent; the response failed.
    pub fn response(message: impl Into<String>) -> Self {
        Self {
            phase: Some(TransportPhase::Response),
            timeout: false,
            message: message.into(),
        }
    }

    /// The response did not arrive in time.
    pub fn response_timeout(message: impl Into<String>) -> Self {
        Self {
            phase: Some(TransportPhase::Response),
            timeout: true,
            message: message.into(),
        }
    }

    /// Phase of the failure, explicit or inferred.
    pub fn phase(&self) -> TransportPhase {
        self.phase
            .unwrap_or_else(|| infer_phase(&self.message, self.timeout))
    }

    /// True when the failure was a timeout.
    pub fn is_timeout(&self) -> bool {
        self.timeout
    }

    /// The human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

fn infer_phase(message: &str, timeout: bool) -> TransportPhase {
    if timeout {
        return TransportPhase::Response;
    }
    let normalized: String = message
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();
    if normalized.contains("readtimeout")
        || normalized.contains("readtimedout")
        || normalized.contains("respon")
    {
        TransportPhase::Response
    } else {
        TransportPhase::Connect
    }
}

/// Coarse classification of an attempt outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The directory returned no usable instance.
    NoInstances,
    /// The target's breaker denied permission; nothing was sent.
    CircuitOpen,
    /// The target's bulkhead was saturated; nothing was sent.
    BulkheadFull,
    /// Transport failed before the request was delivered.
    ConnectFailure,
    /// Transport failed after the request may have been delivered.
    ResponseFailure,
    /// The backend answered with a non-success status.
    Application,
}

impl FailureKind {
    /// True when the request is known not to have reached the backend.
    pub fn is_unsent(&self) -> bool {
        matches!(
            self,
            FailureKind::CircuitOpen | FailureKind::BulkheadFull | FailureKind::ConnectFailure
        )
    }
}

/// Terminal error of a logical call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InvocationError {
    /// The directory returned nothing to call.
    #[error("no instances available for service `{service}`")]
    NoInstancesAvailable {
        /// Logical service name.
        service: String,
    },

    /// The breaker for `key` is open.
    #[error("circuit breaker `{key}` is open")]
    CircuitOpen {
        /// Breaker scope (`host:port#method`).
        key: TargetKey,
    },

    /// The bulkhead for `key` rejected the call.
    #[error("bulkhead `{key}` is full: max concurrent calls ({max_concurrent_calls}) reached")]
    BulkheadFull {
        /// Bulkhead scope (`host:port`).
        key: TargetKey,
        /// Configured capacity.
        max_concurrent_calls: usize,
    },

    /// The request could not be delivered.
    #[error("connect to `{key}` failed: {source}")]
    ConnectFailure {
        /// Instance the attempt targeted.
        key: TargetKey,
        /// Transport detail.
        #[source]
        source: TransportError,
    },

    /// The request was sent but the response failed or timed out.
    #[error("response from `{key}` failed: {source}")]
    ResponseFailure {
        /// Instance the attempt targeted.
        key: TargetKey,
        /// Transport detail.
        #[source]
        source: TransportError,
    },

    /// The backend answered with a non-success status.
    #[error("`{key}` answered with status {status}")]
    Application {
        /// Instance that answered.
        key: TargetKey,
        /// Status code of the answer.
        status: u16,
    },
}

impl InvocationError {
    /// Classifies a transport failure against `key`.
    pub fn transport(key: TargetKey, source: TransportError) -> Self {
        match source.phase() {
            TransportPhase::Connect => InvocationError::ConnectFailure { key, source },
            TransportPhase::Response => InvocationError::ResponseFailure { key, source },
        }
    }

    /// The failure kind used for retry and breaker decisions.
    pub fn kind(&self) -> FailureKind {
        match self {
            InvocationError::NoInstancesAvailable { .. } => FailureKind::NoInstances,
            InvocationError::CircuitOpen { .. } => FailureKind::CircuitOpen,
            InvocationError::BulkheadFull { .. } => FailureKind::BulkheadFull,
            InvocationError::ConnectFailure { .. } => FailureKind::ConnectFailure,
            InvocationError::ResponseFailure { .. } => FailureKind::ResponseFailure,
            InvocationError::Application { .. } => FailureKind::Application,
        }
    }

    /// Returns true for an open-circuit rejection.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, InvocationError::CircuitOpen { .. })
    }

    /// Returns true for a bulkhead rejection.
    pub fn is_bulkhead_full(&self) -> bool {
        matches!(self, InvocationError::BulkheadFull { .. })
    }

    /// Target the failing attempt was aimed at, if one was chosen.
    pub fn target(&self) -> Option<&TargetKey> {
        match self {
            InvocationError::NoInstancesAvailable { .. } => None,
            InvocationError::CircuitOpen { key }
            | InvocationError::BulkheadFull { key, .. }
            | InvocationError::ConnectFailure { key, .. }
            | InvocationError::ResponseFailure { key, .. }
            | InvocationError::Application { key, .. } => Some(key),
        }
    }
}
