use crate::CircuitState;
use std::time::{Duration, Instant};
use steadycall_core::InvocationEvent;

/// Events emitted by a circuit breaker.
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// A permission was granted.
    CallPermitted {
        breaker: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A permission was denied.
    CallRejected {
        breaker: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// The breaker moved between states.
    StateTransition {
        breaker: String,
        timestamp: Instant,
        from_state: CircuitState,
        to_state: CircuitState,
    },
    /// A successful outcome was recorded.
    SuccessRecorded {
        breaker: String,
        timestamp: Instant,
        state: CircuitState,
        duration: Duration,
    },
    /// A failed outcome was recorded.
    FailureRecorded {
        breaker: String,
        timestamp: Instant,
        state: CircuitState,
        duration: Duration,
    },
    /// A granted permission was returned without an outcome.
    PermissionReleased {
        breaker: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A dispatched call was cancelled by its caller before it finished.
    CallCancelled {
        breaker: String,
        timestamp: Instant,
        duration: Duration,
    },
    /// A recorded call took longer than the slow-call threshold.
    SlowCallDetected {
        breaker: String,
        timestamp: Instant,
        duration: Duration,
        state: CircuitState,
    },
}

impl InvocationEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CircuitBreakerEvent::CallPermitted { .. } => "call_permitted",
            CircuitBreakerEvent::CallRejected { .. } => "call_rejected",
            CircuitBreakerEvent::StateTransition { .. } => "state_transition",
            CircuitBreakerEvent::SuccessRecorded { .. } => "success_recorded",
            CircuitBreakerEvent::FailureRecorded { .. } => "failure_recorded",
            CircuitBreakerEvent::PermissionReleased { .. } => "permission_released",
            CircuitBreakerEvent::CallCancelled { .. } => "call_cancelled",
            CircuitBreakerEvent::SlowCallDetected { .. } => "slow_call_detected",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CircuitBreakerEvent::CallPermitted { timestamp, .. }
            | CircuitBreakerEvent::CallRejected { timestamp, .. }
            | CircuitBreakerEvent::StateTransition { timestamp, .. }
            | CircuitBreakerEvent::SuccessRecorded { timestamp, .. }
            | CircuitBreakerEvent::FailureRecorded { timestamp, .. }
            | CircuitBreakerEvent::PermissionReleased { timestamp, .. }
            | CircuitBreakerEvent::CallCancelled { timestamp, .. }
            | CircuitBreakerEvent::SlowCallDetected { timestamp, .. } => *timestamp,
        }
    }

    fn source(&self) -> &str {
        match self {
            CircuitBreakerEvent::CallPermitted { breaker, .. }
            | CircuitBreakerEvent::CallRejected { breaker, .. }
            | CircuitBreakerEvent::StateTransition { breaker, .. }
            | CircuitBreakerEvent::SuccessRecorded { breaker, .. }
            | CircuitBreakerEvent::FailureRecorded { breaker, .. }
            | CircuitBreakerEvent::PermissionReleased { breaker, .. }
            | CircuitBreakerEvent::CallCancelled { breaker, .. }
            | CircuitBreakerEvent::SlowCallDetected { breaker, .. } => breaker,
        }
    }
}
