use steadycall_core::{InvocationError, TargetKey};
use thiserror::Error;

/// Error surfaced by the breaker stream gate.
#[derive(Debug, Error)]
pub enum CircuitBreakerError<E> {
    /// The breaker denied permission; the stream was never subscribed.
    #[error("circuit breaker `{key}` is open; call not permitted")]
    OpenCircuit {
        /// Breaker that denied the call.
        key: TargetKey,
    },

    /// An error produced by the guarded stream.
    #[error("inner stream error: {0}")]
    Inner(E),
}

impl<E> CircuitBreakerError<E> {
    /// Returns true if the breaker denied the call.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CircuitBreakerError::OpenCircuit { .. })
    }

    /// Returns the inner error if present.
    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitBreakerError::Inner(e) => Some(e),
            CircuitBreakerError::OpenCircuit { .. } => None,
        }
    }
}

impl<E> From<CircuitBreakerError<E>> for InvocationError
where
    E: Into<InvocationError>,
{
    fn from(err: CircuitBreakerError<E>) -> Self {
        match err {
            CircuitBreakerError::OpenCircuit { key } => InvocationError::CircuitOpen { key },
            CircuitBreakerError::Inner(e) => e.into(),
        }
    }
}
