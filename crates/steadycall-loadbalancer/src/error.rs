use steadycall_core::InvocationError;

/// The candidate list was empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no instances available")]
pub struct NoInstancesError;

impl NoInstancesError {
    /// The call-level error for `service`.
    pub fn for_service(self, service: impl Into<String>) -> InvocationError {
        InvocationError::NoInstancesAvailable {
            service: service.into(),
        }
    }
}
