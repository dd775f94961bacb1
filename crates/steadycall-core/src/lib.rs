//! Core vocabulary for steadycall.
//!
//! This crate holds what every other steadycall crate agrees on:
//! - [`ServiceInstance`]: one backend address plus descriptive metadata
//! - [`TargetKey`] and [`CorrelationId`]: scopes for per-target and per-call state
//! - [`InvocationError`] and [`FailureKind`]: the failure taxonomy
//! - [`EventListeners`]: observability hooks
//! - [`KeyedStore`]: lazily created keyed singletons

pub mod error;
pub mod events;
pub mod instance;
pub mod key;
pub mod store;

pub use error::{FailureKind, InvocationError, TransportError, TransportPhase};
pub use events::{EventListener, EventListeners, FnListener, InvocationEvent};
pub use instance::{ServiceInstance, VERSION_METADATA_KEY, ZONE_METADATA_KEY};
pub use key::{CorrelationId, ParseTargetKeyError, TargetKey};
pub use store::KeyedStore;

/// A response that carries an HTTP-like status code.
///
/// Breakers and the retry engine classify responses through this trait:
/// anything outside `200..300` counts as a failed outcome.
pub trait StatusResponse {
    /// The status code of the response.
    fn status(&self) -> u16;

    /// True for `2xx` statuses.
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status())
    }
}

impl StatusResponse for u16 {
    fn status(&self) -> u16 {
        *self
    }
}
