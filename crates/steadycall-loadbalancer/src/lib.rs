//! Client-side load balancing that cooperates with circuit breakers.
//!
//! - [`InstanceDirectory`] supplies candidates: [`StaticDirectory`] for fixed
//!   lists, [`SameZoneOnly`] to keep calls inside the local zone.
//! - [`prefer_version`] narrows candidates to a requested version during a
//!   gray release.
//! - [`Selector`] picks one candidate per attempt, spreading the retries of
//!   a call across hosts and subnets and steering away from unhealthy
//!   instances. Health comes from a [`HealthLookup`], usually
//!   [`BreakerHealth`] over a circuit breaker registry.
//!
//! ```rust
//! use steadycall_core::{CorrelationId, ServiceInstance};
//! use steadycall_loadbalancer::{NoHealth, Selector};
//!
//! let selector = Selector::new();
//! let candidates = vec![
//!     ServiceInstance::new("10.0.0.1", 8080),
//!     ServiceInstance::new("10.0.1.1", 8080),
//! ];
//! let call = CorrelationId::generate();
//!
//! let first = selector.select(&candidates, &call, &NoHealth).unwrap();
//! let retry = selector.select(&candidates, &call, &NoHealth).unwrap();
//! assert_ne!(first, retry);
//! ```

mod context;
mod directory;
mod error;
mod expiry;
mod health;
mod selector;
mod version;

pub use context::{CallContext, CURSOR_SEED_BOUND};
pub use directory::{InstanceDirectory, SameZoneOnly, StaticDirectory};
pub use error::NoInstancesError;
pub use health::{BreakerHealth, HealthLookup, InstanceHealth, NoHealth};
pub use selector::{SelectionMode, Selector, SelectorBuilder, DEFAULT_CONTEXT_TTL};
pub use version::prefer_version;
