//! Selector behavior as seen by callers.
//!
//! - fairness.rs: spread of selections within one call
//! - ordering.rs: health and history based ordering

use steadycall_core::ServiceInstance;

mod fairness;
mod ordering;

/// `n` instances, each in its own subnet.
pub fn spread_instances(n: usize) -> Vec<ServiceInstance> {
    (0..n)
        .map(|i| ServiceInstance::new(format!("10.0.{i}.1"), 8080))
        .collect()
}
