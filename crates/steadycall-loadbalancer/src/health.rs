use steadycall_circuitbreaker::{CircuitBreakerRegistry, CircuitState};
use steadycall_core::ServiceInstance;

/// What the selector knows about an instance's recent behavior.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstanceHealth {
    pub state: CircuitState,
    /// Failure rate in `0.0..=1.0`.
    pub failure_rate: f64,
    /// Calls currently running against the instance.
    pub in_flight: usize,
}

impl InstanceHealth {
    /// A closed breaker with no failures and nothing in flight.
    pub const HEALTHY: InstanceHealth = InstanceHealth {
        state: CircuitState::Closed,
        failure_rate: 0.0,
        in_flight: 0,
    };
}

impl Default for InstanceHealth {
    fn default() -> Self {
        Self::HEALTHY
    }
}

/// Looks up the health of candidate instances during selection.
pub trait HealthLookup {
    fn health(&self, instance: &ServiceInstance) -> InstanceHealth;
}

impl<F> HealthLookup for F
where
    F: Fn(&ServiceInstance) -> InstanceHealth,
{
    fn health(&self, instance: &ServiceInstance) -> InstanceHealth {
        self(instance)
    }
}

/// Treats every instance as healthy.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHealth;

impl HealthLookup for NoHealth {
    fn health(&self, _instance: &ServiceInstance) -> InstanceHealth {
        InstanceHealth::HEALTHY
    }
}

/// Reads health from the breakers guarding one method of each instance.
///
/// Lookups never create breakers. A candidate without one has not been
/// called yet and counts as [`InstanceHealth::HEALTHY`].
#[derive(Debug, Clone, Copy)]
pub struct BreakerHealth<'a> {
    registry: &'a CircuitBreakerRegistry,
    method: &'a str,
}

impl<'a> BreakerHealth<'a> {
    pub fn new(registry: &'a CircuitBreakerRegistry, method: &'a str) -> Self {
        Self { registry, method }
    }
}

impl HealthLookup for BreakerHealth<'_> {
    fn health(&self, instance: &ServiceInstance) -> InstanceHealth {
        let Some(breaker) = self.registry.get(&instance.method_key(self.method)) else {
            return InstanceHealth::HEALTHY;
        };
        let metrics = breaker.metrics();
        InstanceHealth {
            state: breaker.state(),
            failure_rate: metrics.failure_rate,
            in_flight: metrics.in_flight,
        }
    }
}
