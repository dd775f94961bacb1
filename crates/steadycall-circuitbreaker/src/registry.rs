use crate::{CircuitBreaker, CircuitBreakerConfig};
use std::collections::HashMap;
use std::sync::Arc;
use steadycall_core::{KeyedStore, TargetKey};

/// Lazily creates and shares one breaker per target key.
///
/// Configurations are registered per client name; a client without its own
/// configuration uses the default one. The first client to touch a key
/// decides which configuration that breaker gets.
pub struct CircuitBreakerRegistry {
    default_config: Arc<CircuitBreakerConfig>,
    client_configs: HashMap<String, Arc<CircuitBreakerConfig>>,
    breakers: KeyedStore<TargetKey, CircuitBreaker>,
}

impl CircuitBreakerRegistry {
    /// Creates a registry whose breakers all use `default_config`.
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        crate::describe_metrics();
        Self {
            default_config: Arc::new(default_config),
            client_configs: HashMap::new(),
            breakers: KeyedStore::new(),
        }
    }

    /// Registers a configuration for calls made on behalf of `client`.
    pub fn with_client_config(
        mut self,
        client: impl Into<String>,
        config: CircuitBreakerConfig,
    ) -> Self {
        self.client_configs.insert(client.into(), Arc::new(config));
        self
    }

    /// Configuration used for `client`.
    pub fn config_for(&self, client: &str) -> Arc<CircuitBreakerConfig> {
        self.client_configs
            .get(client)
            .map(Arc::clone)
            .unwrap_or_else(|| Arc::clone(&self.default_config))
    }

    /// Returns the breaker for `key`, creating it on first use.
    pub fn breaker(&self, client: &str, key: &TargetKey) -> Arc<CircuitBreaker> {
        self.breakers.get_or_create(key, |key| {
            #[cfg(feature = "tracing")]
            tracing::debug!(breaker = %key, client, "creating circuit breaker");
            CircuitBreaker::new(key.clone(), self.config_for(client))
        })
    }

    /// Returns the breaker for `key` if one was created.
    pub fn get(&self, key: &TargetKey) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(key)
    }

    /// Number of breakers created so far.
    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    /// Keys of every breaker created so far.
    pub fn keys(&self) -> Vec<TargetKey> {
        self.breakers.keys()
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl std::fmt::Debug for CircuitBreakerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerRegistry")
            .field("clients", &self.client_configs.keys().collect::<Vec<_>>())
            .field("breakers", &self.breakers.len())
            .finish()
    }
}
