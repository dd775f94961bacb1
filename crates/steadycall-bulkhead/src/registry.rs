use crate::{Bulkhead, BulkheadConfig};
use std::collections::HashMap;
use std::sync::Arc;
use steadycall_core::{KeyedStore, TargetKey};

/// Lazily creates and shares one bulkhead per instance key.
pub struct BulkheadRegistry {
    default_config: Arc<BulkheadConfig>,
    client_configs: HashMap<String, Arc<BulkheadConfig>>,
    bulkheads: KeyedStore<TargetKey, Bulkhead>,
}

impl BulkheadRegistry {
    pub fn new(default_config: BulkheadConfig) -> Self {
        Self {
            default_config: Arc::new(default_config),
            client_configs: HashMap::new(),
            bulkheads: KeyedStore::new(),
        }
    }

    /// Registers a configuration for calls made on behalf of `client`.
    pub fn with_client_config(mut self, client: impl Into<String>, config: BulkheadConfig) -> Self {
        self.client_configs.insert(client.into(), Arc::new(config));
        self
    }

    /// Configuration used for `client`.
    pub fn config_for(&self, client: &str) -> Arc<BulkheadConfig> {
        self.client_configs
            .get(client)
            .map(Arc::clone)
            .unwrap_or_else(|| Arc::clone(&self.default_config))
    }

    /// Returns the bulkhead for `key`, creating it on first use.
    ///
    /// Method-scoped keys are reduced to their instance.
    pub fn bulkhead(&self, client: &str, key: &TargetKey) -> Arc<Bulkhead> {
        let key = key.to_instance();
        self.bulkheads.get_or_create(&key, |key| {
            #[cfg(feature = "tracing")]
            tracing::debug!(bulkhead = %key, client, "creating bulkhead");
            Bulkhead::with_shared_config(key.clone(), self.config_for(client))
        })
    }

    pub fn get(&self, key: &TargetKey) -> Option<Arc<Bulkhead>> {
        self.bulkheads.get(&key.to_instance())
    }

    pub fn len(&self) -> usize {
        self.bulkheads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bulkheads.is_empty()
    }
}

impl Default for BulkheadRegistry {
    fn default() -> Self {
        Self::new(BulkheadConfig::default())
    }
}

impl std::fmt::Debug for BulkheadRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkheadRegistry")
            .field("clients", &self.client_configs.keys().collect::<Vec<_>>())
            .field("bulkheads", &self.bulkheads.len())
            .finish()
    }
}
