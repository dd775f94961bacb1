use crate::key::TargetKey;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Metadata key holding the availability zone of an instance.
pub const ZONE_METADATA_KEY: &str = "zone";
/// Metadata key holding the deployed version of an instance.
pub const VERSION_METADATA_KEY: &str = "version";

/// One addressable backend of a logical service.
///
/// Equality and hashing use `host` and `port` only; metadata is descriptive.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ServiceInstance {
    host: String,
    port: u16,
    #[cfg_attr(feature = "serde", serde(default))]
    metadata: BTreeMap<String, String>,
}

impl ServiceInstance {
    /// An instance without metadata.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            metadata: BTreeMap::new(),
        }
    }

    /// Adds one metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// The `zone` metadata entry.
    pub fn zone(&self) -> Option<&str> {
        self.metadata.get(ZONE_METADATA_KEY).map(String::as_str)
    }

    /// The `version` metadata entry.
    pub fn version(&self) -> Option<&str> {
        self.metadata.get(VERSION_METADATA_KEY).map(String::as_str)
    }

    /// Host prefix up to the last `.`, used to spread retries across
    /// subnets. A host without dots is its own subnet.
    pub fn subnet(&self) -> &str {
        match self.host.rfind('.') {
            Some(idx) => &self.host[..idx],
            None => &self.host,
        }
    }

    /// Bulkhead scope of this instance.
    pub fn key(&self) -> TargetKey {
        TargetKey::instance(&self.host, self.port)
    }

    /// Breaker scope of this instance for `method`.
    pub fn method_key(&self, method: &str) -> TargetKey {
        TargetKey::method(&self.host, self.port, method)
    }
}

impl PartialEq for ServiceInstance {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host && self.port == other.port
    }
}

impl Eq for ServiceInstance {}

impl Hash for ServiceInstance {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.host.hash(state);
        self.port.hash(state);
    }
}

impl fmt::Display for ServiceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
