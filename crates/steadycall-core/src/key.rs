//! Keys that scope per-target state and per-call state.

use rand::Rng;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Identifies the scope of a circuit breaker or bulkhead.
///
/// Bulkheads are scoped per instance (`host:port`); circuit breakers per
/// instance and method (`host:port#method`). The string form round-trips
/// through [`TargetKey::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetKey {
    host: Arc<str>,
    port: u16,
    method: Option<Arc<str>>,
}

/// A string could not be decoded into a [`TargetKey`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseTargetKeyError {
    /// No `host:port` separator was found.
    #[error("target key `{0}` has no port")]
    MissingPort(String),
    /// The port was not a valid `u16`.
    #[error("target key `{0}` has an invalid port")]
    InvalidPort(String),
    /// Host part was empty.
    #[error("target key `{0}` has an empty host")]
    EmptyHost(String),
}

impl TargetKey {
    /// Instance scope, used by bulkheads.
    pub fn instance(host: impl AsRef<str>, port: u16) -> Self {
        Self {
            host: Arc::from(host.as_ref()),
            port,
            method: None,
        }
    }

    /// Instance plus method scope, used by circuit breakers.
    pub fn method(host: impl AsRef<str>, port: u16, method: impl AsRef<str>) -> Self {
        Self {
            host: Arc::from(host.as_ref()),
            port,
            method: Some(Arc::from(method.as_ref())),
        }
    }

    /// Decodes the string form produced by `Display`.
    pub fn parse(s: &str) -> Result<Self, ParseTargetKeyError> {
        let (address, method) = match s.split_once('#') {
            Some((address, method)) => (address, Some(method)),
            None => (s, None),
        };
        let (host, port) = address
            .rsplit_once(':')
            .ok_or_else(|| ParseTargetKeyError::MissingPort(s.to_string()))?;
        if host.is_empty() {
            return Err(ParseTargetKeyError::EmptyHost(s.to_string()));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| ParseTargetKeyError::InvalidPort(s.to_string()))?;
        Ok(Self {
            host: Arc::from(host),
            port,
            method: method.map(Arc::from),
        })
    }

    /// Host part.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port part.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Method part, if this is a method-scoped key.
    pub fn method_name(&self) -> Option<&str> {
        self.method.as_deref()
    }

    /// The instance-scoped key this key belongs to.
    pub fn to_instance(&self) -> TargetKey {
        Self {
            host: Arc::clone(&self.host),
            port: self.port,
            method: None,
        }
    }
}

impl fmt::Display for TargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.method {
            Some(method) => write!(f, "{}:{}#{}", self.host, self.port, method),
            None => write!(f, "{}:{}", self.host, self.port),
        }
    }
}

impl FromStr for TargetKey {
    type Err = ParseTargetKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Identity of one logical call, stable across its retries and across the
/// threads that cooperate on it (a trace or request id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationId(Arc<str>);

impl CorrelationId {
    /// Wraps an existing id, e.g. an inbound trace id.
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// A fresh random id for calls that arrive without one.
    pub fn generate() -> Self {
        let value: u64 = rand::rng().random();
        Self(Arc::from(format!("{value:016x}")))
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CorrelationId {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}
