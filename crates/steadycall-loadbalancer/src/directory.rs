//! Instance directories.
//!
//! A directory answers "which instances serve this logical service right
//! now". Discovery itself lives elsewhere; adapters implement
//! [`InstanceDirectory`] on top of whatever registry is in use.

use futures::future::{self, BoxFuture, FutureExt};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use steadycall_core::ServiceInstance;

/// Source of candidate instances for a logical service.
pub trait InstanceDirectory: Send + Sync {
    /// Current instances of `service`. An unknown service yields an empty
    /// list.
    fn list_instances(&self, service: &str) -> BoxFuture<'_, Vec<ServiceInstance>>;
}

impl<D> InstanceDirectory for Arc<D>
where
    D: InstanceDirectory + ?Sized,
{
    fn list_instances(&self, service: &str) -> BoxFuture<'_, Vec<ServiceInstance>> {
        (**self).list_instances(service)
    }
}

/// A directory backed by an in-memory table.
///
/// Lists can be replaced at runtime, which makes it usable both for fixed
/// deployments and as a test double for a real registry.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    services: RwLock<HashMap<String, Vec<ServiceInstance>>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `service` with its instances.
    pub fn with_service(
        self,
        service: impl Into<String>,
        instances: impl IntoIterator<Item = ServiceInstance>,
    ) -> Self {
        self.replace(service, instances);
        self
    }

    /// Replaces the instances of `service`.
    pub fn replace(
        &self,
        service: impl Into<String>,
        instances: impl IntoIterator<Item = ServiceInstance>,
    ) {
        self.services
            .write()
            .insert(service.into(), instances.into_iter().collect());
    }

    /// Forgets `service`.
    pub fn remove(&self, service: &str) {
        self.services.write().remove(service);
    }
}

impl InstanceDirectory for StaticDirectory {
    fn list_instances(&self, service: &str) -> BoxFuture<'_, Vec<ServiceInstance>> {
        let instances = self
            .services
            .read()
            .get(service)
            .cloned()
            .unwrap_or_default();
        future::ready(instances).boxed()
    }
}

/// Keeps only instances in the caller's own zone.
///
/// Zones never call each other: when the local zone is unknown or no
/// instance shares it, the list is empty rather than falling back to other
/// zones. Zone names compare case-insensitively.
#[derive(Debug)]
pub struct SameZoneOnly<D> {
    inner: D,
    zone: Option<String>,
}

impl<D> SameZoneOnly<D> {
    pub fn new(inner: D, zone: Option<String>) -> Self {
        Self { inner, zone }
    }

    /// The local zone.
    pub fn zone(&self) -> Option<&str> {
        self.zone.as_deref()
    }

    fn filter(&self, instances: Vec<ServiceInstance>) -> Vec<ServiceInstance> {
        let Some(zone) = self.zone.as_deref() else {
            tracing::warn!("local zone unknown, no instances are eligible");
            return Vec::new();
        };
        instances
            .into_iter()
            .filter(|instance| {
                instance
                    .zone()
                    .is_some_and(|instance_zone| instance_zone.eq_ignore_ascii_case(zone))
            })
            .collect()
    }
}

impl<D> InstanceDirectory for SameZoneOnly<D>
where
    D: InstanceDirectory,
{
    fn list_instances(&self, service: &str) -> BoxFuture<'_, Vec<ServiceInstance>> {
        let listing = self.inner.list_instances(service);
        async move {
            let instances = self.filter(listing.await);
            if instances.is_empty() {
                tracing::debug!(zone = ?self.zone, "no instances in the local zone");
            }
            instances
        }
        .boxed()
    }
}
