//! Version-preferring candidate filter.

use steadycall_core::ServiceInstance;

/// Keeps the instances whose version metadata equals `version`.
///
/// Versions compare exactly. When `version` is `None`, or no instance
/// carries it, all of `instances` are returned so a gray release never
/// leaves a call without candidates.
pub fn prefer_version(instances: Vec<ServiceInstance>, version: Option<&str>) -> Vec<ServiceInstance> {
    let Some(version) = version else {
        return instances;
    };

    let matching: Vec<_> = instances
        .iter()
        .filter(|instance| instance.version() == Some(version))
        .cloned()
        .collect();

    if matching.is_empty() {
        tracing::debug!(version, "no instance runs the requested version, using all");
        instances
    } else {
        matching
    }
}
