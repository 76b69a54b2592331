//! Architecture snapshot definitions
//!
//! ArchitectureSnapshot is a versioned, immutable description of the whole
//! topology at one point in time. A new snapshot is always a full copy with
//! version + 1, never a patch.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use super::service::{ServiceDescriptor, ServiceStatus};

fn default_scaling_factor() -> f64 {
    1.0
}

/// Reduced per-service view carried inside a snapshot.
///
/// The diff engine compares these field by field; the executor always applies
/// the full spec, never a sparse patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSpec {
    #[serde(default)]
    pub status: ServiceStatus,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub resource_allocation: HashMap<String, f64>,
    /// Endpoint override; defaults to `http://{service_id}:8000` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default = "default_scaling_factor")]
    pub scaling_factor: f64,
}

impl Default for ServiceSpec {
    fn default() -> Self {
        Self {
            status: ServiceStatus::default(),
            capabilities: Vec::new(),
            resource_allocation: HashMap::new(),
            endpoint: None,
            dependencies: Vec::new(),
            scaling_factor: default_scaling_factor(),
        }
    }
}

impl ServiceSpec {
    /// Names of the fields in which `target` differs from `self`.
    pub fn changed_fields(&self, target: &ServiceSpec) -> Vec<String> {
        let mut changed = Vec::new();
        if self.status != target.status {
            changed.push("status".to_string());
        }
        if self.capabilities != target.capabilities {
            changed.push("capabilities".to_string());
        }
        if self.resource_allocation != target.resource_allocation {
            changed.push("resource_allocation".to_string());
        }
        if self.endpoint != target.endpoint {
            changed.push("endpoint".to_string());
        }
        if self.dependencies != target.dependencies {
            changed.push("dependencies".to_string());
        }
        if self.scaling_factor != target.scaling_factor {
            changed.push("scaling_factor".to_string());
        }
        changed
    }

    /// Endpoint to use for lifecycle calls, applying the conventional default.
    pub fn endpoint_or_default(&self, service_id: &str) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("http://{service_id}:8000"))
    }
}

impl From<&ServiceDescriptor> for ServiceSpec {
    fn from(descriptor: &ServiceDescriptor) -> Self {
        Self {
            status: descriptor.status,
            capabilities: descriptor.capabilities.clone(),
            resource_allocation: descriptor.resource_allocation.clone(),
            endpoint: Some(descriptor.endpoint.clone()),
            dependencies: descriptor.dependencies.clone(),
            scaling_factor: descriptor.scaling_factor,
        }
    }
}

/// Routing configuration: named paths, each an ordered sequence of service ids.
///
/// Compared as an opaque value by the diff engine.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoutingConfig {
    pub paths: BTreeMap<String, Vec<String>>,
}

impl RoutingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named path.
    pub fn with_path(mut self, name: impl Into<String>, services: Vec<String>) -> Self {
        self.paths.insert(name.into(), services);
        self
    }
}

/// Versioned, immutable description of the whole topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchitectureSnapshot {
    /// Monotonically increasing, contiguous version number
    pub version: u64,
    /// Service id -> reduced view
    #[serde(default)]
    pub services: BTreeMap<String, ServiceSpec>,
    /// Optional routing configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing: Option<RoutingConfig>,
    /// Resource-policy metadata; informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Value>,
    /// Free-form metadata (last_updated, originating plan, ...)
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl ArchitectureSnapshot {
    /// Create an empty snapshot at the given version.
    pub fn new(version: u64) -> Self {
        Self {
            version,
            services: BTreeMap::new(),
            routing: None,
            resources: None,
            metadata: HashMap::new(),
        }
    }

    /// Add a service spec.
    pub fn with_service(mut self, service_id: impl Into<String>, spec: ServiceSpec) -> Self {
        self.services.insert(service_id.into(), spec);
        self
    }

    /// Set the routing configuration.
    pub fn with_routing(mut self, routing: RoutingConfig) -> Self {
        self.routing = Some(routing);
        self
    }

    /// Full copy at version + 1, stamped with the originating plan id.
    pub fn advanced_from(&self, plan_id: &str, next_version: u64) -> Self {
        let mut snapshot = self.clone();
        snapshot.version = next_version;
        snapshot.metadata.insert(
            "last_updated".to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );
        snapshot.metadata.insert(
            "transformation_plan".to_string(),
            Value::String(plan_id.to_string()),
        );
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_changed_fields_reports_each_difference() {
        let base = ServiceSpec {
            capabilities: vec!["x".to_string()],
            ..ServiceSpec::default()
        };
        let mut target = base.clone();
        assert!(base.changed_fields(&target).is_empty());

        target.capabilities.push("y".to_string());
        target.scaling_factor = 2.0;
        let changed = base.changed_fields(&target);
        assert_eq!(changed, vec!["capabilities", "scaling_factor"]);
    }

    #[test]
    fn test_endpoint_default_convention() {
        let spec = ServiceSpec::default();
        assert_eq!(spec.endpoint_or_default("orders"), "http://orders:8000");

        let spec = ServiceSpec {
            endpoint: Some("http://10.0.0.1:9000".to_string()),
            ..ServiceSpec::default()
        };
        assert_eq!(spec.endpoint_or_default("orders"), "http://10.0.0.1:9000");
    }

    #[test]
    fn test_advanced_from_is_full_copy_with_bumped_version() {
        let snapshot = ArchitectureSnapshot::new(3)
            .with_service("a", ServiceSpec::default())
            .with_routing(RoutingConfig::new().with_path("p1", vec!["a".to_string()]));

        let next = snapshot.advanced_from("plan-1", 4);
        assert_eq!(next.version, 4);
        assert_eq!(next.services, snapshot.services);
        assert_eq!(next.routing, snapshot.routing);
        assert!(next.metadata.contains_key("transformation_plan"));
    }
}
