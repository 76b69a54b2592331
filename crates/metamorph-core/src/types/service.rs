//! Service descriptor definitions
//!
//! ServiceDescriptor is the registry-owned record of one running service:
//! declared configuration, capability tags, and heartbeat-driven liveness.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Liveness status of a registered service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    /// Registered but not yet serving traffic
    Starting,
    /// Healthy and heartbeating
    #[default]
    Active,
    /// Missed heartbeats beyond the configured timeout
    Degraded,
    /// Missed heartbeats beyond twice the configured timeout
    Offline,
    /// Explicitly deregistered; terminal
    Deleted,
}

impl ServiceStatus {
    /// Check whether the service is expected to answer lifecycle calls.
    pub fn is_reachable(&self) -> bool {
        matches!(self, ServiceStatus::Starting | ServiceStatus::Active)
    }

    /// Check whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ServiceStatus::Deleted)
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ServiceStatus::Starting => "starting",
            ServiceStatus::Active => "active",
            ServiceStatus::Degraded => "degraded",
            ServiceStatus::Offline => "offline",
            ServiceStatus::Deleted => "deleted",
        };
        f.write_str(label)
    }
}

fn default_scaling_factor() -> f64 {
    1.0
}

/// Registry-owned record of one service.
///
/// Mutated only through register/update/heartbeat/deregister operations on
/// the registry; never shared mutably outside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// Unique service identifier
    pub service_id: String,
    /// Network endpoint, e.g. "http://orders:8000"
    pub endpoint: String,
    /// Capability tags (order-irrelevant)
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Identifiers of services this one depends on
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Positive scaling factor
    #[serde(default = "default_scaling_factor")]
    pub scaling_factor: f64,
    /// Resource name -> allocated units (cpu, memory, ...)
    #[serde(default)]
    pub resource_allocation: HashMap<String, f64>,
    /// Current liveness status
    #[serde(default)]
    pub status: ServiceStatus,
    /// Free-form metadata
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    /// Timestamp of the last received heartbeat
    #[serde(default)]
    pub last_heartbeat: Option<DateTime<Utc>>,
}

impl ServiceDescriptor {
    /// Create a descriptor with the given id and endpoint and defaults elsewhere.
    pub fn new(service_id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            endpoint: endpoint.into(),
            capabilities: Vec::new(),
            dependencies: Vec::new(),
            scaling_factor: default_scaling_factor(),
            resource_allocation: HashMap::new(),
            status: ServiceStatus::default(),
            metadata: HashMap::new(),
            last_heartbeat: None,
        }
    }

    /// Set capability tags
    pub fn with_capabilities(mut self, capabilities: Vec<String>) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Set the liveness status
    pub fn with_status(mut self, status: ServiceStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the resource allocation
    pub fn with_resources(mut self, resource_allocation: HashMap<String, f64>) -> Self {
        self.resource_allocation = resource_allocation;
        self
    }

    /// Stamp the last-heartbeat timestamp to now.
    pub fn touch_heartbeat(&mut self) {
        self.last_heartbeat = Some(Utc::now());
    }

    /// Check whether this service's capability set covers the requirement.
    pub fn has_capabilities(&self, required: &[String]) -> bool {
        required.iter().all(|cap| self.capabilities.contains(cap))
    }
}

/// Periodic liveness signal from a managed service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub service_id: String,
    /// Status the service reports for itself
    #[serde(default)]
    pub status: ServiceStatus,
    /// Metadata to merge into the descriptor
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

/// Capability-based discovery query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceQuery {
    /// Capabilities the service must all carry
    #[serde(default)]
    pub capabilities: Option<Vec<String>>,
    /// Required status
    #[serde(default)]
    pub status: Option<ServiceStatus>,
    /// Minimum scaling factor
    #[serde(default)]
    pub min_scaling_factor: Option<f64>,
}

/// One recorded status transition (old -> new) for observability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChange {
    pub timestamp: DateTime<Utc>,
    pub service_id: String,
    pub old_status: Option<ServiceStatus>,
    pub new_status: ServiceStatus,
    /// Why the transition happened, e.g. "heartbeat_timeout"
    #[serde(default)]
    pub reason: Option<String>,
}

/// Action recorded in a service's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Register,
    Update,
    Deregister,
}

/// One entry of a service's registration history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub action: HistoryAction,
    pub status: ServiceStatus,
    pub endpoint: String,
    pub capabilities: Vec<String>,
}

impl HistoryEntry {
    /// Build a history entry from the descriptor's current shape.
    pub fn of(descriptor: &ServiceDescriptor, action: HistoryAction) -> Self {
        Self {
            timestamp: Utc::now(),
            action,
            status: descriptor.status,
            endpoint: descriptor.endpoint.clone(),
            capabilities: descriptor.capabilities.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_superset_check() {
        let descriptor = ServiceDescriptor::new("orders", "http://orders:8000")
            .with_capabilities(vec!["order_processing".to_string(), "audit".to_string()]);

        assert!(descriptor.has_capabilities(&["audit".to_string()]));
        assert!(descriptor
            .has_capabilities(&["audit".to_string(), "order_processing".to_string()]));
        assert!(!descriptor.has_capabilities(&["payments".to_string()]));
        assert!(descriptor.has_capabilities(&[]));
    }

    #[test]
    fn test_status_predicates() {
        assert!(ServiceStatus::Active.is_reachable());
        assert!(ServiceStatus::Starting.is_reachable());
        assert!(!ServiceStatus::Offline.is_reachable());
        assert!(ServiceStatus::Deleted.is_terminal());
        assert!(!ServiceStatus::Degraded.is_terminal());
    }

    #[test]
    fn test_descriptor_serde_defaults() {
        let raw = r#"{"service_id":"users","endpoint":"http://users:8000"}"#;
        let descriptor: ServiceDescriptor = serde_json::from_str(raw).unwrap();
        assert_eq!(descriptor.status, ServiceStatus::Active);
        assert_eq!(descriptor.scaling_factor, 1.0);
        assert!(descriptor.capabilities.is_empty());
        assert!(descriptor.last_heartbeat.is_none());
    }
}
