//! Diff engine
//!
//! Computes a structured delta between two architecture snapshots:
//! service add/update/remove entries, an opaque routing change, and an
//! informational resource-policy change.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{ArchitectureSnapshot, RoutingConfig, ServiceSpec};

/// One service-level difference between two snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ServiceChange {
    /// Present in target only; carries the full target config
    Add {
        service_id: String,
        config: ServiceSpec,
    },
    /// Present in both with differing fields; carries the changed field
    /// names and the full target config (never a sparse patch)
    Update {
        service_id: String,
        changed_fields: Vec<String>,
        config: ServiceSpec,
    },
    /// Present in current only
    Remove { service_id: String },
}

impl ServiceChange {
    pub fn service_id(&self) -> &str {
        match self {
            ServiceChange::Add { service_id, .. }
            | ServiceChange::Update { service_id, .. }
            | ServiceChange::Remove { service_id } => service_id,
        }
    }
}

/// Structured delta between two snapshots.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Delta {
    /// Service-level changes, target-order adds/updates then removals
    pub services: Vec<ServiceChange>,
    /// Full target routing when it is set and differs from the current one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing: Option<RoutingConfig>,
    /// Resource-policy change; computed but consumed by no step type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Value>,
}

impl Delta {
    /// Check whether the delta carries no actionable change.
    pub fn is_empty(&self) -> bool {
        self.services.is_empty() && self.routing.is_none()
    }
}

/// Compute the structured delta carrying `from` to `to`.
pub fn diff(from: &ArchitectureSnapshot, to: &ArchitectureSnapshot) -> Delta {
    let mut services = Vec::new();

    for (service_id, target) in &to.services {
        match from.services.get(service_id) {
            None => services.push(ServiceChange::Add {
                service_id: service_id.clone(),
                config: target.clone(),
            }),
            Some(current) => {
                let changed_fields = current.changed_fields(target);
                if !changed_fields.is_empty() {
                    services.push(ServiceChange::Update {
                        service_id: service_id.clone(),
                        changed_fields,
                        config: target.clone(),
                    });
                }
            }
        }
    }

    for service_id in from.services.keys() {
        if !to.services.contains_key(service_id) {
            services.push(ServiceChange::Remove {
                service_id: service_id.clone(),
            });
        }
    }

    let routing = match &to.routing {
        Some(target) if from.routing.as_ref() != Some(target) => Some(target.clone()),
        _ => None,
    };

    let resources = match &to.resources {
        Some(target) if from.resources.as_ref() != Some(target) => Some(target.clone()),
        _ => None,
    };

    Delta {
        services,
        routing,
        resources,
    }
}
