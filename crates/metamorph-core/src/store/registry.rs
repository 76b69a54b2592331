//! ServiceRegistry trait - authoritative mapping of service id to descriptor.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{
    HeartbeatRequest, HistoryEntry, ServiceDescriptor, ServiceQuery, ServiceSpec, ServiceStatus,
    StatusChange,
};

use super::StoreError;

/// Whether a register call created a new entry or replaced an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Registered,
    Updated,
}

/// Counts of registered services by status and capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSummary {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_capability: BTreeMap<String, usize>,
}

/// All unique capabilities across registered services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityReport {
    /// Sorted unique capability names
    pub capabilities: Vec<String>,
    pub count_by_capability: BTreeMap<String, usize>,
}

/// Authoritative service id -> descriptor mapping.
///
/// All writers go through these operations; descriptors are never mutated
/// from outside. Every status transition is recorded on the status-change
/// log for observability.
#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    /// Upsert a descriptor, stamping its last-heartbeat to now.
    async fn register(
        &self,
        descriptor: ServiceDescriptor,
    ) -> Result<RegistrationOutcome, StoreError>;

    /// Replace an existing descriptor. Fails with NotFound if absent and
    /// Mismatch if `service_id` differs from the descriptor's id. Preserves
    /// the prior last-heartbeat when the new descriptor carries none.
    async fn update(
        &self,
        service_id: &str,
        descriptor: ServiceDescriptor,
    ) -> Result<(), StoreError>;

    /// Look up one descriptor.
    async fn get(&self, service_id: &str) -> Result<Option<ServiceDescriptor>, StoreError>;

    /// List descriptors, optionally filtered by status.
    async fn list(&self, status: Option<ServiceStatus>)
        -> Result<Vec<ServiceDescriptor>, StoreError>;

    /// Capability-superset discovery query with optional status and
    /// scaling-factor constraints.
    async fn query(&self, query: &ServiceQuery) -> Result<Vec<ServiceDescriptor>, StoreError>;

    /// Remove a descriptor. Fails with NotFound if absent. `deleted` is
    /// terminal: the entry is removed, not flagged.
    async fn deregister(&self, service_id: &str) -> Result<ServiceDescriptor, StoreError>;

    /// Record a heartbeat: stamp last-heartbeat, adopt the reported status,
    /// merge metadata. Fails with NotFound/Mismatch on a bad identifier.
    async fn heartbeat(
        &self,
        service_id: &str,
        heartbeat: &HeartbeatRequest,
    ) -> Result<(), StoreError>;

    /// Registration history of one service.
    async fn history(&self, service_id: &str) -> Result<Vec<HistoryEntry>, StoreError>;

    /// The most recent status changes, oldest first.
    async fn status_changes(&self, limit: usize) -> Result<Vec<StatusChange>, StoreError>;

    /// Counts by status and capability.
    async fn summary(&self) -> Result<StatusSummary, StoreError>;

    /// Unique capabilities across all registered services.
    async fn capabilities(&self) -> Result<CapabilityReport, StoreError>;

    /// One pass of the heartbeat-driven health machine:
    /// active -> degraded after `heartbeat_timeout`, degraded -> offline
    /// after twice that. Returns the transitions it recorded.
    async fn sweep_health(
        &self,
        heartbeat_timeout: Duration,
    ) -> Result<Vec<StatusChange>, StoreError>;

    /// Reduced view of every registered service, keyed by id. Used to build
    /// the initial architecture snapshot.
    async fn snapshot_services(&self) -> Result<BTreeMap<String, ServiceSpec>, StoreError>;
}
