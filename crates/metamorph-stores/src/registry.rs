//! ServiceRegistry in-memory implementation.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::RwLock;
use std::time::Duration;
use tracing::{info, warn};

use metamorph_core::store::{
    CapabilityReport, RegistrationOutcome, ServiceRegistry, StatusSummary, StoreError,
};
use metamorph_core::types::{
    HeartbeatRequest, HistoryAction, HistoryEntry, ServiceDescriptor, ServiceQuery, ServiceSpec,
    ServiceStatus, StatusChange,
};

const DEFAULT_STATUS_CHANGE_LIMIT: usize = 10_000;
const DEFAULT_HISTORY_LIMIT: usize = 1_000;

#[derive(Default)]
struct RegistryInner {
    services: HashMap<String, ServiceDescriptor>,
    history: HashMap<String, Vec<HistoryEntry>>,
    status_changes: VecDeque<StatusChange>,
}

impl RegistryInner {
    fn record_status_change(
        &mut self,
        service_id: &str,
        old_status: Option<ServiceStatus>,
        new_status: ServiceStatus,
        reason: Option<&str>,
    ) -> StatusChange {
        let change = StatusChange {
            timestamp: Utc::now(),
            service_id: service_id.to_string(),
            old_status,
            new_status,
            reason: reason.map(|r| r.to_string()),
        };
        self.status_changes.push_back(change.clone());
        while self.status_changes.len() > DEFAULT_STATUS_CHANGE_LIMIT {
            self.status_changes.pop_front();
        }
        change
    }

    fn record_history(&mut self, service_id: &str, entry: HistoryEntry) {
        let entries = self.history.entry(service_id.to_string()).or_default();
        entries.push(entry);
        if entries.len() > DEFAULT_HISTORY_LIMIT {
            let excess = entries.len() - DEFAULT_HISTORY_LIMIT;
            entries.drain(..excess);
        }
    }
}

/// In-memory service registry for development and single-process deployments.
///
/// One exclusive lock covers descriptors, history, and the status-change log
/// so a health sweep never interleaves with a register or heartbeat.
pub struct InMemoryServiceRegistry {
    inner: RwLock<RegistryInner>,
}

impl InMemoryServiceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, RegistryInner>, StoreError> {
        self.inner
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, RegistryInner>, StoreError> {
        self.inner
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))
    }
}

impl Default for InMemoryServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ServiceRegistry for InMemoryServiceRegistry {
    async fn register(
        &self,
        mut descriptor: ServiceDescriptor,
    ) -> Result<RegistrationOutcome, StoreError> {
        descriptor.touch_heartbeat();

        let mut inner = self.write()?;
        let service_id = descriptor.service_id.clone();
        let previous_status = inner.services.get(&service_id).map(|s| s.status);
        let is_new = previous_status.is_none();

        let action = if is_new {
            HistoryAction::Register
        } else {
            HistoryAction::Update
        };
        inner.record_history(&service_id, HistoryEntry::of(&descriptor, action));

        if previous_status != Some(descriptor.status) {
            inner.record_status_change(&service_id, previous_status, descriptor.status, None);
        }

        info!(service_id = %service_id, new = is_new, status = %descriptor.status, "service registered");
        inner.services.insert(service_id, descriptor);

        Ok(if is_new {
            RegistrationOutcome::Registered
        } else {
            RegistrationOutcome::Updated
        })
    }

    async fn update(
        &self,
        service_id: &str,
        mut descriptor: ServiceDescriptor,
    ) -> Result<(), StoreError> {
        if service_id != descriptor.service_id {
            return Err(StoreError::Mismatch(format!(
                "path id '{service_id}' != descriptor id '{}'",
                descriptor.service_id
            )));
        }

        let mut inner = self.write()?;
        let existing = inner
            .services
            .get(service_id)
            .ok_or_else(|| StoreError::NotFound(service_id.to_string()))?;

        if descriptor.last_heartbeat.is_none() {
            descriptor.last_heartbeat = existing.last_heartbeat;
        }
        let old_status = existing.status;

        inner.record_history(service_id, HistoryEntry::of(&descriptor, HistoryAction::Update));

        if old_status != descriptor.status {
            inner.record_status_change(service_id, Some(old_status), descriptor.status, None);
        }

        inner.services.insert(service_id.to_string(), descriptor);
        Ok(())
    }

    async fn get(&self, service_id: &str) -> Result<Option<ServiceDescriptor>, StoreError> {
        Ok(self.read()?.services.get(service_id).cloned())
    }

    async fn list(
        &self,
        status: Option<ServiceStatus>,
    ) -> Result<Vec<ServiceDescriptor>, StoreError> {
        let inner = self.read()?;
        let mut services: Vec<ServiceDescriptor> = inner
            .services
            .values()
            .filter(|s| status.map(|wanted| s.status == wanted).unwrap_or(true))
            .cloned()
            .collect();
        services.sort_by(|a, b| a.service_id.cmp(&b.service_id));
        Ok(services)
    }

    async fn query(&self, query: &ServiceQuery) -> Result<Vec<ServiceDescriptor>, StoreError> {
        let inner = self.read()?;
        let mut results: Vec<ServiceDescriptor> = inner
            .services
            .values()
            .filter(|service| {
                if let Some(required) = &query.capabilities {
                    if !service.has_capabilities(required) {
                        return false;
                    }
                }
                if let Some(status) = query.status {
                    if service.status != status {
                        return false;
                    }
                }
                if let Some(min) = query.min_scaling_factor {
                    if service.scaling_factor < min {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect();
        results.sort_by(|a, b| a.service_id.cmp(&b.service_id));
        Ok(results)
    }

    async fn deregister(&self, service_id: &str) -> Result<ServiceDescriptor, StoreError> {
        let mut inner = self.write()?;
        let removed = inner
            .services
            .remove(service_id)
            .ok_or_else(|| StoreError::NotFound(service_id.to_string()))?;

        let mut entry = HistoryEntry::of(&removed, HistoryAction::Deregister);
        entry.status = ServiceStatus::Deleted;
        inner.record_history(service_id, entry);

        inner.record_status_change(
            service_id,
            Some(removed.status),
            ServiceStatus::Deleted,
            None,
        );

        info!(service_id, "service deregistered");
        Ok(removed)
    }

    async fn heartbeat(
        &self,
        service_id: &str,
        heartbeat: &HeartbeatRequest,
    ) -> Result<(), StoreError> {
        if service_id != heartbeat.service_id {
            return Err(StoreError::Mismatch(format!(
                "path id '{service_id}' != heartbeat id '{}'",
                heartbeat.service_id
            )));
        }

        let mut inner = self.write()?;
        let old_status = {
            let service = inner
                .services
                .get_mut(service_id)
                .ok_or_else(|| StoreError::NotFound(service_id.to_string()))?;
            let old_status = service.status;
            service.touch_heartbeat();
            service.status = heartbeat.status;
            for (key, value) in &heartbeat.metadata {
                service.metadata.insert(key.clone(), value.clone());
            }
            old_status
        };

        if old_status != heartbeat.status {
            inner.record_status_change(service_id, Some(old_status), heartbeat.status, None);
        }
        Ok(())
    }

    async fn history(&self, service_id: &str) -> Result<Vec<HistoryEntry>, StoreError> {
        let inner = self.read()?;
        inner
            .history
            .get(service_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(service_id.to_string()))
    }

    async fn status_changes(&self, limit: usize) -> Result<Vec<StatusChange>, StoreError> {
        let inner = self.read()?;
        let skip = inner.status_changes.len().saturating_sub(limit);
        Ok(inner.status_changes.iter().skip(skip).cloned().collect())
    }

    async fn summary(&self) -> Result<StatusSummary, StoreError> {
        let inner = self.read()?;
        let mut by_status: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_capability: BTreeMap<String, usize> = BTreeMap::new();

        for service in inner.services.values() {
            *by_status.entry(service.status.to_string()).or_default() += 1;
            for capability in &service.capabilities {
                *by_capability.entry(capability.clone()).or_default() += 1;
            }
        }

        Ok(StatusSummary {
            total: inner.services.len(),
            by_status,
            by_capability,
        })
    }

    async fn capabilities(&self) -> Result<CapabilityReport, StoreError> {
        let inner = self.read()?;
        let mut count_by_capability: BTreeMap<String, usize> = BTreeMap::new();
        for service in inner.services.values() {
            for capability in &service.capabilities {
                *count_by_capability.entry(capability.clone()).or_default() += 1;
            }
        }

        Ok(CapabilityReport {
            capabilities: count_by_capability.keys().cloned().collect(),
            count_by_capability,
        })
    }

    async fn sweep_health(
        &self,
        heartbeat_timeout: Duration,
    ) -> Result<Vec<StatusChange>, StoreError> {
        let now = Utc::now();
        let timeout_ms = heartbeat_timeout.as_millis() as i64;
        let mut transitions = Vec::new();

        let mut inner = self.write()?;
        let stale: Vec<(String, ServiceStatus, ServiceStatus, &'static str)> = inner
            .services
            .values()
            .filter_map(|service| {
                let last = service.last_heartbeat?;
                let silent_ms = now.signed_duration_since(last).num_milliseconds();
                match service.status {
                    ServiceStatus::Active if silent_ms > timeout_ms => Some((
                        service.service_id.clone(),
                        service.status,
                        ServiceStatus::Degraded,
                        "heartbeat_timeout",
                    )),
                    ServiceStatus::Degraded if silent_ms > timeout_ms * 2 => Some((
                        service.service_id.clone(),
                        service.status,
                        ServiceStatus::Offline,
                        "extended_heartbeat_timeout",
                    )),
                    _ => None,
                }
            })
            .collect();

        for (service_id, old_status, new_status, reason) in stale {
            if let Some(service) = inner.services.get_mut(&service_id) {
                service.status = new_status;
            }
            warn!(service_id = %service_id, from = %old_status, to = %new_status, reason, "health sweep transition");
            transitions.push(inner.record_status_change(
                &service_id,
                Some(old_status),
                new_status,
                Some(reason),
            ));
        }

        Ok(transitions)
    }

    async fn snapshot_services(&self) -> Result<BTreeMap<String, ServiceSpec>, StoreError> {
        let inner = self.read()?;
        Ok(inner
            .services
            .iter()
            .map(|(id, descriptor)| (id.clone(), ServiceSpec::from(descriptor)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn descriptor(id: &str, status: ServiceStatus) -> ServiceDescriptor {
        ServiceDescriptor::new(id, format!("http://{id}:8000"))
            .with_status(status)
            .with_capabilities(vec!["core".to_string()])
    }

    fn backdate_heartbeat(registry: &InMemoryServiceRegistry, id: &str, seconds: i64) {
        let mut inner = registry.inner.write().unwrap();
        let service = inner.services.get_mut(id).unwrap();
        service.last_heartbeat = Some(Utc::now() - ChronoDuration::seconds(seconds));
    }

    #[tokio::test]
    async fn test_register_then_update_records_history() {
        let registry = InMemoryServiceRegistry::new();

        let outcome = registry
            .register(descriptor("orders", ServiceStatus::Active))
            .await
            .unwrap();
        assert_eq!(outcome, RegistrationOutcome::Registered);

        let outcome = registry
            .register(descriptor("orders", ServiceStatus::Active))
            .await
            .unwrap();
        assert_eq!(outcome, RegistrationOutcome::Updated);

        let history = registry.history("orders").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].action, HistoryAction::Register);
        assert_eq!(history[1].action, HistoryAction::Update);

        let stored = registry.get("orders").await.unwrap().unwrap();
        assert!(stored.last_heartbeat.is_some());
    }

    #[tokio::test]
    async fn test_history_retention_drops_oldest_entries() {
        let registry = InMemoryServiceRegistry::new();
        registry
            .register(descriptor("orders", ServiceStatus::Active))
            .await
            .unwrap();

        for _ in 0..DEFAULT_HISTORY_LIMIT + 5 {
            registry
                .register(descriptor("orders", ServiceStatus::Active))
                .await
                .unwrap();
        }

        let history = registry.history("orders").await.unwrap();
        assert_eq!(history.len(), DEFAULT_HISTORY_LIMIT);
        // The initial register entry was evicted; only updates remain.
        assert!(history.iter().all(|e| e.action == HistoryAction::Update));
    }

    #[tokio::test]
    async fn test_update_preserves_heartbeat_and_checks_id() {
        let registry = InMemoryServiceRegistry::new();
        registry
            .register(descriptor("users", ServiceStatus::Active))
            .await
            .unwrap();
        let stamped = registry.get("users").await.unwrap().unwrap().last_heartbeat;

        let err = registry
            .update("users", descriptor("other", ServiceStatus::Active))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Mismatch(_)));

        registry
            .update("users", descriptor("users", ServiceStatus::Degraded))
            .await
            .unwrap();
        let updated = registry.get("users").await.unwrap().unwrap();
        assert_eq!(updated.status, ServiceStatus::Degraded);
        assert_eq!(updated.last_heartbeat, stamped);

        let err = registry
            .update("ghost", descriptor("ghost", ServiceStatus::Active))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_deregister_is_terminal_removal() {
        let registry = InMemoryServiceRegistry::new();
        registry
            .register(descriptor("legacy", ServiceStatus::Active))
            .await
            .unwrap();

        registry.deregister("legacy").await.unwrap();
        assert!(registry.get("legacy").await.unwrap().is_none());

        let err = registry.deregister("legacy").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));

        let changes = registry.status_changes(10).await.unwrap();
        assert_eq!(changes.last().unwrap().new_status, ServiceStatus::Deleted);
    }

    #[tokio::test]
    async fn test_query_filters_capabilities_status_and_scaling() {
        let registry = InMemoryServiceRegistry::new();
        let mut big = descriptor("big", ServiceStatus::Active);
        big.scaling_factor = 3.0;
        big.capabilities = vec!["core".to_string(), "search".to_string()];
        registry.register(big).await.unwrap();
        registry
            .register(descriptor("small", ServiceStatus::Degraded))
            .await
            .unwrap();

        let results = registry
            .query(&ServiceQuery {
                capabilities: Some(vec!["search".to_string()]),
                status: Some(ServiceStatus::Active),
                min_scaling_factor: Some(2.0),
            })
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].service_id, "big");

        let results = registry
            .query(&ServiceQuery {
                capabilities: Some(vec!["core".to_string()]),
                ..ServiceQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_heartbeat_resets_status_and_merges_metadata() {
        let registry = InMemoryServiceRegistry::new();
        registry
            .register(descriptor("orders", ServiceStatus::Offline))
            .await
            .unwrap();

        registry
            .heartbeat(
                "orders",
                &HeartbeatRequest {
                    service_id: "orders".to_string(),
                    status: ServiceStatus::Active,
                    metadata: HashMap::from([(
                        "region".to_string(),
                        serde_json::json!("eu-west"),
                    )]),
                },
            )
            .await
            .unwrap();

        let service = registry.get("orders").await.unwrap().unwrap();
        assert_eq!(service.status, ServiceStatus::Active);
        assert_eq!(service.metadata["region"], serde_json::json!("eu-west"));

        let err = registry
            .heartbeat(
                "orders",
                &HeartbeatRequest {
                    service_id: "payments".to_string(),
                    status: ServiceStatus::Active,
                    metadata: HashMap::new(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Mismatch(_)));
    }

    #[tokio::test]
    async fn test_health_sweep_degrades_then_offlines() {
        let registry = InMemoryServiceRegistry::new();
        registry
            .register(descriptor("orders", ServiceStatus::Active))
            .await
            .unwrap();

        // Silent for 11s with T=10s: active -> degraded, but not offline yet.
        backdate_heartbeat(&registry, "orders", 11);
        let transitions = registry
            .sweep_health(Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].new_status, ServiceStatus::Degraded);
        assert_eq!(transitions[0].reason.as_deref(), Some("heartbeat_timeout"));

        // Still under 2T: degraded holds.
        let transitions = registry
            .sweep_health(Duration::from_secs(10))
            .await
            .unwrap();
        assert!(transitions.is_empty());

        // Silent beyond 2T: degraded -> offline.
        backdate_heartbeat(&registry, "orders", 21);
        let transitions = registry
            .sweep_health(Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(transitions[0].new_status, ServiceStatus::Offline);

        // A heartbeat at any point resets to the reported status.
        registry
            .heartbeat(
                "orders",
                &HeartbeatRequest {
                    service_id: "orders".to_string(),
                    status: ServiceStatus::Active,
                    metadata: HashMap::new(),
                },
            )
            .await
            .unwrap();
        assert_eq!(
            registry.get("orders").await.unwrap().unwrap().status,
            ServiceStatus::Active
        );
    }

    #[tokio::test]
    async fn test_summary_and_capabilities() {
        let registry = InMemoryServiceRegistry::new();
        registry
            .register(descriptor("a", ServiceStatus::Active))
            .await
            .unwrap();
        registry
            .register(descriptor("b", ServiceStatus::Degraded))
            .await
            .unwrap();

        let summary = registry.summary().await.unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.by_status["active"], 1);
        assert_eq!(summary.by_status["degraded"], 1);
        assert_eq!(summary.by_capability["core"], 2);

        let report = registry.capabilities().await.unwrap();
        assert_eq!(report.capabilities, vec!["core".to_string()]);
        assert_eq!(report.count_by_capability["core"], 2);
    }
}
