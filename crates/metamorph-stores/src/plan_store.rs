//! PlanStore in-memory implementation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use metamorph_core::store::{PlanStore, StoreError};
use metamorph_core::types::TransformationPlan;

/// In-memory plan persistence for development and testing.
pub struct InMemoryPlanStore {
    plans: RwLock<HashMap<String, TransformationPlan>>,
}

impl InMemoryPlanStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            plans: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryPlanStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlanStore for InMemoryPlanStore {
    async fn save(&self, plan: &TransformationPlan) -> Result<(), StoreError> {
        let mut plans = self
            .plans
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        plans.insert(plan.id.clone(), plan.clone());
        Ok(())
    }

    async fn load(&self, plan_id: &str) -> Result<Option<TransformationPlan>, StoreError> {
        let plans = self
            .plans
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(plans.get(plan_id).cloned())
    }

    async fn list(&self) -> Result<Vec<TransformationPlan>, StoreError> {
        let plans = self
            .plans
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        let mut all: Vec<TransformationPlan> = plans.values().cloned().collect();
        all.sort_by_key(|p| p.created_at);
        Ok(all)
    }

    async fn delete(&self, plan_id: &str) -> Result<bool, StoreError> {
        let mut plans = self
            .plans
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(plans.remove(plan_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metamorph_core::types::ArchitectureSnapshot;

    #[tokio::test]
    async fn test_save_load_list_delete() {
        let store = InMemoryPlanStore::new();
        let plan = TransformationPlan::new(
            "scale",
            "scale out",
            ArchitectureSnapshot::new(1),
            ArchitectureSnapshot::new(1),
        );

        store.save(&plan).await.unwrap();
        let loaded = store.load(&plan.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "scale");

        assert_eq!(store.list().await.unwrap().len(), 1);
        assert!(store.delete(&plan.id).await.unwrap());
        assert!(!store.delete(&plan.id).await.unwrap());
        assert!(store.load(&plan.id).await.unwrap().is_none());
    }
}
