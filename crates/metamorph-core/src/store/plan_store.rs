//! PlanStore trait - transformation plan persistence.

use async_trait::async_trait;

use crate::types::TransformationPlan;

use super::StoreError;

/// Transformation plan persistence.
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Save (upsert) a plan.
    async fn save(&self, plan: &TransformationPlan) -> Result<(), StoreError>;

    /// Load a plan by id.
    async fn load(&self, plan_id: &str) -> Result<Option<TransformationPlan>, StoreError>;

    /// List all plans.
    async fn list(&self) -> Result<Vec<TransformationPlan>, StoreError>;

    /// Delete a plan; returns whether it existed.
    async fn delete(&self, plan_id: &str) -> Result<bool, StoreError>;
}
