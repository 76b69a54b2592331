//! StateStore in-memory implementation.

use async_trait::async_trait;
use std::sync::RwLock;
use tracing::info;

use metamorph_core::store::{StateStore, StoreError};
use metamorph_core::types::ArchitectureSnapshot;

/// In-memory append-only snapshot history.
///
/// The version check and the write happen under one exclusive lock, so a
/// concurrent append can never slip a non-contiguous version in between.
pub struct InMemoryStateStore {
    history: RwLock<Vec<ArchitectureSnapshot>>,
}

impl InMemoryStateStore {
    /// Create an empty, uninitialized store.
    pub fn new() -> Self {
        Self {
            history: RwLock::new(Vec::new()),
        }
    }

    /// Create a store seeded with an initial snapshot.
    pub fn with_initial(snapshot: ArchitectureSnapshot) -> Self {
        Self {
            history: RwLock::new(vec![snapshot]),
        }
    }
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn current(&self) -> Result<ArchitectureSnapshot, StoreError> {
        let history = self
            .history
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        history.last().cloned().ok_or(StoreError::Uninitialized)
    }

    async fn append(&self, snapshot: ArchitectureSnapshot) -> Result<(), StoreError> {
        let mut history = self
            .history
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;

        let expected = history.last().map(|s| s.version + 1).unwrap_or(1);
        if snapshot.version != expected {
            return Err(StoreError::VersionConflict {
                expected,
                got: snapshot.version,
            });
        }

        info!(version = snapshot.version, services = snapshot.services.len(), "architecture snapshot appended");
        history.push(snapshot);
        Ok(())
    }

    async fn history(&self, limit: usize) -> Result<Vec<ArchitectureSnapshot>, StoreError> {
        let history = self
            .history
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        let skip = history.len().saturating_sub(limit);
        Ok(history.iter().skip(skip).cloned().collect())
    }
}
