//! StateStore trait - versioned, append-only snapshot history.

use async_trait::async_trait;

use crate::types::ArchitectureSnapshot;

use super::StoreError;

/// Versioned, append-only history of whole-topology snapshots.
///
/// Versions are strictly increasing and contiguous; the most recent entry is
/// "current". History is never deleted by this component.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// The latest snapshot. Fails with Uninitialized when none exists.
    async fn current(&self) -> Result<ArchitectureSnapshot, StoreError>;

    /// Append a snapshot. Requires `snapshot.version == current().version + 1`
    /// (or version 1 for the first snapshot); otherwise VersionConflict.
    /// The version check and the write are atomic with respect to other
    /// writers.
    async fn append(&self, snapshot: ArchitectureSnapshot) -> Result<(), StoreError>;

    /// The most recent `limit` snapshots, newest last.
    async fn history(&self, limit: usize) -> Result<Vec<ArchitectureSnapshot>, StoreError>;
}
