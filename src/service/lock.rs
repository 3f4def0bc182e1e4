//! Per-workspace mutual exclusion

use crate::domain::EntityId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry handing out one async mutex per workspace.
///
/// Holding the guard serializes every load → recompute → save → propagate
/// sequence on that workspace. Different workspaces never contend.
#[derive(Debug, Default)]
pub struct WorkspaceLocks {
    locks: Mutex<HashMap<EntityId, Arc<Mutex<()>>>>,
}

impl WorkspaceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `workspace_id`
    pub async fn acquire(&self, workspace_id: EntityId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Entries nobody holds or waits on
            locks.retain(|id, lock| *id == workspace_id || Arc::strong_count(lock) > 1);
            locks.entry(workspace_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Number of workspaces with a live lock entry
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.locks.lock().await.is_empty()
    }
}
