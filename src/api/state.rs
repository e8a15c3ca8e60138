//! API shared state

use crate::store::SnapshotStore;

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Read-only view of the latest published snapshot
    pub store: SnapshotStore,
}

impl ApiState {
    pub fn new(store: SnapshotStore) -> Self {
        Self { store }
    }
}
