//! Latest-snapshot store
//!
//! The system never holds history: each collection cycle produces one
//! [`Snapshot`] that replaces the previous one wholesale. The store is
//! single-writer (the scheduler), multi-reader (API handlers), and
//! publication is one pointer swap, so readers always observe a
//! fully-formed snapshot.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::CanonicalMetricRecord;

/// The complete result set of one collection cycle
///
/// Exactly one record per configured target, in configuration order.
/// Hosts whose collection failed appear with `reachable = false` - they
/// are never silently dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub records: Vec<CanonicalMetricRecord>,
    pub collected_at: DateTime<Utc>,
}

impl Snapshot {
    /// Placeholder served before the first cycle completes.
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            collected_at: Utc::now(),
        }
    }
}

/// Holds the most recent completed snapshot
#[derive(Clone)]
pub struct SnapshotStore {
    inner: Arc<RwLock<Arc<Snapshot>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(Snapshot::empty()))),
        }
    }

    /// Replace the published snapshot in full.
    pub async fn publish(&self, snapshot: Snapshot) {
        *self.inner.write().await = Arc::new(snapshot);
    }

    /// The last published snapshot.
    ///
    /// Keeps serving the previous cycle's result while a new cycle is in
    /// flight or after one failed outright.
    pub async fn latest(&self) -> Arc<Snapshot> {
        self.inner.read().await.clone()
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}
