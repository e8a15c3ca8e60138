//! Actor-based collection scheduling
//!
//! The scheduler runs as an independent async task communicating via
//! Tokio channels:
//!
//! ```text
//! Timer tick ──▶ SchedulerActor ──▶ CollectionEngine::run_cycle
//!      ▲               │                      │
//!      │               │ publish              ▼
//!  Commands            └──────────▶ SnapshotStore ◀── API handlers
//!  (CycleNow, UpdateInterval, Shutdown)
//! ```
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: an mpsc channel carries control messages to the actor
//! 2. **Request/Response**: oneshot channels acknowledge triggered cycles
//! 3. **Publication**: completed snapshots go to the store, never partial ones

pub mod messages;
pub mod scheduler;
