//! Message types for actor communication

use tokio::sync::oneshot;

/// Commands that can be sent to the SchedulerActor
#[derive(Debug)]
pub enum SchedulerCommand {
    /// Start a collection cycle immediately
    ///
    /// Supersedes a cycle already in flight: the old one is abandoned
    /// unpublished and a fresh cycle starts from scratch.
    CycleNow {
        /// Acknowledged once the requested cycle's snapshot is published
        respond_to: oneshot::Sender<anyhow::Result<()>>,
    },

    /// Update the cycle interval
    ///
    /// Takes effect after the current cycle (if any) completes.
    UpdateInterval {
        /// New interval in seconds
        interval_secs: u64,
    },

    /// Gracefully shut down the scheduler
    ///
    /// An in-flight cycle is abandoned; its fetches are dropped and
    /// nothing from it is published.
    Shutdown,
}
