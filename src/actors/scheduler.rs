//! SchedulerActor - drives collection cycles on an interval
//!
//! Only one cycle runs at a time. While a cycle is in flight the actor
//! keeps servicing its command channel, so a `Shutdown` (or a superseding
//! `CycleNow`) drops the cycle future mid-flight: in-flight fetches are
//! abandoned and an abandoned cycle never reaches the snapshot store.
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick → run cycle → publish Snapshot → SnapshotStore
//!     ↑
//!     └─── Commands (CycleNow, UpdateInterval, Shutdown)
//! ```

use std::future::Future;
use std::ops::ControlFlow;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot};
use tokio::time::interval;
use tracing::{debug, instrument, trace, warn};

use crate::orchestrator::CollectionEngine;
use crate::store::{Snapshot, SnapshotStore};

use super::messages::SchedulerCommand;

/// Actor owning the collection cadence for one configured fleet
pub struct SchedulerActor {
    engine: Arc<CollectionEngine>,

    /// Where completed cycles are published
    store: SnapshotStore,

    /// Command receiver for control messages
    command_rx: mpsc::Receiver<SchedulerCommand>,

    /// Current cycle interval
    interval_duration: Duration,
}

impl SchedulerActor {
    pub fn new(
        engine: Arc<CollectionEngine>,
        store: SnapshotStore,
        command_rx: mpsc::Receiver<SchedulerCommand>,
        interval_duration: Duration,
    ) -> Self {
        Self {
            engine,
            store,
            command_rx,
            interval_duration,
        }
    }

    /// Run the actor's main loop
    ///
    /// Runs until a Shutdown command is received or the command channel
    /// closes. The first tick fires immediately, so the store is populated
    /// right after startup.
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting scheduler actor");

        let mut ticker = interval(self.interval_duration);

        loop {
            let interval_before = self.interval_duration;

            tokio::select! {
                _ = ticker.tick() => {
                    if self.cycle(None).await.is_break() {
                        break;
                    }
                }

                command = self.command_rx.recv() => {
                    let Some(command) = command else {
                        warn!("command channel closed, shutting down");
                        break;
                    };
                    match command {
                        SchedulerCommand::CycleNow { respond_to } => {
                            debug!("received CycleNow command");
                            if self.cycle(Some(respond_to)).await.is_break() {
                                break;
                            }
                        }
                        SchedulerCommand::UpdateInterval { interval_secs } => {
                            debug!("updating interval to {interval_secs}s");
                            self.interval_duration = Duration::from_secs(interval_secs);
                        }
                        SchedulerCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }
            }

            if self.interval_duration != interval_before {
                ticker = interval(self.interval_duration);
            }
        }

        debug!("scheduler actor stopped");
    }

    /// Run one cycle to completion unless a command supersedes it.
    ///
    /// The cycle future is built from cloned handles, so dropping it
    /// abandons its in-flight fetches without touching actor state.
    async fn cycle(
        &mut self,
        mut ack: Option<oneshot::Sender<Result<()>>>,
    ) -> ControlFlow<()> {
        let engine = self.engine.clone();
        let mut cycle: Pin<Box<dyn Future<Output = Snapshot> + Send>> =
            Box::pin(async move { engine.run_cycle().await });

        loop {
            tokio::select! {
                snapshot = &mut cycle => {
                    trace!("cycle completed with {} records", snapshot.records.len());
                    self.store.publish(snapshot).await;
                    if let Some(ack) = ack.take() {
                        let _ = ack.send(Ok(()));
                    }
                    return ControlFlow::Continue(());
                }

                command = self.command_rx.recv() => {
                    let Some(command) = command else {
                        warn!("command channel closed mid-cycle, abandoning cycle");
                        return ControlFlow::Break(());
                    };
                    match command {
                        SchedulerCommand::CycleNow { respond_to } => {
                            debug!("superseding in-flight cycle");
                            if let Some(stale) = ack.take() {
                                let _ = stale.send(Err(anyhow::anyhow!("cycle superseded")));
                            }
                            ack = Some(respond_to);
                            let engine = self.engine.clone();
                            cycle = Box::pin(async move { engine.run_cycle().await });
                        }
                        SchedulerCommand::UpdateInterval { interval_secs } => {
                            debug!("updating interval to {interval_secs}s");
                            self.interval_duration = Duration::from_secs(interval_secs);
                        }
                        SchedulerCommand::Shutdown => {
                            debug!("received shutdown command, abandoning in-flight cycle");
                            return ControlFlow::Break(());
                        }
                    }
                }
            }
        }
    }
}

/// Handle for controlling a SchedulerActor
///
/// Cloneable; all clones talk to the same actor.
#[derive(Clone)]
pub struct SchedulerHandle {
    sender: mpsc::Sender<SchedulerCommand>,
}

impl SchedulerHandle {
    /// Spawn a scheduler actor as a tokio task and return its handle.
    pub fn spawn(
        engine: CollectionEngine,
        store: SnapshotStore,
        interval_duration: Duration,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = SchedulerActor::new(Arc::new(engine), store, cmd_rx, interval_duration);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Trigger an immediate cycle and wait until its snapshot is published.
    pub async fn cycle_now(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SchedulerCommand::CycleNow { respond_to: tx })
            .await
            .context("failed to send CycleNow command")?;

        rx.await.context("failed to receive response")??;
        Ok(())
    }

    /// Update the cycle interval.
    pub async fn update_interval(&self, interval_secs: u64) -> Result<()> {
        self.sender
            .send(SchedulerCommand::UpdateInterval { interval_secs })
            .await
            .context("failed to send UpdateInterval command")?;
        Ok(())
    }

    /// Gracefully shut down the scheduler.
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(SchedulerCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}
