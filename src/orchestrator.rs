//! Per-cycle aggregation orchestrator
//!
//! Drives one collection cycle across all configured hosts with a chosen
//! source adapter: batched preparation once, then concurrent per-host
//! fetches bounded by a worker limit, each normalized, threshold-annotated
//! and placed into its target's slot.
//!
//! Failure isolation is the whole point here. A host failing collection
//! degrades that host's record; the batch step failing degrades every
//! record; nothing aborts the cycle and nothing escapes `run_cycle`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{debug, error, instrument, warn};

use crate::CanonicalMetricRecord;
use crate::config::HostTarget;
use crate::normalize::Normalizer;
use crate::sources::SourceAdapter;
use crate::store::Snapshot;
use crate::thresholds::ThresholdPolicy;

/// Delay between retry attempts within one cycle
const RETRY_DELAY: Duration = Duration::from_millis(250);

/// Free function wrapper so the per-host future only captures `engine` and
/// an owned index, not a borrowed target with its own generic lifetime
/// (stream combinators otherwise hit "implementation of FnOnce is not
/// general enough" when a closure argument carries a borrow).
async fn collect_indexed(engine: &CollectionEngine, index: usize) -> (usize, CanonicalMetricRecord) {
    (index, engine.collect_host(&engine.targets[index]).await)
}

/// Tuning for collection cycles
#[derive(Debug, Clone, Copy)]
pub struct CycleOptions {
    /// Maximum simultaneous per-host fetches
    pub worker_limit: usize,

    /// Total fetch attempts per host; only transient failures are retried
    pub retry_attempts: u32,
}

impl Default for CycleOptions {
    fn default() -> Self {
        Self {
            worker_limit: 4,
            retry_attempts: 2,
        }
    }
}

/// One configured collection pipeline: targets, source, policies
pub struct CollectionEngine {
    targets: Vec<HostTarget>,
    adapter: Arc<dyn SourceAdapter>,
    normalizer: Normalizer,
    thresholds: ThresholdPolicy,
    options: CycleOptions,
}

impl CollectionEngine {
    pub fn new(
        targets: Vec<HostTarget>,
        adapter: Arc<dyn SourceAdapter>,
        normalizer: Normalizer,
        thresholds: ThresholdPolicy,
        options: CycleOptions,
    ) -> Self {
        Self {
            targets,
            adapter,
            normalizer,
            thresholds,
            options,
        }
    }

    pub fn targets(&self) -> &[HostTarget] {
        &self.targets
    }

    /// Run one collection cycle over all configured targets.
    ///
    /// Always returns a snapshot with exactly one record per target, in
    /// configuration order regardless of which fetch finishes first.
    #[instrument(skip(self), fields(source = %self.adapter.kind()))]
    pub async fn run_cycle(&self) -> Snapshot {
        self.run_cycle_inner().await
    }

    async fn run_cycle_inner(&self) -> Snapshot {
        if let Err(e) = self.adapter.prepare_cycle(&self.targets).await {
            error!("batched collection failed, degrading whole cycle: {e}");
            return self.degenerate_snapshot();
        }

        debug!("cycle started for {} targets", self.targets.len());

        // Results carry their target index; sorting restores configuration
        // order no matter the completion order of concurrent fetches.
        let mut collected: Vec<(usize, CanonicalMetricRecord)> =
            stream::iter(0..self.targets.len())
                .map(|index| collect_indexed(self, index))
                .buffer_unordered(self.options.worker_limit.max(1))
                .collect()
                .await;
        collected.sort_by_key(|(index, _)| *index);

        Snapshot {
            records: collected.into_iter().map(|(_, record)| record).collect(),
            collected_at: Utc::now(),
        }
    }

    /// Every host unreachable; produced when the batch step fails entirely.
    fn degenerate_snapshot(&self) -> Snapshot {
        let now = Utc::now();
        Snapshot {
            records: self
                .targets
                .iter()
                .map(|target| {
                    CanonicalMetricRecord::unreachable(
                        target.name.clone(),
                        target.address.clone(),
                        now,
                    )
                })
                .collect(),
            collected_at: now,
        }
    }

    /// Fetch, normalize and annotate one host, absorbing its failures.
    async fn collect_host(&self, target: &HostTarget) -> CanonicalMetricRecord {
        let collected_at = Utc::now();

        let mut attempt = 0;
        let error = loop {
            attempt += 1;
            match self.adapter.fetch(target).await {
                Ok(raw) => {
                    let mut record = self.normalizer.normalize(target, &raw, collected_at);
                    self.thresholds.annotate(&mut record);
                    return record;
                }
                Err(e) if e.is_retryable() && attempt < self.options.retry_attempts => {
                    debug!(host = %target.name, attempt, "retrying after transient failure: {e}");
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                Err(e) => break e,
            }
        };

        warn!(host = %target.name, source = %self.adapter.kind(), "collection failed: {error}");
        CanonicalMetricRecord::unreachable(target.name.clone(), target.address.clone(), collected_at)
    }
}
