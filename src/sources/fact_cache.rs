//! Batched fact-gathering source
//!
//! One playbook run covers the whole fleet; facts land in a JSON cache
//! keyed by host name, and per-host access afterwards is a cache lookup.
//! A run that only failed for some hosts keeps the facts it did gather -
//! those hosts simply have no cache entry and surface as
//! `HostFactsMissing`, host by host.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use crate::config::HostTarget;

use super::{
    RawObservation, SourceAdapter, SourceError, SourceKind, SourceResult, fields,
};

/// Facts gathered for one host, as the backend shaped them
pub type FactMap = HashMap<String, serde_json::Value>;

/// Outcome of one whole-fleet fact-gathering run
#[derive(Debug, Clone, Default)]
pub struct FactBatch {
    /// Facts per host name; hosts the run could not reach have no entry
    pub facts: HashMap<String, FactMap>,
}

/// Collaborator executing the batched fact-gathering run
#[async_trait]
pub trait FactRunner: Send + Sync {
    /// Run fact gathering for the given targets in one batch.
    ///
    /// Partial failure is not an error: unreachable hosts are simply
    /// absent from the returned batch. Only a run that produced nothing
    /// usable fails.
    async fn run_batch(&self, targets: &[HostTarget]) -> SourceResult<FactBatch>;
}

/// Exit code ansible-playbook uses for "some hosts unreachable"
const PARTIAL_UNREACHABLE_RC: i32 = 4;

/// Production fact runner shelling out to ansible-playbook
///
/// The playbook writes its gathered facts through the jsonfile cache
/// plugin; after the run this runner reads one JSON file per host out of
/// the cache directory.
pub struct PlaybookRunner {
    playbook: PathBuf,
    inventory: PathBuf,
    cache_dir: PathBuf,
}

impl PlaybookRunner {
    pub fn new(playbook: PathBuf, inventory: PathBuf, cache_dir: PathBuf) -> Self {
        Self {
            playbook,
            inventory,
            cache_dir,
        }
    }

    async fn read_cache(&self, targets: &[HostTarget]) -> FactBatch {
        let mut facts = HashMap::new();

        for target in targets {
            let path = self.cache_dir.join(&target.name);
            match tokio::fs::read_to_string(&path).await {
                Ok(contents) => match serde_json::from_str::<FactMap>(&contents) {
                    Ok(map) => {
                        facts.insert(target.name.clone(), map);
                    }
                    Err(e) => {
                        warn!(host = %target.name, "discarding unparseable fact cache entry: {e}");
                    }
                },
                Err(_) => debug!(host = %target.name, "no fact cache entry"),
            }
        }

        FactBatch { facts }
    }
}

#[async_trait]
impl FactRunner for PlaybookRunner {
    #[instrument(skip_all)]
    async fn run_batch(&self, targets: &[HostTarget]) -> SourceResult<FactBatch> {
        debug!(
            "running playbook {} against {} hosts",
            self.playbook.display(),
            targets.len()
        );

        let output = Command::new("ansible-playbook")
            .arg("-i")
            .arg(&self.inventory)
            .arg(&self.playbook)
            .env("ANSIBLE_CACHE_PLUGIN", "jsonfile")
            .env("ANSIBLE_CACHE_PLUGIN_CONNECTION", &self.cache_dir)
            .output()
            .await
            .map_err(|e| {
                SourceError::CollectionRunFailed(format!("failed to launch ansible-playbook: {e}"))
            })?;

        // rc 4 means some hosts were unreachable; facts already cached for
        // the reachable ones must not be discarded.
        let code = output.status.code();
        if !output.status.success() && code != Some(PARTIAL_UNREACHABLE_RC) {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SourceError::CollectionRunFailed(format!(
                "ansible-playbook exited with {code:?}: {}",
                stderr.trim()
            )));
        }

        Ok(self.read_cache(targets).await)
    }
}

/// Source adapter over a per-cycle fact cache
///
/// `prepare_cycle` runs the batch once for the whole cycle; `fetch` is a
/// lookup into the cached result and never talks to the network.
pub struct FactCacheAdapter {
    runner: Arc<dyn FactRunner>,
    cache: RwLock<HashMap<String, FactMap>>,
}

impl FactCacheAdapter {
    pub fn new(runner: Arc<dyn FactRunner>) -> Self {
        Self {
            runner,
            cache: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl SourceAdapter for FactCacheAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::FactCache
    }

    async fn prepare_cycle(&self, targets: &[HostTarget]) -> SourceResult<()> {
        let batch = self.runner.run_batch(targets).await?;
        debug!("batch run cached facts for {} hosts", batch.facts.len());
        *self.cache.write().await = batch.facts;
        Ok(())
    }

    async fn fetch(&self, target: &HostTarget) -> SourceResult<RawObservation> {
        let cache = self.cache.read().await;
        let facts = cache
            .get(&target.name)
            .ok_or_else(|| SourceError::HostFactsMissing(target.name.clone()))?;

        Ok(observation_from_facts(facts))
    }
}

/// Map backend fact names onto raw observation fields.
fn observation_from_facts(facts: &FactMap) -> RawObservation {
    let mut raw = RawObservation::new(SourceKind::FactCache);

    if let Some(hostname) = facts.get("ansible_hostname").and_then(|v| v.as_str()) {
        raw = raw.with_hostname(hostname);
    }

    for key in [
        fields::OS,
        fields::KERNEL,
        fields::CPU_LOAD,
        fields::MEMORY,
        fields::DISK,
        fields::AUTH_FAILURES,
    ] {
        match facts.get(key) {
            Some(serde_json::Value::String(text)) => raw = raw.with_text(key, text.clone()),
            Some(serde_json::Value::Number(number)) => {
                if let Some(value) = number.as_f64() {
                    raw = raw.with_number(key, value);
                }
            }
            // Anything else (missing, bool, nested) stays absent and
            // normalizes to Unknown.
            _ => {}
        }
    }

    raw
}
