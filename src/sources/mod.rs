//! Source adapters for raw telemetry collection
//!
//! Each adapter knows how to pull host telemetry out of one kind of backend:
//!
//! - **FactCacheAdapter**: one batched fact-gathering run for the whole
//!   fleet, then per-host lookups into the resulting cache
//! - **TimeSeriesQueryAdapter**: one query per metric dimension against a
//!   query endpoint on each host
//! - **RemoteExecAdapter**: an authenticated remote session per host that
//!   retrieves the auth log and counts failed logins
//!
//! The rest of the system is written against [`SourceAdapter`], never
//! against a concrete backend. Adapters return source-shaped
//! [`RawObservation`]s; reconciling their field names and types is the
//! normalizer's job.

pub mod fact_cache;
pub mod remote_exec;
pub mod timeseries;

pub use fact_cache::FactCacheAdapter;
pub use remote_exec::RemoteExecAdapter;
pub use timeseries::TimeSeriesQueryAdapter;

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;

use crate::config::HostTarget;

/// Well-known raw field names shared between adapters and the normalizer.
///
/// Adapters only ever populate the subset their backend can answer for;
/// everything else stays absent and normalizes to `Unknown`.
pub mod fields {
    pub const OS: &str = "os";
    pub const KERNEL: &str = "kernel";
    pub const CPU_LOAD: &str = "cpu_load";
    pub const MEMORY: &str = "memory";
    pub const DISK: &str = "disk";
    pub const AUTH_FAILURES: &str = "auth_errors";
}

/// Result type alias for source operations
pub type SourceResult<T> = Result<T, SourceError>;

/// Errors that can occur while collecting from a backend
#[derive(Debug)]
pub enum SourceError {
    /// The whole batched collection run errored
    CollectionRunFailed(String),

    /// An otherwise-successful batch run has no facts for this host
    HostFactsMissing(String),

    /// The query endpoint is unreachable or answered garbage
    QueryBackendUnavailable(String),

    /// The remote session rejected our credentials
    AuthenticationFailed(String),

    /// Connection or protocol failure on the way to the host
    TransportError(String),
}

impl SourceError {
    /// Whether the orchestrator may retry this failure within the cycle.
    ///
    /// Authentication failures are never retried; hammering a host that
    /// rejected our credentials only fills its auth log with our own noise.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SourceError::TransportError(_) | SourceError::QueryBackendUnavailable(_)
        )
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::CollectionRunFailed(msg) => {
                write!(f, "batched collection run failed: {}", msg)
            }
            SourceError::HostFactsMissing(host) => {
                write!(f, "no facts collected for host '{}'", host)
            }
            SourceError::QueryBackendUnavailable(msg) => {
                write!(f, "query backend unavailable: {}", msg)
            }
            SourceError::AuthenticationFailed(msg) => {
                write!(f, "remote authentication failed: {}", msg)
            }
            SourceError::TransportError(msg) => write!(f, "transport error: {}", msg),
        }
    }
}

impl std::error::Error for SourceError {}

/// Which backend produced an observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    FactCache,
    TimeSeries,
    RemoteExec,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceKind::FactCache => "fact_cache",
            SourceKind::TimeSeries => "timeseries",
            SourceKind::RemoteExec => "remote_exec",
        };
        write!(f, "{name}")
    }
}

/// A raw field value as the backend shaped it
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Text(String),
    Number(f64),
}

/// Source-shaped bag of fields for one host, local to one fetch call.
///
/// There is no cross-adapter schema: keys may be missing, values may be
/// strings where numbers are expected, and the backend may or may not
/// report the host's own identity.
#[derive(Debug, Clone, PartialEq)]
pub struct RawObservation {
    pub source: SourceKind,

    /// Node identity as the backend reports it, if it reports one
    pub reported_hostname: Option<String>,

    pub values: HashMap<String, RawValue>,
}

impl RawObservation {
    pub fn new(source: SourceKind) -> Self {
        Self {
            source,
            reported_hostname: None,
            values: HashMap::new(),
        }
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.reported_hostname = Some(hostname.into());
        self
    }

    pub fn with_text(mut self, key: &str, value: impl Into<String>) -> Self {
        self.values.insert(key.to_string(), RawValue::Text(value.into()));
        self
    }

    pub fn with_number(mut self, key: &str, value: f64) -> Self {
        self.values.insert(key.to_string(), RawValue::Number(value));
        self
    }

    pub fn get(&self, key: &str) -> Option<&RawValue> {
        self.values.get(key)
    }
}

/// Trait for pluggable telemetry sources
///
/// All source backends implement this trait. The orchestrator drives a
/// cycle as `prepare_cycle` once, then `fetch` per host; implementations
/// must be `Send + Sync` as fetches run concurrently across hosts.
///
/// ## Error Handling
///
/// Methods return `SourceResult<T>`. A `fetch` error is host-scoped and
/// turns into an unreachable record; a `prepare_cycle` error degrades the
/// whole cycle. Neither may panic.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Which backend this adapter speaks to.
    fn kind(&self) -> SourceKind;

    /// Hook run once at the start of every cycle, before any `fetch`.
    ///
    /// Batch-oriented backends do their whole-fleet collection here.
    /// Per-host backends keep the default no-op.
    async fn prepare_cycle(&self, _targets: &[HostTarget]) -> SourceResult<()> {
        Ok(())
    }

    /// Fetch raw, source-shaped telemetry for one host.
    async fn fetch(&self, target: &HostTarget) -> SourceResult<RawObservation>;
}
