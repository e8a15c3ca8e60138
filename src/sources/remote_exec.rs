//! Remote-execution source
//!
//! Opens an authenticated session per host, retrieves the auth log with
//! one fixed read-only command, and derives the authentication-failure
//! count from a pattern match over the artifact. An artifact with no
//! matching lines is a successful count of zero.
//!
//! Failure surface: rejected credentials are `AuthenticationFailed` and
//! must never be retried; connection and protocol problems are
//! `TransportError` and left to the orchestrator's retry policy.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::config::HostTarget;

use super::{
    RawObservation, SourceAdapter, SourceError, SourceKind, SourceResult, fields,
};

/// An open session against one host
#[async_trait]
pub trait RemoteSession: Send {
    /// Execute a command on the host, returning its stdout.
    async fn exec(&mut self, command: &str) -> SourceResult<Vec<u8>>;
}

/// Collaborator opening authenticated remote sessions
#[async_trait]
pub trait SessionBackend: Send + Sync {
    async fn connect(&self, target: &HostTarget) -> SourceResult<Box<dyn RemoteSession>>;
}

/// Production session backend driving the openssh client binary
///
/// Runs in batch mode so a credential problem fails immediately instead
/// of prompting.
pub struct OpenSshBackend;

struct OpenSshSession {
    destination: String,
    key_path: Option<PathBuf>,
}

#[async_trait]
impl SessionBackend for OpenSshBackend {
    async fn connect(&self, target: &HostTarget) -> SourceResult<Box<dyn RemoteSession>> {
        let destination = match &target.credentials {
            Some(credentials) => format!("{}@{}", credentials.user, target.address),
            None => target.address.clone(),
        };

        Ok(Box::new(OpenSshSession {
            destination,
            key_path: target
                .credentials
                .as_ref()
                .and_then(|credentials| credentials.key_path.clone()),
        }))
    }
}

#[async_trait]
impl RemoteSession for OpenSshSession {
    async fn exec(&mut self, command: &str) -> SourceResult<Vec<u8>> {
        let mut ssh = Command::new("ssh");
        ssh.arg("-o")
            .arg("BatchMode=yes")
            .arg("-o")
            .arg("ConnectTimeout=10");
        if let Some(key) = &self.key_path {
            ssh.arg("-i").arg(key);
        }
        ssh.arg(&self.destination).arg(command);

        let output = ssh
            .output()
            .await
            .map_err(|e| SourceError::TransportError(format!("failed to launch ssh: {e}")))?;

        if output.status.success() {
            return Ok(output.stdout);
        }

        Err(classify_exec_failure(
            &self.destination,
            output.status.code(),
            &String::from_utf8_lossy(&output.stderr),
        ))
    }
}

/// Split a failed ssh invocation into the two failure kinds that matter:
/// rejected credentials versus everything transport-shaped.
fn classify_exec_failure(destination: &str, code: Option<i32>, stderr: &str) -> SourceError {
    let stderr = stderr.trim();
    if stderr.contains("Permission denied") || stderr.contains("Host key verification failed") {
        SourceError::AuthenticationFailed(format!("{destination}: {stderr}"))
    } else {
        SourceError::TransportError(format!("{destination}: ssh exited with {code:?}: {stderr}"))
    }
}

/// Lines sshd and PAM write for failed logins.
const AUTH_FAILURE_PATTERN: &str = r"(?i)failed password|authentication failure|invalid user";

/// Source adapter counting failed logins over a remote session
///
/// Contributes only the auth-failure count; every other field of the
/// canonical record stays unknown for this source.
pub struct RemoteExecAdapter {
    backend: Arc<dyn SessionBackend>,

    /// The one fixed read-only command this adapter ever runs
    command: String,

    pattern: Regex,
}

impl RemoteExecAdapter {
    pub fn new(backend: Arc<dyn SessionBackend>, log_path: &Path) -> Self {
        Self {
            backend,
            command: format!("cat {}", log_path.display()),
            pattern: Regex::new(AUTH_FAILURE_PATTERN).expect("auth failure pattern must compile"),
        }
    }
}

#[async_trait]
impl SourceAdapter for RemoteExecAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::RemoteExec
    }

    #[instrument(skip(self, target), fields(host = %target.name))]
    async fn fetch(&self, target: &HostTarget) -> SourceResult<RawObservation> {
        let mut session = self.backend.connect(target).await?;
        let stdout = session.exec(&self.command).await?;

        let artifact = String::from_utf8_lossy(&stdout);
        let count = artifact
            .lines()
            .filter(|line| self.pattern.is_match(line))
            .count();

        debug!(host = %target.name, count, "scanned auth log artifact");

        Ok(RawObservation::new(SourceKind::RemoteExec)
            .with_number(fields::AUTH_FAILURES, count as f64))
    }
}
