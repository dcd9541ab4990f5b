//! One synchronization pass.
//!
//! ```text
//! list_remote ──► scan local ──► reconcile ──► pushes ──► pulls ──► SyncReport
//!   (fatal)        (fatal)                    (per-file failures recorded)
//! ```
//!
//! Transfers run one at a time. A shutdown signal is checked between
//! files; a cancelled pass returns what it did so far.

use std::path::PathBuf;

use sync_content::{resolve_path, scan_dir};
use sync_core::{reconcile_with, Direction, Inventory, MtimeOnly, Settings, SyncPlan, TieBreak};
use sync_types::ErrorKind;
use tokio::sync::watch;

use crate::client::{ClientError, SyncClient};
use crate::transport::Connector;

/// A file whose transfer failed during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferFailure {
    /// Wire path.
    pub path: String,
    /// Which way it was going.
    pub direction: Direction,
    /// Failure class.
    pub kind: ErrorKind,
    /// Human-readable detail.
    pub message: String,
}

/// Outcome of one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Paths sent to the peer.
    pub pushed: Vec<String>,
    /// Paths fetched from the peer.
    pub pulled: Vec<String>,
    /// Paths considered identical.
    pub unchanged: usize,
    /// Push candidates that were gone (or changed size) by transfer time.
    pub missing: Vec<String>,
    /// Transfers that failed for any other reason.
    pub failures: Vec<TransferFailure>,
    /// Whether the pass stopped early on a shutdown signal.
    pub cancelled: bool,
}

impl SyncReport {
    /// Whether every planned transfer succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }

    /// Number of files moved in either direction.
    pub fn transferred(&self) -> usize {
        self.pushed.len() + self.pulled.len()
    }

    fn fail(&mut self, path: &str, direction: Direction, err: &ClientError) {
        tracing::warn!("{:?} {} failed ({}): {}", direction, path, err.kind(), err);
        self.failures.push(TransferFailure {
            path: path.to_string(),
            direction,
            kind: err.kind(),
            message: err.to_string(),
        });
    }
}

/// Both inventories and the plan derived from them.
#[derive(Debug, Clone)]
pub struct PassPlan {
    /// What exists locally.
    pub local: Inventory,
    /// What the peer reported.
    pub remote: Inventory,
    /// What to transfer.
    pub plan: SyncPlan,
}

/// A configured pass against one peer.
pub struct SyncSession<C> {
    client: SyncClient<C>,
    local_dir: PathBuf,
    skew: f64,
    tie_break: Box<dyn TieBreak + Send + Sync>,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<C: Connector> SyncSession<C> {
    /// Session over `settings.local_dir` using `connector` for every exchange.
    pub fn new(settings: &Settings, connector: C) -> Self {
        Self {
            client: SyncClient::new(connector, settings.frame_config()),
            local_dir: settings.local_dir.clone(),
            skew: settings.mtime_skew_sec,
            tie_break: Box::new(MtimeOnly),
            shutdown: None,
        }
    }

    /// Stop between files once `shutdown` reads `true`.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Decide paths inside the skew window with `tie_break`.
    pub fn with_tie_break(mut self, tie_break: impl TieBreak + Send + Sync + 'static) -> Self {
        self.tie_break = Box::new(tie_break);
        self
    }

    /// The underlying transfer executor.
    pub fn client(&self) -> &SyncClient<C> {
        &self.client
    }

    /// Gather both inventories and reconcile them, transferring nothing.
    pub async fn plan(&self) -> Result<PassPlan, ClientError> {
        let remote: Inventory = self.client.list_remote().await?.into_iter().collect();

        let root = self.local_dir.clone();
        let local = tokio::task::spawn_blocking(move || scan_dir(&root)).await??;

        let plan = reconcile_with(&local, &remote, self.skew, self.tie_break.as_ref());
        tracing::info!(
            "local {} files, remote {} files: {} to push, {} to pull, {} unchanged",
            local.len(),
            remote.len(),
            plan.push.len(),
            plan.pull.len(),
            plan.skip.len()
        );
        Ok(PassPlan {
            local,
            remote,
            plan,
        })
    }

    /// Run one full pass.
    ///
    /// Only failing to list the peer or to scan the local root aborts the
    /// pass; per-file failures end up in the report.
    pub async fn run(&self) -> Result<SyncReport, ClientError> {
        let PassPlan { plan, .. } = self.plan().await?;
        let mut report = SyncReport {
            unchanged: plan.skip.len(),
            ..SyncReport::default()
        };

        for path in &plan.push {
            if self.cancelled() {
                report.cancelled = true;
                return Ok(report);
            }
            let local_path = match resolve_path(&self.local_dir, path) {
                Ok(p) => p,
                Err(e) => {
                    report.fail(path, Direction::Push, &ClientError::from(e));
                    continue;
                }
            };
            match self.client.push_file(&local_path, path).await {
                Ok(bytes) => {
                    tracing::info!("pushed {} ({} bytes)", path, bytes);
                    report.pushed.push(path.clone());
                }
                Err(e) if e.kind() == ErrorKind::LocalFileUnavailable => {
                    tracing::warn!("skipping {}: {}", path, e);
                    report.missing.push(path.clone());
                }
                Err(e) => report.fail(path, Direction::Push, &e),
            }
        }

        for path in &plan.pull {
            if self.cancelled() {
                report.cancelled = true;
                return Ok(report);
            }
            // The peer chose these names; never trust them with our filesystem.
            let local_path = match resolve_path(&self.local_dir, path) {
                Ok(p) => p,
                Err(e) => {
                    report.fail(path, Direction::Pull, &ClientError::from(e));
                    continue;
                }
            };
            match self.client.pull_file(path, &local_path).await {
                Ok(bytes) => {
                    tracing::info!("pulled {} ({} bytes)", path, bytes);
                    report.pulled.push(path.clone());
                }
                Err(e) => report.fail(path, Direction::Pull, &e),
            }
        }

        tracing::info!(
            "pass complete: {} pushed, {} pulled, {} unchanged, {} missing, {} failed",
            report.pushed.len(),
            report.pulled.len(),
            report.unchanged,
            report.missing.len(),
            report.failures.len()
        );
        Ok(report)
    }

    fn cancelled(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }
}

/// Run one pass with the settings' directory and tolerance.
pub async fn run_sync<C: Connector>(
    settings: &Settings,
    connector: C,
) -> Result<SyncReport, ClientError> {
    SyncSession::new(settings, connector).run().await
}
