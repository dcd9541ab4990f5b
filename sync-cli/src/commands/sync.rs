//! Run one sync pass against the peer.

use anyhow::{Context, Result};
use sync_client::{SyncReport, SyncSession, TlsTransport};
use sync_core::{Settings, SyncPlan};
use tokio::sync::watch;

use super::ctrl_c_flag;

/// Run the sync command.
pub async fn run(settings: &Settings, dry_run: bool) -> Result<()> {
    let session = session(settings, ctrl_c_flag())?;

    if dry_run {
        let pass = session
            .plan()
            .await
            .with_context(|| format!("Could not plan against {}", settings.peer_address()))?;
        print_plan(&pass.plan);
        return Ok(());
    }

    let report = session
        .run()
        .await
        .with_context(|| format!("Sync with {} failed", settings.peer_address()))?;
    print_report(&report);

    if report.cancelled {
        anyhow::bail!("Interrupted before all transfers finished");
    }
    if !report.failures.is_empty() {
        anyhow::bail!("{} transfer(s) failed", report.failures.len());
    }
    Ok(())
}

/// One pass over TLS, loading certificates fresh.
pub async fn pass(settings: &Settings, shutdown: watch::Receiver<bool>) -> Result<SyncReport> {
    let report = session(settings, shutdown)?
        .run()
        .await
        .with_context(|| format!("Sync with {} failed", settings.peer_address()))?;
    Ok(report)
}

fn session(
    settings: &Settings,
    shutdown: watch::Receiver<bool>,
) -> Result<SyncSession<TlsTransport>> {
    let transport = TlsTransport::from_settings(settings).context("Failed to load certificates")?;
    Ok(SyncSession::new(settings, transport).with_shutdown(shutdown))
}

fn print_plan(plan: &SyncPlan) {
    for path in &plan.push {
        println!("  push  {}", path);
    }
    for path in &plan.pull {
        println!("  pull  {}", path);
    }
    println!();
    println!(
        "{} to push, {} to pull, {} unchanged (dry run, nothing transferred)",
        plan.push.len(),
        plan.pull.len(),
        plan.skip.len()
    );
}

fn print_report(report: &SyncReport) {
    for path in &report.pushed {
        println!("  pushed  {}", path);
    }
    for path in &report.pulled {
        println!("  pulled  {}", path);
    }
    for path in &report.missing {
        println!("  missing {}", path);
    }
    for failure in &report.failures {
        println!(
            "  FAILED  {} ({:?}, {}): {}",
            failure.path, failure.direction, failure.kind, failure.message
        );
    }
    println!();
    println!(
        "{} pushed, {} pulled, {} unchanged, {} missing, {} failed",
        report.pushed.len(),
        report.pulled.len(),
        report.unchanged,
        report.missing.len(),
        report.failures.len()
    );
}
