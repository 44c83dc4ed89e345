/// Log Capture and Container Teardown
///
/// **Core Responsibility:**
/// Persist a container's accumulated output under the run's results
/// directory, then remove the container.
///
/// **Critical Properties:**
/// - Capture is best-effort: failures are logged, never returned
/// - Removal is always attempted, whether or not capture succeeded
/// - Removal failures are logged and reported to the caller, never raised

use crate::context::RunContext;
use crate::engine::{ContainerGuard, ContainerHandle};
use anyhow::{Context, Result};
use dit_common::artifacts;
use std::path::PathBuf;
use tokio::fs;

/// Fetch the container's logs and write them verbatim to `<artifact>.log`.
///
/// Never fails; returns the written path when capture succeeded.
pub async fn save_container_logs(
    ctx: &RunContext,
    guard: &ContainerGuard,
    artifact: &str,
) -> Option<PathBuf> {
    match try_save_container_logs(ctx, guard, artifact).await {
        Ok(path) => Some(path),
        Err(e) => {
            ctx.warn(&format!(
                "Error saving container logs for container {}: {:#}",
                guard.handle(),
                e
            ));
            None
        }
    }
}

async fn try_save_container_logs(
    ctx: &RunContext,
    guard: &ContainerGuard,
    artifact: &str,
) -> Result<PathBuf> {
    let output = guard.client().fetch_logs(guard.handle()).await?;

    fs::create_dir_all(ctx.results_dir())
        .await
        .with_context(|| format!("Failed to create {}", ctx.results_dir().display()))?;

    let path = artifacts::artifact_path(ctx.results_dir(), artifact);
    fs::write(&path, output)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(path)
}

/// Capture the container's logs, then force-remove it.
///
/// Returns whether the removal succeeded. A failed removal is logged; it never
/// changes a suite or test result.
pub async fn teardown(ctx: &RunContext, guard: ContainerGuard, artifact: &str, role: &str) -> bool {
    let id = guard.handle().clone();

    ctx.log(&format!("Saving {} container logs {}", role, id));
    save_container_logs(ctx, &guard, artifact).await;

    ctx.log(&format!("Removing {} container {}", role, id));
    match guard.remove().await {
        Ok(_) => true,
        Err(e) => {
            report_removal_failure(ctx, &id, &e.to_string());
            false
        }
    }
}

fn report_removal_failure(ctx: &RunContext, id: &ContainerHandle, reason: &str) {
    ctx.console(&format!("    Failed to remove container {}", id));
    ctx.warn(&format!("Error removing container {}: {}", id, reason));
}
