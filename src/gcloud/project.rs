//! Active gcloud project

use anyhow::{Context, Result};
use tracing::info;

use super::{to_args, GcloudCli};

/// Project gcloud is currently configured for, empty when unset
pub async fn current_project(gcloud: &GcloudCli) -> Result<String> {
    let output = gcloud
        .run_checked(&to_args(["config", "get-value", "project"]))
        .await
        .context("failed to read the active gcloud project")?;
    Ok(parse_project(&output))
}

/// Point gcloud at `project` and export it as `PROJECT`
pub async fn set_project(gcloud: &GcloudCli, project: &str) -> Result<()> {
    info!("Setting gcloud project to {}", project);
    gcloud
        .run_checked(&to_args(["config", "set", "project", project]))
        .await
        .with_context(|| format!("failed to set gcloud project to {project:?}"))?;
    std::env::set_var("PROJECT", project);
    Ok(())
}

fn parse_project(output: &str) -> String {
    // gcloud may print "(unset)" or warnings on stderr after the value
    output
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .filter(|l| *l != "(unset)")
        .unwrap_or_default()
        .to_string()
}
