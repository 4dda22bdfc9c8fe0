//! `gcloud` CLI integration
//!
//! Cluster lifecycle, project selection and SSH into helper VMs all go
//! through the Cloud SDK binary.

mod cluster;
mod project;
mod ssh;

pub use cluster::{ClusterConfig, ClusterDescription, ClusterManager, ClusterMismatch, ReconcilePolicy};
pub use project::{current_project, set_project};
pub use ssh::{VmSshClient, VmSshConfig};

use anyhow::Result;

use crate::utils::{self, CommandOutput};

/// Handle on the `gcloud` binary
#[derive(Clone, Debug)]
pub struct GcloudCli {
    binary: String,
}

impl Default for GcloudCli {
    fn default() -> Self {
        Self {
            binary: "gcloud".to_string(),
        }
    }
}

impl GcloudCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Run a gcloud command without judging its exit status
    pub async fn run(&self, args: &[String]) -> Result<CommandOutput> {
        utils::run(&self.binary, args).await
    }

    /// Run a gcloud command and return its combined output
    pub async fn run_checked(&self, args: &[String]) -> Result<String> {
        let output = utils::run_checked(&self.binary, args).await?;
        Ok(output.combined())
    }

    /// OAuth access token of the active gcloud account
    pub async fn access_token(&self) -> Result<String> {
        let args = to_args(["auth", "print-access-token"]);
        let output = utils::run_checked(&self.binary, &args).await?;
        let token = output.stdout.trim().to_string();
        if token.is_empty() {
            anyhow::bail!("gcloud returned an empty access token");
        }
        Ok(token)
    }
}

pub(crate) fn to_args<I, S>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    args.into_iter().map(Into::into).collect()
}
