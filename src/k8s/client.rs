//! Kubernetes client construction

use anyhow::{Context, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::path::Path;
use tracing::info;

/// Kubernetes client wrapper
#[derive(Clone)]
pub struct K8sClient {
    client: Client,
}

impl K8sClient {
    /// Client for the current context of the kubeconfig at `path`
    pub async fn from_kubeconfig(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading kubeconfig from {}", path.display());

        let kubeconfig = Kubeconfig::read_from(path)
            .with_context(|| format!("Failed to read kubeconfig {}", path.display()))?;
        let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .context("Failed to build Kubernetes config")?;

        Self::with_config(config)
    }

    /// Create client with custom config
    pub fn with_config(config: Config) -> Result<Self> {
        let client =
            Client::try_from(config).context("Failed to create Kubernetes client from config")?;
        Ok(Self { client })
    }

    /// Get the underlying kube client
    pub fn client(&self) -> &Client {
        &self.client
    }
}
