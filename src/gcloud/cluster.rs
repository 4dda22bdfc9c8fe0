//! GKE cluster lifecycle
//!
//! Describe, compare, and create/delete/recreate the test cluster.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use super::{to_args, GcloudCli};

/// Desired shape of the test cluster
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub name: String,
    pub zone: String,
    pub num_nodes: u32,
    pub network_name: String,
    pub subnet_name: String,
}

/// What to do with an existing cluster that does not match its config
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcilePolicy {
    /// Delete and recreate the cluster
    #[default]
    Recreate,
    /// Report the mismatch as an error
    Fail,
}

impl ReconcilePolicy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "recreate" => Some(ReconcilePolicy::Recreate),
            "fail" => Some(ReconcilePolicy::Fail),
            _ => None,
        }
    }
}

/// Ways an existing cluster can differ from its config
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ClusterMismatch {
    #[error("expect cluster {name:?} to have {expected} nodes, got {actual} nodes")]
    NodeCount {
        name: String,
        expected: u32,
        actual: u32,
    },

    #[error("expect cluster {name:?} to be in network {expected:?}, got network {actual}")]
    Network {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("expect cluster {name:?} to be in subnetwork {expected:?}, got subnetwork {actual}")]
    Subnetwork {
        name: String,
        expected: String,
        actual: String,
    },
}

/// Subset of `gcloud container clusters describe` output
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDescription {
    #[serde(default)]
    pub current_node_count: u32,

    #[serde(default)]
    pub network: String,

    #[serde(default)]
    pub subnetwork: String,
}

impl ClusterDescription {
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .with_context(|| format!("cannot unmarshal description {json:?} into json"))
    }

    /// Compare against the desired config, node count first
    pub fn verify(&self, config: &ClusterConfig) -> std::result::Result<(), ClusterMismatch> {
        if self.current_node_count != config.num_nodes {
            return Err(ClusterMismatch::NodeCount {
                name: config.name.clone(),
                expected: config.num_nodes,
                actual: self.current_node_count,
            });
        }
        if self.network != config.network_name {
            return Err(ClusterMismatch::Network {
                name: config.name.clone(),
                expected: config.network_name.clone(),
                actual: self.network.clone(),
            });
        }
        if self.subnetwork != config.subnet_name {
            return Err(ClusterMismatch::Subnetwork {
                name: config.name.clone(),
                expected: config.subnet_name.clone(),
                actual: self.subnetwork.clone(),
            });
        }
        Ok(())
    }
}

/// Cluster lifecycle through `gcloud container clusters`
#[derive(Clone, Debug, Default)]
pub struct ClusterManager {
    gcloud: GcloudCli,
    policy: ReconcilePolicy,
}

impl ClusterManager {
    pub fn new(gcloud: GcloudCli) -> Self {
        Self {
            gcloud,
            policy: ReconcilePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ReconcilePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Make sure a cluster matching `config` exists
    pub async fn ensure(&self, config: &ClusterConfig) -> Result<()> {
        if !self.exists(config).await? {
            info!(
                "Cluster {} in zone {} does not exist, creating.",
                config.name, config.zone
            );
            return self.create(config).await;
        }

        let description = self.describe(config).await?;
        match description.verify(config) {
            Ok(()) => {
                info!(
                    "Using existing cluster {} in zone {} with {} nodes.",
                    config.name, config.zone, config.num_nodes
                );
                Ok(())
            }
            Err(mismatch) => match self.policy {
                ReconcilePolicy::Fail => Err(mismatch).with_context(|| {
                    format!("verifyCluster({:?}, {:?}) failed", config.name, config.zone)
                }),
                ReconcilePolicy::Recreate => {
                    warn!("{}. Delete and recreate cluster {}.", mismatch, config.name);
                    self.delete(config).await.with_context(|| {
                        format!("failed delete and create cluster: {}", config.name)
                    })?;
                    self.create(config).await.with_context(|| {
                        format!("failed delete and create cluster: {}", config.name)
                    })
                }
            },
        }
    }

    pub async fn create(&self, config: &ClusterConfig) -> Result<()> {
        info!(
            "Creating cluster {} in {}, numOfNodes={}",
            config.name, config.zone, config.num_nodes
        );
        self.gcloud
            .run_checked(&create_args(config))
            .await
            .with_context(|| {
                format!(
                    "createCluster({:?}, {:?}, {}) failed",
                    config.name, config.zone, config.num_nodes
                )
            })?;
        Ok(())
    }

    pub async fn delete(&self, config: &ClusterConfig) -> Result<()> {
        info!("Deleting cluster {} in {}", config.name, config.zone);
        self.gcloud
            .run_checked(&delete_args(config))
            .await
            .with_context(|| {
                format!("DeleteCluster({:?}, {:?}) failed", config.name, config.zone)
            })?;
        Ok(())
    }

    /// Update ~/.kube/config with the cluster credentials and switch to it
    pub async fn get_credentials(&self, config: &ClusterConfig) -> Result<()> {
        self.gcloud
            .run_checked(&credentials_args(config))
            .await
            .with_context(|| {
                format!("GetCredentials({:?}, {:?}) failed", config.name, config.zone)
            })?;
        Ok(())
    }

    pub async fn exists(&self, config: &ClusterConfig) -> Result<bool> {
        let clusters = self.list(&config.zone).await?;
        Ok(clusters.iter().any(|c| c == &config.name))
    }

    /// Cluster names in `zone`
    pub async fn list(&self, zone: &str) -> Result<Vec<String>> {
        let output = self
            .gcloud
            .run_checked(&list_args(zone))
            .await
            .with_context(|| format!("listClusters({zone:?}) failed"))?;
        Ok(parse_cluster_list(&output))
    }

    pub async fn describe(&self, config: &ClusterConfig) -> Result<ClusterDescription> {
        let output = self
            .gcloud
            .run(&describe_args(config))
            .await?;
        if !output.success() {
            anyhow::bail!(
                "cannot describe cluster {:?} using gcloud: {:?}",
                config.name,
                output.combined().trim()
            );
        }
        ClusterDescription::parse(&output.stdout)
    }
}

fn create_args(config: &ClusterConfig) -> Vec<String> {
    to_args([
        "container".to_string(),
        "clusters".to_string(),
        "create".to_string(),
        config.name.clone(),
        "--zone".to_string(),
        config.zone.clone(),
        "--num-nodes".to_string(),
        config.num_nodes.to_string(),
        "--network".to_string(),
        config.network_name.clone(),
        "--subnetwork".to_string(),
        config.subnet_name.clone(),
    ])
}

fn delete_args(config: &ClusterConfig) -> Vec<String> {
    to_args([
        "container",
        "clusters",
        "delete",
        config.name.as_str(),
        "--zone",
        config.zone.as_str(),
        "--quiet",
    ])
}

fn credentials_args(config: &ClusterConfig) -> Vec<String> {
    to_args([
        "container",
        "clusters",
        "get-credentials",
        config.name.as_str(),
        "--zone",
        config.zone.as_str(),
    ])
}

fn list_args(zone: &str) -> Vec<String> {
    to_args([
        "container",
        "clusters",
        "list",
        "--zone",
        zone,
        "--format",
        "value(NAME)",
    ])
}

fn describe_args(config: &ClusterConfig) -> Vec<String> {
    to_args([
        "container",
        "clusters",
        "describe",
        config.name.as_str(),
        "--zone",
        config.zone.as_str(),
        "--format",
        "json(currentNodeCount, network, subnetwork)",
    ])
}

fn parse_cluster_list(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
