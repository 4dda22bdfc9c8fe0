//! Shared state for the e2e suites
//!
//! A [`Framework`] is built once per run, after the cluster exists. It owns
//! the cluster and Compute clients, the ensured test network and subnet, and
//! the registry of namespaces handed to sub-tests.

mod cleanup;
mod registry;

pub use cleanup::Cleanups;
pub use registry::SandboxRegistry;

use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use tracing::info;

use crate::compute::{
    build_test_network, build_test_subnet, ensure_network, ensure_subnet, region_from_zone,
    ComputeClient, Network, Subnetwork,
};
use crate::gcloud::VmSshClient;
use crate::k8s::{K8sClient, Sandbox};
use crate::models::TestResult;
use crate::utils::PollConfig;

/// Options for building a [`Framework`]
#[derive(Clone, Debug)]
pub struct FrameworkOptions {
    pub zone: String,
    pub destroy_sandboxes: bool,
    pub kubectl: String,
    pub ingress_poll: PollConfig,
}

/// The VPC network and subnet the cluster and helper VMs live in
#[derive(Clone, Debug)]
pub struct TestNetwork {
    pub region: String,
    pub network: Network,
    pub subnet: Subnetwork,
}

impl TestNetwork {
    /// Ensure the test network and the cluster subnet in `zone`'s region
    pub async fn ensure(
        cloud: &ComputeClient,
        zone: &str,
        network_name: &str,
        subnet_name: &str,
    ) -> Result<Self> {
        let network = build_test_network(network_name);
        info!("ensureNetwork({})", network.name);
        let network = ensure_network(cloud, &network)
            .await
            .with_context(|| format!("ensureNetwork({network_name:?}) failed"))?;

        let region = region_from_zone(zone);
        if region.is_empty() {
            anyhow::bail!("cannot derive a region from zone {:?}", zone);
        }

        let subnet = build_test_subnet(subnet_name, &network.self_link);
        info!("EnsureSubnet({}) in {}", subnet.name, region);
        let subnet = ensure_subnet(cloud, &region, &subnet)
            .await
            .with_context(|| format!("EnsureSubnet({zone:?}, {subnet_name:?}) failed"))?;

        Ok(Self {
            region,
            network,
            subnet,
        })
    }
}

pub struct Framework {
    pub k8s: K8sClient,
    pub cloud: ComputeClient,
    pub ssh: VmSshClient,
    pub zone: String,
    pub region: String,
    pub network: Network,
    pub subnet: Subnetwork,
    pub ingress_poll: PollConfig,
    registry: SandboxRegistry,
}

impl Framework {
    pub fn new(
        k8s: K8sClient,
        cloud: ComputeClient,
        ssh: VmSshClient,
        test_network: TestNetwork,
        options: FrameworkOptions,
    ) -> Self {
        Self {
            k8s,
            cloud,
            ssh,
            zone: options.zone,
            region: test_network.region,
            network: test_network.network,
            subnet: test_network.subnet,
            ingress_poll: options.ingress_poll,
            registry: SandboxRegistry::new(options.kubectl, options.destroy_sandboxes),
        }
    }

    /// Run a sub-test in its own namespace. See
    /// [`SandboxRegistry::run_with_sandbox`].
    pub async fn run_with_sandbox<F, Fut>(&self, desc: &str, namespace: &str, test: F) -> TestResult
    where
        F: FnOnce(Arc<Sandbox>) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        self.registry.run_with_sandbox(desc, namespace, test).await
    }

    /// Namespaces handed out so far
    pub async fn sandbox_namespaces(&self) -> Vec<String> {
        self.registry.namespaces().await
    }
}
