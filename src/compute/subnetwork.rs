//! Regional subnetworks

use anyhow::Result;
use tracing::info;

use super::{
    create_then_get, delete_then_verify, ensure_with, ComputeClient, ResourceKey, Subnetwork,
};

pub const TEST_SUBNET_CIDR: &str = "10.1.2.0/24";

/// Range reserved for Envoy-based internal load balancer proxies
pub const PROXY_ONLY_SUBNET_CIDR: &str = "10.129.0.0/23";

pub async fn ensure_subnet(
    client: &ComputeClient,
    region: &str,
    subnet: &Subnetwork,
) -> Result<Subnetwork> {
    let key = ResourceKey::regional(&subnet.name, region);
    ensure_with(client, &key, || create_subnet(client, region, subnet)).await
}

pub async fn create_subnet(
    client: &ComputeClient,
    region: &str,
    subnet: &Subnetwork,
) -> Result<Subnetwork> {
    info!("Creating subnet {} in {}", subnet.name, region);
    create_then_get(client, &ResourceKey::regional(&subnet.name, region), subnet).await
}

pub async fn delete_subnet(client: &ComputeClient, region: &str, subnet: &Subnetwork) -> Result<()> {
    delete_then_verify::<Subnetwork>(client, &ResourceKey::regional(&subnet.name, region)).await
}

pub fn build_test_subnet(name: &str, network_link: &str) -> Subnetwork {
    Subnetwork {
        name: name.to_string(),
        network: network_link.to_string(),
        ip_cidr_range: TEST_SUBNET_CIDR.to_string(),
        ..Default::default()
    }
}

/// Proxy-only subnet required by internal HTTP(S) load balancing
pub fn build_proxy_only_subnet(name: &str, region: &str, network_link: &str) -> Subnetwork {
    Subnetwork {
        name: name.to_string(),
        network: network_link.to_string(),
        ip_cidr_range: PROXY_ONLY_SUBNET_CIDR.to_string(),
        region: Some(region.to_string()),
        purpose: Some("REGIONAL_MANAGED_PROXY".to_string()),
        role: Some("ACTIVE".to_string()),
        ..Default::default()
    }
}
