//! VPC networks

use anyhow::Result;
use tracing::info;

use super::{create_then_get, delete_then_verify, ensure_with, ComputeClient, Network, ResourceKey};

/// Get the network, creating it on 404
pub async fn ensure_network(client: &ComputeClient, network: &Network) -> Result<Network> {
    let key = ResourceKey::global(&network.name);
    ensure_with(client, &key, || create_network(client, network)).await
}

pub async fn create_network(client: &ComputeClient, network: &Network) -> Result<Network> {
    info!("Creating network {}", network.name);
    create_then_get(client, &ResourceKey::global(&network.name), network).await
}

pub async fn delete_network(client: &ComputeClient, network: &Network) -> Result<()> {
    delete_then_verify::<Network>(client, &ResourceKey::global(&network.name)).await
}

/// Custom-mode network: subnets are created explicitly
pub fn build_test_network(name: &str) -> Network {
    Network {
        name: name.to_string(),
        auto_create_subnetworks: false,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_test_network() {
        let network = build_test_network("gke-networking-recipes-network");
        assert_eq!(network.name, "gke-networking-recipes-network");
        assert!(!network.auto_create_subnetworks);

        let json = serde_json::to_value(&network).unwrap();
        assert_eq!(json["name"], "gke-networking-recipes-network");
        assert_eq!(json["autoCreateSubnetworks"], false);
    }
}
