//! Firewall rules

use anyhow::Result;
use tracing::info;

use super::subnetwork::PROXY_ONLY_SUBNET_CIDR;
use super::{create_then_get, delete_then_verify, ComputeClient, Firewall, FirewallAllowed, ResourceKey};

pub async fn create_firewall(client: &ComputeClient, firewall: &Firewall) -> Result<Firewall> {
    info!("Creating firewall {}", firewall.name);
    create_then_get(client, &ResourceKey::global(&firewall.name), firewall).await
}

pub async fn delete_firewall(client: &ComputeClient, firewall: &Firewall) -> Result<()> {
    delete_then_verify::<Firewall>(client, &ResourceKey::global(&firewall.name)).await
}

fn tcp(ports: &[&str]) -> FirewallAllowed {
    FirewallAllowed {
        ip_protocol: "tcp".to_string(),
        ports: ports.iter().map(|p| p.to_string()).collect(),
    }
}

/// Lets the proxy-only subnet reach backends
pub fn build_allow_proxy_connection_firewall(name: &str, network_link: &str) -> Firewall {
    Firewall {
        name: name.to_string(),
        network: network_link.to_string(),
        direction: Some("INGRESS".to_string()),
        source_ranges: vec![PROXY_ONLY_SUBNET_CIDR.to_string()],
        allowed: vec![tcp(&["80", "443", "8080"])],
        ..Default::default()
    }
}

/// Lets `gcloud compute ssh` reach instances in the network
pub fn build_allow_ssh_firewall(name: &str, network_link: &str) -> Firewall {
    Firewall {
        name: name.to_string(),
        network: network_link.to_string(),
        direction: Some("INGRESS".to_string()),
        source_ranges: vec!["0.0.0.0/0".to_string()],
        allowed: vec![tcp(&["22"])],
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_proxy_connection_firewall() {
        let fw = build_allow_proxy_connection_firewall("allow-proxy-ns", "net");
        assert_eq!(fw.source_ranges, vec![PROXY_ONLY_SUBNET_CIDR]);
        assert_eq!(fw.allowed[0].ports, vec!["80", "443", "8080"]);
        assert_eq!(fw.direction.as_deref(), Some("INGRESS"));
    }

    #[test]
    fn test_allow_ssh_firewall() {
        let fw = build_allow_ssh_firewall("allow-ssh-ns", "net");
        let json = serde_json::to_value(&fw).unwrap();
        assert_eq!(json["allowed"][0]["IPProtocol"], "tcp");
        assert_eq!(json["allowed"][0]["ports"][0], "22");
        assert_eq!(json["network"], "net");
    }
}
