//! Helper VM instances

use anyhow::Result;
use tracing::info;

use super::models::{AccessConfig, AttachedDisk, AttachedDiskInitializeParams, NetworkInterface};
use super::{create_then_get, delete_then_verify, ComputeClient, Instance, ResourceKey};

const MACHINE_TYPE: &str = "e2-small";
const SOURCE_IMAGE: &str = "projects/debian-cloud/global/images/family/debian-12";

pub async fn create_instance(client: &ComputeClient, zone: &str, instance: &Instance) -> Result<Instance> {
    info!("Creating instance {} in {}", instance.name, zone);
    create_then_get(client, &ResourceKey::zonal(&instance.name, zone), instance).await
}

pub async fn delete_instance(client: &ComputeClient, zone: &str, instance: &Instance) -> Result<()> {
    delete_then_verify::<Instance>(client, &ResourceKey::zonal(&instance.name, zone)).await
}

/// Small Debian VM in the cluster's zone and subnet with an external IP
pub fn build_test_instance(name: &str, network_link: &str, subnet_link: &str, zone: &str) -> Instance {
    Instance {
        name: name.to_string(),
        machine_type: format!("zones/{zone}/machineTypes/{MACHINE_TYPE}"),
        disks: vec![AttachedDisk {
            disk_type: Some("PERSISTENT".to_string()),
            boot: true,
            auto_delete: true,
            initialize_params: Some(AttachedDiskInitializeParams {
                source_image: SOURCE_IMAGE.to_string(),
                disk_size_gb: None,
            }),
        }],
        network_interfaces: vec![NetworkInterface {
            network: network_link.to_string(),
            subnetwork: Some(subnet_link.to_string()),
            access_configs: vec![AccessConfig {
                name: "External NAT".to_string(),
                access_type: "ONE_TO_ONE_NAT".to_string(),
                nat_ip: None,
            }],
            network_ip: None,
        }],
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_test_instance() {
        let instance = build_test_instance("allow-ssh-ns", "net-link", "subnet-link", "us-west1-a");
        assert_eq!(instance.machine_type, "zones/us-west1-a/machineTypes/e2-small");
        assert_eq!(instance.network_interfaces.len(), 1);
        assert_eq!(
            instance.network_interfaces[0].subnetwork.as_deref(),
            Some("subnet-link")
        );

        let json = serde_json::to_value(&instance).unwrap();
        assert_eq!(
            json["networkInterfaces"][0]["accessConfigs"][0]["type"],
            "ONE_TO_ONE_NAT"
        );
        assert_eq!(json["disks"][0]["boot"], true);
        assert!(json.get("status").is_none());
    }
}
