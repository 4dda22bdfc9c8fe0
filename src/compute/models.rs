//! GCE Compute API resource models
//!
//! Only the fields the harness reads or writes are modelled.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A Compute API resource addressable by [`ResourceKey`]
pub trait ComputeResource: Serialize + DeserializeOwned + Send + Sync {
    /// Collection segment in the API path (e.g. `networks`)
    const COLLECTION: &'static str;

    fn name(&self) -> &str;
}

/// Location-qualified name of a resource
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKey {
    Global { name: String },
    Regional { name: String, region: String },
    Zonal { name: String, zone: String },
}

impl ResourceKey {
    pub fn global(name: impl Into<String>) -> Self {
        ResourceKey::Global { name: name.into() }
    }

    pub fn regional(name: impl Into<String>, region: impl Into<String>) -> Self {
        ResourceKey::Regional {
            name: name.into(),
            region: region.into(),
        }
    }

    pub fn zonal(name: impl Into<String>, zone: impl Into<String>) -> Self {
        ResourceKey::Zonal {
            name: name.into(),
            zone: zone.into(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ResourceKey::Global { name }
            | ResourceKey::Regional { name, .. }
            | ResourceKey::Zonal { name, .. } => name,
        }
    }

    /// Path of the collection holding this resource, relative to the project
    pub fn collection_path(&self, collection: &str) -> String {
        match self {
            ResourceKey::Global { .. } => format!("global/{collection}"),
            ResourceKey::Regional { region, .. } => format!("regions/{region}/{collection}"),
            ResourceKey::Zonal { zone, .. } => format!("zones/{zone}/{collection}"),
        }
    }

    /// Path of the resource itself, relative to the project
    pub fn resource_path(&self, collection: &str) -> String {
        format!("{}/{}", self.collection_path(collection), self.name())
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKey::Global { name } => write!(f, "global/{name}"),
            ResourceKey::Regional { name, region } => write!(f, "{region}/{name}"),
            ResourceKey::Zonal { name, zone } => write!(f, "{zone}/{name}"),
        }
    }
}

/// VPC network
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    pub name: String,

    /// Always sent so that `false` yields a custom-mode network
    #[serde(default)]
    pub auto_create_subnetworks: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing)]
    pub self_link: String,
}

impl ComputeResource for Network {
    const COLLECTION: &'static str = "networks";

    fn name(&self) -> &str {
        &self.name
    }
}

/// Regional subnetwork
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subnetwork {
    pub name: String,
    pub network: String,
    pub ip_cidr_range: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// e.g. `REGIONAL_MANAGED_PROXY` for proxy-only subnets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(default, skip_serializing)]
    pub self_link: String,
}

impl ComputeResource for Subnetwork {
    const COLLECTION: &'static str = "subnetworks";

    fn name(&self) -> &str {
        &self.name
    }
}

/// Firewall rule
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Firewall {
    pub name: String,
    pub network: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_ranges: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_tags: Vec<String>,

    #[serde(default)]
    pub allowed: Vec<FirewallAllowed>,

    #[serde(default, skip_serializing)]
    pub self_link: String,
}

/// Allowed protocol/ports pair of a firewall rule
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FirewallAllowed {
    #[serde(rename = "IPProtocol")]
    pub ip_protocol: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
}

impl ComputeResource for Firewall {
    const COLLECTION: &'static str = "firewalls";

    fn name(&self) -> &str {
        &self.name
    }
}

/// VM instance
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub name: String,
    pub machine_type: String,

    #[serde(default)]
    pub disks: Vec<AttachedDisk>,

    #[serde(default)]
    pub network_interfaces: Vec<NetworkInterface>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,

    #[serde(default, skip_serializing)]
    pub status: Option<String>,

    #[serde(default, skip_serializing)]
    pub self_link: String,
}

impl ComputeResource for Instance {
    const COLLECTION: &'static str = "instances";

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedDisk {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub disk_type: Option<String>,

    #[serde(default)]
    pub boot: bool,

    #[serde(default)]
    pub auto_delete: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub initialize_params: Option<AttachedDiskInitializeParams>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedDiskInitializeParams {
    pub source_image: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_size_gb: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    pub network: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnetwork: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub access_configs: Vec<AccessConfig>,

    #[serde(rename = "networkIP", default, skip_serializing)]
    pub network_ip: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessConfig {
    pub name: String,

    #[serde(rename = "type")]
    pub access_type: String,

    #[serde(rename = "natIP", default, skip_serializing)]
    pub nat_ip: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Tags {
    #[serde(default)]
    pub items: Vec<String>,
}

/// Long-running operation returned by insert/delete calls
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub name: String,

    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub self_link: String,

    #[serde(default)]
    pub error: Option<OperationError>,

    #[serde(default)]
    pub http_error_status_code: Option<u16>,

    #[serde(default)]
    pub http_error_message: Option<String>,
}

impl Operation {
    pub fn is_done(&self) -> bool {
        self.status == "DONE"
    }

    /// Joined error messages, if the operation failed
    pub fn error_message(&self) -> Option<String> {
        let errors = self.error.as_ref()?;
        if errors.errors.is_empty() {
            return None;
        }
        Some(
            errors
                .errors
                .iter()
                .map(|e| format!("{}: {}", e.code, e.message))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub errors: Vec<OperationErrorItem>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct OperationErrorItem {
    #[serde(default)]
    pub code: String,

    #[serde(default)]
    pub message: String,
}

/// Error envelope of a failed API call
#[derive(Clone, Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: u16,

    #[serde(default)]
    pub message: String,
}
