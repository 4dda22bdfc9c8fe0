//! GKE BackendConfig custom resource
//!
//! Per-Service load balancer settings consumed by the GKE Ingress
//! controller.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// BackendConfig specification
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[kube(
    group = "cloud.google.com",
    version = "v1",
    kind = "BackendConfig",
    namespaced,
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfigSpec {
    /// Cloud Armor policy attached to the backend service
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_policy: Option<SecurityPolicyConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_sec: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_draining: Option<ConnectionDrainingConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cdn: Option<CdnConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check: Option<HealthCheckConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_affinity: Option<SessionAffinityConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub iap: Option<IapConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LogConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_request_headers: Option<CustomRequestHeadersConfig>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
pub struct SecurityPolicyConfig {
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDrainingConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draining_timeout_sec: Option<i64>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CdnConfig {
    pub enabled: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_policy: Option<CachePolicy>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CachePolicy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_host: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_protocol: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_query_string: Option<bool>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_interval_sec: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_sec: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub healthy_threshold: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub unhealthy_threshold: Option<i64>,

    /// HTTP, HTTPS or HTTP2
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_path: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionAffinityConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affinity_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub affinity_cookie_ttl_sec: Option<i64>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IapConfig {
    pub enabled: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauthclient_credentials: Option<OAuthClientCredentials>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OAuthClientCredentials {
    pub secret_name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogConfig {
    pub enable: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
pub struct CustomRequestHeadersConfig {
    #[serde(default)]
    pub headers: Vec<String>,
}
