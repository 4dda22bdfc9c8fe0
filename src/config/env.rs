//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;
use std::path::PathBuf;

use super::HarnessConfig;

/// Environment variable prefix
const ENV_PREFIX: &str = "RECIPES_E2E";

/// Environment configuration from environment variables
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EnvConfig {
    /// Project from RECIPES_E2E_PROJECT_ID
    pub project_id: Option<String>,
    /// Cluster from RECIPES_E2E_CLUSTER_NAME
    pub cluster_name: Option<String>,
    /// Zone from RECIPES_E2E_LOCATION
    pub location: Option<String>,
    /// Node count from RECIPES_E2E_NUM_NODES
    pub num_nodes: Option<u32>,
    /// Network from RECIPES_E2E_NETWORK
    pub network_name: Option<String>,
    /// Subnet from RECIPES_E2E_SUBNET
    pub subnet_name: Option<String>,
    /// Boskos endpoint from RECIPES_E2E_BOSKOS_URL
    pub boskos_url: Option<String>,
    /// Boskos resource type from RECIPES_E2E_BOSKOS_RESOURCE_TYPE
    pub boskos_resource_type: Option<String>,
    /// Prow mode from RECIPES_E2E_RUN_IN_PROW
    pub run_in_prow: Option<bool>,
    /// Cluster teardown from RECIPES_E2E_DELETE_CLUSTER
    pub delete_cluster: Option<bool>,
    /// Recipes checkout from RECIPES_E2E_RECIPES_DIR
    pub recipes_dir: Option<PathBuf>,
    /// Config file from RECIPES_E2E_CONFIG
    pub config_file: Option<PathBuf>,
    /// Log level from RECIPES_E2E_LOG_LEVEL
    pub log_level: Option<String>,
    /// First kubeconfig listed in KUBECONFIG
    pub kubeconfig: Option<PathBuf>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            project_id: get_env("PROJECT_ID"),
            cluster_name: get_env("CLUSTER_NAME"),
            location: get_env("LOCATION"),
            num_nodes: get_env_parse("NUM_NODES"),
            network_name: get_env("NETWORK"),
            subnet_name: get_env("SUBNET"),
            boskos_url: get_env("BOSKOS_URL"),
            boskos_resource_type: get_env("BOSKOS_RESOURCE_TYPE"),
            run_in_prow: get_env_bool("RUN_IN_PROW"),
            delete_cluster: get_env_bool("DELETE_CLUSTER"),
            recipes_dir: get_env("RECIPES_DIR").map(PathBuf::from),
            config_file: get_env("CONFIG").map(PathBuf::from),
            log_level: get_env("LOG_LEVEL"),
            kubeconfig: env::var_os("KUBECONFIG").and_then(|v| first_kubeconfig(&v)),
        }
    }

    /// Overlay the variables that are set onto `config`
    pub fn apply_to(&self, config: &mut HarnessConfig) {
        if let Some(project) = &self.project_id {
            config.cluster.project_id = Some(project.clone());
        }
        if let Some(name) = &self.cluster_name {
            config.cluster.name = Some(name.clone());
        }
        if let Some(location) = &self.location {
            config.cluster.location = Some(location.clone());
        }
        if let Some(num_nodes) = self.num_nodes {
            config.cluster.num_nodes = num_nodes;
        }
        if let Some(network) = &self.network_name {
            config.cluster.network_name = network.clone();
        }
        if let Some(subnet) = &self.subnet_name {
            config.cluster.subnet_name = subnet.clone();
        }
        if let Some(url) = &self.boskos_url {
            config.boskos.url = url.clone();
        }
        if let Some(resource_type) = &self.boskos_resource_type {
            config.boskos.resource_type = resource_type.clone();
        }
        if let Some(in_prow) = self.run_in_prow {
            config.boskos.enabled = in_prow;
        }
        if let Some(delete) = self.delete_cluster {
            config.cluster.delete_after = delete;
        }
        if let Some(dir) = &self.recipes_dir {
            config.recipes.dir = dir.clone();
        }
        if let Some(kubeconfig) = &self.kubeconfig {
            config.cluster.kubeconfig = Some(kubeconfig.clone());
        }
    }

    /// Print current environment configuration
    pub fn print_summary(&self) {
        println!("Environment Configuration:");
        println!("  {}_PROJECT_ID:    {:?}", ENV_PREFIX, self.project_id);
        println!("  {}_CLUSTER_NAME:  {:?}", ENV_PREFIX, self.cluster_name);
        println!("  {}_LOCATION:      {:?}", ENV_PREFIX, self.location);
        println!("  {}_NUM_NODES:     {:?}", ENV_PREFIX, self.num_nodes);
        println!("  {}_RUN_IN_PROW:   {:?}", ENV_PREFIX, self.run_in_prow);
        println!("  {}_RECIPES_DIR:   {:?}", ENV_PREFIX, self.recipes_dir);
        println!("  {}_CONFIG:        {:?}", ENV_PREFIX, self.config_file);
        println!("  KUBECONFIG:                {:?}", self.kubeconfig);
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}"))
        .ok()
        .filter(|v| !v.is_empty())
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.parse().ok())
}

/// Get environment variable as boolean
fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|v| {
        matches!(
            v.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on" | "enabled"
        )
    })
}

/// Print all RECIPES_E2E environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_PROJECT_ID            Project of the test cluster");
    println!("  {ENV_PREFIX}_CLUSTER_NAME          Name of the test cluster");
    println!("  {ENV_PREFIX}_LOCATION              Zone of the test cluster");
    println!("  {ENV_PREFIX}_NUM_NODES             Nodes per zone");
    println!("  {ENV_PREFIX}_NETWORK               VPC network name");
    println!("  {ENV_PREFIX}_SUBNET                Cluster subnet name");
    println!("  {ENV_PREFIX}_BOSKOS_URL            Boskos endpoint");
    println!("  {ENV_PREFIX}_BOSKOS_RESOURCE_TYPE  Boskos resource type to lease");
    println!("  {ENV_PREFIX}_RUN_IN_PROW           Lease the project from Boskos (true/false)");
    println!("  {ENV_PREFIX}_DELETE_CLUSTER        Delete the cluster after the run (true/false)");
    println!("  {ENV_PREFIX}_RECIPES_DIR           Root of the recipes checkout");
    println!("  {ENV_PREFIX}_CONFIG                Path to configuration file");
    println!("  {ENV_PREFIX}_LOG_LEVEL             trace, debug, info, warn or error");
    println!("  KUBECONFIG                       Kubeconfig path list; the first entry is used");
    println!();
    println!("Example:");
    println!("  export {ENV_PREFIX}_LOCATION=us-west1-a");
    println!("  export {ENV_PREFIX}_PROJECT_ID=my-test-project");
    println!("  gke-recipes-e2e run");
}

/// KUBECONFIG may list several files; `gcloud container clusters
/// get-credentials` writes to the first one
fn first_kubeconfig(value: &std::ffi::OsStr) -> Option<PathBuf> {
    env::split_paths(value).find(|path| !path.as_os_str().is_empty())
}
