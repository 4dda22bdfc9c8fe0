//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::HarnessConfig;

/// End-to-end test harness for GKE networking recipes
#[derive(Parser, Debug)]
#[command(name = "gke-recipes-e2e")]
#[command(version = "0.1.0")]
#[command(about = "Run the GKE networking recipes end-to-end tests")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output (same as --log-level debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Configuration file (YAML or JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run every suite against the test cluster
    Run(RunArgs),

    /// Run the ingress suite only
    Ingress(RunArgs),

    /// Run the recipe scripts only
    Recipes(RunArgs),

    /// Decode a manifest and print the objects it contains
    Parse(ParseArgs),

    /// Manage the test cluster
    Cluster(ClusterArgs),

    /// Manage the configuration file
    Config(ConfigArgs),
}

/// Flags describing the test environment. Unset flags fall back to the
/// environment, then the config file.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct HarnessArgs {
    /// Path to the kubeconfig file [default: $HOME/.kube/config]
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,

    /// Project ID of the test cluster
    #[arg(long)]
    pub test_project_id: Option<String>,

    /// Name of the test cluster [default: gke-networking-recipes-<random>]
    #[arg(long)]
    pub cluster_name: Option<String>,

    /// Zone of the test cluster
    #[arg(long)]
    pub location: Option<String>,

    /// Number of nodes in each of the cluster's zones
    #[arg(long)]
    pub num_nodes: Option<u32>,

    /// VPC network of the cluster and helper VMs
    #[arg(long)]
    pub network_name: Option<String>,

    /// Subnet of the cluster and helper VMs
    #[arg(long)]
    pub subnet_name: Option<String>,

    /// Boskos resource type to lease
    #[arg(long)]
    pub boskos_resource_type: Option<String>,

    /// Lease the test project from Boskos
    #[arg(long)]
    pub run_in_prow: bool,

    /// Delete the cluster after the run
    #[arg(long)]
    pub delete_cluster: bool,

    /// Delete sandbox namespaces after each sub-test
    #[arg(long)]
    pub destroy_sandboxes: Option<bool>,

    /// Root of the recipes checkout
    #[arg(long)]
    pub recipes_dir: Option<PathBuf>,

    /// Existing cluster that does not match: recreate or fail
    #[arg(long)]
    pub reconcile: Option<String>,
}

impl HarnessArgs {
    /// Overlay the flags that were given onto `config`
    pub fn apply_to(&self, config: &mut HarnessConfig) {
        if let Some(kubeconfig) = &self.kubeconfig {
            config.cluster.kubeconfig = Some(kubeconfig.clone());
        }
        if let Some(project) = &self.test_project_id {
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
        if let Some(resource_type) = &self.boskos_resource_type {
            config.boskos.resource_type = resource_type.clone();
        }
        if self.run_in_prow {
            config.boskos.enabled = true;
        }
        if self.delete_cluster {
            config.cluster.delete_after = true;
        }
        if let Some(destroy) = self.destroy_sandboxes {
            config.destroy_sandboxes = destroy;
        }
        if let Some(dir) = &self.recipes_dir {
            config.recipes.dir = dir.clone();
        }
        if let Some(reconcile) = &self.reconcile {
            config.cluster.reconcile = reconcile.clone();
        }
    }
}

/// Arguments for the suite commands
#[derive(ClapArgs, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub harness: HarnessArgs,

    /// Only run these suites (hello-world, ingress, recipes)
    #[arg(long = "suite", value_delimiter = ',')]
    pub suites: Vec<String>,

    /// Output format (table, json, json-pretty, csv, brief)
    #[arg(short, long, default_value = "table")]
    pub format: String,

    /// Also write the JSON report to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

/// Arguments for parse command
#[derive(ClapArgs, Debug)]
pub struct ParseArgs {
    /// Manifest file
    pub file: PathBuf,

    /// Move namespaced objects into this namespace
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Output format (yaml, json)
    #[arg(short, long, default_value = "yaml")]
    pub format: String,
}

/// Arguments for cluster command
#[derive(ClapArgs, Debug)]
pub struct ClusterArgs {
    #[command(subcommand)]
    pub action: ClusterAction,
}

#[derive(Subcommand, Debug)]
pub enum ClusterAction {
    /// Create the cluster, or verify and reconcile an existing one
    Ensure(HarnessArgs),

    /// Delete the cluster
    Delete {
        #[command(flatten)]
        harness: HarnessArgs,

        /// Also delete the test subnet and network
        #[arg(long)]
        with_network: bool,
    },

    /// Fetch credentials into the kubeconfig
    Credentials(HarnessArgs),

    /// List clusters in the zone
    List(HarnessArgs),
}

/// Arguments for config command
#[derive(ClapArgs, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write an example configuration file
    Init {
        /// Destination [default: ~/.config/recipes-e2e/config.yaml]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,

    /// List the environment variables the harness reads
    Env,
}
