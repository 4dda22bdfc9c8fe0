//! Configuration module
//!
//! Harness settings loaded from a YAML or JSON file, overridden by
//! `RECIPES_E2E_*` environment variables and then by command-line flags.

pub mod env;
pub mod file;

pub use env::EnvConfig;
pub use file::{default_config_path, load_or_default};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::boskos::DEFAULT_BOSKOS_URL;
use crate::gcloud::ReconcilePolicy;
use crate::tests::DEFAULT_RECIPE_ROOTS;
use crate::utils::PollConfig;

const SUPPORTED_VERSIONS: [&str; 1] = ["1.0"];

/// Harness configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Config file format version
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub cluster: ClusterSettings,

    #[serde(default)]
    pub boskos: BoskosSettings,

    #[serde(default)]
    pub recipes: RecipeSettings,

    #[serde(default)]
    pub polling: PollingSettings,

    #[serde(default)]
    pub tools: ToolSettings,

    /// Delete sandbox namespaces after each sub-test
    #[serde(default = "default_true")]
    pub destroy_sandboxes: bool,
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            cluster: ClusterSettings::default(),
            boskos: BoskosSettings::default(),
            recipes: RecipeSettings::default(),
            polling: PollingSettings::default(),
            tools: ToolSettings::default(),
            destroy_sandboxes: true,
        }
    }
}

impl HarnessConfig {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if is_yaml_file(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_yaml_file(path) {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_VERSIONS.contains(&self.version.as_str()) {
            anyhow::bail!("Unsupported config version: {}", self.version);
        }

        if self.cluster.num_nodes == 0 {
            anyhow::bail!("cluster.num_nodes must be at least 1");
        }

        if ReconcilePolicy::from_str(&self.cluster.reconcile).is_none() {
            anyhow::bail!(
                "Invalid cluster.reconcile {:?}. Valid: recreate, fail",
                self.cluster.reconcile
            );
        }

        if self.recipes.roots.is_empty() {
            anyhow::bail!("recipes.roots must not be empty");
        }

        for (name, poll) in self.polling.schedules() {
            if poll.interval_secs == 0 {
                anyhow::bail!("polling.{name}.interval_secs must be positive");
            }
            if poll.interval_secs > poll.timeout_secs {
                anyhow::bail!(
                    "polling.{name}: interval {}s exceeds timeout {}s",
                    poll.interval_secs,
                    poll.timeout_secs
                );
            }
        }

        Ok(())
    }

    /// Example configuration written by `config init`
    pub fn example() -> Self {
        let mut config = Self::default();
        config.cluster.location = Some("us-west1-a".to_string());
        config.cluster.project_id = Some("my-test-project".to_string());
        config
    }

    pub fn reconcile_policy(&self) -> ReconcilePolicy {
        ReconcilePolicy::from_str(&self.cluster.reconcile).unwrap_or_default()
    }
}

/// Test cluster settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterSettings {
    /// Project hosting the cluster. Ignored when a Boskos project is leased.
    pub project_id: Option<String>,

    /// Generated as `gke-networking-recipes-<suffix>` when unset
    pub name: Option<String>,

    /// Zone of the cluster
    pub location: Option<String>,

    pub num_nodes: u32,
    pub network_name: String,
    pub subnet_name: String,

    /// What to do with an existing cluster that does not match: `recreate` or `fail`
    pub reconcile: String,

    /// Delete the cluster after the run
    pub delete_after: bool,

    /// Defaults to `$HOME/.kube/config`
    pub kubeconfig: Option<PathBuf>,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            project_id: None,
            name: None,
            location: None,
            num_nodes: 3,
            network_name: "gke-networking-recipes-test".to_string(),
            subnet_name: "gke-networking-recipes-test-subnet".to_string(),
            reconcile: "recreate".to_string(),
            delete_after: false,
            kubeconfig: None,
        }
    }
}

/// Boskos project leasing
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoskosSettings {
    /// Lease a project from Boskos (set in Prow jobs)
    pub enabled: bool,
    pub url: String,
    pub resource_type: String,
}

impl Default for BoskosSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            url: DEFAULT_BOSKOS_URL.to_string(),
            resource_type: "gke-internal-project".to_string(),
        }
    }
}

/// Recipes checkout and script execution
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecipeSettings {
    /// Root of the recipes checkout
    pub dir: PathBuf,

    /// Directories scanned for recipes, relative to `dir`
    pub roots: Vec<String>,

    /// Delay between consecutive recipe starts
    pub stagger_secs: u64,

    pub shell: String,
}

impl Default for RecipeSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            roots: DEFAULT_RECIPE_ROOTS.iter().map(|r| r.to_string()).collect(),
            stagger_secs: 30,
            shell: "bash".to_string(),
        }
    }
}

impl RecipeSettings {
    pub fn stagger(&self) -> Duration {
        Duration::from_secs(self.stagger_secs)
    }
}

/// Interval and timeout of one readiness poll, in seconds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSettings {
    pub interval_secs: u64,
    pub timeout_secs: u64,
}

impl PollSettings {
    pub fn new(interval_secs: u64, timeout_secs: u64) -> Self {
        Self {
            interval_secs,
            timeout_secs,
        }
    }

    pub fn to_poll_config(self) -> PollConfig {
        PollConfig::from_secs(self.interval_secs, self.timeout_secs)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    /// Ingress load balancer IP
    pub ingress: PollSettings,

    /// HTTP checks through the helper VM
    pub http_via_vm: PollSettings,

    /// Compute API long-running operations
    pub operation: PollSettings,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            ingress: PollSettings::new(30, 45 * 60),
            http_via_vm: PollSettings::new(10, 20 * 60),
            operation: PollSettings::new(2, 10 * 60),
        }
    }
}

impl PollingSettings {
    fn schedules(&self) -> [(&'static str, PollSettings); 3] {
        [
            ("ingress", self.ingress),
            ("http_via_vm", self.http_via_vm),
            ("operation", self.operation),
        ]
    }
}

/// External binaries
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    pub gcloud: String,
    pub kubectl: String,

    /// Reach the helper VM through IAP instead of its external IP
    pub tunnel_through_iap: bool,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            gcloud: "gcloud".to_string(),
            kubectl: "kubectl".to_string(),
            tunnel_through_iap: false,
        }
    }
}

/// Check if file is YAML based on extension
fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = HarnessConfig::default();
        assert_eq!(config.cluster.num_nodes, 3);
        assert_eq!(config.boskos.resource_type, "gke-internal-project");
        assert_eq!(config.recipes.roots, vec!["ingress/single-cluster/", "authz/"]);
        assert_eq!(config.polling.ingress.timeout_secs, 2700);
        assert!(config.destroy_sandboxes);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config: HarnessConfig = serde_yaml::from_str(
            r#"
cluster:
  location: europe-west1-b
  num_nodes: 1
polling:
  ingress:
    interval_secs: 5
    timeout_secs: 60
"#,
        )
        .unwrap();

        assert_eq!(config.cluster.location.as_deref(), Some("europe-west1-b"));
        assert_eq!(config.cluster.num_nodes, 1);
        assert_eq!(config.cluster.reconcile, "recreate");
        assert_eq!(config.polling.ingress, PollSettings::new(5, 60));
        assert_eq!(config.polling.operation, PollSettings::new(2, 600));
        assert_eq!(config.tools.kubectl, "kubectl");
    }

    #[test]
    fn test_save_load_yaml_and_json() {
        let dir = tempdir().unwrap();
        let config = HarnessConfig::example();

        for name in ["config.yaml", "nested/config.json"] {
            let path = dir.path().join(name);
            config.save(&path).unwrap();
            assert_eq!(HarnessConfig::load(&path).unwrap(), config);
        }
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = HarnessConfig::default();
        config.cluster.reconcile = "ignore".to_string();
        assert!(config.validate().is_err());

        let mut config = HarnessConfig::default();
        config.polling.http_via_vm = PollSettings::new(120, 60);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("http_via_vm"));

        let mut config = HarnessConfig::default();
        config.version = "2.0".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reconcile_policy() {
        let mut config = HarnessConfig::default();
        assert_eq!(config.reconcile_policy(), ReconcilePolicy::Recreate);
        config.cluster.reconcile = "fail".to_string();
        assert_eq!(config.reconcile_policy(), ReconcilePolicy::Fail);
    }

    #[test]
    fn test_poll_settings_conversion() {
        let poll = PollSettings::new(30, 2700).to_poll_config();
        assert_eq!(poll.interval, Duration::from_secs(30));
        assert!(poll.immediate);
    }
}
