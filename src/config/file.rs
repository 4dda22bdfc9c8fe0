//! Configuration file discovery

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::HarnessConfig;

/// Configuration file locations (in order of precedence)
const CONFIG_LOCATIONS: &[&str] = &[
    "./recipes-e2e.yaml",
    "./recipes-e2e.yml",
    "./recipes-e2e.json",
    "~/.config/recipes-e2e/config.yaml",
];

/// Find configuration file in standard locations
pub fn find_config() -> Option<PathBuf> {
    CONFIG_LOCATIONS
        .iter()
        .map(|location| expand_path(location))
        .find(|path| path.exists())
}

/// Load `explicit` if given, else the first standard location that exists,
/// else the defaults. Returns the file that was read, if any.
pub fn load_or_default(explicit: Option<&Path>) -> Result<(HarnessConfig, Option<PathBuf>)> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => find_config(),
    };

    match path {
        Some(path) => {
            debug!("Loading config from {}", path.display());
            let config = HarnessConfig::load(&path)?;
            Ok((config, Some(path)))
        }
        None => Ok((HarnessConfig::default(), None)),
    }
}

/// Default path used by `config init`
pub fn default_config_path() -> PathBuf {
    expand_path("~/.config/recipes-e2e/config.yaml")
}

/// Expand ~ to home directory
fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
