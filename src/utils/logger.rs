//! Logging setup

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// `--log-level`/`LOG_LEVEL` value to a level; `warning` is accepted too
pub fn parse_level(s: &str) -> Option<Level> {
    match s.trim().to_lowercase().as_str() {
        "warning" => Some(Level::WARN),
        other => other.parse().ok(),
    }
}

/// Filter for the harness's own spans at `level`, unless `RUST_LOG` is set
fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("gke_recipes_e2e={level}")))
}

pub fn init_logger(level: Level) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_target(false)
        .compact()
        .init();
}
