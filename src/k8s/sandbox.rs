//! Per-test namespaces

use anyhow::{Context, Result};
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::utils;

/// Namespace scoping one test's resources; destroying it removes them all
#[derive(Debug)]
pub struct Sandbox {
    namespace: String,
    kubectl: String,
    destroyed: Mutex<bool>,
}

impl Sandbox {
    pub fn new(namespace: impl Into<String>, kubectl: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            kubectl: kubectl.into(),
            destroyed: Mutex::new(false),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// `kubectl create namespace`
    pub async fn create(&self) -> Result<()> {
        utils::run_checked(&self.kubectl, ["create", "namespace", self.namespace.as_str()])
            .await
            .with_context(|| format!("failed to create namespace {}", self.namespace))?;
        Ok(())
    }

    /// Delete the namespace once. Failures are logged and the sandbox still
    /// counts as destroyed. Returns whether this call did the work.
    pub async fn destroy(&self) -> bool {
        let mut destroyed = self.destroyed.lock().await;
        if *destroyed {
            return false;
        }
        info!("Destroying test sandbox {:?}", self.namespace);

        if let Err(e) =
            utils::run_checked(&self.kubectl, ["delete", "namespace", self.namespace.as_str()]).await
        {
            error!("failed to delete namespace {}: {:#}", self.namespace, e);
        }
        *destroyed = true;
        true
    }

    pub async fn is_destroyed(&self) -> bool {
        *self.destroyed.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create() {
        let sandbox = Sandbox::new("test-ns", "true");
        assert!(sandbox.create().await.is_ok());
        assert_eq!(sandbox.namespace(), "test-ns");
    }

    #[tokio::test]
    async fn test_create_failure_names_namespace() {
        let sandbox = Sandbox::new("test-ns", "false");
        let err = sandbox.create().await.unwrap_err();
        assert!(err.to_string().contains("failed to create namespace test-ns"));
    }

    #[tokio::test]
    async fn test_destroy_once() {
        let sandbox = Sandbox::new("test-ns", "true");
        assert!(!sandbox.is_destroyed().await);
        assert!(sandbox.destroy().await);
        assert!(!sandbox.destroy().await);
        assert!(sandbox.is_destroyed().await);
    }

    #[tokio::test]
    async fn test_destroy_failure_still_marks_destroyed() {
        let sandbox = Sandbox::new("test-ns", "false");
        assert!(sandbox.destroy().await);
        assert!(sandbox.is_destroyed().await);
    }
}
