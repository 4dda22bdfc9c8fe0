//! Sandbox bookkeeping for sub-tests

use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::k8s::Sandbox;
use crate::models::TestResult;
use crate::utils::Timer;

/// Namespaces handed out by one framework instance
#[derive(Debug)]
pub struct SandboxRegistry {
    kubectl: String,
    destroy_sandboxes: bool,
    sandboxes: Mutex<Vec<Arc<Sandbox>>>,
}

impl SandboxRegistry {
    pub fn new(kubectl: impl Into<String>, destroy_sandboxes: bool) -> Self {
        Self {
            kubectl: kubectl.into(),
            destroy_sandboxes,
            sandboxes: Mutex::new(Vec::new()),
        }
    }

    /// Run `test` inside a fresh namespace.
    ///
    /// A namespace this registry has already handed out fails the sub-test
    /// without running it.
    pub async fn run_with_sandbox<F, Fut>(&self, desc: &str, namespace: &str, test: F) -> TestResult
    where
        F: FnOnce(Arc<Sandbox>) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let timer = Timer::start(desc);

        let sandbox = {
            let mut sandboxes = self.sandboxes.lock().await;
            if sandboxes.iter().any(|s| s.namespace() == namespace) {
                return TestResult::fail(
                    desc,
                    timer.stop(),
                    format!("Sandbox {namespace} was created previously by the framework."),
                );
            }

            debug!("Using namespace {:?} for test sandbox", namespace);
            let sandbox = Arc::new(Sandbox::new(namespace, self.kubectl.as_str()));
            if let Err(e) = sandbox.create().await {
                return TestResult::fail(
                    desc,
                    timer.stop(),
                    format!("error creating sandbox: {e:#}"),
                );
            }
            sandboxes.push(Arc::clone(&sandbox));
            sandbox
        };

        let outcome = test(Arc::clone(&sandbox)).await;

        if self.destroy_sandboxes {
            sandbox.destroy().await;
        }

        match outcome {
            Ok(()) => TestResult::pass(desc, timer.stop()),
            Err(e) => TestResult::fail(desc, timer.stop(), format!("{e:#}")),
        }
    }

    pub async fn namespaces(&self) -> Vec<String> {
        self.sandboxes
            .lock()
            .await
            .iter()
            .map(|s| s.namespace().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TestStatus;

    #[tokio::test]
    async fn test_run_with_sandbox_passes() {
        let registry = SandboxRegistry::new("true", true);
        let result = registry
            .run_with_sandbox("smoke", "ns-a", |sandbox| async move {
                assert_eq!(sandbox.namespace(), "ns-a");
                Ok::<_, anyhow::Error>(())
            })
            .await;

        assert_eq!(result.status, TestStatus::Pass);
        assert_eq!(registry.namespaces().await, vec!["ns-a"]);
    }

    #[tokio::test]
    async fn test_namespace_reuse_fails_without_running() {
        let registry = SandboxRegistry::new("true", false);
        registry
            .run_with_sandbox("first", "shared", |_| async { Ok::<_, anyhow::Error>(()) })
            .await;

        let mut ran = false;
        let result = registry
            .run_with_sandbox("second", "shared", |_| {
                ran = true;
                async { Ok::<_, anyhow::Error>(()) }
            })
            .await;

        assert!(!ran);
        assert_eq!(result.status, TestStatus::Fail);
        assert!(result
            .message
            .unwrap()
            .contains("was created previously by the framework"));
    }

    #[tokio::test]
    async fn test_sandbox_destroyed_after_failure() {
        let registry = SandboxRegistry::new("true", true);
        let mut seen = None;
        let result = registry
            .run_with_sandbox("failing", "ns-b", |sandbox| {
                seen = Some(Arc::clone(&sandbox));
                async { Err::<(), _>(anyhow::anyhow!("Expect 1 ingress, got 0")) }
            })
            .await;

        assert_eq!(result.status, TestStatus::Fail);
        assert_eq!(result.message.as_deref(), Some("Expect 1 ingress, got 0"));
        assert!(seen.unwrap().is_destroyed().await);
    }

    #[tokio::test]
    async fn test_sandbox_kept_when_not_destroying() {
        let registry = SandboxRegistry::new("true", false);
        let mut seen = None;
        registry
            .run_with_sandbox("kept", "ns-c", |sandbox| {
                seen = Some(Arc::clone(&sandbox));
                async { Ok::<_, anyhow::Error>(()) }
            })
            .await;

        assert!(!seen.unwrap().is_destroyed().await);
    }

    #[tokio::test]
    async fn test_sandbox_create_failure() {
        let registry = SandboxRegistry::new("false", true);
        let result = registry
            .run_with_sandbox("broken", "ns-d", |_| async { Ok::<_, anyhow::Error>(()) })
            .await;

        assert_eq!(result.status, TestStatus::Fail);
        assert!(result.message.unwrap().contains("error creating sandbox"));
        assert!(registry.namespaces().await.is_empty());
    }
}
