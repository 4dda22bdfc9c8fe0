//! End-to-end suites
//!
//! - Hello world smoke test
//! - Ingress custom default backend (single cluster, internal Ingress)
//! - Recipe scripts under the recipes checkout

mod recipe;

pub use ingress::IngressTestSuite;
pub use recipe::{RecipeTestSuite, DEFAULT_RECIPE_ROOTS};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use crate::models::TestResult;

/// Selectable suite
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Suite {
    HelloWorld,
    Ingress,
    Recipes,
}

impl Suite {
    pub fn all() -> Vec<Suite> {
        vec![Suite::HelloWorld, Suite::Ingress, Suite::Recipes]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Suite::HelloWorld => "hello-world",
            Suite::Ingress => "ingress",
            Suite::Recipes => "recipes",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "hello-world" | "hello" => Some(Suite::HelloWorld),
            "ingress" => Some(Suite::Ingress),
            "recipes" | "recipe" => Some(Suite::Recipes),
            _ => None,
        }
    }
}

/// Smoke test that needs nothing but a running harness
pub fn hello_world() -> TestResult {
    info!("Hello world");
    TestResult::pass("HelloWorld", 0)
}

/// Body returned by the echo server the recipes deploy
#[derive(Debug, Deserialize)]
struct EchoResponse {
    #[serde(default)]
    pod_name: String,
}

/// Check that the response came from a pod whose name starts with `prefix`
pub fn validate_pod_name(response: &[u8], prefix: &str) -> Result<()> {
    let echo: EchoResponse = serde_json::from_slice(response).with_context(|| {
        format!(
            "failed to decode response {:?}",
            String::from_utf8_lossy(response)
        )
    })?;

    if !echo.pod_name.starts_with(prefix) {
        anyhow::bail!(
            "expect response from a pod with prefix {:?}, got pod {:?}",
            prefix,
            echo.pod_name
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TestStatus;

    #[test]
    fn test_validate_pod_name_matches_prefix() {
        let body = br#"{"cluster_name":"c","pod_name":"foo-6d4f8b7c9-x2k4l","zone":"us-west1-a"}"#;
        assert!(validate_pod_name(body, "foo").is_ok());
    }

    #[test]
    fn test_validate_pod_name_rejects_other_backend() {
        let body = br#"{"pod_name":"default-be-7c8d9-abcde"}"#;
        let err = validate_pod_name(body, "foo").unwrap_err();
        assert!(err.to_string().contains("default-be-7c8d9-abcde"));
    }

    #[test]
    fn test_validate_pod_name_missing_field() {
        assert!(validate_pod_name(br#"{"zone":"us-west1-a"}"#, "foo").is_err());
        // Empty prefix accepts any decodable body
        assert!(validate_pod_name(br#"{}"#, "").is_ok());
    }

    #[test]
    fn test_validate_pod_name_not_json() {
        let err = validate_pod_name(b"<html>502 Bad Gateway</html>", "foo").unwrap_err();
        assert!(err.to_string().contains("failed to decode response"));
    }

    #[test]
    fn test_hello_world() {
        let result = hello_world();
        assert_eq!(result.status, TestStatus::Pass);
        assert_eq!(result.name, "HelloWorld");
    }

    #[test]
    fn test_suite_from_str() {
        assert_eq!(Suite::from_str("Ingress"), Some(Suite::Ingress));
        assert_eq!(Suite::from_str("hello"), Some(Suite::HelloWorld));
        assert_eq!(Suite::from_str("multi-cluster"), None);
        for suite in Suite::all() {
            assert_eq!(Suite::from_str(suite.name()), Some(suite));
        }
    }
}
