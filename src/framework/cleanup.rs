//! Deferred teardown
//!
//! Cloud resources created by a test register their teardown here as soon
//! as they exist. Teardown runs last-in first-out whether or not the test
//! body succeeded.

use anyhow::Result;
use futures::future::BoxFuture;
use std::future::Future;
use tracing::{error, info};

/// LIFO stack of async teardown actions
#[derive(Default)]
pub struct Cleanups<'a> {
    actions: Vec<(String, BoxFuture<'a, Result<()>>)>,
}

impl<'a> Cleanups<'a> {
    pub fn new() -> Self {
        Self {
            actions: Vec::new(),
        }
    }

    pub fn push<F>(&mut self, desc: impl Into<String>, action: F)
    where
        F: Future<Output = Result<()>> + Send + 'a,
    {
        self.actions.push((desc.into(), Box::pin(action)));
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Run every action, newest first. Returns one message per failure.
    pub async fn run(mut self) -> Vec<String> {
        let mut failures = Vec::new();

        while let Some((desc, action)) = self.actions.pop() {
            info!("Cleanup: {}", desc);
            if let Err(e) = action.await {
                error!("Cleanup {} failed: {:#}", desc, e);
                failures.push(format!("{desc} failed: {e:#}"));
            }
        }

        failures
    }
}
