//! Boskos HTTP client
//!
//! Boskos leases cloud projects to CI jobs. Resources move between
//! states (`free`, `busy`, `dirty`) and are owned by the job name.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const STATE_FREE: &str = "free";
pub const STATE_BUSY: &str = "busy";
pub const STATE_DIRTY: &str = "dirty";

/// Boskos errors
#[derive(Error, Debug)]
pub enum BoskosError {
    #[error("JOB_NAME is required but not provided")]
    MissingJobName,

    #[error("boskos does not have a {state} {resource_type} at the moment")]
    NoResource { resource_type: String, state: String },

    #[error("boskos {operation} returned {status}: {body}")]
    Status {
        operation: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("boskos request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// A leased resource
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "type", default)]
    pub resource_type: String,

    pub name: String,

    #[serde(default)]
    pub state: String,

    #[serde(default)]
    pub owner: String,
}

/// Client for one owner against one Boskos server
#[derive(Clone, Debug)]
pub struct BoskosClient {
    http: Client,
    url: String,
    owner: String,
}

impl BoskosClient {
    pub fn new(owner: impl Into<String>, url: impl Into<String>) -> Result<Self, BoskosError> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            http,
            url: url.into().trim_end_matches('/').to_string(),
            owner: owner.into(),
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Move one resource of `resource_type` from `state` to `dest`
    pub async fn acquire(
        &self,
        resource_type: &str,
        state: &str,
        dest: &str,
    ) -> Result<Resource, BoskosError> {
        debug!("boskos acquire type={} {}->{}", resource_type, state, dest);
        let response = self
            .http
            .post(format!("{}/acquire", self.url))
            .query(&[
                ("type", resource_type),
                ("state", state),
                ("dest", dest),
                ("owner", self.owner.as_str()),
            ])
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            StatusCode::NOT_FOUND => Err(BoskosError::NoResource {
                resource_type: resource_type.to_string(),
                state: state.to_string(),
            }),
            status => Err(BoskosError::Status {
                operation: "acquire",
                status,
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    /// Refresh ownership of `name`, keeping it in `state`
    pub async fn update(&self, name: &str, state: &str) -> Result<(), BoskosError> {
        let response = self
            .http
            .post(format!("{}/update", self.url))
            .query(&[("name", name), ("owner", self.owner.as_str()), ("state", state)])
            .send()
            .await?;
        check(response, "update").await
    }

    /// Hand `name` back in state `dest`
    pub async fn release(&self, name: &str, dest: &str) -> Result<(), BoskosError> {
        let response = self
            .http
            .post(format!("{}/release", self.url))
            .query(&[("name", name), ("owner", self.owner.as_str()), ("dest", dest)])
            .send()
            .await?;
        check(response, "release").await
    }
}

async fn check(response: reqwest::Response, operation: &'static str) -> Result<(), BoskosError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    Err(BoskosError::Status {
        operation,
        status,
        body: response.text().await.unwrap_or_default(),
    })
}
