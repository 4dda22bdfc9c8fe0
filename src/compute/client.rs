//! GCE Compute REST client
//!
//! Project-scoped get/insert/delete over the v1 API. Mutations return a
//! long-running operation which is polled until it is `DONE`.

use anyhow::{Context, Result};
use goauth::auth::{JwtClaims, Token};
use goauth::credentials::Credentials;
use goauth::scopes::Scope;
use reqwest::{Client, Method, RequestBuilder, Response};
use smpl_jwt::Jwt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use super::models::{ApiErrorResponse, ComputeResource, Operation, ResourceKey};
use crate::gcloud::GcloudCli;
use crate::utils::{poll_until, PollConfig};

pub const COMPUTE_BASE_URL: &str = "https://compute.googleapis.com/compute/v1";

/// Env var holding a pre-minted OAuth token
pub const ACCESS_TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// Env var naming a service account key file
pub const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// Env var overriding the metadata server `host:port`
pub const METADATA_HOST_ENV: &str = "GCE_METADATA_HOST";

const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";
const METADATA_TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";
const METADATA_TIMEOUT: Duration = Duration::from_secs(3);

/// Tokens are refreshed this long before they expire
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(200);

/// `gcloud` does not report an expiry
const GCLOUD_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

/// Compute API errors
#[derive(Error, Debug)]
pub enum ComputeError {
    #[error("googleapi: Error {code}: {message}")]
    Api { code: u16, message: String },

    #[error("operation {name} failed: {message}")]
    OperationFailed { name: String, message: String },

    #[error("failed to obtain access token: {0}")]
    Auth(String),
}

/// True when `err` or any error it wraps is a Compute API error with
/// HTTP status `code`
pub fn is_http_error_code(err: &anyhow::Error, code: u16) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<ComputeError>(),
            Some(ComputeError::Api { code: c, .. }) if *c == code
        )
    })
}

/// `us-west1-a` -> `us-west1`. Zones with fewer than two dash-separated
/// tokens have no region.
pub fn region_from_zone(zone: &str) -> String {
    let tokens: Vec<&str> = zone.split('-').collect();
    if tokens.len() < 2 {
        return String::new();
    }
    tokens[..tokens.len() - 1].join("-")
}

#[derive(Debug)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

type TokenCache = Mutex<Option<CachedToken>>;

#[derive(Debug)]
struct MintedToken {
    token: String,
    ttl: Duration,
}

impl From<&Token> for MintedToken {
    fn from(token: &Token) -> Self {
        Self {
            token: token.access_token().to_string(),
            ttl: Duration::from_secs(u64::from(token.expires_in()))
                .saturating_sub(TOKEN_EXPIRY_MARGIN),
        }
    }
}

/// Where OAuth tokens come from, resolved like Application Default
/// Credentials
#[derive(Debug)]
enum TokenSource {
    Static(String),
    ServiceAccount {
        credentials: Credentials,
        cache: TokenCache,
    },
    /// Metadata server, then `gcloud auth print-access-token`
    Implicit {
        http: Client,
        metadata_url: String,
        gcloud: GcloudCli,
        cache: TokenCache,
    },
}

impl TokenSource {
    fn from_env(gcloud: GcloudCli) -> Result<Self> {
        Self::select(
            std::env::var(ACCESS_TOKEN_ENV).ok(),
            std::env::var(CREDENTIALS_ENV).ok(),
            std::env::var(METADATA_HOST_ENV).ok(),
            gcloud,
        )
    }

    /// Pre-minted token first, then the service account file, then the
    /// implicit sources
    fn select(
        access_token: Option<String>,
        credentials_path: Option<String>,
        metadata_host: Option<String>,
        gcloud: GcloudCli,
    ) -> Result<Self> {
        let non_empty = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(token) = non_empty(access_token) {
            return Ok(TokenSource::Static(token));
        }

        if let Some(path) = non_empty(credentials_path) {
            let credentials = Credentials::from_file(&path).map_err(|e| {
                ComputeError::Auth(format!("invalid credentials file {path}: {e}"))
            })?;
            return Ok(TokenSource::ServiceAccount {
                credentials,
                cache: Mutex::new(None),
            });
        }

        let host = non_empty(metadata_host).unwrap_or_else(|| DEFAULT_METADATA_HOST.to_string());
        let http = Client::builder()
            .timeout(METADATA_TIMEOUT)
            .build()
            .context("Failed to create metadata HTTP client")?;
        Ok(TokenSource::Implicit {
            http,
            metadata_url: format!("http://{host}{METADATA_TOKEN_PATH}"),
            gcloud,
            cache: Mutex::new(None),
        })
    }

    async fn token(&self) -> Result<String> {
        match self {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::ServiceAccount { credentials, cache } => {
                cached(cache, || fetch_service_account_token(credentials)).await
            }
            TokenSource::Implicit {
                http,
                metadata_url,
                gcloud,
                cache,
            } => {
                cached(cache, || async {
                    match fetch_metadata_token(http, metadata_url).await {
                        Ok(minted) => Ok(minted),
                        Err(e) => {
                            debug!("Metadata server token unavailable: {:#}", e);
                            let token = gcloud.access_token().await?;
                            Ok(MintedToken {
                                token,
                                ttl: GCLOUD_TOKEN_TTL,
                            })
                        }
                    }
                })
                .await
            }
        }
    }
}

/// Cached token, or a freshly minted one when missing or expired
async fn cached<F, Fut>(cache: &TokenCache, mint: F) -> Result<String>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<MintedToken>>,
{
    let mut cache = cache.lock().await;
    if let Some(cached) = cache.as_ref() {
        if Instant::now() < cached.expires_at {
            return Ok(cached.token.clone());
        }
    }

    let minted = mint()
        .await
        .map_err(|e| ComputeError::Auth(format!("{e:#}")))?;
    *cache = Some(CachedToken {
        token: minted.token.clone(),
        expires_at: Instant::now() + minted.ttl,
    });
    Ok(minted.token)
}

async fn fetch_service_account_token(credentials: &Credentials) -> Result<MintedToken> {
    let claims = JwtClaims::new(
        credentials.iss(),
        &[Scope::Compute],
        credentials.token_uri(),
        None,
        None,
    );
    let rsa_key = credentials
        .rsa_key()
        .map_err(|e| anyhow::anyhow!("invalid RSA key in credentials: {e}"))?;
    let jwt = Jwt::new(claims, rsa_key, None);

    debug!("Fetching service account token for {}", credentials.iss());
    let token = goauth::get_token(&jwt, credentials)
        .await
        .map_err(|e| anyhow::anyhow!("failed to get OAuth token: {e}"))?;
    Ok(MintedToken::from(&token))
}

async fn fetch_metadata_token(http: &Client, url: &str) -> Result<MintedToken> {
    debug!("Fetching token from {}", url);
    let response = http
        .get(url)
        .header("Metadata-Flavor", "Google")
        .send()
        .await
        .with_context(|| format!("GET {url} failed"))?;

    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("metadata server returned {status}");
    }
    let token: Token = response
        .json()
        .await
        .context("Failed to decode metadata server token")?;
    Ok(MintedToken::from(&token))
}

/// Compute API client bound to one project
#[derive(Clone, Debug)]
pub struct ComputeClient {
    client: Client,
    base_url: String,
    project: String,
    tokens: Arc<TokenSource>,
    operation_poll: PollConfig,
}

impl ComputeClient {
    /// Client authenticating with `GOOGLE_OAUTH_ACCESS_TOKEN` when set,
    /// else the `GOOGLE_APPLICATION_CREDENTIALS` service account, else the
    /// metadata server, else `gcloud auth print-access-token`
    pub fn new(project: impl Into<String>, gcloud: GcloudCli) -> Result<Self> {
        let tokens = TokenSource::from_env(gcloud)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: COMPUTE_BASE_URL.to_string(),
            project: project.into(),
            tokens: Arc::new(tokens),
            operation_poll: PollConfig::from_secs(2, 10 * 60),
        })
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn operation_poll(mut self, poll: PollConfig) -> Self {
        self.operation_poll = poll;
        self
    }

    #[cfg(test)]
    pub(crate) fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.tokens = Arc::new(TokenSource::Static(token.into()));
        self
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    fn project_url(&self) -> String {
        format!(
            "{}/projects/{}",
            self.base_url.trim_end_matches('/'),
            self.project
        )
    }

    fn collection_url<R: ComputeResource>(&self, key: &ResourceKey) -> String {
        format!("{}/{}", self.project_url(), key.collection_path(R::COLLECTION))
    }

    fn resource_url<R: ComputeResource>(&self, key: &ResourceKey) -> String {
        format!("{}/{}", self.project_url(), key.resource_path(R::COLLECTION))
    }

    async fn request(&self, method: Method, url: &str) -> Result<RequestBuilder> {
        let token = self.tokens.token().await?;
        Ok(self.client.request(method, url).bearer_auth(token))
    }

    /// Fetch a resource
    pub async fn get<R: ComputeResource>(&self, key: &ResourceKey) -> Result<R> {
        let url = self.resource_url::<R>(key);
        debug!("GET {}", url);

        let response = self
            .request(Method::GET, &url)
            .await?
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;

        let response = check_status(response).await?;
        response
            .json::<R>()
            .await
            .with_context(|| format!("Failed to decode {} {}", R::COLLECTION, key))
    }

    /// Insert a resource and wait for the operation to finish
    pub async fn insert<R: ComputeResource>(&self, key: &ResourceKey, resource: &R) -> Result<()> {
        let url = self.collection_url::<R>(key);
        debug!("POST {} ({})", url, resource.name());

        let response = self
            .request(Method::POST, &url)
            .await?
            .json(resource)
            .send()
            .await
            .with_context(|| format!("POST {url} failed"))?;

        let operation: Operation = check_status(response)
            .await?
            .json()
            .await
            .context("Failed to decode operation")?;
        self.wait_for_operation(operation).await
    }

    /// Delete a resource and wait for the operation to finish
    pub async fn delete<R: ComputeResource>(&self, key: &ResourceKey) -> Result<()> {
        let url = self.resource_url::<R>(key);
        debug!("DELETE {}", url);

        let response = self
            .request(Method::DELETE, &url)
            .await?
            .send()
            .await
            .with_context(|| format!("DELETE {url} failed"))?;

        let operation: Operation = check_status(response)
            .await?
            .json()
            .await
            .context("Failed to decode operation")?;
        self.wait_for_operation(operation).await
    }

    async fn wait_for_operation(&self, operation: Operation) -> Result<()> {
        let operation = if operation.is_done() {
            operation
        } else {
            let link = operation.self_link.clone();
            let what = format!("operation {}", operation.name);
            poll_until(&what, self.operation_poll, || async {
                let response = self
                    .request(Method::GET, &link)
                    .await?
                    .send()
                    .await
                    .with_context(|| format!("GET {link} failed"))?;
                let op: Operation = check_status(response)
                    .await?
                    .json()
                    .await
                    .context("Failed to decode operation")?;
                Ok::<_, anyhow::Error>(if op.is_done() { Some(op) } else { None })
            })
            .await?
        };

        match operation.error_message() {
            Some(message) => Err(ComputeError::OperationFailed {
                name: operation.name,
                message,
            }
            .into()),
            None => Ok(()),
        }
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorResponse>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);

    Err(ComputeError::Api {
        code: status.as_u16(),
        message,
    }
    .into())
}
