//! Project leasing for CI runs
//!
//! A [`ProjectHolder`] acquires one project, keeps it marked busy in the
//! background so the Boskos reaper does not reclaim it, and hands it back
//! as dirty for the janitor to clean.

use anyhow::{Context, Result};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant};
use tracing::{info, warn};

use super::client::{BoskosClient, BoskosError, STATE_BUSY, STATE_DIRTY, STATE_FREE};

/// Default Boskos endpoint inside Prow clusters
pub const DEFAULT_BOSKOS_URL: &str = "http://boskos";

/// Acquire retry and refresh schedule
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HolderConfig {
    pub retry_interval: Duration,
    pub retry_steps: u32,
    pub update_interval: Duration,
}

impl Default for HolderConfig {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_secs(10),
            retry_steps: 30,
            update_interval: Duration::from_secs(5 * 60),
        }
    }
}

struct Refresher {
    quit: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Holds one Boskos project for the lifetime of a run
pub struct ProjectHolder {
    client: BoskosClient,
    config: HolderConfig,
    project: Option<String>,
    refresher: Option<Refresher>,
}

fn job_name(value: Option<String>) -> Result<String, BoskosError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(BoskosError::MissingJobName)
}

impl ProjectHolder {
    /// Holder owned by the current Prow job (`JOB_NAME`)
    pub fn new(url: &str) -> Result<Self> {
        let owner = job_name(std::env::var("JOB_NAME").ok())?;
        Ok(Self::with_client(BoskosClient::new(owner, url)?))
    }

    pub fn with_client(client: BoskosClient) -> Self {
        Self {
            client,
            config: HolderConfig::default(),
            project: None,
            refresher: None,
        }
    }

    pub fn with_config(mut self, config: HolderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    /// Acquire a free project of `resource_type`, retrying on a fixed
    /// schedule, and start refreshing it
    pub async fn acquire(&mut self, resource_type: &str) -> Result<String> {
        if let Some(project) = &self.project {
            anyhow::bail!("already holding boskos project {project}");
        }
        info!("Running in Prow, getting project resourceType = {:?}", resource_type);

        let mut last_error = None;
        for attempt in 1..=self.config.retry_steps {
            info!("Trying to acquire boskos project of type {}...", resource_type);
            match self.client.acquire(resource_type, STATE_FREE, STATE_BUSY).await {
                Ok(resource) => {
                    info!("Acquired boskos project {}", resource.name);
                    self.start_refresh(resource.name.clone());
                    self.project = Some(resource.name.clone());
                    return Ok(resource.name);
                }
                Err(e) => {
                    warn!(
                        "[Boskos] acquire attempt {}/{} failed: {}",
                        attempt, self.config.retry_steps, e
                    );
                    last_error = Some(e);
                }
            }
            if attempt < self.config.retry_steps {
                sleep(self.config.retry_interval).await;
            }
        }

        let err = match last_error {
            Some(e) => anyhow::Error::new(e),
            None => anyhow::anyhow!("no acquire attempts were made"),
        };
        Err(err.context("Error trying to acquire boskos project"))
    }

    fn start_refresh(&mut self, project: String) {
        let (quit, mut quit_rx) = oneshot::channel::<()>();
        let client = self.client.clone();
        let period = self.config.update_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = client.update(&project, STATE_BUSY).await {
                            warn!("[Boskos] Update {} failed with {}", project, e);
                        }
                    }
                    _ = &mut quit_rx => {
                        if let Err(e) = client.release(&project, STATE_DIRTY).await {
                            warn!("[Boskos] ReleaseOne {} failed with {}", project, e);
                        }
                        return;
                    }
                }
            }
        });

        self.refresher = Some(Refresher { quit, handle });
    }

    /// Stop refreshing and release the project as dirty, waiting for the
    /// release to finish
    pub async fn release(&mut self) -> Result<()> {
        let Some(refresher) = self.refresher.take() else {
            return Ok(());
        };
        // the task also releases when the sender is dropped
        let _ = refresher.quit.send(());
        refresher
            .handle
            .await
            .context("boskos refresh task failed")?;

        if let Some(project) = self.project.take() {
            info!("Released boskos project {}", project);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Boskos stand-in whose first `acquire_failures` acquires answer 404
    async fn boskos_server(acquire_failures: u64) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/acquire"))
            .respond_with(ResponseTemplate::new(404))
            .up_to_n_times(acquire_failures)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/acquire"))
            .and(query_param("type", "gke-internal-project"))
            .and(query_param("state", "free"))
            .and(query_param("dest", "busy"))
            .and(query_param("owner", "test-job"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "type": "gke-internal-project",
                "name": "test-project-1",
                "state": "busy",
                "owner": "test-job"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/update"))
            .and(query_param("name", "test-project-1"))
            .and(query_param("state", "busy"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1..)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/release"))
            .and(query_param("name", "test-project-1"))
            .and(query_param("dest", "dirty"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        server
    }

    fn fast_config(retry_steps: u32) -> HolderConfig {
        HolderConfig {
            retry_interval: Duration::from_millis(1),
            retry_steps,
            update_interval: Duration::from_millis(20),
        }
    }

    #[test]
    fn test_job_name_required() {
        assert!(matches!(job_name(None), Err(BoskosError::MissingJobName)));
        assert!(matches!(
            job_name(Some("  ".to_string())),
            Err(BoskosError::MissingJobName)
        ));
        assert_eq!(job_name(Some("ci-job".to_string())).unwrap(), "ci-job");
    }

    #[test]
    fn test_default_schedule() {
        let config = HolderConfig::default();
        assert_eq!(config.retry_interval, Duration::from_secs(10));
        assert_eq!(config.retry_steps, 30);
        assert_eq!(config.update_interval, Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_acquire_refresh_release() {
        let server = boskos_server(2).await;
        let client = BoskosClient::new("test-job", server.uri()).unwrap();
        let mut holder = ProjectHolder::with_client(client).with_config(fast_config(5));

        let project = holder.acquire("gke-internal-project").await.unwrap();
        assert_eq!(project, "test-project-1");
        assert_eq!(holder.project(), Some("test-project-1"));

        tokio::time::sleep(Duration::from_millis(70)).await;
        holder.release().await.unwrap();
        assert_eq!(holder.project(), None);

        let requests = server.received_requests().await.unwrap();
        let acquires = requests
            .iter()
            .filter(|r| r.url.path() == "/acquire")
            .count();
        assert_eq!(acquires, 3);
        let last = requests.last().unwrap();
        assert_eq!(last.url.path(), "/release");
    }

    #[tokio::test]
    async fn test_acquire_gives_up() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/acquire"))
            .respond_with(ResponseTemplate::new(404))
            .expect(3)
            .mount(&server)
            .await;

        let client = BoskosClient::new("test-job", server.uri()).unwrap();
        let mut holder = ProjectHolder::with_client(client).with_config(fast_config(3));

        let err = holder.acquire("gke-internal-project").await.unwrap_err();
        assert!(err.to_string().contains("Error trying to acquire boskos project"));
        assert_eq!(holder.project(), None);
    }

    #[tokio::test]
    async fn test_release_without_acquire_is_noop() {
        let client = BoskosClient::new("test-job", "http://127.0.0.1:9").unwrap();
        let mut holder = ProjectHolder::with_client(client);
        assert!(holder.release().await.is_ok());
    }
}
