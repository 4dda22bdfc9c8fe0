//! Ingress readiness

use anyhow::Result;
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::Api;
use kube::Client;
use tracing::info;

use super::object::ObjectKey;
use crate::utils::{poll_until, PollConfig};

/// Default schedule: every 30s for up to 45 minutes, first check immediate
pub fn default_ingress_poll() -> PollConfig {
    PollConfig::from_secs(30, 45 * 60)
}

/// First load balancer IP, if one has been assigned
pub fn ingress_ip(ingress: &Ingress) -> Option<String> {
    ingress
        .status
        .as_ref()?
        .load_balancer
        .as_ref()?
        .ingress
        .as_ref()?
        .first()?
        .ip
        .clone()
        .filter(|ip| !ip.is_empty())
}

/// Wait until the Ingress at `key` has a load balancer IP and return it.
/// Fetch errors are logged and retried.
pub async fn wait_for_ingress(client: &Client, key: &ObjectKey, poll: PollConfig) -> Result<String> {
    let api: Api<Ingress> = match &key.namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::default_namespaced(client.clone()),
    };
    let what = format!("ingress {key} IP");

    poll_until(&what, poll, || async {
        let ingress = match api.get(&key.name).await {
            Ok(ingress) => ingress,
            Err(e) => {
                info!("fetchIngress({}) = {}", key, e);
                return Ok::<_, anyhow::Error>(None);
            }
        };
        match ingress_ip(&ingress) {
            Some(ip) => Ok(Some(ip)),
            None => {
                info!("Ingress {} has no IP yet", key);
                Ok(None)
            }
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::networking::v1::{
        IngressLoadBalancerIngress, IngressLoadBalancerStatus, IngressStatus,
    };
    use std::time::Duration;

    fn with_ips(ips: Vec<Option<&str>>) -> Ingress {
        Ingress {
            status: Some(IngressStatus {
                load_balancer: Some(IngressLoadBalancerStatus {
                    ingress: Some(
                        ips.into_iter()
                            .map(|ip| IngressLoadBalancerIngress {
                                ip: ip.map(str::to_string),
                                ..Default::default()
                            })
                            .collect(),
                    ),
                }),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_ingress_ip() {
        assert_eq!(ingress_ip(&Ingress::default()), None);
        assert_eq!(ingress_ip(&with_ips(vec![])), None);
        assert_eq!(ingress_ip(&with_ips(vec![Some("")])), None);
        assert_eq!(ingress_ip(&with_ips(vec![None, Some("10.0.0.2")])), None);
        assert_eq!(
            ingress_ip(&with_ips(vec![Some("10.0.0.1"), Some("10.0.0.2")])),
            Some("10.0.0.1".to_string())
        );
    }

    #[test]
    fn test_default_ingress_poll() {
        let poll = default_ingress_poll();
        assert_eq!(poll.interval, Duration::from_secs(30));
        assert_eq!(poll.timeout, Duration::from_secs(2700));
        assert!(poll.immediate);
    }
}
