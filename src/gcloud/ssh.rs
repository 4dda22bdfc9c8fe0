//! HTTP checks from inside the VPC
//!
//! Internal load balancers are only reachable from the network they live
//! in, so requests are issued with `curl` on a helper VM reached through
//! `gcloud compute ssh`.

use anyhow::Result;
use tracing::debug;

use super::GcloudCli;
use crate::utils::{poll_until, CommandOutput, PollConfig};

/// SSH options for helper VMs
#[derive(Clone, Debug)]
pub struct VmSshConfig {
    /// Strict host key checking
    pub strict_host_key_checking: bool,

    /// Tunnel through IAP instead of the VM's external IP
    pub tunnel_through_iap: bool,

    /// Per-request curl timeout in seconds
    pub curl_timeout_secs: u64,

    /// Retry schedule for HTTP checks
    pub poll: PollConfig,
}

impl Default for VmSshConfig {
    fn default() -> Self {
        Self {
            strict_host_key_checking: false,
            tunnel_through_iap: false,
            curl_timeout_secs: 10,
            poll: PollConfig::from_secs(10, 20 * 60),
        }
    }
}

impl VmSshConfig {
    pub fn tunnel_through_iap(mut self, enabled: bool) -> Self {
        self.tunnel_through_iap = enabled;
        self
    }

    pub fn poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }
}

/// Runs commands on GCE instances with `gcloud compute ssh`
#[derive(Clone, Debug)]
pub struct VmSshClient {
    gcloud: GcloudCli,
    config: VmSshConfig,
}

impl VmSshClient {
    pub fn new(gcloud: GcloudCli, config: VmSshConfig) -> Self {
        Self { gcloud, config }
    }

    fn build_ssh_args(&self, instance: &str, zone: &str, command: &str) -> Vec<String> {
        let mut args = vec![
            "compute".to_string(),
            "ssh".to_string(),
            instance.to_string(),
            "--zone".to_string(),
            zone.to_string(),
            "--quiet".to_string(),
            format!(
                "--strict-host-key-checking={}",
                if self.config.strict_host_key_checking {
                    "yes"
                } else {
                    "no"
                }
            ),
        ];

        if self.config.tunnel_through_iap {
            args.push("--tunnel-through-iap".to_string());
        }

        args.push("--command".to_string());
        args.push(command.to_string());
        args
    }

    fn curl_command(&self, addr: &str) -> String {
        format!("curl -s --max-time {} {}", self.config.curl_timeout_secs, addr)
    }

    /// Execute a command on `instance`
    pub async fn exec(&self, instance: &str, zone: &str, command: &str) -> Result<CommandOutput> {
        debug!("Executing on {}/{}: {}", zone, instance, command);
        let args = self.build_ssh_args(instance, zone, command);
        self.gcloud.run(&args).await
    }

    /// Curl `addr` from `instance` until `check` accepts the response body.
    ///
    /// SSH or curl failures and rejected bodies are retried until the
    /// poll timeout expires.
    pub async fn check_http_via_vm<F>(
        &self,
        addr: &str,
        instance: &str,
        zone: &str,
        check: F,
    ) -> Result<()>
    where
        F: Fn(&[u8]) -> Result<()>,
    {
        let command = self.curl_command(addr);
        let what = format!("{addr} via {instance}");

        poll_until(&what, self.config.poll, || async {
            let output = match self.exec(instance, zone, &command).await {
                Ok(output) => output,
                Err(e) => {
                    debug!("ssh to {} failed: {:#}", instance, e);
                    return Ok::<_, anyhow::Error>(None);
                }
            };
            if !output.success() {
                debug!(
                    "curl {} from {} exited with {}: {}",
                    addr,
                    instance,
                    output.exit_code,
                    output.combined().trim()
                );
                return Ok(None);
            }
            match check(output.stdout.as_bytes()) {
                Ok(()) => Ok(Some(())),
                Err(e) => {
                    debug!("Check on response from {} failed: {:#}", addr, e);
                    Ok(None)
                }
            }
        })
        .await
    }
}
