//! External command execution
//!
//! Thin wrapper over `tokio::process::Command` shared by the `gcloud`,
//! `kubectl` and `bash` callers.

use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Captured result of a finished command
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// stdout followed by stderr, like a combined output stream
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}{}", self.stdout, self.stderr),
        }
    }
}

/// Run `program` with `args` and capture its output.
///
/// A non-zero exit is not an error here; callers decide.
pub async fn run<I, S>(program: &str, args: I) -> Result<CommandOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    run_with(program, args, None).await
}

/// Like [`run`], with `dir` as the working directory
pub async fn run_in_dir<I, S>(program: &str, args: I, dir: &Path) -> Result<CommandOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    run_with(program, args, Some(dir)).await
}

async fn run_with<I, S>(program: &str, args: I, dir: Option<&Path>) -> Result<CommandOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<_> = args
        .into_iter()
        .map(|a| a.as_ref().to_os_string())
        .collect();
    debug!("Executing {} {:?}", program, args);

    let mut command = Command::new(program);
    command.args(&args).stdin(Stdio::null());
    if let Some(dir) = dir {
        command.current_dir(dir);
    }

    let output = command
        .output()
        .await
        .with_context(|| format!("Failed to execute {program}"))?;

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        exit_code: output.status.code().unwrap_or(-1),
    })
}

/// Run `program` and fail with its combined output on a non-zero exit
pub async fn run_checked<I, S>(program: &str, args: I) -> Result<CommandOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = run(program, args).await?;
    if !output.success() {
        anyhow::bail!(
            "{program} exited with code {}: {:?}",
            output.exit_code,
            output.combined().trim()
        );
    }
    Ok(output)
}
