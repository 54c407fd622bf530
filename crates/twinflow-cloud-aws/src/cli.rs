//! aws CLI wrapper
//!
//! Wraps the aws CLI for resource operations, always requesting JSON output.

use crate::error::{AwsError, Result, is_not_found};
use serde::Deserialize;
use std::process::Stdio;
use tokio::process::Command;

/// aws CLI wrapper
pub struct AwsCli {
    region: String,
    profile: Option<String>,
}

impl AwsCli {
    pub fn new(region: impl Into<String>, profile: Option<String>) -> Self {
        Self {
            region: region.into(),
            profile,
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Check that the CLI is installed and credentials resolve
    pub async fn check_auth(&self) -> Result<CallerIdentity> {
        let which = Command::new("which").arg("aws").output().await?;
        if !which.status.success() {
            return Err(AwsError::CliNotFound);
        }

        let output = self.run(&["sts", "get-caller-identity"]).await?;
        let identity: CallerIdentity = serde_json::from_str(&output)?;
        Ok(identity)
    }

    /// Run an aws command and return stdout
    pub async fn run(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new("aws");
        cmd.arg("--region").arg(&self.region);
        if let Some(profile) = &self.profile {
            cmd.arg("--profile").arg(profile);
        }
        cmd.arg("--output").arg("json");
        cmd.args(args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!("Running: aws --region {} {}", self.region, args.join(" "));

        let output = cmd.output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            if is_not_found(&stderr) {
                return Err(AwsError::NotFound(args.join(" ")));
            }
            return Err(AwsError::CommandFailed { stderr });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Run a command and parse stdout as JSON
    pub async fn run_json(&self, args: &[&str]) -> Result<serde_json::Value> {
        let output = self.run(args).await?;
        if output.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_str(&output)?)
    }

    /// Run a command ignoring stdout
    pub async fn run_ok(&self, args: &[&str]) -> Result<()> {
        self.run(args).await.map(|_| ())
    }
}

/// sts get-caller-identity の結果
#[derive(Debug, Clone, Deserialize)]
pub struct CallerIdentity {
    #[serde(rename = "Account")]
    pub account: String,
    #[serde(rename = "Arn")]
    pub arn: String,
}
