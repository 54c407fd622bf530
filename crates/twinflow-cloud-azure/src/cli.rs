//! az CLI wrapper
//!
//! Wraps the az CLI for resource operations, always requesting JSON output.
//! Every command is scoped to a single resource group.

use crate::error::{AzureError, Result, is_not_found};
use serde::Deserialize;
use std::process::Stdio;
use tokio::process::Command;

/// az CLI wrapper
pub struct AzCli {
    resource_group: String,
    subscription: Option<String>,
}

impl AzCli {
    pub fn new(resource_group: impl Into<String>, subscription: Option<String>) -> Self {
        Self {
            resource_group: resource_group.into(),
            subscription,
        }
    }

    pub fn resource_group(&self) -> &str {
        &self.resource_group
    }

    /// Check that the CLI is installed and a subscription is active
    pub async fn check_auth(&self) -> Result<AccountInfo> {
        let which = Command::new("which").arg("az").output().await?;
        if !which.status.success() {
            return Err(AzureError::CliNotFound);
        }

        let output = self.run(&["account", "show"]).await?;
        let account: AccountInfo = serde_json::from_str(&output)?;
        Ok(account)
    }

    /// Run an az command and return stdout
    ///
    /// `--resource-group` is appended automatically except for
    /// subscription-level commands (`account`, `storage`).
    pub async fn run(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new("az");
        cmd.args(args);
        if needs_resource_group(args) {
            cmd.arg("--resource-group").arg(&self.resource_group);
        }
        if let Some(subscription) = &self.subscription {
            cmd.arg("--subscription").arg(subscription);
        }
        cmd.arg("--output").arg("json");
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!("Running: az {}", args.join(" "));

        let output = cmd.output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            if is_not_found(&stderr) {
                return Err(AzureError::NotFound(args.join(" ")));
            }
            return Err(AzureError::CommandFailed { stderr });
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

/// storage data-plane とサブスクリプション系のコマンドはリソースグループを取らない
fn needs_resource_group(args: &[&str]) -> bool {
    !matches!(args.first(), Some(&"account") | Some(&"storage"))
}

/// az account show の結果
#[derive(Debug, Clone, Deserialize)]
pub struct AccountInfo {
    pub id: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_group_scoping() {
        assert!(needs_resource_group(&["functionapp", "show", "--name", "f"]));
        assert!(!needs_resource_group(&["account", "show"]));
        assert!(!needs_resource_group(&["storage", "table", "create"]));
    }
}
