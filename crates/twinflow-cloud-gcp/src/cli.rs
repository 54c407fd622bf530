//! gcloud CLI wrapper
//!
//! Wraps the gcloud CLI for resource operations, always requesting JSON
//! output and pinning project / region.

use crate::error::{GcpError, Result, is_not_found};
use std::process::Stdio;
use tokio::process::Command;

/// gcloud CLI wrapper
pub struct GcloudCli {
    project: String,
    region: String,
}

impl GcloudCli {
    pub fn new(project: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            region: region.into(),
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Check that the CLI is installed and an account is active
    pub async fn check_auth(&self) -> Result<String> {
        let which = Command::new("which").arg("gcloud").output().await?;
        if !which.status.success() {
            return Err(GcpError::CliNotFound);
        }

        let output = self
            .run(&["auth", "list", "--filter", "status:ACTIVE", "--format", "value(account)"])
            .await?;
        let account = output.trim().to_string();
        if account.is_empty() {
            return Err(GcpError::CommandFailed {
                stderr: "アクティブなアカウントがありません (gcloud auth login)".to_string(),
            });
        }
        Ok(account)
    }

    /// Run a gcloud command and return stdout
    pub async fn run(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new("gcloud");
        cmd.args(args);
        cmd.arg("--project").arg(&self.project);
        cmd.arg("--quiet");
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!("Running: gcloud {} --project {}", args.join(" "), self.project);

        let output = cmd.output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            if is_not_found(&stderr) {
                return Err(GcpError::NotFound(args.join(" ")));
            }
            return Err(GcpError::CommandFailed { stderr });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Run a command with `--format json` and parse stdout
    pub async fn run_json(&self, args: &[&str]) -> Result<serde_json::Value> {
        let mut full: Vec<&str> = args.to_vec();
        full.push("--format");
        full.push("json");
        let output = self.run(&full).await?;
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
