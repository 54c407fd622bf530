//! Google Cloud provisioner implementation
//!
//! Maps pipeline resource kinds to Cloud Functions / Pub/Sub / Firestore /
//! Cloud Storage / Workflows / API Gateway via the gcloud CLI.
//!
//! Idempotence contract: create checks existence first; for function
//! resources the deployed environment variables are compared against the
//! requested spec. The runtime injects its own variables so the check is a
//! containment check. destroy treats NotFound as already-destroyed.
//!
//! DeviceGateway / FeedbackFunction はプラン解決段階で拒否されるため通常は
//! 到達しないが、到達した場合も Configuration エラーとして返す。

use crate::cli::GcloudCli;
use crate::error::GcpError;
use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;
use twinflow_cloud::{
    AuthStatus, CloudError, InvocationMode, NameContext, Provisioner, ResourceHandle,
    ResourceSpec, default_resource_name,
};
use twinflow_core::{ProviderId, ResourceKind};

const MAX_NAME_LEN: usize = 63;
const MAX_SERVICE_ACCOUNT_LEN: usize = 30;

/// Google Cloud provisioner
pub struct GcpProvisioner {
    cli: GcloudCli,
}

impl GcpProvisioner {
    pub fn new(project: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            cli: GcloudCli::new(project, region),
        }
    }

    fn unsupported(kind: ResourceKind) -> GcpError {
        GcpError::Unsupported(kind.as_str().to_string())
    }

    /// サービスアカウント ID は 30 文字まで
    fn service_account_id(name: &str) -> String {
        let mut id = name.to_string();
        id.truncate(MAX_SERVICE_ACCOUNT_LEN);
        id.trim_matches('-').to_string()
    }

    fn service_account_email(&self, name: &str) -> String {
        format!(
            "{}@{}.iam.gserviceaccount.com",
            Self::service_account_id(name),
            self.cli.project()
        )
    }

    fn bucket_uri(name: &str) -> String {
        format!("gs://{name}")
    }

    fn env_vars_arg(environment: &BTreeMap<String, String>) -> String {
        environment
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn source(spec: &ResourceSpec) -> String {
        spec.config
            .get("source")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("dist/{}", spec.role))
    }

    async fn deploy_function(&self, spec: &ResourceSpec) -> crate::error::Result<()> {
        let region = self.cli.region().to_string();
        let runtime = spec
            .config
            .get("runtime")
            .and_then(|v| v.as_str())
            .unwrap_or("nodejs20");
        let entry_point = spec
            .config
            .get("entry-point")
            .and_then(|v| v.as_str())
            .unwrap_or("entry_point");
        let source = Self::source(spec);
        let env_vars = Self::env_vars_arg(&spec.environment);

        let mut args: Vec<&str> = vec![
            "functions",
            "deploy",
            &spec.name,
            "--gen2",
            "--region",
            &region,
            "--runtime",
            runtime,
            "--entry-point",
            entry_point,
            "--source",
            &source,
            "--trigger-http",
        ];
        if !env_vars.is_empty() {
            args.push("--set-env-vars");
            args.push(&env_vars);
        }
        // ブリッジ受信側は Bearer トークン検証を関数側で行うため公開する
        if spec.kind == ResourceKind::RelayIngress {
            args.push("--allow-unauthenticated");
        }
        self.cli.run_ok(&args).await
    }

    async fn describe_function(&self, name: &str) -> crate::error::Result<serde_json::Value> {
        let region = self.cli.region().to_string();
        self.cli
            .run_json(&["functions", "describe", name, "--gen2", "--region", &region])
            .await
    }

    async fn describe(&self, kind: ResourceKind, name: &str) -> crate::error::Result<()> {
        let region = self.cli.region().to_string();
        match kind {
            ResourceKind::DeviceGateway | ResourceKind::FeedbackFunction => {
                Err(Self::unsupported(kind))
            }
            k if k.is_function() => self.describe_function(name).await.map(|_| ()),
            ResourceKind::IngestStream => {
                self.cli.run_ok(&["pubsub", "topics", "describe", name]).await
            }
            ResourceKind::ServiceRole => {
                let email = self.service_account_email(name);
                self.cli
                    .run_ok(&["iam", "service-accounts", "describe", &email])
                    .await
            }
            ResourceKind::HotTable | ResourceKind::TwinModelStore => {
                self.cli
                    .run_ok(&["firestore", "databases", "describe", "--database", name])
                    .await
            }
            ResourceKind::ColdBucket
            | ResourceKind::ArchiveBucket
            | ResourceKind::DashboardSite => {
                let uri = Self::bucket_uri(name);
                self.cli.run_ok(&["storage", "buckets", "describe", &uri]).await
            }
            ResourceKind::NotificationWorkflow => {
                self.cli
                    .run_ok(&["workflows", "describe", name, "--location", &region])
                    .await
            }
            ResourceKind::ApiGateway => {
                self.cli.run_ok(&["api-gateway", "apis", "describe", name]).await
            }
            _ => unreachable!("function kinds handled above"),
        }
    }
}

#[async_trait]
impl Provisioner for GcpProvisioner {
    fn provider_id(&self) -> ProviderId {
        ProviderId::Gcp
    }

    fn display_name(&self) -> &str {
        "Google Cloud"
    }

    async fn check_auth(&self) -> twinflow_cloud::Result<AuthStatus> {
        match self.cli.check_auth().await {
            Ok(account) => Ok(AuthStatus::ok(format!(
                "{account} (project {})",
                self.cli.project()
            ))),
            Err(GcpError::CliNotFound) => {
                Ok(AuthStatus::failed("gcloud CLI がインストールされていません"))
            }
            Err(e) => Ok(AuthStatus::failed(e.to_string())),
        }
    }

    async fn exists(&self, kind: ResourceKind, name: &str) -> twinflow_cloud::Result<bool> {
        match self.describe(kind, name).await {
            Ok(()) => Ok(true),
            Err(GcpError::NotFound(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn create(&self, spec: &ResourceSpec) -> twinflow_cloud::Result<ResourceHandle> {
        if matches!(
            spec.kind,
            ResourceKind::DeviceGateway | ResourceKind::FeedbackFunction
        ) {
            return Err(Self::unsupported(spec.kind).into());
        }

        if self.exists(spec.kind, &spec.name).await? {
            // 関数は環境変数（相互参照の埋込先）の包含でドリフトを検出。
            // ランタイムが注入する変数は比較対象外。
            if spec.kind.is_function() {
                let deployed = self.describe_function(&spec.name).await?;
                let vars = &deployed["serviceConfig"]["environmentVariables"];
                let conflicting = spec.environment.iter().any(|(k, v)| {
                    vars.get(k).and_then(|x| x.as_str()) != Some(v.as_str())
                });
                if conflicting {
                    return Err(CloudError::drift(
                        &spec.name,
                        "デプロイ済み関数の環境変数が要求と一致しません",
                    ));
                }
            }
            tracing::info!("{} は既に存在します (no-op)", spec.name);
            let handle = ResourceHandle::existing(&spec.name, spec.kind, ProviderId::Gcp);
            return self.augment_handle(handle).await;
        }

        tracing::info!("Google Cloud リソースを作成: {} ({})", spec.name, spec.kind);
        let region = self.cli.region().to_string();
        match spec.kind {
            k if k.is_function() => {
                self.deploy_function(spec).await?;
            }
            ResourceKind::IngestStream => {
                self.cli.run_ok(&["pubsub", "topics", "create", &spec.name]).await?;
            }
            ResourceKind::ServiceRole => {
                let id = Self::service_account_id(&spec.name);
                self.cli
                    .run_ok(&[
                        "iam",
                        "service-accounts",
                        "create",
                        &id,
                        "--display-name",
                        &spec.name,
                    ])
                    .await?;
            }
            ResourceKind::HotTable | ResourceKind::TwinModelStore => {
                self.cli
                    .run_ok(&[
                        "firestore",
                        "databases",
                        "create",
                        "--database",
                        &spec.name,
                        "--location",
                        &region,
                        "--type",
                        "firestore-native",
                    ])
                    .await?;
            }
            ResourceKind::ColdBucket
            | ResourceKind::ArchiveBucket
            | ResourceKind::DashboardSite => {
                let uri = Self::bucket_uri(&spec.name);
                self.cli
                    .run_ok(&["storage", "buckets", "create", &uri, "--location", &region])
                    .await?;
            }
            ResourceKind::NotificationWorkflow => {
                let source = spec
                    .config
                    .get("source")
                    .and_then(|v| v.as_str())
                    .unwrap_or("dist/workflow.yaml");
                self.cli
                    .run_ok(&[
                        "workflows",
                        "deploy",
                        &spec.name,
                        "--source",
                        source,
                        "--location",
                        &region,
                    ])
                    .await?;
            }
            ResourceKind::ApiGateway => {
                self.cli
                    .run_ok(&["api-gateway", "apis", "create", &spec.name])
                    .await?;
            }
            _ => unreachable!("unsupported kinds rejected above"),
        }

        let handle = ResourceHandle::created(&spec.name, spec.kind, ProviderId::Gcp);
        self.augment_handle(handle).await
    }

    async fn destroy(&self, kind: ResourceKind, name: &str) -> twinflow_cloud::Result<()> {
        if matches!(
            kind,
            ResourceKind::DeviceGateway | ResourceKind::FeedbackFunction
        ) {
            // 作成不能な種別の破棄は常に no-op
            return Ok(());
        }

        tracing::info!("Google Cloud リソースを破棄: {name} ({kind})");
        let region = self.cli.region().to_string();
        let result = match kind {
            k if k.is_function() => {
                self.cli
                    .run_ok(&["functions", "delete", name, "--gen2", "--region", &region])
                    .await
            }
            ResourceKind::IngestStream => {
                self.cli.run_ok(&["pubsub", "topics", "delete", name]).await
            }
            ResourceKind::ServiceRole => {
                let email = self.service_account_email(name);
                self.cli
                    .run_ok(&["iam", "service-accounts", "delete", &email])
                    .await
            }
            ResourceKind::HotTable | ResourceKind::TwinModelStore => {
                self.cli
                    .run_ok(&["firestore", "databases", "delete", "--database", name])
                    .await
            }
            ResourceKind::ColdBucket
            | ResourceKind::ArchiveBucket
            | ResourceKind::DashboardSite => {
                let uri = Self::bucket_uri(name);
                self.cli.run_ok(&["storage", "rm", "--recursive", &uri]).await
            }
            ResourceKind::NotificationWorkflow => {
                self.cli
                    .run_ok(&["workflows", "delete", name, "--location", &region])
                    .await
            }
            ResourceKind::ApiGateway => {
                self.cli.run_ok(&["api-gateway", "apis", "delete", name]).await
            }
            _ => unreachable!("unsupported kinds rejected above"),
        };

        match result {
            Ok(()) => Ok(()),
            Err(GcpError::NotFound(_)) => {
                tracing::debug!("{name} は存在しません（破棄済み扱い）");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn resource_name(&self, ctx: &NameContext) -> String {
        sanitize_name(&default_resource_name(ctx))
    }

    async fn redeploy_function(
        &self,
        name: &str,
        spec: &ResourceSpec,
    ) -> twinflow_cloud::Result<()> {
        tracing::info!("Google Cloud 関数を再デプロイ: {name}");
        let region = self.cli.region().to_string();
        match spec.kind {
            ResourceKind::NotificationWorkflow => {
                let source = spec
                    .config
                    .get("source")
                    .and_then(|v| v.as_str())
                    .unwrap_or("dist/workflow.yaml");
                self.cli
                    .run_ok(&[
                        "workflows",
                        "deploy",
                        name,
                        "--source",
                        source,
                        "--location",
                        &region,
                    ])
                    .await?;
            }
            _ => {
                // functions deploy は既存関数に対して更新として働く
                self.deploy_function(spec).await?;
            }
        }
        Ok(())
    }

    async fn invoke_function(
        &self,
        name: &str,
        payload: serde_json::Value,
        mode: InvocationMode,
    ) -> twinflow_cloud::Result<serde_json::Value> {
        let region = self.cli.region().to_string();
        let data = payload.to_string();
        let result = self
            .cli
            .run_json(&[
                "functions",
                "call",
                name,
                "--gen2",
                "--region",
                &region,
                "--data",
                &data,
            ])
            .await
            .map_err(CloudError::from)?;
        match mode {
            InvocationMode::Async => Ok(json!({ "status": "accepted" })),
            InvocationMode::Sync => Ok(result),
        }
    }
}

impl GcpProvisioner {
    /// 種別に応じて参照属性（サービスアカウント / URL）を付与する。
    /// 再実行時も同じ参照を解決できるよう、既存パスでも呼ぶ。
    async fn augment_handle(
        &self,
        mut handle: ResourceHandle,
    ) -> twinflow_cloud::Result<ResourceHandle> {
        match handle.kind {
            ResourceKind::ServiceRole => {
                let email = self.service_account_email(&handle.name);
                handle = handle.with_attribute("arn", json!(email));
            }
            ResourceKind::RelayIngress => {
                let deployed = self.describe_function(&handle.name).await?;
                if let Some(uri) = deployed["serviceConfig"]["uri"].as_str() {
                    handle = handle.with_attribute("url", json!(uri));
                }
            }
            _ => {}
        }
        Ok(handle)
    }
}

/// Cloud Functions / バケットの制約に合わせた決定論的サニタイズ
fn sanitize_name(name: &str) -> String {
    let mut sanitized: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect();
    sanitized.truncate(MAX_NAME_LEN);
    sanitized.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use twinflow_core::LayerId;

    fn provisioner() -> GcpProvisioner {
        GcpProvisioner::new("factory-twin-prj", "asia-northeast1")
    }

    #[test]
    fn test_resource_name_limit() {
        let ctx = NameContext::new(
            "a-project-with-an-unreasonably-long-name-for-cloud-resources",
            LayerId::ColdStorage,
            "cold-bucket",
        );
        assert!(provisioner().resource_name(&ctx).len() <= MAX_NAME_LEN);
    }

    #[test]
    fn test_service_account_id_limit() {
        let id = GcpProvisioner::service_account_id("factory-twin-l2-compute-role-extended");
        assert!(id.len() <= MAX_SERVICE_ACCOUNT_LEN);
        assert!(!id.ends_with('-'));
    }

    #[test]
    fn test_service_account_email() {
        let email = provisioner().service_account_email("factory-twin-l2-compute-role");
        assert!(email.ends_with("@factory-twin-prj.iam.gserviceaccount.com"));
    }

    #[test]
    fn test_env_vars_arg_formatting() {
        let mut env = BTreeMap::new();
        env.insert("TABLE".to_string(), "t".to_string());
        env.insert("STREAM".to_string(), "s".to_string());
        assert_eq!(GcpProvisioner::env_vars_arg(&env), "STREAM=s,TABLE=t");
    }
}
