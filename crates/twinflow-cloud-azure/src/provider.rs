//! Azure provisioner implementation
//!
//! Maps pipeline resource kinds to Function Apps / Event Hubs / IoT Hub /
//! Storage / Logic Apps / API Management / Digital Twins via the az CLI.
//!
//! Idempotence contract: create checks existence first; for function
//! resources the deployed app settings are compared against the requested
//! spec. Azure injects its own platform settings (AzureWebJobsStorage etc.)
//! so the check is a containment check, not strict equality. destroy treats
//! NotFound as already-destroyed.
//!
//! Each Function App hosts a single function named `handler`, exposed at
//! `/api/handler`. The bridge ingress URL and the invoke passthrough both
//! rely on that convention.

use crate::cli::AzCli;
use crate::error::AzureError;
use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;
use twinflow_cloud::{
    AuthStatus, CloudError, InvocationMode, NameContext, Provisioner, ResourceHandle,
    ResourceSpec, default_resource_name,
};
use twinflow_core::{ProviderId, ResourceKind};

const MAX_NAME_LEN: usize = 60;
const ENTRY_FUNCTION: &str = "handler";

/// Azure provisioner
pub struct AzureProvisioner {
    cli: AzCli,
    storage_account: String,
    location: String,
}

impl AzureProvisioner {
    pub fn new(
        resource_group: impl Into<String>,
        storage_account: impl Into<String>,
        location: impl Into<String>,
        subscription: Option<String>,
    ) -> Self {
        Self {
            cli: AzCli::new(resource_group, subscription),
            storage_account: storage_account.into(),
            location: location.into(),
        }
    }

    /// Storage Table 名は英数字のみ
    fn table_name(name: &str) -> String {
        name.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
    }

    /// Event Hubs 名前空間（ハブごとに 1 つ、決定論的に導出）
    fn namespace_name(name: &str) -> String {
        let mut ns = format!("{name}-ns");
        ns.truncate(50);
        ns
    }

    fn function_url(name: &str) -> String {
        format!("https://{name}.azurewebsites.net/api/{ENTRY_FUNCTION}")
    }

    fn package(spec: &ResourceSpec) -> String {
        spec.config
            .get("package")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("dist/{}.zip", spec.role))
    }

    async fn account_exists(&self, subcommand: &str, name: &str) -> crate::error::Result<bool> {
        let output = self
            .cli
            .run_json(&[
                "storage",
                subcommand,
                "exists",
                "--name",
                name,
                "--account-name",
                &self.storage_account,
                "--auth-mode",
                "login",
            ])
            .await?;
        Ok(output["exists"].as_bool().unwrap_or(false))
    }

    async fn describe(&self, kind: ResourceKind, name: &str) -> crate::error::Result<bool> {
        match kind {
            k if k.is_function() => {
                match self.cli.run_ok(&["functionapp", "show", "--name", name]).await {
                    Ok(()) => Ok(true),
                    Err(AzureError::NotFound(_)) => Ok(false),
                    Err(e) => Err(e),
                }
            }
            ResourceKind::HotTable => {
                self.account_exists("table", &Self::table_name(name)).await
            }
            ResourceKind::ColdBucket
            | ResourceKind::ArchiveBucket
            | ResourceKind::DashboardSite => self.account_exists("container", name).await,
            _ => {
                let namespace = Self::namespace_name(name);
                let args: Vec<&str> = match kind {
                    ResourceKind::DeviceGateway => vec!["iot", "hub", "show", "--name", name],
                    ResourceKind::IngestStream => {
                        vec![
                            "eventhubs",
                            "eventhub",
                            "show",
                            "--name",
                            name,
                            "--namespace-name",
                            &namespace,
                        ]
                    }
                    ResourceKind::ServiceRole => vec!["identity", "show", "--name", name],
                    ResourceKind::NotificationWorkflow => {
                        vec!["logic", "workflow", "show", "--name", name]
                    }
                    ResourceKind::ApiGateway => vec!["apim", "show", "--name", name],
                    ResourceKind::TwinModelStore => vec!["dt", "show", "--dt-name", name],
                    _ => unreachable!("handled above"),
                };
                match self.cli.run_ok(&args).await {
                    Ok(()) => Ok(true),
                    Err(AzureError::NotFound(_)) => Ok(false),
                    Err(e) => Err(e),
                }
            }
        }
    }

    async fn create_function_app(&self, spec: &ResourceSpec) -> crate::error::Result<()> {
        let runtime = spec
            .config
            .get("runtime")
            .and_then(|v| v.as_str())
            .unwrap_or("node");
        self.cli
            .run_ok(&[
                "functionapp",
                "create",
                "--name",
                &spec.name,
                "--storage-account",
                &self.storage_account,
                "--consumption-plan-location",
                &self.location,
                "--runtime",
                runtime,
                "--functions-version",
                "4",
            ])
            .await?;
        self.apply_app_settings(&spec.name, &spec.environment).await
    }

    async fn apply_app_settings(
        &self,
        name: &str,
        environment: &BTreeMap<String, String>,
    ) -> crate::error::Result<()> {
        if environment.is_empty() {
            return Ok(());
        }
        let settings: Vec<String> = environment
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        let mut args: Vec<&str> = vec![
            "functionapp",
            "config",
            "appsettings",
            "set",
            "--name",
            name,
            "--settings",
        ];
        args.extend(settings.iter().map(String::as_str));
        self.cli.run_ok(&args).await
    }

    /// デプロイ済みアプリ設定（プラットフォーム設定込み）
    async fn deployed_settings(
        &self,
        name: &str,
    ) -> crate::error::Result<BTreeMap<String, String>> {
        let output = self
            .cli
            .run_json(&["functionapp", "config", "appsettings", "list", "--name", name])
            .await?;
        let mut settings = BTreeMap::new();
        if let Some(entries) = output.as_array() {
            for entry in entries {
                if let (Some(key), Some(value)) =
                    (entry["name"].as_str(), entry["value"].as_str())
                {
                    settings.insert(key.to_string(), value.to_string());
                }
            }
        }
        Ok(settings)
    }
}

#[async_trait]
impl Provisioner for AzureProvisioner {
    fn provider_id(&self) -> ProviderId {
        ProviderId::Azure
    }

    fn display_name(&self) -> &str {
        "Azure"
    }

    async fn check_auth(&self) -> twinflow_cloud::Result<AuthStatus> {
        match self.cli.check_auth().await {
            Ok(account) => Ok(AuthStatus::ok(format!(
                "{} (subscription {})",
                account.name, account.id
            ))),
            Err(AzureError::CliNotFound) => {
                Ok(AuthStatus::failed("az CLI がインストールされていません"))
            }
            Err(e) => Ok(AuthStatus::failed(e.to_string())),
        }
    }

    async fn exists(&self, kind: ResourceKind, name: &str) -> twinflow_cloud::Result<bool> {
        Ok(self.describe(kind, name).await?)
    }

    async fn create(&self, spec: &ResourceSpec) -> twinflow_cloud::Result<ResourceHandle> {
        if self.exists(spec.kind, &spec.name).await? {
            // アプリ設定（相互参照の埋込先）が要求を含むかでドリフトを検出。
            // Azure 側が注入するプラットフォーム設定は比較対象外。
            if spec.kind.is_function() {
                let deployed = self.deployed_settings(&spec.name).await?;
                let conflicting = spec
                    .environment
                    .iter()
                    .any(|(k, v)| deployed.get(k) != Some(v));
                if conflicting {
                    return Err(CloudError::drift(
                        &spec.name,
                        "デプロイ済みアプリ設定が要求と一致しません",
                    ));
                }
            }
            tracing::info!("{} は既に存在します (no-op)", spec.name);
            let handle = ResourceHandle::existing(&spec.name, spec.kind, ProviderId::Azure);
            return Ok(self.augment_handle(handle).await?);
        }

        tracing::info!("Azure リソースを作成: {} ({})", spec.name, spec.kind);
        match spec.kind {
            k if k.is_function() => {
                self.create_function_app(spec).await?;
            }
            ResourceKind::HotTable => {
                let table = Self::table_name(&spec.name);
                self.cli
                    .run_ok(&[
                        "storage",
                        "table",
                        "create",
                        "--name",
                        &table,
                        "--account-name",
                        &self.storage_account,
                        "--auth-mode",
                        "login",
                    ])
                    .await?;
            }
            ResourceKind::ColdBucket
            | ResourceKind::ArchiveBucket
            | ResourceKind::DashboardSite => {
                self.cli
                    .run_ok(&[
                        "storage",
                        "container",
                        "create",
                        "--name",
                        &spec.name,
                        "--account-name",
                        &self.storage_account,
                        "--auth-mode",
                        "login",
                    ])
                    .await?;
            }
            ResourceKind::IngestStream => {
                let namespace = Self::namespace_name(&spec.name);
                self.cli
                    .run_ok(&[
                        "eventhubs",
                        "namespace",
                        "create",
                        "--name",
                        &namespace,
                        "--location",
                        &self.location,
                    ])
                    .await?;
                self.cli
                    .run_ok(&[
                        "eventhubs",
                        "eventhub",
                        "create",
                        "--name",
                        &spec.name,
                        "--namespace-name",
                        &namespace,
                    ])
                    .await?;
            }
            ResourceKind::DeviceGateway => {
                self.cli
                    .run_ok(&[
                        "iot",
                        "hub",
                        "create",
                        "--name",
                        &spec.name,
                        "--location",
                        &self.location,
                        "--sku",
                        "S1",
                        "--partition-count",
                        "2",
                    ])
                    .await?;
            }
            ResourceKind::ServiceRole => {
                self.cli
                    .run_ok(&[
                        "identity",
                        "create",
                        "--name",
                        &spec.name,
                        "--location",
                        &self.location,
                    ])
                    .await?;
            }
            ResourceKind::NotificationWorkflow => {
                let definition = spec
                    .config
                    .get("definition")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| {
                        json!({
                            "definition": {
                                "$schema": "https://schema.management.azure.com/providers/Microsoft.Logic/schemas/2016-06-01/workflowdefinition.json#",
                                "contentVersion": "1.0.0.0",
                                "triggers": {},
                                "actions": {},
                                "outputs": {}
                            }
                        })
                        .to_string()
                    });
                self.cli
                    .run_ok(&[
                        "logic",
                        "workflow",
                        "create",
                        "--name",
                        &spec.name,
                        "--location",
                        &self.location,
                        "--definition",
                        &definition,
                    ])
                    .await?;
            }
            ResourceKind::ApiGateway => {
                self.cli
                    .run_ok(&[
                        "apim",
                        "create",
                        "--name",
                        &spec.name,
                        "--location",
                        &self.location,
                        "--publisher-name",
                        "twinflow",
                        "--publisher-email",
                        "ops@twinflow.dev",
                        "--sku-name",
                        "Consumption",
                    ])
                    .await?;
            }
            ResourceKind::TwinModelStore => {
                self.cli
                    .run_ok(&[
                        "dt",
                        "create",
                        "--dt-name",
                        &spec.name,
                        "--location",
                        &self.location,
                    ])
                    .await?;
            }
            _ => unreachable!("function kinds handled above"),
        }

        let handle = ResourceHandle::created(&spec.name, spec.kind, ProviderId::Azure);
        Ok(self.augment_handle(handle).await?)
    }

    async fn destroy(&self, kind: ResourceKind, name: &str) -> twinflow_cloud::Result<()> {
        tracing::info!("Azure リソースを破棄: {name} ({kind})");
        let table = Self::table_name(name);
        let result = match kind {
            k if k.is_function() => {
                self.cli
                    .run_ok(&["functionapp", "delete", "--name", name])
                    .await
            }
            ResourceKind::HotTable => {
                self.cli
                    .run_ok(&[
                        "storage",
                        "table",
                        "delete",
                        "--name",
                        &table,
                        "--account-name",
                        &self.storage_account,
                        "--auth-mode",
                        "login",
                    ])
                    .await
            }
            ResourceKind::ColdBucket
            | ResourceKind::ArchiveBucket
            | ResourceKind::DashboardSite => {
                self.cli
                    .run_ok(&[
                        "storage",
                        "container",
                        "delete",
                        "--name",
                        name,
                        "--account-name",
                        &self.storage_account,
                        "--auth-mode",
                        "login",
                    ])
                    .await
            }
            ResourceKind::IngestStream => {
                // 名前空間ごと破棄（ハブごとに 1 名前空間の前提）
                let namespace = Self::namespace_name(name);
                self.cli
                    .run_ok(&["eventhubs", "namespace", "delete", "--name", &namespace])
                    .await
            }
            ResourceKind::DeviceGateway => {
                self.cli.run_ok(&["iot", "hub", "delete", "--name", name]).await
            }
            ResourceKind::ServiceRole => {
                self.cli.run_ok(&["identity", "delete", "--name", name]).await
            }
            ResourceKind::NotificationWorkflow => {
                self.cli
                    .run_ok(&["logic", "workflow", "delete", "--name", name, "--yes"])
                    .await
            }
            ResourceKind::ApiGateway => {
                self.cli
                    .run_ok(&["apim", "delete", "--name", name, "--yes"])
                    .await
            }
            ResourceKind::TwinModelStore => {
                self.cli
                    .run_ok(&["dt", "delete", "--dt-name", name, "--yes"])
                    .await
            }
            _ => unreachable!("function kinds handled above"),
        };

        match result {
            Ok(()) => Ok(()),
            Err(AzureError::NotFound(_)) => {
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
        tracing::info!("Azure 関数を再デプロイ: {name}");
        match spec.kind {
            ResourceKind::NotificationWorkflow => {
                let definition = spec
                    .config
                    .get("definition")
                    .and_then(|v| v.as_str())
                    .unwrap_or("{}");
                // create は同名ワークフローに対して更新として働く
                self.cli
                    .run_ok(&[
                        "logic",
                        "workflow",
                        "create",
                        "--name",
                        name,
                        "--location",
                        &self.location,
                        "--definition",
                        definition,
                    ])
                    .await?;
            }
            _ => {
                let package = Self::package(spec);
                self.cli
                    .run_ok(&[
                        "functionapp",
                        "deployment",
                        "source",
                        "config-zip",
                        "--name",
                        name,
                        "--src",
                        &package,
                    ])
                    .await?;
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
        let keys = self
            .cli
            .run_json(&[
                "functionapp",
                "function",
                "keys",
                "list",
                "--name",
                name,
                "--function-name",
                ENTRY_FUNCTION,
            ])
            .await
            .map_err(CloudError::from)?;
        let key = keys["default"].as_str().unwrap_or_default();
        let uri = format!("{}?code={key}", Self::function_url(name));
        let body = payload.to_string();
        let result = self
            .cli
            .run_json(&[
                "rest",
                "--method",
                "post",
                "--uri",
                &uri,
                "--skip-authorization-header",
                "--body",
                &body,
            ])
            .await
            .map_err(CloudError::from)?;
        match mode {
            InvocationMode::Async => Ok(json!({ "status": "accepted" })),
            InvocationMode::Sync => Ok(result),
        }
    }
}

impl AzureProvisioner {
    /// 種別に応じて参照属性（URL / マネージド ID）を付与する。
    /// 再実行時も同じ参照を解決できるよう、既存パスでも呼ぶ。
    async fn augment_handle(
        &self,
        mut handle: ResourceHandle,
    ) -> crate::error::Result<ResourceHandle> {
        match handle.kind {
            ResourceKind::RelayIngress => {
                let url = Self::function_url(&handle.name);
                handle = handle.with_attribute("url", json!(url));
            }
            ResourceKind::ServiceRole => {
                let output = self
                    .cli
                    .run_json(&["identity", "show", "--name", &handle.name])
                    .await?;
                if let Some(id) = output["id"].as_str() {
                    handle = handle.with_attribute("arn", json!(id));
                }
            }
            _ => {}
        }
        Ok(handle)
    }
}

/// Function App / IoT Hub の制約に合わせた決定論的サニタイズ
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

    fn provisioner() -> AzureProvisioner {
        AzureProvisioner::new("twinflow-rg", "twinflowsa", "japaneast", None)
    }

    #[test]
    fn test_resource_name_is_deterministic() {
        let ctx = NameContext::new("factory-twin", LayerId::HotStorage, "hot-table");
        assert_eq!(provisioner().resource_name(&ctx), "factory-twin-l3-hot-hot-table");
    }

    #[test]
    fn test_table_name_strips_hyphens() {
        assert_eq!(
            AzureProvisioner::table_name("factory-twin-l3-hot-hot-table"),
            "factorytwinl3hothottable"
        );
    }

    #[test]
    fn test_function_url_convention() {
        assert_eq!(
            AzureProvisioner::function_url("factory-twin-bridge"),
            "https://factory-twin-bridge.azurewebsites.net/api/handler"
        );
    }

    #[test]
    fn test_namespace_is_derived_from_stream_name() {
        assert_eq!(
            AzureProvisioner::namespace_name("factory-twin-l1-ingest-stream"),
            "factory-twin-l1-ingest-stream-ns"
        );
    }
}
