//! AWS provisioner implementation
//!
//! Maps pipeline resource kinds to Lambda / Kinesis / DynamoDB / S3 /
//! IoT / Step Functions / API Gateway / TwinMaker via the aws CLI.
//!
//! Idempotence contract: create checks existence first; for function
//! resources the deployed environment is compared against the requested
//! spec (the environment is where cross-resource references live), a
//! mismatch is drift. destroy treats NotFound as already-destroyed.

use crate::cli::AwsCli;
use crate::error::AwsError;
use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;
use twinflow_cloud::{
    AuthStatus, CloudError, InvocationMode, NameContext, Provisioner, ResourceHandle,
    ResourceSpec, default_resource_name,
};
use twinflow_core::{ProviderId, ResourceKind};

const MAX_NAME_LEN: usize = 64;

/// AWS provisioner
pub struct AwsProvisioner {
    cli: AwsCli,
}

impl AwsProvisioner {
    pub fn new(region: impl Into<String>, profile: Option<String>) -> Self {
        Self {
            cli: AwsCli::new(region, profile),
        }
    }

    /// IoT トピックルール名はハイフン不可
    fn rule_name(name: &str) -> String {
        name.replace('-', "_")
    }

    fn env_arg(environment: &BTreeMap<String, String>) -> String {
        let pairs: Vec<String> = environment
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        format!("Variables={{{}}}", pairs.join(","))
    }

    fn runtime(spec: &ResourceSpec) -> &str {
        spec.config
            .get("runtime")
            .and_then(|v| v.as_str())
            .unwrap_or("nodejs20.x")
    }

    fn handler(spec: &ResourceSpec) -> &str {
        spec.config
            .get("handler")
            .and_then(|v| v.as_str())
            .unwrap_or("index.handler")
    }

    fn package(spec: &ResourceSpec) -> String {
        spec.config
            .get("package")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("fileb://dist/{}.zip", spec.role))
    }

    fn role_arn(spec: &ResourceSpec) -> crate::error::Result<&str> {
        spec.environment
            .get("ROLE_ARN")
            .map(String::as_str)
            .ok_or_else(|| AwsError::NotFound(format!("{}: ROLE_ARN", spec.name)))
    }

    async fn describe(&self, kind: ResourceKind, name: &str) -> crate::error::Result<()> {
        match kind {
            k if is_lambda(k) => {
                self.cli
                    .run_ok(&["lambda", "get-function", "--function-name", name])
                    .await
            }
            ResourceKind::HotTable => {
                self.cli
                    .run_ok(&["dynamodb", "describe-table", "--table-name", name])
                    .await
            }
            ResourceKind::ColdBucket
            | ResourceKind::ArchiveBucket
            | ResourceKind::DashboardSite => {
                self.cli
                    .run_ok(&["s3api", "head-bucket", "--bucket", name])
                    .await
            }
            ResourceKind::IngestStream => {
                self.cli
                    .run_ok(&["kinesis", "describe-stream", "--stream-name", name])
                    .await
            }
            ResourceKind::DeviceGateway => {
                let rule = Self::rule_name(name);
                self.cli
                    .run_ok(&["iot", "get-topic-rule", "--rule-name", &rule])
                    .await
            }
            ResourceKind::ServiceRole => {
                self.cli
                    .run_ok(&["iam", "get-role", "--role-name", name])
                    .await
            }
            ResourceKind::NotificationWorkflow => match self.find_state_machine(name).await? {
                Some(_) => Ok(()),
                None => Err(AwsError::NotFound(name.to_string())),
            },
            ResourceKind::ApiGateway => match self.find_api(name).await? {
                Some(_) => Ok(()),
                None => Err(AwsError::NotFound(name.to_string())),
            },
            ResourceKind::TwinModelStore => {
                self.cli
                    .run_ok(&["iottwinmaker", "get-workspace", "--workspace-id", name])
                    .await
            }
            // is_lambda で網羅済み
            _ => Err(AwsError::NotFound(name.to_string())),
        }
    }

    async fn find_state_machine(&self, name: &str) -> crate::error::Result<Option<String>> {
        let output = self
            .cli
            .run_json(&["stepfunctions", "list-state-machines"])
            .await?;
        Ok(output["stateMachines"].as_array().and_then(|machines| {
            machines
                .iter()
                .find(|m| m["name"].as_str() == Some(name))
                .and_then(|m| m["stateMachineArn"].as_str())
                .map(String::from)
        }))
    }

    async fn find_api(&self, name: &str) -> crate::error::Result<Option<String>> {
        let output = self.cli.run_json(&["apigatewayv2", "get-apis"]).await?;
        Ok(output["Items"].as_array().and_then(|apis| {
            apis.iter()
                .find(|a| a["Name"].as_str() == Some(name))
                .and_then(|a| a["ApiId"].as_str())
                .map(String::from)
        }))
    }

    /// デプロイ済み関数の環境変数
    async fn deployed_environment(
        &self,
        name: &str,
    ) -> crate::error::Result<BTreeMap<String, String>> {
        let output = self
            .cli
            .run_json(&["lambda", "get-function-configuration", "--function-name", name])
            .await?;
        let mut env = BTreeMap::new();
        if let Some(vars) = output["Environment"]["Variables"].as_object() {
            for (key, value) in vars {
                if let Some(value) = value.as_str() {
                    env.insert(key.clone(), value.to_string());
                }
            }
        }
        Ok(env)
    }

    async fn create_function(&self, spec: &ResourceSpec) -> crate::error::Result<()> {
        let package = Self::package(spec);
        let env = Self::env_arg(&spec.environment);
        let role = Self::role_arn(spec)?;
        self.cli
            .run_ok(&[
                "lambda",
                "create-function",
                "--function-name",
                &spec.name,
                "--runtime",
                Self::runtime(spec),
                "--handler",
                Self::handler(spec),
                "--role",
                role,
                "--zip-file",
                &package,
                "--environment",
                &env,
            ])
            .await
    }

    async fn function_url(&self, name: &str) -> crate::error::Result<Option<String>> {
        match self
            .cli
            .run_json(&["lambda", "get-function-url-config", "--function-name", name])
            .await
        {
            Ok(output) => Ok(output["FunctionUrl"].as_str().map(String::from)),
            Err(AwsError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn is_lambda(kind: ResourceKind) -> bool {
    kind.is_function()
}

#[async_trait]
impl Provisioner for AwsProvisioner {
    fn provider_id(&self) -> ProviderId {
        ProviderId::Aws
    }

    fn display_name(&self) -> &str {
        "AWS"
    }

    async fn check_auth(&self) -> twinflow_cloud::Result<AuthStatus> {
        match self.cli.check_auth().await {
            Ok(identity) => Ok(AuthStatus::ok(format!(
                "{} (account {})",
                identity.arn, identity.account
            ))),
            Err(AwsError::CliNotFound) => {
                Ok(AuthStatus::failed("aws CLI がインストールされていません"))
            }
            Err(e) => Ok(AuthStatus::failed(e.to_string())),
        }
    }

    async fn exists(&self, kind: ResourceKind, name: &str) -> twinflow_cloud::Result<bool> {
        match self.describe(kind, name).await {
            Ok(()) => Ok(true),
            Err(AwsError::NotFound(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn create(&self, spec: &ResourceSpec) -> twinflow_cloud::Result<ResourceHandle> {
        if self.exists(spec.kind, &spec.name).await? {
            // 関数は環境（相互参照の埋込先）を比較してドリフトを検出
            if is_lambda(spec.kind) {
                let deployed = self.deployed_environment(&spec.name).await?;
                if deployed != spec.environment {
                    return Err(CloudError::drift(
                        &spec.name,
                        "デプロイ済み関数の環境変数が要求と一致しません",
                    ));
                }
            }
            tracing::info!("{} は既に存在します (no-op)", spec.name);
            let mut handle =
                ResourceHandle::existing(&spec.name, spec.kind, ProviderId::Aws);
            if spec.kind == ResourceKind::RelayIngress {
                if let Some(url) = self.function_url(&spec.name).await? {
                    handle = handle.with_attribute("url", json!(url));
                }
            }
            return Ok(self.augment_handle(handle).await?);
        }

        tracing::info!("AWS リソースを作成: {} ({})", spec.name, spec.kind);
        match spec.kind {
            k if is_lambda(k) => {
                self.create_function(spec).await?;
            }
            ResourceKind::HotTable => {
                let key = spec
                    .config
                    .get("partition-key")
                    .and_then(|v| v.as_str())
                    .unwrap_or("deviceId");
                let attr = format!("AttributeName={key},AttributeType=S");
                let schema = format!("AttributeName={key},KeyType=HASH");
                self.cli
                    .run_ok(&[
                        "dynamodb",
                        "create-table",
                        "--table-name",
                        &spec.name,
                        "--attribute-definitions",
                        &attr,
                        "--key-schema",
                        &schema,
                        "--billing-mode",
                        "PAY_PER_REQUEST",
                    ])
                    .await?;
            }
            ResourceKind::ColdBucket
            | ResourceKind::ArchiveBucket
            | ResourceKind::DashboardSite => {
                self.cli
                    .run_ok(&["s3api", "create-bucket", "--bucket", &spec.name])
                    .await?;
            }
            ResourceKind::IngestStream => {
                self.cli
                    .run_ok(&[
                        "kinesis",
                        "create-stream",
                        "--stream-name",
                        &spec.name,
                        "--shard-count",
                        "1",
                    ])
                    .await?;
            }
            ResourceKind::DeviceGateway => {
                let rule = Self::rule_name(&spec.name);
                let stream = spec
                    .environment
                    .get("STREAM_NAME")
                    .map(String::as_str)
                    .unwrap_or(&spec.name);
                let role = Self::role_arn(spec).unwrap_or_default();
                let payload = json!({
                    "sql": "SELECT * FROM 'devices/+/telemetry'",
                    "actions": [{ "kinesis": { "streamName": stream, "roleArn": role } }]
                })
                .to_string();
                self.cli
                    .run_ok(&[
                        "iot",
                        "create-topic-rule",
                        "--rule-name",
                        &rule,
                        "--topic-rule-payload",
                        &payload,
                    ])
                    .await?;
            }
            ResourceKind::ServiceRole => {
                let trust = json!({
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Allow",
                        "Principal": { "Service": "lambda.amazonaws.com" },
                        "Action": "sts:AssumeRole"
                    }]
                })
                .to_string();
                self.cli
                    .run_ok(&[
                        "iam",
                        "create-role",
                        "--role-name",
                        &spec.name,
                        "--assume-role-policy-document",
                        &trust,
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
                            "StartAt": "Notify",
                            "States": { "Notify": { "Type": "Pass", "End": true } }
                        })
                        .to_string()
                    });
                let role = Self::role_arn(spec)?;
                self.cli
                    .run_ok(&[
                        "stepfunctions",
                        "create-state-machine",
                        "--name",
                        &spec.name,
                        "--definition",
                        &definition,
                        "--role-arn",
                        role,
                    ])
                    .await?;
            }
            ResourceKind::ApiGateway => {
                self.cli
                    .run_ok(&[
                        "apigatewayv2",
                        "create-api",
                        "--name",
                        &spec.name,
                        "--protocol-type",
                        "HTTP",
                    ])
                    .await?;
            }
            ResourceKind::TwinModelStore => {
                self.cli
                    .run_ok(&[
                        "iottwinmaker",
                        "create-workspace",
                        "--workspace-id",
                        &spec.name,
                    ])
                    .await?;
            }
            // is_lambda で網羅済み
            _ => unreachable!("function kinds handled above"),
        }

        // ブリッジ受信側は公開 URL を払い出す
        if spec.kind == ResourceKind::RelayIngress {
            self.cli
                .run_ok(&[
                    "lambda",
                    "create-function-url-config",
                    "--function-name",
                    &spec.name,
                    "--auth-type",
                    "NONE",
                ])
                .await?;
        }

        let handle = ResourceHandle::created(&spec.name, spec.kind, ProviderId::Aws);
        Ok(self.augment_handle(handle).await?)
    }

    async fn destroy(&self, kind: ResourceKind, name: &str) -> twinflow_cloud::Result<()> {
        tracing::info!("AWS リソースを破棄: {name} ({kind})");
        let result = match kind {
            k if is_lambda(k) => {
                if k == ResourceKind::RelayIngress {
                    match self
                        .cli
                        .run_ok(&[
                            "lambda",
                            "delete-function-url-config",
                            "--function-name",
                            name,
                        ])
                        .await
                    {
                        Ok(()) | Err(AwsError::NotFound(_)) => {}
                        Err(e) => return Err(e.into()),
                    }
                }
                self.cli
                    .run_ok(&["lambda", "delete-function", "--function-name", name])
                    .await
            }
            ResourceKind::HotTable => {
                self.cli
                    .run_ok(&["dynamodb", "delete-table", "--table-name", name])
                    .await
            }
            ResourceKind::ColdBucket
            | ResourceKind::ArchiveBucket
            | ResourceKind::DashboardSite => {
                let uri = format!("s3://{name}");
                self.cli.run_ok(&["s3", "rb", &uri, "--force"]).await
            }
            ResourceKind::IngestStream => {
                self.cli
                    .run_ok(&["kinesis", "delete-stream", "--stream-name", name])
                    .await
            }
            ResourceKind::DeviceGateway => {
                let rule = Self::rule_name(name);
                self.cli
                    .run_ok(&["iot", "delete-topic-rule", "--rule-name", &rule])
                    .await
            }
            ResourceKind::ServiceRole => {
                self.cli
                    .run_ok(&["iam", "delete-role", "--role-name", name])
                    .await
            }
            ResourceKind::NotificationWorkflow => match self.find_state_machine(name).await {
                Ok(Some(arn)) => {
                    self.cli
                        .run_ok(&["stepfunctions", "delete-state-machine", "--state-machine-arn", &arn])
                        .await
                }
                Ok(None) => Err(AwsError::NotFound(name.to_string())),
                Err(e) => Err(e),
            },
            ResourceKind::ApiGateway => match self.find_api(name).await {
                Ok(Some(api_id)) => {
                    self.cli
                        .run_ok(&["apigatewayv2", "delete-api", "--api-id", &api_id])
                        .await
                }
                Ok(None) => Err(AwsError::NotFound(name.to_string())),
                Err(e) => Err(e),
            },
            ResourceKind::TwinModelStore => {
                self.cli
                    .run_ok(&["iottwinmaker", "delete-workspace", "--workspace-id", name])
                    .await
            }
            // is_lambda で網羅済み
            _ => unreachable!("function kinds handled above"),
        };

        match result {
            Ok(()) => Ok(()),
            // 存在しなければ破棄済みとみなす
            Err(AwsError::NotFound(_)) => {
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
        tracing::info!("AWS 関数を再デプロイ: {name}");
        match spec.kind {
            ResourceKind::NotificationWorkflow => {
                let arn = self
                    .find_state_machine(name)
                    .await?
                    .ok_or_else(|| AwsError::NotFound(name.to_string()))?;
                let definition = spec
                    .config
                    .get("definition")
                    .and_then(|v| v.as_str())
                    .unwrap_or("{}");
                self.cli
                    .run_ok(&[
                        "stepfunctions",
                        "update-state-machine",
                        "--state-machine-arn",
                        &arn,
                        "--definition",
                        definition,
                    ])
                    .await?;
            }
            _ => {
                let package = Self::package(spec);
                self.cli
                    .run_ok(&[
                        "lambda",
                        "update-function-code",
                        "--function-name",
                        name,
                        "--zip-file",
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
        let payload = payload.to_string();
        match mode {
            InvocationMode::Async => {
                self.cli
                    .run_ok(&[
                        "lambda",
                        "invoke",
                        "--function-name",
                        name,
                        "--invocation-type",
                        "Event",
                        "--cli-binary-format",
                        "raw-in-base64-out",
                        "--payload",
                        &payload,
                        "/dev/null",
                    ])
                    .await?;
                Ok(json!({ "status": "accepted" }))
            }
            InvocationMode::Sync => {
                // 同時呼び出しで衝突しないよう出力先は一意な一時ファイル
                let outfile = tempfile::Builder::new()
                    .prefix("twinflow-invoke-")
                    .suffix(".json")
                    .tempfile()
                    .map_err(AwsError::Io)?;
                let outfile_str = outfile.path().to_string_lossy().to_string();
                self.cli
                    .run_ok(&[
                        "lambda",
                        "invoke",
                        "--function-name",
                        name,
                        "--cli-binary-format",
                        "raw-in-base64-out",
                        "--payload",
                        &payload,
                        &outfile_str,
                    ])
                    .await?;
                let content =
                    std::fs::read_to_string(outfile.path()).map_err(AwsError::Io)?;
                Ok(serde_json::from_str(&content).map_err(AwsError::Json)?)
            }
        }
    }
}

impl AwsProvisioner {
    /// 種別に応じて参照属性（ARN / URL / endpoint）を付与する
    async fn augment_handle(
        &self,
        mut handle: ResourceHandle,
    ) -> crate::error::Result<ResourceHandle> {
        match handle.kind {
            ResourceKind::ServiceRole => {
                let output = self
                    .cli
                    .run_json(&["iam", "get-role", "--role-name", &handle.name])
                    .await?;
                if let Some(arn) = output["Role"]["Arn"].as_str() {
                    handle = handle.with_attribute("arn", json!(arn));
                }
            }
            ResourceKind::NotificationWorkflow => {
                if let Some(arn) = self.find_state_machine(&handle.name).await? {
                    handle = handle.with_attribute("arn", json!(arn));
                }
            }
            ResourceKind::RelayIngress => {
                if handle.attribute_str("url").is_none() {
                    if let Some(url) = self.function_url(&handle.name).await? {
                        handle = handle.with_attribute("url", json!(url));
                    }
                }
            }
            ResourceKind::ApiGateway => {
                let output = self.cli.run_json(&["apigatewayv2", "get-apis"]).await?;
                if let Some(api) = output["Items"]
                    .as_array()
                    .and_then(|apis| apis.iter().find(|a| a["Name"].as_str() == Some(handle.name.as_str())))
                {
                    if let Some(endpoint) = api["ApiEndpoint"].as_str() {
                        handle = handle.with_attribute("endpoint", json!(endpoint));
                    }
                }
            }
            _ => {}
        }
        Ok(handle)
    }
}

/// Lambda / IAM の制約に合わせた決定論的サニタイズ
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

    #[test]
    fn test_resource_name_is_deterministic_and_sanitized() {
        let provisioner = AwsProvisioner::new("ap-northeast-1", None);
        let ctx = NameContext::new("Factory Twin", LayerId::Compute, "persist-fn");
        let first = provisioner.resource_name(&ctx);
        let second = provisioner.resource_name(&ctx);
        assert_eq!(first, second);
        assert_eq!(first, "factory-twin-l2-persist-fn");
    }

    #[test]
    fn test_long_names_are_truncated() {
        let provisioner = AwsProvisioner::new("ap-northeast-1", None);
        let ctx = NameContext::new(
            "a-very-long-project-name-that-goes-on-and-on-and-on-and-on",
            LayerId::ArchiveStorage,
            "archive-bucket",
        );
        assert!(provisioner.resource_name(&ctx).len() <= MAX_NAME_LEN);
    }

    #[test]
    fn test_iot_rule_name_has_no_hyphens() {
        assert_eq!(
            AwsProvisioner::rule_name("factory-twin-l1-device-gateway"),
            "factory_twin_l1_device_gateway"
        );
    }

    #[test]
    fn test_env_arg_formatting() {
        let mut env = BTreeMap::new();
        env.insert("A".to_string(), "1".to_string());
        env.insert("B".to_string(), "2".to_string());
        assert_eq!(AwsProvisioner::env_arg(&env), "Variables={A=1,B=2}");
    }
}
