//! twin.kdl のパース
//!
//! ```kdl
//! project "factory-twin"
//!
//! providers {
//!     ingestion "aws"
//!     compute "aws"
//!     hot-storage "aws"
//!     cold-storage "aws"
//!     archive-storage "aws"
//!     twin-model "azure"     // 省略時は hot-storage から継承
//!     dashboard "azure"
//! }
//!
//! options {
//!     event-checking #true
//!     notification-workflow #false
//!     device-feedback #false
//! }
//!
//! aws {
//!     region "ap-northeast-1"
//!     profile "factory"
//! }
//!
//! azure {
//!     resource-group "factory-twin-rg"
//!     storage-account "factorytwinsa"
//!     location "japaneast"
//! }
//!
//! gcp {
//!     project "factory-twin-prj"
//!     region "asia-northeast1"
//! }
//! ```
//!
//! アカウントノードは省略可能で、既定値はプロジェクト名から導出する。

use crate::error::{ConfigError, Result};
use kdl::{KdlDocument, KdlNode};
use twinflow_core::{LayerId, OptimizationFlags, ProviderAssignment, ProviderId};

/// パース済みプロジェクト設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectConfig {
    /// リソース命名の接頭辞になるプロジェクト名
    pub name: String,

    pub assignment: ProviderAssignment,
    pub flags: OptimizationFlags,

    pub aws: AwsSettings,
    pub azure: AzureSettings,
    pub gcp: GcpSettings,
}

/// AWS アカウント設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsSettings {
    pub region: String,
    pub profile: Option<String>,
}

impl Default for AwsSettings {
    fn default() -> Self {
        Self {
            region: "ap-northeast-1".to_string(),
            profile: None,
        }
    }
}

/// Azure アカウント設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzureSettings {
    pub resource_group: String,
    pub storage_account: String,
    pub location: String,
    pub subscription: Option<String>,
}

impl AzureSettings {
    /// プロジェクト名から導出する既定値
    fn defaults_for(project: &str) -> Self {
        // ストレージアカウント名は英数字 24 文字まで
        let mut account: String = project
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        account.truncate(22);
        account.push_str("sa");
        Self {
            resource_group: format!("{project}-rg"),
            storage_account: account,
            location: "japaneast".to_string(),
            subscription: None,
        }
    }
}

/// Google Cloud アカウント設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcpSettings {
    pub project: String,
    pub region: String,
}

impl GcpSettings {
    fn defaults_for(project: &str) -> Self {
        Self {
            project: project.to_string(),
            region: "asia-northeast1".to_string(),
        }
    }
}

/// KDL ドキュメントをパースする
pub fn parse_project(content: &str) -> Result<ProjectConfig> {
    let doc: KdlDocument = content.parse()?;

    let mut name: Option<String> = None;
    let mut assignment = ProviderAssignment::new();
    let mut flags = OptimizationFlags::default();
    let mut aws_node: Option<&KdlNode> = None;
    let mut azure_node: Option<&KdlNode> = None;
    let mut gcp_node: Option<&KdlNode> = None;

    for node in doc.nodes() {
        match node.name().value() {
            "project" => {
                name = node
                    .entries()
                    .first()
                    .and_then(|e| e.value().as_string())
                    .map(|s| s.to_string());
            }
            "providers" => parse_providers(node, &mut assignment)?,
            "options" => parse_options(node, &mut flags)?,
            "aws" => aws_node = Some(node),
            "azure" => azure_node = Some(node),
            "gcp" => gcp_node = Some(node),
            other => {
                tracing::debug!("未知のノードを無視: {other}");
            }
        }
    }

    let name = name.ok_or_else(|| {
        ConfigError::InvalidConfig("project ノードにプロジェクト名が必要です".to_string())
    })?;

    let mut aws = AwsSettings::default();
    if let Some(node) = aws_node {
        if let Some(region) = child_string(node, "region") {
            aws.region = region;
        }
        aws.profile = child_string(node, "profile");
    }

    let mut azure = AzureSettings::defaults_for(&name);
    if let Some(node) = azure_node {
        if let Some(group) = child_string(node, "resource-group") {
            azure.resource_group = group;
        }
        if let Some(account) = child_string(node, "storage-account") {
            azure.storage_account = account;
        }
        if let Some(location) = child_string(node, "location") {
            azure.location = location;
        }
        azure.subscription = child_string(node, "subscription");
    }

    let mut gcp = GcpSettings::defaults_for(&name);
    if let Some(node) = gcp_node {
        if let Some(project) = child_string(node, "project") {
            gcp.project = project;
        }
        if let Some(region) = child_string(node, "region") {
            gcp.region = region;
        }
    }

    Ok(ProjectConfig {
        name,
        assignment,
        flags,
        aws,
        azure,
        gcp,
    })
}

/// 子ノードの最初の文字列値
fn child_string(node: &KdlNode, key: &str) -> Option<String> {
    node.children()?
        .nodes()
        .iter()
        .find(|child| child.name().value() == key)?
        .entries()
        .first()
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

/// providers ノードをパース
fn parse_providers(node: &KdlNode, assignment: &mut ProviderAssignment) -> Result<()> {
    let Some(children) = node.children() else {
        return Ok(());
    };
    for child in children.nodes() {
        let layer: LayerId = child.name().value().parse()?;
        let provider: ProviderId = child
            .entries()
            .first()
            .and_then(|e| e.value().as_string())
            .ok_or_else(|| {
                ConfigError::InvalidConfig(format!(
                    "providers.{} にプロバイダー名が必要です",
                    child.name().value()
                ))
            })?
            .parse()?;
        assignment.set(layer, provider);
    }
    Ok(())
}

/// options ノードをパース
fn parse_options(node: &KdlNode, flags: &mut OptimizationFlags) -> Result<()> {
    let Some(children) = node.children() else {
        return Ok(());
    };
    for child in children.nodes() {
        let value = child
            .entries()
            .first()
            .and_then(|e| e.value().as_bool())
            .ok_or_else(|| {
                ConfigError::InvalidConfig(format!(
                    "options.{} には #true / #false が必要です",
                    child.name().value()
                ))
            })?;
        match child.name().value() {
            "event-checking" => flags.event_checking = value,
            "notification-workflow" => flags.notification_workflow = value,
            "device-feedback" => flags.device_feedback = value,
            other => {
                return Err(ConfigError::InvalidConfig(format!(
                    "不明なオプション: {other}"
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
project "factory-twin"

providers {
    ingestion "aws"
    compute "aws"
    hot-storage "aws"
    cold-storage "aws"
    archive-storage "aws"
    twin-model "azure"
    dashboard "azure"
}

options {
    event-checking #true
    notification-workflow #true
    device-feedback #false
}
"#;

    #[test]
    fn test_parse_full_document() {
        let config = parse_project(FULL).unwrap();
        assert_eq!(config.name, "factory-twin");
        assert_eq!(
            config.assignment.get(LayerId::TwinModel),
            Some(ProviderId::Azure)
        );
        assert!(config.flags.event_checking);
        assert!(config.flags.notification_workflow);
        assert!(!config.flags.device_feedback);
        assert!(config.assignment.validate().is_ok());
    }

    #[test]
    fn test_l4_l5_may_be_omitted() {
        let config = parse_project(
            r#"
project "p"
providers {
    ingestion "aws"
    compute "aws"
    hot-storage "azure"
    cold-storage "aws"
    archive-storage "aws"
}
"#,
        )
        .unwrap();
        // 継承は assignment.resolve 側の責務
        assert_eq!(config.assignment.get(LayerId::TwinModel), None);
        assert_eq!(
            config.assignment.resolve(LayerId::TwinModel).unwrap(),
            ProviderId::Azure
        );
    }

    #[test]
    fn test_account_settings_with_derived_defaults() {
        let config = parse_project(
            r#"
project "factory-twin"
providers {
    ingestion "aws"
    compute "aws"
    hot-storage "azure"
    cold-storage "aws"
    archive-storage "aws"
}
aws {
    region "us-east-1"
    profile "factory"
}
"#,
        )
        .unwrap();
        assert_eq!(config.aws.region, "us-east-1");
        assert_eq!(config.aws.profile.as_deref(), Some("factory"));
        // azure ノード省略時はプロジェクト名から導出
        assert_eq!(config.azure.resource_group, "factory-twin-rg");
        assert_eq!(config.azure.storage_account, "factorytwinsa");
        assert!(config.azure.storage_account.len() <= 24);
        assert_eq!(config.gcp.project, "factory-twin");
    }

    #[test]
    fn test_missing_project_name_is_invalid() {
        let result = parse_project(r#"providers { ingestion "aws" }"#);
        assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let result = parse_project(
            r#"
project "p"
providers { ingestion "digitalocean" }
"#,
        );
        assert!(matches!(result, Err(ConfigError::Core(_))));
    }

    #[test]
    fn test_unknown_option_is_rejected() {
        let result = parse_project(
            r#"
project "p"
options { turbo-mode #true }
"#,
        );
        assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn test_option_requires_boolean() {
        let result = parse_project(
            r#"
project "p"
options { event-checking "yes" }
"#,
        );
        assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn test_default_flags_are_all_off() {
        let config = parse_project(r#"project "p""#).unwrap();
        assert_eq!(config.flags, OptimizationFlags::default());
    }
}
