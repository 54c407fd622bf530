//! クラウドプロバイダー識別子と能力テーブル
//!
//! プロバイダー分岐は文字列比較ではなくこの enum を一度だけ解決し、
//! 以降はアダプター実装へのディスパッチで扱う。

use crate::error::CoreError;
use crate::model::resource::ResourceKind;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 対応クラウドプロバイダー
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderId {
    Aws,
    Azure,
    Gcp,
}

impl ProviderId {
    pub const ALL: [ProviderId; 3] = [ProviderId::Aws, ProviderId::Azure, ProviderId::Gcp];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Aws => "aws",
            ProviderId::Azure => "azure",
            ProviderId::Gcp => "gcp",
        }
    }

    /// マネージドリソース種別への対応可否
    ///
    /// GCP は IoT Core 廃止後にマネージドなデバイスゲートウェイと
    /// デバイスフィードバックチャネルを持たないため、L1 取込と
    /// フィードバックはホストできない。リゾルバはこのテーブルで
    /// 割当を事前検証し、実行前に ConfigurationError として弾く。
    pub fn supports(&self, kind: ResourceKind) -> bool {
        match self {
            ProviderId::Aws | ProviderId::Azure => true,
            ProviderId::Gcp => !matches!(
                kind,
                ResourceKind::DeviceGateway | ResourceKind::FeedbackFunction
            ),
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "aws" => Ok(ProviderId::Aws),
            "azure" => Ok(ProviderId::Azure),
            "gcp" => Ok(ProviderId::Gcp),
            other => Err(CoreError::UnknownProvider(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gcp_capability_gaps() {
        assert!(!ProviderId::Gcp.supports(ResourceKind::DeviceGateway));
        assert!(!ProviderId::Gcp.supports(ResourceKind::FeedbackFunction));
        assert!(ProviderId::Gcp.supports(ResourceKind::HotTable));
        assert!(ProviderId::Aws.supports(ResourceKind::DeviceGateway));
        assert!(ProviderId::Azure.supports(ResourceKind::FeedbackFunction));
    }
}
