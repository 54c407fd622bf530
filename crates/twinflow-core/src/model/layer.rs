//! パイプラインレイヤーの定義
//!
//! デジタルツインパイプラインは L1〜L5 の5層構成。
//! ストレージ層（L3）は hot / cold / archive の3ティアに分かれます。

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// パイプラインレイヤー識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayerId {
    /// L1: デバイスデータ取込
    Ingestion,
    /// L2: ストリーム計算・永続化
    Compute,
    /// L3 hot: 低レイテンシ参照ストレージ
    HotStorage,
    /// L3 cold: 低頻度アクセスストレージ
    ColdStorage,
    /// L3 archive: 長期アーカイブ
    ArchiveStorage,
    /// L4: ツインモデル
    TwinModel,
    /// L5: ダッシュボード
    Dashboard,
}

impl LayerId {
    /// 作成時のパイプライン順（上流 → 下流）
    pub const PIPELINE_ORDER: [LayerId; 7] = [
        LayerId::Ingestion,
        LayerId::Compute,
        LayerId::HotStorage,
        LayerId::ColdStorage,
        LayerId::ArchiveStorage,
        LayerId::TwinModel,
        LayerId::Dashboard,
    ];

    /// 破棄時の正準順。ストレージティアは必ず archive → cold → hot
    pub const DESTROY_ORDER: [LayerId; 7] = [
        LayerId::Dashboard,
        LayerId::TwinModel,
        LayerId::ArchiveStorage,
        LayerId::ColdStorage,
        LayerId::HotStorage,
        LayerId::Compute,
        LayerId::Ingestion,
    ];

    /// リソース命名に使うスラグ
    pub fn slug(&self) -> &'static str {
        match self {
            LayerId::Ingestion => "ingestion",
            LayerId::Compute => "compute",
            LayerId::HotStorage => "hot-storage",
            LayerId::ColdStorage => "cold-storage",
            LayerId::ArchiveStorage => "archive-storage",
            LayerId::TwinModel => "twin-model",
            LayerId::Dashboard => "dashboard",
        }
    }

    /// CLI で使う短縮コード（l1, l2, l3-hot, ...）
    pub fn short(&self) -> &'static str {
        match self {
            LayerId::Ingestion => "l1",
            LayerId::Compute => "l2",
            LayerId::HotStorage => "l3-hot",
            LayerId::ColdStorage => "l3-cold",
            LayerId::ArchiveStorage => "l3-archive",
            LayerId::TwinModel => "l4",
            LayerId::Dashboard => "l5",
        }
    }

    /// ストレージティア（L3）かどうか
    pub fn is_storage_tier(&self) -> bool {
        matches!(
            self,
            LayerId::HotStorage | LayerId::ColdStorage | LayerId::ArchiveStorage
        )
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.slug())
    }
}

impl FromStr for LayerId {
    type Err = CoreError;

    /// スラグと短縮コードの両方を受け付ける
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ingestion" | "l1" => Ok(LayerId::Ingestion),
            "compute" | "l2" => Ok(LayerId::Compute),
            "hot-storage" | "l3-hot" | "l3" => Ok(LayerId::HotStorage),
            "cold-storage" | "l3-cold" => Ok(LayerId::ColdStorage),
            "archive-storage" | "l3-archive" => Ok(LayerId::ArchiveStorage),
            "twin-model" | "l4" => Ok(LayerId::TwinModel),
            "dashboard" | "l5" => Ok(LayerId::Dashboard),
            other => Err(CoreError::UnknownLayer(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destroy_order_reverses_storage_tiers() {
        let archive = LayerId::DESTROY_ORDER
            .iter()
            .position(|l| *l == LayerId::ArchiveStorage)
            .unwrap();
        let cold = LayerId::DESTROY_ORDER
            .iter()
            .position(|l| *l == LayerId::ColdStorage)
            .unwrap();
        let hot = LayerId::DESTROY_ORDER
            .iter()
            .position(|l| *l == LayerId::HotStorage)
            .unwrap();
        assert!(archive < cold);
        assert!(cold < hot);
    }

    #[test]
    fn test_from_str_accepts_short_codes() {
        assert_eq!("l1".parse::<LayerId>().unwrap(), LayerId::Ingestion);
        assert_eq!("l3-hot".parse::<LayerId>().unwrap(), LayerId::HotStorage);
        assert_eq!("twin-model".parse::<LayerId>().unwrap(), LayerId::TwinModel);
        assert!("l9".parse::<LayerId>().is_err());
    }
}
