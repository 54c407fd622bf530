//! パイプライン境界エッジ
//!
//! エッジはパイプライングラフから導出される固定の順序対であり、
//! 設定としては保存しない。両端のプロバイダーが異なるエッジにのみ
//! ブリッジが存在する。

use crate::model::layer::LayerId;
use serde::{Deserialize, Serialize};

/// パイプラインの隣接レイヤー間エッジ
///
/// グラフ構造: L1 → L2 → L3hot → {L3cold → L3archive, L4, L5}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BoundaryEdge {
    IngestToCompute,
    ComputeToHot,
    HotToCold,
    ColdToArchive,
    HotToTwin,
    HotToDashboard,
}

impl BoundaryEdge {
    /// 全エッジ（パイプライン順）
    pub const EDGES: [BoundaryEdge; 6] = [
        BoundaryEdge::IngestToCompute,
        BoundaryEdge::ComputeToHot,
        BoundaryEdge::HotToCold,
        BoundaryEdge::ColdToArchive,
        BoundaryEdge::HotToTwin,
        BoundaryEdge::HotToDashboard,
    ];

    /// データ送信側レイヤー
    pub fn source(&self) -> LayerId {
        match self {
            BoundaryEdge::IngestToCompute => LayerId::Ingestion,
            BoundaryEdge::ComputeToHot => LayerId::Compute,
            BoundaryEdge::HotToCold => LayerId::HotStorage,
            BoundaryEdge::ColdToArchive => LayerId::ColdStorage,
            BoundaryEdge::HotToTwin => LayerId::HotStorage,
            BoundaryEdge::HotToDashboard => LayerId::HotStorage,
        }
    }

    /// データ受信側レイヤー
    pub fn target(&self) -> LayerId {
        match self {
            BoundaryEdge::IngestToCompute => LayerId::Compute,
            BoundaryEdge::ComputeToHot => LayerId::HotStorage,
            BoundaryEdge::HotToCold => LayerId::ColdStorage,
            BoundaryEdge::ColdToArchive => LayerId::ArchiveStorage,
            BoundaryEdge::HotToTwin => LayerId::TwinModel,
            BoundaryEdge::HotToDashboard => LayerId::Dashboard,
        }
    }

    /// conn_id やロール名に使う安定識別子
    pub fn id(&self) -> &'static str {
        match self {
            BoundaryEdge::IngestToCompute => "ingest-compute",
            BoundaryEdge::ComputeToHot => "compute-hot",
            BoundaryEdge::HotToCold => "hot-cold",
            BoundaryEdge::ColdToArchive => "cold-archive",
            BoundaryEdge::HotToTwin => "hot-twin",
            BoundaryEdge::HotToDashboard => "hot-dashboard",
        }
    }

    /// 指定レイヤーが端点に含まれるか
    pub fn touches(&self, layer: LayerId) -> bool {
        self.source() == layer || self.target() == layer
    }
}

impl std::fmt::Display for BoundaryEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edges_cover_pipeline_graph() {
        // 各レイヤーは L1 を除き必ずどこかのエッジの target
        for layer in LayerId::PIPELINE_ORDER {
            if layer == LayerId::Ingestion {
                continue;
            }
            assert!(
                BoundaryEdge::EDGES.iter().any(|e| e.target() == layer),
                "{layer} に入力エッジがない"
            );
        }
    }

    #[test]
    fn test_hot_storage_fans_out() {
        let fanout: Vec<_> = BoundaryEdge::EDGES
            .iter()
            .filter(|e| e.source() == LayerId::HotStorage)
            .map(|e| e.target())
            .collect();
        assert_eq!(
            fanout,
            vec![LayerId::ColdStorage, LayerId::TwinModel, LayerId::Dashboard]
        );
    }
}
