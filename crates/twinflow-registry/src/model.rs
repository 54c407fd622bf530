//! 接続エントリモデル

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use twinflow_core::{BoundaryEdge, ProviderId};

/// conn_id を導出する
///
/// (エッジ, 送信側, 受信側) の決定論的関数。同一入力での再 resolve は
/// 常に同じ id になり、既存エントリの再利用が成立する。
pub fn conn_id(edge: BoundaryEdge, source: ProviderId, target: ProviderId) -> String {
    format!("{}--{}-to-{}", edge.id(), source, target)
}

/// 永続化されるクラウド間接続エントリ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionEntry {
    pub conn_id: String,

    /// 対象の境界エッジ
    pub edge: BoundaryEdge,

    pub source_provider: ProviderId,
    pub target_provider: ProviderId,

    /// 受信側 HTTP エンドポイントの公開 URL
    pub url: String,

    /// ベアラートークン。デプロイの副作用では回転しない
    pub token: String,

    pub created_at: DateTime<Utc>,
}

impl ConnectionEntry {
    pub fn new(
        edge: BoundaryEdge,
        source_provider: ProviderId,
        target_provider: ProviderId,
        url: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            conn_id: conn_id(edge, source_provider, target_provider),
            edge,
            source_provider,
            target_provider,
            url: url.into(),
            token: token.into(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conn_id_is_deterministic() {
        let a = conn_id(BoundaryEdge::HotToTwin, ProviderId::Aws, ProviderId::Azure);
        let b = conn_id(BoundaryEdge::HotToTwin, ProviderId::Aws, ProviderId::Azure);
        assert_eq!(a, b);
        assert_eq!(a, "hot-twin--aws-to-azure");
    }

    #[test]
    fn test_conn_id_distinguishes_direction_and_edge() {
        let ab = conn_id(BoundaryEdge::HotToTwin, ProviderId::Aws, ProviderId::Azure);
        let ba = conn_id(BoundaryEdge::HotToTwin, ProviderId::Azure, ProviderId::Aws);
        let other = conn_id(BoundaryEdge::HotToDashboard, ProviderId::Aws, ProviderId::Azure);
        assert_ne!(ab, ba);
        assert_ne!(ab, other);
    }
}
