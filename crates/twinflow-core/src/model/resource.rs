//! リソース種別の定義

use serde::{Deserialize, Serialize};

/// パイプラインを構成するクラウドリソースの種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    /// デバイスゲートウェイ（MQTT/HTTP 受け口 + ルーティングルール）
    DeviceGateway,
    /// 取込ストリーム
    IngestStream,
    /// 関数に付与する実行ロール
    ServiceRole,
    /// ストリーム → hot ストレージ永続化関数
    PersistFunction,
    /// イベント条件チェック関数
    EventCheckFunction,
    /// 通知ワークフロー（ステートマシン）
    NotificationWorkflow,
    /// デバイスフィードバック関数
    FeedbackFunction,
    /// hot ストレージテーブル
    HotTable,
    /// hot ストレージ参照関数
    HotReaderFunction,
    /// cold ストレージバケット
    ColdBucket,
    /// アーカイブバケット
    ArchiveBucket,
    /// hot データ公開用 API ゲートウェイ
    ApiGateway,
    /// ツインモデルストア
    TwinModelStore,
    /// ツインモデル更新関数
    TwinUpdateFunction,
    /// ダッシュボードサイト
    DashboardSite,
    /// ブリッジ受信側（HTTP トリガー関数）
    RelayIngress,
    /// ブリッジ送信側（リレー関数）
    RelayEgress,
}

impl ResourceKind {
    /// 関数としてデプロイされる種別か（invoke / redeploy の対象）
    pub fn is_function(&self) -> bool {
        matches!(
            self,
            ResourceKind::PersistFunction
                | ResourceKind::EventCheckFunction
                | ResourceKind::FeedbackFunction
                | ResourceKind::HotReaderFunction
                | ResourceKind::TwinUpdateFunction
                | ResourceKind::RelayIngress
                | ResourceKind::RelayEgress
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::DeviceGateway => "device-gateway",
            ResourceKind::IngestStream => "ingest-stream",
            ResourceKind::ServiceRole => "service-role",
            ResourceKind::PersistFunction => "persist-function",
            ResourceKind::EventCheckFunction => "event-check-function",
            ResourceKind::NotificationWorkflow => "notification-workflow",
            ResourceKind::FeedbackFunction => "feedback-function",
            ResourceKind::HotTable => "hot-table",
            ResourceKind::HotReaderFunction => "hot-reader-function",
            ResourceKind::ColdBucket => "cold-bucket",
            ResourceKind::ArchiveBucket => "archive-bucket",
            ResourceKind::ApiGateway => "api-gateway",
            ResourceKind::TwinModelStore => "twin-model-store",
            ResourceKind::TwinUpdateFunction => "twin-update-function",
            ResourceKind::DashboardSite => "dashboard-site",
            ResourceKind::RelayIngress => "relay-ingress",
            ResourceKind::RelayEgress => "relay-egress",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// プラン内でリソースを参照するためのロール名
///
/// ロール名はプロジェクト内で一意。決定論的命名関数の入力にもなる。
pub mod role {
    pub const DEVICE_GATEWAY: &str = "device-gateway";
    pub const INGEST_STREAM: &str = "ingest-stream";
    pub const COMPUTE_ROLE: &str = "compute-role";
    pub const PERSIST_FN: &str = "persist-fn";
    pub const WORKFLOW_ROLE: &str = "workflow-role";
    pub const NOTIFICATION_WORKFLOW: &str = "notification-workflow";
    pub const FEEDBACK_ROLE: &str = "feedback-role";
    pub const FEEDBACK_FN: &str = "feedback-fn";
    pub const EVENT_CHECK_FN: &str = "event-check-fn";
    pub const HOT_TABLE: &str = "hot-table";
    pub const HOT_READER_FN: &str = "hot-reader-fn";
    pub const COLD_BUCKET: &str = "cold-bucket";
    pub const ARCHIVE_BUCKET: &str = "archive-bucket";
    pub const API_GATEWAY: &str = "api-gateway";
    pub const TWIN_STORE: &str = "twin-store";
    pub const TWIN_UPDATE_FN: &str = "twin-update-fn";
    pub const DASHBOARD_SITE: &str = "dashboard-site";
}
