//! TwinFlow Google Cloud Provisioner
//!
//! Google Cloud 上のパイプラインリソースを gcloud CLI 経由で管理する。
//!
//! レイヤーマッピング:
//! - L1: Pub/Sub トピック（マネージドデバイスゲートウェイは提供外）
//! - L2: Cloud Functions (persist / event-check) + サービスアカウント + Workflows
//! - L3: Firestore (hot) / Cloud Storage (cold, archive) + Cloud Functions reader
//! - L4: Firestore コレクション + Cloud Functions
//! - L5: Cloud Storage 静的サイト
//! - ブリッジ: Cloud Functions (HTTP トリガー)
//!
//! IoT Core 終了後、Google Cloud にはマネージドなデバイスゲートウェイと
//! フィードバック配信が存在しない。該当ケイパビリティはプラン解決段階で
//! 拒否され、このアダプタには到達しない。

pub mod cli;
pub mod error;
pub mod provider;

pub use cli::GcloudCli;
pub use error::{GcpError, Result};
pub use provider::GcpProvisioner;
