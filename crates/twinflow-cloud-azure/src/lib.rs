//! TwinFlow Azure Provisioner
//!
//! Azure 上のパイプラインリソースを az CLI 経由で管理する。
//!
//! レイヤーマッピング:
//! - L1: IoT Hub + Event Hubs
//! - L2: Function App (persist / event-check / feedback) + マネージド ID + Logic Apps
//! - L3: Storage Table (hot) / Blob コンテナ (cold, archive) + Function App reader
//! - L4: Azure Digital Twins + Function App
//! - L5: Blob 静的サイト
//! - ブリッジ: Function App (HTTP トリガー)

pub mod cli;
pub mod error;
pub mod provider;

pub use cli::AzCli;
pub use error::{AzureError, Result};
pub use provider::AzureProvisioner;
