//! TwinFlow AWS Provisioner
//!
//! AWS 上のパイプラインリソースを aws CLI 経由で管理する。
//!
//! レイヤーマッピング:
//! - L1: IoT トピックルール + Kinesis ストリーム
//! - L2: Lambda (persist / event-check / feedback) + IAM ロール + Step Functions
//! - L3: DynamoDB (hot) / S3 (cold, archive) + Lambda reader
//! - L4: IoT TwinMaker ワークスペース + Lambda
//! - L5: S3 静的サイト
//! - ブリッジ: Lambda + Function URL

pub mod cli;
pub mod error;
pub mod provider;

pub use cli::AwsCli;
pub use error::{AwsError, Result};
pub use provider::AwsProvisioner;
