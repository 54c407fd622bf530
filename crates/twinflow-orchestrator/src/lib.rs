//! TwinFlow Orchestrator
//!
//! リゾルバが生成したデプロイメントプランを逐次実行する。
//!
//! 実行モデル:
//! - ステップはプラン順に 1 つずつ実行する。ステップ順が依存をすべて
//!   符号化しているため、並列化は行わない。
//! - 失敗したステップで実行を停止する。ロールバックは行わない。
//!   部分適用された状態は次回 deploy の存在チェックが吸収する。
//! - 作成済みリソースのハンドルはロール名で文脈に積まれ、後続ステップの
//!   環境変数として注入される。文脈は 1 実行限りで永続化しない。

pub mod context;
pub mod error;
pub mod executor;

pub use context::RunContext;
pub use error::{OrchestratorError, Result};
pub use executor::{
    CancellationFlag, ExecuteOptions, FailedStep, Orchestrator, RunResult, StepOutcome,
};

#[cfg(test)]
mod tests;
