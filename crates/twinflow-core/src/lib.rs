//! TwinFlow Core
//!
//! デジタルツインパイプラインのコアモデルとトポロジーリゾルバ。
//!
//! 5層パイプライン（取込 / 計算 / ストレージ hot・cold・archive /
//! ツインモデル / ダッシュボード）のレイヤー割当とフィーチャーフラグから、
//! 順序付きの [`DeploymentPlan`] を純粋計算で導出します。
//! クラウドへの副作用は一切持ちません（実行は twinflow-orchestrator 側）。

pub mod error;
pub mod model;
pub mod resolver;

pub use error::{CoreError, Result};
pub use model::assignment::ProviderAssignment;
pub use model::edge::BoundaryEdge;
pub use model::flags::{EffectiveFlags, OptimizationFlags};
pub use model::layer::LayerId;
pub use model::plan::{DeploymentPlan, PlanAction, Scope, Step, StepAction, StepGroup};
pub use model::provider::ProviderId;
pub use model::resource::ResourceKind;
pub use resolver::resolve;
