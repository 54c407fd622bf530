//! パイプラインモデル
//!
//! レイヤー、プロバイダー、境界エッジ、フィーチャーフラグ、
//! デプロイメントプランの型定義

pub mod assignment;
pub mod edge;
pub mod flags;
pub mod layer;
pub mod plan;
pub mod provider;
pub mod resource;

pub use assignment::ProviderAssignment;
pub use edge::BoundaryEdge;
pub use flags::{EffectiveFlags, OptimizationFlags};
pub use layer::LayerId;
pub use plan::{DeploymentPlan, PlanAction, Scope, Step, StepAction, StepGroup};
pub use provider::ProviderId;
pub use resource::ResourceKind;
