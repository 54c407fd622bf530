use crate::model::layer::LayerId;
use crate::model::provider::ProviderId;
use crate::model::resource::ResourceKind;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("レイヤー '{0}' にプロバイダーが割り当てられていません")]
    MissingAssignment(LayerId),

    #[error("プロバイダー '{provider}' はレイヤー '{layer}' の {kind} をサポートしていません")]
    UnsupportedCapability {
        provider: ProviderId,
        layer: LayerId,
        kind: ResourceKind,
    },

    #[error("不明なプロバイダー: {0}")]
    UnknownProvider(String),

    #[error("不明なレイヤー: {0}")]
    UnknownLayer(String),

    #[error("スコープ '{scope}' はアクション '{action}' と組み合わせられません")]
    InvalidScope { scope: String, action: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
