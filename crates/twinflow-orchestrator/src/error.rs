//! オーケストレーターのエラー型

use twinflow_core::{BoundaryEdge, CoreError, ProviderId};

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("プロバイダー {0} が登録されていません")]
    ProviderNotRegistered(ProviderId),

    #[error("エッジ {0} は同一プロバイダー内のためブリッジがありません")]
    NoBridgeOnEdge(BoundaryEdge),

    #[error("依存リソース {role} のハンドルが見つかりません")]
    MissingDependency { role: String },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Cloud(#[from] twinflow_cloud::CloudError),

    #[error(transparent)]
    Bridge(#[from] twinflow_bridge::BridgeError),

    #[error(transparent)]
    Registry(#[from] twinflow_registry::RegistryError),

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

impl OrchestratorError {
    /// 呼び出し側の入力起因か（リトライ・再実行で解決しない）
    pub fn is_client_error(&self) -> bool {
        match self {
            OrchestratorError::Core(_) => true,
            OrchestratorError::ProviderNotRegistered(_) => true,
            OrchestratorError::NoBridgeOnEdge(_) => true,
            OrchestratorError::MissingDependency { .. } => true,
            OrchestratorError::Cloud(e) => e.is_client_error(),
            OrchestratorError::Bridge(e) => e.is_client_error(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
