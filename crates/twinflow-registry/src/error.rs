use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("レジストリファイルエラー: {0}")]
    StoreError(String),

    #[error("ロック取得に失敗しました: {0}")]
    LockError(String),

    #[error("接続が登録されていません: {0}")]
    NotFound(String),

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON エラー: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RegistryError>;
