use std::path::PathBuf;
use thiserror::Error;
use twinflow_core::CoreError;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("KDLパースエラー: {0}")]
    KdlParse(#[from] kdl::KdlError),

    #[error("ファイル読み込みエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("無効な設定: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(
        "設定ファイルが見つかりません\nヒント: twin.kdl を含むディレクトリで実行するか TWIN_CONFIG_PATH を指定してください"
    )]
    TwinFileNotFound,

    #[error("設定ディレクトリを特定できません")]
    ConfigDirNotFound,

    #[error("プロジェクトルートが見つかりません\n探索開始位置: {0}")]
    ProjectRootNotFound(PathBuf),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
