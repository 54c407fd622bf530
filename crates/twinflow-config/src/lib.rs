//! TwinFlow 設定
//!
//! プロジェクト設定 `twin.kdl` の探索と読み込み。
//! ProviderAssignment と OptimizationFlags は1回の呼び出しにつき
//! 一度だけ読み込まれ、以降は不変値として各層に渡される。

pub mod error;
pub mod parser;

pub use error::*;
pub use parser::{AwsSettings, AzureSettings, GcpSettings, ProjectConfig, parse_project};

use std::path::{Path, PathBuf};

/// TwinFlowのグローバル設定ディレクトリを取得
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("twinflow");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// プロジェクトの twin.kdl ファイルを探す
///
/// 以下の優先順位で設定ファイルを検索:
/// 1. 環境変数 TWIN_CONFIG_PATH (直接パス指定)
/// 2. カレントディレクトリ: twin.local.kdl, .twin.local.kdl, twin.kdl, .twin.kdl
/// 3. ./.twinflow/ ディレクトリ内: 同様の順序
/// 4. ~/.config/twinflow/twin.kdl (グローバル設定)
pub fn find_twin_file() -> Result<PathBuf> {
    // 1. 環境変数で直接指定
    if let Ok(config_path) = std::env::var("TWIN_CONFIG_PATH") {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
    }

    let current_dir = std::env::current_dir()?;
    let candidates = ["twin.local.kdl", ".twin.local.kdl", "twin.kdl", ".twin.kdl"];

    // 2. カレントディレクトリで検索
    for filename in &candidates {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    // 3. ./.twinflow/ ディレクトリで検索
    let twin_dir = current_dir.join(".twinflow");
    if twin_dir.is_dir() {
        for filename in &candidates {
            let path = twin_dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    // 4. グローバル設定ファイル (~/.config/twinflow/twin.kdl)
    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("twinflow").join("twin.kdl");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::TwinFileNotFound)
}

/// 設定ファイルを読み込んでパースする
pub fn load_project(path: impl AsRef<Path>) -> Result<ProjectConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    tracing::debug!("設定を読み込み: {}", path.display());
    parse_project(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_load_project_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("twin.kdl");
        fs::write(
            &path,
            r#"
project "factory-twin"

providers {
    ingestion "aws"
    compute "aws"
    hot-storage "aws"
    cold-storage "aws"
    archive-storage "aws"
}
"#,
        )
        .unwrap();

        let config = load_project(&path).unwrap();
        assert_eq!(config.name, "factory-twin");
    }
}
