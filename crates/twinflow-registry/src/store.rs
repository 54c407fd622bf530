//! 接続レジストリの読み書き
//!
//! `.twinflow/connections.json` に保存し、書き込み前に backup へ退避する。
//! ロックファイルは1時間で stale とみなす。

use crate::error::{RegistryError, Result};
use crate::model::ConnectionEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

const REGISTRY_VERSION: u32 = 1;
const REGISTRY_DIR: &str = ".twinflow";
const REGISTRY_FILE: &str = "connections.json";
const REGISTRY_BACKUP: &str = "connections.json.backup";
const LOCK_FILE: &str = "connections.lock.json";

/// conn_id → エントリのドキュメント
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RegistryDocument {
    version: u32,
    updated_at: DateTime<Utc>,
    connections: BTreeMap<String, ConnectionEntry>,
}

impl Default for RegistryDocument {
    fn default() -> Self {
        Self {
            version: REGISTRY_VERSION,
            updated_at: Utc::now(),
            connections: BTreeMap::new(),
        }
    }
}

/// プロジェクト単位の接続レジストリ
pub struct ConnectionRegistry {
    project_root: PathBuf,
}

impl ConnectionRegistry {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
        }
    }

    fn registry_dir(&self) -> PathBuf {
        self.project_root.join(REGISTRY_DIR)
    }

    fn registry_path(&self) -> PathBuf {
        self.registry_dir().join(REGISTRY_FILE)
    }

    fn backup_path(&self) -> PathBuf {
        self.registry_dir().join(REGISTRY_BACKUP)
    }

    fn lock_path(&self) -> PathBuf {
        self.registry_dir().join(LOCK_FILE)
    }

    async fn ensure_dir(&self) -> Result<()> {
        let dir = self.registry_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
            tracing::debug!("レジストリディレクトリを作成: {}", dir.display());
        }
        Ok(())
    }

    async fn load(&self) -> Result<RegistryDocument> {
        let path = self.registry_path();
        if !path.exists() {
            return Ok(RegistryDocument::default());
        }

        let content = fs::read_to_string(&path).await?;
        let doc: RegistryDocument = serde_json::from_str(&content)?;

        if doc.version > REGISTRY_VERSION {
            return Err(RegistryError::StoreError(format!(
                "レジストリバージョン {} は未対応です（対応: {}）",
                doc.version, REGISTRY_VERSION
            )));
        }
        Ok(doc)
    }

    async fn save(&self, doc: &RegistryDocument) -> Result<()> {
        self.ensure_dir().await?;

        let path = self.registry_path();
        let backup = self.backup_path();

        if path.exists() {
            if backup.exists() {
                fs::remove_file(&backup).await?;
            }
            fs::rename(&path, &backup).await?;
        }

        let content = serde_json::to_string_pretty(doc)?;
        fs::write(&path, content).await?;

        tracing::debug!("接続レジストリを保存 ({} 件)", doc.connections.len());
        Ok(())
    }

    /// conn_id でエントリを取得
    pub async fn get(&self, conn_id: &str) -> Result<Option<ConnectionEntry>> {
        let doc = self.load().await?;
        Ok(doc.connections.get(conn_id).cloned())
    }

    /// エントリを登録または上書き（last-writer-wins）
    pub async fn put(&self, entry: ConnectionEntry) -> Result<()> {
        let mut doc = self.load().await?;
        doc.connections.insert(entry.conn_id.clone(), entry);
        doc.updated_at = Utc::now();
        self.save(&doc).await
    }

    /// エントリを削除。存在しなければ何もしない
    pub async fn remove(&self, conn_id: &str) -> Result<Option<ConnectionEntry>> {
        let mut doc = self.load().await?;
        let removed = doc.connections.remove(conn_id);
        if removed.is_some() {
            doc.updated_at = Utc::now();
            self.save(&doc).await?;
        }
        Ok(removed)
    }

    /// 登録済みエントリの一覧（conn_id 順）
    pub async fn list(&self) -> Result<Vec<ConnectionEntry>> {
        let doc = self.load().await?;
        Ok(doc.connections.into_values().collect())
    }

    /// 排他ロックを取得する
    ///
    /// 同一エッジへの並行変更を防ぎたい呼び出し側の規律として使う。
    pub async fn acquire_lock(&self) -> Result<RegistryLock> {
        self.ensure_dir().await?;
        let lock_path = self.lock_path();

        if lock_path.exists() {
            let content = fs::read_to_string(&lock_path).await?;
            let info: LockInfo = serde_json::from_str(&content)?;

            let age = Utc::now().signed_duration_since(info.acquired_at);
            if age.num_hours() < 1 {
                return Err(RegistryError::LockError(format!(
                    "{} が {} からロック中です",
                    info.holder, info.acquired_at
                )));
            }
            tracing::warn!("stale なロックを除去します（holder: {}）", info.holder);
        }

        let info = LockInfo {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            acquired_at: Utc::now(),
        };
        let content = serde_json::to_string_pretty(&info)?;
        fs::write(&lock_path, content).await?;

        Ok(RegistryLock {
            lock_path,
            released: false,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    acquired_at: DateTime<Utc>,
}

/// RAII ロックガード
pub struct RegistryLock {
    lock_path: PathBuf,
    released: bool,
}

impl RegistryLock {
    pub async fn release(mut self) -> Result<()> {
        if !self.released {
            if self.lock_path.exists() {
                fs::remove_file(&self.lock_path).await?;
            }
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for RegistryLock {
    fn drop(&mut self) {
        if !self.released && self.lock_path.exists() {
            // drop では同期削除しかできない
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use twinflow_core::{BoundaryEdge, ProviderId};

    fn entry() -> ConnectionEntry {
        ConnectionEntry::new(
            BoundaryEdge::HotToTwin,
            ProviderId::Aws,
            ProviderId::Azure,
            "https://relay.example/ingress",
            "token-abc",
        )
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let dir = tempdir().unwrap();
        let registry = ConnectionRegistry::new(dir.path());

        registry.put(entry()).await.unwrap();
        let loaded = registry
            .get("hot-twin--aws-to-azure")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.url, "https://relay.example/ingress");
        assert_eq!(loaded.token, "token-abc");
    }

    #[tokio::test]
    async fn test_put_same_conn_id_overwrites() {
        let dir = tempdir().unwrap();
        let registry = ConnectionRegistry::new(dir.path());

        registry.put(entry()).await.unwrap();
        let mut updated = entry();
        updated.url = "https://relay.example/v2".to_string();
        registry.put(updated).await.unwrap();

        let all = registry.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].url, "https://relay.example/v2");
    }

    #[tokio::test]
    async fn test_remove_missing_is_noop() {
        let dir = tempdir().unwrap();
        let registry = ConnectionRegistry::new(dir.path());
        assert!(registry.remove("no-such-conn").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lock_blocks_second_holder() {
        let dir = tempdir().unwrap();
        let registry = ConnectionRegistry::new(dir.path());

        let lock = registry.acquire_lock().await.unwrap();
        assert!(matches!(
            registry.acquire_lock().await,
            Err(RegistryError::LockError(_))
        ));
        lock.release().await.unwrap();
        registry.acquire_lock().await.unwrap().release().await.unwrap();
    }
}
