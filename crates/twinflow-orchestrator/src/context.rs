//! 実行文脈
//!
//! 1 回の実行中に作成されたリソースハンドルをロール名で保持し、後続
//! ステップの環境変数注入を解決する。実行をまたいで永続化しない。

use std::collections::BTreeMap;
use twinflow_cloud::ResourceHandle;
use twinflow_core::ResourceKind;
use twinflow_core::model::resource::role;

/// 1 実行分のハンドル集合
#[derive(Debug, Default)]
pub struct RunContext {
    handles: BTreeMap<String, ResourceHandle>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, role: impl Into<String>, handle: ResourceHandle) {
        self.handles.insert(role.into(), handle);
    }

    pub fn get(&self, role: &str) -> Option<&ResourceHandle> {
        self.handles.get(role)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// 依存ハンドルの参照値（ARN / URL / 名前のいずれか）
    pub fn reference(handle: &ResourceHandle) -> String {
        handle
            .attribute_str("arn")
            .or_else(|| handle.attribute_str("url"))
            .map(String::from)
            .unwrap_or_else(|| handle.name.clone())
    }
}

/// 依存ロールに対応する環境変数キー
///
/// アダプタが期待する慣習キー（ROLE_ARN / STREAM_NAME / TABLE_NAME /
/// WORKFLOW_ARN）を優先し、それ以外はロール名を upper snake にする。
pub fn env_key_for(dep_role: &str, dep_kind: ResourceKind) -> String {
    if dep_kind == ResourceKind::ServiceRole {
        return "ROLE_ARN".to_string();
    }
    match dep_role {
        role::INGEST_STREAM => "STREAM_NAME".to_string(),
        role::HOT_TABLE => "TABLE_NAME".to_string(),
        role::NOTIFICATION_WORKFLOW => "WORKFLOW_ARN".to_string(),
        other => other.to_uppercase().replace('-', "_"),
    }
}
