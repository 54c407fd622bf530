//! デプロイメントプラン
//!
//! リゾルバが毎回再計算する順序付きステップ列。永続化しない。
//! ステップ順がリソース間依存をすべて符号化しており、実行側は
//! 逐次実行するだけで正しさが保たれる。

use crate::model::edge::BoundaryEdge;
use crate::model::layer::LayerId;
use crate::model::provider::ProviderId;
use crate::model::resource::ResourceKind;
use serde::{Deserialize, Serialize};

/// resolve に渡す実行範囲
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scope {
    /// 全レイヤー
    All,
    /// 単一レイヤー（タッチするブリッジを含む）
    Layer(LayerId),
    /// イベントアクション群のみ（recreate-events 用）
    EventActions,
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::All => write!(f, "all"),
            Scope::Layer(layer) => write!(f, "{}", layer.short()),
            Scope::EventActions => write!(f, "event-actions"),
        }
    }
}

/// resolve に渡すアクション
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlanAction {
    Deploy,
    Destroy,
    /// イベントアクション関数の再デプロイ
    Redeploy,
}

impl std::fmt::Display for PlanAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanAction::Deploy => write!(f, "deploy"),
            PlanAction::Destroy => write!(f, "destroy"),
            PlanAction::Redeploy => write!(f, "redeploy"),
        }
    }
}

/// 個々のステップのアクション
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    Create,
    Destroy,
    Redeploy,
}

impl std::fmt::Display for StepAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepAction::Create => write!(f, "create"),
            StepAction::Destroy => write!(f, "destroy"),
            StepAction::Redeploy => write!(f, "redeploy"),
        }
    }
}

/// ステップが属するオプショングループ
///
/// Base 以外はフィーチャーフラグ述語で有効化される名前付き束。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepGroup {
    Base,
    EventChecking,
    Workflow,
    Feedback,
    ApiGateway,
    Bridge,
}

impl std::fmt::Display for StepGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StepGroup::Base => "base",
            StepGroup::EventChecking => "event_checking",
            StepGroup::Workflow => "workflow",
            StepGroup::Feedback => "feedback",
            StepGroup::ApiGateway => "api_gateway",
            StepGroup::Bridge => "bridge",
        };
        write!(f, "{s}")
    }
}

/// プラン内の1ステップ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// 所属レイヤー
    pub layer: LayerId,

    /// create / destroy / redeploy
    pub action: StepAction,

    /// オプショングループ
    pub group: StepGroup,

    /// リソース種別
    pub kind: ResourceKind,

    /// プラン内で一意なロール名（決定論的命名関数の入力）
    pub role: String,

    /// 実行先プロバイダー
    pub provider: ProviderId,

    /// 先行ステップのロール名。プラン順は常にこの依存を満たす
    pub depends_on: Vec<String>,

    /// ブリッジステップのみ: 対象エッジ
    pub edge: Option<BoundaryEdge>,
}

impl Step {
    pub fn describe(&self) -> String {
        format!(
            "[{}] {} {} ({}) @ {}",
            self.layer.short(),
            self.action,
            self.role,
            self.group,
            self.provider
        )
    }
}

/// 順序付きデプロイメントプラン
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentPlan {
    pub action: PlanAction,
    pub scope: Scope,
    pub steps: Vec<Step>,
}

impl DeploymentPlan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// 指定グループのステップ
    pub fn steps_in_group(&self, group: StepGroup) -> Vec<&Step> {
        self.steps.iter().filter(|s| s.group == group).collect()
    }

    /// 指定レイヤーのステップ
    pub fn steps_for_layer(&self, layer: LayerId) -> Vec<&Step> {
        self.steps.iter().filter(|s| s.layer == layer).collect()
    }

    /// グループ粒度の出現列（対称性検証に使用）
    ///
    /// 連続する同一 (layer, group) を1エントリに畳む。
    pub fn group_sequence(&self) -> Vec<(LayerId, StepGroup)> {
        let mut sequence: Vec<(LayerId, StepGroup)> = Vec::new();
        for step in &self.steps {
            let entry = (step.layer, step.group);
            if sequence.last() != Some(&entry) {
                sequence.push(entry);
            }
        }
        sequence
    }

    /// ロール名 → ステップ位置の検証用ヘルパー
    pub fn position_of(&self, role: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.role == role)
    }

    /// プラン内に指定グループが存在するか
    pub fn has_group(&self, group: StepGroup) -> bool {
        self.steps.iter().any(|s| s.group == group)
    }
}

impl std::fmt::Display for DeploymentPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "plan: {} {} ({} steps)", self.action, self.scope, self.len())?;
        for step in &self.steps {
            writeln!(f, "  {}", step.describe())?;
        }
        Ok(())
    }
}
