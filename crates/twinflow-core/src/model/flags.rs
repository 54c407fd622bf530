//! 最適化フラグ
//!
//! イベントチェック系のオプション機能を制御する3つのフラグ。
//! ワークフローとフィードバックはイベントチェックが前提であり、
//! その含意は宣言ではなく resolve 時の正規化で強制される。

use serde::{Deserialize, Serialize};

/// ユーザー指定の最適化フラグ（設定ファイル値そのまま）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct OptimizationFlags {
    /// イベント条件チェックを有効化
    pub event_checking: bool,

    /// イベント検知時に通知ワークフローを起動
    pub notification_workflow: bool,

    /// イベント検知時にデバイスへフィードバックを返す
    pub device_feedback: bool,
}

impl OptimizationFlags {
    /// 固定の述語評価順で正規化した実効フラグを返す
    ///
    /// event_checking が無効なら workflow / feedback も無効になる。
    /// 矛盾した組み合わせはエラーではなくゲートで吸収する。
    pub fn effective(&self) -> EffectiveFlags {
        let event_checking = self.event_checking;
        let workflow = event_checking && self.notification_workflow;
        let feedback = event_checking && self.device_feedback;
        EffectiveFlags {
            event_checking,
            workflow,
            feedback,
        }
    }
}

/// 正規化後の実効フラグ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveFlags {
    pub event_checking: bool,
    pub workflow: bool,
    pub feedback: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_requires_event_checking() {
        let flags = OptimizationFlags {
            event_checking: false,
            notification_workflow: true,
            device_feedback: true,
        };
        let eff = flags.effective();
        assert!(!eff.event_checking);
        assert!(!eff.workflow);
        assert!(!eff.feedback);
    }

    #[test]
    fn test_effective_passthrough_when_enabled() {
        let flags = OptimizationFlags {
            event_checking: true,
            notification_workflow: true,
            device_feedback: false,
        };
        let eff = flags.effective();
        assert!(eff.event_checking);
        assert!(eff.workflow);
        assert!(!eff.feedback);
    }
}
