//! トポロジーリゾルバ
//!
//! ProviderAssignment と OptimizationFlags から順序付き
//! [`DeploymentPlan`] を導出する純粋計算。クラウド API には触れない。
//!
//! 順序付けの要点:
//! - ステップ順は述語のネストではなく参照依存で決める。イベント
//!   チェック関数はワークフロー / フィードバックの識別子を環境変数に
//!   埋め込むため、論理的には外側の述語でも生成順は最後になる。
//! - destroy は create の完全な逆順。ストレージティアは入口に
//!   かかわらず archive → cold → hot。
//! - プロバイダーが異なる境界エッジにはブリッジステップ対
//!   （受信側 ingress → 送信側 egress）を追加する。

use crate::error::{CoreError, Result};
use crate::model::assignment::ProviderAssignment;
use crate::model::edge::BoundaryEdge;
use crate::model::flags::{EffectiveFlags, OptimizationFlags};
use crate::model::layer::LayerId;
use crate::model::plan::{DeploymentPlan, PlanAction, Scope, Step, StepAction, StepGroup};
use crate::model::provider::ProviderId;
use crate::model::resource::{ResourceKind, role};

#[cfg(test)]
mod tests;

/// デプロイメントプランを導出する
pub fn resolve(
    assignment: &ProviderAssignment,
    flags: &OptimizationFlags,
    scope: Scope,
    action: PlanAction,
) -> Result<DeploymentPlan> {
    match (action, scope) {
        (PlanAction::Redeploy, Scope::EventActions) => {
            resolve_event_actions(assignment, flags)
        }
        (PlanAction::Redeploy, other) | (_, other @ Scope::EventActions) => {
            Err(CoreError::InvalidScope {
                scope: other.to_string(),
                action: action.to_string(),
            })
        }
        (PlanAction::Deploy, scope) => {
            let steps = create_steps(assignment, flags, scope)?;
            Ok(DeploymentPlan {
                action: PlanAction::Deploy,
                scope,
                steps,
            })
        }
        (PlanAction::Destroy, scope) => {
            // destroy は create 列の完全な逆順。PIPELINE_ORDER の逆転が
            // DESTROY_ORDER（archive → cold → hot を含む）に一致する。
            let mut steps = create_steps(assignment, flags, scope)?;
            steps.reverse();
            for step in &mut steps {
                step.action = StepAction::Destroy;
                // 破棄は順序のみに依存する。名前は命名関数で再導出される
                step.depends_on.clear();
            }
            Ok(DeploymentPlan {
                action: PlanAction::Destroy,
                scope,
                steps,
            })
        }
    }
}

/// 両端のプロバイダーが異なる境界エッジを列挙する
pub fn mismatched_edges(
    assignment: &ProviderAssignment,
) -> Result<Vec<(BoundaryEdge, ProviderId, ProviderId)>> {
    let mut edges = Vec::new();
    for edge in BoundaryEdge::EDGES {
        let src = assignment.resolve(edge.source())?;
        let dst = assignment.resolve(edge.target())?;
        if src != dst {
            edges.push((edge, src, dst));
        }
    }
    Ok(edges)
}

/// create 順の全ステップ（レイヤーブロック → ブリッジ対）
fn create_steps(
    assignment: &ProviderAssignment,
    flags: &OptimizationFlags,
    scope: Scope,
) -> Result<Vec<Step>> {
    let eff = flags.effective();
    let mut steps = Vec::new();

    for layer in LayerId::PIPELINE_ORDER {
        if !scope_includes(scope, layer) {
            continue;
        }
        layer_create_steps(layer, assignment, &eff, &mut steps)?;
    }

    for (edge, src, dst) in mismatched_edges(assignment)? {
        if !scope_includes(scope, edge.source()) && !scope_includes(scope, edge.target()) {
            continue;
        }
        bridge_create_steps(edge, src, dst, &mut steps)?;
    }

    tracing::debug!(
        scope = %scope,
        steps = steps.len(),
        "トポロジーを解決しました"
    );
    Ok(steps)
}

fn scope_includes(scope: Scope, layer: LayerId) -> bool {
    match scope {
        Scope::All => true,
        Scope::Layer(target) => target == layer,
        Scope::EventActions => false,
    }
}

/// 1レイヤー分の create ステップを積む
fn layer_create_steps(
    layer: LayerId,
    assignment: &ProviderAssignment,
    eff: &EffectiveFlags,
    steps: &mut Vec<Step>,
) -> Result<()> {
    let provider = assignment.resolve(layer)?;
    let mut push = |group: StepGroup, kind: ResourceKind, role: &str, deps: &[&str]| {
        steps.push(make_step(layer, provider, group, kind, role, deps)?);
        Ok::<(), CoreError>(())
    };

    match layer {
        LayerId::Ingestion => {
            // ゲートウェイのルーティングルールがストリームを参照する
            push(StepGroup::Base, ResourceKind::IngestStream, role::INGEST_STREAM, &[])?;
            push(
                StepGroup::Base,
                ResourceKind::DeviceGateway,
                role::DEVICE_GATEWAY,
                &[role::INGEST_STREAM],
            )?;
        }
        LayerId::Compute => {
            push(StepGroup::Base, ResourceKind::ServiceRole, role::COMPUTE_ROLE, &[])?;
            push(
                StepGroup::Base,
                ResourceKind::PersistFunction,
                role::PERSIST_FN,
                &[role::COMPUTE_ROLE],
            )?;

            // 参照依存順: ワークフロー / フィードバックの関数とロールを
            // 先に作り、識別子を埋め込むイベントチェック関数は最後。
            if eff.workflow {
                push(StepGroup::Workflow, ResourceKind::ServiceRole, role::WORKFLOW_ROLE, &[])?;
                push(
                    StepGroup::Workflow,
                    ResourceKind::NotificationWorkflow,
                    role::NOTIFICATION_WORKFLOW,
                    &[role::WORKFLOW_ROLE],
                )?;
            }
            if eff.feedback {
                push(StepGroup::Feedback, ResourceKind::ServiceRole, role::FEEDBACK_ROLE, &[])?;
                push(
                    StepGroup::Feedback,
                    ResourceKind::FeedbackFunction,
                    role::FEEDBACK_FN,
                    &[role::FEEDBACK_ROLE],
                )?;
            }
            if eff.event_checking {
                let mut deps = vec![role::COMPUTE_ROLE];
                if eff.workflow {
                    deps.push(role::NOTIFICATION_WORKFLOW);
                }
                if eff.feedback {
                    deps.push(role::FEEDBACK_FN);
                }
                push(
                    StepGroup::EventChecking,
                    ResourceKind::EventCheckFunction,
                    role::EVENT_CHECK_FN,
                    &deps,
                )?;
            }
        }
        LayerId::HotStorage => {
            push(StepGroup::Base, ResourceKind::HotTable, role::HOT_TABLE, &[])?;
            push(
                StepGroup::Base,
                ResourceKind::HotReaderFunction,
                role::HOT_READER_FN,
                &[role::HOT_TABLE],
            )?;

            // api_gateway 述語: hot のプロバイダーがこのレイヤーを
            // ホストし、かつ L4 / L5 のどちらかが別プロバイダーのとき。
            let hot = assignment.resolve(LayerId::HotStorage)?;
            let twin = assignment.resolve(LayerId::TwinModel)?;
            let dashboard = assignment.resolve(LayerId::Dashboard)?;
            if provider == hot && (hot != twin || hot != dashboard) {
                push(
                    StepGroup::ApiGateway,
                    ResourceKind::ApiGateway,
                    role::API_GATEWAY,
                    &[role::HOT_READER_FN],
                )?;
            }
        }
        LayerId::ColdStorage => {
            push(StepGroup::Base, ResourceKind::ColdBucket, role::COLD_BUCKET, &[])?;
        }
        LayerId::ArchiveStorage => {
            push(StepGroup::Base, ResourceKind::ArchiveBucket, role::ARCHIVE_BUCKET, &[])?;
        }
        LayerId::TwinModel => {
            push(StepGroup::Base, ResourceKind::TwinModelStore, role::TWIN_STORE, &[])?;
            push(
                StepGroup::Base,
                ResourceKind::TwinUpdateFunction,
                role::TWIN_UPDATE_FN,
                &[role::TWIN_STORE],
            )?;
        }
        LayerId::Dashboard => {
            push(StepGroup::Base, ResourceKind::DashboardSite, role::DASHBOARD_SITE, &[])?;
        }
    }
    Ok(())
}

/// ブリッジステップ対を積む（受信側 ingress → 送信側 egress）
fn bridge_create_steps(
    edge: BoundaryEdge,
    src: ProviderId,
    dst: ProviderId,
    steps: &mut Vec<Step>,
) -> Result<()> {
    let ingress_role = bridge_ingress_role(edge);
    let egress_role = bridge_egress_role(edge);

    let mut ingress = make_step(
        edge.target(),
        dst,
        StepGroup::Bridge,
        ResourceKind::RelayIngress,
        &ingress_role,
        &[],
    )?;
    ingress.edge = Some(edge);
    steps.push(ingress);

    // egress は ingress の URL / トークンを環境に埋め込む
    let mut egress = make_step(
        edge.source(),
        src,
        StepGroup::Bridge,
        ResourceKind::RelayEgress,
        &egress_role,
        &[&ingress_role],
    )?;
    egress.edge = Some(edge);
    steps.push(egress);
    Ok(())
}

pub fn bridge_ingress_role(edge: BoundaryEdge) -> String {
    format!("bridge-{}-ingress", edge.id())
}

pub fn bridge_egress_role(edge: BoundaryEdge) -> String {
    format!("bridge-{}-egress", edge.id())
}

/// イベントアクション群のみの再デプロイサブプラン
///
/// ストレージ / 取込レイヤーには一切触れない。
fn resolve_event_actions(
    assignment: &ProviderAssignment,
    flags: &OptimizationFlags,
) -> Result<DeploymentPlan> {
    let eff = flags.effective();
    let provider = assignment.resolve(LayerId::Compute)?;
    let mut steps = Vec::new();

    if eff.event_checking {
        if eff.workflow {
            steps.push(make_step(
                LayerId::Compute,
                provider,
                StepGroup::Workflow,
                ResourceKind::NotificationWorkflow,
                role::NOTIFICATION_WORKFLOW,
                &[],
            )?);
        }
        if eff.feedback {
            steps.push(make_step(
                LayerId::Compute,
                provider,
                StepGroup::Feedback,
                ResourceKind::FeedbackFunction,
                role::FEEDBACK_FN,
                &[],
            )?);
        }
        steps.push(make_step(
            LayerId::Compute,
            provider,
            StepGroup::EventChecking,
            ResourceKind::EventCheckFunction,
            role::EVENT_CHECK_FN,
            &[],
        )?);
    }

    for step in &mut steps {
        step.action = StepAction::Redeploy;
    }

    Ok(DeploymentPlan {
        action: PlanAction::Redeploy,
        scope: Scope::EventActions,
        steps,
    })
}

/// ステップを組み立てつつプロバイダー能力を検証する
fn make_step(
    layer: LayerId,
    provider: ProviderId,
    group: StepGroup,
    kind: ResourceKind,
    role: &str,
    deps: &[&str],
) -> Result<Step> {
    if !provider.supports(kind) {
        return Err(CoreError::UnsupportedCapability {
            provider,
            layer,
            kind,
        });
    }
    Ok(Step {
        layer,
        action: StepAction::Create,
        group,
        kind,
        role: role.to_string(),
        provider,
        depends_on: deps.iter().map(|d| d.to_string()).collect(),
        edge: None,
    })
}
