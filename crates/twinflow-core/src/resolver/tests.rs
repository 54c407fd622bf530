//! リゾルバのテスト
//!
//! create/destroy 対称性、オプショングループ述語、ブリッジ生成、
//! ストレージティア破棄順を網羅する。

use super::*;
use crate::model::resource::role;

fn uniform_aws() -> ProviderAssignment {
    ProviderAssignment::uniform(ProviderId::Aws)
}

fn flags(event: bool, workflow: bool, feedback: bool) -> OptimizationFlags {
    OptimizationFlags {
        event_checking: event,
        notification_workflow: workflow,
        device_feedback: feedback,
    }
}

fn all_flag_combos() -> Vec<OptimizationFlags> {
    let mut combos = Vec::new();
    for event in [false, true] {
        for workflow in [false, true] {
            for feedback in [false, true] {
                combos.push(flags(event, workflow, feedback));
            }
        }
    }
    combos
}

/// 代表的な割当パターン（単一クラウド、L4 分離、ストレージ分離、3分割）
fn assignment_matrix() -> Vec<ProviderAssignment> {
    let mut split_twin = uniform_aws();
    split_twin.set(LayerId::TwinModel, ProviderId::Azure);

    let mut split_cold = uniform_aws();
    split_cold
        .set(LayerId::ColdStorage, ProviderId::Azure)
        .set(LayerId::ArchiveStorage, ProviderId::Azure);

    let mut three_way = uniform_aws();
    three_way
        .set(LayerId::HotStorage, ProviderId::Azure)
        .set(LayerId::ColdStorage, ProviderId::Gcp)
        .set(LayerId::ArchiveStorage, ProviderId::Gcp)
        .set(LayerId::TwinModel, ProviderId::Gcp)
        .set(LayerId::Dashboard, ProviderId::Aws);

    vec![uniform_aws(), split_twin, split_cold, three_way]
}

#[test]
fn test_create_destroy_are_exact_reverses() {
    for assignment in assignment_matrix() {
        for f in all_flag_combos() {
            let deploy = resolve(&assignment, &f, Scope::All, PlanAction::Deploy).unwrap();
            let destroy = resolve(&assignment, &f, Scope::All, PlanAction::Destroy).unwrap();

            // グループ粒度で完全な逆列
            let mut reversed = destroy.group_sequence();
            reversed.reverse();
            assert_eq!(deploy.group_sequence(), reversed);

            // ステップ粒度（ロール名）でも逆列
            let deploy_roles: Vec<_> = deploy.steps.iter().map(|s| s.role.clone()).collect();
            let mut destroy_roles: Vec<_> = destroy.steps.iter().map(|s| s.role.clone()).collect();
            destroy_roles.reverse();
            assert_eq!(deploy_roles, destroy_roles);
        }
    }
}

#[test]
fn test_no_event_flags_no_event_steps() {
    // event_checking=false なら他の2フラグに関係なくイベント系ステップは出ない
    for workflow in [false, true] {
        for feedback in [false, true] {
            let plan = resolve(
                &uniform_aws(),
                &flags(false, workflow, feedback),
                Scope::All,
                PlanAction::Deploy,
            )
            .unwrap();
            assert!(!plan.has_group(StepGroup::EventChecking));
            assert!(!plan.has_group(StepGroup::Workflow));
            assert!(!plan.has_group(StepGroup::Feedback));
        }
    }
}

#[test]
fn test_reference_order_inside_compute_layer() {
    let plan = resolve(
        &uniform_aws(),
        &flags(true, true, true),
        Scope::All,
        PlanAction::Deploy,
    )
    .unwrap();

    // ワークフロー / フィードバックはイベントチェック関数より先
    let workflow = plan.position_of(role::NOTIFICATION_WORKFLOW).unwrap();
    let feedback = plan.position_of(role::FEEDBACK_FN).unwrap();
    let event_check = plan.position_of(role::EVENT_CHECK_FN).unwrap();
    assert!(workflow < event_check);
    assert!(feedback < event_check);

    // ロールは参照する関数より先
    assert!(plan.position_of(role::WORKFLOW_ROLE).unwrap() < workflow);
    assert!(plan.position_of(role::FEEDBACK_ROLE).unwrap() < feedback);
}

#[test]
fn test_api_gateway_predicate_combinations() {
    // (L4 == hot, L5 == hot) の4通り。どちらかが異なるときのみ出現
    let cases = [
        (ProviderId::Aws, ProviderId::Aws, false),
        (ProviderId::Azure, ProviderId::Aws, true),
        (ProviderId::Aws, ProviderId::Azure, true),
        (ProviderId::Azure, ProviderId::Azure, true),
    ];
    for (twin, dashboard, expected) in cases {
        let mut assignment = uniform_aws();
        assignment
            .set(LayerId::TwinModel, twin)
            .set(LayerId::Dashboard, dashboard);
        let plan = resolve(
            &assignment,
            &flags(false, false, false),
            Scope::All,
            PlanAction::Deploy,
        )
        .unwrap();
        assert_eq!(
            plan.has_group(StepGroup::ApiGateway),
            expected,
            "L4={twin} L5={dashboard}"
        );
    }
}

#[test]
fn test_bridges_only_on_mismatched_edges() {
    // 単一クラウドではブリッジなし
    let plan = resolve(
        &uniform_aws(),
        &flags(false, false, false),
        Scope::All,
        PlanAction::Deploy,
    )
    .unwrap();
    assert!(!plan.has_group(StepGroup::Bridge));

    // L4 を分離すると hot → twin のブリッジ対のみ
    let mut assignment = uniform_aws();
    assignment.set(LayerId::TwinModel, ProviderId::Azure);
    let plan = resolve(
        &assignment,
        &flags(false, false, false),
        Scope::All,
        PlanAction::Deploy,
    )
    .unwrap();
    let bridges = plan.steps_in_group(StepGroup::Bridge);
    assert_eq!(bridges.len(), 2);
    assert!(bridges.iter().all(|s| s.edge == Some(BoundaryEdge::HotToTwin)));

    // ingress（受信側）が egress より先
    let ingress = plan
        .position_of(&bridge_ingress_role(BoundaryEdge::HotToTwin))
        .unwrap();
    let egress = plan
        .position_of(&bridge_egress_role(BoundaryEdge::HotToTwin))
        .unwrap();
    assert!(ingress < egress);
}

#[test]
fn test_bridge_roles_stable_across_resolves() {
    let mut assignment = uniform_aws();
    assignment.set(LayerId::Dashboard, ProviderId::Gcp);
    let first = resolve(&assignment, &flags(true, false, false), Scope::All, PlanAction::Deploy)
        .unwrap();
    let second = resolve(&assignment, &flags(true, false, false), Scope::All, PlanAction::Deploy)
        .unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_storage_destroy_order_is_archive_cold_hot() {
    let plan = resolve(
        &uniform_aws(),
        &flags(true, true, true),
        Scope::All,
        PlanAction::Destroy,
    )
    .unwrap();
    let archive = plan.position_of(role::ARCHIVE_BUCKET).unwrap();
    let cold = plan.position_of(role::COLD_BUCKET).unwrap();
    let hot = plan.position_of(role::HOT_TABLE).unwrap();
    assert!(archive < cold);
    assert!(cold < hot);
}

#[test]
fn test_scenario_a_single_provider_no_optional_groups() {
    let plan = resolve(
        &uniform_aws(),
        &flags(false, false, false),
        Scope::All,
        PlanAction::Deploy,
    )
    .unwrap();

    assert!(plan.steps.iter().all(|s| s.group == StepGroup::Base));
    // 各レイヤーに必須ステップがある
    for layer in LayerId::PIPELINE_ORDER {
        assert!(!plan.steps_for_layer(layer).is_empty(), "{layer} が空");
    }
}

#[test]
fn test_scenario_b_split_twin_adds_bridge_and_api_gateway() {
    let mut assignment = uniform_aws();
    assignment.set(LayerId::TwinModel, ProviderId::Azure);
    let plan = resolve(
        &assignment,
        &flags(false, false, false),
        Scope::All,
        PlanAction::Deploy,
    )
    .unwrap();

    assert!(plan.has_group(StepGroup::Bridge));
    assert!(plan.has_group(StepGroup::ApiGateway));
}

#[test]
fn test_single_layer_scope_includes_touching_bridges() {
    let mut assignment = uniform_aws();
    assignment.set(LayerId::TwinModel, ProviderId::Azure);
    let plan = resolve(
        &assignment,
        &flags(false, false, false),
        Scope::Layer(LayerId::TwinModel),
        PlanAction::Destroy,
    )
    .unwrap();

    // L4 のみ破棄してもブリッジの両端は片付く
    assert_eq!(plan.steps_in_group(StepGroup::Bridge).len(), 2);
    assert!(plan.steps.iter().all(|s| s.layer == LayerId::TwinModel
        || s.group == StepGroup::Bridge));
}

#[test]
fn test_missing_assignment_is_configuration_error() {
    let mut assignment = ProviderAssignment::new();
    assignment.set(LayerId::Ingestion, ProviderId::Aws);
    let result = resolve(
        &assignment,
        &flags(false, false, false),
        Scope::All,
        PlanAction::Deploy,
    );
    assert!(matches!(result, Err(CoreError::MissingAssignment(_))));
}

#[test]
fn test_gcp_ingestion_is_unsupported() {
    let mut assignment = uniform_aws();
    assignment.set(LayerId::Ingestion, ProviderId::Gcp);
    let result = resolve(
        &assignment,
        &flags(false, false, false),
        Scope::All,
        PlanAction::Deploy,
    );
    assert!(matches!(
        result,
        Err(CoreError::UnsupportedCapability {
            provider: ProviderId::Gcp,
            ..
        })
    ));
}

#[test]
fn test_event_actions_subplan_touches_no_storage() {
    let plan = resolve(
        &uniform_aws(),
        &flags(true, true, false),
        Scope::EventActions,
        PlanAction::Redeploy,
    )
    .unwrap();

    assert!(!plan.is_empty());
    assert!(plan.steps.iter().all(|s| s.layer == LayerId::Compute));
    assert!(plan.steps.iter().all(|s| s.action == StepAction::Redeploy));
    assert!(plan.steps.iter().all(|s| s.kind.is_function()
        || s.kind == ResourceKind::NotificationWorkflow));
    assert!(plan.position_of(role::NOTIFICATION_WORKFLOW).unwrap()
        < plan.position_of(role::EVENT_CHECK_FN).unwrap());
}

#[test]
fn test_event_actions_subplan_empty_without_event_checking() {
    let plan = resolve(
        &uniform_aws(),
        &flags(false, true, true),
        Scope::EventActions,
        PlanAction::Redeploy,
    )
    .unwrap();
    assert!(plan.is_empty());
}

#[test]
fn test_invalid_scope_action_combinations() {
    let assignment = uniform_aws();
    let f = flags(false, false, false);
    assert!(matches!(
        resolve(&assignment, &f, Scope::EventActions, PlanAction::Deploy),
        Err(CoreError::InvalidScope { .. })
    ));
    assert!(matches!(
        resolve(&assignment, &f, Scope::All, PlanAction::Redeploy),
        Err(CoreError::InvalidScope { .. })
    ));
}
