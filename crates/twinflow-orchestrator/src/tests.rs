use super::*;
use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use twinflow_cloud::{
    AuthStatus, CloudError, InvocationMode, NameContext, Provisioner, ResourceHandle,
    ResourceSpec, RetryConfig, default_resource_name,
};
use twinflow_core::model::resource::role;
use twinflow_core::{
    BoundaryEdge, LayerId, OptimizationFlags, PlanAction, ProviderAssignment, ProviderId,
    ResourceKind, Scope, resolve,
};
use twinflow_registry::{ConnectionRegistry, conn_id};

/// 注入する失敗の種類
enum InjectedFailure {
    Permanent,
    /// 残り回数分だけ一過性エラーを返し、その後は成功する
    Transient(AtomicUsize),
}

/// インメモリのプロビジョナー。変更回数を数える。
///
/// 実アダプタと同じく、既存リソースに対しては環境変数の一致で
/// ドリフトを検出し、参照属性は作成・既存の両経路で付与する。
struct MemoryProvisioner {
    provider: ProviderId,
    existing: Mutex<BTreeMap<String, BTreeMap<String, String>>>,
    creates: AtomicUsize,
    create_calls: AtomicUsize,
    destroys: AtomicUsize,
    redeploys: AtomicUsize,
    fail_on_role: Option<(String, InjectedFailure)>,
}

impl MemoryProvisioner {
    fn new(provider: ProviderId) -> Self {
        Self {
            provider,
            existing: Mutex::new(BTreeMap::new()),
            creates: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
            destroys: AtomicUsize::new(0),
            redeploys: AtomicUsize::new(0),
            fail_on_role: None,
        }
    }

    fn failing_on(provider: ProviderId, role: &str) -> Self {
        Self {
            fail_on_role: Some((role.to_string(), InjectedFailure::Permanent)),
            ..Self::new(provider)
        }
    }

    fn flaky_on(provider: ProviderId, role: &str, failures: usize) -> Self {
        Self {
            fail_on_role: Some((
                role.to_string(),
                InjectedFailure::Transient(AtomicUsize::new(failures)),
            )),
            ..Self::new(provider)
        }
    }

    fn resource_count(&self) -> usize {
        self.existing.lock().unwrap().len()
    }

    fn recorded_env(&self, name: &str) -> Option<BTreeMap<String, String>> {
        self.existing.lock().unwrap().get(name).cloned()
    }

    /// 種別ごとの参照属性。両経路から呼ぶ。
    fn reference_attributes(&self, mut handle: ResourceHandle) -> ResourceHandle {
        match handle.kind {
            ResourceKind::ServiceRole => {
                let arn = format!("arn:mock:{}", handle.name);
                handle = handle.with_attribute("arn", json!(arn));
            }
            ResourceKind::RelayIngress => {
                let url = format!("https://mock/{}", handle.name);
                handle = handle.with_attribute("url", json!(url));
            }
            _ => {}
        }
        handle
    }
}

#[async_trait]
impl Provisioner for MemoryProvisioner {
    fn provider_id(&self) -> ProviderId {
        self.provider
    }

    fn display_name(&self) -> &str {
        "memory"
    }

    async fn check_auth(&self) -> twinflow_cloud::Result<AuthStatus> {
        Ok(AuthStatus::ok("memory"))
    }

    async fn exists(&self, _kind: ResourceKind, name: &str) -> twinflow_cloud::Result<bool> {
        Ok(self.existing.lock().unwrap().contains_key(name))
    }

    async fn create(&self, spec: &ResourceSpec) -> twinflow_cloud::Result<ResourceHandle> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if let Some((role, failure)) = &self.fail_on_role {
            if role == &spec.role {
                match failure {
                    InjectedFailure::Permanent => {
                        return Err(CloudError::permanent("create", "injected failure"));
                    }
                    InjectedFailure::Transient(remaining) => {
                        if remaining.load(Ordering::SeqCst) > 0 {
                            remaining.fetch_sub(1, Ordering::SeqCst);
                            return Err(CloudError::transient(
                                "create",
                                "ThrottlingException",
                            ));
                        }
                    }
                }
            }
        }
        if let Some(deployed) = self.recorded_env(&spec.name) {
            if deployed != spec.environment {
                return Err(CloudError::drift(&spec.name, "environment mismatch"));
            }
            let handle = ResourceHandle::existing(&spec.name, spec.kind, self.provider);
            return Ok(self.reference_attributes(handle));
        }
        self.existing
            .lock()
            .unwrap()
            .insert(spec.name.clone(), spec.environment.clone());
        self.creates.fetch_add(1, Ordering::SeqCst);
        let handle = ResourceHandle::created(&spec.name, spec.kind, self.provider);
        Ok(self.reference_attributes(handle))
    }

    async fn destroy(&self, _kind: ResourceKind, name: &str) -> twinflow_cloud::Result<()> {
        if self.existing.lock().unwrap().remove(name).is_some() {
            self.destroys.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn resource_name(&self, ctx: &NameContext) -> String {
        default_resource_name(ctx)
    }

    async fn redeploy_function(
        &self,
        _name: &str,
        _spec: &ResourceSpec,
    ) -> twinflow_cloud::Result<()> {
        self.redeploys.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn invoke_function(
        &self,
        name: &str,
        payload: serde_json::Value,
        _mode: InvocationMode,
    ) -> twinflow_cloud::Result<serde_json::Value> {
        Ok(json!({ "function": name, "echo": payload }))
    }
}

fn all_flags() -> OptimizationFlags {
    OptimizationFlags {
        event_checking: true,
        notification_workflow: true,
        device_feedback: true,
    }
}

fn orchestrator_with(
    dir: &std::path::Path,
    providers: Vec<Arc<MemoryProvisioner>>,
) -> Orchestrator {
    let registry = ConnectionRegistry::new(dir);
    let mut orchestrator = Orchestrator::new("factory", registry);
    for provider in providers {
        orchestrator.register_provider(provider);
    }
    orchestrator
}

#[tokio::test]
async fn test_second_deploy_run_causes_no_mutation() {
    let dir = tempfile::tempdir().unwrap();
    let aws = Arc::new(MemoryProvisioner::new(ProviderId::Aws));
    let orchestrator = orchestrator_with(dir.path(), vec![aws.clone()]);

    let assignment = ProviderAssignment::uniform(ProviderId::Aws);
    let plan = resolve(&assignment, &all_flags(), Scope::All, PlanAction::Deploy).unwrap();
    let options = ExecuteOptions::default();

    let first = orchestrator.execute(&plan, &options).await.unwrap();
    assert!(first.is_success());
    assert_eq!(first.completed.len(), plan.len());
    let created = aws.creates.load(Ordering::SeqCst);
    assert!(created > 0);

    let second = orchestrator.execute(&plan, &options).await.unwrap();
    assert!(second.is_success());
    assert_eq!(second.mutation_count(), 0);
    assert_eq!(aws.creates.load(Ordering::SeqCst), created);
}

#[tokio::test]
async fn test_second_deploy_resolves_same_references() {
    let dir = tempfile::tempdir().unwrap();
    let aws = Arc::new(MemoryProvisioner::new(ProviderId::Aws));
    let orchestrator = orchestrator_with(dir.path(), vec![aws.clone()]);

    let assignment = ProviderAssignment::uniform(ProviderId::Aws);
    let plan = resolve(&assignment, &all_flags(), Scope::All, PlanAction::Deploy).unwrap();
    let options = ExecuteOptions::default();

    orchestrator.execute(&plan, &options).await.unwrap();

    // 1 回目で記録された環境にはロール ARN が埋まっている
    let persist_name = default_resource_name(&NameContext::new(
        "factory",
        LayerId::Compute,
        role::PERSIST_FN,
    ));
    let env = aws.recorded_env(&persist_name).unwrap();
    assert_eq!(
        env.get("ROLE_ARN").map(String::as_str),
        Some("arn:mock:factory-l2-compute-role")
    );

    // 既存リソースの参照属性も同じに解決されるため、環境一致の
    // ドリフト検出を通って 2 回目も無変更で成功する
    let second = orchestrator.execute(&plan, &options).await.unwrap();
    assert!(second.is_success(), "{:?}", second.failed);
    assert_eq!(second.mutation_count(), 0);
}

#[tokio::test]
async fn test_transient_create_failure_is_retried() {
    let dir = tempfile::tempdir().unwrap();
    let aws = Arc::new(MemoryProvisioner::flaky_on(
        ProviderId::Aws,
        role::PERSIST_FN,
        1,
    ));
    let mut orchestrator = orchestrator_with(dir.path(), vec![aws.clone()]);
    orchestrator.set_retry(RetryConfig {
        max_attempts: 3,
        initial_delay_ms: 1,
        max_delay_ms: 2,
        multiplier: 2.0,
        attempt_timeout_ms: 1000,
    });

    let assignment = ProviderAssignment::uniform(ProviderId::Aws);
    let plan = resolve(&assignment, &all_flags(), Scope::All, PlanAction::Deploy).unwrap();

    let result = orchestrator
        .execute(&plan, &ExecuteOptions::default())
        .await
        .unwrap();
    assert!(result.is_success(), "{:?}", result.failed);
    assert_eq!(result.completed.len(), plan.len());

    // 一過性の失敗 1 回分だけ呼び出しが多い
    let creates = aws.creates.load(Ordering::SeqCst);
    assert_eq!(aws.create_calls.load(Ordering::SeqCst), creates + 1);
}

#[tokio::test]
async fn test_second_destroy_is_clean_noop() {
    let dir = tempfile::tempdir().unwrap();
    let aws = Arc::new(MemoryProvisioner::new(ProviderId::Aws));
    let orchestrator = orchestrator_with(dir.path(), vec![aws.clone()]);

    let assignment = ProviderAssignment::uniform(ProviderId::Aws);
    let options = ExecuteOptions::default();

    let deploy = resolve(&assignment, &all_flags(), Scope::All, PlanAction::Deploy).unwrap();
    orchestrator.execute(&deploy, &options).await.unwrap();

    let destroy = resolve(&assignment, &all_flags(), Scope::All, PlanAction::Destroy).unwrap();
    orchestrator.execute(&destroy, &options).await.unwrap();
    assert_eq!(aws.resource_count(), 0);
    let destroyed = aws.destroys.load(Ordering::SeqCst);

    // 破棄済みのスタックをもう一度破棄しても no-op で成功する
    let again = orchestrator.execute(&destroy, &options).await.unwrap();
    assert!(again.is_success(), "{:?}", again.failed);
    assert_eq!(aws.destroys.load(Ordering::SeqCst), destroyed);
}

#[tokio::test]
async fn test_failed_step_halts_without_rollback() {
    let dir = tempfile::tempdir().unwrap();
    let aws = Arc::new(MemoryProvisioner::failing_on(
        ProviderId::Aws,
        role::PERSIST_FN,
    ));
    let orchestrator = orchestrator_with(dir.path(), vec![aws.clone()]);

    let assignment = ProviderAssignment::uniform(ProviderId::Aws);
    let plan = resolve(&assignment, &all_flags(), Scope::All, PlanAction::Deploy).unwrap();

    let result = orchestrator
        .execute(&plan, &ExecuteOptions::default())
        .await
        .unwrap();

    let failed = result.failed.expect("persist-fn で停止するはず");
    assert_eq!(failed.role, role::PERSIST_FN);
    // 先行ステップの成果物はそのまま残る
    assert_eq!(result.completed.len(), plan.position_of(role::PERSIST_FN).unwrap());
    assert_eq!(aws.resource_count(), result.completed.len());
}

#[tokio::test]
async fn test_bridge_pair_provisions_once_and_reuses_token() {
    let dir = tempfile::tempdir().unwrap();
    let aws = Arc::new(MemoryProvisioner::new(ProviderId::Aws));
    let azure = Arc::new(MemoryProvisioner::new(ProviderId::Azure));
    let orchestrator = orchestrator_with(dir.path(), vec![aws.clone(), azure.clone()]);

    let mut assignment = ProviderAssignment::uniform(ProviderId::Aws);
    assignment.set(LayerId::TwinModel, ProviderId::Azure);
    let plan = resolve(&assignment, &all_flags(), Scope::All, PlanAction::Deploy).unwrap();
    let options = ExecuteOptions::default();

    let result = orchestrator.execute(&plan, &options).await.unwrap();
    assert!(result.is_success(), "{:?}", result.failed);

    let registry = ConnectionRegistry::new(dir.path());
    let id = conn_id(BoundaryEdge::HotToTwin, ProviderId::Aws, ProviderId::Azure);
    let entry = registry.get(&id).await.unwrap().expect("接続エントリがあるはず");
    assert_eq!(entry.token.len(), 43);

    // 再デプロイはトークンをローテーションしない
    orchestrator.execute(&plan, &options).await.unwrap();
    let after = registry.get(&id).await.unwrap().unwrap();
    assert_eq!(after.token, entry.token);
    assert_eq!(after.url, entry.url);
}

#[tokio::test]
async fn test_destroy_tears_down_resources_and_bridges() {
    let dir = tempfile::tempdir().unwrap();
    let aws = Arc::new(MemoryProvisioner::new(ProviderId::Aws));
    let azure = Arc::new(MemoryProvisioner::new(ProviderId::Azure));
    let orchestrator = orchestrator_with(dir.path(), vec![aws.clone(), azure.clone()]);

    let mut assignment = ProviderAssignment::uniform(ProviderId::Aws);
    assignment.set(LayerId::TwinModel, ProviderId::Azure);
    let options = ExecuteOptions::default();

    let deploy = resolve(&assignment, &all_flags(), Scope::All, PlanAction::Deploy).unwrap();
    orchestrator.execute(&deploy, &options).await.unwrap();
    assert!(aws.resource_count() > 0);

    let destroy = resolve(&assignment, &all_flags(), Scope::All, PlanAction::Destroy).unwrap();
    let result = orchestrator.execute(&destroy, &options).await.unwrap();
    assert!(result.is_success(), "{:?}", result.failed);
    assert_eq!(aws.resource_count(), 0);
    assert_eq!(azure.resource_count(), 0);

    let registry = ConnectionRegistry::new(dir.path());
    let id = conn_id(BoundaryEdge::HotToTwin, ProviderId::Aws, ProviderId::Azure);
    assert!(registry.get(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_recreate_event_actions_redeploys_only() {
    let dir = tempfile::tempdir().unwrap();
    let aws = Arc::new(MemoryProvisioner::new(ProviderId::Aws));
    let orchestrator = orchestrator_with(dir.path(), vec![aws.clone()]);

    let assignment = ProviderAssignment::uniform(ProviderId::Aws);
    let flags = OptimizationFlags {
        event_checking: true,
        notification_workflow: true,
        device_feedback: false,
    };

    let result = orchestrator
        .recreate_event_actions(&assignment, &flags, &ExecuteOptions::default())
        .await
        .unwrap();
    assert!(result.is_success());

    // workflow + event-check の 2 ステップ。作成は一切起きない。
    assert_eq!(aws.redeploys.load(Ordering::SeqCst), 2);
    assert_eq!(aws.creates.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cancellation_stops_before_first_step() {
    let dir = tempfile::tempdir().unwrap();
    let aws = Arc::new(MemoryProvisioner::new(ProviderId::Aws));
    let orchestrator = orchestrator_with(dir.path(), vec![aws.clone()]);

    let assignment = ProviderAssignment::uniform(ProviderId::Aws);
    let plan = resolve(&assignment, &all_flags(), Scope::All, PlanAction::Deploy).unwrap();

    let options = ExecuteOptions::default();
    options.cancellation.cancel();

    let result = orchestrator.execute(&plan, &options).await.unwrap();
    assert!(result.cancelled);
    assert!(result.completed.is_empty());
    assert_eq!(aws.creates.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_validation_gate_blocks_create() {
    let dir = tempfile::tempdir().unwrap();
    let aws = Arc::new(MemoryProvisioner::new(ProviderId::Aws));
    let orchestrator = orchestrator_with(dir.path(), vec![aws.clone()]);

    // エントリポイントのないコードは検証で弾かれる
    let code_path = dir.path().join("persist.js");
    std::fs::write(&code_path, "const x = 1;\n").unwrap();

    let assignment = ProviderAssignment::uniform(ProviderId::Aws);
    let plan = resolve(&assignment, &all_flags(), Scope::All, PlanAction::Deploy).unwrap();
    let mut options = ExecuteOptions::default();
    options.sources.insert(role::PERSIST_FN.to_string(), code_path);

    let result = orchestrator.execute(&plan, &options).await.unwrap();
    let failed = result.failed.expect("検証で停止するはず");
    assert_eq!(failed.role, role::PERSIST_FN);
    assert!(failed.error.is_client_error());
    // 検証で弾かれたステップのリソースは作成されない
    let name = default_resource_name(&NameContext::new(
        "factory",
        LayerId::Compute,
        role::PERSIST_FN,
    ));
    assert!(!aws.existing.lock().unwrap().contains_key(&name));
}

#[tokio::test]
async fn test_invoke_passthrough_uses_deterministic_name() {
    let dir = tempfile::tempdir().unwrap();
    let aws = Arc::new(MemoryProvisioner::new(ProviderId::Aws));
    let orchestrator = orchestrator_with(dir.path(), vec![aws]);

    let response = orchestrator
        .invoke(
            ProviderId::Aws,
            LayerId::HotStorage,
            role::HOT_READER_FN,
            json!({ "deviceId": "dev-1" }),
            InvocationMode::Sync,
        )
        .await
        .unwrap();
    assert_eq!(
        response["function"],
        "factory-l3-hot-hot-reader-fn"
    );
}
