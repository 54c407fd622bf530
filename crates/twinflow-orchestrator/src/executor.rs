//! プラン実行器
//!
//! リゾルバが生成した [`DeploymentPlan`] をステップ順に逐次実行する。
//! 各ステップの実行前に取消フラグを確認する。

use crate::context::{RunContext, env_key_for};
use crate::error::{OrchestratorError, Result};
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use twinflow_bridge::BridgeManager;
use twinflow_cloud::{
    InvocationMode, NameContext, Provisioner, ResourceSpec, RetryConfig, validator,
};
use twinflow_core::{
    BoundaryEdge, DeploymentPlan, LayerId, OptimizationFlags, PlanAction, ProviderAssignment,
    ProviderId, ResourceKind, Scope, Step, StepAction, StepGroup,
};
use twinflow_registry::ConnectionRegistry;

/// ステップ間で確認される協調取消フラグ
///
/// 実行中のステップは中断しない。取消後の状態は通常の部分適用と同じ。
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// 実行オプション
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// ロール名 → ユーザー提供コードファイル。
    /// 指定された関数ステップは作成前に検証ゲートを通る。
    pub sources: BTreeMap<String, PathBuf>,

    /// ロール名 → リソース設定の上書き
    pub configs: BTreeMap<String, serde_json::Value>,

    pub cancellation: CancellationFlag,
}

/// 完了したステップの記録
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub role: String,
    pub name: String,
    pub action: StepAction,

    /// false は存在チェックによる no-op
    pub mutated: bool,
}

/// 実行を停止させたステップ
#[derive(Debug)]
pub struct FailedStep {
    pub role: String,
    pub error: OrchestratorError,
}

/// 1 回の実行の結果。失敗時もロールバックは行わない。
#[derive(Debug, Default)]
pub struct RunResult {
    pub completed: Vec<StepOutcome>,
    pub failed: Option<FailedStep>,
    pub cancelled: bool,
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        self.failed.is_none() && !self.cancelled
    }

    /// 実際にクラウドを変更したステップ数
    pub fn mutation_count(&self) -> usize {
        self.completed.iter().filter(|o| o.mutated).count()
    }
}

/// プラン実行器
///
/// プロバイダーごとのプロビジョナーと接続レジストリを束ね、プランを
/// 逐次適用する。プラン自体は保持しない（毎回リゾルバから受け取る）。
pub struct Orchestrator {
    project: String,
    providers: BTreeMap<ProviderId, Arc<dyn Provisioner>>,
    registry: ConnectionRegistry,
    bridge: BridgeManager,
    retry: RetryConfig,
}

impl Orchestrator {
    pub fn new(project: impl Into<String>, registry: ConnectionRegistry) -> Self {
        let project = project.into();
        Self {
            bridge: BridgeManager::new(&project),
            project,
            providers: BTreeMap::new(),
            registry,
            retry: RetryConfig::default(),
        }
    }

    pub fn register_provider(&mut self, provisioner: Arc<dyn Provisioner>) -> &mut Self {
        self.providers.insert(provisioner.provider_id(), provisioner);
        self
    }

    pub fn set_retry(&mut self, retry: RetryConfig) -> &mut Self {
        self.retry = retry;
        self
    }

    /// 一過性エラーだけを有限回リトライする。設定・ドリフト等の
    /// クライアントエラーは即座に返す。
    async fn retrying<T, F, Fut>(&self, operation: F) -> twinflow_cloud::Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = twinflow_cloud::Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Err(e) if e.is_retryable() && attempt + 1 < self.retry.max_attempts => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        error = %e,
                        "一過性エラーのため再試行します"
                    );
                    tokio::time::sleep(self.retry.delay(attempt)).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    pub fn provider(&self, id: ProviderId) -> Result<&Arc<dyn Provisioner>> {
        self.providers
            .get(&id)
            .ok_or(OrchestratorError::ProviderNotRegistered(id))
    }

    /// プランを逐次実行する
    ///
    /// 失敗したステップで停止し、完了分を [`RunResult`] に残す。
    pub async fn execute(
        &self,
        plan: &DeploymentPlan,
        options: &ExecuteOptions,
    ) -> Result<RunResult> {
        tracing::info!(
            action = %plan.action,
            scope = %plan.scope,
            steps = plan.len(),
            "プランを実行します"
        );

        let mut result = RunResult::default();
        let mut context = RunContext::new();
        let mut handled_edges: HashSet<BoundaryEdge> = HashSet::new();

        for step in &plan.steps {
            if options.cancellation.is_cancelled() {
                tracing::warn!("取消要求を受けたため実行を停止します");
                result.cancelled = true;
                return Ok(result);
            }

            tracing::info!("{}", step.describe());
            let outcome = if step.group == StepGroup::Bridge {
                self.run_bridge_step(plan, step, &mut handled_edges).await
            } else {
                self.run_step(step, &mut context, options).await
            };

            match outcome {
                Ok(outcome) => result.completed.push(outcome),
                Err(error) => {
                    tracing::error!(role = %step.role, %error, "ステップが失敗しました");
                    result.failed = Some(FailedStep {
                        role: step.role.clone(),
                        error,
                    });
                    return Ok(result);
                }
            }
        }

        tracing::info!(
            completed = result.completed.len(),
            mutations = result.mutation_count(),
            "プランの実行が完了しました"
        );
        Ok(result)
    }

    /// イベントアクション群の再作成（サブプランの解決と実行）
    pub async fn recreate_event_actions(
        &self,
        assignment: &ProviderAssignment,
        flags: &OptimizationFlags,
        options: &ExecuteOptions,
    ) -> Result<RunResult> {
        let plan = twinflow_core::resolve(
            assignment,
            flags,
            Scope::EventActions,
            PlanAction::Redeploy,
        )?;
        self.execute(&plan, options).await
    }

    /// ブリッジの明示的な再作成。トークンが回転する唯一の経路。
    pub async fn recreate_bridge(
        &self,
        assignment: &ProviderAssignment,
        edge: BoundaryEdge,
    ) -> Result<twinflow_registry::ConnectionEntry> {
        let src = assignment.resolve(edge.source())?;
        let dst = assignment.resolve(edge.target())?;
        if src == dst {
            return Err(OrchestratorError::NoBridgeOnEdge(edge));
        }
        let source = self.provider(src)?.clone();
        let target = self.provider(dst)?.clone();

        // 回転中の並行変更を防ぐ。通常の deploy はロックを取らない。
        let lock = self.registry.acquire_lock().await?;
        let outcome = self
            .bridge
            .recreate(edge, source.as_ref(), target.as_ref(), &self.registry)
            .await;
        lock.release().await?;
        Ok(outcome?)
    }

    /// 関数の直接呼び出し（診断用パススルー）
    pub async fn invoke(
        &self,
        provider: ProviderId,
        layer: LayerId,
        role: &str,
        payload: serde_json::Value,
        mode: InvocationMode,
    ) -> Result<serde_json::Value> {
        let provisioner = self.provider(provider)?;
        let name = provisioner.resource_name(&NameContext::new(&self.project, layer, role));
        Ok(provisioner.invoke_function(&name, payload, mode).await?)
    }

    async fn run_step(
        &self,
        step: &Step,
        context: &mut RunContext,
        options: &ExecuteOptions,
    ) -> Result<StepOutcome> {
        let provisioner = self.provider(step.provider)?;
        let name = provisioner.resource_name(&NameContext::new(
            &self.project,
            step.layer,
            &step.role,
        ));

        match step.action {
            StepAction::Create => {
                let spec = self.spec_for_step(step, &name, context, options)?;
                self.validate_step(step, &spec, options).await?;
                let handle = self.retrying(|| provisioner.create(&spec)).await?;
                let mutated = handle.created;
                context.insert(&step.role, handle);
                Ok(StepOutcome {
                    role: step.role.clone(),
                    name,
                    action: step.action,
                    mutated,
                })
            }
            StepAction::Destroy => {
                self.retrying(|| provisioner.destroy(step.kind, &name))
                    .await?;
                Ok(StepOutcome {
                    role: step.role.clone(),
                    name,
                    action: step.action,
                    mutated: true,
                })
            }
            StepAction::Redeploy => {
                let spec = self.spec_for_step(step, &name, context, options)?;
                self.validate_step(step, &spec, options).await?;
                self.retrying(|| provisioner.redeploy_function(&name, &spec))
                    .await?;
                Ok(StepOutcome {
                    role: step.role.clone(),
                    name,
                    action: step.action,
                    mutated: true,
                })
            }
        }
    }

    /// ブリッジはエッジ単位でペア処理する。ペアの後半ステップは no-op。
    async fn run_bridge_step(
        &self,
        plan: &DeploymentPlan,
        step: &Step,
        handled_edges: &mut HashSet<BoundaryEdge>,
    ) -> Result<StepOutcome> {
        let edge = step
            .edge
            .ok_or_else(|| OrchestratorError::MissingDependency {
                role: step.role.clone(),
            })?;

        if handled_edges.contains(&edge) {
            return Ok(StepOutcome {
                role: step.role.clone(),
                name: step.role.clone(),
                action: step.action,
                mutated: false,
            });
        }
        handled_edges.insert(edge);

        // ペアのもう片方のステップから両側のプロバイダーを引く
        let ingress_provider = plan
            .steps
            .iter()
            .find(|s| s.edge == Some(edge) && BridgeManager::is_ingress_role(edge, &s.role))
            .map(|s| s.provider)
            .ok_or_else(|| OrchestratorError::MissingDependency {
                role: step.role.clone(),
            })?;
        let egress_provider = plan
            .steps
            .iter()
            .find(|s| s.edge == Some(edge) && !BridgeManager::is_ingress_role(edge, &s.role))
            .map(|s| s.provider)
            .ok_or_else(|| OrchestratorError::MissingDependency {
                role: step.role.clone(),
            })?;

        let source = self.provider(egress_provider)?.clone();
        let target = self.provider(ingress_provider)?.clone();

        match step.action {
            StepAction::Create => {
                self.bridge
                    .provision(edge, source.as_ref(), target.as_ref(), &self.registry)
                    .await?;
            }
            StepAction::Destroy => {
                self.bridge
                    .teardown(edge, source.as_ref(), target.as_ref(), &self.registry)
                    .await?;
            }
            StepAction::Redeploy => {
                self.bridge
                    .recreate(edge, source.as_ref(), target.as_ref(), &self.registry)
                    .await?;
            }
        }

        Ok(StepOutcome {
            role: step.role.clone(),
            name: step.role.clone(),
            action: step.action,
            mutated: true,
        })
    }

    /// ステップからリソース仕様を組み立てる
    ///
    /// 先行ステップのハンドル参照を慣習キーで環境変数に注入する。
    fn spec_for_step(
        &self,
        step: &Step,
        name: &str,
        context: &RunContext,
        options: &ExecuteOptions,
    ) -> Result<ResourceSpec> {
        let mut spec = ResourceSpec::new(step.kind, &step.role, step.layer, step.provider, name);

        if let Some(config) = options.configs.get(&step.role) {
            spec = spec.with_config(config.clone());
        } else if let Some(default) = default_config(step.kind) {
            spec = spec.with_config(default);
        }

        for dep_role in &step.depends_on {
            let handle = context.get(dep_role).ok_or_else(|| {
                OrchestratorError::MissingDependency {
                    role: dep_role.clone(),
                }
            })?;
            let key = env_key_for(dep_role, handle.kind);
            spec = spec.with_env(key, RunContext::reference(handle));
        }

        Ok(spec)
    }

    /// 作成・再デプロイ前の検証ゲート
    ///
    /// ユーザー入力を消費するステップのみ対象。違反は集約されて
    /// 1 つのエラーで返り、ステップは実行されない。
    async fn validate_step(
        &self,
        step: &Step,
        spec: &ResourceSpec,
        options: &ExecuteOptions,
    ) -> Result<()> {
        if let Some(kind) = config_schema(step.kind) {
            if !spec.config.is_null() {
                validator::validate_config(kind, &spec.config)?;
            }
        }

        if step.kind.is_function() {
            if let Some(path) = options.sources.get(&step.role) {
                let code = tokio::fs::read_to_string(path).await?;
                validator::validate_code(step.provider, &code)?;
            }
        }

        Ok(())
    }
}

/// 検証スキーマの選択（対象外の種別は None）
fn config_schema(kind: ResourceKind) -> Option<&'static str> {
    match kind {
        k if k.is_function() => Some("function"),
        ResourceKind::HotTable => Some("table"),
        ResourceKind::NotificationWorkflow => Some("workflow"),
        _ => None,
    }
}

/// ユーザーが設定を与えない場合の既定設定
fn default_config(kind: ResourceKind) -> Option<serde_json::Value> {
    match kind {
        k if k.is_function() => Some(json!({
            "handler": "index.handler",
            "runtime": "nodejs20.x",
        })),
        ResourceKind::HotTable => Some(json!({ "partition-key": "deviceId" })),
        ResourceKind::NotificationWorkflow => Some(json!({ "states": {} })),
        _ => None,
    }
}
