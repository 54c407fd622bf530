//! 設定からプロビジョナーとオーケストレーターを組み立てる

use std::path::Path;
use std::sync::Arc;
use twinflow_cloud::Provisioner;
use twinflow_cloud_aws::AwsProvisioner;
use twinflow_cloud_azure::AzureProvisioner;
use twinflow_cloud_gcp::GcpProvisioner;
use twinflow_config::ProjectConfig;
use twinflow_core::ProviderId;
use twinflow_orchestrator::Orchestrator;
use twinflow_registry::ConnectionRegistry;

/// プロバイダー ID に対応するプロビジョナーを構築
pub fn build_provisioner(config: &ProjectConfig, id: ProviderId) -> Arc<dyn Provisioner> {
    match id {
        ProviderId::Aws => Arc::new(AwsProvisioner::new(
            &config.aws.region,
            config.aws.profile.clone(),
        )),
        ProviderId::Azure => Arc::new(AzureProvisioner::new(
            &config.azure.resource_group,
            &config.azure.storage_account,
            &config.azure.location,
            config.azure.subscription.clone(),
        )),
        ProviderId::Gcp => Arc::new(GcpProvisioner::new(
            &config.gcp.project,
            &config.gcp.region,
        )),
    }
}

/// 割当で使われているプロバイダーを登録済みのオーケストレーターを構築
pub fn build_orchestrator(config: &ProjectConfig, project_root: &Path) -> Orchestrator {
    let registry = ConnectionRegistry::new(project_root);
    let mut orchestrator = Orchestrator::new(&config.name, registry);
    for id in config.assignment.providers() {
        orchestrator.register_provider(build_provisioner(config, id));
    }
    orchestrator
}
