use crate::providers;
use colored::Colorize;
use std::path::Path;
use twinflow_cloud::InvocationMode;
use twinflow_config::ProjectConfig;
use twinflow_core::LayerId;

pub async fn handle(
    config: &ProjectConfig,
    project_root: &Path,
    layer: &str,
    role: &str,
    payload: &str,
    fire_and_forget: bool,
) -> anyhow::Result<()> {
    let layer: LayerId = layer.parse()?;
    let provider = config.assignment.resolve(layer)?;
    let payload: serde_json::Value = serde_json::from_str(payload)
        .map_err(|e| anyhow::anyhow!("ペイロードが JSON ではありません: {e}"))?;
    let mode = if fire_and_forget {
        InvocationMode::Async
    } else {
        InvocationMode::Sync
    };

    let orchestrator = providers::build_orchestrator(config, project_root);
    println!(
        "{} {} @ {} ({})",
        "呼び出し:".blue().bold(),
        role.cyan(),
        layer.short(),
        provider
    );

    let response = orchestrator
        .invoke(provider, layer, role, payload, mode)
        .await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
