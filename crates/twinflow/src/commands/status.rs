use crate::providers;
use colored::Colorize;
use std::path::Path;
use twinflow_config::ProjectConfig;
use twinflow_core::LayerId;
use twinflow_registry::ConnectionRegistry;

pub async fn handle(config: &ProjectConfig, project_root: &Path) -> anyhow::Result<()> {
    println!("プロジェクト: {}", config.name.cyan());
    println!();

    println!("{}", "レイヤー割当:".bold());
    for layer in LayerId::PIPELINE_ORDER {
        let provider = config.assignment.resolve(layer)?;
        let inherited = config.assignment.get(layer).is_none();
        if inherited {
            println!("  {} → {} {}", layer.short(), provider, "(継承)".dimmed());
        } else {
            println!("  {} → {}", layer.short(), provider);
        }
    }

    println!();
    println!("{}", "プロバイダー認証:".bold());
    for id in config.assignment.providers() {
        let provisioner = providers::build_provisioner(config, id);
        let status = provisioner.check_auth().await?;
        if status.authenticated {
            println!(
                "  {} {}: {}",
                "✓".green(),
                provisioner.display_name(),
                status.account_info.unwrap_or_default()
            );
        } else {
            println!(
                "  {} {}: {}",
                "✗".red(),
                provisioner.display_name(),
                status.error.unwrap_or_default()
            );
        }
    }

    let registry = ConnectionRegistry::new(project_root);
    let connections = registry.list().await?;
    println!();
    if connections.is_empty() {
        println!("{}", "ブリッジ接続: なし".dimmed());
    } else {
        println!("{}", format!("ブリッジ接続 ({} 本):", connections.len()).bold());
        for entry in &connections {
            println!(
                "  • {} ({} → {}) {}",
                entry.conn_id.cyan(),
                entry.source_provider,
                entry.target_provider,
                entry.created_at.format("%Y-%m-%d %H:%M").to_string().dimmed()
            );
        }
    }
    Ok(())
}
