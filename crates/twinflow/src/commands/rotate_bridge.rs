use crate::providers;
use colored::Colorize;
use std::path::Path;
use twinflow_config::ProjectConfig;
use twinflow_core::BoundaryEdge;

pub async fn handle(
    config: &ProjectConfig,
    project_root: &Path,
    edge: &str,
    yes: bool,
) -> anyhow::Result<()> {
    let edge = BoundaryEdge::EDGES
        .into_iter()
        .find(|e| e.id() == edge)
        .ok_or_else(|| anyhow::anyhow!("不明なエッジです: {edge}"))?;

    if !yes {
        println!("ブリッジ {} を破棄して作り直し、トークンを回転します。", edge);
        println!("送信側の再デプロイが完了するまで、このエッジのイベントは失敗します。");
        println!();
        println!("実行するには --yes オプションを指定してください");
        return Ok(());
    }

    println!("{}", format!("ブリッジ {edge} を再作成します...").blue().bold());
    let orchestrator = providers::build_orchestrator(config, project_root);
    let entry = orchestrator
        .recreate_bridge(&config.assignment, edge)
        .await?;
    println!(
        "{} {} ({} → {})",
        "✓ 再作成しました:".green().bold(),
        entry.conn_id.cyan(),
        entry.source_provider,
        entry.target_provider
    );
    Ok(())
}
