use crate::commands::render_result;
use crate::providers;
use colored::Colorize;
use std::path::Path;
use twinflow_config::ProjectConfig;
use twinflow_orchestrator::ExecuteOptions;

pub async fn handle(config: &ProjectConfig, project_root: &Path, yes: bool) -> anyhow::Result<()> {
    if !config.flags.event_checking {
        println!(
            "{}",
            "event-checking が無効のため、再デプロイ対象がありません。".yellow()
        );
        return Ok(());
    }

    if !yes {
        println!("イベントアクション関数（計算レイヤーのみ）を再デプロイします。");
        println!("ストレージ・取込レイヤーには触れません。");
        println!();
        println!("実行するには --yes オプションを指定してください");
        return Ok(());
    }

    println!("{}", "イベントアクション関数を再デプロイします...".blue().bold());
    let orchestrator = providers::build_orchestrator(config, project_root);
    let result = orchestrator
        .recreate_event_actions(&config.assignment, &config.flags, &ExecuteOptions::default())
        .await?;
    render_result(&result)
}
