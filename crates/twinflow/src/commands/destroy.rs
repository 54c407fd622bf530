use crate::commands::{parse_scope, render_result};
use crate::providers;
use colored::Colorize;
use std::path::Path;
use twinflow_config::ProjectConfig;
use twinflow_core::{PlanAction, resolve};
use twinflow_orchestrator::ExecuteOptions;

pub async fn handle(
    config: &ProjectConfig,
    project_root: &Path,
    layer: Option<&str>,
    yes: bool,
) -> anyhow::Result<()> {
    let scope = parse_scope(layer)?;
    let plan = resolve(&config.assignment, &config.flags, scope, PlanAction::Destroy)?;

    println!("{}", "破棄プラン:".blue().bold());
    print!("{plan}");

    if plan.is_empty() {
        println!("{}", "実行するステップがありません。".yellow());
        return Ok(());
    }

    if !yes {
        println!();
        println!(
            "{}",
            "警告: リソースとその中のデータを完全に削除します。".yellow()
        );
        println!("実行するには --yes オプションを指定してください");
        return Ok(());
    }

    let orchestrator = providers::build_orchestrator(config, project_root);
    let options = ExecuteOptions::default();
    crate::commands::cancel_on_ctrl_c(options.cancellation.clone());

    println!();
    println!("{}", "破棄を開始します...".blue().bold());
    let result = orchestrator.execute(&plan, &options).await?;
    render_result(&result)
}
