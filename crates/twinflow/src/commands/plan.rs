use crate::commands::parse_scope;
use colored::Colorize;
use twinflow_config::ProjectConfig;
use twinflow_core::{PlanAction, resolve};

pub fn handle(config: &ProjectConfig, layer: Option<&str>, destroy: bool) -> anyhow::Result<()> {
    let scope = parse_scope(layer)?;
    let action = if destroy {
        PlanAction::Destroy
    } else {
        PlanAction::Deploy
    };
    let plan = resolve(&config.assignment, &config.flags, scope, action)?;

    println!("プロジェクト: {}", config.name.cyan());
    print!("{plan}");

    let bridges = plan
        .steps
        .iter()
        .filter_map(|s| s.edge)
        .collect::<std::collections::HashSet<_>>();
    if !bridges.is_empty() {
        println!();
        println!("クラウド間ブリッジ ({} 本):", bridges.len());
        for edge in &bridges {
            println!("  • {edge}");
        }
    }
    Ok(())
}
