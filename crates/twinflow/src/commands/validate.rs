use crate::commands::parse_sources;
use colored::Colorize;
use twinflow_cloud::{CloudError, validate_code};
use twinflow_config::ProjectConfig;
use twinflow_core::{PlanAction, Scope, resolve};

/// デプロイせずにユーザー提供コードを検証する
///
/// ロールの実行先プロバイダーはプランから引く。全違反を表示してから
/// まとめて失敗する。
pub async fn handle(config: &ProjectConfig, sources: &[String]) -> anyhow::Result<()> {
    let sources = parse_sources(sources)?;
    let plan = resolve(
        &config.assignment,
        &config.flags,
        Scope::All,
        PlanAction::Deploy,
    )?;

    let mut failures = 0usize;
    for (role, path) in &sources {
        let Some(step) = plan.steps.iter().find(|s| &s.role == role) else {
            println!("{} {role}: このプランに存在しないロールです", "✗".red());
            failures += 1;
            continue;
        };
        if !step.kind.is_function() {
            println!("{} {role}: 関数リソースではありません", "✗".red());
            failures += 1;
            continue;
        }

        let code = tokio::fs::read_to_string(path).await?;
        match validate_code(step.provider, &code) {
            Ok(()) => {
                println!("{} {role} ({})", "✓".green(), step.provider);
            }
            Err(CloudError::Validation(violations)) => {
                println!("{} {role} ({})", "✗".red(), step.provider);
                for violation in &violations {
                    println!("    {violation}");
                }
                failures += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} 件の検証に失敗しました");
    }
    println!();
    println!("{}", "すべての検証を通過しました。".green());
    Ok(())
}
