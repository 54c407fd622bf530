pub mod deploy;
pub mod destroy;
pub mod invoke;
pub mod plan;
pub mod recreate_events;
pub mod rotate_bridge;
pub mod status;
pub mod validate;

use colored::Colorize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use twinflow_core::{LayerId, Scope, StepAction};
use twinflow_orchestrator::{CancellationFlag, RunResult};

/// Ctrl-C で協調取消を要求する。実行中のステップは中断しない。
pub fn cancel_on_ctrl_c(flag: CancellationFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!();
            eprintln!("中断要求を受け付けました。現在のステップ完了後に停止します...");
            flag.cancel();
        }
    });
}

/// deploy / destroy / plan で共通のレイヤー引数解釈
pub fn parse_scope(layer: Option<&str>) -> anyhow::Result<Scope> {
    match layer {
        None => Ok(Scope::All),
        Some(value) => {
            let layer: LayerId = value.parse()?;
            Ok(Scope::Layer(layer))
        }
    }
}

/// `--source ROLE=PATH` 引数の解釈
pub fn parse_sources(entries: &[String]) -> anyhow::Result<BTreeMap<String, PathBuf>> {
    let mut sources = BTreeMap::new();
    for entry in entries {
        let (role, path) = entry.split_once('=').ok_or_else(|| {
            anyhow::anyhow!("--source は ROLE=PATH 形式で指定してください: {entry}")
        })?;
        sources.insert(role.to_string(), PathBuf::from(path));
    }
    Ok(sources)
}

/// 実行結果の表示。失敗時はエラー種別を区別して返す。
pub fn render_result(result: &RunResult) -> anyhow::Result<()> {
    for outcome in &result.completed {
        let marker = match (outcome.action, outcome.mutated) {
            (StepAction::Create, true) => "✓ 作成".green(),
            (StepAction::Create, false) => "- 既存".dimmed(),
            (StepAction::Destroy, _) => "✓ 破棄".green(),
            (StepAction::Redeploy, _) => "✓ 再デプロイ".green(),
        };
        println!("  {} {}", marker, outcome.name);
    }

    if result.cancelled {
        println!();
        println!("{}", "取消されました。適用済みのステップはそのまま残ります。".yellow());
        return Ok(());
    }

    if let Some(failed) = &result.failed {
        eprintln!();
        if failed.error.is_client_error() {
            eprintln!(
                "{} {}",
                "✗ 入力エラー:".red().bold(),
                failed.role.as_str().red()
            );
            eprintln!("  {}", failed.error);
            eprintln!("  設定・コードを修正してから再実行してください。");
        } else {
            eprintln!(
                "{} {}",
                "✗ プロバイダーエラー:".yellow().bold(),
                failed.role.as_str().yellow()
            );
            eprintln!("  {}", failed.error);
            eprintln!("  適用済みのステップは残っています。再実行で続きから適用されます。");
        }
        return Err(anyhow::anyhow!("ステップ {} で停止しました", failed.role));
    }

    println!();
    println!(
        "{} ({} ステップ, 変更 {})",
        "✓ 完了".green().bold(),
        result.completed.len(),
        result.mutation_count()
    );
    Ok(())
}
