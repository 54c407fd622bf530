mod commands;
mod providers;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "twin")]
#[command(about = "マルチクラウドの IoT デジタルツインパイプラインを配置する。", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// パイプラインをデプロイ
    Deploy {
        /// 対象レイヤー (l1, l2, l3-hot, l3-cold, l3-archive, l4, l5)。省略時は全レイヤー
        layer: Option<String>,
        /// ロール名=コードファイル。指定した関数はデプロイ前に検証される（複数指定可）
        #[arg(long = "source", value_name = "ROLE=PATH")]
        sources: Vec<String>,
        /// 確認なしで実行
        #[arg(short, long)]
        yes: bool,
    },
    /// パイプラインを破棄
    Destroy {
        /// 対象レイヤー (l1, l2, l3-hot, l3-cold, l3-archive, l4, l5)。省略時は全レイヤー
        layer: Option<String>,
        /// 確認なしで実行
        #[arg(short, long)]
        yes: bool,
    },
    /// プランを表示（実行しない）
    Plan {
        /// 対象レイヤー。省略時は全レイヤー
        layer: Option<String>,
        /// 破棄プランを表示
        #[arg(long)]
        destroy: bool,
    },
    /// イベントアクション関数のみ再デプロイ
    RecreateEvents {
        /// 確認なしで実行
        #[arg(short, long)]
        yes: bool,
    },
    /// 関数を直接呼び出す（診断用）
    Invoke {
        /// 対象レイヤー (例: l3-hot)
        layer: String,
        /// ロール名 (例: hot-reader-fn)
        role: String,
        /// JSON ペイロード
        #[arg(long, default_value = "{}")]
        payload: String,
        /// 応答を待たずに起動だけ行う
        #[arg(long = "async")]
        fire_and_forget: bool,
    },
    /// ブリッジを再作成してトークンを回転する
    RotateBridge {
        /// 対象エッジ (ingest-compute, compute-hot, hot-cold, cold-archive, hot-twin, hot-dashboard)
        edge: String,
        /// 確認なしで実行
        #[arg(short, long)]
        yes: bool,
    },
    /// ユーザー提供コードをデプロイせずに検証
    Validate {
        /// ロール名=コードファイル（複数指定可）
        #[arg(long = "source", value_name = "ROLE=PATH", required = true)]
        sources: Vec<String>,
    },
    /// プロバイダー認証とブリッジ接続の状態を表示
    Status,
    /// バージョン表示
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    // Version は設定ファイル不要
    if matches!(cli.command, Commands::Version) {
        println!("twinflow {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config_path = match twinflow_config::find_twin_file() {
        Ok(path) => path,
        Err(twinflow_config::ConfigError::TwinFileNotFound) => {
            eprintln!("{}", "設定ファイル twin.kdl が見つかりません。".red());
            eprintln!();
            eprintln!("カレントディレクトリに twin.kdl を作成してください:");
            eprintln!();
            eprintln!("  project \"factory-twin\"");
            eprintln!();
            eprintln!("  providers {{");
            eprintln!("      ingestion \"aws\"");
            eprintln!("      compute \"aws\"");
            eprintln!("      hot-storage \"aws\"");
            eprintln!("      cold-storage \"aws\"");
            eprintln!("      archive-storage \"aws\"");
            eprintln!("  }}");
            return Err(anyhow::anyhow!("設定ファイルが見つかりません"));
        }
        Err(e) => return Err(e.into()),
    };
    let config = twinflow_config::load_project(&config_path)?;
    config.assignment.validate()?;

    // 接続レジストリは実行ディレクトリ配下の .twinflow/ に置く
    let project_root: PathBuf = std::env::current_dir()?;

    match cli.command {
        Commands::Deploy { layer, sources, yes } => {
            commands::deploy::handle(&config, &project_root, layer.as_deref(), &sources, yes)
                .await
        }
        Commands::Destroy { layer, yes } => {
            commands::destroy::handle(&config, &project_root, layer.as_deref(), yes).await
        }
        Commands::Plan { layer, destroy } => {
            commands::plan::handle(&config, layer.as_deref(), destroy)
        }
        Commands::RecreateEvents { yes } => {
            commands::recreate_events::handle(&config, &project_root, yes).await
        }
        Commands::Invoke {
            layer,
            role,
            payload,
            fire_and_forget,
        } => {
            commands::invoke::handle(
                &config,
                &project_root,
                &layer,
                &role,
                &payload,
                fire_and_forget,
            )
            .await
        }
        Commands::RotateBridge { edge, yes } => {
            commands::rotate_bridge::handle(&config, &project_root, &edge, yes).await
        }
        Commands::Validate { sources } => commands::validate::handle(&config, &sources).await,
        Commands::Status => commands::status::handle(&config, &project_root).await,
        Commands::Version => unreachable!(),
    }
}
