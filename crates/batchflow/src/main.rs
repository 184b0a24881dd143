mod commands;
mod docker;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "batchflow")]
#[command(about = "Serverless サービスに AWS Batch ジョブを。", long_about = None)]
struct Cli {
    /// ステージ名 (serverless.yml の provider.stage を上書き)
    #[arg(short, long, env = "BATCHFLOW_STAGE", global = true)]
    stage: Option<String>,

    /// リージョン (serverless.yml の provider.region を上書き)
    #[arg(short, long, env = "AWS_REGION", global = true)]
    region: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// テンプレートを生成し、ジョブイメージをビルド
    Package {
        /// マージ元の CloudFormation テンプレート (JSON)
        #[arg(short, long)]
        template: Option<PathBuf>,
        /// 出力先
        #[arg(short, long, default_value = ".batchflow/cloudformation-template.json")]
        output: PathBuf,
        /// ビルドコンテキスト (デフォルトはサービス定義ファイルのディレクトリ)
        #[arg(short, long)]
        context: Option<PathBuf>,
        /// イメージのビルドをスキップ
        #[arg(long)]
        skip_build: bool,
    },
    /// ビルド済みのイメージを ECR に push
    Push {
        /// ビルドコンテキスト (デフォルトはサービス定義ファイルのディレクトリ)
        #[arg(short, long)]
        context: Option<PathBuf>,
    },
    /// ECR リポジトリのイメージを削除
    Remove,
    /// batch 設定を検証
    Validate,
    /// batch 設定のスキーマを表示
    Schema,
    /// バージョン情報を表示
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let overrides = commands::Overrides {
        stage: cli.stage,
        region: cli.region,
    };

    match cli.command {
        Commands::Package {
            template,
            output,
            context,
            skip_build,
        } => {
            commands::package::handle(
                &overrides,
                template.as_deref(),
                &output,
                context,
                skip_build,
            )
            .await
        }
        Commands::Push { context } => commands::push::handle(&overrides, context).await,
        Commands::Remove => commands::remove::handle(&overrides).await,
        Commands::Validate => commands::validate::handle(&overrides),
        Commands::Schema => commands::schema::handle(),
        Commands::Version => {
            println!("batchflow {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
