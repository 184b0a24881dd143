pub mod package;
pub mod push;
pub mod remove;
pub mod schema;
pub mod validate;

use batchflow::{BatchConfig, BatchPlugin, Capabilities, HookPoint, PhaseRun};
use batchflow_build::DockerEngine;
use batchflow_cloud_aws::AwsEcr;
use batchflow_config::ServiceDescription;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

/// CLI から与えられた上書き値
pub struct Overrides {
    pub stage: Option<String>,
    pub region: Option<String>,
}

/// サービス定義を読み込み、上書き値を適用する
///
/// 戻り値の PathBuf はサービス定義ファイルのあるディレクトリ。
pub fn load_project(overrides: &Overrides) -> anyhow::Result<(ServiceDescription, PathBuf)> {
    let path = batchflow_config::find_service_file()?;
    let description = batchflow_config::load_service_description(&path)?
        .with_stage(overrides.stage.as_deref())
        .with_region(overrides.region.as_deref());

    let service_dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => std::env::current_dir()?,
    };

    tracing::debug!(
        path = %path.display(),
        service = %description.service,
        stage = %description.provider.stage,
        "Loaded service description"
    );
    Ok((description, service_dir))
}

/// Docker と ECR に接続したケイパビリティを用意する
pub async fn connect(region: &str, with_docker: bool) -> anyhow::Result<Capabilities> {
    let ecr = Arc::new(AwsEcr::new(Some(region)).await);
    let engine: Arc<dyn batchflow_build::ContainerEngine> = if with_docker {
        let docker = crate::docker::init_docker_with_error_handling().await?;
        Arc::new(DockerEngine::new(docker).with_progress(true))
    } else {
        Arc::new(DockerEngine::new(bollard::Docker::connect_with_local_defaults()?))
    };

    Ok(Capabilities {
        engine,
        credentials: ecr.clone(),
        registry: ecr,
    })
}

/// 設定を検証する。失敗時はエラーを表示する
///
/// Docker や AWS に触れる前に呼ぶ。
pub fn validate_config(plugin: &mut BatchPlugin) -> anyhow::Result<BatchConfig> {
    match plugin.validate() {
        Ok(config) => Ok(config.clone()),
        Err(e) => {
            eprintln!("{}", "✗ 設定エラー".red().bold());
            eprintln!("  {}", e);
            Err(e.into())
        }
    }
}

/// フックを実行し、結果を表示する
pub async fn run_hook(plugin: &mut BatchPlugin, point: HookPoint) -> anyhow::Result<PhaseRun> {
    match plugin.run(point).await {
        Ok(run) => {
            for warning in &run.warnings {
                println!("  {} {}", "⚠".yellow(), warning.yellow());
            }
            println!("{} {}", "✓".green(), point.to_string().dimmed());
            Ok(run)
        }
        Err(e) => {
            eprintln!();
            eprintln!("{} {}", "✗".red().bold(), e.user_message().red());
            Err(e.into())
        }
    }
}
