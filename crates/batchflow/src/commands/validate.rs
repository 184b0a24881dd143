use super::{Overrides, load_project, validate_config};
use batchflow::BatchPlugin;
use colored::Colorize;

pub fn handle(overrides: &Overrides) -> anyhow::Result<()> {
    println!("{}", "設定を検証中...".blue());

    let (description, service_dir) = load_project(overrides)?;
    let mut plugin = BatchPlugin::new(description, service_dir)?;

    let config = validate_config(&mut plugin)?;

    let naming = plugin.naming();
    println!("{}", "✓ 設定ファイルは正常です！".green().bold());
    println!();
    println!("サマリー:");
    println!("  サービス: {}", naming.service().cyan());
    println!("  ステージ: {}", naming.stage().cyan());
    println!("  コンピュート環境: {}", config.provider.compute_type().as_str());
    println!(
        "  vCPU: {} - {}",
        config.provider.min_vcpus(),
        config.provider.max_vcpus()
    );
    println!("  ジョブキュー: {}", naming.job_queue_name().cyan());
    println!("  ECRリポジトリ: {}", naming.ecr_repository_name().cyan());
    println!("  ジョブ定義: {}個", config.tasks.len());
    for task in &config.tasks {
        println!(
            "    - {} ({})",
            naming.job_definition_name(&task.name).cyan(),
            task.handler
        );
    }
    Ok(())
}
