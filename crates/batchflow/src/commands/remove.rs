use super::{Overrides, connect, load_project, run_hook};
use batchflow::{BatchPlugin, HookPoint};
use colored::Colorize;

pub async fn handle(overrides: &Overrides) -> anyhow::Result<()> {
    let (description, service_dir) = load_project(overrides)?;
    let region = description.provider.region.clone();

    let mut plugin =
        BatchPlugin::new(description, service_dir)?.with_capabilities(connect(&region, false).await?);
    let repository = plugin.naming().ecr_repository_name();

    println!("{} {}", "リポジトリを削除準備中:".blue(), repository.cyan());

    let run = run_hook(&mut plugin, HookPoint::BeforeRemove).await?;
    if run.has_warnings() {
        println!(
            "{}",
            "⚠ イメージの削除に失敗しましたが、削除処理は続行できます".yellow()
        );
    } else {
        println!("{}", "✓ イメージを削除しました".green().bold());
    }
    Ok(())
}
