use super::{Overrides, connect, load_project, run_hook, validate_config};
use batchflow::{BatchPlugin, HookPoint};
use colored::Colorize;
use std::path::PathBuf;

pub async fn handle(overrides: &Overrides, context: Option<PathBuf>) -> anyhow::Result<()> {
    let (description, service_dir) = load_project(overrides)?;
    let region = description.provider.region.clone();

    let mut plugin = BatchPlugin::new(description, context.unwrap_or(service_dir))?;
    validate_config(&mut plugin)?;
    plugin = plugin.with_capabilities(connect(&region, true).await?);

    run_hook(&mut plugin, HookPoint::AfterStackUpdate).await?;

    if let Some(reference) = plugin.image_reference() {
        println!(
            "{} {}",
            "✓ イメージを push しました:".green().bold(),
            reference.to_string().cyan()
        );
    }
    Ok(())
}
