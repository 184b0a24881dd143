use super::{Overrides, connect, load_project, run_hook, validate_config};
use batchflow::{BatchPlugin, HookPoint};
use batchflow_core::Template;
use colored::Colorize;
use std::path::{Path, PathBuf};

pub async fn handle(
    overrides: &Overrides,
    template: Option<&Path>,
    output: &Path,
    context: Option<PathBuf>,
    skip_build: bool,
) -> anyhow::Result<()> {
    let (description, service_dir) = load_project(overrides)?;
    let region = description.provider.region.clone();

    println!(
        "{} {} ({})",
        "パッケージ中:".blue(),
        description.service.cyan(),
        description.provider.stage.cyan()
    );

    let mut plugin = BatchPlugin::new(description, context.unwrap_or(service_dir))?;

    if let Some(path) = template {
        let content = std::fs::read_to_string(path)?;
        plugin = plugin.with_template(Template::from_json(&content)?);
        tracing::debug!(path = %path.display(), "Merging into existing template");
    }

    validate_config(&mut plugin)?;

    run_hook(&mut plugin, HookPoint::Initialize).await?;

    if skip_build {
        println!("  {}", "イメージのビルドをスキップしました".dimmed());
    } else {
        plugin = plugin.with_capabilities(connect(&region, true).await?);
        run_hook(&mut plugin, HookPoint::AfterArtifacts).await?;
    }

    run_hook(&mut plugin, HookPoint::BeforeCompile).await?;

    if let Some(tag) = plugin.image_tag() {
        println!("  イメージタグ: {}", tag.cyan());
    }

    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output, plugin.template().to_json_pretty())?;

    println!(
        "{} {}",
        "✓ テンプレートを書き出しました:".green().bold(),
        output.display().to_string().cyan()
    );
    Ok(())
}
