//! Configuration management commands.

use anyhow::{bail, Result};

use super::{ConfigArgs, ConfigCommand};
use crate::config::generate_default_config;
use crate::context::Context;

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(ctx).await,
        ConfigCommand::Init { force } => init_config(force, ctx).await,
    }
}

async fn show_config(ctx: &Context) -> Result<()> {
    if ctx.output.is_json() {
        ctx.output.json(&ctx.config);
        return Ok(());
    }

    ctx.output.header("Current Configuration");
    match &ctx.config_path {
        Some(path) => ctx.output.kv("file", &path.display().to_string()),
        None => ctx.output.kv("file", "(defaults)"),
    }

    let provider = &ctx.config.provider;
    ctx.output.info("[provider]");
    ctx.output.kv("origin", provider.origin.as_deref().unwrap_or("(none)"));
    ctx.output.kv("ssr_mode", &provider.ssr_mode.to_string());
    ctx.output.kv("max_render_passes", &provider.max_render_passes.to_string());
    if let Some(options) = &provider.options {
        ctx.output.kv("options", &options.to_string());
    }

    Ok(())
}

async fn init_config(force: bool, ctx: &Context) -> Result<()> {
    let config_path = ctx.cwd.join("reqblock.toml");

    if config_path.exists() && !force {
        bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    std::fs::write(&config_path, generate_default_config())?;
    ctx.output
        .success(&format!("Created {}", config_path.display()));
    Ok(())
}
