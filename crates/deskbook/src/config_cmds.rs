use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use deskbook_config::DeskbookConfig;

use crate::app::load_config;
use crate::cli::OutputFormat;

fn target_path(config_path: Option<&Path>) -> Result<PathBuf> {
    match config_path {
        Some(path) => Ok(path.to_path_buf()),
        None => DeskbookConfig::config_path()
            .context("Cannot determine config directory; pass --config"),
    }
}

pub(crate) fn handle_config_init(config_path: Option<&Path>, force: bool) -> Result<()> {
    let path = target_path(config_path)?;
    if force && path.exists() {
        std::fs::remove_file(&path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
    }
    if DeskbookConfig::write_template(&path)? {
        eprintln!("Wrote config template to: {}", path.display());
    } else {
        eprintln!(
            "Config already exists at {} (use --force to overwrite)",
            path.display()
        );
    }
    Ok(())
}

pub(crate) fn handle_config_show(config_path: Option<&Path>, format: OutputFormat) -> Result<()> {
    let config = load_config(config_path)?;
    match format {
        OutputFormat::Json => {
            let json_str = serde_json::to_string_pretty(&config)?;
            println!("{}", json_str);
        }
        OutputFormat::Text => {
            let toml_str = toml::to_string_pretty(&config)?;
            print!("{}", toml_str);
        }
    }
    Ok(())
}
