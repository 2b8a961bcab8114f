use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use pageflow_core::{config_schema_json, load_config, write_schema_file, Config};

#[derive(Subcommand)]
pub enum ConfigCmd {
    /// Print the configuration JSON schema
    Schema {
        /// Write the schema to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Validate a config file and print the effective settings (JSON)
    Check {
        /// Path to a TOML config file
        path: PathBuf,
    },
}

pub fn run(cmd: ConfigCmd) -> Result<()> {
    match cmd {
        ConfigCmd::Schema { out: Some(path) } => {
            write_schema_file(path_str(&path)?)
                .with_context(|| format!("writing schema to {}", path.display()))?;
            tracing::info!(path = %path.display(), "config schema written");
            Ok(())
        }
        ConfigCmd::Schema { out: None } => {
            println!("{}", serde_json::to_string_pretty(&config_schema_json())?);
            Ok(())
        }
        ConfigCmd::Check { path } => {
            let cfg = load_effective(&path)?;
            println!("{}", serde_json::to_string_pretty(&cfg)?);
            Ok(())
        }
    }
}

/// Load `path` and apply `PAGEFLOW_*` env overrides to the driver section.
pub fn load_effective(path: &Path) -> Result<Config> {
    let mut cfg = load_config(path_str(path)?)
        .with_context(|| format!("loading config {}", path.display()))?;
    cfg.driver = cfg.driver.with_env_overrides();
    Ok(cfg)
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .with_context(|| format!("path is not valid UTF-8: {}", path.display()))
}
