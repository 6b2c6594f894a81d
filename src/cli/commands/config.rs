use anyhow::{Context, Result};
use clap::Subcommand;

use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Write a default configuration file
    Init {
        #[arg(long, short = 'f', help = "Force overwrite existing config")]
        force: bool,
    },

    /// Show current configuration
    Show,

    /// Show configuration and ledger file paths
    Path,
}

pub async fn handle_config(cmd: ConfigCommand, format: OutputFormat, _verbose: bool) -> Result<()> {
    let formatter = get_formatter(format);

    match cmd {
        ConfigCommand::Init { force } => {
            let path = Config::config_path()
                .ok_or_else(|| anyhow::anyhow!("could not determine config directory"))?;

            if path.exists() && !force {
                anyhow::bail!(
                    "Config already exists at: {}\nUse --force to overwrite.",
                    path.display()
                );
            }

            Config::default()
                .save()
                .context("failed to write config file")?;
            println!(
                "{}",
                formatter.format_message(&format!("Created config at: {}", path.display()))
            );
        }

        ConfigCommand::Show => {
            let mut config = Config::load()?;
            if config.vector_store.api_key.is_some() {
                config.vector_store.api_key = Some("********".to_string());
            }

            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                if let Some(path) = Config::config_path() {
                    println!("# Config: {}", path.display());
                    println!();
                }
                print!("{}", toml::to_string_pretty(&config)?);
            }
        }

        ConfigCommand::Path => {
            let config = Config::load()?;
            if let Some(path) = Config::config_path() {
                println!("Config: {}", path.display());
            }
            if let Some(path) = config.ledger_path() {
                println!("Ledger: {}", path.display());
            }
        }
    }

    Ok(())
}
