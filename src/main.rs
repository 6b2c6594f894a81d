use anyhow::Result;
use clap::Parser;

use kbase::cli::commands::{handle_build, handle_clear, handle_config, handle_status};
use kbase::cli::{Cli, Commands};

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let format = cli.format.unwrap_or_default();
    let verbose = cli.verbose;

    match cli.command {
        Commands::Build(args) => {
            handle_build(args, format, verbose).await?;
        }
        Commands::Status => {
            handle_status(format, verbose).await?;
        }
        Commands::Config(cmd) => {
            handle_config(cmd, format, verbose).await?;
        }
        Commands::Clear { force } => {
            handle_clear(force, format, verbose).await?;
        }
    }

    Ok(())
}
