use anyhow::Result;

use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};
use crate::services::{ProgressLedger, create_backend};

pub async fn handle_clear(force: bool, format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    if verbose {
        println!("Clearing collection and progress ledger...");
    }

    if !force {
        println!(
            "This will delete ALL vectors in '{}' and the recorded progress. Continue? [y/N]",
            config.vector_store.collection
        );
        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("{}", formatter.format_message("Cancelled."));
            return Ok(());
        }
    }

    let store = create_backend(&config.vector_store, u64::from(config.embedding.dimension))?;
    store.clear_collection().await?;

    if let Some(path) = config.ledger_path()
        && path.exists()
    {
        let mut ledger = ProgressLedger::open(&path)?;
        ledger.reset()?;
    }

    println!(
        "{}",
        formatter.format_message("Cleared collection and progress ledger.")
    );

    Ok(())
}
