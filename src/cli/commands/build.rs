//! Build command implementation.

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::atomic::Ordering;

use crate::cli::output::get_formatter;
use crate::error::{LedgerError, SourceError};
use crate::models::{Config, EMBEDDING_API_KEY_ENV, OutputFormat};
use crate::services::{
    ChunkSource, DirectorySource, HttpEmbeddingClient, PipelineDriver, ProgressLedger,
    create_backend,
};

#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Directory (or single file) of documents to ingest
    #[arg(required = true)]
    pub path: PathBuf,

    /// File patterns to exclude (can be specified multiple times)
    #[arg(long, short = 'e')]
    pub exclude: Vec<String>,

    /// Wipe recorded progress before building
    #[arg(long)]
    pub reset: bool,

    /// List chunks without embedding or storing anything
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn handle_build(args: BuildArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    config.validate()?;
    let formatter = get_formatter(format);

    let path = args.path.canonicalize().context("invalid path")?;

    let source = DirectorySource::new(&path, &config.indexing, &args.exclude);
    let chunks = match source.chunks() {
        Ok(chunks) => chunks,
        Err(SourceError::NoDocuments) => {
            println!(
                "{}",
                formatter.format_message("No markdown documents found.")
            );
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if verbose {
        println!("Found {} chunks to process", chunks.len());
    }

    if args.dry_run {
        println!(
            "{}",
            formatter.format_message(&format!("Dry run: would embed {} chunks", chunks.len()))
        );
        for chunk in &chunks {
            let section = chunk.source.section.as_deref().unwrap_or("-");
            println!("  {}  {}  [{}]", chunk.id, chunk.source.filename, section);
        }
        return Ok(());
    }

    let api_key = std::env::var(EMBEDDING_API_KEY_ENV).ok();
    if api_key.is_none() && verbose {
        eprintln!(
            "Warning: {} is not set; embedding requests will be unauthenticated",
            EMBEDDING_API_KEY_ENV
        );
    }

    let service = HttpEmbeddingClient::new(&config.embedding, api_key)?;
    let store = create_backend(&config.vector_store, u64::from(config.embedding.dimension))?;
    store.create_collection().await?;

    let ledger_path = config.ledger_path().ok_or(LedgerError::NoPath)?;
    let mut ledger = ProgressLedger::open(&ledger_path)?;
    if args.reset {
        ledger.reset()?;
        if verbose {
            println!("Progress ledger reset.");
        }
    }

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} batches ({eta})",
            )
            .unwrap()
            .progress_chars("#>-"),
    );

    let report = {
        let driver = PipelineDriver::new(&service, store.as_ref(), &mut ledger, &config.pipeline);

        let cancel = driver.cancel_handle();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nStopping after the current batch...");
                cancel.store(true, Ordering::Relaxed);
            }
        });

        let bar = pb.clone();
        let mut driver = driver.with_progress(move |done, total| {
            bar.set_length(total as u64);
            bar.set_position(done as u64);
        });
        driver.build(chunks).await?
    };

    pb.finish_and_clear();
    print!("{}", formatter.format_build_report(&report));

    Ok(())
}
