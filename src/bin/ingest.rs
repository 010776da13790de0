use anyhow::Result;
use clap::Parser;
use ragserve::bootstrap::{build_clients, connect_index};
use ragserve::ingest::{discover_files, ingest_paths, Ledger};
use ragserve::Config;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "ingest")]
#[command(about = "Index the documents folder into the vector store (incremental by default)")]
struct Args {
    /// Re-ingest every file, ignoring the processed-files ledger
    #[arg(short, long)]
    force: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let args = Args::parse();
    let config = Config::load()?;
    log::info!("Documents root: {}", config.data_root().display());
    log::info!("Ledger: {}", config.ledger_path().display());

    let (embedder, pinecone, _chat) = build_clients(&config)?;
    let index = connect_index(&config, &pinecone).await?;

    let mut ledger = if args.force {
        log::info!("Mode: full re-ingestion (ledger reset)");
        Ledger::new(config.ledger_path())
    } else {
        let ledger = Ledger::load(config.ledger_path());
        log::info!("Ledger holds {} processed file(s)", ledger.len());
        ledger
    };

    let files = discover_files(config.data_root())?;
    log::info!("Found {} eligible file(s)", files.len());
    if files.is_empty() {
        log::warn!("No files found. Check data.root in config.toml.");
        return Ok(());
    }

    let start = Instant::now();
    let report = ingest_paths(&files, &mut ledger, &embedder, &index, &config.chunking).await?;

    log::info!("=== Ingestion Complete ===");
    log::info!("Files processed: {}", report.files_processed);
    log::info!("Files failed: {}", report.files_failed);
    log::info!(
        "Files skipped (already indexed): {}",
        files
            .len()
            .saturating_sub(report.files_processed + report.files_failed)
    );
    log::info!("Chunks indexed: {}", report.chunks_indexed);
    log::info!("Time: {:?}", start.elapsed());

    if report.files_failed > 0 {
        log::warn!("Some files failed to ingest. Check logs above for details.");
    }

    Ok(())
}
