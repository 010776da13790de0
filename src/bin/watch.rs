use anyhow::Result;
use clap::Parser;
use ragserve::bootstrap::{build_clients, connect_index};
use ragserve::ingest::Ledger;
use ragserve::watch::{run_scan_loop, spawn_watcher};
use ragserve::Config;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "watch")]
#[command(about = "Watch the documents folder and index new files as they appear")]
struct Args {
    /// Quiet period in milliseconds before a change burst triggers a re-scan
    #[arg(long)]
    debounce_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let args = Args::parse();
    let config = Config::load()?;
    let debounce = Duration::from_millis(args.debounce_ms.unwrap_or(config.watch.debounce_ms));

    let (embedder, pinecone, _chat) = build_clients(&config)?;
    let index = connect_index(&config, &pinecone).await?;
    let ledger = Arc::new(tokio::sync::Mutex::new(Ledger::load(config.ledger_path())));

    log::info!(
        "Watching {} (debounce {:?})",
        config.data_root().display(),
        debounce
    );
    let (_watcher, trigger_rx) = spawn_watcher(config.data_root(), debounce);

    run_scan_loop(
        trigger_rx,
        config.data_root().to_path_buf(),
        ledger,
        embedder,
        index,
        config.chunking.clone(),
    )
    .await?;

    Ok(())
}
