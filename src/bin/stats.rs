use anyhow::Result;
use clap::Parser;
use ragserve::bootstrap::{build_clients, connect_index};
use ragserve::ingest::{discover_files, Ledger};
use ragserve::Config;

#[derive(Parser, Debug)]
#[command(name = "stats")]
#[command(about = "Show ledger and vector index statistics")]
struct Args {}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "warn")).init();

    let _args = Args::parse();
    let config = Config::load()?;

    let ledger = Ledger::load(config.ledger_path());
    let files = discover_files(config.data_root())?;
    let pending = files
        .iter()
        .filter(|p| !ledger.contains(&p.display().to_string()))
        .count();

    let (_embedder, pinecone, _chat) = build_clients(&config)?;
    let index = connect_index(&config, &pinecone).await?;
    let record_count = index.record_count().await?;

    println!("Documents root:     {}", config.data_root().display());
    println!("Eligible files:     {}", files.len());
    println!("Processed (ledger): {}", ledger.len());
    println!("Pending:            {}", pending);
    println!("Index:              {}", config.vector_store.index_name);
    println!("Index records:      {}", record_count);

    Ok(())
}
