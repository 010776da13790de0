use anyhow::Result;
use clap::Parser;
use ragserve::bootstrap::{build_clients, connect_index};
use ragserve::query::QueryEngine;
use ragserve::Config;

#[derive(Parser, Debug)]
#[command(name = "query")]
#[command(about = "Ask a question against the indexed documents")]
struct Args {
    /// The question to answer
    question: String,

    /// Print the full JSON response instead of just the answer text
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "warn")).init();

    let args = Args::parse();
    let config = Config::load()?;

    let (embedder, pinecone, chat) = build_clients(&config)?;
    let index = connect_index(&config, &pinecone).await?;
    let engine = QueryEngine::new(embedder, index, chat, config.retrieval.top_k);

    let answer = engine.answer(&args.question).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
    } else {
        println!("{}", answer.answer);
        if !answer.sources.is_empty() {
            println!();
            println!("Sources:");
            for source in &answer.sources {
                match source.chunk_index {
                    Some(i) => println!("  {} (chunk {})", source.source, i),
                    None => println!("  {}", source.source),
                }
            }
        }
    }

    Ok(())
}
