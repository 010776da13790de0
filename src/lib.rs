pub mod bootstrap;
pub mod chat;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod ingest;
pub mod query;
pub mod server;
pub mod vector;
pub mod watch;

pub use config::Config;
pub use error::{RagserveError, Result};
