pub mod chunker;
pub mod ledger;
pub mod loader;
pub mod pipeline;

pub use chunker::{chunk_document, Chunk};
pub use ledger::Ledger;
pub use loader::{discover_files, is_eligible, load_document, load_documents, Document};
pub use pipeline::{ingest_paths, IngestReport};
