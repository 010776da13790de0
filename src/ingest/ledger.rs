use crate::error::{RagserveError, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Durable record of which source files have already been indexed.
///
/// Persisted as a JSON array of path strings. A path is added only after all
/// chunks derived from it have been embedded and upserted, so a failed upsert
/// leaves the file eligible for retry on the next scan.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    entries: BTreeSet<String>,
}

impl Ledger {
    /// Create an empty ledger that will persist to `path`, ignoring any
    /// existing state there. Used for forced full re-ingestion.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            entries: BTreeSet::new(),
        }
    }

    /// Load the ledger from `path`.
    ///
    /// A missing or unparseable file degrades to an empty ledger with a
    /// warning; at worst that causes redundant re-ingestion, which is safe
    /// because vector record ids are deterministic.
    pub fn load(path: &Path) -> Self {
        let entries = match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<Vec<String>>(&content) {
                Ok(paths) => paths.into_iter().collect(),
                Err(e) => {
                    log::warn!(
                        "Failed to parse ledger {}: {}; starting with empty ledger",
                        path.display(),
                        e
                    );
                    BTreeSet::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeSet::new(),
            Err(e) => {
                log::warn!(
                    "Failed to read ledger {}: {}; starting with empty ledger",
                    path.display(),
                    e
                );
                BTreeSet::new()
            }
        };

        Self {
            path: path.to_path_buf(),
            entries,
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains(path)
    }

    /// Add paths to the processed set. Re-adding an existing path is a no-op.
    pub fn mark_processed<I>(&mut self, paths: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.entries.extend(paths);
    }

    /// Write the full current set to disk, overwriting prior content.
    pub fn persist(&self) -> Result<()> {
        let paths: Vec<&String> = self.entries.iter().collect();
        let json = serde_json::to_string_pretty(&paths)
            .map_err(|e| RagserveError::Parse(format!("ledger serialize: {}", e)))?;
        std::fs::write(&self.path, json).map_err(RagserveError::Io)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_empty_ledger() {
        let temp_dir = TempDir::new().unwrap();
        let ledger = Ledger::load(&temp_dir.path().join("nope.json"));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_corrupt_file_yields_empty_ledger() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ledger.json");
        fs::write(&path, "{not json").unwrap();
        let ledger = Ledger::load(&path);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ledger.json");

        let mut ledger = Ledger::load(&path);
        ledger.mark_processed(vec![
            "data/a.txt".to_string(),
            "data/b.pdf".to_string(),
        ]);
        ledger.persist().unwrap();

        let reloaded = Ledger::load(&path);
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.contains("data/a.txt"));
        assert!(reloaded.contains("data/b.pdf"));
        assert!(!reloaded.contains("data/c.txt"));
    }

    #[test]
    fn test_mark_processed_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let mut ledger = Ledger::load(&temp_dir.path().join("ledger.json"));
        ledger.mark_processed(vec!["x.txt".to_string()]);
        ledger.mark_processed(vec!["x.txt".to_string()]);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_persist_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ledger.json");
        fs::write(&path, r#"["stale.txt"]"#).unwrap();

        let mut ledger = Ledger::load(&path);
        assert!(ledger.contains("stale.txt"));
        ledger.mark_processed(vec!["fresh.txt".to_string()]);
        ledger.persist().unwrap();

        let reloaded = Ledger::load(&path);
        assert_eq!(reloaded.len(), 2);
    }
}
