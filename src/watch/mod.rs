//! Filesystem watch/debounce controller.
//!
//! A notify watcher on a dedicated thread coalesces bursts of change events
//! into a single trigger once a quiet period elapses. An async scan loop
//! consumes triggers one at a time: each scan diffs the directory against the
//! ledger and feeds only new files to the ingestion pipeline. Triggers that
//! arrive mid-scan queue on the channel, so no change is ever lost.

use crate::config::ChunkingConfig;
use crate::embeddings::Embedder;
use crate::error::{RagserveError, Result};
use crate::ingest::ledger::Ledger;
use crate::ingest::loader::discover_files;
use crate::ingest::pipeline::{ingest_paths, IngestReport};
use crate::vector::VectorWriter;
use notify::{RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

/// Handle for stopping the watcher.
///
/// `stop` signals the watcher thread to exit; the trigger channel then
/// disconnects and the scan loop returns after finishing any in-flight scan,
/// so a partially-applied ledger update is never abandoned mid-write.
pub struct WatchController {
    stopping: Arc<AtomicBool>,
}

impl WatchController {
    pub fn stop(&self) {
        log::info!("Stopping file watcher");
        self.stopping.store(true, Ordering::SeqCst);
    }
}

/// Spawn the watcher thread for `root`.
///
/// Returns the controller and a receiver that yields one `()` per debounced
/// burst of filesystem events.
pub fn spawn_watcher(root: &Path, quiet: Duration) -> (WatchController, mpsc::Receiver<()>) {
    let stopping = Arc::new(AtomicBool::new(false));
    let (trigger_tx, trigger_rx) = mpsc::channel();
    let root = root.to_path_buf();
    let flag = Arc::clone(&stopping);

    std::thread::spawn(move || {
        if let Err(e) = run_watcher_thread(&root, quiet, trigger_tx, &flag) {
            log::error!("watcher thread error: {}", e);
        }
    });

    (WatchController { stopping }, trigger_rx)
}

fn run_watcher_thread(
    root: &Path,
    quiet: Duration,
    trigger_tx: mpsc::Sender<()>,
    stopping: &AtomicBool,
) -> Result<()> {
    let (event_tx, event_rx) = mpsc::channel::<()>();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        if res.is_ok() {
            let _ = event_tx.send(());
        }
    })
    .map_err(|e| RagserveError::Config(e.to_string()))?;

    watcher
        .watch(root, RecursiveMode::Recursive)
        .map_err(|e| RagserveError::Config(e.to_string()))?;

    log::info!("Watching {} for new files", root.display());
    debounce_events(event_rx, trigger_tx, quiet, stopping);
    Ok(())
}

/// Coalesce raw change events into single triggers.
///
/// State machine: idle until an event arrives, then pending until a full
/// quiet period passes with no further events, at which point exactly one
/// trigger is emitted. Every event resets the quiet-period timer.
fn debounce_events(
    event_rx: mpsc::Receiver<()>,
    trigger_tx: mpsc::Sender<()>,
    quiet: Duration,
    stopping: &AtomicBool,
) {
    let mut pending = false;

    loop {
        if stopping.load(Ordering::SeqCst) {
            return;
        }

        match event_rx.recv_timeout(quiet) {
            Ok(()) => pending = true,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                if pending {
                    pending = false;
                    if trigger_tx.send(()).is_err() {
                        return;
                    }
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                if pending {
                    let _ = trigger_tx.send(());
                }
                return;
            }
        }
    }
}

/// One scan: list eligible files, diff against the ledger, ingest new ones.
///
/// Holds the ledger lock for the whole pass; that lock is the mutual
/// exclusion gate guaranteeing a single ingestion actor.
pub async fn scan_once<E, V>(
    root: &Path,
    ledger: &tokio::sync::Mutex<Ledger>,
    embedder: &E,
    index: &V,
    chunking: &ChunkingConfig,
) -> Result<IngestReport>
where
    E: Embedder,
    V: VectorWriter,
{
    let all_files = discover_files(root)?;
    let mut ledger = ledger.lock().await;

    let new_files: Vec<PathBuf> = all_files
        .into_iter()
        .filter(|p| !ledger.contains(&p.display().to_string()))
        .collect();

    if new_files.is_empty() {
        return Ok(IngestReport::default());
    }

    log::info!("New files detected: {}", new_files.len());
    ingest_paths(&new_files, &mut ledger, embedder, index, chunking).await
}

/// Consume debounced triggers until the watcher stops.
///
/// At most one scan runs at a time; triggers that queued up during a scan
/// are coalesced into the next one.
pub async fn run_scan_loop<E, V>(
    trigger_rx: mpsc::Receiver<()>,
    root: PathBuf,
    ledger: Arc<tokio::sync::Mutex<Ledger>>,
    embedder: E,
    index: V,
    chunking: ChunkingConfig,
) -> Result<()>
where
    E: Embedder + Send + Sync + 'static,
    V: VectorWriter + Send + Sync + 'static,
{
    let rx = Arc::new(Mutex::new(trigger_rx));

    loop {
        let rx_clone = Arc::clone(&rx);
        let received = tokio::task::spawn_blocking(move || rx_clone.lock().unwrap().recv())
            .await
            .map_err(|e| RagserveError::Config(format!("watcher task join: {}", e)))?;

        if received.is_err() {
            break;
        }

        // Drain triggers that piled up while the previous scan ran.
        while rx.lock().unwrap().try_recv().is_ok() {}

        if let Err(e) = scan_once(&root, &ledger, &embedder, &index, &chunking).await {
            log::error!("scan failed: {}", e);
        }
    }

    log::info!("Watcher stopped; scan loop exiting");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::VectorRecord;
    use std::fs;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    #[test]
    fn test_debounce_coalesces_burst_into_one_trigger() {
        let (event_tx, event_rx) = mpsc::channel();
        let (trigger_tx, trigger_rx) = mpsc::channel();
        let stopping = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stopping);

        let handle = std::thread::spawn(move || {
            debounce_events(event_rx, trigger_tx, Duration::from_millis(50), &flag);
        });

        for _ in 0..5 {
            event_tx.send(()).unwrap();
        }
        // After the quiet period, exactly one trigger fires for the burst.
        let first = trigger_rx.recv_timeout(Duration::from_secs(2));
        assert!(first.is_ok());
        assert!(trigger_rx
            .recv_timeout(Duration::from_millis(200))
            .is_err());

        // A later event produces a fresh trigger.
        event_tx.send(()).unwrap();
        assert!(trigger_rx.recv_timeout(Duration::from_secs(2)).is_ok());

        stopping.store(true, Ordering::SeqCst);
        drop(event_tx);
        handle.join().unwrap();
    }

    #[test]
    fn test_debounce_flushes_pending_on_disconnect() {
        let (event_tx, event_rx) = mpsc::channel();
        let (trigger_tx, trigger_rx) = mpsc::channel();
        let stopping = AtomicBool::new(false);

        event_tx.send(()).unwrap();
        drop(event_tx);
        debounce_events(event_rx, trigger_tx, Duration::from_millis(10), &stopping);

        assert!(trigger_rx.try_recv().is_ok());
        assert!(trigger_rx.try_recv().is_err());
    }

    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    impl Embedder for CountingEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![vec![0.0; 4]; texts.len()])
        }
    }

    struct CollectingIndex {
        upserted: Mutex<Vec<VectorRecord>>,
    }

    impl VectorWriter for CollectingIndex {
        async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
            self.upserted.lock().unwrap().extend_from_slice(records);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_scan_once_ingests_only_new_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("data");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("a.txt"), "already indexed").unwrap();
        fs::write(root.join("b.txt"), "brand new").unwrap();

        let mut ledger = Ledger::load(&temp_dir.path().join("ledger.json"));
        ledger.mark_processed([root.join("a.txt").display().to_string()]);
        let ledger = tokio::sync::Mutex::new(ledger);

        let embedder = CountingEmbedder {
            calls: AtomicUsize::new(0),
        };
        let index = CollectingIndex {
            upserted: Mutex::new(Vec::new()),
        };
        let chunking = ChunkingConfig {
            chunk_size: 800,
            chunk_overlap: 100,
        };

        let report = scan_once(&root, &ledger, &embedder, &index, &chunking)
            .await
            .unwrap();

        assert_eq!(report.files_processed, 1);
        let records = index.upserted.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].metadata.text, "brand new");
        assert!(ledger.lock().await.contains(&root.join("b.txt").display().to_string()));
    }

    #[tokio::test]
    async fn test_stop_lets_scan_loop_exit() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("data");
        fs::create_dir_all(&root).unwrap();

        let (controller, trigger_rx) = spawn_watcher(&root, Duration::from_millis(20));
        let ledger = Arc::new(tokio::sync::Mutex::new(Ledger::load(
            &temp_dir.path().join("ledger.json"),
        )));
        let task = tokio::spawn(run_scan_loop(
            trigger_rx,
            root.clone(),
            ledger,
            CountingEmbedder {
                calls: AtomicUsize::new(0),
            },
            CollectingIndex {
                upserted: Mutex::new(Vec::new()),
            },
            ChunkingConfig {
                chunk_size: 800,
                chunk_overlap: 100,
            },
        ));

        controller.stop();
        // The watcher thread notices the flag within one quiet period; the
        // disconnected trigger channel then ends the scan loop.
        let joined = tokio::time::timeout(Duration::from_secs(5), task).await;
        let result = joined.expect("scan loop did not exit after stop");
        result.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_scan_once_noop_when_everything_ledgered() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("data");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("a.txt"), "indexed").unwrap();

        let mut ledger = Ledger::load(&temp_dir.path().join("ledger.json"));
        ledger.mark_processed([root.join("a.txt").display().to_string()]);
        let ledger = tokio::sync::Mutex::new(ledger);

        let embedder = CountingEmbedder {
            calls: AtomicUsize::new(0),
        };
        let index = CollectingIndex {
            upserted: Mutex::new(Vec::new()),
        };
        let chunking = ChunkingConfig {
            chunk_size: 800,
            chunk_overlap: 100,
        };

        let report = scan_once(&root, &ledger, &embedder, &index, &chunking)
            .await
            .unwrap();

        assert_eq!(report, IngestReport::default());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }
}
