//! Polling-based knowledge base file watcher.
//!
//! Checks the knowledge base file's mtime every `interval`. When a change is
//! detected it debounces for 500ms (editors write in stages), re-reads the
//! file through the store, and reports the result on an mpsc channel. A
//! failed reload leaves the previous snapshot active.
//!
//! The store's own atomic writes also bump the mtime; reloading them is a
//! no-op since the file already equals the snapshot.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc;

use super::KnowledgeStore;
use crate::config::defaults::STORE_WATCH_DEBOUNCE_MS;

/// Events emitted by the store watcher.
#[derive(Debug)]
pub enum StoreEvent {
    /// The file was re-read and published.
    Reloaded { entries: usize, answers: usize },
    /// Reload failed; the previous snapshot remains active.
    Error(String),
}

/// Run the store watcher loop.
///
/// Returns when the channel is closed or the task is cancelled.
pub async fn run_store_watcher(
    store: Arc<KnowledgeStore>,
    path: PathBuf,
    interval: Duration,
    tx: mpsc::Sender<StoreEvent>,
) {
    tracing::info!(path = %path.display(), interval_ms = interval.as_millis() as u64, "Store watcher started");

    let debounce = Duration::from_millis(STORE_WATCH_DEBOUNCE_MS);
    let mut last_mtime = get_mtime(&path);

    loop {
        tokio::time::sleep(interval).await;

        let current = match get_mtime(&path) {
            Some(t) => t,
            None => {
                if last_mtime.is_some() {
                    tracing::warn!(
                        path = %path.display(),
                        "Knowledge base file not accessible, keeping current snapshot"
                    );
                    last_mtime = None;
                }
                continue;
            }
        };

        // A file that reappeared counts as changed
        if last_mtime == Some(current) {
            continue;
        }

        tokio::time::sleep(debounce).await;
        if get_mtime(&path) != Some(current) {
            // Still being written; pick it up next cycle
            continue;
        }
        last_mtime = Some(current);

        let reload_store = Arc::clone(&store);
        let event = match tokio::task::spawn_blocking(move || reload_store.reload()).await {
            Ok(Ok(kb)) => StoreEvent::Reloaded {
                entries: kb.len(),
                answers: kb.answer_count(),
            },
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Knowledge base reload failed, keeping previous snapshot");
                StoreEvent::Error(e.to_string())
            }
            Err(e) => {
                tracing::error!(error = %e, "Knowledge base reload task failed");
                StoreEvent::Error(e.to_string())
            }
        };

        if tx.send(event).await.is_err() {
            tracing::debug!("Store watcher channel closed, stopping");
            return;
        }
    }
}

/// Modification time of a file, `None` on any error.
fn get_mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).ok().and_then(|m| m.modified().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KnowledgeBase;

    const WAIT: Duration = Duration::from_secs(10);

    fn write_kb(path: &Path, pairs: &[(&str, &str)]) {
        let mut kb = KnowledgeBase::new();
        for (q, a) in pairs {
            kb.insert(q, a).unwrap();
        }
        let json = serde_json::to_string_pretty(&kb.to_document()).unwrap();
        std::fs::write(path, json).unwrap();
    }

    #[tokio::test]
    async fn test_external_edit_is_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kb.json");
        write_kb(&path, &[("hello", "hi")]);

        let store = Arc::new(KnowledgeStore::open_file(&path).unwrap());
        let (tx, mut rx) = mpsc::channel(4);
        let handle = tokio::spawn(run_store_watcher(
            Arc::clone(&store),
            path.clone(),
            Duration::from_millis(50),
            tx,
        ));

        tokio::time::sleep(Duration::from_millis(200)).await;
        write_kb(&path, &[("hello", "hi"), ("bye", "see you")]);

        let event = tokio::time::timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert!(matches!(event, StoreEvent::Reloaded { entries: 2, answers: 2 }), "{event:?}");
        assert!(store.snapshot().find("bye").is_some());

        handle.abort();
    }

    #[tokio::test]
    async fn test_corrupt_edit_keeps_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kb.json");
        write_kb(&path, &[("hello", "hi")]);

        let store = Arc::new(KnowledgeStore::open_file(&path).unwrap());
        let (tx, mut rx) = mpsc::channel(4);
        let handle = tokio::spawn(run_store_watcher(
            Arc::clone(&store),
            path.clone(),
            Duration::from_millis(50),
            tx,
        ));

        tokio::time::sleep(Duration::from_millis(200)).await;
        std::fs::write(&path, "{ not json").unwrap();

        let event = tokio::time::timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert!(matches!(event, StoreEvent::Error(_)), "{event:?}");
        assert_eq!(store.snapshot().len(), 1);

        handle.abort();
    }
}
