//! Knowledge store: the single owner of the knowledge base
//!
//! Readers take the current snapshot (`Arc<KnowledgeBase>`) without locking.
//! Writers hold one mutex across read-modify-persist-publish, so concurrent
//! teaches of the same question never lose an answer, and a snapshot is only
//! published after the backend accepted it. If persistence fails the old
//! snapshot stays current: memory and disk do not diverge.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use arc_swap::ArcSwap;
use tracing::{debug, info, warn};

use super::persistence::{InMemoryBackend, JsonFileBackend, PersistenceLayer, StoreError};
use crate::types::{AppendOutcome, Entry, KnowledgeBase};

/// Result of a successful append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendReceipt {
    pub outcome: AppendOutcome,
    /// Question wording as stored (the first-taught form for merged entries).
    pub question: String,
    /// Number of answers the entry holds after the append.
    pub answer_count: usize,
}

pub struct KnowledgeStore {
    backend: Box<dyn PersistenceLayer>,
    snapshot: ArcSwap<KnowledgeBase>,
    write_lock: Mutex<()>,
}

impl KnowledgeStore {
    /// Open a store over `backend`, loading whatever is persisted.
    ///
    /// Nothing persisted yet means an empty knowledge base; the file is only
    /// created by the first append.
    pub fn open(backend: Box<dyn PersistenceLayer>) -> Result<Self, StoreError> {
        let kb = backend.read()?.unwrap_or_default();
        info!(
            backend = backend.backend_name(),
            location = %backend.location(),
            entries = kb.len(),
            answers = kb.answer_count(),
            "Knowledge store opened"
        );
        Ok(Self {
            backend,
            snapshot: ArcSwap::from_pointee(kb),
            write_lock: Mutex::new(()),
        })
    }

    /// Open a JSON file store.
    pub fn open_file(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::open(Box::new(JsonFileBackend::new(path)))
    }

    /// Non-durable store, seeded with `kb`.
    pub fn in_memory(kb: KnowledgeBase) -> Self {
        let backend = InMemoryBackend::with_contents(kb.clone());
        Self {
            backend: Box::new(backend),
            snapshot: ArcSwap::from_pointee(kb),
            write_lock: Mutex::new(()),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    pub fn location(&self) -> String {
        self.backend.location()
    }

    /// Current published knowledge base. Never blocks.
    pub fn snapshot(&self) -> Arc<KnowledgeBase> {
        self.snapshot.load_full()
    }

    /// Read the full persisted knowledge base, bypassing the cached snapshot.
    pub fn load(&self) -> Result<KnowledgeBase, StoreError> {
        Ok(self.backend.read()?.unwrap_or_default())
    }

    /// Add `entry`'s answer(s), merging into an existing entry with the same
    /// normalized question, then persist and publish.
    ///
    /// An answer the entry already holds is skipped and nothing is written.
    pub fn append(&self, entry: Entry) -> Result<AppendReceipt, StoreError> {
        let _guard = self.lock_writer();

        let mut next = KnowledgeBase::clone(&self.snapshot.load());
        let key = entry.key().to_string();
        let outcome = next.merge(entry);

        let stored = next
            .find(&key)
            .map(|e| (e.question().to_string(), e.answers().len()))
            .unwrap_or_default();
        let receipt = AppendReceipt {
            outcome,
            question: stored.0,
            answer_count: stored.1,
        };

        if !outcome.changed() {
            debug!(question = %receipt.question, "Answer already known, nothing to persist");
            return Ok(receipt);
        }

        if let Err(e) = self.backend.write(&next) {
            warn!(error = %e, question = %receipt.question, "Append not persisted, snapshot unchanged");
            return Err(e);
        }
        self.snapshot.store(Arc::new(next));

        debug!(
            question = %receipt.question,
            outcome = ?receipt.outcome,
            answers = receipt.answer_count,
            "Knowledge base updated"
        );
        Ok(receipt)
    }

    /// Persist `kb` as the full knowledge base and publish it.
    pub fn save(&self, kb: KnowledgeBase) -> Result<(), StoreError> {
        let _guard = self.lock_writer();
        self.backend.write(&kb)?;
        self.snapshot.store(Arc::new(kb));
        Ok(())
    }

    /// Re-read the persisted knowledge base and publish it.
    ///
    /// On failure the previous snapshot stays active and the error is returned.
    pub fn reload(&self) -> Result<Arc<KnowledgeBase>, StoreError> {
        let _guard = self.lock_writer();
        let kb = Arc::new(self.load()?);
        self.snapshot.store(Arc::clone(&kb));
        info!(entries = kb.len(), answers = kb.answer_count(), "Knowledge base reloaded");
        Ok(kb)
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(|e| {
            warn!("Knowledge store writer lock poisoned, recovering");
            e.into_inner()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Answer;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::tempdir;

    /// Backend whose writes can be switched to fail.
    struct FlakyBackend {
        inner: InMemoryBackend,
        fail_writes: Arc<AtomicBool>,
    }

    impl PersistenceLayer for FlakyBackend {
        fn read(&self) -> Result<Option<KnowledgeBase>, StoreError> {
            self.inner.read()
        }

        fn write(&self, kb: &KnowledgeBase) -> Result<(), StoreError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StoreError::StorageUnavailable {
                    location: self.location(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
                });
            }
            self.inner.write(kb)
        }

        fn backend_name(&self) -> &'static str {
            "Flaky"
        }

        fn location(&self) -> String {
            "flaky".to_string()
        }
    }

    fn entry(q: &str, a: &str) -> Entry {
        Entry::new(q, a).unwrap()
    }

    fn answers_of(kb: &KnowledgeBase, q: &str) -> Vec<String> {
        kb.find(q)
            .map(|e| e.answers().iter().map(Answer::to_string).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_open_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kb.json");
        let store = KnowledgeStore::open_file(&path).unwrap();
        assert!(store.snapshot().is_empty());
        assert!(!path.exists(), "open must not create the file");
    }

    #[test]
    fn test_append_persists_and_merges() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kb.json");
        let store = KnowledgeStore::open_file(&path).unwrap();

        let first = store.append(entry("how are you", "fine")).unwrap();
        assert_eq!(first.outcome, AppendOutcome::Created);
        let second = store.append(entry("How are you", "great")).unwrap();
        assert_eq!(second.outcome, AppendOutcome::Appended);
        assert_eq!(second.question, "how are you");
        assert_eq!(second.answer_count, 2);

        let reopened = KnowledgeStore::open_file(&path).unwrap();
        assert_eq!(reopened.snapshot().len(), 1);
        assert_eq!(answers_of(&reopened.snapshot(), "how are you"), vec!["fine", "great"]);
    }

    #[test]
    fn test_duplicate_answer_skips_write() {
        let store = KnowledgeStore::in_memory(KnowledgeBase::new());
        store.append(entry("ping", "pong")).unwrap();
        let before = store.snapshot();
        let receipt = store.append(entry("ping", "pong")).unwrap();
        assert_eq!(receipt.outcome, AppendOutcome::AlreadyKnown);
        assert!(Arc::ptr_eq(&before, &store.snapshot()));
    }

    #[test]
    fn test_failed_write_leaves_snapshot_unchanged() {
        let fail_writes = Arc::new(AtomicBool::new(false));
        let backend = FlakyBackend {
            inner: InMemoryBackend::new(),
            fail_writes: Arc::clone(&fail_writes),
        };
        let store = KnowledgeStore::open(Box::new(backend)).unwrap();
        store.append(entry("q", "a1")).unwrap();

        fail_writes.store(true, Ordering::SeqCst);
        let err = store.append(entry("q", "a2")).unwrap_err();
        assert!(matches!(err, StoreError::StorageUnavailable { .. }));
        assert_eq!(answers_of(&store.snapshot(), "q"), vec!["a1"]);
        assert_eq!(answers_of(&store.load().unwrap(), "q"), vec!["a1"]);

        let err = store.append(entry("new question", "x")).unwrap_err();
        assert!(matches!(err, StoreError::StorageUnavailable { .. }));
        assert!(store.snapshot().find("new question").is_none());
    }

    #[test]
    fn test_save_of_load_is_byte_stable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kb.json");
        let store = KnowledgeStore::open_file(&path).unwrap();
        store.append(entry("what is your name", "Bot")).unwrap();
        store.append(entry("how are you", "fine")).unwrap();
        store.append(entry("how are you", "great")).unwrap();

        let before = std::fs::read(&path).unwrap();
        store.save(store.load().unwrap()).unwrap();
        let after = std::fs::read(&path).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_reload_picks_up_external_edit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kb.json");
        let store = KnowledgeStore::open_file(&path).unwrap();
        store.append(entry("hello", "hi")).unwrap();

        std::fs::write(
            &path,
            r#"{"questions":[{"question":"hello","answers":["hi","hey"]}]}"#,
        )
        .unwrap();
        let kb = store.reload().unwrap();
        assert_eq!(answers_of(&kb, "hello"), vec!["hi", "hey"]);
        assert_eq!(answers_of(&store.snapshot(), "hello"), vec!["hi", "hey"]);
    }

    #[test]
    fn test_reload_of_corrupt_file_keeps_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kb.json");
        let store = KnowledgeStore::open_file(&path).unwrap();
        store.append(entry("hello", "hi")).unwrap();

        std::fs::write(&path, "[1, 2, 3]").unwrap();
        assert!(matches!(store.reload(), Err(StoreError::CorruptData { .. })));
        assert_eq!(answers_of(&store.snapshot(), "hello"), vec!["hi"]);
    }

    #[test]
    fn test_open_corrupt_file_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kb.json");
        std::fs::write(&path, r#"{"questions":[{"answers":["x"]}]}"#).unwrap();
        assert!(matches!(
            KnowledgeStore::open_file(&path),
            Err(StoreError::CorruptData { .. })
        ));
    }

    #[test]
    fn test_concurrent_appends_keep_every_answer() {
        let dir = tempdir().unwrap();
        let store = KnowledgeStore::open_file(dir.path().join("kb.json")).unwrap();

        std::thread::scope(|s| {
            for i in 0..16 {
                let store = &store;
                s.spawn(move || {
                    store.append(entry("shared question", &format!("answer {i}"))).unwrap();
                });
            }
        });

        let persisted = store.load().unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(answers_of(&persisted, "shared question").len(), 16);
        assert_eq!(*store.snapshot(), persisted);
    }
}
