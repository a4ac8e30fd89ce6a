//! PersistenceLayer trait: pluggable storage backend
//!
//! Abstracts where the knowledge base document lives so the store's locking
//! and snapshot logic does not care about the medium:
//! - `JsonFileBackend`: UTF-8 JSON file, replaced atomically on every write
//! - `InMemoryBackend`: in-process copy for tests and ephemeral runs

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::types::{KnowledgeBase, KnowledgeBaseDocument};

/// Trait for pluggable persistence backends
///
/// Implementations must be thread-safe (Send + Sync) for shared access
/// across request handlers. The store serializes all writes, so backends do
/// not need their own writer coordination.
pub trait PersistenceLayer: Send + Sync {
    /// Read the full persisted knowledge base.
    ///
    /// Returns `Ok(None)` when nothing has been persisted yet.
    fn read(&self) -> Result<Option<KnowledgeBase>, StoreError>;

    /// Replace the persisted knowledge base. Must be all-or-nothing.
    fn write(&self, kb: &KnowledgeBase) -> Result<(), StoreError>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;

    /// Human-readable location (file path, "memory") for errors and logs
    fn location(&self) -> String;
}

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("knowledge base unavailable at {location}: {source}")]
    StorageUnavailable {
        location: String,
        #[source]
        source: io::Error,
    },
    #[error("knowledge base at {location} is corrupt: {reason}")]
    CorruptData { location: String, reason: String },
}

// ============================================================================
// JSON File Backend
// ============================================================================

/// JSON file persistence.
///
/// Writes go to `<path>.tmp` first, are fsynced, then renamed over the
/// target, so a crash mid-write leaves either the old or the new document.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }

    fn unavailable(&self, source: io::Error) -> StoreError {
        StoreError::StorageUnavailable {
            location: self.location(),
            source,
        }
    }

    fn corrupt(&self, reason: impl Into<String>) -> StoreError {
        StoreError::CorruptData {
            location: self.location(),
            reason: reason.into(),
        }
    }

    fn write_atomically(&self, bytes: &[u8]) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = self.tmp_path();
        let written = File::create(&tmp_path).and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        });
        let result = written.and_then(|()| fs::rename(&tmp_path, &self.path));
        if result.is_err() {
            let _ = fs::remove_file(&tmp_path); // clean up on failure
            return result;
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            sync_dir(parent);
        }
        Ok(())
    }
}

/// Persist a rename by syncing its directory. Best effort.
#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        tracing::debug!(error = %e, dir = %dir.display(), "Directory fsync skipped");
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

impl PersistenceLayer for JsonFileBackend {
    fn read(&self) -> Result<Option<KnowledgeBase>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.unavailable(e)),
        };

        // A touched-but-never-written file counts as empty, not corrupt.
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Some(KnowledgeBase::new()));
        }

        let doc: KnowledgeBaseDocument =
            serde_json::from_slice(&bytes).map_err(|e| self.corrupt(e.to_string()))?;
        KnowledgeBase::from_document(doc)
            .map(Some)
            .map_err(|reason| self.corrupt(reason))
    }

    fn write(&self, kb: &KnowledgeBase) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(&kb.to_document())
            .map_err(|e| self.unavailable(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        self.write_atomically(&bytes)
            .map_err(|e| self.unavailable(e))
    }

    fn backend_name(&self) -> &'static str {
        "JsonFile"
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

// ============================================================================
// In-Memory Backend
// ============================================================================

/// In-memory persistence for testing and ephemeral deployments
///
/// Thread-safe via `RwLock`. Not durable: data is lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: std::sync::RwLock<Option<KnowledgeBase>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `kb` already "persisted".
    pub fn with_contents(kb: KnowledgeBase) -> Self {
        Self {
            data: std::sync::RwLock::new(Some(kb)),
        }
    }
}

impl PersistenceLayer for InMemoryBackend {
    fn read(&self) -> Result<Option<KnowledgeBase>, StoreError> {
        let data = self.data.read().unwrap_or_else(|e| e.into_inner());
        Ok(data.clone())
    }

    fn write(&self, kb: &KnowledgeBase) -> Result<(), StoreError> {
        let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
        *data = Some(kb.clone());
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "InMemory"
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
