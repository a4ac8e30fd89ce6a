//! Knowledge Base Storage
//!
//! Durable persistence of the question/answer knowledge base.
//!
//! - [`KnowledgeStore`] owns the live snapshot and serializes writers
//! - [`PersistenceLayer`] abstracts the backend (`JsonFileBackend` on disk,
//!   `InMemoryBackend` for tests and `--ephemeral`)
//! - [`ProcessLock`] keeps two processes from writing the same file
//! - [`run_store_watcher`] reloads the snapshot after external edits

mod knowledge_store;
pub mod lockfile;
pub mod persistence;
mod watcher;

pub use knowledge_store::{AppendReceipt, KnowledgeStore};
pub use lockfile::ProcessLock;
pub use persistence::{InMemoryBackend, JsonFileBackend, PersistenceLayer, StoreError};
pub use watcher::{run_store_watcher, StoreEvent};
