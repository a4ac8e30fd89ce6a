//! teachbot: a teachable question/answer bot
//!
//! ## Architecture
//!
//! - **Store**: durable knowledge base with lock-free snapshots for readers
//!   and a single serialized writer path
//! - **Matcher**: picks the closest known question (`similarity` or
//!   `token_overlap`)
//! - **Engine**: `query` and `teach` on top of store and matcher
//! - **API**: axum routes serving the chat page and JSON endpoints

pub mod api;
pub mod config;
pub mod engine;
pub mod matcher;
pub mod storage;
pub mod types;

pub use config::BotConfig;
pub use engine::{AnswerResult, Engine, EngineError, ErrorKind, TeachResult};
pub use matcher::{MatchStrategy, Matcher};
pub use storage::{KnowledgeStore, StoreError};
pub use types::{AppendOutcome, Entry, KnowledgeBase};
