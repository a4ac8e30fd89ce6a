//! Shared data structures for the question/answer knowledge base
//!
//! - [`KnowledgeBase`]: ordered entries with unique normalized questions
//! - [`Entry`] / [`Answer`]: validated records (blank text is rejected)
//! - [`KnowledgeBaseDocument`]: the persisted JSON shape, including the legacy
//!   single-`answer` form

mod knowledge_base;

pub use knowledge_base::*;
