//! Q&A engine: the two public operations over store and matcher
//!
//! ```text
//! query(text) ─► snapshot ─► exact key? ─► Matcher::best_match ─► pick one answer ─► Answered
//!                                                    │
//!                                                    └─ none ─► Unknown(sentinel)
//!
//! teach(q, a) ─► Entry::new (validate) ─► KnowledgeStore::append ─► TeachResult
//! ```
//!
//! The engine is synchronous and `Send + Sync`; share one `Arc<Engine>`.
//! `query` takes no lock: it reads a snapshot and draws from a generator
//! seeded per call. `teach` does blocking file I/O, so async callers run it
//! on the blocking pool.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{BotConfig, ResponsesConfig};
use crate::matcher::{self, Matcher};
use crate::storage::{KnowledgeStore, StoreError};
use crate::types::{AppendOutcome, Entry, KnowledgeBase, TextError};

/// Odd 64-bit constant spreading consecutive draw numbers across seeds.
const DRAW_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

// ============================================================================
// Results and Errors
// ============================================================================

/// Outcome of a query. `Unknown` is a normal answer, not an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerResult {
    Answered {
        answer: String,
        /// Stored wording of the question that matched.
        matched_question: String,
        score: f64,
    },
    Unknown {
        response: String,
    },
}

impl AnswerResult {
    /// Text to show the user.
    pub fn response(&self) -> &str {
        match self {
            AnswerResult::Answered { answer, .. } => answer,
            AnswerResult::Unknown { response } => response,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, AnswerResult::Unknown { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeachResult {
    /// Confirmation for the user.
    pub message: String,
    pub question: String,
    pub outcome: AppendOutcome,
    pub answer_count: usize,
}

/// Broad failure class, for transports mapping errors to status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    StorageUnavailable,
    CorruptData,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] TextError),
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::InvalidInput(_) => ErrorKind::InvalidInput,
            EngineError::Storage(StoreError::StorageUnavailable { .. }) => {
                ErrorKind::StorageUnavailable
            }
            EngineError::Storage(StoreError::CorruptData { .. }) => ErrorKind::CorruptData,
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

pub struct Engine {
    store: Arc<KnowledgeStore>,
    matcher: Box<dyn Matcher>,
    responses: ResponsesConfig,
    seed: u64,
    draws: AtomicU64,
}

impl Engine {
    /// Engine with an entropy-seeded answer picker.
    pub fn new(
        store: Arc<KnowledgeStore>,
        matcher: Box<dyn Matcher>,
        responses: ResponsesConfig,
    ) -> Self {
        Self::with_seed(store, matcher, responses, rand::random())
    }

    /// Deterministic engine: the same seed and call order pick the same answers.
    pub fn with_seed(
        store: Arc<KnowledgeStore>,
        matcher: Box<dyn Matcher>,
        responses: ResponsesConfig,
        seed: u64,
    ) -> Self {
        info!(
            strategy = matcher.name(),
            backend = store.backend_name(),
            entries = store.snapshot().len(),
            "Engine ready"
        );
        Self {
            store,
            matcher,
            responses,
            seed,
            draws: AtomicU64::new(0),
        }
    }

    /// Fresh generator per pick, derived from the seed and a draw counter.
    fn picker(&self) -> StdRng {
        let draw = self.draws.fetch_add(1, Ordering::Relaxed);
        StdRng::seed_from_u64(self.seed ^ draw.wrapping_mul(DRAW_STRIDE))
    }

    /// Open the configured JSON store and build the configured matcher.
    pub fn from_config(config: &BotConfig) -> Result<Self, StoreError> {
        let store = KnowledgeStore::open_file(&config.store.path)?;
        Ok(Self::with_store(config, Arc::new(store)))
    }

    /// Configured matcher and responses over an existing store.
    pub fn with_store(config: &BotConfig, store: Arc<KnowledgeStore>) -> Self {
        Self::new(
            store,
            matcher::from_config(&config.matcher),
            config.responses.clone(),
        )
    }

    /// Answer `text` from the current snapshot.
    pub fn query(&self, text: &str) -> Result<AnswerResult, EngineError> {
        if text.trim().is_empty() {
            debug!("Rejected empty query");
            return Err(TextError::Empty("question").into());
        }

        let kb = self.store.snapshot();

        // An exact (normalized) question always answers from its own entry;
        // the matcher only ranks inexact input.
        let (entry, score) = if let Some(entry) = kb.find(text) {
            (entry, 1.0)
        } else if let Some(found) = self.matcher.best_match(text, &kb) {
            (&kb.entries()[found.index], found.score)
        } else {
            debug!(strategy = self.matcher.name(), "No known question matched");
            return Ok(AnswerResult::Unknown {
                response: self.responses.unknown.clone(),
            });
        };

        // Entries always hold at least one answer
        let answer = entry
            .answers()
            .choose(&mut self.picker())
            .map_or_else(|| self.responses.unknown.clone(), |a| a.as_str().to_string());
        debug!(
            matched = entry.question(),
            score,
            candidates = entry.answers().len(),
            "Query answered"
        );
        Ok(AnswerResult::Answered {
            answer,
            matched_question: entry.question().to_string(),
            score,
        })
    }

    /// Teach `answer` for `question`; returns once the change is persisted.
    pub fn teach(&self, question: &str, answer: &str) -> Result<TeachResult, EngineError> {
        let entry = Entry::new(question, answer).map_err(|e| {
            debug!(error = %e, "Rejected teach input");
            EngineError::from(e)
        })?;

        let receipt = self.store.append(entry)?;
        info!(
            question = %receipt.question,
            outcome = ?receipt.outcome,
            answers = receipt.answer_count,
            "Taught answer"
        );
        Ok(TeachResult {
            message: self.responses.learned.clone(),
            question: receipt.question,
            outcome: receipt.outcome,
            answer_count: receipt.answer_count,
        })
    }

    /// Re-read the persisted knowledge base.
    pub fn reload(&self) -> Result<Arc<KnowledgeBase>, EngineError> {
        Ok(self.store.reload()?)
    }

    pub fn snapshot(&self) -> Arc<KnowledgeBase> {
        self.store.snapshot()
    }

    pub fn store(&self) -> &Arc<KnowledgeStore> {
        &self.store
    }

    pub fn strategy_name(&self) -> &'static str {
        self.matcher.name()
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{SimilarityMatcher, TokenOverlapMatcher};
    use std::collections::HashSet;

    fn engine_with(matcher: Box<dyn Matcher>, kb: KnowledgeBase) -> Engine {
        let store = Arc::new(KnowledgeStore::in_memory(kb));
        Engine::with_seed(store, matcher, ResponsesConfig::default(), 7)
    }

    fn similarity_engine() -> Engine {
        engine_with(Box::new(SimilarityMatcher::new(0.5)), KnowledgeBase::new())
    }

    #[test]
    fn test_teach_then_query() {
        let engine = similarity_engine();
        let taught = engine.teach("What is your name?", "Bot").unwrap();
        assert_eq!(taught.message, "Thank you! I learned a new response.");
        assert_eq!(taught.outcome, AppendOutcome::Created);

        let result = engine.query("what is your name?").unwrap();
        assert_eq!(result.response(), "Bot");
        match result {
            AnswerResult::Answered { matched_question, score, .. } => {
                assert_eq!(matched_question, "What is your name?");
                assert_eq!(score, 1.0);
            }
            other => panic!("expected an answer, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_input_is_invalid() {
        let engine = similarity_engine();
        for blank in ["", "   ", "\n\t"] {
            let err = engine.query(blank).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput);
        }
        assert_eq!(engine.teach("", "x").unwrap_err().kind(), ErrorKind::InvalidInput);
        assert_eq!(engine.teach("q", "  ").unwrap_err().kind(), ErrorKind::InvalidInput);
        assert!(engine.snapshot().is_empty());
    }

    #[test]
    fn test_unknown_is_not_an_error() {
        let engine = similarity_engine();
        let result = engine.query("anybody there?").unwrap();
        assert!(result.is_unknown());
        assert_eq!(result.response(), "I don't know the answer. Can you teach me?");
    }

    #[test]
    fn test_custom_responses() {
        let responses = ResponsesConfig {
            unknown: "No idea.".to_string(),
            learned: "Noted.".to_string(),
        };
        let store = Arc::new(KnowledgeStore::in_memory(KnowledgeBase::new()));
        let engine = Engine::with_seed(store, Box::new(SimilarityMatcher::new(0.5)), responses, 1);
        assert_eq!(engine.query("hm").unwrap().response(), "No idea.");
        assert_eq!(engine.teach("hm", "hmm").unwrap().message, "Noted.");
    }

    #[test]
    fn test_repeated_teach_surfaces_every_answer() {
        let engine = similarity_engine();
        engine.teach("how are you", "fine").unwrap();
        let second = engine.teach("How are you", "great").unwrap();
        assert_eq!(second.outcome, AppendOutcome::Appended);
        assert_eq!(second.answer_count, 2);

        let kb = engine.snapshot();
        assert_eq!(kb.len(), 1);
        let answers: Vec<&str> = kb.entries()[0].answers().iter().map(|a| a.as_str()).collect();
        assert_eq!(answers, vec!["fine", "great"]);

        let seen: HashSet<String> = (0..200)
            .map(|_| engine.query("how are you").unwrap().response().to_string())
            .collect();
        assert_eq!(seen, HashSet::from(["fine".to_string(), "great".to_string()]));
    }

    #[test]
    fn test_same_seed_same_choices() {
        let picks = |seed| {
            let mut kb = KnowledgeBase::new();
            for a in ["a", "b", "c", "d"] {
                kb.insert("letter", a).unwrap();
            }
            let store = Arc::new(KnowledgeStore::in_memory(kb));
            let engine = Engine::with_seed(
                store,
                Box::new(SimilarityMatcher::new(0.5)),
                ResponsesConfig::default(),
                seed,
            );
            (0..20)
                .map(|_| engine.query("letter").unwrap().response().to_string())
                .collect::<Vec<_>>()
        };
        assert_eq!(picks(42), picks(42));
    }

    #[test]
    fn test_token_overlap_strategy() {
        let mut kb = KnowledgeBase::new();
        kb.insert("what is your name", "Bot").unwrap();
        let engine = engine_with(Box::new(TokenOverlapMatcher::new(1)), kb);
        assert_eq!(engine.strategy_name(), "token_overlap");

        assert_eq!(engine.query("What's your name?").unwrap().response(), "Bot");
        assert!(engine.query("weather today").unwrap().is_unknown());
    }

    #[test]
    fn test_exact_question_beats_earlier_overlap() {
        let engine = engine_with(Box::new(TokenOverlapMatcher::new(1)), KnowledgeBase::new());
        engine.teach("how are you doing today", "busy").unwrap();
        engine.teach("how are you", "fine").unwrap();

        let result = engine.query("How are  you").unwrap();
        assert_eq!(result.response(), "fine");
        match result {
            AnswerResult::Answered { matched_question, score, .. } => {
                assert_eq!(matched_question, "how are you");
                assert_eq!(score, 1.0);
            }
            other => panic!("expected an answer, got {other:?}"),
        }
        assert_eq!(engine.query("are you doing ok").unwrap().response(), "busy");
    }

    #[test]
    fn test_punctuation_question_answers_itself() {
        let engine = engine_with(Box::new(TokenOverlapMatcher::new(1)), KnowledgeBase::new());
        engine.teach("???", "confused?").unwrap();
        assert_eq!(engine.query("???").unwrap().response(), "confused?");
        assert!(engine.query("!!!").unwrap().is_unknown());
    }

    #[test]
    fn test_parallel_queries_surface_every_answer() {
        let mut kb = KnowledgeBase::new();
        for a in ["red", "green", "blue"] {
            kb.insert("colour", a).unwrap();
        }
        let engine = Arc::new(engine_with(Box::new(SimilarityMatcher::new(0.5)), kb));

        let seen: HashSet<String> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let engine = Arc::clone(&engine);
                    s.spawn(move || {
                        (0..100)
                            .map(|_| engine.query("colour").unwrap().response().to_string())
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles.into_iter().flat_map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(seen.len(), 3, "{seen:?}");
    }

    #[test]
    fn test_concurrent_teach_keeps_every_answer() {
        let engine = Arc::new(similarity_engine());
        std::thread::scope(|s| {
            for i in 0..8 {
                let engine = Arc::clone(&engine);
                s.spawn(move || {
                    engine.teach("shared question", &format!("answer {i}")).unwrap();
                    // Readers run alongside writers
                    engine.query("shared question").unwrap();
                });
            }
        });

        let kb = engine.snapshot();
        assert_eq!(kb.len(), 1);
        assert_eq!(kb.entries()[0].answers().len(), 8);
    }

    #[test]
    fn test_storage_error_kinds() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = EngineError::from(StoreError::StorageUnavailable {
            location: "kb.json".into(),
            source: io,
        });
        assert_eq!(err.kind(), ErrorKind::StorageUnavailable);

        let err = EngineError::from(StoreError::CorruptData {
            location: "kb.json".into(),
            reason: "bad".into(),
        });
        assert_eq!(err.kind(), ErrorKind::CorruptData);
    }
}
