//! Question matching strategies
//!
//! A [`Matcher`] maps an input question and the current knowledge base to at
//! most one known question. Two interchangeable strategies exist:
//!
//! | Strategy | Type | Score |
//! |----------|------|-------|
//! | `similarity` | [`SimilarityMatcher`] | gestalt ratio in [0, 1], must reach the cutoff |
//! | `token_overlap` | [`TokenOverlapMatcher`] | number of shared word tokens |
//!
//! Both are pure: no I/O, no mutation, deterministic for a given input and
//! entry order. Ties go to the earliest entry.

mod similarity;
mod token_overlap;

pub use similarity::{similarity_ratio, SimilarityMatcher};
pub use token_overlap::{tokenize, TokenOverlapMatcher};

use serde::{Deserialize, Serialize};

use crate::config::MatcherConfig;
use crate::types::KnowledgeBase;

/// The chosen known question: its position in the knowledge base and the
/// strategy-specific score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    pub index: usize,
    pub score: f64,
}

pub trait Matcher: Send + Sync {
    /// Best-matching entry for `input`, or `None` if nothing qualifies.
    fn best_match(&self, input: &str, kb: &KnowledgeBase) -> Option<Match>;

    /// Strategy name for logs and health output
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    #[default]
    Similarity,
    TokenOverlap,
}

impl std::fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchStrategy::Similarity => write!(f, "similarity"),
            MatchStrategy::TokenOverlap => write!(f, "token_overlap"),
        }
    }
}

/// Build the configured matcher.
pub fn from_config(config: &MatcherConfig) -> Box<dyn Matcher> {
    match config.strategy {
        MatchStrategy::Similarity => Box::new(SimilarityMatcher::new(config.similarity_cutoff)),
        MatchStrategy::TokenOverlap => Box::new(
            TokenOverlapMatcher::new(config.min_shared_tokens)
                .with_stopwords(&config.stopwords),
        ),
    }
}
