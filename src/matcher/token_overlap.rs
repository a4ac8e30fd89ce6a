//! Token-overlap matching
//!
//! Questions are reduced to sets of lower-cased word tokens (maximal runs of
//! letters and digits, so "what's" yields "what" and "s"). The known question
//! sharing the most tokens with the input wins; it must share at least
//! `min_shared` tokens, and the earliest entry wins a tie.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use super::{Match, Matcher};
use crate::types::KnowledgeBase;

fn word_pattern() -> &'static Regex {
    static WORD: OnceLock<Regex> = OnceLock::new();
    WORD.get_or_init(|| Regex::new(r"[\p{L}\p{N}]+").expect("word pattern is a valid regex"))
}

/// Lower-cased word tokens of `text` as a set.
pub fn tokenize(text: &str) -> HashSet<String> {
    let lowered = text.to_lowercase();
    word_pattern()
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

#[derive(Debug, Clone)]
pub struct TokenOverlapMatcher {
    min_shared: usize,
    stopwords: HashSet<String>,
}

impl TokenOverlapMatcher {
    pub fn new(min_shared: usize) -> Self {
        Self {
            min_shared: min_shared.max(1),
            stopwords: HashSet::new(),
        }
    }

    /// Tokens to ignore on both sides (compared lower-cased).
    pub fn with_stopwords<I, S>(mut self, stopwords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.stopwords = stopwords
            .into_iter()
            .map(|s| s.as_ref().to_lowercase())
            .collect();
        self
    }

    fn content_tokens(&self, text: &str) -> HashSet<String> {
        let mut tokens = tokenize(text);
        tokens.retain(|t| !self.stopwords.contains(t));
        tokens
    }
}

impl Matcher for TokenOverlapMatcher {
    fn best_match(&self, input: &str, kb: &KnowledgeBase) -> Option<Match> {
        let wanted = self.content_tokens(input);
        if wanted.is_empty() {
            return None;
        }

        let mut best: Option<(usize, usize)> = None;
        for (i, entry) in kb.entries().iter().enumerate() {
            let shared = self
                .content_tokens(entry.key())
                .intersection(&wanted)
                .count();
            if shared < self.min_shared {
                continue;
            }
            if best.map_or(true, |(_, top)| shared > top) {
                best = Some((i, shared));
            }
        }

        best.map(|(index, shared)| Match {
            index,
            score: shared as f64,
        })
    }

    fn name(&self) -> &'static str {
        "token_overlap"
    }
}
