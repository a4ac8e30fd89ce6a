//! Knowledge base types: answers, entries and the ordered entry list
//!
//! Entries are keyed by their *normalized* question (lower-case, whitespace
//! collapsed). The list never holds two entries with the same key; teaching a
//! known question appends to that entry's answers instead.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejected caller-supplied text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TextError {
    #[error("{0} must not be empty")]
    Empty(&'static str),
}

/// Normalize a question for comparison: lower-case, whitespace runs collapsed,
/// trimmed.
pub fn normalize_question(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn trimmed_non_empty(text: &str, field: &'static str) -> Result<String, TextError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Err(TextError::Empty(field))
    } else {
        Ok(trimmed.to_string())
    }
}

// ============================================================================
// Answer
// ============================================================================

/// One stored answer. Always non-empty and trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Answer(String);

impl Answer {
    pub fn new(text: &str) -> Result<Self, TextError> {
        trimmed_non_empty(text, "answer").map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Answer {
    type Error = TextError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Answer> for String {
    fn from(answer: Answer) -> Self {
        answer.0
    }
}

impl std::fmt::Display for Answer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Entry
// ============================================================================

/// A known question with its acceptable answers, in the order they were taught.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    question: String,
    key: String,
    answers: Vec<Answer>,
}

impl Entry {
    /// Build an entry with a single answer. Both texts are trimmed and must be
    /// non-empty.
    pub fn new(question: &str, answer: &str) -> Result<Self, TextError> {
        let question = trimmed_non_empty(question, "question")?;
        let answer = Answer::new(answer)?;
        Ok(Self {
            key: normalize_question(&question),
            question,
            answers: vec![answer],
        })
    }

    /// The question as it was first taught (trimmed, original casing).
    pub fn question(&self) -> &str {
        &self.question
    }

    /// Normalized form used for duplicate detection and matching.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn answers(&self) -> &[Answer] {
        &self.answers
    }

    /// Append an answer unless an identical one is already stored.
    ///
    /// Returns `false` when the answer was a duplicate.
    fn push_answer(&mut self, answer: Answer) -> bool {
        if self.answers.contains(&answer) {
            return false;
        }
        self.answers.push(answer);
        true
    }
}

// ============================================================================
// Knowledge Base
// ============================================================================

/// What an append did to the knowledge base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppendOutcome {
    /// No entry matched; a new one was created.
    Created,
    /// The answer was added to an existing entry.
    Appended,
    /// The entry already held this exact answer; nothing changed.
    AlreadyKnown,
}

impl AppendOutcome {
    pub fn changed(self) -> bool {
        !matches!(self, Self::AlreadyKnown)
    }
}

/// Ordered list of entries with unique normalized questions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnowledgeBase {
    entries: Vec<Entry>,
}

impl KnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from entries, merging any that share a normalized question.
    ///
    /// The first occurrence keeps its position and wording; later duplicates
    /// contribute their answers in order.
    pub fn from_entries(entries: impl IntoIterator<Item = Entry>) -> Self {
        let mut kb = Self::new();
        for entry in entries {
            kb.merge(entry);
        }
        kb
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Look up an entry by question, ignoring case and whitespace differences.
    pub fn find(&self, question: &str) -> Option<&Entry> {
        self.position(&normalize_question(question))
            .map(|idx| &self.entries[idx])
    }

    /// Total number of stored answers across all entries.
    pub fn answer_count(&self) -> usize {
        self.entries.iter().map(|e| e.answers.len()).sum()
    }

    /// Teach `answer` for `question`, merging into an existing entry if the
    /// normalized question is already known.
    pub fn insert(&mut self, question: &str, answer: &str) -> Result<AppendOutcome, TextError> {
        Entry::new(question, answer).map(|entry| self.merge(entry))
    }

    /// Merge an already validated entry: append its answers to the matching
    /// entry, or add it at the end.
    pub fn merge(&mut self, entry: Entry) -> AppendOutcome {
        match self.position(&entry.key) {
            Some(idx) => {
                let existing = &mut self.entries[idx];
                let mut added = false;
                for answer in entry.answers {
                    added |= existing.push_answer(answer);
                }
                if added {
                    AppendOutcome::Appended
                } else {
                    AppendOutcome::AlreadyKnown
                }
            }
            None => {
                self.entries.push(entry);
                AppendOutcome::Created
            }
        }
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.key == key)
    }
}

// ============================================================================
// Persisted Document Shape
// ============================================================================

/// On-disk document: `{ "questions": [ { "question": ..., "answers": [...] } ] }`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeBaseDocument {
    pub questions: Vec<EntryRecord>,
}

/// One persisted entry.
///
/// `answer` is the legacy single-answer field; it is read but never written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryRecord {
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answers: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

impl KnowledgeBase {
    /// Convert a decoded document into a validated knowledge base.
    ///
    /// The error string names the offending record.
    pub fn from_document(doc: KnowledgeBaseDocument) -> Result<Self, String> {
        let mut entries = Vec::with_capacity(doc.questions.len());
        for (idx, record) in doc.questions.into_iter().enumerate() {
            let question = trimmed_non_empty(&record.question, "question")
                .map_err(|e| format!("record {idx}: {e}"))?;

            let texts: Vec<String> = record
                .answers
                .into_iter()
                .flatten()
                .chain(record.answer)
                .collect();
            if texts.is_empty() {
                return Err(format!("record {idx} ({question:?}) has no answers"));
            }

            let mut answers = Vec::with_capacity(texts.len());
            for text in &texts {
                let answer = Answer::new(text).map_err(|e| format!("record {idx} ({question:?}): {e}"))?;
                if !answers.contains(&answer) {
                    answers.push(answer);
                }
            }

            entries.push(Entry {
                key: normalize_question(&question),
                question,
                answers,
            });
        }
        Ok(Self::from_entries(entries))
    }

    /// The persisted form. Always uses the `answers` array shape.
    pub fn to_document(&self) -> KnowledgeBaseDocument {
        KnowledgeBaseDocument {
            questions: self
                .entries
                .iter()
                .map(|e| EntryRecord {
                    question: e.question.clone(),
                    answers: Some(e.answers.iter().map(|a| a.as_str().to_string()).collect()),
                    answer: None,
                })
                .collect(),
        }
    }
}
