//! Surface-similarity matching (Ratcliff/Obershelp "gestalt" ratio)
//!
//! `ratio = 2*M / (len(a) + len(b))` where M is the total length of the
//! matching blocks found by repeatedly taking the longest common substring
//! and recursing on both sides of it. Sequences of 200+ characters discard
//! "popular" characters (more than 1% + 1 occurrences) from the core search,
//! which keeps long inputs from degenerating into whitespace/vowel matches.

use std::collections::HashMap;

use super::{Match, Matcher};
use crate::types::{normalize_question, KnowledgeBase};

/// Length at which the popular-character heuristic kicks in.
const AUTOJUNK_MIN_LEN: usize = 200;

/// Picks the known question with the highest similarity ratio, if it clears
/// the cutoff.
#[derive(Debug, Clone)]
pub struct SimilarityMatcher {
    cutoff: f64,
}

impl SimilarityMatcher {
    pub fn new(cutoff: f64) -> Self {
        Self { cutoff }
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }
}

impl Matcher for SimilarityMatcher {
    fn best_match(&self, input: &str, kb: &KnowledgeBase) -> Option<Match> {
        let input: Vec<char> = normalize_question(input).chars().collect();
        let index = SequenceIndex::new(&input);
        let mut best: Option<Match> = None;

        for (i, entry) in kb.entries().iter().enumerate() {
            let candidate: Vec<char> = entry.key().chars().collect();

            // Upper bounds first; a candidate that can't strictly beat the
            // current best (or reach the cutoff) is skipped. Ties keep the
            // earlier entry.
            let beats = |bound: f64| best.map_or(bound >= self.cutoff, |b| bound > b.score);
            if !beats(length_bound(&candidate, &input)) || !beats(quick_ratio(&candidate, &input)) {
                continue;
            }

            let score = index.ratio_against(&candidate);
            if beats(score) {
                best = Some(Match { index: i, score });
            }
        }
        best
    }

    fn name(&self) -> &'static str {
        "similarity"
    }
}

/// Similarity ratio of two strings in [0, 1]. `a` is compared against `b`;
/// the index is built over `b`.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    SequenceIndex::new(&b).ratio_against(&a)
}

fn ratio_from(matches: usize, total_len: usize) -> f64 {
    if total_len == 0 {
        1.0
    } else {
        2.0 * matches as f64 / total_len as f64
    }
}

/// Best possible ratio given only the lengths.
fn length_bound(a: &[char], b: &[char]) -> f64 {
    ratio_from(a.len().min(b.len()), a.len() + b.len())
}

/// Best possible ratio given the character multisets.
fn quick_ratio(a: &[char], b: &[char]) -> f64 {
    let mut avail: HashMap<char, isize> = HashMap::new();
    for &c in b {
        *avail.entry(c).or_insert(0) += 1;
    }
    let mut matches = 0;
    for &c in a {
        let slot = avail.entry(c).or_insert(0);
        if *slot > 0 {
            matches += 1;
        }
        *slot -= 1;
    }
    ratio_from(matches, a.len() + b.len())
}

/// Positions of each character in the indexed sequence `b`, minus popular
/// characters for long sequences.
struct SequenceIndex<'a> {
    b: &'a [char],
    positions: HashMap<char, Vec<usize>>,
}

impl<'a> SequenceIndex<'a> {
    fn new(b: &'a [char]) -> Self {
        let mut positions: HashMap<char, Vec<usize>> = HashMap::new();
        for (j, &c) in b.iter().enumerate() {
            positions.entry(c).or_default().push(j);
        }
        if b.len() >= AUTOJUNK_MIN_LEN {
            let limit = b.len() / 100 + 1;
            positions.retain(|_, idxs| idxs.len() <= limit);
        }
        Self { b, positions }
    }

    fn ratio_against(&self, a: &[char]) -> f64 {
        ratio_from(self.matching_chars(a), a.len() + self.b.len())
    }

    /// Total size of all matching blocks between `a` and the indexed sequence.
    fn matching_chars(&self, a: &[char]) -> usize {
        let mut total = 0;
        let mut pending = vec![(0, a.len(), 0, self.b.len())];
        while let Some((alo, ahi, blo, bhi)) = pending.pop() {
            let (i, j, k) = self.longest_match(a, alo, ahi, blo, bhi);
            if k == 0 {
                continue;
            }
            total += k;
            if alo < i && blo < j {
                pending.push((alo, i, blo, j));
            }
            if i + k < ahi && j + k < bhi {
                pending.push((i + k, ahi, j + k, bhi));
            }
        }
        total
    }

    /// Longest common block of `a[alo..ahi]` and `b[blo..bhi]`, earliest in
    /// `a` then earliest in `b` on ties. Returns `(i, j, size)`.
    fn longest_match(
        &self,
        a: &[char],
        alo: usize,
        ahi: usize,
        blo: usize,
        bhi: usize,
    ) -> (usize, usize, usize) {
        let b = self.b;
        let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);

        // run_len[j] = length of the match ending at a[i-1], b[j]
        let mut run_len: HashMap<usize, usize> = HashMap::new();
        for (i, c) in a.iter().enumerate().take(ahi).skip(alo) {
            let mut next_run: HashMap<usize, usize> = HashMap::new();
            if let Some(js) = self.positions.get(c) {
                for &j in js {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let k = j
                        .checked_sub(1)
                        .and_then(|prev| run_len.get(&prev))
                        .copied()
                        .unwrap_or(0)
                        + 1;
                    next_run.insert(j, k);
                    if k > best_size {
                        best_i = i + 1 - k;
                        best_j = j + 1 - k;
                        best_size = k;
                    }
                }
            }
            run_len = next_run;
        }

        // Popular characters were left out of the index; let them extend the
        // block at either edge.
        while best_i > alo && best_j > blo && a[best_i - 1] == b[best_j - 1] {
            best_i -= 1;
            best_j -= 1;
            best_size += 1;
        }
        while best_i + best_size < ahi
            && best_j + best_size < bhi
            && a[best_i + best_size] == b[best_j + best_size]
        {
            best_size += 1;
        }

        (best_i, best_j, best_size)
    }
}
