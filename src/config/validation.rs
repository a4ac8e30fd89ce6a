//! Unknown-key detection with "did you mean?" suggestions.
//!
//! The raw TOML is walked as a `toml::Value` before serde sees it. Every
//! dotted key path that the config structs don't declare produces a warning.
//! Warnings never fail a load; serde ignores unknown fields.

use std::collections::HashSet;

/// A non-fatal config warning.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Every valid dotted key path, in declaration order.
///
/// Kept by hand in step with `bot_config.rs`.
const KNOWN_KEYS: &[&str] = &[
    // [store]
    "store",
    "store.path",
    "store.watch",
    "store.watch_interval_secs",
    // [matcher]
    "matcher",
    "matcher.strategy",
    "matcher.similarity_cutoff",
    "matcher.min_shared_tokens",
    "matcher.stopwords",
    // [responses]
    "responses",
    "responses.unknown",
    "responses.learned",
    // [server]
    "server",
    "server.addr",
];

pub fn known_config_keys() -> HashSet<&'static str> {
    KNOWN_KEYS.iter().copied().collect()
}

/// Dotted paths of every key in `value`, tables included.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

/// Edit distance over chars.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Closest known key within 3 edits; the first declared key wins a tie.
pub fn suggest_correction(unknown: &str) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;
    for &k in KNOWN_KEYS {
        let dist = levenshtein(unknown, k);
        if dist <= 3 && best.map_or(true, |(_, best_dist)| dist < best_dist) {
            best = Some((k, dist));
        }
    }
    best.map(|(k, _)| k.to_string())
}

pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("store", "store"), 0);
        assert_eq!(levenshtein("stor", "store"), 1);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("café", "cafe"), 1);
    }

    #[test]
    fn test_walk_toml_keys_nested() {
        let value: toml::Value = toml::from_str("[store]\npath = \"kb.json\"\n").unwrap();
        let keys = walk_toml_keys(&value, "");
        assert!(keys.contains(&"store".to_string()));
        assert!(keys.contains(&"store.path".to_string()));
    }

    #[test]
    fn test_typo_key_produces_warning_with_suggestion() {
        let warnings = validate_unknown_keys("[matcher]\nsimilarity_cutof = 0.6\n");
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, "matcher.similarity_cutof");
        assert_eq!(
            warnings[0].suggestion.as_deref(),
            Some("matcher.similarity_cutoff")
        );
        assert!(warnings[0].to_string().contains("did you mean"));
    }

    #[test]
    fn test_all_valid_keys_produce_zero_warnings() {
        let toml_str = r#"
[store]
path = "kb.json"
watch = true
watch_interval_secs = 5

[matcher]
strategy = "token_overlap"
similarity_cutoff = 0.6
min_shared_tokens = 2
stopwords = ["the"]

[responses]
unknown = "No idea."
learned = "Got it."

[server]
addr = "0.0.0.0:8080"
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert!(warnings.is_empty(), "{warnings:?}");
    }

    #[test]
    fn test_unknown_section_without_close_match() {
        let warnings = validate_unknown_keys("[telemetry]\nendpoint = \"x\"\n");
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().all(|w| w.suggestion.is_none()));
    }

    #[test]
    fn test_unparseable_toml_yields_no_warnings() {
        assert!(validate_unknown_keys("[store").is_empty());
    }
}
