//! Bot Configuration - store location, matcher tuning, responses, server
//!
//! Every field has a serde default, so an empty or partial TOML file yields a
//! working configuration.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;
use crate::matcher::MatchStrategy;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration.
///
/// Load with `BotConfig::load()` which searches:
/// 1. `$TEACHBOT_CONFIG` env var
/// 2. `./teachbot.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotConfig {
    /// Knowledge base persistence
    #[serde(default)]
    pub store: StoreConfig,

    /// Question matching strategy and thresholds
    #[serde(default)]
    pub matcher: MatcherConfig,

    /// Fixed response texts
    #[serde(default)]
    pub responses: ResponsesConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

impl BotConfig {
    /// Load configuration using the standard search order:
    /// 1. `$TEACHBOT_CONFIG` environment variable
    /// 2. `./teachbot.toml` in the current working directory
    /// 3. Built-in defaults
    ///
    /// A file that fails to load is logged and skipped.
    pub fn load() -> Self {
        // 1. Check env var
        if let Ok(path) = std::env::var(defaults::CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded config from {}", defaults::CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", defaults::CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", defaults::CONFIG_ENV_VAR);
            }
        }

        // 2. Check ./teachbot.toml
        let local = PathBuf::from(defaults::LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded config from ./{}", defaults::LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", defaults::LOCAL_CONFIG_FILE);
                }
            }
        }

        // 3. Defaults
        info!("No {} found, using built-in defaults", defaults::LOCAL_CONFIG_FILE);
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, err) => ConfigError::Parse(path.to_path_buf(), err),
            other => other,
        })
    }

    /// Parse and validate a TOML document. Unknown keys are logged, not fatal.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validate all values; every problem is collected before returning.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if self.store.path.as_os_str().is_empty() {
            errors.push("store.path must not be empty".to_string());
        }
        if self.store.watch_interval_secs == 0 {
            errors.push("store.watch_interval_secs must be > 0".to_string());
        }

        let cutoff = self.matcher.similarity_cutoff;
        if !cutoff.is_finite() || !(0.0..=1.0).contains(&cutoff) {
            errors.push(format!(
                "matcher.similarity_cutoff must be within [0, 1], got {cutoff}"
            ));
        }
        if self.matcher.min_shared_tokens == 0 {
            errors.push("matcher.min_shared_tokens must be > 0".to_string());
        }
        if self.matcher.stopwords.iter().any(|w| w.trim().is_empty()) {
            errors.push("matcher.stopwords must not contain blank entries".to_string());
        }

        if self.responses.unknown.trim().is_empty() {
            errors.push("responses.unknown must not be empty".to_string());
        }
        if self.responses.learned.trim().is_empty() {
            errors.push("responses.learned must not be empty".to_string());
        }

        if let Err(e) = self.server.addr.parse::<SocketAddr>() {
            errors.push(format!("server.addr '{}' is not a socket address: {e}", self.server.addr));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Store Config
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Knowledge base JSON file.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// Reload the knowledge base when the file changes on disk.
    #[serde(default)]
    pub watch: bool,

    /// Seconds between mtime checks when `watch` is on.
    #[serde(default = "default_watch_interval_secs")]
    pub watch_interval_secs: u64,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(defaults::KNOWLEDGE_BASE_PATH)
}

fn default_watch_interval_secs() -> u64 {
    defaults::STORE_WATCH_INTERVAL_SECS
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            watch: false,
            watch_interval_secs: default_watch_interval_secs(),
        }
    }
}

// ============================================================================
// Matcher Config
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
    #[serde(default)]
    pub strategy: MatchStrategy,

    /// Similarity strategy: minimum ratio (inclusive) in [0, 1].
    #[serde(default = "default_similarity_cutoff")]
    pub similarity_cutoff: f64,

    /// Token-overlap strategy: minimum number of shared tokens.
    #[serde(default = "default_min_shared_tokens")]
    pub min_shared_tokens: usize,

    /// Token-overlap strategy: tokens ignored on both sides.
    #[serde(default)]
    pub stopwords: Vec<String>,
}

fn default_similarity_cutoff() -> f64 {
    defaults::SIMILARITY_CUTOFF
}

fn default_min_shared_tokens() -> usize {
    defaults::MIN_SHARED_TOKENS
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            strategy: MatchStrategy::default(),
            similarity_cutoff: default_similarity_cutoff(),
            min_shared_tokens: default_min_shared_tokens(),
            stopwords: Vec::new(),
        }
    }
}

// ============================================================================
// Responses Config
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesConfig {
    /// Answer given when no known question matches.
    #[serde(default = "default_unknown_response")]
    pub unknown: String,

    /// Confirmation after a successful teach.
    #[serde(default = "default_learned_response")]
    pub learned: String,
}

fn default_unknown_response() -> String {
    defaults::UNKNOWN_RESPONSE.to_string()
}

fn default_learned_response() -> String {
    defaults::LEARNED_RESPONSE.to_string()
}

impl Default for ResponsesConfig {
    fn default() -> Self {
        Self {
            unknown: default_unknown_response(),
            learned: default_learned_response(),
        }
    }
}

// ============================================================================
// Server Config
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server bind address.
    ///
    /// Can be overridden by `TEACHBOT_SERVER_ADDR` env var or `--addr` CLI flag.
    #[serde(default = "default_server_addr")]
    pub addr: String,
}

fn default_server_addr() -> String {
    defaults::SERVER_ADDR.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_server_addr(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
