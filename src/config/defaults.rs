//! System-wide default constants.
//!
//! Centralises values that would otherwise be scattered across the codebase.
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Config Discovery
// ============================================================================

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "TEACHBOT_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "teachbot.toml";

// ============================================================================
// Store
// ============================================================================

/// Knowledge base file used when none is configured.
pub const KNOWLEDGE_BASE_PATH: &str = "knowledge_base.json";

/// Interval between mtime checks when the store watcher is enabled (seconds).
pub const STORE_WATCH_INTERVAL_SECS: u64 = 2;

/// Debounce after a detected change before reloading (milliseconds).
///
/// Editors often write in stages.
pub const STORE_WATCH_DEBOUNCE_MS: u64 = 500;

// ============================================================================
// Matcher
// ============================================================================

/// Minimum similarity ratio for a known question to count as a match.
pub const SIMILARITY_CUTOFF: f64 = 0.5;

/// Minimum shared tokens for the token-overlap strategy.
pub const MIN_SHARED_TOKENS: usize = 1;

// ============================================================================
// Responses
// ============================================================================

/// Returned by a query when no known question matches.
pub const UNKNOWN_RESPONSE: &str = "I don't know the answer. Can you teach me?";

/// Returned after a successful teach.
pub const LEARNED_RESPONSE: &str = "Thank you! I learned a new response.";

// ============================================================================
// Server
// ============================================================================

/// HTTP bind address.
pub const SERVER_ADDR: &str = "127.0.0.1:5000";

/// Environment override for the bind address.
pub const SERVER_ADDR_ENV_VAR: &str = "TEACHBOT_SERVER_ADDR";

/// Comma-separated list of allowed CORS origins.
pub const CORS_ORIGINS_ENV_VAR: &str = "TEACHBOT_CORS_ORIGINS";

/// Largest accepted request body (bytes).
pub const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;
