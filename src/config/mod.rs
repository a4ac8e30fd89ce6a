//! Bot Configuration Module
//!
//! Store location, matcher tuning, response texts and the HTTP bind address,
//! loaded from TOML.
//!
//! ## Loading Order
//!
//! 1. `--config <PATH>` on the command line (errors are fatal)
//! 2. `TEACHBOT_CONFIG` environment variable (path to TOML file)
//! 3. `teachbot.toml` in the current working directory
//! 4. Built-in defaults
//!
//! ## Usage
//!
//! ```ignore
//! let config = BotConfig::load();
//! let engine = Engine::from_config(&config)?;
//! ```

mod bot_config;
pub mod defaults;
mod validation;

pub use bot_config::*;
pub use validation::{validate_unknown_keys, ValidationWarning};
