//! Configuration management for the formwire engine.
//!
//! The main entry point is [`EngineConfig`]. It is layered with `figment`:
//! built-in defaults, then `formwire.yaml` (or an explicit path), then
//! `FORMWIRE_`-prefixed environment variables. [`save_config`] writes the
//! YAML form back out.

pub mod config;

// Re-exports for convenience.
pub use config::{
    ConfigError, CurrencyConfig, DEFAULT_CONFIG_FILE, DebugConfig, EngineConfig, Result,
    load_config, load_config_file, save_config,
};
