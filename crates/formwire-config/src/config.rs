//! Engine configuration types and loading.

use std::path::Path;
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// File name looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "formwire.yaml";

/// Prefix of the environment variables overriding file settings, e.g.
/// `FORMWIRE_TIMER_INTERVAL_MS=250` or `FORMWIRE_CURRENCY__CODE=USD`.
pub const ENV_PREFIX: &str = "FORMWIRE_";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read or written.
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// The configuration file contained invalid YAML.
    #[error("failed to parse config file: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// The layered configuration could not be extracted.
    #[error("failed to load configuration: {0}")]
    LoadError(#[from] Box<figment::Error>),

    /// A configuration value was invalid.
    #[error("invalid configuration value for key '{key}': {reason}")]
    InvalidValue {
        /// The configuration key that had an invalid value.
        key: String,
        /// A description of why the value is invalid.
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// A specialized `Result` type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Currency settings read by the currency built-ins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyConfig {
    /// ISO 4217 code (e.g. `"EUR"`).
    #[serde(default = "default_currency_code")]
    pub code: String,

    /// Render the symbol before the amount (`€ 12.00`) instead of after it.
    #[serde(default, rename = "symbol-first")]
    pub symbol_first: bool,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            code: default_currency_code(),
            symbol_first: false,
        }
    }
}

fn default_currency_code() -> String {
    "EUR".to_string()
}

/// Debug settings surfaced through `isDebug()` / `debugLevel()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DebugConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub level: u8,
}

// ---------------------------------------------------------------------------
// Main config struct
// ---------------------------------------------------------------------------

/// The engine configuration, corresponding to `formwire.yaml`.
///
/// Every field has a serde default so a partial file deserializes cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Period of the clock timer driving `now()` and friends.
    #[serde(default = "default_timer_interval_ms", rename = "timer-interval-ms")]
    pub timer_interval_ms: u64,

    /// Publish every evaluation result, even when unchanged.
    #[serde(default, rename = "always-publish")]
    pub always_publish: bool,

    /// Default `tracing` filter directive for the CLI.
    #[serde(default = "default_log_level", rename = "log-level")]
    pub log_level: String,

    /// Locale tag handed to the formatting collaborators.
    #[serde(default = "default_locale")]
    pub locale: String,

    #[serde(default)]
    pub currency: CurrencyConfig,

    #[serde(default)]
    pub debug: DebugConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timer_interval_ms: default_timer_interval_ms(),
            always_publish: false,
            log_level: default_log_level(),
            locale: default_locale(),
            currency: CurrencyConfig::default(),
            debug: DebugConfig::default(),
        }
    }
}

fn default_timer_interval_ms() -> u64 {
    1000
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_locale() -> String {
    "en".to_string()
}

impl EngineConfig {
    pub fn timer_interval(&self) -> Duration {
        Duration::from_millis(self.timer_interval_ms)
    }

    /// Checks values serde cannot: a zero timer interval and malformed
    /// currency codes are rejected.
    pub fn validate(&self) -> Result<()> {
        if self.timer_interval_ms == 0 {
            return Err(ConfigError::invalid(
                "timer-interval-ms",
                "must be greater than zero",
            ));
        }
        let code = &self.currency.code;
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(ConfigError::invalid(
                "currency.code",
                format!("'{code}' is not a three-letter ISO 4217 code"),
            ));
        }
        if self.locale.trim().is_empty() {
            return Err(ConfigError::invalid("locale", "must not be empty"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Builds the layered provider: defaults, then the YAML file, then the
/// environment. A missing file contributes nothing.
pub fn figment(path: &Path) -> Figment {
    Figment::from(Serialized::defaults(EngineConfig::default()))
        .merge(Yaml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).map(|key| {
            key.as_str()
                .to_ascii_lowercase()
                .replace("__", ".")
                .replace('_', "-")
                .into()
        }))
}

/// Loads the layered configuration, reading `path` or [`DEFAULT_CONFIG_FILE`]
/// in the working directory.
///
/// # Errors
///
/// Returns [`ConfigError::LoadError`] if a layer has the wrong shape and
/// [`ConfigError::InvalidValue`] if the merged result fails validation.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    let config: EngineConfig = figment(path).extract().map_err(Box::new)?;
    config.validate()?;
    Ok(config)
}

/// Reads one YAML file without the environment layer.
///
/// A missing or empty file yields the default configuration.
pub fn load_config_file(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        return Ok(EngineConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(EngineConfig::default());
    }

    let config: EngineConfig = serde_yaml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Writes `config` as YAML to `path`, creating parent directories.
pub fn save_config(path: &Path, config: &EngineConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(path, yaml)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.timer_interval(), Duration::from_secs(1));
        assert!(!cfg.always_publish);
        assert_eq!(cfg.currency.code, "EUR");
        assert_eq!(cfg.log_level, "warn");
        cfg.validate().unwrap();
    }

    #[test]
    fn test_load_missing_file_returns_default() {
        let cfg = load_config_file(Path::new("/nonexistent/formwire.yaml")).unwrap();
        assert_eq!(cfg, EngineConfig::default());
    }

    #[test]
    fn test_deserialize_partial_yaml() {
        let yaml = "timer-interval-ms: 250\ncurrency:\n  code: USD\n";
        let cfg: EngineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.timer_interval_ms, 250);
        assert_eq!(cfg.currency.code, "USD");
        // Everything else should be default
        assert!(!cfg.currency.symbol_first);
        assert_eq!(cfg.locale, "en");
    }

    #[test]
    fn test_roundtrip_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("formwire.yaml");

        let mut cfg = EngineConfig::default();
        cfg.always_publish = true;
        cfg.debug.enabled = true;
        cfg.debug.level = 2;

        save_config(&path, &cfg).unwrap();
        assert_eq!(load_config_file(&path).unwrap(), cfg);
    }

    #[test]
    fn test_layered_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("formwire.yaml");
        std::fs::write(&path, "always-publish: true\nlocale: de\n").unwrap();

        let cfg = load_config(Some(path.as_path())).unwrap();
        assert!(cfg.always_publish);
        assert_eq!(cfg.locale, "de");
        assert_eq!(cfg.timer_interval_ms, 1000);
    }

    #[test]
    fn test_layered_load_rejects_wrong_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("formwire.yaml");
        std::fs::write(&path, "timer-interval-ms: soon\n").unwrap();

        let err = load_config(Some(path.as_path())).unwrap_err();
        assert!(matches!(err, ConfigError::LoadError(_)));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut cfg = EngineConfig::default();
        cfg.timer_interval_ms = 0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "timer-interval-ms"
        ));

        let mut cfg = EngineConfig::default();
        cfg.currency.code = "euro".into();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("currency.code"));
    }
}
