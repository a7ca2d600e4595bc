//! Runtime context for command execution.
//!
//! The [`RuntimeContext`] holds the global flags and the resolved engine
//! configuration every command handler works with.

use std::path::PathBuf;

use anyhow::{Context, Result};
use formwire_config::{EngineConfig, load_config};

use crate::cli::GlobalArgs;

/// Runtime context passed to every command handler.
///
/// Constructed once in `main` after CLI parsing, before command dispatch.
#[derive(Debug)]
pub struct RuntimeContext {
    /// Engine configuration merged from defaults, file and environment.
    pub config: EngineConfig,

    /// Explicit `--config` path, if any.
    pub config_path: Option<PathBuf>,

    /// Whether to produce JSON output.
    pub json: bool,

    /// Verbose output.
    pub verbose: bool,

    /// Quiet mode: suppress non-essential output.
    pub quiet: bool,
}

impl RuntimeContext {
    /// Build a `RuntimeContext` from parsed global arguments, loading the
    /// engine configuration.
    pub fn from_global_args(global: &GlobalArgs) -> Result<Self> {
        let config = load_config(global.config.as_deref()).with_context(|| match &global.config {
            Some(path) => format!("failed to load config from {}", path.display()),
            None => "failed to load config".to_string(),
        })?;

        Ok(Self {
            config,
            config_path: global.config.clone(),
            json: global.json,
            verbose: global.verbose,
            quiet: global.quiet,
        })
    }

    /// The filter directive for the tracing subscriber.
    pub fn log_filter(&self) -> String {
        if self.verbose {
            "fw=debug,formwire=debug".to_string()
        } else if self.quiet {
            "error".to_string()
        } else {
            self.config.log_level.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn globals() -> GlobalArgs {
        GlobalArgs {
            config: None,
            json: false,
            verbose: false,
            quiet: false,
        }
    }

    #[test]
    fn verbose_overrides_configured_level() {
        let mut global = globals();
        global.config = Some(PathBuf::from("/nonexistent/formwire.yaml"));
        global.verbose = true;
        let ctx = RuntimeContext::from_global_args(&global).unwrap();
        assert_eq!(ctx.log_filter(), "fw=debug,formwire=debug");
    }

    #[test]
    fn config_file_sets_log_level() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("formwire.yaml");
        std::fs::write(&path, "log-level: info\n").unwrap();
        let mut global = globals();
        global.config = Some(path);
        let ctx = RuntimeContext::from_global_args(&global).unwrap();
        assert_eq!(ctx.log_filter(), "info");

        global.quiet = true;
        let ctx = RuntimeContext::from_global_args(&global).unwrap();
        assert_eq!(ctx.log_filter(), "error");
    }
}
