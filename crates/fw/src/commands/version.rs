//! `fw version` -- print version, platform and the effective engine setup.

use anyhow::Result;
use formwire_config::EngineConfig;
use formwire_engine::Builtins;
use serde::Serialize;

use crate::context::RuntimeContext;
use crate::output::output_json;
use crate::styles::render_muted;

/// Version string. Set at compile time via Cargo.toml (workspace version).
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build identifier. Can be overridden via environment variable at build time.
const BUILD: &str = {
    match option_env!("FW_BUILD") {
        Some(b) => b,
        None => "dev",
    }
};

#[derive(Debug, Serialize)]
struct VersionInfo {
    version: &'static str,
    build: &'static str,
    os: &'static str,
    arch: &'static str,
    #[serde(rename = "timer-interval-ms")]
    timer_interval_ms: u64,
    #[serde(rename = "always-publish")]
    always_publish: bool,
    locale: String,
    currency: String,
    builtins: usize,
    config: Option<String>,
}

impl VersionInfo {
    fn new(config: &EngineConfig, config_path: Option<String>) -> Self {
        Self {
            version: VERSION,
            build: BUILD,
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            timer_interval_ms: config.timer_interval_ms,
            always_publish: config.always_publish,
            locale: config.locale.clone(),
            currency: config.currency.code.clone(),
            builtins: Builtins::standard().len(),
            config: config_path,
        }
    }

    /// The engine line printed under the version banner.
    fn engine_line(&self) -> String {
        let mut line = format!(
            "engine: timer {}ms, locale {}, currency {}, {} built-ins",
            self.timer_interval_ms, self.locale, self.currency, self.builtins
        );
        if self.always_publish {
            line.push_str(", always-publish");
        }
        if let Some(path) = &self.config {
            line.push_str(&format!(", config {path}"));
        }
        line
    }
}

/// Execute the `fw version` command.
pub fn run(ctx: &RuntimeContext) -> Result<()> {
    let info = VersionInfo::new(
        &ctx.config,
        ctx.config_path.as_ref().map(|p| p.display().to_string()),
    );

    if ctx.json {
        output_json(&info);
    } else {
        println!("fw version {} ({}) {}/{}", info.version, info.build, info.os, info.arch);
        println!("{}", render_muted(&info.engine_line()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn engine_line_reflects_config() {
        let mut config = EngineConfig::default();
        let info = VersionInfo::new(&config, None);
        assert_eq!(
            info.engine_line(),
            format!("engine: timer 1000ms, locale en, currency EUR, {} built-ins", info.builtins)
        );

        config.timer_interval_ms = 250;
        config.always_publish = true;
        let info = VersionInfo::new(&config, Some("custom.yaml".into()));
        assert!(info.engine_line().starts_with("engine: timer 250ms"));
        assert!(info.engine_line().ends_with(", always-publish, config custom.yaml"));
        assert!(info.builtins > 0);
    }
}
