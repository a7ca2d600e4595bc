//! Command handlers, one module per subcommand.

pub mod completion;
pub mod deps;
pub mod eval;
pub mod functions;
pub mod replay;
pub mod version;

use std::rc::Rc;

use anyhow::{Result, bail};
use formwire_core::Value;
use formwire_engine::{Dependencies, ExpressionOptions};

use crate::cli::BindingArgs;

/// Splits a `NAME=JSON` binding. The value is parsed as JSON and falls back
/// to plain text when it is not valid JSON.
pub fn parse_binding(raw: &str) -> Result<(String, Value)> {
    let Some((name, value)) = raw.split_once('=') else {
        bail!("invalid binding '{raw}': expected NAME=VALUE");
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("invalid binding '{raw}': name is empty");
    }
    let value = match serde_json::from_str::<serde_json::Value>(value) {
        Ok(json) => Value::from(json),
        Err(_) => Value::from(value),
    };
    Ok((name.to_string(), value))
}

/// Registers every `--field` on the form.
pub fn add_fields(deps: &Dependencies, fields: &[String]) -> Result<()> {
    for raw in fields {
        let (path, value) = parse_binding(raw)?;
        deps.channels.add_field(&path, value, Vec::new());
    }
    Ok(())
}

/// Expression options from the shared binding flags.
pub fn options(bindings: &BindingArgs) -> Result<ExpressionOptions> {
    let mut options = ExpressionOptions::new();
    if let Some(scope) = &bindings.scope {
        options = options.scope(scope.clone());
    }
    if let Some(label) = &bindings.label {
        options = options.debug_label(label.clone());
    }
    for raw in &bindings.fixed {
        let (name, value) = parse_binding(raw)?;
        options = options.fixed(name, value);
    }
    Ok(options)
}

/// A fresh form with `bindings` applied.
pub fn form(config: &formwire_config::EngineConfig, bindings: &BindingArgs) -> Result<Rc<Dependencies>> {
    let deps = Dependencies::new(config.clone());
    add_fields(&deps, &bindings.fields)?;
    Ok(deps)
}
