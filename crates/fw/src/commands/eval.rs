//! `fw eval` -- compile and evaluate one formula.

use anyhow::{Context, Result};
use formwire_engine::Expression;
use serde::Serialize;

use super::{form, options};
use crate::cli::EvalArgs;
use crate::context::RuntimeContext;
use crate::output::{format_value, output_json};
use crate::styles::render_muted;

#[derive(Serialize)]
struct EvalOutput<'a> {
    source: &'a str,
    rewritten: String,
    constant: bool,
    value: formwire_core::Value,
}

/// Execute the `fw eval` command.
pub fn run(ctx: &RuntimeContext, args: &EvalArgs) -> Result<()> {
    let deps = form(&ctx.config, &args.bindings)?;
    let expression = Expression::new(&args.expression, options(&args.bindings)?, &deps)
        .context("cannot compile expression")?;
    let value = expression.evaluate()?;

    if ctx.json {
        output_json(&EvalOutput {
            source: expression.source(),
            rewritten: expression.rewritten(),
            constant: expression.is_constant(),
            value,
        });
    } else {
        if args.explain && !ctx.quiet {
            println!("{}", render_muted(&expression.rewritten()));
        }
        println!("{}", format_value(&value));
    }

    expression.dispose();
    deps.teardown();
    Ok(())
}
