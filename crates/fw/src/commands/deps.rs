//! `fw deps` -- show what a formula subscribes to.

use anyhow::{Context, Result};
use formwire_channels::Channel;
use formwire_engine::{AggregateSource, ArgumentKind, Expression, References};
use serde::Serialize;

use super::{form, options};
use crate::cli::DepsArgs;
use crate::context::RuntimeContext;
use crate::output::output_json;
use crate::styles::{render_category, render_muted};

#[derive(Serialize)]
struct DepsOutput<'a> {
    source: &'a str,
    rewritten: String,
    constant: bool,
    references: &'a References,
}

/// Execute the `fw deps` command.
pub fn run(ctx: &RuntimeContext, args: &DepsArgs) -> Result<()> {
    let deps = form(&ctx.config, &args.bindings)?;
    let mut opts = options(&args.bindings)?;
    for name in &args.external {
        opts = opts.external(name.clone(), Channel::replaying(format!("external:{name}"), None));
    }
    let expression =
        Expression::new(&args.expression, opts, &deps).context("cannot compile expression")?;

    if ctx.json {
        output_json(&DepsOutput {
            source: expression.source(),
            rewritten: expression.rewritten(),
            constant: expression.is_constant(),
            references: expression.dependencies(),
        });
    } else {
        print!("{}", describe(&expression.rewritten(), expression.dependencies()));
    }

    expression.dispose();
    deps.teardown();
    Ok(())
}

/// Human-readable listing, one section per non-empty reference kind.
fn describe(rewritten: &str, refs: &References) -> String {
    let mut out = format!("{}\n", render_muted(rewritten));
    if refs.is_constant() && refs.arguments.is_empty() {
        out.push_str("constant: no dependencies\n");
        return out;
    }

    let aggregates: Vec<String> = refs
        .aggregates
        .iter()
        .map(|source| match source {
            AggregateSource::Pattern(pattern) => format!("pattern {pattern}"),
            AggregateSource::Tag(tag) => format!("tag {tag}"),
        })
        .collect();
    let arguments: Vec<String> = refs
        .arguments
        .iter()
        .map(|(name, kind)| match kind {
            ArgumentKind::Fixed => format!("{name} (fixed)"),
            ArgumentKind::External => format!("{name} (external)"),
        })
        .collect();

    let sections: [(&str, &[String]); 9] = [
        ("field values", &refs.field_values),
        ("search terms", &refs.search_terms),
        ("validities", &refs.validities),
        ("repeat counts", &refs.repeat_counts),
        ("aggregates", &aggregates),
        ("tables", &refs.tables),
        ("question sets", &refs.question_sets),
        ("functions", &refs.functions),
        ("arguments", &arguments),
    ];
    for (title, items) in sections {
        if items.is_empty() {
            continue;
        }
        out.push_str(&render_category(title));
        out.push('\n');
        for item in items {
            out.push_str(&format!("  {item}\n"));
        }
    }
    out
}
