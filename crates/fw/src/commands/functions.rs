//! `fw functions` -- list the built-in function library.

use anyhow::{Result, bail};
use formwire_engine::invalidation::group_for;
use formwire_engine::{Builtins, LEGACY_FUNCTIONS, STRUCTURAL_FUNCTIONS};
use serde::Serialize;

use crate::cli::FunctionsArgs;
use crate::context::RuntimeContext;
use crate::output::{output_json, output_table};
use crate::styles::render_category;

#[derive(Debug, Serialize, PartialEq)]
struct FunctionRow {
    name: &'static str,
    category: &'static str,
    /// Invalidation group that re-evaluates callers, if any.
    group: Option<&'static str>,
    summary: &'static str,
}

#[derive(Serialize)]
struct FunctionsOutput {
    builtins: Vec<FunctionRow>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    structural: Vec<FunctionRow>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    legacy: Vec<FunctionRow>,
}

/// Execute the `fw functions` command.
pub fn run(ctx: &RuntimeContext, args: &FunctionsArgs) -> Result<()> {
    let builtins = Builtins::standard();
    let rows = builtin_rows(&builtins, args.category.as_deref());
    if rows.is_empty() {
        if let Some(category) = &args.category {
            bail!("no built-ins in category '{category}'");
        }
    }

    let (structural, legacy) = if args.all {
        (
            fixed_rows(STRUCTURAL_FUNCTIONS, "structural"),
            fixed_rows(LEGACY_FUNCTIONS, "legacy"),
        )
    } else {
        (Vec::new(), Vec::new())
    };

    if ctx.json {
        output_json(&FunctionsOutput {
            builtins: rows,
            structural,
            legacy,
        });
        return Ok(());
    }

    print_rows(&rows);
    for (title, extra) in [("structural", &structural), ("legacy", &legacy)] {
        if extra.is_empty() {
            continue;
        }
        println!();
        println!("{}", render_category(title));
        print_rows(extra);
    }
    Ok(())
}

fn builtin_rows(builtins: &Builtins, category: Option<&str>) -> Vec<FunctionRow> {
    let mut rows: Vec<FunctionRow> = builtins
        .iter()
        .filter(|b| category.is_none_or(|c| b.category.eq_ignore_ascii_case(c)))
        .map(|b| FunctionRow {
            name: b.name,
            category: b.category,
            group: group_for(b.name).map(|g| g.name),
            summary: b.summary,
        })
        .collect();
    rows.sort_by(|a, b| a.category.cmp(b.category).then(a.name.cmp(b.name)));
    rows
}

fn fixed_rows(table: &'static [(&'static str, &'static str)], category: &'static str) -> Vec<FunctionRow> {
    table
        .iter()
        .map(|&(name, summary)| FunctionRow {
            name,
            category,
            group: None,
            summary,
        })
        .collect()
}

fn print_rows(rows: &[FunctionRow]) {
    let table: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            vec![
                r.name.to_string(),
                r.category.to_string(),
                r.group.unwrap_or("-").to_string(),
                r.summary.to_string(),
            ]
        })
        .collect();
    output_table(&["NAME", "CATEGORY", "GROUP", "SUMMARY"], &table);
}
