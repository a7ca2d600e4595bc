//! Output formatting helpers for the `fw` CLI.

use formwire_core::Value;
use serde::Serialize;
use std::io::{self, Write};

/// Renders a formula result for humans: text as-is, everything else as
/// compact JSON.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Text(text) => text.clone(),
        other => serde_json::to_string(other).unwrap_or_else(|_| other.to_text()),
    }
}

/// Print a value as pretty-printed JSON to stdout.
///
/// Terminates the process with exit code 1 if serialization fails.
pub fn output_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            // Ignore broken pipe errors (e.g., piped to `head`)
            let _ = writeln!(handle, "{}", json);
        }
        Err(e) => {
            eprintln!("Error: failed to serialize JSON: {}", e);
            std::process::exit(1);
        }
    }
}

/// Print a simple table with headers and rows.
pub fn output_table(headers: &[&str], rows: &[Vec<String>]) {
    if rows.is_empty() {
        return;
    }
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let _ = write!(handle, "{}", format_table(headers, rows));
}

/// Renders `rows` under `headers` with columns padded to their widest cell.
pub fn format_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }

    let mut out = String::new();
    let header: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    push_row(&mut out, &header, &widths);
    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_row(&mut out, &separator, &widths);
    for row in rows {
        push_row(&mut out, row, &widths);
    }
    out
}

fn push_row(out: &mut String, row: &[String], widths: &[usize]) {
    let last = row.len().saturating_sub(1);
    for (i, cell) in row.iter().enumerate() {
        if i > 0 {
            out.push_str("  ");
        }
        match widths.get(i) {
            // The last column is not padded to avoid trailing spaces.
            Some(width) if i < last => out.push_str(&format!("{:<width$}", cell, width = *width)),
            _ => out.push_str(cell),
        }
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn table_columns_align() {
        let rows = vec![
            vec!["round".into(), "math".into(), "-".into()],
            vec!["today".into(), "date".into(), "clock".into()],
        ];
        let table = format_table(&["NAME", "CATEGORY", "GROUP"], &rows);
        assert_eq!(
            table,
            "NAME   CATEGORY  GROUP\n\
             -----  --------  -----\n\
             round  math      -\n\
             today  date      clock\n"
        );
    }

    #[test]
    fn values_render_as_text_or_json() {
        assert_eq!(format_value(&Value::from("hello")), "hello");
        assert_eq!(format_value(&Value::Null), "null");
        assert_eq!(format_value(&Value::from(12)), "12");
        assert_eq!(format_value(&Value::from(2.5)), "2.5");
        assert_eq!(
            format_value(&Value::from(vec![Value::from(true), Value::from("a")])),
            "[true,\"a\"]"
        );
    }

    #[test]
    fn table_output_smoke() {
        output_table(&["A"], &[vec!["x".into()]]);
        output_table(&["A"], &[]);
    }
}
