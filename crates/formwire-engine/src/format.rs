//! Formatting collaborators: currency amounts and summary tables.
//!
//! Hosts usually plug in their own locale-aware formatters.

use formwire_config::CurrencyConfig;
use formwire_core::Value;

/// Formats currency amounts for `formatCurrency()` and `currencySymbol()`.
pub trait CurrencyFormatter {
    fn format(&self, amount: f64, code: &str) -> String;
    fn symbol(&self, code: &str) -> String;
}

/// Two decimals, `,` thousands separator, symbol before or after the amount.
#[derive(Debug, Clone, Default)]
pub struct DefaultCurrencyFormatter {
    pub symbol_first: bool,
}

impl DefaultCurrencyFormatter {
    pub fn from_config(config: &CurrencyConfig) -> Self {
        Self {
            symbol_first: config.symbol_first,
        }
    }
}

impl CurrencyFormatter for DefaultCurrencyFormatter {
    fn format(&self, amount: f64, code: &str) -> String {
        let symbol = self.symbol(code);
        let digits = group_thousands(amount);
        if self.symbol_first {
            format!("{symbol} {digits}")
        } else {
            format!("{digits} {symbol}")
        }
    }

    fn symbol(&self, code: &str) -> String {
        match code {
            "EUR" => "€",
            "USD" => "$",
            "GBP" => "£",
            "JPY" => "¥",
            "INR" => "₹",
            other => other,
        }
        .to_string()
    }
}

fn group_thousands(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{sign}{grouped}.{cents}")
}

/// Renders label/value rows for `getTableForTag()` and `summaryTable()`.
pub trait TableRenderer {
    fn render(&self, rows: &[(String, Value)]) -> String;
}

/// A minimal two-column HTML table with escaped cells.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlTableRenderer;

impl TableRenderer for HtmlTableRenderer {
    fn render(&self, rows: &[(String, Value)]) -> String {
        let mut html = String::from("<table>");
        for (label, value) in rows {
            html.push_str("<tr><th>");
            html.push_str(&escape_html(label));
            html.push_str("</th><td>");
            html.push_str(&escape_html(&value.to_text()));
            html.push_str("</td></tr>");
        }
        html.push_str("</table>");
        html
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn currency_grouping_and_placement() {
        let after = DefaultCurrencyFormatter::default();
        assert_eq!(after.format(1234567.891, "EUR"), "1,234,567.89 €");
        assert_eq!(after.format(-5.0, "USD"), "-5.00 $");
        let before = DefaultCurrencyFormatter { symbol_first: true };
        assert_eq!(before.format(999.5, "CHF"), "CHF 999.50");
    }

    #[test]
    fn table_cells_are_escaped() {
        let rows = vec![
            ("Name".to_string(), Value::from("<b>Ann</b>")),
            ("Age".to_string(), Value::from(42)),
        ];
        assert_eq!(
            HtmlTableRenderer.render(&rows),
            "<table><tr><th>Name</th><td>&lt;b&gt;Ann&lt;/b&gt;</td></tr>\
             <tr><th>Age</th><td>42</td></tr></table>"
        );
    }
}
