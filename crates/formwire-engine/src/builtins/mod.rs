//! The built-in function library.
//!
//! Built-ins are plain function pointers registered by name in a
//! [`Builtins`] table. The compiler checks every call against the table, so
//! an unknown name fails when the expression is created rather than when
//! it first runs.

mod currency;
mod date;
mod math;
mod navigation;
mod operations;
mod summary;
mod text;

use std::collections::BTreeMap;
use std::fmt;

use formwire_core::Value;

use crate::clock::Clock;
use crate::error::BuiltinError;
use crate::format::{CurrencyFormatter, TableRenderer};
use crate::state::AppState;

/// Signature shared by every built-in.
pub type BuiltinFn = fn(&CallContext<'_>, &[Value]) -> Result<Value, BuiltinError>;

/// What a built-in can see besides its arguments.
pub struct CallContext<'a> {
    pub state: &'a AppState,
    pub clock: &'a dyn Clock,
    pub currency: &'a dyn CurrencyFormatter,
    pub tables: &'a dyn TableRenderer,
    /// Scope of the calling expression, e.g. `claims[2]`.
    pub scope: Option<&'a str>,
}

/// One registered function.
#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub category: &'static str,
    pub summary: &'static str,
    pub func: BuiltinFn,
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builtin")
            .field("name", &self.name)
            .field("category", &self.category)
            .finish()
    }
}

/// Name-to-function lookup table.
#[derive(Debug, Clone, Default)]
pub struct Builtins {
    table: BTreeMap<&'static str, Builtin>,
}

impl Builtins {
    /// An empty table.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The standard library: text, math, date, currency, navigation,
    /// operation/workflow state and summary tables.
    pub fn standard() -> Self {
        let mut builtins = Self::empty();
        text::register(&mut builtins);
        math::register(&mut builtins);
        date::register(&mut builtins);
        currency::register(&mut builtins);
        navigation::register(&mut builtins);
        operations::register(&mut builtins);
        summary::register(&mut builtins);
        builtins
    }

    /// Adds or replaces a function.
    pub fn register(&mut self, builtin: Builtin) {
        self.table.insert(builtin.name, builtin);
    }

    pub(crate) fn add(
        &mut self,
        category: &'static str,
        name: &'static str,
        summary: &'static str,
        func: BuiltinFn,
    ) {
        self.register(Builtin {
            name,
            category,
            summary,
            func,
        });
    }

    pub fn get(&self, name: &str) -> Option<&Builtin> {
        self.table.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    /// Calls `name` with `args`.
    pub fn call(
        &self,
        ctx: &CallContext<'_>,
        name: &str,
        args: &[Value],
    ) -> Result<Value, BuiltinError> {
        match self.table.get(name) {
            Some(builtin) => (builtin.func)(ctx, args),
            None => Err(BuiltinError::failed(name, "no such function")),
        }
    }

    /// All functions, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = &Builtin> {
        self.table.values()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

pub(crate) fn expect_args(
    name: &str,
    args: &[Value],
    min: usize,
    max: usize,
) -> Result<(), BuiltinError> {
    if (min..=max).contains(&args.len()) {
        return Ok(());
    }
    let expected = match (min, max) {
        (a, b) if a == b => a.to_string(),
        (a, b) if b == a + 1 => format!("{a} or {b}"),
        (a, usize::MAX) => format!("at least {a}"),
        (a, b) => format!("{a} to {b}"),
    };
    Err(BuiltinError::Arity {
        function: name.to_string(),
        expected,
        actual: args.len(),
    })
}

/// Argument `pos` (0-based) coerced to a number. Only values that coerce to
/// `NaN` without being `NaN` already are rejected.
pub(crate) fn number_arg(name: &str, args: &[Value], pos: usize) -> Result<f64, BuiltinError> {
    let value = args.get(pos).unwrap_or(&Value::Null);
    let n = value.to_number();
    if n.is_nan() && !matches!(value, Value::Number(_)) {
        return Err(BuiltinError::invalid_argument(
            name,
            pos + 1,
            format!("must be a number, got {} '{}'", value.type_name(), value),
        ));
    }
    Ok(n)
}

/// Argument `pos` as text; missing arguments are empty.
pub(crate) fn text_arg(args: &[Value], pos: usize) -> String {
    args.get(pos).map(Value::to_text).unwrap_or_default()
}

/// Flattens list arguments one level, so `sum(a, b)` and `sum([a, b])` agree.
pub(crate) fn flatten(args: &[Value]) -> Vec<&Value> {
    let mut out = Vec::new();
    for arg in args {
        match arg {
            Value::List(items) => out.extend(items.iter()),
            other => out.push(other),
        }
    }
    out
}

/// `null` and blank text count as "no value".
pub(crate) fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Text(s) => s.trim().is_empty(),
        _ => false,
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::clock::ManualClock;
    use crate::format::{DefaultCurrencyFormatter, HtmlTableRenderer};

    /// 2024-03-15T10:30:00Z
    pub const NOW: i64 = 1_710_498_600_000;

    pub struct Harness {
        pub state: AppState,
        pub clock: ManualClock,
        pub currency: DefaultCurrencyFormatter,
        pub tables: HtmlTableRenderer,
        pub scope: Option<String>,
    }

    impl Harness {
        pub fn new() -> Self {
            Self {
                state: AppState::default(),
                clock: ManualClock::new(NOW),
                currency: DefaultCurrencyFormatter::default(),
                tables: HtmlTableRenderer,
                scope: None,
            }
        }

        pub fn call(&self, name: &str, args: Vec<Value>) -> Result<Value, BuiltinError> {
            let ctx = CallContext {
                state: &self.state,
                clock: &self.clock,
                currency: &self.currency,
                tables: &self.tables,
                scope: self.scope.as_deref(),
            };
            Builtins::standard().call(&ctx, name, &args)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::Harness;
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unknown_name_fails() {
        let err = Harness::new().call("nope", vec![]).unwrap_err();
        assert_eq!(err, BuiltinError::failed("nope", "no such function"));
    }

    #[test]
    fn arity_messages() {
        let err = expect_args("round", &[], 1, 2).unwrap_err();
        assert_eq!(err.to_string(), "round() expects 1 or 2 argument(s), got 0");
        let err = expect_args("concat", &[], 1, usize::MAX).unwrap_err();
        assert_eq!(
            err.to_string(),
            "concat() expects at least 1 argument(s), got 0"
        );
    }

    #[test]
    fn standard_library_is_populated() {
        let builtins = Builtins::standard();
        for name in ["substring", "sum", "now", "formatCurrency", "isFirstArticle"] {
            assert!(builtins.contains(name), "{name} missing");
        }
        assert!(!builtins.contains("getFieldValue"));
    }

    #[test]
    fn number_arg_coerces_and_rejects() {
        let args = vec![Value::from("12.5"), Value::from("abc"), Value::Number(f64::NAN)];
        assert_eq!(number_arg("f", &args, 0).unwrap(), 12.5);
        assert!(number_arg("f", &args, 1).is_err());
        assert!(number_arg("f", &args, 2).unwrap().is_nan());
        assert_eq!(number_arg("f", &args, 7).unwrap(), 0.0);
    }
}
