//! The dynamic value model.
//!
//! Formulas are untyped: a field may hold a number today and a string
//! tomorrow. [`Value`] is the single representation used by channels,
//! projections and the evaluator, with C-family coercion rules for
//! truthiness, arithmetic and comparison.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize, Serializer};

/// A dynamically typed formula value.
///
/// `PartialEq` is strict equality: variants must match and numbers compare
/// with IEEE semantics (`NaN != NaN`). Use [`Value::loose_eq`] for `==`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// A compiled `/pattern/flags` literal. Only produced by the evaluator.
    #[serde(skip_deserializing)]
    Regex(Arc<RegexValue>),
}

/// A regular-expression literal together with its source and flags.
#[derive(Debug, Clone)]
pub struct RegexValue {
    source: String,
    flags: String,
    regex: Regex,
}

impl RegexValue {
    /// Compiles `source` with formula-style flags (`i`, `m`, `s`, `g`).
    pub fn new(source: &str, flags: &str) -> Result<Self, regex::Error> {
        let regex = RegexBuilder::new(source)
            .case_insensitive(flags.contains('i'))
            .multi_line(flags.contains('m'))
            .dot_matches_new_line(flags.contains('s'))
            .build()?;
        Ok(Self {
            source: source.to_owned(),
            flags: flags.to_owned(),
            regex,
        })
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn flags(&self) -> &str {
        &self.flags
    }

    /// `true` when the `g` flag asks for every match to be replaced.
    pub fn is_global(&self) -> bool {
        self.flags.contains('g')
    }
}

impl PartialEq for RegexValue {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.flags == other.flags
    }
}

impl fmt::Display for RegexValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.source, self.flags)
    }
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            // Integral numbers serialize without a trailing `.0`.
            Self::Number(n) if is_integral(*n) => serializer.serialize_i64(*n as i64),
            Self::Number(n) => serializer.serialize_f64(*n),
            Self::Text(s) => serializer.serialize_str(s),
            Self::List(items) => items.serialize(serializer),
            Self::Map(map) => map.serialize(serializer),
            Self::Regex(re) => serializer.serialize_str(&re.to_string()),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::Text(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Self::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

// ---------------------------------------------------------------------------
// Coercions
// ---------------------------------------------------------------------------

impl Value {
    /// A short name for the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Text(_) => "text",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Regex(_) => "regex",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// `null`, `false`, `0`, `NaN` and the empty string are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::Text(s) => !s.is_empty(),
            Self::List(_) | Self::Map(_) | Self::Regex(_) => true,
        }
    }

    /// Returns the number if this is a [`Value::Number`].
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the text if this is a [`Value::Text`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the items if this is a [`Value::List`].
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Numeric coercion: `null` is 0, booleans are 0/1, text is parsed
    /// (blank text is 0), anything unparseable is `NaN`.
    pub fn to_number(&self) -> f64 {
        match self {
            Self::Null => 0.0,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Number(n) => *n,
            Self::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            Self::List(items) if items.is_empty() => 0.0,
            Self::List(items) if items.len() == 1 => items[0].to_number(),
            Self::List(_) | Self::Map(_) | Self::Regex(_) => f64::NAN,
        }
    }

    /// Text coercion used for concatenation and display. `null` renders as
    /// the empty string.
    pub fn to_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => format_number(*n),
            Self::Text(s) => s.clone(),
            Self::List(items) => items
                .iter()
                .map(Value::to_text)
                .collect::<Vec<_>>()
                .join(","),
            Self::Map(_) => serde_json::to_string(self).unwrap_or_default(),
            Self::Regex(re) => re.to_string(),
        }
    }

    /// Loose (`==`) equality: booleans and numeric text are compared as
    /// numbers; `null` equals only `null`.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Null, _) | (_, Self::Null) => false,
            (Self::Bool(_), _) => Value::Number(self.to_number()).loose_eq(other),
            (_, Self::Bool(_)) => self.loose_eq(&Value::Number(other.to_number())),
            (Self::Number(a), Self::Text(_)) => *a == other.to_number(),
            (Self::Text(_), Self::Number(b)) => self.to_number() == *b,
            _ => self == other,
        }
    }

    /// Relational ordering. Two texts compare lexicographically; everything
    /// else compares numerically. `None` when either side is `NaN`.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            _ => self.to_number().partial_cmp(&other.to_number()),
        }
    }

    /// Property access (`value.name`).
    ///
    /// Returns `None` when the receiver is `null`, which the evaluator treats
    /// as an error. Missing properties yield `Some(Value::Null)`.
    pub fn member(&self, name: &str) -> Option<Value> {
        match self {
            Self::Null => None,
            Self::Map(map) => Some(map.get(name).cloned().unwrap_or_default()),
            Self::Text(s) if name == "length" => Some(Value::from(s.chars().count())),
            Self::List(items) if name == "length" => Some(Value::from(items.len())),
            _ => Some(Value::Null),
        }
    }

    /// Index access (`value[index]`). Returns `None` when the receiver is
    /// `null`; out-of-range indices yield `Some(Value::Null)`.
    pub fn index(&self, index: &Value) -> Option<Value> {
        match (self, index) {
            (Self::Null, _) => None,
            (Self::List(items), idx) => Some(
                as_index(idx)
                    .and_then(|i| items.get(i).cloned())
                    .unwrap_or_default(),
            ),
            (Self::Text(s), idx) => Some(
                as_index(idx)
                    .and_then(|i| s.chars().nth(i))
                    .map(|c| Value::Text(c.to_string()))
                    .unwrap_or_default(),
            ),
            (_, Self::Text(name)) => self.member(name),
            _ => Some(Value::Null),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn is_integral(n: f64) -> bool {
    n.is_finite() && n.fract() == 0.0 && n.abs() < 9.0e15
}

fn as_index(value: &Value) -> Option<usize> {
    let n = value.to_number();
    if n.is_finite() && n >= 0.0 && n.fract() == 0.0 {
        Some(n as usize)
    } else {
        None
    }
}

/// Formats a number the way formula authors expect: integers without a
/// decimal point, `NaN` and `Infinity` spelled out.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_owned()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_owned()
    } else if n.fract() == 0.0 {
        format!("{n:.0}")
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::from(0.0).is_truthy());
        assert!(!Value::from(f64::NAN).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("0").is_truthy());
        assert!(Value::List(vec![]).is_truthy());
    }

    #[test]
    fn strict_equality_distinguishes_types() {
        assert_ne!(Value::from(1.0), Value::from("1"));
        assert_ne!(Value::from(f64::NAN), Value::from(f64::NAN));
        assert_eq!(Value::from(vec![Value::from(1)]), Value::from(vec![Value::from(1)]));
    }

    #[test]
    fn loose_equality_coerces() {
        assert!(Value::from(1.0).loose_eq(&Value::from("1")));
        assert!(Value::from(true).loose_eq(&Value::from(1)));
        assert!(Value::from("0").loose_eq(&Value::from(false)));
        assert!(!Value::Null.loose_eq(&Value::from(0)));
        assert!(Value::Null.loose_eq(&Value::Null));
    }

    #[test]
    fn number_coercion() {
        assert_eq!(Value::from(" 42 ").to_number(), 42.0);
        assert_eq!(Value::from("").to_number(), 0.0);
        assert_eq!(Value::Null.to_number(), 0.0);
        assert!(Value::from("abc").to_number().is_nan());
    }

    #[test]
    fn text_coercion() {
        assert_eq!(Value::from(10.0).to_text(), "10");
        assert_eq!(Value::from(2.5).to_text(), "2.5");
        assert_eq!(Value::Null.to_text(), "");
        assert_eq!(
            Value::from(vec![Value::from(1), Value::from("a")]).to_text(),
            "1,a"
        );
    }

    #[test]
    fn compare_text_and_numbers() {
        assert_eq!(Value::from("a").compare(&Value::from("b")), Some(Ordering::Less));
        assert_eq!(Value::from("10").compare(&Value::from(9)), Some(Ordering::Greater));
        assert_eq!(Value::from("x").compare(&Value::from(1)), None);
    }

    #[test]
    fn member_and_index_access() {
        let map = Value::Map(BTreeMap::from([("street".to_owned(), Value::from("Main"))]));
        assert_eq!(map.member("street"), Some(Value::from("Main")));
        assert_eq!(map.member("zip"), Some(Value::Null));
        assert_eq!(Value::from("abc").member("length"), Some(Value::from(3)));
        assert_eq!(Value::Null.member("x"), None);

        let list = Value::from(vec![Value::from(1), Value::from(2)]);
        assert_eq!(list.index(&Value::from(1)), Some(Value::from(2)));
        assert_eq!(list.index(&Value::from(7)), Some(Value::Null));
        assert_eq!(map.index(&Value::from("street")), Some(Value::from("Main")));
    }

    #[test]
    fn integral_numbers_serialize_without_fraction() {
        let json = serde_json::to_string(&Value::from(vec![
            Value::from(10.0),
            Value::from(2.5),
            Value::Null,
        ]))
        .unwrap();
        assert_eq!(json, "[10,2.5,null]");
    }

    #[test]
    fn deserializes_untagged_json() {
        let value: Value = serde_json::from_str(r#"{"a": [1, "x", true, null]}"#).unwrap();
        let expected = Value::Map(BTreeMap::from([(
            "a".to_owned(),
            Value::from(vec![
                Value::from(1.0),
                Value::from("x"),
                Value::from(true),
                Value::Null,
            ]),
        )]));
        assert_eq!(value, expected);
    }

    #[test]
    fn regex_flags() {
        let re = RegexValue::new("ab+", "gi").unwrap();
        assert!(re.is_global());
        assert!(re.regex().is_match("xABBy"));
        assert_eq!(re.to_string(), "/ab+/gi");
    }
}
