//! String built-ins.

use std::borrow::Cow;

use formwire_core::{RegexValue, Value};
use regex::Regex;

use super::{Builtins, CallContext, expect_args, is_blank, number_arg, text_arg};
use crate::error::BuiltinError;

/// Longest result `padStart` will build.
const MAX_PADDED_LENGTH: usize = 1_000_000;

pub(super) fn register(b: &mut Builtins) {
    b.add("text", "length", "Number of characters in a text or items in a list", length);
    b.add("text", "substring", "Characters between two indices (end exclusive)", substring);
    b.add("text", "toUpperCase", "Upper-cased text", to_upper_case);
    b.add("text", "toLowerCase", "Lower-cased text", to_lower_case);
    b.add("text", "trim", "Text without surrounding whitespace", trim);
    b.add("text", "concat", "All arguments joined as text", concat);
    b.add("text", "contains", "Whether a text or list contains a value", contains);
    b.add("text", "startsWith", "Whether a text starts with a prefix", starts_with);
    b.add("text", "endsWith", "Whether a text ends with a suffix", ends_with);
    b.add("text", "indexOf", "Position of a value in a text or list, or -1", index_of);
    b.add("text", "matches", "Whether a text matches a regex", matches);
    b.add("text", "replace", "Text with the first (or, with /g, every) match replaced", replace);
    b.add("text", "split", "List of the parts of a text", split);
    b.add("text", "join", "Text of the list items joined by a separator", join);
    b.add("text", "padStart", "Text left-padded to a length", pad_start);
    b.add("text", "isEmpty", "Whether a value is null, blank or an empty list", is_empty);
    b.add("text", "isNotEmpty", "Negation of isEmpty", is_not_empty);
    b.add("text", "coalesce", "First argument that is not empty", coalesce);
    b.add("text", "text", "A value converted to text", text);
}

fn length(_: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("length", args, 1, 1)?;
    let n = match &args[0] {
        Value::Null => 0,
        Value::List(items) => items.len(),
        other => other.to_text().chars().count(),
    };
    Ok(Value::from(n))
}

/// Index clamped to `0..=len`; `NaN` counts as 0.
fn clamp_index(n: f64, len: usize) -> usize {
    if n.is_nan() || n <= 0.0 {
        0
    } else if n >= len as f64 {
        len
    } else {
        n as usize
    }
}

fn substring(_: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("substring", args, 2, 3)?;
    let chars: Vec<char> = text_arg(args, 0).chars().collect();
    let start = clamp_index(number_arg("substring", args, 1)?, chars.len());
    let end = match args.get(2) {
        Some(Value::Null) | None => chars.len(),
        Some(_) => clamp_index(number_arg("substring", args, 2)?, chars.len()),
    };
    let (from, to) = if start <= end { (start, end) } else { (end, start) };
    Ok(Value::Text(chars[from..to].iter().collect()))
}

fn to_upper_case(_: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("toUpperCase", args, 1, 1)?;
    Ok(Value::Text(text_arg(args, 0).to_uppercase()))
}

fn to_lower_case(_: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("toLowerCase", args, 1, 1)?;
    Ok(Value::Text(text_arg(args, 0).to_lowercase()))
}

fn trim(_: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("trim", args, 1, 1)?;
    Ok(Value::Text(text_arg(args, 0).trim().to_string()))
}

fn concat(_: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    Ok(Value::Text(args.iter().map(Value::to_text).collect()))
}

fn contains(_: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("contains", args, 2, 2)?;
    let found = match &args[0] {
        Value::List(items) => items.iter().any(|item| item.loose_eq(&args[1])),
        Value::Null => false,
        other => other.to_text().contains(&args[1].to_text()),
    };
    Ok(Value::Bool(found))
}

fn starts_with(_: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("startsWith", args, 2, 2)?;
    Ok(Value::Bool(text_arg(args, 0).starts_with(&text_arg(args, 1))))
}

fn ends_with(_: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("endsWith", args, 2, 2)?;
    Ok(Value::Bool(text_arg(args, 0).ends_with(&text_arg(args, 1))))
}

fn index_of(_: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("indexOf", args, 2, 2)?;
    let position = match &args[0] {
        Value::List(items) => items.iter().position(|item| item.loose_eq(&args[1])),
        other => {
            let haystack = other.to_text();
            let needle = args[1].to_text();
            haystack
                .find(&needle)
                .map(|byte| haystack[..byte].chars().count())
        }
    };
    Ok(position.map_or(Value::from(-1), Value::from))
}

/// The regex argument at `pos`: a regex literal, or text compiled on the fly.
fn regex_arg<'v>(name: &str, args: &'v [Value], pos: usize) -> Result<Cow<'v, Regex>, BuiltinError> {
    match args.get(pos) {
        Some(Value::Regex(re)) => Ok(Cow::Borrowed(re.regex())),
        Some(other) => RegexValue::new(&other.to_text(), "")
            .map(|re| Cow::Owned(re.regex().clone()))
            .map_err(|e| BuiltinError::invalid_argument(name, pos + 1, format!("is not a valid regex: {e}"))),
        None => Err(BuiltinError::invalid_argument(name, pos + 1, "is missing")),
    }
}

fn matches(_: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("matches", args, 2, 2)?;
    let regex = regex_arg("matches", args, 1)?;
    Ok(Value::Bool(regex.is_match(&text_arg(args, 0))))
}

fn replace(_: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("replace", args, 3, 3)?;
    let haystack = text_arg(args, 0);
    let replacement = text_arg(args, 2);
    let replaced = match &args[1] {
        Value::Regex(re) if re.is_global() => {
            re.regex().replace_all(&haystack, replacement.as_str()).into_owned()
        }
        Value::Regex(re) => re.regex().replace(&haystack, replacement.as_str()).into_owned(),
        plain => haystack.replacen(&plain.to_text(), &replacement, 1),
    };
    Ok(Value::Text(replaced))
}

fn split(_: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("split", args, 2, 2)?;
    let text = text_arg(args, 0);
    let separator = text_arg(args, 1);
    let parts: Vec<Value> = if separator.is_empty() {
        text.chars().map(|c| Value::Text(c.to_string())).collect()
    } else {
        text.split(separator.as_str()).map(Value::from).collect()
    };
    Ok(Value::List(parts))
}

fn join(_: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("join", args, 1, 2)?;
    let separator = if args.len() > 1 {
        text_arg(args, 1)
    } else {
        ",".to_string()
    };
    let items = match &args[0] {
        Value::List(items) => items.iter().map(Value::to_text).collect::<Vec<_>>(),
        Value::Null => Vec::new(),
        other => vec![other.to_text()],
    };
    Ok(Value::Text(items.join(&separator)))
}

fn pad_start(_: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("padStart", args, 2, 3)?;
    let text = text_arg(args, 0);
    let target = number_arg("padStart", args, 1)?;
    let pad = if args.len() > 2 {
        text_arg(args, 2)
    } else {
        " ".to_string()
    };
    let current = text.chars().count();
    if target > MAX_PADDED_LENGTH as f64 {
        return Err(BuiltinError::invalid_argument(
            "padStart",
            2,
            format!("must be at most {MAX_PADDED_LENGTH}"),
        ));
    }
    let target = if target.is_nan() || target <= 0.0 { 0 } else { target as usize };
    if pad.is_empty() || current >= target {
        return Ok(Value::Text(text));
    }
    let mut out: String = pad.chars().cycle().take(target - current).collect();
    out.push_str(&text);
    Ok(Value::Text(out))
}

fn empty_value(value: &Value) -> bool {
    match value {
        Value::List(items) => items.is_empty(),
        Value::Map(map) => map.is_empty(),
        other => is_blank(other),
    }
}

fn is_empty(_: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("isEmpty", args, 1, 1)?;
    Ok(Value::Bool(empty_value(&args[0])))
}

fn is_not_empty(_: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("isNotEmpty", args, 1, 1)?;
    Ok(Value::Bool(!empty_value(&args[0])))
}

fn coalesce(_: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    Ok(args
        .iter()
        .find(|v| !empty_value(v))
        .cloned()
        .unwrap_or_default())
}

fn text(_: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("text", args, 1, 1)?;
    Ok(Value::Text(args[0].to_text()))
}
