//! Field-path addressing.
//!
//! A field path is a dotted/bracketed address such as `claims[2].amount`.
//! This module resolves `this.` against a scope, resolves relative pointers
//! (`../total`) to absolute paths, and translates wildcard patterns
//! (`claims[*].amount`) into prefix-anchored regular expressions.

use regex::Regex;

/// Errors raised while resolving or compiling field paths.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PathError {
    /// The relative pointer was empty.
    #[error("relative field path is empty")]
    EmptyPointer,

    /// The pointer climbed above the form root.
    #[error("relative field path '{pointer}' climbs above the form root from scope '{scope}'")]
    EscapesRoot {
        /// The pointer as written.
        pointer: String,
        /// The scope it was resolved against (empty for the root).
        scope: String,
    },

    /// The pointer contained an empty segment, e.g. `a//b`.
    #[error("relative field path '{pointer}' contains an empty segment")]
    EmptySegment {
        /// The pointer as written.
        pointer: String,
    },

    /// A wildcard pattern could not be compiled.
    #[error("invalid field path pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The pattern as written.
        pattern: String,
        /// Why compilation failed.
        reason: String,
    },
}

/// Splits a field path into its dot-separated segments. Dots inside
/// brackets do not split.
pub fn segments(path: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, ch) in path.char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '.' if depth == 0 => {
                out.push(&path[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if start < path.len() || !path.is_empty() {
        out.push(&path[start..]);
    }
    out
}

/// Rewrites a `this`-relative path through `scope`.
///
/// `this.amount` in scope `claims[1]` becomes `claims[1].amount`; a bare
/// `this` becomes the scope itself. Without a scope the `this.` prefix is
/// dropped. Paths not starting with `this` are returned unchanged.
pub fn apply_scope(path: &str, scope: Option<&str>) -> String {
    let rest = if path == "this" {
        ""
    } else if let Some(rest) = path.strip_prefix("this.") {
        rest
    } else if let Some(rest) = path.strip_prefix("this[") {
        return match scope {
            Some(scope) if !scope.is_empty() => format!("{scope}[{rest}"),
            _ => format!("[{rest}"),
        };
    } else {
        return path.to_owned();
    };

    match scope {
        Some(scope) if !scope.is_empty() && !rest.is_empty() => format!("{scope}.{rest}"),
        Some(scope) if !scope.is_empty() => scope.to_owned(),
        _ => rest.to_owned(),
    }
}

/// Resolves a relative pointer against `scope`.
///
/// Pointer segments are separated by `/`: `..` climbs one scope segment,
/// `.` stays, anything else descends. `amount` in scope `claims[1]` is
/// `claims[1].amount`; `../total` in scope `claims[1].items[0]` is
/// `claims[1].total`.
pub fn resolve_relative(scope: Option<&str>, pointer: &str) -> Result<String, PathError> {
    if pointer.trim().is_empty() {
        return Err(PathError::EmptyPointer);
    }

    let scope = scope.unwrap_or("");
    let mut base: Vec<&str> = if scope.is_empty() {
        Vec::new()
    } else {
        segments(scope)
    };

    for part in pointer.split('/') {
        match part {
            "" => {
                return Err(PathError::EmptySegment {
                    pointer: pointer.to_owned(),
                });
            }
            "." => {}
            ".." => {
                if base.pop().is_none() {
                    return Err(PathError::EscapesRoot {
                        pointer: pointer.to_owned(),
                        scope: scope.to_owned(),
                    });
                }
            }
            other => base.push(other),
        }
    }

    if base.is_empty() {
        return Err(PathError::EscapesRoot {
            pointer: pointer.to_owned(),
            scope: scope.to_owned(),
        });
    }
    Ok(base.join("."))
}

/// Returns the index of the innermost repeating-group instance in `scope`,
/// e.g. `2` for `claims[0].items[2]`.
pub fn repeat_index(scope: &str) -> Option<usize> {
    let close = scope.rfind(']')?;
    let open = scope[..close].rfind('[')?;
    scope[open + 1..close].trim().parse().ok()
}

/// Translates a wildcard pattern into a prefix-anchored regular expression:
/// `*` matches any characters, every other character is literal.
pub fn pattern_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');
    for ch in pattern.chars() {
        if ch == '*' {
            out.push_str(".*");
        } else {
            out.push_str(&regex::escape(ch.encode_utf8(&mut [0u8; 4])));
        }
    }
    out
}

/// A compiled wildcard field-path pattern.
#[derive(Debug, Clone)]
pub struct FieldPathPattern {
    source: String,
    regex: Regex,
}

impl FieldPathPattern {
    /// Compiles `pattern` (see [`pattern_to_regex`]).
    pub fn new(pattern: &str) -> Result<Self, PathError> {
        let regex = Regex::new(&pattern_to_regex(pattern)).map_err(|e| {
            PathError::InvalidPattern {
                pattern: pattern.to_owned(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self {
            source: pattern.to_owned(),
            regex,
        })
    }

    /// Returns `true` if `path` starts with a match of this pattern.
    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn segments_ignore_dots_in_brackets() {
        assert_eq!(segments("claims[1].amount"), vec!["claims[1]", "amount"]);
        assert_eq!(segments("a['x.y'].b"), vec!["a['x.y']", "b"]);
        assert_eq!(segments("single"), vec!["single"]);
    }

    #[test]
    fn scope_rewrites_this() {
        assert_eq!(apply_scope("this.amount", Some("claims[1]")), "claims[1].amount");
        assert_eq!(apply_scope("this", Some("claims[1]")), "claims[1]");
        assert_eq!(apply_scope("this.amount", None), "amount");
        assert_eq!(apply_scope("amount", Some("claims[1]")), "amount");
    }

    #[test]
    fn relative_sibling_and_parent() {
        assert_eq!(
            resolve_relative(Some("claims[1]"), "amount").unwrap(),
            "claims[1].amount"
        );
        assert_eq!(
            resolve_relative(Some("claims[1].items[0]"), "../total").unwrap(),
            "claims[1].total"
        );
        assert_eq!(resolve_relative(None, "./total").unwrap(), "total");
    }

    #[test]
    fn relative_errors() {
        assert_eq!(resolve_relative(None, " "), Err(PathError::EmptyPointer));
        assert!(matches!(
            resolve_relative(Some("claims[1]"), "../../x"),
            Err(PathError::EscapesRoot { .. })
        ));
        assert!(matches!(
            resolve_relative(Some("a"), "b//c"),
            Err(PathError::EmptySegment { .. })
        ));
    }

    #[test]
    fn repeat_index_from_scope() {
        assert_eq!(repeat_index("claims[0].items[2]"), Some(2));
        assert_eq!(repeat_index("claims"), None);
    }

    #[test]
    fn pattern_translation_escapes_brackets_and_dots() {
        assert_eq!(pattern_to_regex("claims[*].amount"), r"^claims\[.*\]\.amount");
    }

    #[test]
    fn pattern_is_prefix_anchored() {
        let pattern = FieldPathPattern::new("claims[*].amount").unwrap();
        assert!(pattern.matches("claims[0].amount"));
        assert!(pattern.matches("claims[12].amount"));
        assert!(!pattern.matches("other.claims[0].amount"));
        assert!(!pattern.matches("claims[0].date"));
        // No end anchor: longer paths sharing the prefix match too.
        assert!(pattern.matches("claims[0].amountCurrency"));
    }
}
