//! Turns a parsed formula into an evaluable tree plus the list of every
//! reactive input it reads.
//!
//! Compilation runs as a sequence of tree passes:
//!
//! 1. deprecated call forms are rewritten to their current names;
//! 2. structural calls (`getFieldValue('a')`, `fieldIsValid('a')`, ...) are
//!    replaced by input slots, resolving `relativePath(...)` and `this.`
//!    through the scope;
//! 3. `questionSetIsValid(...)` calls are collected;
//! 4. every remaining call is checked against the built-in table, and regex
//!    literals are compiled where they are allowed;
//! 5. identifier chains become argument bindings, reserved input arrays or
//!    field-value slots.
//!
//! Strings are literal tokens by the time any pass runs, so text inside
//! quotes is never mistaken for a reference.

use std::collections::BTreeSet;
use std::sync::Arc;

use formwire_channels::FieldPathSet;
use formwire_core::value::format_number;
use formwire_core::{FieldPathPattern, RegexValue, Value, path};
use serde::Serialize;

use crate::ast::{Expr, InternalArray, Slot};
use crate::builtins::Builtins;
use crate::error::{CompileError, Result, SourceContext};
use crate::invalidation;
use crate::parser;

/// Functions the compiler resolves itself. They never reach the built-in
/// table and take literal arguments only.
pub const STRUCTURAL_FUNCTIONS: &[(&str, &str)] = &[
    ("getFieldValue", "Current value of a field"),
    ("getSearchTerm", "Current search term of a field"),
    ("fieldIsValid", "Whether a field is currently valid"),
    ("getRepeatCount", "Number of instances of a repeating group"),
    ("getFieldValuesForFieldPathPattern", "Values of every field matching a wildcard pattern"),
    ("getFieldValuesForTag", "Values of every field carrying a tag"),
    ("getTableForTag", "Rendered table of the fields carrying a tag"),
    ("questionSetIsValid", "Whether every named question set is valid"),
    ("relativePath", "Absolute path of a pointer relative to the scope"),
];

/// Deprecated names and what they became.
pub const LEGACY_FUNCTIONS: &[(&str, &str)] = &[
    ("sumRepeatingGroupProperty", "sum(getFieldValuesForFieldPathPattern('group[*].prop'))"),
    ("countRepeatingGroup", "getRepeatCount"),
    ("isFieldValid", "fieldIsValid"),
    ("getValue", "getFieldValue"),
];

/// Where an aggregate slot gets its values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "key", rename_all = "lowercase")]
pub enum AggregateSource {
    Pattern(String),
    Tag(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgumentKind {
    /// Bound once at construction.
    Fixed,
    /// Bound to a reactive channel.
    External,
}

/// Every input an expression reads, in discovery order. Slot indices in the
/// compiled tree point into these lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct References {
    pub field_values: Vec<String>,
    pub search_terms: Vec<String>,
    pub validities: Vec<String>,
    pub repeat_counts: Vec<String>,
    pub aggregates: Vec<AggregateSource>,
    /// Tags whose rendered tables are read.
    pub tables: Vec<String>,
    pub question_sets: Vec<String>,
    /// Built-ins with an invalidation group.
    pub functions: Vec<String>,
    pub arguments: Vec<(String, ArgumentKind)>,
}

impl References {
    /// No channel to subscribe to. Fixed arguments never change, so they do
    /// not count.
    pub fn is_constant(&self) -> bool {
        self.field_values.is_empty()
            && self.search_terms.is_empty()
            && self.validities.is_empty()
            && self.repeat_counts.is_empty()
            && self.aggregates.is_empty()
            && self.tables.is_empty()
            && self.question_sets.is_empty()
            && self.functions.is_empty()
            && self
                .arguments
                .iter()
                .all(|(_, kind)| *kind == ArgumentKind::Fixed)
    }

    /// Total number of reactive inputs.
    pub fn len(&self) -> usize {
        self.field_values.len()
            + self.search_terms.len()
            + self.validities.len()
            + self.repeat_counts.len()
            + self.aggregates.len()
            + self.tables.len()
            + self.question_sets.len()
            + self.functions.len()
            + self
                .arguments
                .iter()
                .filter(|(_, kind)| *kind == ArgumentKind::External)
                .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn argument_names(&self) -> impl Iterator<Item = &str> {
        self.arguments.iter().map(|(name, _)| name.as_str())
    }
}

/// A compiled formula.
#[derive(Debug, Clone, PartialEq)]
pub struct Compiled {
    pub tree: Expr,
    pub references: References,
}

/// What the compiler needs to know about the surroundings of one formula.
pub struct CompileEnv<'a> {
    pub context: &'a SourceContext,
    pub scope: Option<&'a str>,
    pub builtins: &'a Builtins,
    /// Known field paths, used to split `a.b.c` into a field and a member
    /// suffix.
    pub fields: &'a FieldPathSet,
    pub fixed: &'a BTreeSet<String>,
    pub external: &'a BTreeSet<String>,
}

/// Parses and compiles `source`.
pub fn compile(source: &str, env: &CompileEnv<'_>) -> Result<Compiled> {
    let tree = parser::parse(source).map_err(|error| CompileError::Syntax {
        context: env.context.clone(),
        error,
    })?;
    let mut compiler = Compiler {
        env,
        refs: References::default(),
    };
    let tree = compiler.rewrite_legacy(tree)?;
    let tree = compiler.extract_structural(tree)?;
    let tree = compiler.collect_question_sets(tree)?;
    let tree = compiler.check_calls(tree, false)?;
    let tree = compiler.resolve_identifiers(tree)?;
    Ok(Compiled {
        tree,
        references: compiler.refs,
    })
}

struct Compiler<'e, 'a> {
    env: &'e CompileEnv<'a>,
    refs: References,
}

/// Rebuilds `expr` with `f` applied to each direct child.
fn map_children(expr: Expr, f: &mut impl FnMut(Expr) -> Result<Expr>) -> Result<Expr> {
    Ok(match expr {
        Expr::Array(items) => Expr::Array(items.into_iter().map(&mut *f).collect::<Result<_>>()?),
        Expr::Member(target, name) => Expr::Member(Box::new(f(*target)?), name),
        Expr::Index(target, index) => Expr::Index(Box::new(f(*target)?), Box::new(f(*index)?)),
        Expr::Call { name, args } => Expr::Call {
            name,
            args: args.into_iter().map(&mut *f).collect::<Result<_>>()?,
        },
        Expr::Unary(op, operand) => Expr::Unary(op, Box::new(f(*operand)?)),
        Expr::Binary(op, lhs, rhs) => Expr::Binary(op, Box::new(f(*lhs)?), Box::new(f(*rhs)?)),
        Expr::Conditional(cond, then, otherwise) => Expr::Conditional(
            Box::new(f(*cond)?),
            Box::new(f(*then)?),
            Box::new(f(*otherwise)?),
        ),
        leaf => leaf,
    })
}

fn intern<T: PartialEq>(list: &mut Vec<T>, item: T) -> usize {
    match list.iter().position(|existing| *existing == item) {
        Some(index) => index,
        None => {
            list.push(item);
            list.len() - 1
        }
    }
}

impl Compiler<'_, '_> {
    fn context(&self) -> &SourceContext {
        self.env.context
    }

    // -- Pass 1: deprecated forms -------------------------------------------

    fn rewrite_legacy(&mut self, expr: Expr) -> Result<Expr> {
        let expr = map_children(expr, &mut |child| self.rewrite_legacy(child))?;
        let Expr::Call { name, args } = expr else {
            return Ok(expr);
        };
        Ok(match name.as_str() {
            "sumRepeatingGroupProperty" => {
                let (group, property) = match args.as_slice() {
                    [group, property] => match (group.as_text(), property.as_text()) {
                        (Some(g), Some(p)) => (g.to_string(), p.to_string()),
                        _ => {
                            return Err(CompileError::invalid_argument(
                                self.context(),
                                name,
                                "expects two string literals",
                            ));
                        }
                    },
                    _ => {
                        return Err(CompileError::invalid_argument(
                            self.context(),
                            name,
                            format!("expects 2 arguments, got {}", args.len()),
                        ));
                    }
                };
                Expr::call(
                    "sum",
                    vec![Expr::call(
                        "getFieldValuesForFieldPathPattern",
                        vec![Expr::text(&format!("{group}[*].{property}"))],
                    )],
                )
            }
            "countRepeatingGroup" => Expr::call("getRepeatCount", args),
            "isFieldValid" => Expr::call("fieldIsValid", args),
            "getValue" => Expr::call("getFieldValue", args),
            _ => Expr::Call { name, args },
        })
    }

    // -- Pass 2: structural calls --------------------------------------------

    /// The single literal argument of a structural call, or an error naming
    /// `function`.
    fn literal_arg(&self, function: &str, args: &[Expr]) -> Result<String> {
        match args {
            [arg] => self.literal_path(function, arg),
            _ => Err(CompileError::invalid_argument(
                self.context(),
                function,
                format!("expects 1 argument, got {}", args.len()),
            )),
        }
    }

    fn literal_path(&self, function: &str, arg: &Expr) -> Result<String> {
        match arg {
            Expr::Literal(Value::Text(path)) => Ok(path::apply_scope(path, self.env.scope)),
            Expr::Call { name, args } if name == "relativePath" => self.relative_path(args),
            other => Err(CompileError::invalid_argument(
                self.context(),
                function,
                format!("expects a string literal, got {other}"),
            )),
        }
    }

    fn relative_path(&self, args: &[Expr]) -> Result<String> {
        let pointer = match args {
            [Expr::Literal(Value::Text(pointer))] => pointer,
            _ => {
                return Err(CompileError::invalid_argument(
                    self.context(),
                    "relativePath",
                    "expects a single string literal",
                ));
            }
        };
        path::resolve_relative(self.env.scope, pointer).map_err(|error| {
            CompileError::InvalidRelativePath {
                context: self.context().clone(),
                error,
            }
        })
    }

    fn tag_arg(&self, function: &str, args: &[Expr]) -> Result<String> {
        match args {
            [Expr::Literal(Value::Text(tag))] => Ok(tag.clone()),
            _ => Err(CompileError::invalid_argument(
                self.context(),
                function,
                "expects a single string literal tag",
            )),
        }
    }

    fn extract_structural(&mut self, expr: Expr) -> Result<Expr> {
        let Expr::Call { name, args } = expr else {
            return map_children(expr, &mut |child| self.extract_structural(child));
        };
        Ok(match name.as_str() {
            "getFieldValue" => {
                let path = self.literal_arg(&name, &args)?;
                Expr::Slot(Slot::FieldValue(intern(&mut self.refs.field_values, path)))
            }
            "getSearchTerm" => {
                let path = self.literal_arg(&name, &args)?;
                Expr::Slot(Slot::SearchTerm(intern(&mut self.refs.search_terms, path)))
            }
            "fieldIsValid" => {
                let path = self.literal_arg(&name, &args)?;
                Expr::Slot(Slot::Validity(intern(&mut self.refs.validities, path)))
            }
            "getRepeatCount" => {
                let group = self.literal_arg(&name, &args)?;
                Expr::Slot(Slot::RepeatCount(intern(&mut self.refs.repeat_counts, group)))
            }
            "getFieldValuesForFieldPathPattern" => {
                let pattern = self.literal_arg(&name, &args)?;
                FieldPathPattern::new(&pattern).map_err(|err| {
                    CompileError::invalid_argument(self.context(), &name, err.to_string())
                })?;
                let source = AggregateSource::Pattern(pattern);
                Expr::Slot(Slot::Aggregate(intern(&mut self.refs.aggregates, source)))
            }
            "getFieldValuesForTag" => {
                let source = AggregateSource::Tag(self.tag_arg(&name, &args)?);
                Expr::Slot(Slot::Aggregate(intern(&mut self.refs.aggregates, source)))
            }
            "getTableForTag" => {
                let tag = self.tag_arg(&name, &args)?;
                Expr::TagTable(intern(&mut self.refs.tables, tag))
            }
            "relativePath" => {
                let path = self.relative_path(&args)?;
                Expr::Slot(Slot::FieldValue(intern(&mut self.refs.field_values, path)))
            }
            _ => map_children(Expr::Call { name, args }, &mut |child| {
                self.extract_structural(child)
            })?,
        })
    }

    // -- Pass 3: question sets -----------------------------------------------

    fn collect_question_sets(&mut self, expr: Expr) -> Result<Expr> {
        match expr {
            Expr::Call { name, args } if name == "questionSetIsValid" => {
                if args.is_empty() {
                    return Err(CompileError::invalid_argument(
                        self.context(),
                        &name,
                        "expects at least one question set name",
                    ));
                }
                let mut indices = Vec::with_capacity(args.len());
                for arg in &args {
                    let set = arg.as_text().ok_or_else(|| {
                        CompileError::invalid_argument(
                            self.context(),
                            &name,
                            format!("expects string literals, got {arg}"),
                        )
                    })?;
                    indices.push(intern(&mut self.refs.question_sets, set.to_string()));
                }
                Ok(Expr::QuestionSets(indices))
            }
            other => map_children(other, &mut |child| self.collect_question_sets(child)),
        }
    }

    // -- Pass 4: built-in calls and regex literals ---------------------------

    fn check_calls(&mut self, expr: Expr, regex_allowed: bool) -> Result<Expr> {
        match expr {
            Expr::Call { name, args } => {
                if !self.env.builtins.contains(&name) {
                    return Err(CompileError::UnknownFunction {
                        context: self.context().clone(),
                        name,
                    });
                }
                if invalidation::group_for(&name).is_some() && !self.refs.functions.contains(&name)
                {
                    self.refs.functions.push(name.clone());
                }
                let takes_regex = matches!(name.as_str(), "matches" | "replace");
                let args = args
                    .into_iter()
                    .enumerate()
                    .map(|(i, arg)| self.check_calls(arg, takes_regex && i == 1))
                    .collect::<Result<_>>()?;
                Ok(Expr::Call { name, args })
            }
            Expr::Regex { source, flags } if regex_allowed => RegexValue::new(&source, &flags)
                .map(|re| Expr::Literal(Value::Regex(Arc::new(re))))
                .map_err(|err| CompileError::InvalidRegex {
                    context: self.context().clone(),
                    pattern: source,
                    reason: err.to_string(),
                }),
            Expr::Regex { .. } => Err(CompileError::MisplacedRegex {
                context: self.context().clone(),
            }),
            other => map_children(other, &mut |child| self.check_calls(child, false)),
        }
    }

    // -- Pass 5: identifiers -------------------------------------------------

    fn resolve_identifiers(&mut self, expr: Expr) -> Result<Expr> {
        match expr {
            Expr::Ident(_) | Expr::Member(..) | Expr::Index(..) => match split_chain(expr) {
                Ok((root, suffixes)) => self.resolve_chain(root, suffixes),
                Err(Expr::Member(target, name)) => Ok(Expr::Member(
                    Box::new(self.resolve_identifiers(*target)?),
                    name,
                )),
                Err(Expr::Index(target, index)) => Ok(Expr::Index(
                    Box::new(self.resolve_identifiers(*target)?),
                    Box::new(self.resolve_identifiers(*index)?),
                )),
                Err(other) => Ok(other),
            },
            other => map_children(other, &mut |child| self.resolve_identifiers(child)),
        }
    }

    fn resolve_chain(&mut self, root: String, suffixes: Vec<Suffix>) -> Result<Expr> {
        if let Some(array) = InternalArray::from_name(&root) {
            return self.apply_suffixes(Expr::Internal(array), suffixes);
        }

        let bound = if self.env.fixed.contains(&root) {
            Some(ArgumentKind::Fixed)
        } else if self.env.external.contains(&root) {
            Some(ArgumentKind::External)
        } else {
            None
        };
        if let Some(kind) = bound {
            let index = intern(&mut self.refs.arguments, (root, kind));
            return self.apply_suffixes(Expr::Slot(Slot::Argument(index)), suffixes);
        }

        let unscoped = self.env.scope.is_none_or(str::is_empty);
        if root == "this" && unscoped && !matches!(suffixes.first(), Some(Suffix::Member(_))) {
            return Err(CompileError::UnscopedThis {
                context: self.context().clone(),
            });
        }

        // Candidate paths: the root alone, then each further static segment.
        let mut candidates = vec![root.clone()];
        for suffix in &suffixes {
            let Some(segment) = suffix.static_segment() else {
                break;
            };
            let mut next = candidates[candidates.len() - 1].clone();
            next.push_str(&segment);
            candidates.push(next);
        }
        let candidates: Vec<String> = candidates
            .iter()
            .map(|c| path::apply_scope(c, self.env.scope))
            .collect();

        let take = candidates
            .iter()
            .rposition(|c| self.env.fields.contains(c))
            .unwrap_or(candidates.len() - 1);
        let field = candidates[take].clone();
        let slot = Expr::Slot(Slot::FieldValue(intern(&mut self.refs.field_values, field)));
        let rest = suffixes.into_iter().skip(take).collect();
        self.apply_suffixes(slot, rest)
    }

    fn apply_suffixes(&mut self, mut base: Expr, suffixes: Vec<Suffix>) -> Result<Expr> {
        for suffix in suffixes {
            base = match suffix {
                Suffix::Member(name) => Expr::Member(Box::new(base), name),
                Suffix::Index(index) => {
                    Expr::Index(Box::new(base), Box::new(self.resolve_identifiers(index)?))
                }
            };
        }
        Ok(base)
    }
}

enum Suffix {
    Member(String),
    Index(Expr),
}

impl Suffix {
    /// The path text this suffix adds, if it is known without evaluating
    /// anything.
    fn static_segment(&self) -> Option<String> {
        match self {
            Suffix::Member(name) => Some(format!(".{name}")),
            Suffix::Index(Expr::Literal(Value::Number(n))) if *n >= 0.0 && n.fract() == 0.0 => {
                Some(format!("[{}]", format_number(*n)))
            }
            Suffix::Index(Expr::Literal(Value::Text(name))) => Some(format!(".{name}")),
            Suffix::Index(_) => None,
        }
    }
}

/// Splits `a.b[0].c` into its root identifier and suffixes, outermost last.
/// Gives the expression back when the chain does not start at an identifier.
fn split_chain(expr: Expr) -> std::result::Result<(String, Vec<Suffix>), Expr> {
    let mut suffixes = Vec::new();
    let mut current = expr;
    loop {
        match current {
            Expr::Member(target, name) if is_chain(&target) => {
                suffixes.push(Suffix::Member(name));
                current = *target;
            }
            Expr::Index(target, index) if is_chain(&target) => {
                suffixes.push(Suffix::Index(*index));
                current = *target;
            }
            Expr::Ident(root) => {
                suffixes.reverse();
                return Ok((root, suffixes));
            }
            other => {
                // Only reachable for the outermost node; inner nodes are
                // checked with `is_chain` first.
                return Err(other);
            }
        }
    }
}

fn is_chain(expr: &Expr) -> bool {
    match expr {
        Expr::Ident(_) => true,
        Expr::Member(target, _) | Expr::Index(target, _) => is_chain(target),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Fixture {
        builtins: Builtins,
        fields: FieldPathSet,
        fixed: BTreeSet<String>,
        external: BTreeSet<String>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                builtins: Builtins::standard(),
                fields: FieldPathSet::new(),
                fixed: BTreeSet::new(),
                external: BTreeSet::new(),
            }
        }

        fn compile(&self, source: &str, scope: Option<&str>) -> Result<Compiled> {
            let context = SourceContext::new(source, Some("test".into()));
            let env = CompileEnv {
                context: &context,
                scope,
                builtins: &self.builtins,
                fields: &self.fields,
                fixed: &self.fixed,
                external: &self.external,
            };
            compile(source, &env)
        }

        fn render(&self, source: &str, scope: Option<&str>) -> String {
            self.compile(source, scope).unwrap().tree.to_string()
        }
    }

    #[test]
    fn plain_identifiers_become_field_slots() {
        let f = Fixture::new();
        let compiled = f.compile("amount > 5 && amount < limit", None).unwrap();
        assert_eq!(
            compiled.tree.to_string(),
            "((fieldValues[0] > 5) && (fieldValues[0] < fieldValues[1]))"
        );
        assert_eq!(compiled.references.field_values, vec!["amount", "limit"]);
        assert!(!compiled.references.is_constant());
    }

    #[test]
    fn literal_text_is_never_a_reference() {
        let f = Fixture::new();
        let compiled = f.compile("concat('amount', \"getFieldValue('x')\")", None).unwrap();
        assert!(compiled.references.is_constant());
    }

    #[test]
    fn structural_calls_resolve_through_scope() {
        let f = Fixture::new();
        let compiled = f
            .compile(
                "getFieldValue('this.amount') + getRepeatCount('claims') + \
                 getFieldValue(relativePath('../total'))",
                Some("claims[1].items[0]"),
            )
            .unwrap();
        assert_eq!(
            compiled.references.field_values,
            vec!["claims[1].items[0].amount", "claims[1].total"]
        );
        assert_eq!(compiled.references.repeat_counts, vec!["claims"]);
    }

    #[test]
    fn bare_relative_path_reads_the_field() {
        let f = Fixture::new();
        let compiled = f.compile("relativePath('amount') > 1", Some("claims[0]")).unwrap();
        assert_eq!(compiled.references.field_values, vec!["claims[0].amount"]);
    }

    #[test]
    fn legacy_forms_are_rewritten() {
        let f = Fixture::new();
        let compiled = f
            .compile(
                "sumRepeatingGroupProperty('claims', 'amount') + countRepeatingGroup('claims') \
                 + (isFieldValid('a') ? getValue('b') : 0)",
                None,
            )
            .unwrap();
        let refs = &compiled.references;
        assert_eq!(
            refs.aggregates,
            vec![AggregateSource::Pattern("claims[*].amount".into())]
        );
        assert_eq!(refs.repeat_counts, vec!["claims"]);
        assert_eq!(refs.validities, vec!["a"]);
        assert_eq!(refs.field_values, vec!["b"]);
        assert_eq!(
            compiled.tree.to_string(),
            "((sum(aggregates[0]) + repeatCounts[0]) + (fieldValidities[0] ? fieldValues[0] : 0))"
        );
    }

    #[test]
    fn dynamic_structural_arguments_are_rejected() {
        let f = Fixture::new();
        let err = f.compile("getFieldValue(name)", None).unwrap_err();
        assert!(matches!(err, CompileError::InvalidArgument { .. }));
        let err = f.compile("getFieldValue(relativePath('../../x'))", Some("a")).unwrap_err();
        assert!(matches!(err, CompileError::InvalidRelativePath { .. }));
    }

    #[test]
    fn unknown_functions_fail_with_context() {
        let f = Fixture::new();
        let err = f.compile("frobnicate(1)", None).unwrap_err();
        assert_eq!(err.to_string(), "unknown method 'frobnicate' in 'frobnicate(1)' [test]");
    }

    #[test]
    fn stateful_builtins_are_recorded() {
        let f = Fixture::new();
        let compiled = f.compile("now() - 220 > 5 && length('x') == 1", None).unwrap();
        assert_eq!(compiled.references.functions, vec!["now"]);
        assert!(!compiled.references.is_constant());
        assert!(f.compile("substring('sacrifice', 6, 8)", None).unwrap().references.is_constant());
    }

    #[test]
    fn question_sets_and_tags() {
        let f = Fixture::new();
        let compiled = f
            .compile(
                "questionSetIsValid('ratingPrimary', 'ratingSecondary') ? getTableForTag('summary') : \
                 count(getFieldValuesForTag('summary'))",
                None,
            )
            .unwrap();
        let refs = &compiled.references;
        assert_eq!(refs.question_sets, vec!["ratingPrimary", "ratingSecondary"]);
        assert_eq!(refs.tables, vec!["summary"]);
        assert_eq!(refs.aggregates, vec![AggregateSource::Tag("summary".into())]);
    }

    #[test]
    fn regex_literals_only_in_matches_and_replace() {
        let f = Fixture::new();
        let compiled = f.compile("matches(code, /^[A-Z]{3}$/i)", None).unwrap();
        assert_eq!(compiled.references.field_values, vec!["code"]);
        let err = f.compile("length(/abc/)", None).unwrap_err();
        assert!(matches!(err, CompileError::MisplacedRegex { .. }));
        let err = f.compile("matches(code, /(/)", None).unwrap_err();
        assert!(matches!(err, CompileError::InvalidRegex { .. }));
    }

    #[test]
    fn arguments_and_reserved_names() {
        let mut f = Fixture::new();
        f.fixed.insert("rate".into());
        f.external.insert("selection".into());
        let compiled = f
            .compile("rate * selection.amount + fieldValues[0]", None)
            .unwrap();
        assert_eq!(
            compiled.tree.to_string(),
            "((args[0] * args[1].amount) + fieldValues[0])"
        );
        assert_eq!(
            compiled.references.arguments,
            vec![
                ("rate".to_string(), ArgumentKind::Fixed),
                ("selection".to_string(), ArgumentKind::External),
            ]
        );
        assert!(compiled.references.field_values.is_empty());
        assert!(!compiled.references.is_constant());

        let only_fixed = f.compile("rate * 2", None).unwrap();
        assert!(only_fixed.references.is_constant());
    }

    #[test]
    fn known_paths_split_member_suffixes() {
        let f = Fixture::new();
        f.fields.insert("address", vec![]);
        assert_eq!(f.render("address.city", None), "fieldValues[0].city");
        assert_eq!(f.render("claims[0].amount", None), "fieldValues[0]");
        assert_eq!(f.render("claims[i].amount", None), "fieldValues[0][fieldValues[1]].amount");
    }

    #[test]
    fn this_needs_a_scope_when_bare() {
        let f = Fixture::new();
        assert_eq!(
            f.compile("this.amount", Some("claims[2]")).unwrap().references.field_values,
            vec!["claims[2].amount"]
        );
        assert_eq!(
            f.compile("this.amount", None).unwrap().references.field_values,
            vec!["amount"]
        );
        let err = f.compile("this", None).unwrap_err();
        assert!(matches!(err, CompileError::UnscopedThis { .. }));
    }

    #[test]
    fn syntax_errors_carry_context() {
        let f = Fixture::new();
        let err = f.compile("1 +", None).unwrap_err();
        assert!(err.is_syntax());
        assert_eq!(err.context().map(|c| c.source.as_str()), Some("1 +"));
    }
}
