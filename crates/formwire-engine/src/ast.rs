//! Expression tree.
//!
//! The parser produces a tree made of literals, identifiers, calls and
//! operators. Compilation replaces references with [`Slot`]s pointing into
//! the per-expression input arrays, so evaluation never looks anything up by
//! name except built-in functions.

use std::fmt;

use formwire_core::Value;
use formwire_core::value::format_number;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::StrictEq => "===",
            BinaryOp::StrictNotEq => "!==",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
        }
    }
}

/// A position in one of the expression's input arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    FieldValue(usize),
    SearchTerm(usize),
    Validity(usize),
    RepeatCount(usize),
    Aggregate(usize),
    Argument(usize),
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::FieldValue(i) => write!(f, "fieldValues[{i}]"),
            Slot::SearchTerm(i) => write!(f, "searchTerms[{i}]"),
            Slot::Validity(i) => write!(f, "fieldValidities[{i}]"),
            Slot::RepeatCount(i) => write!(f, "repeatCounts[{i}]"),
            Slot::Aggregate(i) => write!(f, "aggregates[{i}]"),
            Slot::Argument(i) => write!(f, "args[{i}]"),
        }
    }
}

/// The reserved names that read a whole input array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalArray {
    FieldValues,
    FieldValidities,
    RepeatCounts,
}

impl InternalArray {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "fieldValues" => Some(InternalArray::FieldValues),
            "fieldValidities" => Some(InternalArray::FieldValidities),
            "repeatCounts" => Some(InternalArray::RepeatCounts),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            InternalArray::FieldValues => "fieldValues",
            InternalArray::FieldValidities => "fieldValidities",
            InternalArray::RepeatCounts => "repeatCounts",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// A `/source/flags` literal, compiled into a [`Value::Regex`] literal
    /// once its position has been checked.
    Regex {
        source: String,
        flags: String,
    },
    Array(Vec<Expr>),
    Ident(String),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call {
        name: String,
        args: Vec<Expr>,
    },
    Unary(UnaryOp, Box<Expr>),
    /// `&&` and `||` short-circuit and yield an operand, not a boolean.
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),

    // Produced by compilation.
    Slot(Slot),
    Internal(InternalArray),
    /// `questionSetIsValid(...)`: true iff every listed set is valid.
    QuestionSets(Vec<usize>),
    /// `getTableForTag(...)`: the rendered table of one tag projection.
    TagTable(usize),
}

impl Expr {
    pub fn call(name: &str, args: Vec<Expr>) -> Self {
        Expr::Call {
            name: name.to_string(),
            args,
        }
    }

    pub fn text(value: &str) -> Self {
        Expr::Literal(Value::Text(value.to_string()))
    }

    /// The literal text, if this is a string literal.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Expr::Literal(Value::Text(s)) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(Value::Text(s)) => write!(f, "{s:?}"),
            Expr::Literal(Value::Regex(re)) => write!(f, "{re}"),
            Expr::Literal(Value::Null) => f.write_str("null"),
            Expr::Literal(Value::Number(n)) => f.write_str(&format_number(*n)),
            Expr::Literal(Value::Bool(b)) => write!(f, "{b}"),
            Expr::Literal(v) => match serde_json::to_string(v) {
                Ok(json) => f.write_str(&json),
                Err(_) => write!(f, "{v}"),
            },
            Expr::Regex { source, flags } => write!(f, "/{source}/{flags}"),
            Expr::Array(items) => {
                f.write_str("[")?;
                write_list(f, items)?;
                f.write_str("]")
            }
            Expr::Ident(name) => f.write_str(name),
            Expr::Member(target, name) => write!(f, "{target}.{name}"),
            Expr::Index(target, index) => write!(f, "{target}[{index}]"),
            Expr::Call { name, args } => {
                write!(f, "{name}(")?;
                write_list(f, args)?;
                f.write_str(")")
            }
            Expr::Unary(op, operand) => {
                let symbol = match op {
                    UnaryOp::Not => "!",
                    UnaryOp::Neg => "-",
                    UnaryOp::Plus => "+",
                };
                write!(f, "{symbol}{operand}")
            }
            Expr::Binary(op, lhs, rhs) => write!(f, "({lhs} {} {rhs})", op.symbol()),
            Expr::Conditional(cond, then, otherwise) => {
                write!(f, "({cond} ? {then} : {otherwise})")
            }
            Expr::Slot(slot) => write!(f, "{slot}"),
            Expr::Internal(array) => f.write_str(array.name()),
            Expr::QuestionSets(indices) => {
                f.write_str("questionSets(")?;
                for (i, idx) in indices.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{idx}")?;
                }
                f.write_str(")")
            }
            Expr::TagTable(i) => write!(f, "tables[{i}]"),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}
