//! Engine error types.

use std::fmt;

use formwire_core::{PathError, Value};

/// The formula text and debug label an error refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceContext {
    pub source: String,
    pub label: Option<String>,
}

impl SourceContext {
    pub fn new(source: impl Into<String>, label: Option<String>) -> Self {
        Self {
            source: source.into(),
            label,
        }
    }
}

impl fmt::Display for SourceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'", self.source)?;
        if let Some(label) = &self.label {
            write!(f, " [{label}]")?;
        }
        Ok(())
    }
}

/// A tokenizer or parser failure, positioned by byte offset.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} at offset {offset}")]
pub struct SyntaxError {
    pub offset: usize,
    pub message: String,
}

impl SyntaxError {
    pub fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Construction-time
// ---------------------------------------------------------------------------

/// Errors that abort the construction of one expression.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    /// The source was empty or only whitespace.
    #[error("expression source is empty{}", label_suffix(.label))]
    EmptySource {
        /// Debug label of the element that asked for the expression.
        label: Option<String>,
    },

    /// The source could not be tokenized or parsed.
    #[error("syntax error in {context}: {error}")]
    Syntax {
        context: SourceContext,
        #[source]
        error: SyntaxError,
    },

    /// A call named a function the built-in library does not provide.
    #[error("unknown method '{name}' in {context}")]
    UnknownFunction {
        context: SourceContext,
        /// The function name as written.
        name: String,
    },

    /// A `relativePath(...)` pointer could not be resolved.
    #[error("invalid relative path in {context}: {error}")]
    InvalidRelativePath {
        context: SourceContext,
        #[source]
        error: PathError,
    },

    /// A structural function received an argument it cannot resolve at
    /// construction time.
    #[error("invalid argument to {function}() in {context}: {message}")]
    InvalidArgument {
        context: SourceContext,
        function: String,
        message: String,
    },

    /// A regex literal appeared somewhere other than the second argument of
    /// `matches` or `replace`.
    #[error("regex literal not allowed here in {context}")]
    MisplacedRegex { context: SourceContext },

    /// A regex literal failed to compile.
    #[error("invalid regex /{pattern}/ in {context}: {reason}")]
    InvalidRegex {
        context: SourceContext,
        pattern: String,
        reason: String,
    },

    /// `this` was used by an expression without a scope.
    #[error("'this' used without a scope in {context}")]
    UnscopedThis { context: SourceContext },
}

fn label_suffix(label: &Option<String>) -> String {
    label
        .as_deref()
        .map(|l| format!(" [{l}]"))
        .unwrap_or_default()
}

/// Convenience alias for construction results.
pub type Result<T> = std::result::Result<T, CompileError>;

impl CompileError {
    // -- Constructors --------------------------------------------------------

    pub fn invalid_argument(
        context: &SourceContext,
        function: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidArgument {
            context: context.clone(),
            function: function.into(),
            message: message.into(),
        }
    }

    // -- Accessors -----------------------------------------------------------

    /// The source the error refers to, if it got far enough to have one.
    pub fn context(&self) -> Option<&SourceContext> {
        match self {
            Self::EmptySource { .. } => None,
            Self::Syntax { context, .. }
            | Self::UnknownFunction { context, .. }
            | Self::InvalidRelativePath { context, .. }
            | Self::InvalidArgument { context, .. }
            | Self::MisplacedRegex { context }
            | Self::InvalidRegex { context, .. }
            | Self::UnscopedThis { context } => Some(context),
        }
    }

    // -- Predicates ----------------------------------------------------------

    pub fn is_unknown_function(&self) -> bool {
        matches!(self, Self::UnknownFunction { .. })
    }

    pub fn is_syntax(&self) -> bool {
        matches!(self, Self::Syntax { .. })
    }
}

// ---------------------------------------------------------------------------
// Built-in argument validation
// ---------------------------------------------------------------------------

/// Errors raised by individual built-in functions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuiltinError {
    /// Wrong number of arguments.
    #[error("{function}() expects {expected} argument(s), got {actual}")]
    Arity {
        function: String,
        /// Human-readable expectation, e.g. `"2 or 3"`.
        expected: String,
        actual: usize,
    },

    /// An argument had the wrong shape or range.
    #[error("{function}(): argument {position} {message}")]
    InvalidArgument {
        function: String,
        /// 1-based argument position.
        position: usize,
        message: String,
    },

    /// The function could not produce a result.
    #[error("{function}(): {message}")]
    Failed { function: String, message: String },
}

impl BuiltinError {
    pub fn invalid_argument(function: &str, position: usize, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            function: function.to_string(),
            position,
            message: message.into(),
        }
    }

    pub fn failed(function: &str, message: impl Into<String>) -> Self {
        Self::Failed {
            function: function.to_string(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation-time
// ---------------------------------------------------------------------------

/// What went wrong while walking the tree.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalFailure {
    #[error(transparent)]
    Builtin(#[from] BuiltinError),

    #[error("cannot read property '{name}' of null")]
    NullMember { name: String },

    #[error("cannot read index {index} of null")]
    NullIndex { index: String },

    #[error("expression has been disposed")]
    Disposed,
}

/// An evaluation failure enriched with everything needed to diagnose it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("failed to evaluate {context}: {cause}")]
pub struct EvaluationError {
    pub context: SourceContext,
    /// The compiled tree rendered with its slots, e.g. `fieldValues[0] > 5`.
    pub rewritten: String,
    /// Field paths with the values they held at the time.
    pub field_values: Vec<(String, Value)>,
    /// Fixed and external argument bindings at the time.
    pub arguments: Vec<(String, Value)>,
    pub cause: EvalFailure,
}

impl EvaluationError {
    pub fn is_disposed(&self) -> bool {
        matches!(self.cause, EvalFailure::Disposed)
    }
}
