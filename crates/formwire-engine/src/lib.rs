//! Reactive formula engine for dynamic forms.
//!
//! A form designer writes formulas such as `amount > 5` or
//! `sum(getFieldValuesForFieldPathPattern('claims[*].amount'))`. An
//! [`Expression`] compiles one formula once, subscribes to exactly the
//! channels it references and republishes its result whenever one of them
//! changes.
//!
//! Compilation runs in ordered passes over a parsed tree (see [`compile`]):
//! legacy call rewrites, structural extraction of field/validity/count/
//! pattern/tag references, question-set discovery, built-in validation and
//! finally identifier resolution. Evaluation walks the resulting tree
//! against the latest channel values (see [`eval`]).
//!
//! Everything that would otherwise be a global (channels, application state,
//! the clock timer, formatters, the debug registry) lives in a
//! [`Dependencies`] value handed to each expression.

pub mod ast;
pub mod builtins;
pub mod clock;
pub mod compile;
pub mod debug;
pub mod dependencies;
pub mod error;
pub mod eval;
pub mod expression;
pub mod format;
pub mod invalidation;
pub mod lexer;
pub mod parser;
pub mod state;
pub mod timer;

// Re-exports for convenience.
pub use builtins::{Builtin, Builtins, CallContext};
pub use clock::{Clock, ManualClock, SystemClock};
pub use compile::{AggregateSource, ArgumentKind, LEGACY_FUNCTIONS, References, STRUCTURAL_FUNCTIONS};
pub use debug::{DebugEntry, DebugRegistry};
pub use dependencies::{Dependencies, DependenciesBuilder};
pub use error::{BuiltinError, CompileError, EvalFailure, EvaluationError, SourceContext};
pub use expression::{Expression, ExpressionOptions};
pub use format::{CurrencyFormatter, DefaultCurrencyFormatter, HtmlTableRenderer, TableRenderer};
pub use invalidation::{GROUPS, InvalidationGroup, InvalidationWiring};
pub use state::{AppState, StateSignals};
pub use timer::IntervalTimer;
