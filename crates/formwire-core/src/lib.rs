//! Core types shared by every formwire crate.
//!
//! This crate holds the dynamic [`Value`](value::Value) model that flows
//! through channels and the evaluator, field-path addressing helpers
//! (scopes, relative pointers, wildcard patterns), and the small enums that
//! name channel and reference kinds.

pub mod enums;
pub mod path;
pub mod value;

pub use enums::{ChannelKind, Trigger};
pub use path::{FieldPathPattern, PathError};
pub use value::{RegexValue, Value};
