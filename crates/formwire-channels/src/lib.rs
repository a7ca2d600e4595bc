//! Reactive channels for the formwire engine.
//!
//! Every piece of mutable form state (field values, search terms,
//! validities, repeat counts, question-set validity, built-in staleness) is
//! exposed as an individually subscribable [`Channel`]. Channels live in
//! lazily populated [`ChannelRegistry`] maps; [`ProjectionRegistry`] derives
//! pattern- and tag-selected field sets on top of them, and [`FormChannels`]
//! bundles the lot for one form.
//!
//! Everything here is single-threaded (`Rc`/`RefCell`): emissions run
//! synchronously on the caller's stack.

pub mod channel;
pub mod field_set;
pub mod form;
pub mod projection;
pub mod registry;
pub mod subscription;

// Re-exports for convenience.
pub use channel::Channel;
pub use field_set::{FieldPathEvent, FieldPathSet};
pub use form::FormChannels;
pub use projection::{ProjectionKind, ProjectionRegistry};
pub use registry::ChannelRegistry;
pub use subscription::{Subscription, SubscriptionSet};
