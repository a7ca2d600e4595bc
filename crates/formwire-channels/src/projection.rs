//! Pattern- and tag-selected projections over the known field paths.
//!
//! A projection tracks the live, ordered set of field paths matching one
//! selector together with an index-synchronized array of their current
//! values. Both are exposed as replaying channels so an expression can
//! subscribe to "all `claims[*].amount` values" before any claim exists.
//! A third channel carries paths and values as one snapshot for readers
//! that need them paired.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use formwire_core::{FieldPathPattern, Value};
use tracing::{debug, trace, warn};

use crate::channel::Channel;
use crate::field_set::{FieldPathEvent, FieldPathSet};
use crate::registry::ChannelRegistry;
use crate::subscription::{Subscription, SubscriptionSet};

/// How a projection selects its field paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjectionKind {
    /// Keys are wildcard patterns such as `claims[*].amount`.
    Pattern,
    /// Keys are tags declared in field metadata.
    Tag,
}

impl ProjectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectionKind::Pattern => "pattern",
            ProjectionKind::Tag => "tag",
        }
    }
}

impl fmt::Display for ProjectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

enum Selector {
    Pattern(FieldPathPattern),
    Tag(String),
    /// A pattern that failed to compile matches nothing.
    Nothing,
}

impl Selector {
    fn new(kind: ProjectionKind, key: &str) -> Self {
        match kind {
            ProjectionKind::Tag => Selector::Tag(key.to_owned()),
            ProjectionKind::Pattern => match FieldPathPattern::new(key) {
                Ok(pattern) => Selector::Pattern(pattern),
                Err(err) => {
                    warn!(pattern = key, %err, "pattern matches nothing");
                    Selector::Nothing
                }
            },
        }
    }

    fn matches(&self, event: &FieldPathEvent) -> bool {
        match self {
            Selector::Pattern(pattern) => pattern.matches(&event.path),
            Selector::Tag(tag) => event.tags.iter().any(|t| t == tag),
            Selector::Nothing => false,
        }
    }
}

struct Projection {
    key: String,
    selector: Selector,
    value_registry: Rc<ChannelRegistry<Value>>,
    paths: RefCell<Vec<String>>,
    values: RefCell<Vec<Value>>,
    value_subscriptions: RefCell<HashMap<String, Subscription>>,
    /// Set while a path is being attached so the replayed value does not
    /// publish a half-built array.
    attaching: Cell<bool>,
    paths_channel: Channel<Vec<String>>,
    values_channel: Channel<Vec<Value>>,
    entries_channel: Channel<(Vec<String>, Vec<Value>)>,
}

impl Projection {
    fn new(kind: ProjectionKind, key: &str, value_registry: Rc<ChannelRegistry<Value>>) -> Rc<Self> {
        Rc::new(Self {
            key: key.to_owned(),
            selector: Selector::new(kind, key),
            value_registry,
            paths: RefCell::new(Vec::new()),
            values: RefCell::new(Vec::new()),
            value_subscriptions: RefCell::new(HashMap::new()),
            attaching: Cell::new(false),
            paths_channel: Channel::replaying(format!("{kind}:{key}:paths"), Some(Vec::new())),
            values_channel: Channel::replaying(format!("{kind}:{key}:values"), Some(Vec::new())),
            entries_channel: Channel::replaying(
                format!("{kind}:{key}:entries"),
                Some((Vec::new(), Vec::new())),
            ),
        })
    }

    fn attach(self: &Rc<Self>, path: &str) {
        {
            let mut paths = self.paths.borrow_mut();
            if paths.iter().any(|p| p == path) {
                return;
            }
            paths.push(path.to_owned());
            self.values.borrow_mut().push(Value::Null);
        }

        self.attaching.set(true);
        let weak: Weak<Self> = Rc::downgrade(self);
        let owned = path.to_owned();
        let subscription = self
            .value_registry
            .observable(path)
            .subscribe(move |value: &Value| {
                if let Some(projection) = weak.upgrade() {
                    projection.update_value(&owned, value);
                }
            });
        self.attaching.set(false);
        self.value_subscriptions
            .borrow_mut()
            .insert(path.to_owned(), subscription);

        trace!(projection = %self.key, path, "path attached");
        self.publish_membership();
    }

    fn detach(&self, path: &str) {
        let removed = {
            let mut paths = self.paths.borrow_mut();
            match paths.iter().position(|p| p == path) {
                Some(index) => {
                    paths.remove(index);
                    self.values.borrow_mut().remove(index);
                    true
                }
                None => false,
            }
        };
        if !removed {
            return;
        }

        let subscription = self.value_subscriptions.borrow_mut().remove(path);
        drop(subscription);

        trace!(projection = %self.key, path, "path detached");
        self.publish_membership();
    }

    fn update_value(&self, path: &str, value: &Value) {
        let changed = {
            let paths = self.paths.borrow();
            let Some(index) = paths.iter().position(|p| p == path) else {
                return;
            };
            let mut values = self.values.borrow_mut();
            if values[index] == *value {
                false
            } else {
                values[index] = value.clone();
                true
            }
        };
        if changed && !self.attaching.get() {
            self.publish_values();
        }
    }

    /// Both lists are already updated when the first channel emits.
    fn publish_membership(&self) {
        let paths = self.paths.borrow().clone();
        let values = self.values.borrow().clone();
        self.paths_channel.emit(paths.clone());
        self.values_channel.emit(values.clone());
        self.entries_channel.emit((paths, values));
    }

    fn publish_values(&self) {
        let paths = self.paths.borrow().clone();
        let values = self.values.borrow().clone();
        self.values_channel.emit(values.clone());
        self.entries_channel.emit((paths, values));
    }

    fn close(&self) {
        let subscriptions: Vec<Subscription> = self
            .value_subscriptions
            .borrow_mut()
            .drain()
            .map(|(_, s)| s)
            .collect();
        drop(subscriptions);
        self.paths_channel.complete();
        self.values_channel.complete();
        self.entries_channel.complete();
    }
}

/// All projections of one [`ProjectionKind`], created lazily per key.
///
/// The registry follows the form's [`FieldPathSet`]: every added path is
/// offered to each existing projection, every removed path is detached from
/// the projections holding it. A projection created late scans the paths
/// already known, so discovery order is preserved either way.
pub struct ProjectionRegistry {
    kind: ProjectionKind,
    fields: Rc<FieldPathSet>,
    value_registry: Rc<ChannelRegistry<Value>>,
    projections: RefCell<HashMap<String, Rc<Projection>>>,
    subscriptions: RefCell<SubscriptionSet>,
}

impl ProjectionRegistry {
    pub fn new(
        kind: ProjectionKind,
        fields: Rc<FieldPathSet>,
        value_registry: Rc<ChannelRegistry<Value>>,
    ) -> Rc<Self> {
        let registry = Rc::new(Self {
            kind,
            fields: Rc::clone(&fields),
            value_registry,
            projections: RefCell::new(HashMap::new()),
            subscriptions: RefCell::new(SubscriptionSet::new()),
        });

        let weak = Rc::downgrade(&registry);
        let added = fields.added().subscribe(move |event: &FieldPathEvent| {
            if let Some(registry) = weak.upgrade() {
                registry.on_added(event);
            }
        });
        let weak = Rc::downgrade(&registry);
        let removed = fields.removed().subscribe(move |event: &FieldPathEvent| {
            if let Some(registry) = weak.upgrade() {
                registry.on_removed(event);
            }
        });
        {
            let mut subscriptions = registry.subscriptions.borrow_mut();
            subscriptions.push(added);
            subscriptions.push(removed);
        }
        registry
    }

    pub fn kind(&self) -> ProjectionKind {
        self.kind
    }

    /// Matching paths for `key`, in discovery order.
    pub fn matching_field_paths(&self, key: &str) -> Vec<String> {
        self.projection(key).paths.borrow().clone()
    }

    /// Replaying channel of the matching paths for `key`.
    pub fn matching_fields_channel(&self, key: &str) -> Channel<Vec<String>> {
        self.projection(key).paths_channel.clone()
    }

    /// Replaying channel of the current values of the matching paths, in the
    /// same order as [`ProjectionRegistry::matching_field_paths`].
    pub fn aggregated_values_channel(&self, key: &str) -> Channel<Vec<Value>> {
        self.projection(key).values_channel.clone()
    }

    /// Replaying channel of the matching paths paired with their values.
    /// Every emission is a consistent snapshot of both lists.
    pub fn entries_channel(&self, key: &str) -> Channel<(Vec<String>, Vec<Value>)> {
        self.projection(key).entries_channel.clone()
    }

    pub fn aggregated_values(&self, key: &str) -> Vec<Value> {
        self.projection(key).values.borrow().clone()
    }

    /// Keys of every projection created so far, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.projections.borrow().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Drops every projection, completing their channels.
    pub fn clear(&self) {
        let projections: Vec<Rc<Projection>> = self
            .projections
            .borrow_mut()
            .drain()
            .map(|(_, p)| p)
            .collect();
        debug!(kind = %self.kind, count = projections.len(), "projections cleared");
        for projection in projections {
            projection.close();
        }
    }

    fn projection(&self, key: &str) -> Rc<Projection> {
        let existing = self.projections.borrow().get(key).cloned();
        if let Some(projection) = existing {
            return projection;
        }

        let projection = Projection::new(self.kind, key, Rc::clone(&self.value_registry));
        for entry in self.fields.entries() {
            if projection.selector.matches(&entry) {
                projection.attach(&entry.path);
            }
        }
        debug!(
            kind = %self.kind,
            key,
            matches = projection.paths.borrow().len(),
            "projection created"
        );
        self.projections
            .borrow_mut()
            .insert(key.to_owned(), Rc::clone(&projection));
        projection
    }

    fn snapshot(&self) -> Vec<Rc<Projection>> {
        self.projections.borrow().values().cloned().collect()
    }

    fn on_added(&self, event: &FieldPathEvent) {
        for projection in self.snapshot() {
            if projection.selector.matches(event) {
                projection.attach(&event.path);
            }
        }
    }

    fn on_removed(&self, event: &FieldPathEvent) {
        for projection in self.snapshot() {
            projection.detach(&event.path);
        }
    }
}
