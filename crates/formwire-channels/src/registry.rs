//! [`ChannelRegistry`] -- lazily populated, string-keyed channel maps.

use std::cell::RefCell;
use std::collections::HashMap;

use formwire_core::ChannelKind;
use tracing::{debug, trace};

use crate::channel::Channel;

/// One channel per key, created on first use and kept for the lifetime of
/// the registry.
///
/// Replaying registries seed new channels with a default value so a key
/// referenced before anything was pushed to it reads as that default rather
/// than failing. [`ChannelRegistry::remove`] resets a channel to the default
/// but keeps the channel object, so subscribers created before a field was
/// removed keep receiving values once the field is recreated.
pub struct ChannelRegistry<T> {
    kind: ChannelKind,
    /// `Some` for replaying registries, `None` for pulse registries.
    default: Option<T>,
    channels: RefCell<HashMap<String, Channel<T>>>,
}

impl<T: Clone + 'static> ChannelRegistry<T> {
    /// A registry of replaying channels seeded with `default`.
    pub fn replaying(kind: ChannelKind, default: T) -> Self {
        Self {
            kind,
            default: Some(default),
            channels: RefCell::new(HashMap::new()),
        }
    }

    /// A registry of pulse channels.
    pub fn pulse(kind: ChannelKind) -> Self {
        Self {
            kind,
            default: None,
            channels: RefCell::new(HashMap::new()),
        }
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    /// Returns the channel for `key`, creating it if needed.
    ///
    /// A new replaying channel starts at `initial`, or at the registry
    /// default when `initial` is `None`. An existing channel is returned
    /// untouched.
    pub fn get_or_create(&self, key: &str, initial: Option<T>) -> Channel<T> {
        let existing = self.channels.borrow().get(key).cloned();
        if let Some(channel) = existing {
            return channel;
        }

        let channel = match &self.default {
            Some(default) => Channel::replaying(key, initial.or_else(|| Some(default.clone()))),
            None => Channel::pulse(key),
        };
        trace!(kind = %self.kind, key, "channel created");
        self.channels
            .borrow_mut()
            .insert(key.to_owned(), channel.clone());
        channel
    }

    /// Returns the channel for `key`, creating it with the default if absent.
    pub fn observable(&self, key: &str) -> Channel<T> {
        self.get_or_create(key, None)
    }

    /// Pushes `value` onto the channel for `key`.
    pub fn emit(&self, key: &str, value: T) {
        self.observable(key).emit(value);
    }

    /// The latest value of an existing replaying channel.
    pub fn latest_value(&self, key: &str) -> Option<T> {
        self.channels.borrow().get(key).and_then(Channel::latest)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.channels.borrow().contains_key(key)
    }

    /// Resets the channel for `key` to the registry default, keeping the
    /// channel and its subscribers. Pulse channels are left alone.
    pub fn remove(&self, key: &str) {
        let channel = self.channels.borrow().get(key).cloned();
        if let (Some(channel), Some(default)) = (channel, self.default.clone()) {
            trace!(kind = %self.kind, key, "channel reset");
            channel.emit(default);
        }
    }

    /// Completes and forgets every channel. Used when the form is torn down.
    pub fn delete_all(&self) {
        let channels: Vec<Channel<T>> = self
            .channels
            .borrow_mut()
            .drain()
            .map(|(_, channel)| channel)
            .collect();
        debug!(kind = %self.kind, count = channels.len(), "registry cleared");
        for channel in channels {
            channel.complete();
        }
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.channels.borrow().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.channels.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formwire_core::Value;
    use pretty_assertions::assert_eq;
    use std::rc::Rc;

    fn values() -> ChannelRegistry<Value> {
        ChannelRegistry::replaying(ChannelKind::FieldValue, Value::Null)
    }

    #[test]
    fn one_channel_per_key() {
        let registry = values();
        let a = registry.observable("amount");
        let b = registry.get_or_create("amount", Some(Value::from(5)));
        assert!(a.same_channel(&b));
        assert_eq!(registry.len(), 1);
        // The initial value only applies on creation.
        assert_eq!(registry.latest_value("amount"), Some(Value::Null));
    }

    #[test]
    fn get_or_create_seeds_initial_value() {
        let registry = values();
        registry.get_or_create("amount", Some(Value::from(10)));
        assert_eq!(registry.latest_value("amount"), Some(Value::from(10)));
        assert_eq!(registry.latest_value("missing"), None);
    }

    #[test]
    fn remove_resets_but_keeps_subscribers() {
        let registry = values();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _sub = registry
            .observable("claims[0].amount")
            .subscribe(move |v: &Value| sink.borrow_mut().push(v.clone()));

        registry.emit("claims[0].amount", Value::from(10));
        registry.remove("claims[0].amount");
        registry.emit("claims[0].amount", Value::from(7));

        assert_eq!(
            *seen.borrow(),
            vec![Value::Null, Value::from(10), Value::Null, Value::from(7)]
        );
    }

    #[test]
    fn pulse_registry_has_no_latest() {
        let registry: ChannelRegistry<()> = ChannelRegistry::pulse(ChannelKind::FunctionStale);
        registry.emit("now", ());
        assert!(registry.contains("now"));
        assert_eq!(registry.latest_value("now"), None);
        registry.remove("now");
    }

    #[test]
    fn delete_all_completes_channels() {
        let registry = values();
        let channel = registry.observable("a");
        registry.delete_all();
        assert!(channel.is_completed());
        assert!(registry.is_empty());
        assert!(!registry.observable("a").same_channel(&channel));
    }
}
