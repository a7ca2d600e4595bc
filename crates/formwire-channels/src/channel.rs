//! [`Channel`] -- a named, synchronously emitting reactive stream.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::subscription::Subscription;

type Callback<T> = Rc<dyn Fn(&T)>;

struct Subscriber<T> {
    id: u64,
    active: Rc<Cell<bool>>,
    callback: Callback<T>,
}

struct Inner<T> {
    key: String,
    replay: bool,
    latest: RefCell<Option<T>>,
    subscribers: RefCell<Vec<Subscriber<T>>>,
    next_id: Cell<u64>,
    completed: Cell<bool>,
}

/// A reactive channel keyed by a string.
///
/// Two flavors exist:
/// - *replaying* channels remember their latest value and deliver it to new
///   subscribers immediately;
/// - *pulse* channels only deliver emissions made after subscribing.
///
/// Emission is synchronous: every active subscriber runs on the emitting
/// call stack, in subscription order. Subscribers may subscribe, emit or
/// unsubscribe from inside a callback. Cloning a `Channel` yields another
/// handle to the same channel.
pub struct Channel<T> {
    inner: Rc<Inner<T>>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("key", &self.inner.key)
            .field("replay", &self.inner.replay)
            .field("subscribers", &self.inner.subscribers.borrow().len())
            .field("completed", &self.inner.completed.get())
            .finish()
    }
}

impl<T: Clone + 'static> Channel<T> {
    /// Creates a replaying channel, optionally seeded with a first value.
    pub fn replaying(key: impl Into<String>, initial: Option<T>) -> Self {
        Self::with_flavor(key.into(), true, initial)
    }

    /// Creates a pulse channel.
    pub fn pulse(key: impl Into<String>) -> Self {
        Self::with_flavor(key.into(), false, None)
    }

    fn with_flavor(key: String, replay: bool, initial: Option<T>) -> Self {
        Self {
            inner: Rc::new(Inner {
                key,
                replay,
                latest: RefCell::new(initial),
                subscribers: RefCell::new(Vec::new()),
                next_id: Cell::new(0),
                completed: Cell::new(false),
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    pub fn replays(&self) -> bool {
        self.inner.replay
    }

    /// The value a new subscriber would be replayed, if any. Always `None`
    /// for pulse channels.
    pub fn latest(&self) -> Option<T> {
        self.inner.latest.borrow().clone()
    }

    /// Pushes `value` to every active subscriber.
    ///
    /// Emitting on a completed channel is a no-op.
    pub fn emit(&self, value: T) {
        if self.inner.completed.get() {
            return;
        }
        if self.inner.replay {
            *self.inner.latest.borrow_mut() = Some(value.clone());
        }

        // Snapshot so callbacks can (un)subscribe without a live borrow.
        let targets: Vec<(Rc<Cell<bool>>, Callback<T>)> = self
            .inner
            .subscribers
            .borrow()
            .iter()
            .map(|s| (Rc::clone(&s.active), Rc::clone(&s.callback)))
            .collect();

        for (active, callback) in targets {
            if active.get() {
                callback(&value);
            }
        }
    }

    /// Registers `callback`. Replaying channels call it right away with the
    /// latest value, if one exists.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        if self.inner.completed.get() {
            return Subscription::detached();
        }

        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        let active = Rc::new(Cell::new(true));
        let callback: Callback<T> = Rc::new(callback);

        self.inner.subscribers.borrow_mut().push(Subscriber {
            id,
            active: Rc::clone(&active),
            callback: Rc::clone(&callback),
        });

        let weak = Rc::downgrade(&self.inner);
        let subscription = Subscription::new(Rc::clone(&active), move || {
            if let Some(inner) = weak.upgrade() {
                inner.subscribers.borrow_mut().retain(|s| s.id != id);
            }
        });

        if self.inner.replay {
            let latest = self.inner.latest.borrow().clone();
            if let Some(value) = latest {
                if active.get() {
                    callback(&value);
                }
            }
        }

        subscription
    }

    /// Like [`Channel::subscribe`], but skips emissions equal to the last
    /// value this subscriber saw.
    pub fn subscribe_distinct(&self, callback: impl Fn(&T) + 'static) -> Subscription
    where
        T: PartialEq,
    {
        let last: RefCell<Option<T>> = RefCell::new(None);
        self.subscribe(move |value| {
            {
                let mut last = last.borrow_mut();
                if last.as_ref() == Some(value) {
                    return;
                }
                *last = Some(value.clone());
            }
            callback(value);
        })
    }

    /// Ends the channel: every subscriber is released and later emissions
    /// and subscriptions are ignored.
    pub fn complete(&self) {
        self.inner.completed.set(true);
        let subscribers = std::mem::take(&mut *self.inner.subscribers.borrow_mut());
        for subscriber in subscribers {
            subscriber.active.set(false);
        }
    }

    pub fn is_completed(&self) -> bool {
        self.inner.completed.get()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    /// Returns `true` if both handles point at the same channel.
    pub fn same_channel(&self, other: &Channel<T>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}
