//! Subscription handles.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// An RAII handle for one channel subscription.
///
/// Dropping the handle (or calling [`Subscription::unsubscribe`]) detaches
/// the callback. A subscription released while its channel is mid-emission
/// is not called again, even for the emission in progress.
pub struct Subscription {
    active: Rc<Cell<bool>>,
    detach: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub(crate) fn new(active: Rc<Cell<bool>>, detach: impl FnOnce() + 'static) -> Self {
        Self {
            active,
            detach: Some(Box::new(detach)),
        }
    }

    /// A handle that was never attached (e.g. subscribing to a completed
    /// channel).
    pub(crate) fn detached() -> Self {
        Self {
            active: Rc::new(Cell::new(false)),
            detach: None,
        }
    }

    /// Returns `true` until the subscription is released or its channel
    /// completes.
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Detaches the callback now.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        self.active.set(false);
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.active.get())
            .finish()
    }
}

/// An owned collection of subscriptions released together.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    subscriptions: Vec<Subscription>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Releases every held subscription.
    pub fn clear(&mut self) {
        self.subscriptions.clear();
    }

    /// Moves the subscriptions out, leaving the set empty. Used to drop them
    /// outside of a `RefCell` borrow.
    pub fn take(&mut self) -> Vec<Subscription> {
        std::mem::take(&mut self.subscriptions)
    }
}

impl Extend<Subscription> for SubscriptionSet {
    fn extend<I: IntoIterator<Item = Subscription>>(&mut self, iter: I) {
        self.subscriptions.extend(iter);
    }
}
