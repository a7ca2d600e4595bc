//! Which upstream state changes make which built-ins stale.
//!
//! Built-ins such as `now()` or `operationResult('x')` read state that is
//! not a form channel. [`InvalidationWiring`] forwards the matching
//! [`Trigger`] signals onto each function's stale channel so expressions
//! calling them re-evaluate.

use std::rc::Rc;

use formwire_channels::{Channel, ChannelRegistry, SubscriptionSet};
use formwire_core::Trigger;
use tracing::{debug, trace};

use crate::state::StateSignals;

/// A set of built-ins sharing the same upstream sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidationGroup {
    pub name: &'static str,
    pub functions: &'static [&'static str],
    pub sources: &'static [Trigger],
}

pub const GROUPS: &[InvalidationGroup] = &[
    InvalidationGroup {
        name: "clock",
        functions: &["now", "today", "currentTime"],
        sources: &[Trigger::Timer],
    },
    InvalidationGroup {
        name: "operations",
        functions: &["operationResult", "isOperationInProgress", "operationError"],
        sources: &[Trigger::OperationResult, Trigger::OperationInProgress],
    },
    InvalidationGroup {
        name: "calculations",
        functions: &["calculationResult"],
        sources: &[Trigger::CalculationResult],
    },
    InvalidationGroup {
        name: "workflow",
        functions: &["workflowStep", "isWorkflowStep"],
        sources: &[Trigger::WorkflowStep],
    },
    InvalidationGroup {
        name: "navigation",
        functions: &[
            "isFirstArticle",
            "isLastArticle",
            "articleIndex",
            "elementIndex",
            "hasNextElement",
            "hasPreviousElement",
        ],
        sources: &[
            Trigger::ArticleIndex,
            Trigger::ElementIndex,
            Trigger::Visibility,
            Trigger::RepeatingField,
        ],
    },
    InvalidationGroup {
        name: "repeating",
        functions: &["repeatIndex"],
        sources: &[Trigger::RepeatingField],
    },
    InvalidationGroup {
        name: "debug",
        functions: &["isDebug", "debugLevel"],
        sources: &[Trigger::DebugFlag, Trigger::DebugLevel],
    },
    InvalidationGroup {
        name: "currency",
        functions: &["formatCurrency", "currencyCode", "currencySymbol"],
        sources: &[Trigger::CurrencyCode],
    },
];

/// The group `function` belongs to, if it has one.
pub fn group_for(function: &str) -> Option<&'static InvalidationGroup> {
    GROUPS.iter().find(|g| g.functions.contains(&function))
}

/// Live forwarding from state signals to function stale channels.
///
/// Each group merges its sources into one channel first, so a source is
/// subscribed once per group rather than once per function.
pub struct InvalidationWiring {
    merged: Vec<Channel<()>>,
    subscriptions: SubscriptionSet,
}

impl InvalidationWiring {
    pub fn start(signals: &StateSignals, stale: &Rc<ChannelRegistry<()>>) -> Self {
        let mut subscriptions = SubscriptionSet::new();
        let mut merged = Vec::with_capacity(GROUPS.len());

        for group in GROUPS {
            let broadcast = Channel::pulse(format!("invalidate:{}", group.name));

            for &function in group.functions {
                let registry = Rc::clone(stale);
                let group_name = group.name;
                subscriptions.push(broadcast.subscribe(move |_: &()| {
                    trace!(group = group_name, function, "function stale");
                    registry.emit(function, ());
                }));
            }

            for source in group.sources {
                let target = broadcast.clone();
                subscriptions.push(signals.channel(*source).subscribe(move |_: &()| {
                    target.emit(());
                }));
            }

            merged.push(broadcast);
        }

        debug!(groups = GROUPS.len(), "invalidation wiring started");
        Self {
            merged,
            subscriptions,
        }
    }

    /// Releases every forwarding subscription.
    pub fn stop(mut self) {
        self.subscriptions.clear();
        for channel in &self.merged {
            channel.complete();
        }
        debug!("invalidation wiring stopped");
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formwire_core::ChannelKind;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    fn counter(
        stale: &ChannelRegistry<()>,
        function: &str,
    ) -> (Rc<RefCell<usize>>, formwire_channels::Subscription) {
        let hits = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&hits);
        let sub = stale
            .observable(function)
            .subscribe(move |_: &()| *sink.borrow_mut() += 1);
        (hits, sub)
    }

    #[test]
    fn every_function_belongs_to_one_group() {
        let mut seen = Vec::new();
        for group in GROUPS {
            for &function in group.functions {
                assert!(!seen.contains(&function), "{function} listed twice");
                seen.push(function);
            }
        }
        assert_eq!(group_for("now").map(|g| g.name), Some("clock"));
        assert_eq!(group_for("repeatIndex").map(|g| g.name), Some("repeating"));
        assert_eq!(group_for("substring"), None);
    }

    #[test]
    fn sources_reach_every_function_in_the_group() {
        let signals = StateSignals::new();
        let stale = Rc::new(ChannelRegistry::pulse(ChannelKind::FunctionStale));
        let _wiring = InvalidationWiring::start(&signals, &stale);

        let (first, _a) = counter(&stale, "isFirstArticle");
        let (has_next, _b) = counter(&stale, "hasNextElement");
        let (repeat, _c) = counter(&stale, "repeatIndex");

        signals.emit(Trigger::Visibility);
        signals.emit(Trigger::RepeatingField);

        assert_eq!(*first.borrow(), 2);
        assert_eq!(*has_next.borrow(), 2);
        assert_eq!(*repeat.borrow(), 1);
    }

    #[test]
    fn stop_releases_forwarding() {
        let signals = StateSignals::new();
        let stale = Rc::new(ChannelRegistry::pulse(ChannelKind::FunctionStale));
        let wiring = InvalidationWiring::start(&signals, &stale);
        let (now, _sub) = counter(&stale, "now");

        signals.emit(Trigger::Timer);
        wiring.stop();
        signals.emit(Trigger::Timer);

        assert_eq!(*now.borrow(), 1);
    }
}
