//! Registry of live, non-constant expressions for debugging tools.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use formwire_core::Value;
use serde::Serialize;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebugEntry {
    pub id: u64,
    pub label: Option<String>,
    pub source: String,
    pub latest: Option<Value>,
}

#[derive(Debug, Default)]
pub struct DebugRegistry {
    entries: RefCell<BTreeMap<u64, DebugEntry>>,
    next_id: Cell<u64>,
}

impl DebugRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an expression and returns its id.
    pub fn register(&self, label: Option<&str>, source: &str) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        trace!(id, source, "expression registered");
        self.entries.borrow_mut().insert(
            id,
            DebugEntry {
                id,
                label: label.map(str::to_string),
                source: source.to_string(),
                latest: None,
            },
        );
        id
    }

    /// Records the latest published value of `id`.
    pub fn update(&self, id: u64, value: &Value) {
        if let Some(entry) = self.entries.borrow_mut().get_mut(&id) {
            entry.latest = Some(value.clone());
        }
    }

    pub fn unregister(&self, id: u64) -> bool {
        let removed = self.entries.borrow_mut().remove(&id).is_some();
        if removed {
            trace!(id, "expression unregistered");
        }
        removed
    }

    /// Every live expression, oldest first.
    pub fn snapshot(&self) -> Vec<DebugEntry> {
        self.entries.borrow().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}
