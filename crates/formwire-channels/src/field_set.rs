//! The set of field paths currently known to the form.

use std::cell::RefCell;

use indexmap::IndexMap;
use tracing::debug;

use crate::channel::Channel;

/// A field path together with the tags declared in its metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPathEvent {
    pub path: String,
    pub tags: Vec<String>,
}

/// Known field paths in discovery order, with added/removed event channels.
///
/// Re-adding a removed path appends it again at the end.
pub struct FieldPathSet {
    paths: RefCell<IndexMap<String, Vec<String>>>,
    added: Channel<FieldPathEvent>,
    removed: Channel<FieldPathEvent>,
}

impl Default for FieldPathSet {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldPathSet {
    pub fn new() -> Self {
        Self {
            paths: RefCell::new(IndexMap::new()),
            added: Channel::pulse("field-path-added"),
            removed: Channel::pulse("field-path-removed"),
        }
    }

    /// Adds `path` with its tags. Returns `false` (and emits nothing) if the
    /// path is already known.
    pub fn insert(&self, path: &str, tags: Vec<String>) -> bool {
        let event = {
            let mut paths = self.paths.borrow_mut();
            if paths.contains_key(path) {
                return false;
            }
            paths.insert(path.to_owned(), tags.clone());
            FieldPathEvent {
                path: path.to_owned(),
                tags,
            }
        };
        debug!(path, "field path added");
        self.added.emit(event);
        true
    }

    /// Removes `path`. Returns `false` if it was not known.
    pub fn remove(&self, path: &str) -> bool {
        let Some(tags) = self.paths.borrow_mut().shift_remove(path) else {
            return false;
        };
        debug!(path, "field path removed");
        self.removed.emit(FieldPathEvent {
            path: path.to_owned(),
            tags,
        });
        true
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.borrow().contains_key(path)
    }

    /// Known paths in discovery order.
    pub fn paths(&self) -> Vec<String> {
        self.paths.borrow().keys().cloned().collect()
    }

    /// Known paths with their tags, in discovery order.
    pub fn entries(&self) -> Vec<FieldPathEvent> {
        self.paths
            .borrow()
            .iter()
            .map(|(path, tags)| FieldPathEvent {
                path: path.clone(),
                tags: tags.clone(),
            })
            .collect()
    }

    pub fn tags(&self, path: &str) -> Vec<String> {
        self.paths.borrow().get(path).cloned().unwrap_or_default()
    }

    pub fn added(&self) -> &Channel<FieldPathEvent> {
        &self.added
    }

    pub fn removed(&self) -> &Channel<FieldPathEvent> {
        &self.removed
    }

    /// Forgets every path without emitting removal events.
    pub fn clear(&self) {
        self.paths.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.paths.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::rc::Rc;

    #[test]
    fn insert_preserves_discovery_order() {
        let set = FieldPathSet::new();
        assert!(set.insert("b", vec![]));
        assert!(set.insert("a", vec!["money".into()]));
        assert!(!set.insert("b", vec![]));
        assert_eq!(set.paths(), vec!["b", "a"]);
        assert_eq!(set.tags("a"), vec!["money"]);
    }

    #[test]
    fn remove_emits_event_with_tags() {
        let set = FieldPathSet::new();
        let removed = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&removed);
        let _sub = set
            .removed()
            .subscribe(move |e: &FieldPathEvent| sink.borrow_mut().push(e.clone()));

        set.insert("a", vec!["t".into()]);
        assert!(set.remove("a"));
        assert!(!set.remove("a"));
        assert_eq!(
            *removed.borrow(),
            vec![FieldPathEvent {
                path: "a".into(),
                tags: vec!["t".into()],
            }]
        );
    }

    #[test]
    fn readded_path_moves_to_end() {
        let set = FieldPathSet::new();
        set.insert("a", vec![]);
        set.insert("b", vec![]);
        set.remove("a");
        set.insert("a", vec![]);
        assert_eq!(set.paths(), vec!["b", "a"]);
    }
}
