//! [`FormChannels`] -- every registry one form needs, plus the inbound
//! helpers the form-state engine pushes through.

use std::rc::Rc;

use formwire_core::{ChannelKind, Value};
use tracing::{debug, info};

use crate::channel::Channel;
use crate::field_set::FieldPathSet;
use crate::projection::{ProjectionKind, ProjectionRegistry};
use crate::registry::ChannelRegistry;

/// The channel registries of one form.
///
/// Field values, search terms, validities and repeat counts replay; question
/// set validity and function staleness are pulses. `form_loaded` fires once
/// the host has finished creating the initial fields.
pub struct FormChannels {
    pub values: Rc<ChannelRegistry<Value>>,
    pub search_terms: Rc<ChannelRegistry<Value>>,
    pub validities: Rc<ChannelRegistry<bool>>,
    pub repeat_counts: Rc<ChannelRegistry<usize>>,
    pub question_sets: Rc<ChannelRegistry<bool>>,
    pub functions: Rc<ChannelRegistry<()>>,
    pub fields: Rc<FieldPathSet>,
    pub patterns: Rc<ProjectionRegistry>,
    pub tags: Rc<ProjectionRegistry>,
    form_loaded: Channel<()>,
}

impl Default for FormChannels {
    fn default() -> Self {
        Self::new()
    }
}

impl FormChannels {
    pub fn new() -> Self {
        let values = Rc::new(ChannelRegistry::replaying(ChannelKind::FieldValue, Value::Null));
        let fields = Rc::new(FieldPathSet::new());
        let patterns =
            ProjectionRegistry::new(ProjectionKind::Pattern, Rc::clone(&fields), Rc::clone(&values));
        let tags = ProjectionRegistry::new(ProjectionKind::Tag, Rc::clone(&fields), Rc::clone(&values));

        Self {
            values,
            search_terms: Rc::new(ChannelRegistry::replaying(
                ChannelKind::SearchTerm,
                Value::Text(String::new()),
            )),
            validities: Rc::new(ChannelRegistry::replaying(ChannelKind::FieldValidity, true)),
            repeat_counts: Rc::new(ChannelRegistry::replaying(ChannelKind::RepeatCount, 0)),
            question_sets: Rc::new(ChannelRegistry::pulse(ChannelKind::QuestionSetValidity)),
            functions: Rc::new(ChannelRegistry::pulse(ChannelKind::FunctionStale)),
            fields,
            patterns,
            tags,
            form_loaded: Channel::pulse("form-loaded"),
        }
    }

    // -- Field lifecycle ----------------------------------------------------

    /// Announces a field path with its metadata tags.
    pub fn add_field_path(&self, path: &str, tags: Vec<String>) -> bool {
        self.fields.insert(path, tags)
    }

    /// Announces a field path and pushes its value before the path becomes
    /// visible to projections.
    pub fn add_field(&self, path: &str, value: Value, tags: Vec<String>) -> bool {
        self.values.emit(path, value);
        self.add_field_path(path, tags)
    }

    /// Removes a field path. Its value and search term reset to their
    /// defaults; the channels themselves stay alive.
    ///
    /// The path leaves every projection before the reset, so aggregates
    /// never see the default value of a field that is going away.
    pub fn remove_field_path(&self, path: &str) -> bool {
        let removed = self.fields.remove(path);
        self.values.remove(path);
        self.search_terms.remove(path);
        removed
    }

    // -- Inbound pushes -------------------------------------------------------

    pub fn set_field_value(&self, path: &str, value: Value) {
        debug!(path, %value, "field value");
        self.values.emit(path, value);
    }

    pub fn set_search_term(&self, path: &str, term: Value) {
        self.search_terms.emit(path, term);
    }

    pub fn set_field_validity(&self, path: &str, valid: bool) {
        self.validities.emit(path, valid);
    }

    pub fn set_repeat_count(&self, group: &str, count: usize) {
        self.repeat_counts.emit(group, count);
    }

    pub fn set_question_set_validity(&self, name: &str, valid: bool) {
        self.question_sets.emit(name, valid);
    }

    /// Pulses the stale channel of one built-in function.
    pub fn mark_function_stale(&self, name: &str) {
        self.functions.emit(name, ());
    }

    // -- Form lifecycle -------------------------------------------------------

    /// Pulse fired by [`FormChannels::finish_loading`].
    pub fn form_loaded(&self) -> &Channel<()> {
        &self.form_loaded
    }

    pub fn finish_loading(&self) {
        info!(fields = self.fields.len(), "form loaded");
        self.form_loaded.emit(());
    }

    /// Full reset for form teardown: every channel is completed and every
    /// known path forgotten.
    pub fn delete_all(&self) {
        self.patterns.clear();
        self.tags.clear();
        self.fields.clear();
        self.values.delete_all();
        self.search_terms.delete_all();
        self.validities.delete_all();
        self.repeat_counts.delete_all();
        self.question_sets.delete_all();
        self.functions.delete_all();
        info!("form channels cleared");
    }
}
