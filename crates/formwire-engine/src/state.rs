//! Computed application state read by the stateful built-ins.
//!
//! The form-state engine and the operation layer own the truth; they push
//! it here through the setters, each of which fires the matching
//! [`Trigger`] signal so the invalidation wiring can mark dependent
//! built-ins stale.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

use formwire_channels::Channel;
use formwire_config::EngineConfig;
use formwire_core::{Trigger, Value};
use tracing::debug;

/// One pulse channel per [`Trigger`].
pub struct StateSignals {
    channels: Vec<(Trigger, Channel<()>)>,
}

impl Default for StateSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl StateSignals {
    pub fn new() -> Self {
        Self {
            channels: Trigger::ALL
                .iter()
                .map(|t| (*t, Channel::pulse(t.as_str())))
                .collect(),
        }
    }

    pub fn channel(&self, trigger: Trigger) -> Channel<()> {
        self.channels
            .iter()
            .find(|(t, _)| *t == trigger)
            .map(|(_, c)| c.clone())
            .unwrap_or_else(|| Channel::pulse(trigger.as_str()))
    }

    pub fn emit(&self, trigger: Trigger) {
        debug!(%trigger, "state changed");
        if let Some((_, channel)) = self.channels.iter().find(|(t, _)| *t == trigger) {
            channel.emit(());
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Navigation {
    article_index: usize,
    article_count: usize,
    element_index: usize,
    element_count: usize,
}

#[derive(Debug, Clone, Default)]
struct Operations {
    results: BTreeMap<String, Value>,
    errors: BTreeMap<String, String>,
    in_progress: BTreeSet<String>,
}

#[derive(Debug, Clone)]
struct Settings {
    debug_enabled: bool,
    debug_level: u8,
    currency_code: String,
    locale: String,
}

/// Application state consumed by navigation, operation, workflow, debug
/// and currency built-ins.
pub struct AppState {
    signals: StateSignals,
    navigation: RefCell<Navigation>,
    operations: RefCell<Operations>,
    calculations: RefCell<BTreeMap<String, Value>>,
    workflow_step: RefCell<Option<String>>,
    settings: RefCell<Settings>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl AppState {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            signals: StateSignals::new(),
            navigation: RefCell::new(Navigation::default()),
            operations: RefCell::new(Operations::default()),
            calculations: RefCell::new(BTreeMap::new()),
            workflow_step: RefCell::new(None),
            settings: RefCell::new(Settings {
                debug_enabled: config.debug.enabled,
                debug_level: config.debug.level,
                currency_code: config.currency.code.clone(),
                locale: config.locale.clone(),
            }),
        }
    }

    pub fn signals(&self) -> &StateSignals {
        &self.signals
    }

    // -- Navigation -----------------------------------------------------------

    pub fn set_article(&self, index: usize, count: usize) {
        {
            let mut nav = self.navigation.borrow_mut();
            nav.article_index = index;
            nav.article_count = count;
        }
        self.signals.emit(Trigger::ArticleIndex);
    }

    pub fn set_element(&self, index: usize, count: usize) {
        {
            let mut nav = self.navigation.borrow_mut();
            nav.element_index = index;
            nav.element_count = count;
        }
        self.signals.emit(Trigger::ElementIndex);
    }

    /// Reports that some element's visibility changed.
    pub fn visibility_changed(&self) {
        self.signals.emit(Trigger::Visibility);
    }

    /// Reports that a repeating group gained or lost an instance.
    pub fn repeating_field_changed(&self) {
        self.signals.emit(Trigger::RepeatingField);
    }

    pub fn article_index(&self) -> usize {
        self.navigation.borrow().article_index
    }

    pub fn article_count(&self) -> usize {
        self.navigation.borrow().article_count
    }

    pub fn element_index(&self) -> usize {
        self.navigation.borrow().element_index
    }

    pub fn element_count(&self) -> usize {
        self.navigation.borrow().element_count
    }

    // -- Operations -----------------------------------------------------------

    pub fn start_operation(&self, name: &str) {
        self.operations
            .borrow_mut()
            .in_progress
            .insert(name.to_string());
        self.signals.emit(Trigger::OperationInProgress);
    }

    /// Records the outcome of an operation and clears its in-progress flag.
    pub fn finish_operation(&self, name: &str, outcome: Result<Value, String>) {
        {
            let mut ops = self.operations.borrow_mut();
            ops.in_progress.remove(name);
            match outcome {
                Ok(value) => {
                    ops.errors.remove(name);
                    ops.results.insert(name.to_string(), value);
                }
                Err(message) => {
                    ops.results.remove(name);
                    ops.errors.insert(name.to_string(), message);
                }
            }
        }
        self.signals.emit(Trigger::OperationInProgress);
        self.signals.emit(Trigger::OperationResult);
    }

    pub fn operation_result(&self, name: &str) -> Value {
        self.operations
            .borrow()
            .results
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn operation_error(&self, name: &str) -> Option<String> {
        self.operations.borrow().errors.get(name).cloned()
    }

    pub fn is_operation_in_progress(&self, name: &str) -> bool {
        self.operations.borrow().in_progress.contains(name)
    }

    pub fn any_operation_in_progress(&self) -> bool {
        !self.operations.borrow().in_progress.is_empty()
    }

    // -- Calculations / workflow ------------------------------------------------

    pub fn set_calculation_result(&self, name: &str, value: Value) {
        self.calculations
            .borrow_mut()
            .insert(name.to_string(), value);
        self.signals.emit(Trigger::CalculationResult);
    }

    pub fn calculation_result(&self, name: &str) -> Value {
        self.calculations
            .borrow()
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_workflow_step(&self, step: Option<&str>) {
        *self.workflow_step.borrow_mut() = step.map(str::to_string);
        self.signals.emit(Trigger::WorkflowStep);
    }

    pub fn workflow_step(&self) -> Option<String> {
        self.workflow_step.borrow().clone()
    }

    // -- Settings -------------------------------------------------------------

    pub fn set_debug(&self, enabled: bool) {
        self.settings.borrow_mut().debug_enabled = enabled;
        self.signals.emit(Trigger::DebugFlag);
    }

    pub fn set_debug_level(&self, level: u8) {
        self.settings.borrow_mut().debug_level = level;
        self.signals.emit(Trigger::DebugLevel);
    }

    pub fn set_currency_code(&self, code: &str) {
        self.settings.borrow_mut().currency_code = code.to_string();
        self.signals.emit(Trigger::CurrencyCode);
    }

    pub fn is_debug(&self) -> bool {
        self.settings.borrow().debug_enabled
    }

    pub fn debug_level(&self) -> u8 {
        self.settings.borrow().debug_level
    }

    pub fn currency_code(&self) -> String {
        self.settings.borrow().currency_code.clone()
    }

    pub fn locale(&self) -> String {
        self.settings.borrow().locale.clone()
    }
}
