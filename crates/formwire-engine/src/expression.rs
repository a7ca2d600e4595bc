//! [`Expression`] -- one live formula.
//!
//! Construction compiles the source and subscribes to every channel the
//! compiled tree reads. Nothing is evaluated until [`Expression::evaluate`]
//! is called or the form signals that loading finished; from then on every
//! change on a subscribed channel re-evaluates the formula and publishes the
//! result on [`Expression::output`] when it differs from the last one.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::rc::{Rc, Weak};

use formwire_channels::{Channel, Subscription, SubscriptionSet};
use formwire_core::Value;
use tracing::{debug, error, trace};

use crate::compile::{self, AggregateSource, ArgumentKind, CompileEnv, Compiled, References};
use crate::dependencies::Dependencies;
use crate::error::{CompileError, EvalFailure, EvaluationError, SourceContext};
use crate::eval::{self, Inputs};

/// Everything an expression is created with besides its source.
#[derive(Debug, Clone, Default)]
pub struct ExpressionOptions {
    scope: Option<String>,
    fixed: Vec<(String, Value)>,
    external: Vec<(String, Channel<Value>)>,
    debug_label: Option<String>,
    always_publish: Option<bool>,
}

impl ExpressionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Path of the repeating-group instance `this.` refers to.
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Binds `name` to a value that never changes.
    pub fn fixed(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fixed.push((name.into(), value));
        self
    }

    /// Binds `name` to a channel owned by the host.
    pub fn external(mut self, name: impl Into<String>, channel: Channel<Value>) -> Self {
        self.external.push((name.into(), channel));
        self
    }

    pub fn debug_label(mut self, label: impl Into<String>) -> Self {
        self.debug_label = Some(label.into());
        self
    }

    /// Publish every evaluation, even when the result did not change.
    /// Defaults to the engine configuration.
    pub fn always_publish(mut self, always: bool) -> Self {
        self.always_publish = Some(always);
        self
    }
}

struct ExpressionInner {
    context: SourceContext,
    scope: Option<String>,
    compiled: Compiled,
    deps: Rc<Dependencies>,
    inputs: RefCell<Inputs>,
    always_publish: bool,
    debug_id: Option<u64>,
    output: Channel<Value>,
    errors: Channel<EvaluationError>,
    started: Cell<bool>,
    disposed: Cell<bool>,
    evaluations: Cell<u64>,
    cached: RefCell<Option<Value>>,
    subscriptions: RefCell<SubscriptionSet>,
}

/// A compiled, subscribed formula. Dropping it disposes it.
pub struct Expression {
    inner: Rc<ExpressionInner>,
}

impl std::fmt::Debug for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Expression")
            .field("source", &self.inner.context.source)
            .field("label", &self.inner.context.label)
            .field("constant", &self.is_constant())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl Expression {
    /// Compiles `source` and subscribes to everything it reads.
    pub fn new(
        source: &str,
        options: ExpressionOptions,
        deps: &Rc<Dependencies>,
    ) -> Result<Self, CompileError> {
        let ExpressionOptions {
            scope,
            fixed,
            external,
            debug_label,
            always_publish,
        } = options;

        if source.trim().is_empty() {
            return Err(CompileError::EmptySource { label: debug_label });
        }
        let context = SourceContext::new(source, debug_label);

        let fixed_names: BTreeSet<String> = fixed.iter().map(|(n, _)| n.clone()).collect();
        let external_names: BTreeSet<String> = external.iter().map(|(n, _)| n.clone()).collect();
        let compiled = compile::compile(
            source,
            &CompileEnv {
                context: &context,
                scope: scope.as_deref(),
                builtins: &deps.builtins,
                fields: &deps.channels.fields,
                fixed: &fixed_names,
                external: &external_names,
            },
        )?;

        let inputs = initial_inputs(&compiled.references, &fixed, &external);
        let constant = compiled.references.is_constant();
        let debug_id = if constant {
            None
        } else {
            Some(deps.debug.register(context.label.as_deref(), source))
        };
        debug!(
            source,
            label = context.label.as_deref(),
            constant,
            references = compiled.references.len(),
            "expression created"
        );

        let inner = Rc::new(ExpressionInner {
            output: Channel::replaying(format!("expression:{source}"), None),
            errors: Channel::pulse(format!("expression-errors:{source}")),
            context,
            scope,
            compiled,
            deps: Rc::clone(deps),
            inputs: RefCell::new(inputs),
            always_publish: always_publish.unwrap_or(deps.config().always_publish),
            debug_id,
            started: Cell::new(false),
            disposed: Cell::new(false),
            evaluations: Cell::new(0),
            cached: RefCell::new(None),
            subscriptions: RefCell::new(SubscriptionSet::new()),
        });

        if !constant {
            let subscriptions = subscribe_all(&inner, &external);
            inner.subscriptions.borrow_mut().extend(subscriptions);
        }
        Ok(Self { inner })
    }

    /// Evaluates now, publishes the result if it changed, and starts
    /// reacting to input changes.
    pub fn evaluate(&self) -> Result<Value, EvaluationError> {
        self.inner.started.set(true);
        self.inner.run()
    }

    /// Releases every subscription and completes the output channel.
    /// Calling it again does nothing.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    pub fn source(&self) -> &str {
        &self.inner.context.source
    }

    pub fn label(&self) -> Option<&str> {
        self.inner.context.label.as_deref()
    }

    pub fn scope(&self) -> Option<&str> {
        self.inner.scope.as_deref()
    }

    /// The compiled tree with references shown as slots.
    pub fn rewritten(&self) -> String {
        self.inner.compiled.tree.to_string()
    }

    pub fn is_constant(&self) -> bool {
        self.inner.compiled.references.is_constant()
    }

    /// Every reference discovered while compiling.
    pub fn dependencies(&self) -> &References {
        &self.inner.compiled.references
    }

    /// Replaying channel of published results.
    pub fn output(&self) -> Channel<Value> {
        self.inner.output.clone()
    }

    pub fn subscribe(&self, callback: impl Fn(&Value) + 'static) -> Subscription {
        self.inner.output.subscribe(callback)
    }

    /// The last published result.
    pub fn latest(&self) -> Option<Value> {
        self.inner.output.latest()
    }

    /// Errors raised by re-evaluations triggered through subscriptions.
    pub fn errors(&self) -> Channel<EvaluationError> {
        self.inner.errors.clone()
    }

    /// Number of times the formula has been evaluated.
    pub fn evaluations(&self) -> u64 {
        self.inner.evaluations.get()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }
}

impl Drop for Expression {
    fn drop(&mut self) {
        self.inner.dispose();
    }
}

fn initial_inputs(
    refs: &References,
    fixed: &[(String, Value)],
    external: &[(String, Channel<Value>)],
) -> Inputs {
    let arguments = refs
        .arguments
        .iter()
        .map(|(name, kind)| match kind {
            ArgumentKind::Fixed => fixed
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone())
                .unwrap_or_default(),
            ArgumentKind::External => external
                .iter()
                .find(|(n, _)| n == name)
                .and_then(|(_, c)| c.latest())
                .unwrap_or_default(),
        })
        .collect();

    Inputs {
        field_values: vec![Value::Null; refs.field_values.len()],
        search_terms: vec![Value::Text(String::new()); refs.search_terms.len()],
        validities: vec![true; refs.validities.len()],
        repeat_counts: vec![0; refs.repeat_counts.len()],
        aggregates: vec![Vec::new(); refs.aggregates.len()],
        tables: vec![(Vec::new(), Vec::new()); refs.tables.len()],
        question_sets: vec![false; refs.question_sets.len()],
        arguments,
    }
}

/// Subscribes `channel`, writing each value into the inputs before
/// reacting.
fn watch<T: Clone + 'static>(
    inner: &Rc<ExpressionInner>,
    channel: &Channel<T>,
    update: impl Fn(&mut Inputs, &T) + 'static,
) -> Subscription {
    let weak: Weak<ExpressionInner> = Rc::downgrade(inner);
    channel.subscribe(move |value| {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        update(&mut inner.inputs.borrow_mut(), value);
        inner.react();
    })
}

fn subscribe_all(
    inner: &Rc<ExpressionInner>,
    external: &[(String, Channel<Value>)],
) -> Vec<Subscription> {
    let refs = &inner.compiled.references;
    let channels = &inner.deps.channels;
    let mut subs = Vec::with_capacity(refs.len() + 1);

    for (i, path) in refs.field_values.iter().enumerate() {
        subs.push(watch(inner, &channels.values.observable(path), move |inputs, v| {
            inputs.field_values[i] = v.clone();
        }));
    }
    for (i, path) in refs.search_terms.iter().enumerate() {
        subs.push(watch(inner, &channels.search_terms.observable(path), move |inputs, v| {
            inputs.search_terms[i] = v.clone();
        }));
    }
    for (i, path) in refs.validities.iter().enumerate() {
        subs.push(watch(inner, &channels.validities.observable(path), move |inputs, v| {
            inputs.validities[i] = *v;
        }));
    }
    for (i, group) in refs.repeat_counts.iter().enumerate() {
        subs.push(watch(inner, &channels.repeat_counts.observable(group), move |inputs, v| {
            inputs.repeat_counts[i] = *v;
        }));
    }
    for (i, source) in refs.aggregates.iter().enumerate() {
        let channel = match source {
            AggregateSource::Pattern(pattern) => channels.patterns.aggregated_values_channel(pattern),
            AggregateSource::Tag(tag) => channels.tags.aggregated_values_channel(tag),
        };
        subs.push(watch(inner, &channel, move |inputs, v: &Vec<Value>| {
            inputs.aggregates[i] = v.clone();
        }));
    }
    for (i, tag) in refs.tables.iter().enumerate() {
        subs.push(watch(inner, &channels.tags.entries_channel(tag), move |inputs, v| {
            inputs.tables[i] = v.clone();
        }));
    }
    for (i, set) in refs.question_sets.iter().enumerate() {
        subs.push(watch(inner, &channels.question_sets.observable(set), move |inputs, v| {
            inputs.question_sets[i] = *v;
        }));
    }
    for function in &refs.functions {
        subs.push(watch(inner, &channels.functions.observable(function), |_, _: &()| {}));
    }
    for (i, (name, kind)) in refs.arguments.iter().enumerate() {
        if *kind != ArgumentKind::External {
            continue;
        }
        let Some((_, channel)) = external.iter().find(|(n, _)| n == name) else {
            continue;
        };
        let weak = Rc::downgrade(inner);
        subs.push(channel.subscribe_distinct(move |v| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            inner.inputs.borrow_mut().arguments[i] = v.clone();
            inner.react();
        }));
    }

    let weak = Rc::downgrade(inner);
    subs.push(channels.form_loaded().subscribe(move |_: &()| {
        if let Some(inner) = weak.upgrade() {
            inner.started.set(true);
            inner.react();
        }
    }));
    subs
}

impl ExpressionInner {
    /// Re-evaluation triggered by a subscription. Errors go to the errors
    /// channel.
    fn react(&self) {
        if !self.started.get() || self.disposed.get() {
            return;
        }
        if let Err(err) = self.run() {
            error!(
                source = %self.context.source,
                label = self.context.label.as_deref(),
                rewritten = %err.rewritten,
                "{}",
                err.cause
            );
            self.errors.emit(err);
        }
    }

    fn run(&self) -> Result<Value, EvaluationError> {
        if self.disposed.get() {
            return Err(self.failure(EvalFailure::Disposed));
        }
        let constant = self.compiled.references.is_constant();
        if constant {
            let cached = self.cached.borrow().clone();
            if let Some(value) = cached {
                return Ok(value);
            }
        }

        let result = {
            let inputs = self.inputs.borrow();
            let ctx = self.deps.call_context(self.scope.as_deref());
            eval::evaluate(&self.compiled.tree, &inputs, &self.deps.builtins, &ctx)
        };
        self.evaluations.set(self.evaluations.get() + 1);

        let value = result.map_err(|cause| self.failure(cause))?;
        trace!(source = %self.context.source, %value, "expression evaluated");
        if constant {
            *self.cached.borrow_mut() = Some(value.clone());
        }
        self.publish(&value);
        Ok(value)
    }

    fn publish(&self, value: &Value) {
        let changed = self.output.latest().as_ref() != Some(value);
        if !changed && !self.always_publish {
            return;
        }
        if let Some(id) = self.debug_id {
            self.deps.debug.update(id, value);
        }
        debug!(source = %self.context.source, %value, "expression published");
        self.output.emit(value.clone());
    }

    fn failure(&self, cause: EvalFailure) -> EvaluationError {
        let inputs = self.inputs.borrow();
        let refs = &self.compiled.references;
        EvaluationError {
            context: self.context.clone(),
            rewritten: self.compiled.tree.to_string(),
            field_values: refs
                .field_values
                .iter()
                .cloned()
                .zip(inputs.field_values.iter().cloned())
                .collect(),
            arguments: refs
                .argument_names()
                .map(str::to_string)
                .zip(inputs.arguments.iter().cloned())
                .collect(),
            cause,
        }
    }

    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        let subscriptions = self.subscriptions.borrow_mut().take();
        drop(subscriptions);
        self.output.complete();
        self.errors.complete();
        if let Some(id) = self.debug_id {
            self.deps.debug.unregister(id);
        }
        debug!(source = %self.context.source, "expression disposed");
    }
}
