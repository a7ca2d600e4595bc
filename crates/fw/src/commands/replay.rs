//! `fw replay` -- drive a scripted form session through the engine.
//!
//! A script declares the initial fields, the formulas to watch and a list of
//! events. Every publication and every evaluation error is recorded with the
//! step that caused it. Step 0 is the end of form loading.
//!
//! ```yaml
//! now: 1710498600000
//! fields:
//!   - { path: amount, value: 3 }
//! expressions:
//!   - { name: big, source: "amount > 5" }
//! events:
//!   - set: { path: amount, value: 7 }
//!   - advance: 1000
//! ```

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result};
use formwire_channels::{Channel, Subscription};
use formwire_config::EngineConfig;
use formwire_core::Value;
use formwire_engine::{
    Clock, DebugEntry, Dependencies, Expression, ExpressionOptions, ManualClock, SystemClock,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cli::ReplayArgs;
use crate::context::RuntimeContext;
use crate::output::{format_value, output_json};
use crate::styles::{render_accent, render_fail, render_muted, render_pass, render_warn};

// ---------------------------------------------------------------------------
// Script
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    /// Start of the simulated clock, in epoch milliseconds. Defaults to the
    /// current time.
    #[serde(default)]
    pub now: Option<i64>,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub expressions: Vec<ExpressionSpec>,
    #[serde(default)]
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    pub path: String,
    #[serde(default)]
    pub value: serde_json::Value,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct ExpressionSpec {
    #[serde(default)]
    pub name: Option<String>,
    pub source: String,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub fixed: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub external: Vec<String>,
    #[serde(default)]
    pub always_publish: Option<bool>,
}

impl ExpressionSpec {
    fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.source.clone())
    }
}

/// One scripted change to the form or the application state.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Event {
    Set {
        path: String,
        #[serde(default)]
        value: serde_json::Value,
    },
    Search {
        path: String,
        #[serde(default)]
        term: serde_json::Value,
    },
    Validity {
        path: String,
        valid: bool,
    },
    RepeatCount {
        group: String,
        count: usize,
    },
    QuestionSet {
        name: String,
        valid: bool,
    },
    AddField(FieldSpec),
    RemoveField {
        path: String,
    },
    External {
        name: String,
        #[serde(default)]
        value: serde_json::Value,
    },
    /// Milliseconds of simulated time.
    Advance(u64),
    Article {
        index: usize,
        count: usize,
    },
    Element {
        index: usize,
        count: usize,
    },
    OperationStart(String),
    OperationFinish {
        name: String,
        #[serde(default)]
        result: serde_json::Value,
        #[serde(default)]
        error: Option<String>,
    },
    Calculation {
        name: String,
        #[serde(default)]
        value: serde_json::Value,
    },
    WorkflowStep(Option<String>),
    #[serde(rename = "debug")]
    DebugFlag(bool),
    DebugLevel(u8),
    Currency(String),
    Visibility,
    RepeatingField,
    Stale(String),
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Set { path, .. } => write!(f, "set {path}"),
            Self::Search { path, .. } => write!(f, "search {path}"),
            Self::Validity { path, valid } => write!(f, "validity {path}={valid}"),
            Self::RepeatCount { group, count } => write!(f, "repeat-count {group}={count}"),
            Self::QuestionSet { name, valid } => write!(f, "question-set {name}={valid}"),
            Self::AddField(spec) => write!(f, "add-field {}", spec.path),
            Self::RemoveField { path } => write!(f, "remove-field {path}"),
            Self::External { name, .. } => write!(f, "external {name}"),
            Self::Advance(ms) => write!(f, "advance {ms}ms"),
            Self::Article { index, count } => write!(f, "article {index}/{count}"),
            Self::Element { index, count } => write!(f, "element {index}/{count}"),
            Self::OperationStart(name) => write!(f, "operation-start {name}"),
            Self::OperationFinish { name, .. } => write!(f, "operation-finish {name}"),
            Self::Calculation { name, .. } => write!(f, "calculation {name}"),
            Self::WorkflowStep(step) => {
                write!(f, "workflow-step {}", step.as_deref().unwrap_or("-"))
            }
            Self::DebugFlag(enabled) => write!(f, "debug {enabled}"),
            Self::DebugLevel(level) => write!(f, "debug-level {level}"),
            Self::Currency(code) => write!(f, "currency {code}"),
            Self::Visibility => f.write_str("visibility"),
            Self::RepeatingField => f.write_str("repeating-field"),
            Self::Stale(name) => write!(f, "stale {name}"),
        }
    }
}

/// Reads and parses a replay script.
pub fn load_script(path: &Path) -> Result<Script> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read script {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse script {}", path.display()))
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Something an expression emitted during the replay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub step: usize,
    pub event: String,
    pub expression: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReplayReport {
    pub records: Vec<Record>,
    /// Live expressions with their latest values when the script ended.
    pub live: Vec<DebugEntry>,
}

#[derive(Clone, Default)]
struct Recorder {
    step: Rc<Cell<usize>>,
    event: Rc<RefCell<String>>,
    records: Rc<RefCell<Vec<Record>>>,
}

impl Recorder {
    fn enter(&self, step: usize, event: String) {
        self.step.set(step);
        *self.event.borrow_mut() = event;
    }

    fn push(&self, expression: &str, value: Option<Value>, error: Option<String>) {
        self.records.borrow_mut().push(Record {
            step: self.step.get(),
            event: self.event.borrow().clone(),
            expression: expression.to_string(),
            value,
            error,
        });
    }
}

/// Runs `script` against a fresh form and returns what was published.
pub fn replay(config: &EngineConfig, script: &Script) -> Result<ReplayReport> {
    let clock = Rc::new(ManualClock::new(
        script.now.unwrap_or_else(|| SystemClock.now_millis()),
    ));
    let deps = Dependencies::builder(config.clone()).clock(clock).build();
    deps.start();

    for field in &script.fields {
        deps.channels
            .add_field(&field.path, Value::from(field.value.clone()), field.tags.clone());
    }

    let recorder = Recorder::default();
    let mut externals: HashMap<String, Channel<Value>> = HashMap::new();
    let mut expressions = Vec::with_capacity(script.expressions.len());
    let mut subscriptions: Vec<Subscription> = Vec::new();

    for spec in &script.expressions {
        let name = spec.display_name();
        let options = expression_options(spec, &mut externals);
        let expression = Expression::new(&spec.source, options, &deps)
            .with_context(|| format!("cannot compile expression '{name}'"))?;

        let sink = recorder.clone();
        let label = name.clone();
        subscriptions.push(expression.subscribe(move |value| {
            sink.push(&label, Some(value.clone()), None);
        }));
        let sink = recorder.clone();
        let label = name.clone();
        subscriptions.push(expression.errors().subscribe(move |err| {
            sink.push(&label, None, Some(err.to_string()));
        }));
        expressions.push((name, expression));
    }

    recorder.enter(0, "load".to_string());
    deps.channels.finish_loading();
    // Constant expressions never subscribe to the form, so they are
    // evaluated once here.
    for (name, expression) in expressions.iter().filter(|(_, e)| e.is_constant()) {
        if let Err(err) = expression.evaluate() {
            recorder.push(name, None, Some(err.to_string()));
        }
    }
    info!(
        fields = script.fields.len(),
        expressions = expressions.len(),
        "replay loaded"
    );

    for (i, event) in script.events.iter().enumerate() {
        recorder.enter(i + 1, event.to_string());
        debug!(step = i + 1, %event, "replay event");
        apply(&deps, &externals, event)?;
    }

    let live = deps.debug.snapshot();
    drop(subscriptions);
    drop(expressions);
    deps.teardown();

    let records = recorder.records.borrow().clone();
    Ok(ReplayReport { records, live })
}

fn expression_options(
    spec: &ExpressionSpec,
    externals: &mut HashMap<String, Channel<Value>>,
) -> ExpressionOptions {
    let mut options = ExpressionOptions::new().debug_label(spec.display_name());
    if let Some(scope) = &spec.scope {
        options = options.scope(scope.clone());
    }
    if let Some(always) = spec.always_publish {
        options = options.always_publish(always);
    }
    for (name, value) in &spec.fixed {
        options = options.fixed(name.clone(), Value::from(value.clone()));
    }
    for name in &spec.external {
        let channel = externals
            .entry(name.clone())
            .or_insert_with(|| Channel::replaying(format!("external:{name}"), Some(Value::Null)))
            .clone();
        options = options.external(name.clone(), channel);
    }
    options
}

fn apply(
    deps: &Dependencies,
    externals: &HashMap<String, Channel<Value>>,
    event: &Event,
) -> Result<()> {
    let channels = &deps.channels;
    let state = &deps.state;
    match event {
        Event::Set { path, value } => channels.set_field_value(path, Value::from(value.clone())),
        Event::Search { path, term } => channels.set_search_term(path, Value::from(term.clone())),
        Event::Validity { path, valid } => channels.set_field_validity(path, *valid),
        Event::RepeatCount { group, count } => channels.set_repeat_count(group, *count),
        Event::QuestionSet { name, valid } => channels.set_question_set_validity(name, *valid),
        Event::AddField(spec) => {
            channels.add_field(&spec.path, Value::from(spec.value.clone()), spec.tags.clone());
        }
        Event::RemoveField { path } => {
            channels.remove_field_path(path);
        }
        Event::External { name, value } => {
            let channel = externals
                .get(name)
                .with_context(|| format!("no expression declares external '{name}'"))?;
            channel.emit(Value::from(value.clone()));
        }
        Event::Advance(ms) => {
            deps.advance(Duration::from_millis(*ms));
        }
        Event::Article { index, count } => state.set_article(*index, *count),
        Event::Element { index, count } => state.set_element(*index, *count),
        Event::OperationStart(name) => state.start_operation(name),
        Event::OperationFinish {
            name,
            result,
            error,
        } => {
            let outcome = match error {
                Some(message) => Err(message.clone()),
                None => Ok(Value::from(result.clone())),
            };
            state.finish_operation(name, outcome);
        }
        Event::Calculation { name, value } => {
            state.set_calculation_result(name, Value::from(value.clone()));
        }
        Event::WorkflowStep(step) => state.set_workflow_step(step.as_deref()),
        Event::DebugFlag(enabled) => state.set_debug(*enabled),
        Event::DebugLevel(level) => state.set_debug_level(*level),
        Event::Currency(code) => state.set_currency_code(&code.to_ascii_uppercase()),
        Event::Visibility => state.visibility_changed(),
        Event::RepeatingField => state.repeating_field_changed(),
        Event::Stale(name) => channels.mark_function_stale(name),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// Execute the `fw replay` command.
pub fn run(ctx: &RuntimeContext, args: &ReplayArgs) -> Result<()> {
    let script = load_script(&args.script)?;
    let report = replay(&ctx.config, &script)?;

    if ctx.json {
        output_json(&report);
        return Ok(());
    }

    let mut last_step = None;
    for record in &report.records {
        if last_step != Some(record.step) {
            println!("{}", render_muted(&format!("[{}] {}", record.step, record.event)));
            last_step = Some(record.step);
        }
        match (&record.value, &record.error) {
            (_, Some(error)) => println!(
                "  {} {}",
                render_fail(&record.expression),
                render_fail(error)
            ),
            (Some(value), None) => println!(
                "  {} = {}",
                render_accent(&record.expression),
                format_value(value)
            ),
            (None, None) => {}
        }
    }

    if !ctx.quiet {
        let errors = report.records.iter().filter(|r| r.error.is_some()).count();
        let summary = format!(
            "{} publication(s), {} error(s)",
            report.records.len() - errors,
            errors
        );
        if errors == 0 {
            println!("{}", render_pass(&summary));
        } else {
            println!("{}", render_warn(&summary));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run_script(yaml: &str) -> ReplayReport {
        let script: Script = serde_yaml::from_str(yaml).unwrap();
        replay(&EngineConfig::default(), &script).unwrap()
    }

    fn values(report: &ReplayReport, expression: &str) -> Vec<(usize, Value)> {
        report
            .records
            .iter()
            .filter(|r| r.expression == expression)
            .filter_map(|r| r.value.clone().map(|v| (r.step, v)))
            .collect()
    }

    #[test]
    fn publishes_on_load_and_on_change_only() {
        let report = run_script(
            r#"
fields:
  - { path: amount, value: 3 }
expressions:
  - { name: big, source: "amount > 5" }
events:
  - set: { path: amount, value: 4 }
  - set: { path: amount, value: 7 }
"#,
        );
        assert_eq!(
            values(&report, "big"),
            vec![(0, Value::Bool(false)), (2, Value::Bool(true))]
        );
        assert_eq!(report.records[1].event, "set amount");
        assert_eq!(report.live.len(), 1);
        assert_eq!(report.live[0].latest, Some(Value::Bool(true)));
    }

    #[test]
    fn aggregates_follow_added_and_removed_fields() {
        let report = run_script(
            r#"
fields:
  - { path: "claims[0].amount", value: 2 }
expressions:
  - name: total
    source: "sum(getFieldValuesForFieldPathPattern('claims[*].amount'))"
events:
  - add-field: { path: "claims[1].amount", value: 5 }
  - remove-field: { path: "claims[0].amount" }
"#,
        );
        assert_eq!(
            values(&report, "total"),
            vec![(0, Value::from(2)), (1, Value::from(7)), (2, Value::from(5))]
        );
    }

    #[test]
    fn clock_and_state_events_invalidate_functions() {
        let report = run_script(
            r#"
now: 1710498600000
expressions:
  - { name: clock, source: "now()" }
  - { name: step, source: "workflowStep()" }
events:
  - advance: 1000
  - workflow-step: review
"#,
        );
        assert_eq!(
            values(&report, "clock"),
            vec![
                (0, Value::from(1_710_498_600_000_i64)),
                (1, Value::from(1_710_498_601_000_i64)),
            ]
        );
        assert_eq!(values(&report, "step").last(), Some(&(2, Value::from("review"))));
    }

    #[test]
    fn externals_and_errors_are_recorded() {
        let report = run_script(
            r#"
expressions:
  - { name: scaled, source: "round(rate, digits)", external: [rate], fixed: { digits: 1 } }
  - { name: broken, source: "rate.value", external: [rate] }
events:
  - external: { name: rate, value: 1.26 }
"#,
        );
        assert_eq!(values(&report, "scaled").last(), Some(&(1, Value::from(1.3))));
        assert!(report
            .records
            .iter()
            .any(|r| r.expression == "broken" && r.error.is_some()));
    }

    #[test]
    fn unknown_external_fails_the_replay() {
        let script: Script = serde_yaml::from_str(
            "expressions: [{ source: \"1\" }]\nevents:\n  - external: { name: nope, value: 1 }\n",
        )
        .unwrap();
        assert!(replay(&EngineConfig::default(), &script).is_err());
    }

    #[test]
    fn compile_errors_name_the_expression() {
        let script: Script =
            serde_yaml::from_str("expressions: [{ name: bad, source: \"nosuch(1)\" }]\n").unwrap();
        let err = replay(&EngineConfig::default(), &script).unwrap_err();
        assert!(format!("{err:#}").contains("'bad'"));
    }
}
