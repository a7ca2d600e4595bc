//! [`Dependencies`] -- everything an expression needs from its surroundings.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use formwire_channels::FormChannels;
use formwire_config::EngineConfig;
use formwire_core::Trigger;
use tracing::{debug, info};

use crate::builtins::{Builtins, CallContext};
use crate::clock::{Clock, SystemClock};
use crate::debug::DebugRegistry;
use crate::format::{CurrencyFormatter, DefaultCurrencyFormatter, HtmlTableRenderer, TableRenderer};
use crate::invalidation::InvalidationWiring;
use crate::state::AppState;
use crate::timer::IntervalTimer;

/// The channels, state, timer and collaborators shared by every expression
/// of one form.
pub struct Dependencies {
    pub channels: FormChannels,
    pub state: AppState,
    pub timer: IntervalTimer,
    pub builtins: Builtins,
    pub debug: DebugRegistry,
    clock: Rc<dyn Clock>,
    currency: Box<dyn CurrencyFormatter>,
    tables: Box<dyn TableRenderer>,
    config: EngineConfig,
    wiring: RefCell<Option<InvalidationWiring>>,
}

impl Dependencies {
    /// Dependencies with the system clock and default formatters.
    pub fn new(config: EngineConfig) -> Rc<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: EngineConfig) -> DependenciesBuilder {
        DependenciesBuilder {
            config,
            clock: None,
            currency: None,
            tables: None,
            builtins: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn clock(&self) -> &dyn Clock {
        &*self.clock
    }

    /// Wires built-in invalidation and starts the clock timer. Calling it
    /// again while started does nothing.
    pub fn start(&self) {
        let mut wiring = self.wiring.borrow_mut();
        if wiring.is_some() {
            return;
        }
        *wiring = Some(InvalidationWiring::start(
            self.state.signals(),
            &self.channels.functions,
        ));
        self.timer.start();
        info!("engine started");
    }

    pub fn is_started(&self) -> bool {
        self.wiring.borrow().is_some()
    }

    /// Stops the timer and releases the invalidation wiring.
    pub fn stop(&self) {
        self.timer.stop();
        let wiring = self.wiring.borrow_mut().take();
        if let Some(wiring) = wiring {
            wiring.stop();
            info!("engine stopped");
        }
    }

    /// Moves the clock and the timer forward. Returns the number of timer
    /// ticks fired.
    pub fn advance(&self, elapsed: Duration) -> u32 {
        self.clock.advance(elapsed);
        self.timer.advance(elapsed)
    }

    /// The context built-ins run in for an expression with `scope`.
    pub fn call_context<'a>(&'a self, scope: Option<&'a str>) -> CallContext<'a> {
        CallContext {
            state: &self.state,
            clock: &*self.clock,
            currency: &*self.currency,
            tables: &*self.tables,
            scope,
        }
    }

    /// Stops everything and completes every form channel.
    pub fn teardown(&self) {
        self.stop();
        self.channels.delete_all();
        debug!(live_expressions = self.debug.len(), "form torn down");
    }
}

/// Builder for [`Dependencies`] with pluggable collaborators.
pub struct DependenciesBuilder {
    config: EngineConfig,
    clock: Option<Rc<dyn Clock>>,
    currency: Option<Box<dyn CurrencyFormatter>>,
    tables: Option<Box<dyn TableRenderer>>,
    builtins: Option<Builtins>,
}

impl DependenciesBuilder {
    pub fn clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn currency(mut self, formatter: impl CurrencyFormatter + 'static) -> Self {
        self.currency = Some(Box::new(formatter));
        self
    }

    pub fn tables(mut self, renderer: impl TableRenderer + 'static) -> Self {
        self.tables = Some(Box::new(renderer));
        self
    }

    /// Replaces the standard built-in library.
    pub fn builtins(mut self, builtins: Builtins) -> Self {
        self.builtins = Some(builtins);
        self
    }

    pub fn build(self) -> Rc<Dependencies> {
        let state = AppState::from_config(&self.config);
        let timer = IntervalTimer::new(
            self.config.timer_interval(),
            state.signals().channel(Trigger::Timer),
        );
        let currency = self.currency.unwrap_or_else(|| {
            Box::new(DefaultCurrencyFormatter::from_config(&self.config.currency))
        });
        Rc::new(Dependencies {
            channels: FormChannels::new(),
            state,
            timer,
            builtins: self.builtins.unwrap_or_else(Builtins::standard),
            debug: DebugRegistry::new(),
            clock: self.clock.unwrap_or_else(|| Rc::new(SystemClock)),
            currency,
            tables: self.tables.unwrap_or_else(|| Box::new(HtmlTableRenderer)),
            config: self.config,
            wiring: RefCell::new(None),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use formwire_core::Value;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    #[test]
    fn timer_ticks_mark_clock_functions_stale() {
        let clock = Rc::new(ManualClock::new(0));
        let deps = Dependencies::builder(EngineConfig::default())
            .clock(clock.clone())
            .build();
        let stale = Rc::new(Cell::new(0));
        let sink = Rc::clone(&stale);
        let _sub = deps
            .channels
            .functions
            .observable("today")
            .subscribe(move |_: &()| sink.set(sink.get() + 1));

        deps.advance(Duration::from_secs(2));
        assert_eq!(stale.get(), 0);

        deps.start();
        assert!(deps.is_started());
        assert_eq!(deps.advance(Duration::from_millis(2500)), 2);
        assert_eq!(stale.get(), 2);
        assert_eq!(clock.now_millis(), 4500);

        deps.stop();
        deps.advance(Duration::from_secs(3));
        assert_eq!(stale.get(), 2);
    }

    #[test]
    fn call_context_uses_configured_currency() {
        let mut config = EngineConfig::default();
        config.currency.code = "USD".into();
        config.currency.symbol_first = true;
        let deps = Dependencies::new(config);
        let ctx = deps.call_context(None);
        let value = deps
            .builtins
            .call(&ctx, "formatCurrency", &[Value::from(5)])
            .unwrap();
        assert_eq!(value, Value::from("$ 5.00"));
    }
}
