//! The context object every query and trigger runs under.

use std::sync::Arc;

use crate::config::Config;
use crate::error::BankResult;
use crate::events::{EventBus, EventDelegate};
use crate::executor::SharedExecutor;
use crate::query::Query;
use crate::resolve::resolve_executor;
use crate::simulation::{Simulation, SimulationController};
use crate::trigger::TriggerEngine;

struct HubInner {
    config: Arc<Config>,
    bus: Arc<EventBus>,
    simulation: Simulation,
    triggers: TriggerEngine,
}

/// One configuration, event bus, simulation and trigger registry.
///
/// Cloning is cheap. Independent hubs share nothing, so tests can run
/// several side by side.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

impl Hub {
    pub fn new(config: Config) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: Config) -> HubBuilder {
        HubBuilder {
            config,
            delegate: None,
            controller: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    pub fn simulation(&self) -> &Simulation {
        &self.inner.simulation
    }

    pub fn triggers(&self) -> &TriggerEngine {
        &self.inner.triggers
    }

    /// Start a query on `table`.
    pub fn query(&self, table: impl Into<String>) -> Query {
        Query::new(self.clone(), table)
    }

    /// Executor that would run a statement on `table`.
    pub fn resolve(&self, table: &str, banks: &[String]) -> BankResult<SharedExecutor> {
        resolve_executor(&self.inner.config, table, banks)
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("config", &self.inner.config)
            .field("simulation", &self.inner.simulation)
            .finish()
    }
}

/// Builder for [`Hub`] with optional external collaborators.
pub struct HubBuilder {
    config: Config,
    delegate: Option<Arc<dyn EventDelegate>>,
    controller: Option<Arc<dyn SimulationController>>,
}

impl HubBuilder {
    /// Forward every lifecycle event to an external bus as well.
    pub fn event_delegate(mut self, delegate: Arc<dyn EventDelegate>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    /// Replace the in-memory virtual state with another controller.
    pub fn simulation_controller(mut self, controller: Arc<dyn SimulationController>) -> Self {
        self.controller = Some(controller);
        self
    }

    pub fn build(self) -> Hub {
        let config = Arc::new(self.config);
        let bus = match self.delegate {
            Some(delegate) => EventBus::new().with_delegate(delegate),
            None => EventBus::new(),
        };
        let bus = Arc::new(bus);
        let simulation = match self.controller {
            Some(controller) => Simulation::new(controller),
            None => Simulation::default(),
        };
        let triggers = TriggerEngine::new(config.clone(), bus.clone());
        Hub {
            inner: Arc::new(HubInner {
                config,
                bus,
                simulation,
                triggers,
            }),
        }
    }
}
