//! Dry-run mode: answer queries from in-memory rows.
//!
//! While a simulation is active, reads of a seeded table filter its virtual
//! rows and every write is applied to virtual rows instead of the database.
//! Lifecycle events still fire, so triggers behave as they would live.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::error::BankResult;
use crate::query::Query;
use crate::value::Row;

/// Initial content for one virtual table.
#[derive(Debug)]
pub enum Seed {
    /// Literal rows, copied in.
    Rows(Vec<Row>),
    /// A query run once against the live database.
    Query(Query),
}

impl From<Vec<Row>> for Seed {
    fn from(rows: Vec<Row>) -> Self {
        Seed::Rows(rows)
    }
}

impl From<Query> for Seed {
    fn from(query: Query) -> Self {
        Seed::Query(query)
    }
}

/// Storage behind a [`Simulation`]. Swap it to share fixtures between engines.
pub trait SimulationController: Send + Sync {
    fn is_active(&self) -> bool;
    /// A copy of the table's rows, if it has state.
    fn get_state_for(&self, table: &str) -> Option<Vec<Row>>;
    /// Replace a table's rows. No-op while inactive.
    fn update_state_for(&self, table: &str, rows: Vec<Row>);
    /// Activate, seeding tables that have no state yet.
    fn start(&self, initial: HashMap<String, Vec<Row>>);
    /// Deactivate and clear all state.
    fn stop(&self);
}

/// Default in-process controller.
#[derive(Debug, Default)]
pub struct VirtualState {
    active: AtomicBool,
    tables: RwLock<HashMap<String, Vec<Row>>>,
}

impl VirtualState {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SimulationController for VirtualState {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn get_state_for(&self, table: &str) -> Option<Vec<Row>> {
        self.tables
            .read()
            .ok()
            .and_then(|tables| tables.get(table).cloned())
    }

    fn update_state_for(&self, table: &str, rows: Vec<Row>) {
        if !self.is_active() {
            return;
        }
        if let Ok(mut tables) = self.tables.write() {
            tables.insert(table.to_string(), rows);
        }
    }

    fn start(&self, initial: HashMap<String, Vec<Row>>) {
        if let Ok(mut tables) = self.tables.write() {
            for (table, rows) in initial {
                tables.entry(table).or_insert(rows);
            }
        }
        self.active.store(true, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
        if let Ok(mut tables) = self.tables.write() {
            tables.clear();
        }
    }
}

/// Simulation engine owned by a hub.
#[derive(Clone)]
pub struct Simulation {
    controller: Arc<dyn SimulationController>,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new(Arc::new(VirtualState::new()))
    }
}

impl Simulation {
    pub fn new(controller: Arc<dyn SimulationController>) -> Self {
        Self { controller }
    }

    pub fn is_active(&self) -> bool {
        self.controller.is_active()
    }

    pub fn get_state_for(&self, table: &str) -> Option<Vec<Row>> {
        self.controller.get_state_for(table)
    }

    pub fn update_state_for(&self, table: &str, rows: Vec<Row>) {
        self.controller.update_state_for(table, rows)
    }

    /// Seed virtual tables and activate.
    ///
    /// Query seeds run against the live database, and only for tables that
    /// have no virtual state yet, so calling `start` twice does not refetch.
    pub async fn start<I, K>(&self, initial: I) -> BankResult<()>
    where
        I: IntoIterator<Item = (K, Seed)>,
        K: Into<String>,
    {
        let mut resolved = HashMap::new();
        for (table, seed) in initial {
            let table = table.into();
            if self.controller.get_state_for(&table).is_some() {
                continue;
            }
            let rows = match seed {
                Seed::Rows(rows) => rows,
                Seed::Query(query) => query.fetch_live().await?,
            };
            resolved.insert(table, rows);
        }
        let tables: Vec<&String> = resolved.keys().collect();
        tracing::info!("simulation started, seeding {:?}", tables);
        self.controller.start(resolved);
        Ok(())
    }

    pub fn stop(&self) {
        tracing::info!("simulation stopped");
        self.controller.stop();
    }
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_start_seeds_and_activates() {
        let sim = Simulation::default();
        assert!(!sim.is_active());
        sim.start([("users", Seed::from(vec![crate::value::row(json!({"id": 1}))]))])
            .await
            .unwrap();
        assert!(sim.is_active());
        assert_eq!(sim.get_state_for("users").map(|r| r.len()), Some(1));
    }

    #[tokio::test]
    async fn test_start_is_idempotent_per_table() {
        let sim = Simulation::default();
        sim.start([("t", Seed::Rows(vec![crate::value::row(json!({"id": 1}))]))])
            .await
            .unwrap();
        sim.start([("t", Seed::Rows(vec![]))]).await.unwrap();
        assert_eq!(sim.get_state_for("t").map(|r| r.len()), Some(1));
    }

    #[test]
    fn test_update_is_noop_when_inactive() {
        let state = VirtualState::new();
        state.update_state_for("t", vec![Row::new()]);
        assert!(state.get_state_for("t").is_none());
    }

    #[tokio::test]
    async fn test_snapshots_are_copies() {
        let sim = Simulation::default();
        sim.start([("t", Seed::Rows(vec![crate::value::row(json!({"n": 1}))]))])
            .await
            .unwrap();
        let mut snapshot = sim.get_state_for("t").unwrap();
        snapshot[0].insert("n".into(), json!(99));
        assert_eq!(sim.get_state_for("t").unwrap()[0]["n"], json!(1));
    }

    #[tokio::test]
    async fn test_stop_clears_state() {
        let sim = Simulation::default();
        sim.start([("t", Seed::Rows(vec![]))]).await.unwrap();
        sim.stop();
        assert!(!sim.is_active());
        assert!(sim.get_state_for("t").is_none());
    }
}
