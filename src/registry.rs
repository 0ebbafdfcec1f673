//! Multi-database registry: named executors.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{BankError, BankResult};
use crate::executor::SharedExecutor;

/// Looks up executors by database name.
pub trait DatabaseRegistry: Send + Sync {
    /// Return the executor registered under `name`, or fail if unknown.
    fn get_adapter(&self, name: &str) -> BankResult<SharedExecutor>;
}

/// In-process registry backed by a map.
#[derive(Default)]
pub struct MultiDatabase {
    adapters: RwLock<HashMap<String, SharedExecutor>>,
}

impl MultiDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) an executor under `name`.
    pub fn add(&self, name: impl Into<String>, executor: SharedExecutor) {
        if let Ok(mut adapters) = self.adapters.write() {
            adapters.insert(name.into(), executor);
        }
    }

    /// Chainable form of [`add`](Self::add) for construction.
    pub fn with(self, name: impl Into<String>, executor: SharedExecutor) -> Self {
        self.add(name, executor);
        self
    }

    pub fn remove(&self, name: &str) -> Option<SharedExecutor> {
        self.adapters.write().ok()?.remove(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .adapters
            .read()
            .map(|a| a.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    pub fn into_shared(self) -> Arc<dyn DatabaseRegistry> {
        Arc::new(self)
    }
}

impl DatabaseRegistry for MultiDatabase {
    fn get_adapter(&self, name: &str) -> BankResult<SharedExecutor> {
        let adapters = self
            .adapters
            .read()
            .map_err(|_| BankError::config("database registry lock poisoned"))?;
        adapters
            .get(name)
            .cloned()
            .ok_or_else(|| BankError::config(format!("unknown database '{}'", name)))
    }
}
