//! Shared fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bankql::prelude::*;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory executor that records every statement.
///
/// SELECTs return the configured rows; anything else reports one changed row.
/// Scripted responses, when queued, take precedence.
#[derive(Default)]
pub struct MockExecutor {
    calls: Mutex<Vec<(String, Vec<Value>)>>,
    scripted: Mutex<VecDeque<ExecOutput>>,
    rows: Mutex<Vec<Row>>,
    fail_on: Mutex<Vec<String>>,
    sync: bool,
    yielding: bool,
    async_calls: AtomicUsize,
    dialect: Option<Dialect>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also expose `execute_query_sync` and `run_sync`.
    pub fn with_sync(mut self) -> Self {
        self.sync = true;
        self
    }

    /// Yield to the scheduler inside every async call.
    pub fn with_yield(mut self) -> Self {
        self.yielding = true;
        self
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = Some(dialect);
        self
    }

    pub fn with_rows(self, rows: Vec<Row>) -> Self {
        *self.rows.lock().unwrap() = rows;
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn script(&self, out: ExecOutput) {
        self.scripted.lock().unwrap().push_back(out);
    }

    /// Fail any statement containing `needle`.
    pub fn fail_on(&self, needle: &str) {
        self.fail_on.lock().unwrap().push(needle.to_string());
    }

    pub fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls.lock().unwrap().clone()
    }

    /// How many statements went through the async entry point.
    pub fn async_calls(&self) -> usize {
        self.async_calls.load(Ordering::SeqCst)
    }

    pub fn sqls(&self) -> Vec<String> {
        self.calls().into_iter().map(|(sql, _)| sql).collect()
    }

    fn respond(&self, sql: &str, bindings: &[Value]) -> BankResult<ExecOutput> {
        self.calls
            .lock()
            .unwrap()
            .push((sql.to_string(), bindings.to_vec()));

        if self.fail_on.lock().unwrap().iter().any(|n| sql.contains(n.as_str())) {
            return Err(BankError::execution(format!("mock failure: {}", sql)));
        }
        if let Some(out) = self.scripted.lock().unwrap().pop_front() {
            return Ok(out);
        }
        if sql.trim_start().to_uppercase().starts_with("SELECT") || sql.starts_with('(') {
            Ok(ExecOutput::rows(self.rows.lock().unwrap().clone()))
        } else {
            Ok(ExecOutput::write(1, Some(1)))
        }
    }
}

#[async_trait]
impl Executor for MockExecutor {
    async fn execute_query(&self, sql: &str, bindings: &[Value]) -> BankResult<ExecOutput> {
        self.async_calls.fetch_add(1, Ordering::SeqCst);
        if self.yielding {
            tokio::task::yield_now().await;
        }
        self.respond(sql, bindings)
    }

    fn execute_query_sync(&self, sql: &str, bindings: &[Value]) -> Option<BankResult<ExecOutput>> {
        self.sync.then(|| self.respond(sql, bindings))
    }

    fn run_sync(&self, sql: &str, bindings: &[Value]) -> Option<BankResult<WriteResult>> {
        self.sync
            .then(|| self.respond(sql, bindings).map(|out| WriteResult::normalize(&out)))
    }

    fn dialect(&self) -> Option<Dialect> {
        self.dialect
    }
}

/// A hub whose default executor is `mock`.
pub fn hub_with(mock: Arc<MockExecutor>) -> Hub {
    Hub::new(Config::builder().executor(mock).build())
}
