//! The executor capability contract.
//!
//! bankql never talks to a database directly. Every statement goes through an
//! [`Executor`], which is whatever the caller plugs in: the bundled
//! [`SqlxExecutor`](crate::driver::SqlxExecutor), a test double, or a bespoke
//! driver. Only `execute_query` is required; the synchronous entry points are
//! optional capabilities that return `None` when absent.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::sync::Arc;

use crate::dialect::Dialect;
use crate::error::BankResult;
use crate::value::{Row, Value};

/// Shared handle to an executor.
pub type SharedExecutor = Arc<dyn Executor>;

/// Raw output of one statement, in whatever shape the driver produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecOutput {
    /// Rows returned by the statement (empty for most writes).
    pub data: Vec<Row>,
    /// Affected-row count, when the driver reports it directly.
    pub affected_rows: Option<u64>,
    /// Insert id, when the driver reports it directly.
    pub last_insert_id: Option<i64>,
    /// Anything else the driver returned: an object with differently named
    /// counters, or a tuple-style array whose elements carry them.
    pub meta: Json,
}

impl ExecOutput {
    /// Output carrying only rows.
    pub fn rows(data: Vec<Row>) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    /// Output carrying only write counters.
    pub fn write(affected_rows: u64, last_insert_id: Option<i64>) -> Self {
        Self {
            affected_rows: Some(affected_rows),
            last_insert_id,
            ..Self::default()
        }
    }
}

const CHANGE_KEYS: &[&str] = &[
    "changes",
    "affectedRows",
    "affected_rows",
    "rowCount",
    "rowsAffected",
];

const INSERT_ID_KEYS: &[&str] = &[
    "lastInsertRowid",
    "lastInsertId",
    "last_insert_id",
    "insertId",
    "lastID",
];

/// Normalized outcome of a write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResult {
    pub changes: u64,
    #[serde(rename = "lastInsertRowid")]
    pub last_insert_rowid: Option<i64>,
}

impl WriteResult {
    /// A result with only a change count.
    pub fn changed(changes: u64) -> Self {
        Self {
            changes,
            last_insert_rowid: None,
        }
    }

    /// Fold any executor output shape into `{changes, lastInsertRowid}`.
    ///
    /// Direct fields win; otherwise `meta` is searched, first as an object and
    /// then element by element when it is an array.
    pub fn normalize(out: &ExecOutput) -> Self {
        let changes = out
            .affected_rows
            .or_else(|| lookup(&out.meta, CHANGE_KEYS).and_then(as_u64))
            .unwrap_or(0);
        let last_insert_rowid = out
            .last_insert_id
            .or_else(|| lookup(&out.meta, INSERT_ID_KEYS).and_then(as_i64));
        Self {
            changes,
            last_insert_rowid,
        }
    }
}

fn lookup<'a>(meta: &'a Json, keys: &[&str]) -> Option<&'a Json> {
    match meta {
        Json::Object(map) => keys.iter().find_map(|k| map.get(*k)),
        Json::Array(items) => items.iter().find_map(|item| lookup(item, keys)),
        _ => None,
    }
}

fn as_u64(v: &Json) -> Option<u64> {
    match v {
        Json::Number(n) => n.as_u64(),
        Json::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn as_i64(v: &Json) -> Option<i64> {
    match v {
        Json::Number(n) => n.as_i64(),
        Json::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// What a backing store must expose for bankql to drive it.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run one statement with positional bindings.
    async fn execute_query(&self, sql: &str, bindings: &[Value]) -> BankResult<ExecOutput>;

    /// Blocking variant of [`execute_query`](Self::execute_query), if supported.
    fn execute_query_sync(&self, _sql: &str, _bindings: &[Value]) -> Option<BankResult<ExecOutput>> {
        None
    }

    /// Blocking write returning normalized counters, if supported.
    fn run_sync(&self, _sql: &str, _bindings: &[Value]) -> Option<BankResult<WriteResult>> {
        None
    }

    /// Dialect tag, used for catalog introspection only.
    fn dialect(&self) -> Option<Dialect> {
        None
    }
}
