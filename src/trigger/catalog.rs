//! System catalog introspection for triggers and views.
//!
//! Each dialect has one or more candidate statements. They are tried in
//! order and the first that runs wins; when every candidate fails the result
//! is empty rather than an error.

use std::collections::BTreeSet;

use crate::dialect::Dialect;
use crate::executor::SharedExecutor;
use crate::resolve::resolve_executor;
use crate::trigger::TriggerEngine;
use crate::value::Row;

const ALL_DIALECTS: [Dialect; 5] = [
    Dialect::Sqlite,
    Dialect::Mysql,
    Dialect::Postgres,
    Dialect::Mssql,
    Dialect::Oracle,
];

/// Candidates return a `name` column and a `tbl` column.
fn trigger_candidates(dialect: Dialect) -> &'static [&'static str] {
    match dialect {
        Dialect::Sqlite => &["SELECT name, tbl_name AS tbl FROM sqlite_master WHERE type = 'trigger'"],
        Dialect::Mysql => &[
            "SELECT TRIGGER_NAME AS name, EVENT_OBJECT_TABLE AS tbl FROM information_schema.TRIGGERS WHERE TRIGGER_SCHEMA = DATABASE()",
        ],
        Dialect::Postgres => &[
            "SELECT t.tgname AS name, c.relname AS tbl FROM pg_trigger t JOIN pg_class c ON c.oid = t.tgrelid WHERE NOT t.tgisinternal",
            "SELECT trigger_name AS name, event_object_table AS tbl FROM information_schema.triggers",
        ],
        Dialect::Mssql => &["SELECT t.name AS name, OBJECT_NAME(t.parent_id) AS tbl FROM sys.triggers t"],
        Dialect::Oracle => &["SELECT trigger_name AS name, table_name AS tbl FROM user_triggers"],
    }
}

fn view_candidates(dialect: Dialect) -> &'static [&'static str] {
    match dialect {
        Dialect::Sqlite => &["SELECT name FROM sqlite_master WHERE type = 'view'"],
        Dialect::Mysql => &[
            "SELECT TABLE_NAME AS name FROM information_schema.VIEWS WHERE TABLE_SCHEMA = DATABASE()",
        ],
        Dialect::Postgres => &[
            "SELECT viewname AS name FROM pg_views WHERE schemaname NOT IN ('pg_catalog', 'information_schema')",
            "SELECT table_name AS name FROM information_schema.views",
        ],
        Dialect::Mssql => &["SELECT name FROM sys.views"],
        Dialect::Oracle => &["SELECT view_name AS name FROM user_views"],
    }
}

/// Column lookup ignoring case; oracle reports upper-case names.
fn cell<'a>(row: &'a Row, column: &str) -> Option<&'a str> {
    row.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(column))
        .and_then(|(_, v)| v.as_str())
}

fn names(rows: Vec<Row>, table: Option<&str>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for row in &rows {
        if let Some(table) = table {
            if !cell(row, "tbl").is_some_and(|t| t.eq_ignore_ascii_case(table)) {
                continue;
            }
        }
        if let Some(name) = cell(row, "name") {
            if seen.insert(name.to_string()) {
                out.push(name.to_string());
            }
        }
    }
    out
}

impl TriggerEngine {
    fn catalog_executor(&self, table: Option<&str>) -> Option<SharedExecutor> {
        match resolve_executor(&self.config, table.unwrap_or_default(), &[]) {
            Ok(executor) => Some(executor),
            Err(e) => {
                tracing::warn!("Catalog lookup skipped: {}", e);
                None
            }
        }
    }

    fn candidates(
        &self,
        executor: &SharedExecutor,
        pick: fn(Dialect) -> &'static [&'static str],
    ) -> Vec<&'static str> {
        match executor.dialect().or(self.config.dialect) {
            Some(dialect) => pick(dialect).to_vec(),
            None => ALL_DIALECTS.iter().flat_map(|d| pick(*d).iter().copied()).collect(),
        }
    }

    fn catalog_sync(
        &self,
        table: Option<&str>,
        pick: fn(Dialect) -> &'static [&'static str],
    ) -> Vec<Row> {
        let Some(executor) = self.catalog_executor(table) else {
            return Vec::new();
        };
        for sql in self.candidates(&executor, pick) {
            match executor.execute_query_sync(sql, &[]) {
                Some(Ok(out)) => return out.data,
                Some(Err(e)) => tracing::debug!("Catalog candidate failed: {}", e),
                None => {
                    tracing::warn!("Catalog lookup needs execute_query_sync; use the async variant");
                    return Vec::new();
                }
            }
        }
        tracing::warn!("No catalog candidate succeeded");
        Vec::new()
    }

    async fn catalog_async(
        &self,
        table: Option<&str>,
        pick: fn(Dialect) -> &'static [&'static str],
    ) -> Vec<Row> {
        let Some(executor) = self.catalog_executor(table) else {
            return Vec::new();
        };
        for sql in self.candidates(&executor, pick) {
            match executor.execute_query(sql, &[]).await {
                Ok(out) => return out.data,
                Err(e) => tracing::debug!("Catalog candidate failed: {}", e),
            }
        }
        tracing::warn!("No catalog candidate succeeded");
        Vec::new()
    }

    /// Native trigger names in the database, optionally for one table.
    pub fn list_triggers(&self, table: Option<&str>) -> Vec<String> {
        names(self.catalog_sync(table, trigger_candidates), table)
    }

    pub async fn list_triggers_async(&self, table: Option<&str>) -> Vec<String> {
        names(self.catalog_async(table, trigger_candidates).await, table)
    }

    /// View names in the database.
    pub fn list_views(&self) -> Vec<String> {
        names(self.catalog_sync(None, view_candidates), None)
    }

    pub async fn list_views_async(&self) -> Vec<String> {
        names(self.catalog_async(None, view_candidates).await, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_names_filter_and_dedupe() {
        let rows = vec![
            crate::value::row(json!({"NAME": "a", "TBL": "Users"})),
            crate::value::row(json!({"name": "a", "tbl": "users"})),
            crate::value::row(json!({"name": "b", "tbl": "posts"})),
        ];
        assert_eq!(names(rows.clone(), Some("users")), vec!["a"]);
        assert_eq!(names(rows, None), vec!["a", "b"]);
    }

    #[test]
    fn test_unknown_dialect_tries_everything() {
        let total: usize = ALL_DIALECTS.iter().map(|d| trigger_candidates(*d).len()).sum();
        assert_eq!(total, 6);
    }
}
