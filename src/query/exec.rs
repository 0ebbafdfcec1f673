//! Running compiled statements.
//!
//! Every read and write publishes a BEFORE event, runs against the resolved
//! executor (or the simulation's virtual rows), then publishes an AFTER
//! event. A listener failure on BEFORE stops the statement before it reaches
//! the executor.

use serde_json::{json, Value as Json};

use super::ast::{PendingAction, QueryAst, WhereClause, WhereKind};
use super::compile::attribute_clauses;
use super::tracking::{apply_virtual, filter_virtual};
use super::{Operator, Query};
use crate::error::{BankError, BankResult};
use crate::events::{topic, Action, LifecycleEvent, Timing};
use crate::executor::{SharedExecutor, WriteResult};
use crate::value::{Row, Value};

/// Where a read is answered from.
enum Source {
    Virtual(Vec<Row>),
    Live(SharedExecutor),
}

impl Query {
    fn read_source(&self, table: &str) -> BankResult<Source> {
        let simulation = self.hub.simulation();
        if simulation.is_active() {
            if let Some(rows) = simulation.get_state_for(table) {
                return Ok(Source::Virtual(rows));
            }
        }
        Ok(Source::Live(self.hub.resolve(table, &self.banks)?))
    }

    fn event_topic(&self, timing: Timing, action: Action, table: &str) -> String {
        topic(&self.hub.config().namespace, timing, action, table)
    }

    async fn read_ast(&self, ast: &QueryAst) -> BankResult<Vec<Row>> {
        let table = ast.table.as_str();
        let source = self.read_source(table)?;

        let before = LifecycleEvent::new(table, Action::Read, Timing::Before)
            .with_where(ast.where_fragment());
        self.hub
            .bus()
            .emit(&self.event_topic(Timing::Before, Action::Read, table), before)
            .await?;

        let rows = match source {
            Source::Virtual(rows) => filter_virtual(ast, rows),
            Source::Live(executor) => {
                let compiled = ast.compile_select();
                tracing::debug!("read {}: {}", table, compiled.sql);
                executor
                    .execute_query(&compiled.sql, &compiled.bindings)
                    .await?
                    .data
            }
        };

        let after = LifecycleEvent::new(table, Action::Read, Timing::After)
            .with_where(ast.where_fragment())
            .with_rows(rows.clone());
        self.hub
            .bus()
            .emit(&self.event_topic(Timing::After, Action::Read, table), after)
            .await?;
        Ok(rows)
    }

    /// Fetch every matching row.
    pub async fn all(&self) -> BankResult<Vec<Row>> {
        self.read_ast(&self.ast).await
    }

    /// Alias of [`all`](Self::all).
    pub async fn get(&self) -> BankResult<Vec<Row>> {
        self.all().await
    }

    /// Blocking read through the executor's synchronous capability.
    ///
    /// Listeners are driven with a local blocking executor, so they must not
    /// depend on the tokio reactor.
    pub fn all_sync(&self) -> BankResult<Vec<Row>> {
        let ast = &self.ast;
        let table = ast.table.as_str();
        let source = self.read_source(table)?;
        let bus = self.hub.bus();

        let before = LifecycleEvent::new(table, Action::Read, Timing::Before)
            .with_where(ast.where_fragment());
        bus.emit_blocking(&self.event_topic(Timing::Before, Action::Read, table), before)?;

        let rows = match source {
            Source::Virtual(rows) => filter_virtual(ast, rows),
            Source::Live(executor) => {
                let compiled = ast.compile_select();
                executor
                    .execute_query_sync(&compiled.sql, &compiled.bindings)
                    .ok_or(BankError::Capability("execute_query_sync"))??
                    .data
            }
        };

        let after = LifecycleEvent::new(table, Action::Read, Timing::After)
            .with_where(ast.where_fragment())
            .with_rows(rows.clone());
        bus.emit_blocking(&self.event_topic(Timing::After, Action::Read, table), after)?;
        Ok(rows)
    }

    /// First matching row. The instance's own limit is left untouched.
    pub async fn first(&self) -> BankResult<Option<Row>> {
        let mut ast = self.ast.clone();
        ast.limit = Some(1);
        Ok(self.read_ast(&ast).await?.into_iter().next())
    }

    /// Row whose `id` equals `id`.
    pub async fn find(&self, id: impl Into<Value>) -> BankResult<Option<Row>> {
        let mut ast = self.ast.clone();
        ast.wheres.push(WhereClause {
            connector: Default::default(),
            kind: WhereKind::Basic {
                column: "id".to_string(),
                op: Operator::Eq,
                value: id.into(),
            },
        });
        ast.limit = Some(1);
        Ok(self.read_ast(&ast).await?.into_iter().next())
    }

    /// One column of every matching row. Missing cells come back as null.
    pub async fn pluck(&self, column: &str) -> BankResult<Vec<Json>> {
        let rows = self.all().await?;
        Ok(rows
            .into_iter()
            .map(|mut row| row.remove(column).unwrap_or(Json::Null))
            .collect())
    }

    /// First cell of the first row, as produced by an aggregate.
    pub async fn scalar(&self) -> BankResult<Option<Json>> {
        let rows = self.all().await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next().map(|(_, v)| v)))
    }

    /// `SELECT COUNT(*)` over the current filter.
    pub async fn count_value(&self) -> BankResult<u64> {
        let value = self.clone().count("*").scalar().await?;
        Ok(value.as_ref().and_then(json_u64).unwrap_or(0))
    }

    /// `SELECT SUM(column)` over the current filter. Null sums read as zero.
    pub async fn sum_value(&self, column: &str) -> BankResult<f64> {
        let value = self.clone().sum(column).scalar().await?;
        Ok(value.as_ref().and_then(json_f64).unwrap_or(0.0))
    }

    /// Read straight from the resolved executor, bypassing the simulation
    /// and the event bus. Used to seed virtual state from live data.
    pub(crate) async fn fetch_live(&self) -> BankResult<Vec<Row>> {
        let executor = self.hub.resolve(&self.ast.table, &self.banks)?;
        let compiled = self.to_sql();
        Ok(executor
            .execute_query(&compiled.sql, &compiled.bindings)
            .await?
            .data)
    }

    /// Run the pending write.
    ///
    /// The pending action is cleared only when the write succeeds, so a
    /// failed `make()` may be retried.
    pub async fn make(&mut self) -> BankResult<WriteResult> {
        let action = self.ast.pending.clone().ok_or(BankError::NoPendingAction)?;
        if action.requires_where() && self.ast.wheres.is_empty() {
            return Err(BankError::missing_where(action.name()));
        }

        let result = match &action {
            PendingAction::Upsert { attributes, patch } => self.upsert_now(attributes, patch).await?,
            other => self.write_ast(&self.ast, other).await?,
        };

        self.ast.pending = None;
        self.record(
            "resolve",
            json!({ "action": action.name(), "result": result }),
        );
        Ok(result)
    }

    /// UPDATE keyed by `attributes`, then INSERT of `attributes + patch` if
    /// nothing changed. Runs on a copy so this instance's filter is untouched.
    async fn upsert_now(&self, attributes: &Row, patch: &Row) -> BankResult<WriteResult> {
        let mut keyed = self.ast.clone();
        keyed.wheres = attribute_clauses(attributes);
        let set = if patch.is_empty() { attributes } else { patch };
        let updated = self
            .write_ast(&keyed, &PendingAction::Update(set.clone()))
            .await?;
        if updated.changes > 0 {
            return Ok(updated);
        }

        let mut merged = attributes.clone();
        for (k, v) in patch {
            merged.insert(k.clone(), v.clone());
        }
        tracing::debug!("upsert {}: no rows matched, inserting", keyed.table);
        self.write_ast(&self.ast, &PendingAction::Insert(vec![merged]))
            .await
    }

    async fn write_ast(&self, ast: &QueryAst, action: &PendingAction) -> BankResult<WriteResult> {
        let table = ast.table.as_str();
        let simulated = self.hub.simulation().is_active();
        let executor = if simulated {
            None
        } else {
            Some(self.hub.resolve(table, &self.banks)?)
        };
        let compiled = ast.compile_write(action)?;

        let event_action = action.event_action();
        let mut before = LifecycleEvent::new(table, event_action, Timing::Before);
        if let Some(data) = action.event_data() {
            before = before.with_data(data);
        }
        if action.requires_where() {
            before = before.with_where(ast.where_fragment());
        }
        let mut after = before.clone();
        after.timing = Timing::After;

        self.hub
            .bus()
            .emit(&self.event_topic(Timing::Before, event_action, table), before)
            .await?;

        let result = match executor {
            Some(executor) => {
                tracing::debug!("write {}: {}", table, compiled.sql);
                let out = executor
                    .execute_query(&compiled.sql, &compiled.bindings)
                    .await?;
                WriteResult::normalize(&out)
            }
            None => {
                let simulation = self.hub.simulation();
                let rows = simulation.get_state_for(table).unwrap_or_default();
                let (rows, result) = apply_virtual(ast, action, rows);
                simulation.update_state_for(table, rows);
                tracing::debug!("simulated {} on {}: {:?}", action.name(), table, result);
                result
            }
        };

        self.hub
            .bus()
            .emit(
                &self.event_topic(Timing::After, event_action, table),
                after.with_result(result),
            )
            .await?;
        Ok(result)
    }
}

fn json_u64(v: &Json) -> Option<u64> {
    match v {
        Json::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f as u64)),
        Json::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn json_f64(v: &Json) -> Option<f64> {
    match v {
        Json::Number(n) => n.as_f64(),
        Json::String(s) => s.parse().ok(),
        _ => None,
    }
}
