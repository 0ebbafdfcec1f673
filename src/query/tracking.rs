//! Step log and the virtual-row evaluator used while simulating.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value as Json};

use super::ast::{Aggregate, AggregateFunc, PendingAction, QueryAst, WhereKind};
use super::{Operator, Query};
use crate::error::{BankError, BankResult};
use crate::executor::WriteResult;
use crate::value::{Row, Value};

/// One recorded builder or resolution step.
#[derive(Debug, Clone, Serialize)]
pub struct TrackEntry {
    pub step: String,
    pub details: Json,
    pub at: DateTime<Utc>,
}

impl Query {
    pub(crate) fn is_tracking(&self) -> bool {
        self.tracking || self.hub.simulation().is_active()
    }

    pub(crate) fn record(&mut self, step: &str, details: Json) {
        if !self.is_tracking() {
            return;
        }
        self.log.push(TrackEntry {
            step: step.to_string(),
            details,
            at: Utc::now(),
        });
    }

    /// Entries recorded so far, oldest first.
    pub fn tracking_log(&self) -> &[TrackEntry] {
        &self.log
    }

    /// Resolve the instance against virtual state and return the log.
    ///
    /// A pending write is applied to the table's virtual rows and cleared.
    /// Without one, a summary of the compiled read is recorded instead.
    pub fn tracking(&mut self) -> BankResult<&[TrackEntry]> {
        match self.ast.pending.take() {
            Some(action) => {
                if action.requires_where() && self.ast.wheres.is_empty() {
                    let err = BankError::missing_where(action.name());
                    self.ast.pending = Some(action);
                    return Err(err);
                }
                let simulation = self.hub.simulation();
                let rows = simulation.get_state_for(&self.ast.table).unwrap_or_default();
                let (rows, result) = apply_virtual(&self.ast, &action, rows);
                simulation.update_state_for(&self.ast.table, rows);
                self.force_record(
                    "resolve",
                    json!({ "action": action.name(), "result": result }),
                );
            }
            None => {
                let compiled = self.to_sql();
                self.force_record(
                    "resolve",
                    json!({ "action": "READ", "sql": compiled.sql, "bindings": compiled.bindings }),
                );
            }
        }
        Ok(self.log.as_slice())
    }

    fn force_record(&mut self, step: &str, details: Json) {
        self.log.push(TrackEntry {
            step: step.to_string(),
            details,
            at: Utc::now(),
        });
    }
}

/// Equality pairs the virtual evaluator understands.
///
/// Only `column = value` basic clauses are honoured and they are always
/// combined with AND. Every other clause kind and connector is ignored, so
/// simulated results can be wider than what a database would return.
fn equality_filters(ast: &QueryAst) -> Vec<(&str, &Value)> {
    ast.wheres
        .iter()
        .filter_map(|clause| match &clause.kind {
            WhereKind::Basic {
                column,
                op: Operator::Eq,
                value,
            } => Some((column.as_str(), value)),
            _ => None,
        })
        .collect()
}

fn row_matches(row: &Row, filters: &[(&str, &Value)]) -> bool {
    filters
        .iter()
        .all(|(col, value)| row.get(*col).is_some_and(|cell| value.matches(cell)))
}

/// Filter a virtual snapshot for a read.
pub(crate) fn filter_virtual(ast: &QueryAst, rows: Vec<Row>) -> Vec<Row> {
    let filters = equality_filters(ast);
    let mut out: Vec<Row> = rows
        .into_iter()
        .filter(|row| row_matches(row, &filters))
        .collect();
    if let Some(agg) = ast.aggregates.first() {
        let mut single = Row::new();
        single.insert(agg.alias.clone(), aggregate_virtual(agg, &out));
        out = vec![single];
    }
    if let Some(limit) = ast.limit {
        let offset = ast.offset.unwrap_or(0) as usize;
        out = out.into_iter().skip(offset).take(limit as usize).collect();
    }
    out
}

fn aggregate_virtual(agg: &Aggregate, rows: &[Row]) -> Json {
    if agg.func == AggregateFunc::Count {
        let n = if agg.column == "*" {
            rows.len()
        } else {
            rows.iter()
                .filter(|r| r.get(&agg.column).is_some_and(|v| !v.is_null()))
                .count()
        };
        return json!(n);
    }

    let values: Vec<f64> = rows
        .iter()
        .filter_map(|r| r.get(&agg.column).and_then(Json::as_f64))
        .collect();
    if values.is_empty() {
        return Json::Null;
    }
    let folded = match agg.func {
        AggregateFunc::Sum => values.iter().sum(),
        AggregateFunc::Avg => values.iter().sum::<f64>() / values.len() as f64,
        AggregateFunc::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
        AggregateFunc::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        AggregateFunc::Count => values.len() as f64,
    };
    json!(folded)
}

/// Apply `action` to `rows`, returning the new rows and a synthetic result.
pub(crate) fn apply_virtual(
    ast: &QueryAst,
    action: &PendingAction,
    mut rows: Vec<Row>,
) -> (Vec<Row>, WriteResult) {
    let filters = equality_filters(ast);
    match action {
        PendingAction::Insert(new_rows) => {
            rows.extend(new_rows.iter().cloned());
            let last_id = new_rows
                .last()
                .and_then(|r| r.get("id"))
                .and_then(Json::as_i64)
                .or(Some(rows.len() as i64));
            let result = WriteResult {
                changes: new_rows.len() as u64,
                last_insert_rowid: last_id,
            };
            (rows, result)
        }
        PendingAction::Update(patch) => {
            let changes = patch_matching(&mut rows, &filters, |row| {
                for (k, v) in patch {
                    row.insert(k.clone(), v.clone());
                }
            });
            (rows, WriteResult::changed(changes))
        }
        PendingAction::Delete => {
            let before = rows.len();
            rows.retain(|row| !row_matches(row, &filters));
            let changes = (before - rows.len()) as u64;
            (rows, WriteResult::changed(changes))
        }
        PendingAction::Increment { column, amount } => {
            let delta = amount.as_f64().unwrap_or(0.0);
            let changes = patch_matching(&mut rows, &filters, |row| bump(row, column, delta));
            (rows, WriteResult::changed(changes))
        }
        PendingAction::Decrement { column, amount } => {
            let delta = -amount.as_f64().unwrap_or(0.0);
            let changes = patch_matching(&mut rows, &filters, |row| bump(row, column, delta));
            (rows, WriteResult::changed(changes))
        }
        PendingAction::Upsert { attributes, patch } => {
            let keyed: Vec<(&str, Value)> = attributes
                .iter()
                .map(|(k, v)| (k.as_str(), Value::from(v)))
                .collect();
            let keyed: Vec<(&str, &Value)> = keyed.iter().map(|(k, v)| (*k, v)).collect();
            let changes = patch_matching(&mut rows, &keyed, |row| {
                for (k, v) in patch {
                    row.insert(k.clone(), v.clone());
                }
            });
            if changes > 0 {
                return (rows, WriteResult::changed(changes));
            }
            let mut merged = attributes.clone();
            for (k, v) in patch {
                merged.insert(k.clone(), v.clone());
            }
            let insert = PendingAction::Insert(vec![merged]);
            apply_virtual(ast, &insert, rows)
        }
    }
}

fn patch_matching(rows: &mut [Row], filters: &[(&str, &Value)], mut f: impl FnMut(&mut Row)) -> u64 {
    let mut changes = 0;
    for row in rows.iter_mut().filter(|row| row_matches(row, filters)) {
        f(row);
        changes += 1;
    }
    changes
}

fn bump(row: &mut Row, column: &str, delta: f64) {
    let current = row.get(column).cloned().unwrap_or(json!(0));
    let next = match (current.as_i64(), delta.fract() == 0.0) {
        (Some(n), true) => json!(n + delta as i64),
        _ => serde_json::Number::from_f64(current.as_f64().unwrap_or(0.0) + delta)
            .map(Json::Number)
            .unwrap_or(Json::Null),
    };
    row.insert(column.to_string(), next);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ast::{Connector, WhereClause};
    use crate::value::row;

    fn users() -> Vec<Row> {
        vec![
            row(json!({"id": 1, "name": "a", "score": 10})),
            row(json!({"id": 2, "name": "b", "score": 20})),
        ]
    }

    fn with_eq(column: &str, value: impl Into<Value>) -> QueryAst {
        let mut ast = QueryAst::new("users");
        ast.wheres.push(WhereClause {
            connector: Connector::And,
            kind: WhereKind::Basic {
                column: column.into(),
                op: Operator::Eq,
                value: value.into(),
            },
        });
        ast
    }

    #[test]
    fn test_filter_equality() {
        let out = filter_virtual(&with_eq("id", 1), users());
        assert_eq!(out, vec![row(json!({"id": 1, "name": "a", "score": 10}))]);
    }

    #[test]
    fn test_filter_ignores_non_equality() {
        let mut ast = QueryAst::new("users");
        ast.wheres.push(WhereClause {
            connector: Connector::And,
            kind: WhereKind::Basic {
                column: "id".into(),
                op: Operator::Gt,
                value: Value::Int(1),
            },
        });
        assert_eq!(filter_virtual(&ast, users()).len(), 2);
    }

    #[test]
    fn test_apply_update_and_delete() {
        let ast = with_eq("id", 2);
        let patch = row(json!({"name": "z"}));
        let (rows, result) = apply_virtual(&ast, &PendingAction::Update(patch), users());
        assert_eq!(result.changes, 1);
        assert_eq!(rows[1]["name"], json!("z"));

        let (rows, result) = apply_virtual(&ast, &PendingAction::Delete, rows);
        assert_eq!(result.changes, 1);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_apply_decrement() {
        let ast = with_eq("id", 1);
        let action = PendingAction::Decrement {
            column: "score".into(),
            amount: Value::Int(3),
        };
        let (rows, _) = apply_virtual(&ast, &action, users());
        assert_eq!(rows[0]["score"], json!(7));
    }

    #[test]
    fn test_apply_upsert_inserts_when_missing() {
        let ast = QueryAst::new("users");
        let action = PendingAction::Upsert {
            attributes: row(json!({"id": 3})),
            patch: row(json!({"name": "c"})),
        };
        let (rows, result) = apply_virtual(&ast, &action, users());
        assert_eq!(rows.len(), 3);
        assert_eq!(result.last_insert_rowid, Some(3));
        assert_eq!(rows[2], row(json!({"id": 3, "name": "c"})));
    }

    #[test]
    fn test_virtual_aggregates() {
        let mut ast = QueryAst::new("users");
        ast.aggregates.push(Aggregate {
            func: AggregateFunc::Sum,
            column: "score".into(),
            alias: "sum".into(),
        });
        assert_eq!(filter_virtual(&ast, users()), vec![row(json!({"sum": 30.0}))]);

        ast.aggregates[0].func = AggregateFunc::Count;
        ast.aggregates[0].column = "*".into();
        ast.aggregates[0].alias = "count".into();
        assert_eq!(filter_virtual(&ast, Vec::new()), vec![row(json!({"count": 0}))]);
    }
}
