//! Chainable clause methods.

use serde_json::json;

use super::ast::*;
use super::{Operator, Query};
use crate::value::{Row, Value};

impl Query {
    fn push_where(mut self, connector: Connector, kind: WhereKind) -> Self {
        self.ast.wheres.push(WhereClause { connector, kind });
        self
    }

    pub fn select<I, S>(mut self, cols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let cols: Vec<String> = cols.into_iter().map(|c| c.as_ref().to_string()).collect();
        self.record("select", json!({ "columns": cols }));
        self.ast
            .columns
            .extend(cols.into_iter().map(Projection::Column));
        self
    }

    /// Raw projection expression, optionally aliased.
    pub fn select_raw(mut self, expr: impl Into<String>, alias: Option<&str>) -> Self {
        let expr = expr.into();
        self.record("select_raw", json!({ "expr": expr, "alias": alias }));
        self.ast.columns.push(Projection::Raw {
            expr,
            alias: alias.map(str::to_string),
        });
        self
    }

    pub fn distinct(mut self) -> Self {
        self.record("distinct", json!({}));
        self.ast.distinct = true;
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        let alias = alias.into();
        self.record("alias", json!({ "alias": alias }));
        self.ast.alias = Some(alias);
        self
    }

    // ------------------------------------------------------------------
    // WHERE
    // ------------------------------------------------------------------

    /// `column op ?`, joined with AND.
    pub fn where_(mut self, column: impl AsRef<str>, op: Operator, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.record(
            "where",
            json!({ "column": column.as_ref(), "op": op.as_sql(), "value": value.to_json() }),
        );
        self.push_where(
            Connector::And,
            WhereKind::Basic {
                column: column.as_ref().to_string(),
                op,
                value,
            },
        )
    }

    pub fn where_eq(self, column: impl AsRef<str>, value: impl Into<Value>) -> Self {
        self.where_(column, Operator::Eq, value)
    }

    pub fn or_where(mut self, column: impl AsRef<str>, op: Operator, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.record(
            "or_where",
            json!({ "column": column.as_ref(), "op": op.as_sql(), "value": value.to_json() }),
        );
        self.push_where(
            Connector::Or,
            WhereKind::Basic {
                column: column.as_ref().to_string(),
                op,
                value,
            },
        )
    }

    /// Compare two columns.
    pub fn where_column(mut self, left: impl AsRef<str>, op: Operator, right: impl AsRef<str>) -> Self {
        self.record(
            "where_column",
            json!({ "left": left.as_ref(), "op": op.as_sql(), "right": right.as_ref() }),
        );
        self.push_where(
            Connector::And,
            WhereKind::Column {
                left: left.as_ref().to_string(),
                op,
                right: right.as_ref().to_string(),
            },
        )
    }

    pub fn or_where_column(mut self, left: impl AsRef<str>, op: Operator, right: impl AsRef<str>) -> Self {
        self.record(
            "or_where_column",
            json!({ "left": left.as_ref(), "op": op.as_sql(), "right": right.as_ref() }),
        );
        self.push_where(
            Connector::Or,
            WhereKind::Column {
                left: left.as_ref().to_string(),
                op,
                right: right.as_ref().to_string(),
            },
        )
    }

    /// Append caller-written SQL. Its `?` count must match `bindings`.
    pub fn where_raw<I, V>(mut self, sql: impl Into<String>, bindings: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let sql = sql.into();
        let bindings: Vec<Value> = bindings.into_iter().map(Into::into).collect();
        self.record("where_raw", json!({ "sql": sql, "bindings": bindings }));
        self.push_where(Connector::And, WhereKind::Raw { sql, bindings })
    }

    pub fn or_where_raw<I, V>(mut self, sql: impl Into<String>, bindings: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let sql = sql.into();
        let bindings: Vec<Value> = bindings.into_iter().map(Into::into).collect();
        self.record("or_where_raw", json!({ "sql": sql, "bindings": bindings }));
        self.push_where(Connector::Or, WhereKind::Raw { sql, bindings })
    }

    fn membership<I, V>(mut self, step: &str, connector: Connector, column: &str, values: I, negated: bool) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.record(step, json!({ "column": column, "values": values }));
        self.push_where(
            connector,
            WhereKind::In {
                column: column.to_string(),
                values,
                negated,
            },
        )
    }

    pub fn where_in<I, V>(self, column: impl AsRef<str>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.membership("where_in", Connector::And, column.as_ref(), values, false)
    }

    pub fn where_not_in<I, V>(self, column: impl AsRef<str>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.membership("where_not_in", Connector::And, column.as_ref(), values, true)
    }

    pub fn or_where_in<I, V>(self, column: impl AsRef<str>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.membership("or_where_in", Connector::Or, column.as_ref(), values, false)
    }

    pub fn where_null(mut self, column: impl AsRef<str>) -> Self {
        self.record("where_null", json!({ "column": column.as_ref() }));
        self.push_where(
            Connector::And,
            WhereKind::Null {
                column: column.as_ref().to_string(),
                negated: false,
            },
        )
    }

    pub fn where_not_null(mut self, column: impl AsRef<str>) -> Self {
        self.record("where_not_null", json!({ "column": column.as_ref() }));
        self.push_where(
            Connector::And,
            WhereKind::Null {
                column: column.as_ref().to_string(),
                negated: true,
            },
        )
    }

    fn range(mut self, step: &str, column: &str, low: Value, high: Value, negated: bool) -> Self {
        self.record(
            step,
            json!({ "column": column, "low": low.to_json(), "high": high.to_json() }),
        );
        self.push_where(
            Connector::And,
            WhereKind::Between {
                column: column.to_string(),
                low,
                high,
                negated,
            },
        )
    }

    pub fn where_between(self, column: impl AsRef<str>, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        self.range("where_between", column.as_ref(), low.into(), high.into(), false)
    }

    pub fn where_not_between(self, column: impl AsRef<str>, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        self.range("where_not_between", column.as_ref(), low.into(), high.into(), true)
    }

    /// `EXISTS (subquery)`. Only the subquery's SELECT form is used.
    pub fn where_exists(mut self, subquery: Query) -> Self {
        self.record("where_exists", json!({ "sql": subquery.to_sql().sql }));
        self.push_where(
            Connector::And,
            WhereKind::Exists {
                query: Box::new(subquery.ast),
                negated: false,
            },
        )
    }

    pub fn where_not_exists(mut self, subquery: Query) -> Self {
        self.record("where_not_exists", json!({ "sql": subquery.to_sql().sql }));
        self.push_where(
            Connector::And,
            WhereKind::Exists {
                query: Box::new(subquery.ast),
                negated: true,
            },
        )
    }

    // ------------------------------------------------------------------
    // JOIN / GROUP / ORDER / LIMIT
    // ------------------------------------------------------------------

    fn push_join(mut self, kind: JoinKind, table: &str, on: Option<(String, Operator, String)>) -> Self {
        self.record(
            "join",
            json!({
                "kind": kind.as_sql(),
                "table": table,
                "on": on.as_ref().map(|(l, op, r)| format!("{} {} {}", l, op, r)),
            }),
        );
        self.ast.joins.push(Join {
            kind,
            table: table.to_string(),
            on,
        });
        self
    }

    pub fn join(self, table: impl AsRef<str>, left: impl Into<String>, op: Operator, right: impl Into<String>) -> Self {
        self.push_join(JoinKind::Inner, table.as_ref(), Some((left.into(), op, right.into())))
    }

    pub fn left_join(self, table: impl AsRef<str>, left: impl Into<String>, op: Operator, right: impl Into<String>) -> Self {
        self.push_join(JoinKind::Left, table.as_ref(), Some((left.into(), op, right.into())))
    }

    pub fn right_join(self, table: impl AsRef<str>, left: impl Into<String>, op: Operator, right: impl Into<String>) -> Self {
        self.push_join(JoinKind::Right, table.as_ref(), Some((left.into(), op, right.into())))
    }

    pub fn cross_join(self, table: impl AsRef<str>) -> Self {
        self.push_join(JoinKind::Cross, table.as_ref(), None)
    }

    pub fn group_by<I, S>(mut self, cols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let cols: Vec<String> = cols.into_iter().map(|c| c.as_ref().to_string()).collect();
        self.record("group_by", json!({ "columns": cols }));
        self.ast.groups.extend(cols);
        self
    }

    pub fn having(mut self, column: impl AsRef<str>, op: Operator, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.record(
            "having",
            json!({ "column": column.as_ref(), "op": op.as_sql(), "value": value.to_json() }),
        );
        self.ast.havings.push(WhereClause {
            connector: Connector::And,
            kind: WhereKind::Basic {
                column: column.as_ref().to_string(),
                op,
                value,
            },
        });
        self
    }

    pub fn or_having(mut self, column: impl AsRef<str>, op: Operator, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.record(
            "or_having",
            json!({ "column": column.as_ref(), "op": op.as_sql(), "value": value.to_json() }),
        );
        self.ast.havings.push(WhereClause {
            connector: Connector::Or,
            kind: WhereKind::Basic {
                column: column.as_ref().to_string(),
                op,
                value,
            },
        });
        self
    }

    pub fn order_by(mut self, column: impl AsRef<str>) -> Self {
        self.record("order_by", json!({ "column": column.as_ref(), "dir": "ASC" }));
        self.ast
            .orders
            .push((column.as_ref().to_string(), SortOrder::Asc));
        self
    }

    pub fn order_by_desc(mut self, column: impl AsRef<str>) -> Self {
        self.record("order_by", json!({ "column": column.as_ref(), "dir": "DESC" }));
        self.ast
            .orders
            .push((column.as_ref().to_string(), SortOrder::Desc));
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.record("limit", json!({ "limit": n }));
        self.ast.limit = Some(n);
        self
    }

    /// Ignored unless a limit is also set.
    pub fn offset(mut self, n: u64) -> Self {
        self.record("offset", json!({ "offset": n }));
        self.ast.offset = Some(n);
        self
    }

    pub fn union(mut self, other: Query) -> Self {
        self.record("union", json!({ "sql": other.to_sql().sql }));
        self.ast.unions.push((SetOp::Union, other.ast));
        self
    }

    pub fn union_all(mut self, other: Query) -> Self {
        self.record("union_all", json!({ "sql": other.to_sql().sql }));
        self.ast.unions.push((SetOp::UnionAll, other.ast));
        self
    }

    // ------------------------------------------------------------------
    // Aggregates
    // ------------------------------------------------------------------

    fn aggregate(mut self, func: AggregateFunc, column: &str) -> Self {
        self.record(
            "aggregate",
            json!({ "func": func.as_sql(), "column": column }),
        );
        self.ast.aggregates.push(Aggregate {
            func,
            column: column.to_string(),
            alias: func.alias().to_string(),
        });
        self
    }

    /// `COUNT(column) AS count`; pass `"*"` to count rows.
    pub fn count(self, column: impl AsRef<str>) -> Self {
        self.aggregate(AggregateFunc::Count, column.as_ref())
    }

    pub fn sum(self, column: impl AsRef<str>) -> Self {
        self.aggregate(AggregateFunc::Sum, column.as_ref())
    }

    pub fn avg(self, column: impl AsRef<str>) -> Self {
        self.aggregate(AggregateFunc::Avg, column.as_ref())
    }

    pub fn min(self, column: impl AsRef<str>) -> Self {
        self.aggregate(AggregateFunc::Min, column.as_ref())
    }

    pub fn max(self, column: impl AsRef<str>) -> Self {
        self.aggregate(AggregateFunc::Max, column.as_ref())
    }

    // ------------------------------------------------------------------
    // Routing and tracking
    // ------------------------------------------------------------------

    /// Preferred databases for this statement, tried in order.
    pub fn bank<I, S>(mut self, hints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let banks: Vec<String> = hints.into_iter().map(Into::into).collect();
        self.record("bank", json!({ "banks": banks }));
        self.banks = banks;
        self
    }

    /// Record builder steps on this instance even when no simulation runs.
    pub fn track(mut self) -> Self {
        self.tracking = true;
        self
    }

    // ------------------------------------------------------------------
    // Pending writes
    // ------------------------------------------------------------------

    fn pend(mut self, action: PendingAction) -> Self {
        self.record(
            action.name().to_lowercase().as_str(),
            action.event_data().unwrap_or_else(|| json!({})),
        );
        self.ast.pending = Some(action);
        self
    }

    pub fn insert(self, row: Row) -> Self {
        self.pend(PendingAction::Insert(vec![row]))
    }

    pub fn insert_many(self, rows: Vec<Row>) -> Self {
        self.pend(PendingAction::Insert(rows))
    }

    pub fn update(self, patch: Row) -> Self {
        self.pend(PendingAction::Update(patch))
    }

    pub fn delete(self) -> Self {
        self.pend(PendingAction::Delete)
    }

    pub fn increment(self, column: impl Into<String>, amount: impl Into<Value>) -> Self {
        self.pend(PendingAction::Increment {
            column: column.into(),
            amount: amount.into(),
        })
    }

    pub fn decrement(self, column: impl Into<String>, amount: impl Into<Value>) -> Self {
        self.pend(PendingAction::Decrement {
            column: column.into(),
            amount: amount.into(),
        })
    }

    /// Update rows matching `attributes`, inserting `attributes + patch` if none changed.
    pub fn upsert(self, attributes: Row, patch: Row) -> Self {
        self.pend(PendingAction::Upsert { attributes, patch })
    }
}
