//! Statement description accumulated by the builder.

use serde_json::Value as Json;

use crate::events::Action;
use crate::query::operator::Operator;
use crate::value::{Row, Value};

/// Logical connector of a where/having clause. Ignored on the first clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connector {
    #[default]
    And,
    Or,
}

impl Connector {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Connector::And => "AND",
            Connector::Or => "OR",
        }
    }
}

/// One predicate of a WHERE or HAVING list.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    pub connector: Connector,
    pub kind: WhereKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WhereKind {
    /// `column op ?`
    Basic {
        column: String,
        op: Operator,
        value: Value,
    },
    /// `left op right`, both columns.
    Column {
        left: String,
        op: Operator,
        right: String,
    },
    /// Caller-written SQL with its own bindings.
    Raw { sql: String, bindings: Vec<Value> },
    /// `column [NOT] IN (?, ...)`
    In {
        column: String,
        values: Vec<Value>,
        negated: bool,
    },
    /// `column IS [NOT] NULL`
    Null { column: String, negated: bool },
    /// `column [NOT] BETWEEN ? AND ?`
    Between {
        column: String,
        low: Value,
        high: Value,
        negated: bool,
    },
    /// `[NOT] EXISTS (subquery)`
    Exists { query: Box<QueryAst>, negated: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Cross,
}

impl JoinKind {
    pub fn as_sql(&self) -> &'static str {
        match self {
            JoinKind::Inner => "JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Cross => "CROSS JOIN",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: String,
    /// `(left, op, right)`; absent for cross joins.
    pub on: Option<(String, Operator, String)>,
}

/// A projection entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    Column(String),
    Raw { expr: String, alias: Option<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunc {
    pub fn as_sql(&self) -> &'static str {
        match self {
            AggregateFunc::Count => "COUNT",
            AggregateFunc::Sum => "SUM",
            AggregateFunc::Avg => "AVG",
            AggregateFunc::Min => "MIN",
            AggregateFunc::Max => "MAX",
        }
    }

    /// Default output column name.
    pub fn alias(&self) -> &'static str {
        match self {
            AggregateFunc::Count => "count",
            AggregateFunc::Sum => "sum",
            AggregateFunc::Avg => "avg",
            AggregateFunc::Min => "min",
            AggregateFunc::Max => "max",
        }
    }
}

/// A pre-built aggregate call. The first one declared replaces the projection.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub func: AggregateFunc,
    pub column: String,
    pub alias: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOp {
    Union,
    UnionAll,
}

impl SetOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SetOp::Union => "UNION",
            SetOp::UnionAll => "UNION ALL",
        }
    }
}

/// The single write a query instance may carry until `make()`.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingAction {
    Insert(Vec<Row>),
    Update(Row),
    Delete,
    Increment { column: String, amount: Value },
    Decrement { column: String, amount: Value },
    Upsert { attributes: Row, patch: Row },
}

impl PendingAction {
    pub fn name(&self) -> &'static str {
        match self {
            PendingAction::Insert(_) => "INSERT",
            PendingAction::Update(_) => "UPDATE",
            PendingAction::Delete => "DELETE",
            PendingAction::Increment { .. } => "INCREMENT",
            PendingAction::Decrement { .. } => "DECREMENT",
            PendingAction::Upsert { .. } => "UPSERT",
        }
    }

    /// Whether running this action without a filter is refused.
    pub fn requires_where(&self) -> bool {
        matches!(
            self,
            PendingAction::Update(_)
                | PendingAction::Delete
                | PendingAction::Increment { .. }
                | PendingAction::Decrement { .. }
        )
    }

    /// Lifecycle action the event bus hears about.
    pub fn event_action(&self) -> Action {
        match self {
            PendingAction::Insert(_) => Action::Insert,
            PendingAction::Delete => Action::Delete,
            PendingAction::Update(_)
            | PendingAction::Increment { .. }
            | PendingAction::Decrement { .. }
            | PendingAction::Upsert { .. } => Action::Update,
        }
    }

    /// Payload attached to the lifecycle event as `data`.
    pub fn event_data(&self) -> Option<Json> {
        match self {
            PendingAction::Insert(rows) => Some(Json::Array(
                rows.iter().cloned().map(Json::Object).collect(),
            )),
            PendingAction::Update(patch) => Some(Json::Object(patch.clone())),
            PendingAction::Delete => None,
            PendingAction::Increment { column, amount } => Some(
                serde_json::json!({ "op": "increment", "column": column, "amount": amount.to_json() }),
            ),
            PendingAction::Decrement { column, amount } => Some(
                serde_json::json!({ "op": "decrement", "column": column, "amount": amount.to_json() }),
            ),
            PendingAction::Upsert { attributes, patch } => {
                Some(serde_json::json!({ "attributes": attributes, "patch": patch }))
            }
        }
    }
}

/// Everything a statement needs to compile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryAst {
    pub table: String,
    pub alias: Option<String>,
    pub distinct: bool,
    pub columns: Vec<Projection>,
    pub aggregates: Vec<Aggregate>,
    pub joins: Vec<Join>,
    pub wheres: Vec<WhereClause>,
    pub groups: Vec<String>,
    pub havings: Vec<WhereClause>,
    pub orders: Vec<(String, SortOrder)>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub unions: Vec<(SetOp, QueryAst)>,
    pub pending: Option<PendingAction>,
}

impl QueryAst {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }
}
