//! SQL compiler for [`QueryAst`].
//!
//! Output is dialect-neutral SQL with `?` placeholders. Bindings are pushed
//! in exactly the order their placeholders are emitted.

use serde::Serialize;

use crate::error::{BankError, BankResult};
use crate::query::ast::*;
use crate::value::{Row, Value};

/// Compiled statement: SQL text plus positional bindings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledQuery {
    pub sql: String,
    pub bindings: Vec<Value>,
}

/// WHERE body (without the keyword) and its bindings.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WhereFragment {
    pub sql: String,
    pub bindings: Vec<Value>,
}

impl QueryAst {
    /// Compile the SELECT form, including any set operations.
    pub fn compile_select(&self) -> CompiledQuery {
        let mut bindings = Vec::new();
        let base = self.select_body(&mut bindings);
        if self.unions.is_empty() {
            return CompiledQuery {
                sql: base,
                bindings,
            };
        }

        let mut sql = format!("({})", base);
        for (op, other) in &self.unions {
            let part = other.compile_select();
            sql.push_str(&format!(" {} ({})", op.as_sql(), part.sql));
            bindings.extend(part.bindings);
        }
        CompiledQuery { sql, bindings }
    }

    fn select_body(&self, bindings: &mut Vec<Value>) -> String {
        let mut sql = String::from("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }

        // Projection
        if let Some(agg) = self.aggregates.first() {
            sql.push_str(&format!(
                "{}({}) AS {}",
                agg.func.as_sql(),
                agg.column,
                agg.alias
            ));
        } else if self.columns.is_empty() {
            sql.push('*');
        } else {
            let cols: Vec<String> = self.columns.iter().map(projection_sql).collect();
            sql.push_str(&cols.join(", "));
        }

        // FROM
        sql.push_str(" FROM ");
        sql.push_str(&self.table);
        if let Some(alias) = &self.alias {
            sql.push(' ');
            sql.push_str(alias);
        }

        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join.kind.as_sql());
            sql.push(' ');
            sql.push_str(&join.table);
            if let Some((left, op, right)) = &join.on {
                sql.push_str(&format!(" ON {} {} {}", left, op.as_sql(), right));
            }
        }

        if !self.wheres.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&compile_clauses(&self.wheres, bindings));
        }

        if !self.groups.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.groups.join(", "));
        }

        if !self.havings.is_empty() {
            sql.push_str(" HAVING ");
            sql.push_str(&compile_clauses(&self.havings, bindings));
        }

        if !self.orders.is_empty() {
            let orders: Vec<String> = self
                .orders
                .iter()
                .map(|(col, dir)| match dir {
                    SortOrder::Asc => format!("{} ASC", col),
                    SortOrder::Desc => format!("{} DESC", col),
                })
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&orders.join(", "));
        }

        // OFFSET is only meaningful after LIMIT.
        if let Some(limit) = self.limit {
            sql.push_str(" LIMIT ?");
            bindings.push(Value::Int(i64::try_from(limit).unwrap_or(i64::MAX)));
            if let Some(offset) = self.offset {
                sql.push_str(" OFFSET ?");
                bindings.push(Value::Int(i64::try_from(offset).unwrap_or(i64::MAX)));
            }
        }

        sql
    }

    /// Compile just the WHERE list.
    pub fn where_fragment(&self) -> WhereFragment {
        let mut bindings = Vec::new();
        let sql = compile_clauses(&self.wheres, &mut bindings);
        WhereFragment { sql, bindings }
    }

    /// Compile `action` against this table and filter.
    ///
    /// Upserts compile to their first step, the keyed UPDATE.
    pub fn compile_write(&self, action: &PendingAction) -> BankResult<CompiledQuery> {
        match action {
            PendingAction::Insert(rows) => compile_insert(&self.table, rows),
            PendingAction::Update(patch) => {
                self.compile_update_with(patch.iter().map(|(k, v)| {
                    (format!("{} = ?", k), Value::from(v))
                }))
            }
            PendingAction::Delete => {
                let fragment = self.require_where("DELETE")?;
                Ok(CompiledQuery {
                    sql: format!("DELETE FROM {} WHERE {}", self.table, fragment.sql),
                    bindings: fragment.bindings,
                })
            }
            PendingAction::Increment { column, amount } => self.compile_update_with(
                std::iter::once((format!("{0} = {0} + ?", column), amount.clone())),
            ),
            PendingAction::Decrement { column, amount } => self.compile_update_with(
                std::iter::once((format!("{0} = {0} - ?", column), amount.clone())),
            ),
            PendingAction::Upsert { attributes, patch } => {
                let mut keyed = self.clone();
                keyed.wheres = attribute_clauses(attributes);
                let set = if patch.is_empty() { attributes } else { patch };
                keyed.compile_write(&PendingAction::Update(set.clone()))
            }
        }
    }

    fn compile_update_with(
        &self,
        sets: impl Iterator<Item = (String, Value)>,
    ) -> BankResult<CompiledQuery> {
        let fragment = self.require_where("UPDATE")?;
        let mut assignments = Vec::new();
        let mut bindings = Vec::new();
        for (assignment, value) in sets {
            assignments.push(assignment);
            bindings.push(value);
        }
        if assignments.is_empty() {
            return Err(BankError::execution("UPDATE with an empty patch"));
        }
        bindings.extend(fragment.bindings);
        Ok(CompiledQuery {
            sql: format!(
                "UPDATE {} SET {} WHERE {}",
                self.table,
                assignments.join(", "),
                fragment.sql
            ),
            bindings,
        })
    }

    fn require_where(&self, action: &'static str) -> BankResult<WhereFragment> {
        if self.wheres.is_empty() {
            return Err(BankError::missing_where(action));
        }
        Ok(self.where_fragment())
    }
}

/// Equality clauses for each attribute, in attribute order.
pub(crate) fn attribute_clauses(attributes: &Row) -> Vec<WhereClause> {
    attributes
        .iter()
        .map(|(k, v)| WhereClause {
            connector: Connector::And,
            kind: WhereKind::Basic {
                column: k.clone(),
                op: crate::query::Operator::Eq,
                value: Value::from(v),
            },
        })
        .collect()
}

fn compile_insert(table: &str, rows: &[Row]) -> BankResult<CompiledQuery> {
    // Column list is the ordered union of every row's keys.
    let mut columns: Vec<&String> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !columns.contains(&key) {
                columns.push(key);
            }
        }
    }
    if columns.is_empty() {
        return Err(BankError::execution(format!(
            "INSERT INTO {} with no columns",
            table
        )));
    }

    let mut bindings = Vec::with_capacity(columns.len() * rows.len());
    let mut groups = Vec::with_capacity(rows.len());
    for row in rows {
        let placeholders = vec!["?"; columns.len()].join(", ");
        groups.push(format!("({})", placeholders));
        for col in &columns {
            bindings.push(row.get(col.as_str()).map(Value::from).unwrap_or(Value::Null));
        }
    }

    let cols: Vec<&str> = columns.iter().map(|c| c.as_str()).collect();
    Ok(CompiledQuery {
        sql: format!(
            "INSERT INTO {} ({}) VALUES {}",
            table,
            cols.join(", "),
            groups.join(", ")
        ),
        bindings,
    })
}

fn projection_sql(p: &Projection) -> String {
    match p {
        Projection::Column(c) => c.clone(),
        Projection::Raw { expr, alias: Some(a) } => format!("{} AS {}", expr, a),
        Projection::Raw { expr, alias: None } => expr.clone(),
    }
}

/// Fold clauses left to right, prefixing all but the first with their connector.
fn compile_clauses(clauses: &[WhereClause], bindings: &mut Vec<Value>) -> String {
    let mut sql = String::new();
    for (i, clause) in clauses.iter().enumerate() {
        if i > 0 {
            sql.push(' ');
            sql.push_str(clause.connector.as_sql());
            sql.push(' ');
        }
        sql.push_str(&compile_clause(&clause.kind, bindings));
    }
    sql
}

fn compile_clause(kind: &WhereKind, bindings: &mut Vec<Value>) -> String {
    match kind {
        WhereKind::Basic { column, op, value } => {
            bindings.push(value.clone());
            format!("{} {} ?", column, op.as_sql())
        }
        WhereKind::Column { left, op, right } => format!("{} {} {}", left, op.as_sql(), right),
        WhereKind::Raw { sql, bindings: raw } => {
            bindings.extend(raw.iter().cloned());
            sql.clone()
        }
        WhereKind::In {
            values, negated, ..
        } if values.is_empty() => {
            // Empty set: IN is never true, NOT IN always is.
            let always = if *negated { "1=1" } else { "1=0" };
            always.to_string()
        }
        WhereKind::In {
            column,
            values,
            negated,
        } => {
            bindings.extend(values.iter().cloned());
            format!(
                "{} {} ({})",
                column,
                if *negated { "NOT IN" } else { "IN" },
                vec!["?"; values.len()].join(",")
            )
        }
        WhereKind::Null { column, negated } => {
            format!("{} IS {}NULL", column, if *negated { "NOT " } else { "" })
        }
        WhereKind::Between {
            column,
            low,
            high,
            negated,
        } => {
            bindings.push(low.clone());
            bindings.push(high.clone());
            format!(
                "{} {}BETWEEN ? AND ?",
                column,
                if *negated { "NOT " } else { "" }
            )
        }
        WhereKind::Exists { query, negated } => {
            let sub = query.compile_select();
            bindings.extend(sub.bindings);
            format!(
                "{}EXISTS ({})",
                if *negated { "NOT " } else { "" },
                sub.sql
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Operator;
    use serde_json::json;

    fn basic(column: &str, value: impl Into<Value>) -> WhereClause {
        WhereClause {
            connector: Connector::And,
            kind: WhereKind::Basic {
                column: column.into(),
                op: Operator::Eq,
                value: value.into(),
            },
        }
    }

    #[test]
    fn test_simple_select() {
        let ast = QueryAst::new("users");
        assert_eq!(ast.compile_select().sql, "SELECT * FROM users");
    }

    #[test]
    fn test_empty_in_is_false_and_not_in_true() {
        let mut ast = QueryAst::new("t");
        ast.wheres.push(WhereClause {
            connector: Connector::And,
            kind: WhereKind::In {
                column: "id".into(),
                values: vec![],
                negated: false,
            },
        });
        assert_eq!(ast.where_fragment().sql, "1=0");
        ast.wheres[0].kind = WhereKind::In {
            column: "id".into(),
            values: vec![],
            negated: true,
        };
        assert_eq!(ast.where_fragment().sql, "1=1");
        assert!(ast.where_fragment().bindings.is_empty());
    }

    #[test]
    fn test_first_connector_ignored() {
        let mut ast = QueryAst::new("t");
        let mut first = basic("a", 1);
        first.connector = Connector::Or;
        ast.wheres.push(first);
        let mut second = basic("b", 2);
        second.connector = Connector::Or;
        ast.wheres.push(second);
        assert_eq!(ast.where_fragment().sql, "a = ? OR b = ?");
    }

    #[test]
    fn test_insert_multi_row_fills_missing_with_null() {
        let rows = vec![
            crate::value::row(json!({"a": 1, "b": 2})),
            crate::value::row(json!({"a": 3})),
        ];
        let q = compile_insert("t", &rows).unwrap();
        assert_eq!(q.sql, "INSERT INTO t (a, b) VALUES (?, ?), (?, ?)");
        assert_eq!(
            q.bindings,
            vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::Null]
        );
    }

    #[test]
    fn test_update_requires_where() {
        let ast = QueryAst::new("t");
        let err = ast
            .compile_write(&PendingAction::Update(crate::value::row(json!({"a": 1}))))
            .unwrap_err();
        assert!(matches!(err, BankError::MissingWhere { action: "UPDATE" }));
    }

    #[test]
    fn test_increment_sql() {
        let mut ast = QueryAst::new("t");
        ast.wheres.push(basic("id", 7));
        let q = ast
            .compile_write(&PendingAction::Increment {
                column: "hits".into(),
                amount: Value::Int(2),
            })
            .unwrap();
        assert_eq!(q.sql, "UPDATE t SET hits = hits + ? WHERE id = ?");
        assert_eq!(q.bindings, vec![Value::Int(2), Value::Int(7)]);
    }

    #[test]
    fn test_upsert_compiles_keyed_update() {
        let ast = QueryAst::new("t");
        let q = ast
            .compile_write(&PendingAction::Upsert {
                attributes: crate::value::row(json!({"email": "a@b.com"})),
                patch: crate::value::row(json!({"name": "A"})),
            })
            .unwrap();
        assert_eq!(q.sql, "UPDATE t SET name = ? WHERE email = ?");
    }

    #[test]
    fn test_upsert_with_empty_patch_sets_attributes() {
        let ast = QueryAst::new("t");
        let q = ast
            .compile_write(&PendingAction::Upsert {
                attributes: crate::value::row(json!({"email": "a@b.com"})),
                patch: Row::new(),
            })
            .unwrap();
        assert_eq!(q.sql, "UPDATE t SET email = ? WHERE email = ?");
        assert_eq!(q.bindings.len(), 2);
    }

    #[test]
    fn test_huge_limit_saturates() {
        let mut ast = QueryAst::new("t");
        ast.limit = Some(u64::MAX);
        ast.offset = Some(u64::MAX);
        let q = ast.compile_select();
        assert_eq!(q.bindings, vec![Value::Int(i64::MAX), Value::Int(i64::MAX)]);
    }
}
