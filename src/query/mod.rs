//! Fluent query builder.
//!
//! A [`Query`] accumulates clauses into a [`QueryAst`], compiles it to SQL with
//! `?` placeholders, and runs it against whichever executor the hub resolves
//! for its table (or against the simulation's virtual rows).
//!
//! ```ignore
//! let rows = hub.query("users")
//!     .where_eq("active", true)
//!     .order_by_desc("id")
//!     .limit(10)
//!     .all()
//!     .await?;
//! ```

pub mod ast;
mod builder;
mod compile;
mod exec;
pub mod operator;
mod tracking;

pub use ast::{JoinKind, PendingAction, QueryAst, SortOrder};
pub use compile::{CompiledQuery, WhereFragment};
pub use operator::Operator;
pub use tracking::TrackEntry;

use crate::hub::Hub;

/// A statement under construction, bound to one [`Hub`].
#[derive(Clone)]
pub struct Query {
    hub: Hub,
    ast: QueryAst,
    banks: Vec<String>,
    tracking: bool,
    log: Vec<TrackEntry>,
}

impl Query {
    pub fn new(hub: Hub, table: impl Into<String>) -> Self {
        Self {
            hub,
            ast: QueryAst::new(table),
            banks: Vec::new(),
            tracking: false,
            log: Vec::new(),
        }
    }

    pub fn table(&self) -> &str {
        &self.ast.table
    }

    pub fn ast(&self) -> &QueryAst {
        &self.ast
    }

    /// The write waiting for [`make`](Self::make), if any.
    pub fn pending(&self) -> Option<&PendingAction> {
        self.ast.pending.as_ref()
    }

    /// Compile the SELECT form. Pure and repeatable.
    pub fn to_sql(&self) -> CompiledQuery {
        self.ast.compile_select()
    }

    /// WHERE body without the keyword, plus its bindings.
    pub fn where_fragment(&self) -> WhereFragment {
        self.ast.where_fragment()
    }

    /// Compile the pending write without running it.
    pub fn to_write_sql(&self) -> crate::BankResult<CompiledQuery> {
        match &self.ast.pending {
            Some(action) => self.ast.compile_write(action),
            None => Err(crate::BankError::NoPendingAction),
        }
    }

    pub(crate) fn hub(&self) -> &Hub {
        &self.hub
    }
}

impl std::fmt::Debug for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("ast", &self.ast)
            .field("banks", &self.banks)
            .field("tracking", &self.tracking)
            .finish()
    }
}
