//! # bankql
//!
//! A SQL data-access toolkit: a fluent query compiler, an executor router
//! for several databases, lifecycle triggers and a dry-run simulation layer,
//! all tied together by one event bus.
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use bankql::prelude::*;
//!
//! let db = SqlxExecutor::connect("sqlite::memory:").await?;
//! let hub = Hub::new(Config::builder().executor(Arc::new(db)).build());
//!
//! let sql = hub.query("users").where_eq("active", true).limit(10).to_sql();
//! // => "SELECT * FROM users WHERE active = ? LIMIT ?"
//!
//! let mut q = hub.query("users").insert(row(json!({"email": "a@b.com"})));
//! let result = q.make().await?;
//! ```
//!
//! ## Pieces
//!
//! | Module        | Role                                              |
//! |---------------|---------------------------------------------------|
//! | [`query`]     | builder, compiler, reads and writes               |
//! | [`resolve`]   | which executor handles a table                    |
//! | [`events`]    | BEFORE/AFTER lifecycle topics                     |
//! | [`trigger`]   | native and in-process trigger bodies              |
//! | [`simulation`]| virtual rows for dry runs                         |
//! | [`driver`]    | sqlx-backed reference executor                    |

pub mod config;
pub mod dialect;
pub mod driver;
pub mod error;
pub mod events;
pub mod executor;
pub mod hub;
pub mod parallel;
pub mod query;
pub mod registry;
pub mod resolve;
pub mod simulation;
pub mod trigger;
pub mod value;

pub use error::{BankError, BankResult};
pub use hub::Hub;
pub use parallel::parallel;

pub mod prelude {
    pub use crate::config::{Config, ConfigBuilder, ConfigFile};
    pub use crate::dialect::Dialect;
    pub use crate::driver::SqlxExecutor;
    pub use crate::error::*;
    pub use crate::events::{topic, Action, EventBus, EventDelegate, LifecycleEvent, Timing};
    pub use crate::executor::{ExecOutput, Executor, SharedExecutor, WriteResult};
    pub use crate::hub::{Hub, HubBuilder};
    pub use crate::parallel::parallel;
    pub use crate::query::{CompiledQuery, Operator, Query, WhereFragment};
    pub use crate::registry::{DatabaseRegistry, MultiDatabase};
    pub use crate::resolve::resolve_executor;
    pub use crate::simulation::{Seed, Simulation, SimulationController};
    pub use crate::trigger::{Body, StateMode, TriggerDef, TriggerEngine, TriggerListing};
    pub use crate::value::{row, Row, Value};
}
