//! Semantic triggers.
//!
//! A trigger reacts to query lifecycle events. Its body can be SQL, a Rust
//! callable, a sequence or a parallel group, nested freely. In bank mode the
//! SQL part is installed as a native database trigger and the rest runs as a
//! bus listener; in state mode the whole body runs in-process.
//!
//! ```ignore
//! hub.triggers()
//!     .create(
//!         TriggerDef::new("audit", "INSERT INTO audit_log (event) VALUES ('user')")
//!             .on("*")
//!             .except(["READ"])
//!             .table("users"),
//!     )
//!     .await?;
//! ```

mod body;
mod catalog;
mod def;
mod engine;

pub use body::{Body, Handler, SqlRunner};
pub use def::{StateMode, TriggerDef};
pub use engine::{TriggerEngine, TriggerListing};
