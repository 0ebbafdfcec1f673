//! Error types for bankql.

use thiserror::Error;

/// The main error type for bankql operations.
#[derive(Debug, Error)]
pub enum BankError {
    /// No executor could be determined for a statement, or the config is unusable.
    #[error("bankql configuration error: {0}")]
    Config(String),

    /// A write that needs a filter was attempted without one.
    #[error("{action} requires at least one where clause")]
    MissingWhere { action: &'static str },

    /// `make()` was called without a pending write action.
    #[error("No pending action to execute. Call insert, update, delete, increment, decrement or upsert first")]
    NoPendingAction,

    /// An action name that this toolkit does not know how to run.
    #[error("Unsupported action: '{0}'")]
    UnsupportedAction(String),

    /// Comparison operator text that could not be parsed.
    #[error("Invalid operator: '{0}'")]
    InvalidOperator(String),

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error.
    #[error("Execution error: {0}")]
    Execution(String),

    /// A trigger body failed while handling a lifecycle event.
    #[error("Trigger error: {0}")]
    Trigger(String),

    /// The executor does not expose the requested capability.
    #[error("Executor does not support {0}")]
    Capability(&'static str),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file could not be parsed.
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BankError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an execution error.
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }

    /// Create a missing where-clause error for the named action.
    pub fn missing_where(action: &'static str) -> Self {
        Self::MissingWhere { action }
    }
}

/// Result type alias for bankql operations.
pub type BankResult<T> = Result<T, BankError>;
