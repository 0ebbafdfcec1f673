//! Database dialect tags.
//!
//! The compiler emits dialect-neutral SQL with `?` placeholders. The dialect
//! only selects catalog-introspection SQL and placeholder rewriting in the
//! reference driver.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::BankError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Sqlite,
    Mysql,
    Postgres,
    Mssql,
    Oracle,
}

impl Dialect {
    /// Guess the dialect from a connection URL scheme.
    pub fn from_url(url: &str) -> Option<Self> {
        let scheme = url.split(':').next()?.to_lowercase();
        match scheme.as_str() {
            "sqlite" => Some(Dialect::Sqlite),
            "mysql" | "mariadb" => Some(Dialect::Mysql),
            "postgres" | "postgresql" => Some(Dialect::Postgres),
            "mssql" | "sqlserver" => Some(Dialect::Mssql),
            "oracle" => Some(Dialect::Oracle),
            _ => None,
        }
    }

    /// Rewrite `?` placeholders into the dialect's numbered form.
    ///
    /// Only postgres needs this. Question marks inside single-quoted literals
    /// and double-quoted identifiers are left alone.
    pub fn rewrite_placeholders(&self, sql: &str) -> String {
        if *self != Dialect::Postgres {
            return sql.to_string();
        }
        let mut out = String::with_capacity(sql.len() + 8);
        let mut n = 0;
        let mut quote: Option<char> = None;
        for c in sql.chars() {
            match (quote, c) {
                (None, '\'') | (None, '"') => {
                    quote = Some(c);
                    out.push(c);
                }
                (Some(q), c) if c == q => {
                    quote = None;
                    out.push(c);
                }
                (None, '?') => {
                    n += 1;
                    out.push('$');
                    out.push_str(&n.to_string());
                }
                _ => out.push(c),
            }
        }
        out
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Mysql => "mysql",
            Dialect::Postgres => "postgres",
            Dialect::Mssql => "mssql",
            Dialect::Oracle => "oracle",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Dialect {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            "mysql" | "mariadb" => Ok(Dialect::Mysql),
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "mssql" | "sqlserver" => Ok(Dialect::Mssql),
            "oracle" => Ok(Dialect::Oracle),
            other => Err(BankError::config(format!("unknown dialect '{}'", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_url() {
        assert_eq!(Dialect::from_url("sqlite::memory:"), Some(Dialect::Sqlite));
        assert_eq!(
            Dialect::from_url("postgres://localhost/app"),
            Some(Dialect::Postgres)
        );
        assert_eq!(Dialect::from_url("redis://x"), None);
    }

    #[test]
    fn test_rewrite_placeholders_postgres() {
        let sql = "SELECT * FROM t WHERE a = ? AND b = '?' AND c = ?";
        assert_eq!(
            Dialect::Postgres.rewrite_placeholders(sql),
            "SELECT * FROM t WHERE a = $1 AND b = '?' AND c = $2"
        );
        assert_eq!(Dialect::Sqlite.rewrite_placeholders(sql), sql);
    }
}
