//! Executor resolution.
//!
//! First match wins:
//! 1. the per-table resolver
//! 2. bank hints, in order, against the registry (failing hints are skipped)
//! 3. the static table map, against the registry
//! 4. the default database name, against the registry
//! 5. the default executor

use crate::config::Config;
use crate::error::{BankError, BankResult};
use crate::executor::SharedExecutor;

/// Pick the executor that handles statements on `table`.
pub fn resolve_executor(
    config: &Config,
    table: &str,
    banks: &[String],
) -> BankResult<SharedExecutor> {
    if let Some(resolver) = &config.resolver {
        if let Some(executor) = resolver(table) {
            tracing::debug!("Resolved '{}' via custom resolver", table);
            return Ok(executor);
        }
    }

    if let Some(registry) = &config.registry {
        for bank in banks {
            match registry.get_adapter(bank) {
                Ok(executor) => {
                    tracing::debug!("Resolved '{}' via bank hint '{}'", table, bank);
                    return Ok(executor);
                }
                Err(e) => tracing::debug!("Skipping bank hint '{}': {}", bank, e),
            }
        }

        if let Some(db) = config.database_for(table) {
            if let Ok(executor) = registry.get_adapter(db) {
                tracing::debug!("Resolved '{}' via table map -> '{}'", table, db);
                return Ok(executor);
            }
        }

        if let Some(db) = &config.default_database {
            if let Ok(executor) = registry.get_adapter(db) {
                tracing::debug!("Resolved '{}' via default database '{}'", table, db);
                return Ok(executor);
            }
        }
    }

    if let Some(executor) = &config.default_executor {
        return Ok(executor.clone());
    }

    Err(BankError::config(format!(
        "no executor configured for table '{}'. Set a default executor, a resolver or a database registry",
        table
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{ExecOutput, Executor};
    use crate::registry::MultiDatabase;
    use crate::value::Value;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Noop;

    #[async_trait]
    impl Executor for Noop {
        async fn execute_query(&self, _sql: &str, _b: &[Value]) -> BankResult<ExecOutput> {
            Ok(ExecOutput::default())
        }
    }

    struct Fixture {
        main: SharedExecutor,
        audit: SharedExecutor,
        replica: SharedExecutor,
        fallback: SharedExecutor,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                main: Arc::new(Noop),
                audit: Arc::new(Noop),
                replica: Arc::new(Noop),
                fallback: Arc::new(Noop),
            }
        }

        fn config(&self) -> crate::config::ConfigBuilder {
            let registry = MultiDatabase::new()
                .with("main", self.main.clone())
                .with("audit", self.audit.clone())
                .with("replica", self.replica.clone());
            Config::builder()
                .registry(Arc::new(registry))
                .table("audit_log", "audit")
                .default_database("main")
                .executor(self.fallback.clone())
        }
    }

    #[test]
    fn test_resolver_wins() {
        let f = Fixture::new();
        let custom: SharedExecutor = Arc::new(Noop);
        let handle = custom.clone();
        let cfg = f.config().resolver(move |_| Some(handle.clone())).build();
        let e = resolve_executor(&cfg, "audit_log", &["replica".into()]).unwrap();
        assert!(Arc::ptr_eq(&e, &custom));
    }

    #[test]
    fn test_resolver_none_falls_through() {
        let f = Fixture::new();
        let cfg = f.config().resolver(|_| None).build();
        let e = resolve_executor(&cfg, "users", &[]).unwrap();
        assert!(Arc::ptr_eq(&e, &f.main));
    }

    #[test]
    fn test_bank_hint_beats_table_map() {
        let f = Fixture::new();
        let cfg = f.config().build();
        let hints = vec!["missing".to_string(), "replica".to_string()];
        let e = resolve_executor(&cfg, "audit_log", &hints).unwrap();
        assert!(Arc::ptr_eq(&e, &f.replica));
    }

    #[test]
    fn test_table_map_then_default_database() {
        let f = Fixture::new();
        let cfg = f.config().build();
        let audit = resolve_executor(&cfg, "audit_log", &[]).unwrap();
        assert!(Arc::ptr_eq(&audit, &f.audit));
        let users = resolve_executor(&cfg, "users", &[]).unwrap();
        assert!(Arc::ptr_eq(&users, &f.main));
    }

    #[test]
    fn test_default_executor_last() {
        let f = Fixture::new();
        let cfg = Config::builder().executor(f.fallback.clone()).build();
        let e = resolve_executor(&cfg, "users", &[]).unwrap();
        assert!(Arc::ptr_eq(&e, &f.fallback));
    }

    #[test]
    fn test_nothing_configured() {
        let err = resolve_executor(&Config::default(), "users", &[]).err().unwrap();
        assert!(matches!(err, BankError::Config(_)));
    }
}
