//! Configuration context.
//!
//! Every resolution decision takes a [`Config`] explicitly, so independent
//! configurations can live side by side in one process.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::dialect::Dialect;
use crate::driver::SqlxExecutor;
use crate::error::{BankError, BankResult};
use crate::executor::SharedExecutor;
use crate::registry::{DatabaseRegistry, MultiDatabase};

/// Default lifecycle-event namespace.
pub const DEFAULT_NAMESPACE: &str = "bankql";

/// Caller-supplied per-table executor lookup. `None` falls through to the
/// remaining resolution steps.
pub type Resolver = Arc<dyn Fn(&str) -> Option<SharedExecutor> + Send + Sync>;

/// Runtime configuration.
#[derive(Clone)]
pub struct Config {
    /// Prefix of every lifecycle topic.
    pub namespace: String,
    /// Executor used when nothing more specific resolves.
    pub default_executor: Option<SharedExecutor>,
    /// Registry name used when no table mapping applies.
    pub default_database: Option<String>,
    /// Static table to database-name map.
    pub tables: HashMap<String, String>,
    /// Highest-precedence per-table resolver.
    pub resolver: Option<Resolver>,
    /// Named executors.
    pub registry: Option<Arc<dyn DatabaseRegistry>>,
    /// Dialect hint for executors that do not report their own.
    pub dialect: Option<Dialect>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            default_executor: None,
            default_database: None,
            tables: HashMap::new(),
            resolver: None,
            registry: None,
            dialect: None,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("namespace", &self.namespace)
            .field("default_executor", &self.default_executor.is_some())
            .field("default_database", &self.default_database)
            .field("tables", &self.tables)
            .field("resolver", &self.resolver.is_some())
            .field("registry", &self.registry.is_some())
            .field("dialect", &self.dialect)
            .finish()
    }
}

impl Config {
    /// Create a new configuration builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Database name mapped to `table`, if any.
    pub fn database_for(&self, table: &str) -> Option<&str> {
        self.tables.get(table).map(String::as_str)
    }
}

/// Builder for [`Config`].
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the lifecycle-event namespace.
    pub fn namespace(mut self, ns: impl Into<String>) -> Self {
        self.config.namespace = ns.into();
        self
    }

    /// Set the fallback executor.
    pub fn executor(mut self, executor: SharedExecutor) -> Self {
        self.config.default_executor = Some(executor);
        self
    }

    /// Set the default database name in the registry.
    pub fn default_database(mut self, name: impl Into<String>) -> Self {
        self.config.default_database = Some(name.into());
        self
    }

    /// Route `table` to the registry database `database`.
    pub fn table(mut self, table: impl Into<String>, database: impl Into<String>) -> Self {
        self.config.tables.insert(table.into(), database.into());
        self
    }

    /// Install a per-table resolver.
    pub fn resolver<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Option<SharedExecutor> + Send + Sync + 'static,
    {
        self.config.resolver = Some(Arc::new(f));
        self
    }

    /// Install the multi-database registry.
    pub fn registry(mut self, registry: Arc<dyn DatabaseRegistry>) -> Self {
        self.config.registry = Some(registry);
        self
    }

    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.config.dialect = Some(dialect);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Config {
        self.config
    }
}

/// On-disk configuration (TOML).
///
/// ```toml
/// namespace = "app"
/// default_database = "main"
/// dialect = "sqlite"
///
/// [databases]
/// main = "sqlite://app.db"
/// audit = "postgres://localhost/audit"
///
/// [tables]
/// audit_log = "audit"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    pub namespace: Option<String>,
    pub default_database: Option<String>,
    pub dialect: Option<Dialect>,
    #[serde(default)]
    pub databases: HashMap<String, String>,
    #[serde(default)]
    pub tables: HashMap<String, String>,
}

impl ConfigFile {
    /// Parse a TOML document.
    pub fn parse(text: &str) -> BankResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> BankResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// `<config_dir>/bankql/config.toml`, if a config dir exists on this platform.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("bankql").join("config.toml"))
    }

    /// Config without any connections, for compile-only use.
    pub fn to_config(&self) -> Config {
        Config {
            namespace: self
                .namespace
                .clone()
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            default_database: self.default_database.clone(),
            tables: self.tables.clone(),
            dialect: self.dialect,
            ..Config::default()
        }
    }

    /// Connect every configured database and return a ready [`Config`].
    pub async fn connect(&self) -> BankResult<Config> {
        if let Some(name) = &self.default_database {
            if !self.databases.contains_key(name) {
                return Err(BankError::config(format!(
                    "default_database '{}' is not listed under [databases]",
                    name
                )));
            }
        }

        let registry = MultiDatabase::new();
        for (name, url) in &self.databases {
            tracing::debug!("Connecting database '{}'", name);
            let executor = SqlxExecutor::connect(url).await?;
            registry.add(name.clone(), Arc::new(executor));
        }

        let mut config = self.to_config();
        config.registry = Some(registry.into_shared());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let cfg = Config::builder().table("users", "main").build();
        assert_eq!(cfg.namespace, DEFAULT_NAMESPACE);
        assert_eq!(cfg.database_for("users"), Some("main"));
        assert_eq!(cfg.database_for("orders"), None);
    }

    #[test]
    fn test_parse_config_file() {
        let file = ConfigFile::parse(
            r#"
            namespace = "app"
            default_database = "main"
            dialect = "postgres"

            [databases]
            main = "postgres://localhost/app"

            [tables]
            audit = "main"
            "#,
        )
        .unwrap();
        assert_eq!(file.dialect, Some(Dialect::Postgres));
        let cfg = file.to_config();
        assert_eq!(cfg.namespace, "app");
        assert_eq!(cfg.default_database.as_deref(), Some("main"));
        assert_eq!(cfg.database_for("audit"), Some("main"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "namespace = \"ops\"\n[tables]\nlogs = \"archive\"\n").unwrap();

        let file = ConfigFile::load(&path).unwrap();
        assert_eq!(file.namespace.as_deref(), Some("ops"));
        assert_eq!(file.to_config().database_for("logs"), Some("archive"));
        assert!(matches!(
            ConfigFile::load(dir.path().join("missing.toml")),
            Err(BankError::Io(_))
        ));
    }

    #[test]
    fn test_parse_rejects_bad_dialect() {
        assert!(ConfigFile::parse("dialect = \"foxpro\"").is_err());
    }

    #[tokio::test]
    async fn test_connect_rejects_unknown_default() {
        let file = ConfigFile {
            default_database: Some("ghost".into()),
            ..ConfigFile::default()
        };
        assert!(matches!(file.connect().await, Err(BankError::Config(_))));
    }
}
