//! Trigger registration and teardown.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::config::Config;
use crate::error::BankResult;
use crate::events::{listener, topic, Action, EventBus, Subscription, Timing};
use crate::executor::SharedExecutor;
use crate::resolve::resolve_executor;
use crate::trigger::{Body, SqlRunner, StateMode, TriggerDef};

/// A native trigger created in a database.
#[derive(Debug, Clone)]
struct NativeTrigger {
    name: String,
    table: String,
    banks: Vec<String>,
}

/// Everything one named trigger owns. The two handle kinds are torn down
/// independently.
#[derive(Debug, Default)]
struct Registration {
    native: Vec<NativeTrigger>,
    listeners: Vec<Subscription>,
}

/// Registered triggers split by how they are realised.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TriggerListing {
    /// Native trigger names created in databases.
    pub bank_triggers: Vec<String>,
    /// Registration names with at least one in-process listener.
    pub state_triggers: Vec<String>,
}

/// Registers trigger bodies against lifecycle events.
pub struct TriggerEngine {
    pub(crate) config: Arc<Config>,
    bus: Arc<EventBus>,
    registry: Mutex<BTreeMap<String, Registration>>,
}

impl TriggerEngine {
    pub fn new(config: Arc<Config>, bus: Arc<EventBus>) -> Self {
        Self {
            config,
            bus,
            registry: Mutex::new(BTreeMap::new()),
        }
    }

    /// Register `def`, replacing any trigger already using its name.
    ///
    /// Each expanded (action, table) pair gets a native trigger when the
    /// definition is in bank mode, the action is not READ and the body has
    /// SQL. Whatever is not covered natively runs as a bus listener. If a
    /// native trigger fails to create, everything made so far is removed.
    pub async fn create(&self, def: TriggerDef) -> BankResult<()> {
        def.validate()?;
        let actions = def.expand_actions()?;
        self.drop_async(&def.name).await;

        let sql = joined_sql(&def.body);
        let runner = SqlRunner::new(self.config.clone(), def.banks.clone());
        let mut registration = Registration::default();

        for action in &actions {
            for table in &def.tables {
                let native = def.state == StateMode::Bank && *action != Action::Read && !sql.is_empty();
                if native {
                    let name = native_name(&def.name, def.timing, *action, table);
                    let statement = format!(
                        "CREATE TRIGGER IF NOT EXISTS {} {} {} ON {} FOR EACH ROW BEGIN {}; END",
                        name, def.timing, action, table, sql
                    );
                    if let Err(e) = self.create_native(table, &def.banks, &statement).await {
                        self.teardown(registration).await;
                        return Err(e);
                    }
                    registration.native.push(NativeTrigger {
                        name,
                        table: table.clone(),
                        banks: def.banks.clone(),
                    });
                }

                let in_process = if native {
                    def.body.without_sql()
                } else {
                    Some(def.body.clone())
                };
                if let Some(body) = in_process {
                    let topic = topic(&self.config.namespace, def.timing, *action, table);
                    registration
                        .listeners
                        .push(self.attach(topic, body, runner.clone()));
                }
            }
        }

        tracing::info!(
            "Registered trigger '{}' ({} native, {} listeners)",
            def.name,
            registration.native.len(),
            registration.listeners.len()
        );
        let keep: Vec<String> = registration.native.iter().map(|n| n.name.clone()).collect();
        let replaced = self
            .registry
            .lock()
            .ok()
            .and_then(|mut registry| registry.insert(def.name, registration));
        // A create of the same name that finished while this one awaited.
        if let Some(old) = replaced {
            self.retire(old, &keep).await;
        }
        Ok(())
    }

    /// Tear down a superseded registration. Native triggers also owned by
    /// its replacement share their names and stay in place.
    async fn retire(&self, mut old: Registration, keep: &[String]) {
        old.native.retain(|n| !keep.contains(&n.name));
        self.teardown(old).await;
    }

    fn attach(&self, topic: String, body: Body, runner: SqlRunner) -> Subscription {
        let body = Arc::new(body);
        self.bus.on(
            topic,
            listener(move |event| {
                let body = body.clone();
                let runner = runner.clone();
                async move { body.run(&event, &runner).await }
            }),
        )
    }

    async fn create_native(&self, table: &str, banks: &[String], statement: &str) -> BankResult<()> {
        let executor = resolve_executor(&self.config, table, banks)?;
        tracing::debug!("{}", statement);
        executor.execute_query(statement, &[]).await?;
        Ok(())
    }

    fn take(&self, name: &str) -> Option<Registration> {
        self.registry.lock().ok().and_then(|mut r| r.remove(name))
    }

    fn unsubscribe(&self, registration: &Registration) {
        for sub in &registration.listeners {
            if !self.bus.off(sub) {
                tracing::warn!("Listener on '{}' was already removed", sub.topic());
            }
        }
    }

    fn native_executor(&self, native: &NativeTrigger) -> Option<SharedExecutor> {
        match resolve_executor(&self.config, &native.table, &native.banks) {
            Ok(executor) => Some(executor),
            Err(e) => {
                tracing::warn!("Cannot drop trigger '{}': {}", native.name, e);
                None
            }
        }
    }

    async fn teardown(&self, registration: Registration) {
        self.unsubscribe(&registration);
        for native in &registration.native {
            let Some(executor) = self.native_executor(native) else {
                continue;
            };
            let sql = format!("DROP TRIGGER IF EXISTS {}", native.name);
            if let Err(e) = executor.execute_query(&sql, &[]).await {
                tracing::warn!("Failed to drop trigger '{}': {}", native.name, e);
            }
        }
    }

    /// Remove a trigger without awaiting.
    ///
    /// Native triggers are dropped through the executor's synchronous
    /// capability when it has one; otherwise the drop is spawned on the
    /// current tokio runtime. Failures are logged and skipped.
    pub fn drop(&self, name: &str) -> bool {
        let Some(registration) = self.take(name) else {
            return false;
        };
        self.unsubscribe(&registration);

        for native in registration.native {
            let Some(executor) = self.native_executor(&native) else {
                continue;
            };
            let sql = format!("DROP TRIGGER IF EXISTS {}", native.name);
            match executor.run_sync(&sql, &[]) {
                Some(Ok(_)) => {}
                Some(Err(e)) => tracing::warn!("Failed to drop trigger '{}': {}", native.name, e),
                None => match tokio::runtime::Handle::try_current() {
                    Ok(handle) => {
                        handle.spawn(async move {
                            if let Err(e) = executor.execute_query(&sql, &[]).await {
                                tracing::warn!("Failed to drop trigger '{}': {}", native.name, e);
                            }
                        });
                    }
                    Err(_) => tracing::warn!(
                        "Cannot drop trigger '{}': executor has no sync capability and no runtime is running",
                        native.name
                    ),
                },
            }
        }
        tracing::info!("Dropped trigger '{}'", name);
        true
    }

    /// Remove a trigger, awaiting every native drop. Failures are logged and skipped.
    pub async fn drop_async(&self, name: &str) -> bool {
        let Some(registration) = self.take(name) else {
            return false;
        };
        self.teardown(registration).await;
        tracing::info!("Dropped trigger '{}'", name);
        true
    }

    /// Remove every trigger. Returns how many were registered.
    pub async fn drop_all(&self) -> usize {
        let names = self.list();
        for name in &names {
            self.drop_async(name).await;
        }
        names.len()
    }

    /// Registered trigger names, sorted.
    pub fn list(&self) -> Vec<String> {
        self.registry
            .lock()
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn list_detailed(&self) -> TriggerListing {
        let Ok(registry) = self.registry.lock() else {
            return TriggerListing::default();
        };
        let mut listing = TriggerListing::default();
        for (name, registration) in registry.iter() {
            listing
                .bank_triggers
                .extend(registration.native.iter().map(|n| n.name.clone()));
            if !registration.listeners.is_empty() {
                listing.state_triggers.push(name.clone());
            }
        }
        listing
    }
}

impl std::fmt::Debug for TriggerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerEngine")
            .field("triggers", &self.list())
            .finish()
    }
}

/// SQL leaves trimmed, trailing semicolons stripped, joined with `"; "`.
fn joined_sql(body: &Body) -> String {
    body.sql_statements()
        .into_iter()
        .map(|s| s.trim().trim_end_matches(';').trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}

/// `<name>_<timing>_<action>_<table>`, lowercased, non-identifier chars as `_`.
fn native_name(name: &str, timing: Timing, action: Action, table: &str) -> String {
    format!("{}_{}_{}_{}", name, timing, action, table)
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}
