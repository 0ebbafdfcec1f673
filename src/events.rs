//! Lifecycle event bus.
//!
//! Topics are plain strings. The query layer publishes
//! `<ns>:trigger:<TIMING>:<ACTION>:<table>` around every statement and the
//! trigger engine subscribes to them. Listeners of one topic run one after
//! another in registration order; the first failure aborts the emit and is
//! returned to the publisher.

use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value as Json;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::error::{BankError, BankResult};
use crate::executor::WriteResult;
use crate::query::WhereFragment;
use crate::value::Row;

/// Statement kind a lifecycle event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Insert,
    Update,
    Delete,
    Read,
}

impl Action {
    /// The full set `'*'` expands to.
    pub const ALL: [Action; 4] = [Action::Insert, Action::Update, Action::Delete, Action::Read];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Insert => "INSERT",
            Action::Update => "UPDATE",
            Action::Delete => "DELETE",
            Action::Read => "READ",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Action {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "INSERT" => Ok(Action::Insert),
            "UPDATE" => Ok(Action::Update),
            "DELETE" => Ok(Action::Delete),
            "READ" | "SELECT" => Ok(Action::Read),
            other => Err(BankError::UnsupportedAction(other.to_string())),
        }
    }
}

/// Whether an event fires before or after the executor call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Timing {
    Before,
    After,
}

impl Timing {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timing::Before => "BEFORE",
            Timing::After => "AFTER",
        }
    }
}

impl std::fmt::Display for Timing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Build a lifecycle topic name.
pub fn topic(ns: &str, timing: Timing, action: Action, table: &str) -> String {
    format!("{}:trigger:{}:{}:{}", ns, timing, action, table)
}

/// Payload of a lifecycle event; also the context handed to trigger callables.
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleEvent {
    pub table: String,
    pub action: Action,
    pub timing: Timing,
    /// Rows being inserted, or the patch of an update.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Json>,
    /// Compiled WHERE fragment of an update or delete.
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub where_: Option<WhereFragment>,
    /// Rows fetched by a read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<Row>>,
    /// Normalized write outcome, on AFTER events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<WriteResult>,
    /// Set when published from a blocking read; SQL steps then use the
    /// executor's synchronous capability.
    #[serde(skip)]
    pub(crate) blocking: bool,
}

impl LifecycleEvent {
    pub fn new(table: impl Into<String>, action: Action, timing: Timing) -> Self {
        Self {
            table: table.into(),
            action,
            timing,
            data: None,
            where_: None,
            rows: None,
            result: None,
            blocking: false,
        }
    }

    pub fn with_data(mut self, data: Json) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_where(mut self, fragment: WhereFragment) -> Self {
        self.where_ = Some(fragment);
        self
    }

    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.rows = Some(rows);
        self
    }

    pub fn with_result(mut self, result: WriteResult) -> Self {
        self.result = Some(result);
        self
    }
}

/// An async event handler.
pub type Listener = Arc<dyn Fn(LifecycleEvent) -> BoxFuture<'static, BankResult<()>> + Send + Sync>;

/// Handle returned by [`EventBus::on`], used to unsubscribe.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    topic: String,
    id: u64,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

/// Externally supplied bus that observes every emitted event.
pub trait EventDelegate: Send + Sync {
    fn emit(&self, topic: &str, event: &LifecycleEvent);
}

/// Process-local publish/subscribe keyed by topic.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<HashMap<String, Vec<(u64, Listener)>>>,
    next_id: AtomicU64,
    delegate: Option<Arc<dyn EventDelegate>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forward every emitted event to `delegate` after local listeners ran.
    pub fn with_delegate(mut self, delegate: Arc<dyn EventDelegate>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    /// Subscribe `listener` to `topic`.
    pub fn on(&self, topic: impl Into<String>, listener: Listener) -> Subscription {
        let topic = topic.into();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut map) = self.listeners.write() {
            map.entry(topic.clone()).or_default().push((id, listener));
        }
        Subscription { topic, id }
    }

    /// Remove a subscription. Returns whether it was still registered.
    pub fn off(&self, sub: &Subscription) -> bool {
        let Ok(mut map) = self.listeners.write() else {
            return false;
        };
        let Some(list) = map.get_mut(&sub.topic) else {
            return false;
        };
        let before = list.len();
        list.retain(|(id, _)| *id != sub.id);
        let removed = list.len() != before;
        if list.is_empty() {
            map.remove(&sub.topic);
        }
        removed
    }

    pub fn listener_count(&self, topic: &str) -> usize {
        self.listeners
            .read()
            .map(|m| m.get(topic).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    /// Run listeners of `topic` in order until one fails, then notify the
    /// delegate and return the first failure.
    pub async fn emit(&self, topic: &str, event: LifecycleEvent) -> BankResult<()> {
        // Snapshot so listeners may subscribe or unsubscribe while running.
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .map(|m| {
                m.get(topic)
                    .map(|l| l.iter().map(|(_, f)| f.clone()).collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default();

        tracing::debug!("emit {} ({} listeners)", topic, listeners.len());
        let mut outcome = Ok(());
        for listener in listeners {
            if let Err(e) = listener(event.clone()).await {
                outcome = Err(e);
                break;
            }
        }

        // The delegate observes every event, including ones a listener rejected.
        if let Some(delegate) = &self.delegate {
            delegate.emit(topic, &event);
        }
        outcome
    }

    /// Blocking [`emit`](Self::emit) for synchronous read paths.
    pub fn emit_blocking(&self, topic: &str, mut event: LifecycleEvent) -> BankResult<()> {
        event.blocking = true;
        futures::executor::block_on(self.emit(topic, event))
    }
}

/// Wrap an async closure as a [`Listener`].
pub fn listener<F, Fut>(f: F) -> Listener
where
    F: Fn(LifecycleEvent) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = BankResult<()>> + Send + 'static,
{
    Arc::new(move |event| Box::pin(f(event)))
}
