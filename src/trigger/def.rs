//! Declarative trigger definitions.

use crate::error::{BankError, BankResult};
use crate::events::{Action, Timing};
use crate::trigger::Body;

/// Where a trigger's SQL lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StateMode {
    /// SQL becomes a native database trigger; callables run in-process.
    #[default]
    Bank,
    /// Everything runs in-process as a bus listener.
    State,
}

/// A trigger to register with [`TriggerEngine::create`](crate::trigger::TriggerEngine::create).
#[derive(Debug, Clone)]
pub struct TriggerDef {
    pub name: String,
    pub timing: Timing,
    /// Action names; `"*"` means all four. Empty is treated as `"*"`.
    pub actions: Vec<String>,
    /// Action names removed after expansion; `"*"` allowed.
    pub except: Vec<String>,
    pub tables: Vec<String>,
    pub state: StateMode,
    pub body: Body,
    /// Bank hints used to resolve executors for this trigger's SQL.
    pub banks: Vec<String>,
}

impl TriggerDef {
    /// An AFTER trigger on every action, with no tables yet.
    pub fn new(name: impl Into<String>, body: impl Into<Body>) -> Self {
        Self {
            name: name.into(),
            timing: Timing::After,
            actions: Vec::new(),
            except: Vec::new(),
            tables: Vec::new(),
            state: StateMode::Bank,
            body: body.into(),
            banks: Vec::new(),
        }
    }

    pub fn before(mut self) -> Self {
        self.timing = Timing::Before;
        self
    }

    pub fn after(mut self) -> Self {
        self.timing = Timing::After;
        self
    }

    pub fn on(mut self, action: impl Into<String>) -> Self {
        self.actions.push(action.into());
        self
    }

    pub fn actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actions.extend(actions.into_iter().map(Into::into));
        self
    }

    pub fn except<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.except.extend(actions.into_iter().map(Into::into));
        self
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.tables.push(table.into());
        self
    }

    pub fn tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables.extend(tables.into_iter().map(Into::into));
        self
    }

    pub fn state(mut self, mode: StateMode) -> Self {
        self.state = mode;
        self
    }

    pub fn bank<I, S>(mut self, hints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.banks = hints.into_iter().map(Into::into).collect();
        self
    }

    /// Final action set, in INSERT, UPDATE, DELETE, READ order.
    pub fn expand_actions(&self) -> BankResult<Vec<Action>> {
        let wanted = if self.actions.is_empty() {
            Action::ALL.to_vec()
        } else {
            expand(&self.actions)?
        };
        let excluded = expand(&self.except)?;
        Ok(Action::ALL
            .into_iter()
            .filter(|a| wanted.contains(a) && !excluded.contains(a))
            .collect())
    }

    pub(crate) fn validate(&self) -> BankResult<()> {
        if self.name.trim().is_empty() {
            return Err(BankError::config("trigger name must not be empty"));
        }
        if self.tables.is_empty() {
            return Err(BankError::config(format!(
                "trigger '{}' has no tables",
                self.name
            )));
        }
        Ok(())
    }
}

fn expand(names: &[String]) -> BankResult<Vec<Action>> {
    let mut out = Vec::new();
    for name in names {
        if name.trim() == "*" {
            out.extend(Action::ALL);
        } else {
            out.push(name.parse()?);
        }
    }
    Ok(out)
}
