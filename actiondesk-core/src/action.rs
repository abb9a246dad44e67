//! Named action definitions and the chain executor.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EvalResult;
use crate::handler::ActionHandler;
use crate::response::ActionResult;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ActionDefinition {
    /// Controller method run request-in, response-out.
    Method { controller: String, method: String },
    /// Ordered list of other actions.
    Group { actions: Vec<String> },
    /// Any prefixed action expression.
    Expression { expression: String },
}

impl ActionDefinition {
    /// Evaluates the definition against `handler`; `depth` is the depth of the
    /// reference that resolved to this definition.
    pub async fn evaluate(&self, handler: &ActionHandler, depth: usize) -> EvalResult<ActionResult> {
        match self {
            ActionDefinition::Method { controller, method } => {
                Ok(ActionResult::Response(handler.call(controller, method).await))
            }
            ActionDefinition::Group { actions } => {
                ActionGroup::from_names(actions)
                    .evaluate(handler, depth)
                    .await
            }
            ActionDefinition::Expression { expression } => {
                handler.evaluate_at(expression, depth).await
            }
        }
    }
}

pub trait ActionStore: Send + Sync {
    fn lookup(&self, name: &str) -> Option<Arc<ActionDefinition>>;
}

#[derive(Debug, Default)]
pub struct MemoryActionStore {
    actions: DashMap<String, Arc<ActionDefinition>>,
}

impl MemoryActionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_definitions(definitions: HashMap<String, ActionDefinition>) -> Self {
        let store = Self::new();
        for (name, definition) in definitions {
            store.register(name, definition);
        }
        store
    }

    pub fn register(&self, name: impl Into<String>, definition: ActionDefinition) {
        self.actions.insert(name.into(), Arc::new(definition));
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl ActionStore for MemoryActionStore {
    fn lookup(&self, name: &str) -> Option<Arc<ActionDefinition>> {
        self.actions.get(name).map(|entry| entry.value().clone())
    }
}

/// Ordered action names evaluated one after another.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionGroup {
    actions: Vec<String>,
}

impl ActionGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Splits a comma separated list; blank names are skipped.
    pub fn parse(names: &str) -> Self {
        let mut group = Self::new();
        for name in names.split(',') {
            group.add_action(name);
        }
        group
    }

    pub fn from_names(names: &[String]) -> Self {
        let mut group = Self::new();
        for name in names {
            group.add_action(name);
        }
        group
    }

    pub fn add_action(&mut self, name: &str) {
        let name = name.trim();
        if !name.is_empty() {
            self.actions.push(name.to_string());
        }
    }

    pub fn actions(&self) -> &[String] {
        &self.actions
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Runs each action in order. The first response is returned as is; otherwise
    /// the step values are collected into a list.
    pub async fn evaluate(&self, handler: &ActionHandler, depth: usize) -> EvalResult<ActionResult> {
        let mut values = Vec::with_capacity(self.actions.len());
        for name in &self.actions {
            match handler.handle_action(name, depth + 1).await? {
                ActionResult::Response(response) => {
                    debug!("action {} returned a response, stopping chain", name);
                    return Ok(ActionResult::Response(response));
                }
                ActionResult::Value(value) => values.push(value),
            }
        }
        Ok(ActionResult::Value(Value::List(values)))
    }
}
