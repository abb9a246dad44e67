use std::collections::BTreeMap;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::value::{MODEL_KEY, Value};

/// Binding name under which the whole current record is exposed.
pub const SELF_BINDING: &str = "__self__";

/// Inbound action request, as delivered by the transport layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    /// Comma separated list of action names to execute.
    #[serde(default)]
    pub action: Option<String>,
    /// Entity type of the record the action operates on.
    #[serde(default)]
    pub model: Option<String>,
    /// Current record values.
    #[serde(default)]
    pub data: Option<BTreeMap<String, Value>>,
}

impl ActionRequest {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: Some(action.into()),
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_data(mut self, data: BTreeMap<String, Value>) -> Self {
        self.data = Some(data);
        self
    }
}

/// Record data an expression operates against. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionContext {
    model: Option<String>,
    fields: BTreeMap<String, Value>,
}

impl ActionContext {
    pub fn new(model: Option<String>, fields: BTreeMap<String, Value>) -> Self {
        Self { model, fields }
    }

    pub fn from_request(request: &ActionRequest) -> Self {
        match &request.data {
            Some(data) => Self::new(request.model.clone(), data.clone()),
            None => {
                debug!("null context for action: {:?}", request.action);
                Self::new(request.model.clone(), BTreeMap::new())
            }
        }
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// The record as a map value, tagged with its model.
    pub fn to_value(&self) -> Value {
        let mut map = self.fields.clone();
        if let Some(model) = &self.model {
            map.insert(MODEL_KEY.to_string(), Value::String(model.clone()));
        }
        Value::Map(map)
    }
}

/// Identifier to value scope visible to scripts and the formatter.
///
/// Owned by a single handler. Interior mutability lets the owner hand out
/// shared references across await points while still injecting helpers.
#[derive(Debug, Default)]
pub struct Bindings {
    values: DashMap<String, Value>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_context(context: &ActionContext) -> Self {
        let bindings = Self::new();
        for (name, value) in context.fields() {
            bindings.insert(name.clone(), value.clone());
        }
        if let Some(model) = context.model() {
            bindings.insert(MODEL_KEY, Value::String(model.to_string()));
        }
        bindings.insert(SELF_BINDING, context.to_value());
        bindings
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.values.get(name).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn insert(&self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.values.insert(name.into(), value)
    }

    pub fn remove(&self, name: &str) -> Option<Value> {
        self.values.remove(name).map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Ordered copy of every binding.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.values
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

impl Clone for Bindings {
    fn clone(&self) -> Self {
        let bindings = Self::new();
        for (name, value) in self.snapshot() {
            bindings.insert(name, value);
        }
        bindings
    }
}
