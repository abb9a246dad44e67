use std::collections::HashMap;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Mapping metadata of one entity field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    #[serde(default)]
    pub name: String,
    /// Entity type referenced by a relational field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Selection whose titles label the stored codes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<String>,
}

impl Property {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_selection(mut self, selection: impl Into<String>) -> Self {
        self.selection = Some(selection.into());
        self
    }
}

pub trait EntityMapper: Send + Sync {
    fn property(&self, model: &str, field: &str) -> Option<Property>;
}

#[derive(Debug, Default)]
pub struct MemoryMapper {
    models: DashMap<String, HashMap<String, Property>>,
}

impl MemoryMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a mapper from `model -> field -> property` tables. Property names
    /// left empty take the field name.
    pub fn from_models(models: HashMap<String, HashMap<String, Property>>) -> Self {
        let mapper = Self::new();
        for (model, fields) in models {
            for (field, property) in fields {
                mapper.register(&model, &field, property);
            }
        }
        mapper
    }

    pub fn register(&self, model: &str, field: &str, mut property: Property) {
        if property.name.is_empty() {
            property.name = field.to_string();
        }
        self.models
            .entry(model.to_string())
            .or_default()
            .insert(field.to_string(), property);
    }
}

impl EntityMapper for MemoryMapper {
    fn property(&self, model: &str, field: &str) -> Option<Property> {
        self.models
            .get(model)
            .and_then(|fields| fields.get(field).cloned())
    }
}
