use std::collections::HashMap;

use dashmap::DashMap;

/// Source of display titles for selection codes.
pub trait SelectionCatalog: Send + Sync {
    fn lookup_title(&self, selection: &str, code: &str) -> Option<String>;
}

#[derive(Debug, Default)]
pub struct MemoryCatalog {
    selections: DashMap<String, HashMap<String, String>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_selections(selections: HashMap<String, HashMap<String, String>>) -> Self {
        Self {
            selections: selections.into_iter().collect(),
        }
    }

    pub fn register(&self, selection: &str, code: &str, title: &str) {
        self.selections
            .entry(selection.to_string())
            .or_default()
            .insert(code.to_string(), title.to_string());
    }
}

impl SelectionCatalog for MemoryCatalog {
    fn lookup_title(&self, selection: &str, code: &str) -> Option<String> {
        self.selections
            .get(selection)
            .and_then(|items| items.get(code).cloned())
    }
}
