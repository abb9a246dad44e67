use std::sync::Arc;

use crate::action::{ActionStore, MemoryActionStore};
use crate::config::{AppDefinition, DispatcherConfig};
use crate::controller::ControllerRegistry;
use crate::mapper::{EntityMapper, MemoryMapper};
use crate::query::QueryEngine;
use crate::script::{ScriptEvaluator, SimpleScriptEngine};
use crate::selection::{MemoryCatalog, SelectionCatalog};
use crate::store::MemoryRecordStore;
use crate::template::{ScriptTemplateEngine, TemplateEngine};

/// Shared, read-mostly collaborators of every [`crate::handler::ActionHandler`].
pub struct ActionServices {
    pub config: DispatcherConfig,
    pub actions: Arc<dyn ActionStore>,
    pub controllers: Arc<ControllerRegistry>,
    pub script: Arc<dyn ScriptEvaluator>,
    pub templates: Arc<dyn TemplateEngine>,
    pub queries: Arc<dyn QueryEngine>,
    pub mapper: Arc<dyn EntityMapper>,
    pub selections: Arc<dyn SelectionCatalog>,
}

impl Default for ActionServices {
    fn default() -> Self {
        let script: Arc<dyn ScriptEvaluator> = Arc::new(SimpleScriptEngine::new());
        Self {
            config: DispatcherConfig::default(),
            actions: Arc::new(MemoryActionStore::new()),
            controllers: Arc::new(ControllerRegistry::new()),
            templates: Arc::new(ScriptTemplateEngine::new(script.clone())),
            script,
            queries: Arc::new(MemoryRecordStore::new()),
            mapper: Arc::new(MemoryMapper::new()),
            selections: Arc::new(MemoryCatalog::new()),
        }
    }
}

impl ActionServices {
    pub fn new() -> Self {
        Self::default()
    }

    /// In-memory services populated from an application definition.
    pub fn from_app(app: AppDefinition) -> Self {
        Self::new()
            .with_config(app.config)
            .with_actions(Arc::new(MemoryActionStore::from_definitions(app.actions)))
            .with_mapper(Arc::new(MemoryMapper::from_models(app.models)))
            .with_selections(Arc::new(MemoryCatalog::from_selections(app.selections)))
            .with_queries(Arc::new(MemoryRecordStore::from_records(app.records)))
    }

    pub fn with_config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_actions(mut self, actions: Arc<dyn ActionStore>) -> Self {
        self.actions = actions;
        self
    }

    pub fn with_controllers(mut self, controllers: Arc<ControllerRegistry>) -> Self {
        self.controllers = controllers;
        self
    }

    /// Replaces the script evaluator; the template engine is rebuilt on top of it.
    pub fn with_script(mut self, script: Arc<dyn ScriptEvaluator>) -> Self {
        self.templates = Arc::new(ScriptTemplateEngine::new(script.clone()));
        self.script = script;
        self
    }

    pub fn with_templates(mut self, templates: Arc<dyn TemplateEngine>) -> Self {
        self.templates = templates;
        self
    }

    pub fn with_queries(mut self, queries: Arc<dyn QueryEngine>) -> Self {
        self.queries = queries;
        self
    }

    pub fn with_mapper(mut self, mapper: Arc<dyn EntityMapper>) -> Self {
        self.mapper = mapper;
        self
    }

    pub fn with_selections(mut self, selections: Arc<dyn SelectionCatalog>) -> Self {
        self.selections = selections;
        self
    }
}
