use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use strum::IntoStaticStr;
use thiserror::Error;
use tracing::debug;

use crate::context::ActionRequest;
use crate::response::ActionResponse;
use crate::script::{ScriptError, ScriptObject, ScriptResult};
use crate::value::Value;

#[derive(Error, Debug, Clone, PartialEq, IntoStaticStr)]
pub enum ControllerError {
    #[error("Controller not found: {0}")]
    NotFound(String),
    #[error("Method not found: {controller}.{method}")]
    MethodNotFound { controller: String, method: String },
    #[error("Controller failed: {0}")]
    Failed(String),
}

impl ControllerError {
    pub fn kind(&self) -> &'static str {
        self.into()
    }
}

pub type ControllerResult<T> = Result<T, ControllerError>;

/// Target of `call:` expressions and rpc-style invocations.
#[async_trait]
pub trait Controller: Send + Sync {
    fn name(&self) -> &str;

    /// Request-in, response-out invocation of `method`.
    async fn handle(
        &self,
        method: &str,
        request: &ActionRequest,
        response: &mut ActionResponse,
    ) -> ControllerResult<()>;

    /// Invocation with already evaluated arguments.
    async fn call(&self, method: &str, _args: Vec<Value>) -> ControllerResult<Value> {
        Err(ControllerError::MethodNotFound {
            controller: self.name().to_string(),
            method: method.to_string(),
        })
    }
}

/// Identifier to controller map, filled at startup.
#[derive(Default)]
pub struct ControllerRegistry {
    controllers: DashMap<String, Arc<dyn Controller>>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `controller` under its own name.
    pub fn register(&self, controller: Arc<dyn Controller>) {
        let name = controller.name().to_string();
        self.register_as(name, controller);
    }

    pub fn register_as(&self, identifier: impl Into<String>, controller: Arc<dyn Controller>) {
        let identifier = identifier.into();
        debug!("register controller: {}", identifier);
        self.controllers.insert(identifier, controller);
    }

    pub fn get(&self, identifier: &str) -> Option<Arc<dyn Controller>> {
        self.controllers
            .get(identifier)
            .map(|entry| entry.value().clone())
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.controllers.contains_key(identifier)
    }

    pub fn identifiers(&self) -> Vec<String> {
        let mut identifiers: Vec<String> = self
            .controllers
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        identifiers.sort();
        identifiers
    }
}

type HandleFn =
    Arc<dyn Fn(&ActionRequest, &mut ActionResponse) -> ControllerResult<()> + Send + Sync>;
type CallFn = Arc<dyn Fn(Vec<Value>) -> ControllerResult<Value> + Send + Sync>;

/// Controller assembled from named closures.
///
/// ```
/// use actiondesk_core::controller::FnController;
///
/// let greeter = FnController::new("greeter").on("sayHello", |_, response| {
///     response.set_data("hi");
///     Ok(())
/// });
/// ```
pub struct FnController {
    name: String,
    handlers: HashMap<String, HandleFn>,
    calls: HashMap<String, CallFn>,
}

impl FnController {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handlers: HashMap::new(),
            calls: HashMap::new(),
        }
    }

    pub fn on<F>(mut self, method: &str, handler: F) -> Self
    where
        F: Fn(&ActionRequest, &mut ActionResponse) -> ControllerResult<()> + Send + Sync + 'static,
    {
        self.handlers.insert(method.to_string(), Arc::new(handler));
        self
    }

    pub fn on_call<F>(mut self, method: &str, call: F) -> Self
    where
        F: Fn(Vec<Value>) -> ControllerResult<Value> + Send + Sync + 'static,
    {
        self.calls.insert(method.to_string(), Arc::new(call));
        self
    }

    fn method_not_found(&self, method: &str) -> ControllerError {
        ControllerError::MethodNotFound {
            controller: self.name.clone(),
            method: method.to_string(),
        }
    }
}

#[async_trait]
impl Controller for FnController {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(
        &self,
        method: &str,
        request: &ActionRequest,
        response: &mut ActionResponse,
    ) -> ControllerResult<()> {
        match self.handlers.get(method) {
            Some(handler) => handler(request, response),
            None => Err(self.method_not_found(method)),
        }
    }

    async fn call(&self, method: &str, args: Vec<Value>) -> ControllerResult<Value> {
        match self.calls.get(method) {
            Some(call) => call(args),
            None => Err(self.method_not_found(method)),
        }
    }
}

/// Exposes a controller's rpc methods to the script evaluator.
pub struct ControllerObject {
    controller: Arc<dyn Controller>,
}

impl ControllerObject {
    pub fn new(controller: Arc<dyn Controller>) -> Self {
        Self { controller }
    }
}

#[async_trait]
impl ScriptObject for ControllerObject {
    async fn call_method(&self, method: &str, args: Vec<Value>) -> ScriptResult<Value> {
        self.controller
            .call(method, args)
            .await
            .map_err(|e| ScriptError::Host(e.to_string()))
    }
}
