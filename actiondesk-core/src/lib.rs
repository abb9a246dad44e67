//! # actiondesk: action expression dispatcher
//!
//! Business application metadata attaches short prefixed expressions to buttons,
//! fields and forms. This crate evaluates them server side, one
//! [`handler::ActionHandler`] per request:
//!
//! ```text
//! eval: <script>            script against the record bindings
//! action: <name>            stored action definition (recursive)
//! call: <controller>:<m>    controller method, request-in / response-out
//! select: <query>           first row of an entity query
//! select[]: <query>         all rows of an entity query
//! ```
//!
//! ## Layout
//!
//! - Grammar: [`expression`]
//! - Dispatch and chains: [`handler`], [`action`]
//! - Controllers: [`controller`]
//! - Queries: [`query`] with the in-memory [`store`]
//! - Templates: [`template`] and the field formatter in [`format`]
//! - Scripts: [`script`], the evaluation seam plus a small built-in engine
//! - Wiring: [`services`], [`config`]
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use actiondesk_core::{ActionHandler, ActionRequest, ActionServices};
//!
//! # async fn run() -> actiondesk_core::EvalResult<()> {
//! let services = Arc::new(ActionServices::new());
//! let handler = ActionHandler::for_request(services, ActionRequest::new("save"));
//! let result = handler.evaluate("eval: 1 + 2").await?;
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod config;
pub mod context;
pub mod controller;
pub mod error;
pub mod expression;
pub mod format;
pub mod handler;
pub mod mapper;
pub mod query;
pub mod response;
pub mod script;
pub mod selection;
pub mod services;
pub mod store;
pub mod template;
pub mod value;

// Re-exports
pub use action::{ActionDefinition, ActionGroup, ActionStore, MemoryActionStore};
pub use context::{ActionContext, ActionRequest, Bindings};
pub use controller::{Controller, ControllerError, ControllerRegistry, FnController};
pub use error::*;
pub use expression::{Expression, ExpressionKind};
pub use handler::ActionHandler;
pub use response::{ActionResponse, ActionResult, ResponseStatus};
pub use services::ActionServices;
pub use template::TemplateKind;
pub use value::{QueryValue, Value};
