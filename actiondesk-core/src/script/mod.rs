//! Script evaluation seam.
//!
//! The dispatcher only talks to scripts through [`ScriptEvaluator`]. Calls on names
//! that are not bound in the scope (`__me__`, `__fmt__`, model names) and methods on
//! opaque values are routed back to the caller through [`ScriptHost`], so helper
//! objects never have to live inside the bindings themselves.

pub mod ast;
pub mod engine;
pub mod parser;

use async_trait::async_trait;
use strum::IntoStaticStr;
use thiserror::Error;

use crate::context::Bindings;
use crate::value::Value;

pub use engine::SimpleScriptEngine;

#[derive(Debug, Error, IntoStaticStr)]
pub enum ScriptError {
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Unknown name: {0}")]
    UnknownName(String),
    #[error("Unknown method: {target}.{method}")]
    UnknownMethod { target: String, method: String },
    #[error("Cannot access '{0}' on null")]
    NullReference(String),
    #[error("Type error: {0}")]
    Type(String),
    #[error("Host error: {0}")]
    Host(String),
    /// A nested action raised through a host call went past the depth limit.
    #[error("Cyclic action reference: {name} (depth {depth})")]
    CyclicAction { name: String, depth: usize },
}

pub type ScriptResult<T> = Result<T, ScriptError>;

/// Receiver of calls the script cannot resolve from its own scope.
#[async_trait]
pub trait ScriptHost: Send + Sync {
    /// `target.method(args)` where `target` is a dotted path of unbound names.
    async fn invoke_static(&self, target: &str, method: &str, args: Vec<Value>)
    -> ScriptResult<Value>;

    /// `receiver.method(args)` for methods the evaluator has no builtin for.
    async fn invoke_method(
        &self,
        receiver: &Value,
        method: &str,
        args: Vec<Value>,
    ) -> ScriptResult<Value>;
}

/// An object scripts can call methods on directly.
#[async_trait]
pub trait ScriptObject: Send + Sync {
    async fn call_method(&self, method: &str, args: Vec<Value>) -> ScriptResult<Value>;
}

#[async_trait]
pub trait ScriptEvaluator: Send + Sync {
    /// Evaluates `text` against `scope`.
    async fn eval(&self, text: &str, scope: &Bindings, host: &dyn ScriptHost)
    -> ScriptResult<Value>;

    /// Evaluates the arguments of `method_call` (`name(args)`) and calls `name` on `target`.
    async fn call(
        &self,
        target: &dyn ScriptObject,
        method_call: &str,
        scope: &Bindings,
        host: &dyn ScriptHost,
    ) -> ScriptResult<Value>;
}

/// Host that resolves nothing; for evaluating plain expressions.
pub struct DetachedHost;

#[async_trait]
impl ScriptHost for DetachedHost {
    async fn invoke_static(
        &self,
        target: &str,
        method: &str,
        _args: Vec<Value>,
    ) -> ScriptResult<Value> {
        Err(ScriptError::UnknownMethod {
            target: target.to_string(),
            method: method.to_string(),
        })
    }

    async fn invoke_method(
        &self,
        receiver: &Value,
        method: &str,
        _args: Vec<Value>,
    ) -> ScriptResult<Value> {
        Err(ScriptError::UnknownMethod {
            target: receiver.type_name().to_string(),
            method: method.to_string(),
        })
    }
}
