use strum::IntoStaticStr;
use thiserror::Error;

use crate::controller::ControllerError;
use crate::query::QueryError;
use crate::script::ScriptError;

/// Failures raised while dispatching an expression.
#[derive(Error, Debug, IntoStaticStr)]
pub enum EvalError {
    /// `execute()` was called on a request without an action list.
    #[error("No action given")]
    MissingAction,

    #[error("Query text is empty")]
    EmptyQuery,

    /// Nested actions went deeper than the configured limit.
    #[error("Cyclic action reference: {name} (depth {depth})")]
    CyclicAction { name: String, depth: usize },

    #[error("Script error: {0}")]
    Script(ScriptError),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Invocation failed: {0}")]
    Invocation(String),
}

impl From<ScriptError> for EvalError {
    fn from(err: ScriptError) -> Self {
        match err {
            ScriptError::CyclicAction { name, depth } => EvalError::CyclicAction { name, depth },
            err => EvalError::Script(err),
        }
    }
}

impl EvalError {
    /// Short name of the variant, reported as the exception kind of a failure response.
    pub fn kind(&self) -> &'static str {
        self.into()
    }
}

pub type EvalResult<T> = Result<T, EvalError>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Evaluation error: {0}")]
    Eval(#[from] EvalError),

    #[error("Script error: {0}")]
    Script(#[from] ScriptError),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Controller error: {0}")]
    Controller(#[from] ControllerError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal(message.into())
    }
}

pub type InternalResult<T> = Result<T, Error>;
