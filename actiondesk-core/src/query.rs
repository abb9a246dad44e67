//! Persistence seam used by `select:`, `select[]:` and `search`.

use async_trait::async_trait;
use strum::IntoStaticStr;
use thiserror::Error;

use crate::context::Bindings;
use crate::value::{QueryValue, Value};

#[derive(Error, Debug, Clone, PartialEq, IntoStaticStr)]
pub enum QueryError {
    /// A single result was requested and no row matched.
    #[error("No result found")]
    NoResult,
    #[error("Invalid query: {0}")]
    Invalid(String),
    #[error("Unknown model: {0}")]
    UnknownModel(String),
    #[error("Missing query parameter: {0}")]
    MissingParameter(String),
    #[error("Expected a single result, found {0}")]
    NonUnique(usize),
    #[error("Query execution failed: {0}")]
    Execution(String),
}

pub type QueryResult<T> = Result<T, QueryError>;

/// A prepared query.
#[async_trait]
pub trait QueryHandle: Send + Sync {
    /// Binds `:name` parameters from `scope` and `?N` parameters from `params` (1-based).
    fn bind(&mut self, scope: &Bindings, params: &[Value]);

    async fn single_result(&self) -> QueryResult<Value>;

    async fn result_list(&self) -> QueryResult<Vec<Value>>;
}

pub trait QueryEngine: Send + Sync {
    fn create_query(&self, text: &str) -> QueryResult<Box<dyn QueryHandle>>;

    /// Prepares a query described by a script-built [`QueryValue`].
    fn from_value(&self, query: &QueryValue) -> QueryResult<Box<dyn QueryHandle>>;
}

/// Result of a best-effort query: failures are kept instead of raised.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome<T> {
    Rows(T),
    NoResult,
    Ignored(QueryError),
}

impl<T> QueryOutcome<T> {
    pub fn capture(result: QueryResult<T>) -> Self {
        match result {
            Ok(rows) => QueryOutcome::Rows(rows),
            Err(QueryError::NoResult) => QueryOutcome::NoResult,
            Err(err) => QueryOutcome::Ignored(err),
        }
    }

    pub fn rows(self) -> Option<T> {
        match self {
            QueryOutcome::Rows(rows) => Some(rows),
            _ => None,
        }
    }
}

/// Prepends `SELECT ` unless the text already starts with it.
pub fn normalize_select(text: &str) -> String {
    let text = text.trim();
    if text.to_lowercase().starts_with("select ") {
        text.to_string()
    } else {
        format!("SELECT {}", text)
    }
}
