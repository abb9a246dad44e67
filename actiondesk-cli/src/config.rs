use std::{collections::BTreeMap, io, path::Path};

use actiondesk_core::{
    EvalError, Value,
    config::{self, AppDefinition},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Core(#[from] actiondesk_core::Error),

    #[error("{0}")]
    Eval(#[from] EvalError),
}

pub type CliResult<T> = Result<T, CliError>;

/// Application definition from `path`; an empty application when no path is given.
pub fn load_app(path: Option<&Path>) -> CliResult<AppDefinition> {
    match path {
        Some(path) => Ok(config::from_file(path)?),
        None => Ok(AppDefinition::default()),
    }
}

/// Record fields of the current context, read from a JSON object.
pub fn load_context(path: Option<&Path>) -> CliResult<Option<BTreeMap<String, Value>>> {
    match path {
        Some(path) => Ok(Some(config::from_file(path)?)),
        None => Ok(None),
    }
}
