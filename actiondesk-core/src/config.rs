use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs::File, io::BufReader, path::Path};

use crate::{Error, InternalResult, action::ActionDefinition, mapper::Property, value::Value};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Deepest chain of nested `action:` references before evaluation fails.
    #[serde(default = "default_max_action_depth")]
    pub max_action_depth: usize,

    #[serde(default)]
    pub template: TemplateConfig,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_action_depth: default_max_action_depth(),
            template: TemplateConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Escape every interpolation of templates starting with `<?xml`.
    #[serde(default = "default_true")]
    pub xml_escape: bool,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            xml_escape: default_true(),
        }
    }
}

/// Everything needed to assemble in-memory services in one go.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppDefinition {
    #[serde(default)]
    pub config: DispatcherConfig,

    /// Named action definitions.
    #[serde(default)]
    pub actions: HashMap<String, ActionDefinition>,

    /// model -> field -> mapping metadata
    #[serde(default)]
    pub models: HashMap<String, HashMap<String, Property>>,

    /// selection -> code -> title
    #[serde(default)]
    pub selections: HashMap<String, HashMap<String, String>>,

    /// model -> rows
    #[serde(default)]
    pub records: HashMap<String, Vec<Value>>,
}

pub fn from_file<T: for<'de> Deserialize<'de>, P: AsRef<Path>>(path: P) -> InternalResult<T> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| Error::Internal(format!("Failed to open {}: {}", path.display(), e)))?;
    let reader = BufReader::new(file);
    let config = serde_json::from_reader(reader)
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", path.display(), e)))?;
    Ok(config)
}

pub fn from_str<T: for<'de> Deserialize<'de>>(s: &str) -> InternalResult<T> {
    let config = serde_json::from_str(s)
        .map_err(|e| Error::Internal(format!("Failed to parse config: {}", e)))?;
    Ok(config)
}

fn default_max_action_depth() -> usize {
    32
}

fn default_true() -> bool {
    true
}
