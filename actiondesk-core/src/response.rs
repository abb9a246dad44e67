use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::value::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ResponseStatus {
    #[default]
    Success,
    Failure,
}

/// Failure detail attached to a response instead of being raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseException {
    pub kind: String,
    pub message: String,
}

/// Structured response driving UI state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse {
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<ResponseException>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub reload: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Field updates for the current record.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub values: BTreeMap<String, Value>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl ActionResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn success(data: Value) -> Self {
        Self {
            status: ResponseStatus::Success,
            data: Some(data),
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }

    pub fn set_status(&mut self, status: ResponseStatus) {
        self.status = status;
    }

    pub fn set_data(&mut self, data: impl Into<Value>) {
        self.data = Some(data.into());
    }

    /// Records a failure; the status flips to [`ResponseStatus::Failure`].
    pub fn set_exception(&mut self, kind: impl Into<String>, message: impl Into<String>) {
        self.status = ResponseStatus::Failure;
        self.exception = Some(ResponseException {
            kind: kind.into(),
            message: message.into(),
        });
    }

    pub fn set_reload(&mut self, reload: bool) {
        self.reload = reload;
    }

    pub fn set_flash(&mut self, message: impl Into<String>) {
        self.flash = Some(message.into());
    }

    pub fn set_alert(&mut self, message: impl Into<String>) {
        self.alert = Some(message.into());
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn set_value(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(field.into(), value.into());
    }
}

/// Outcome of evaluating an action expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ActionResult {
    Value(Value),
    Response(ActionResponse),
}

impl ActionResult {
    pub fn null() -> Self {
        ActionResult::Value(Value::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ActionResult::Value(Value::Null))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            ActionResult::Value(value) => Some(value),
            ActionResult::Response(_) => None,
        }
    }

    pub fn as_response(&self) -> Option<&ActionResponse> {
        match self {
            ActionResult::Response(response) => Some(response),
            ActionResult::Value(_) => None,
        }
    }
}

impl From<Value> for ActionResult {
    fn from(value: Value) -> Self {
        ActionResult::Value(value)
    }
}

impl From<ActionResponse> for ActionResult {
    fn from(response: ActionResponse) -> Self {
        ActionResult::Response(response)
    }
}
