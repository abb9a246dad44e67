//! `__fmt__` helper available to templates.

use quick_xml::escape::escape;
use tracing::{debug, error, info, trace, warn};

use crate::context::Bindings;
use crate::mapper::{EntityMapper, Property};
use crate::selection::SelectionCatalog;
use crate::value::Value;

/// Renders field values as display text.
///
/// Values of fields that declare a selection are shown with the selection title
/// of the stored code; everything else with its plain string form.
pub struct FieldFormatter<'a> {
    model: Option<&'a str>,
    scope: &'a Bindings,
    mapper: &'a dyn EntityMapper,
    catalog: &'a dyn SelectionCatalog,
}

impl<'a> FieldFormatter<'a> {
    pub fn new(
        model: Option<&'a str>,
        scope: &'a Bindings,
        mapper: &'a dyn EntityMapper,
        catalog: &'a dyn SelectionCatalog,
    ) -> Self {
        Self {
            model,
            scope,
            mapper,
            catalog,
        }
    }

    /// Display text of `expr`, a dotted path whose head is a binding.
    pub fn text(&self, expr: &str) -> String {
        let expr = expr.replace('?', "");
        let mut segments = expr.trim().split('.');
        let head = segments.next().unwrap_or_default();
        let rest: Vec<&str> = segments.collect();

        let root = self.scope.get(head).unwrap_or_default();
        let property = self
            .model
            .and_then(|model| self.mapper.property(model, head));
        if rest.is_empty() {
            return self.title(property.as_ref(), &root);
        }
        self.walk(property.and_then(|p| p.target), &root, &rest)
    }

    /// Display text of `path` below `root`.
    pub fn text_of(&self, root: &Value, path: &str) -> String {
        if root.is_null() {
            return String::new();
        }
        let path = path.replace('?', "");
        let segments: Vec<&str> = path.trim().split('.').collect();
        self.walk(None, root, &segments)
    }

    pub fn escape(&self, value: &Value) -> String {
        match value {
            Value::Null => String::new(),
            value => escape(value.to_string().as_str()).into_owned(),
        }
    }

    pub fn info(&self, text: &str, params: &[Value]) -> Value {
        info!("{}", interpolate(text, params));
        Value::Null
    }

    pub fn debug(&self, text: &str, params: &[Value]) -> Value {
        debug!("{}", interpolate(text, params));
        Value::Null
    }

    pub fn warn(&self, text: &str, params: &[Value]) -> Value {
        warn!("{}", interpolate(text, params));
        Value::Null
    }

    pub fn error(&self, text: &str, params: &[Value]) -> Value {
        error!("{}", interpolate(text, params));
        Value::Null
    }

    pub fn trace(&self, text: &str, params: &[Value]) -> Value {
        trace!("{}", interpolate(text, params));
        Value::Null
    }

    /// Follows `segments` from `current`. The owning model of each step is the
    /// value's own `_model`, falling back to the target of the previous property.
    fn walk(&self, owner: Option<String>, current: &Value, segments: &[&str]) -> String {
        let mut owner = owner;
        let mut current = current.clone();
        for (i, segment) in segments.iter().enumerate() {
            if current.is_null() {
                return String::new();
            }
            let model = current.model().map(str::to_string).or(owner);
            let property = model
                .as_deref()
                .and_then(|model| self.mapper.property(model, segment));
            let next = current.field(segment).cloned().unwrap_or_default();
            if i + 1 == segments.len() {
                return self.title(property.as_ref(), &next);
            }
            owner = property.and_then(|p| p.target);
            current = next;
        }
        String::new()
    }

    fn title(&self, property: Option<&Property>, value: &Value) -> String {
        if value.is_null() {
            return String::new();
        }
        let code = value.to_string();
        match property.and_then(|p| p.selection.as_deref()) {
            Some(selection) => self.catalog.lookup_title(selection, &code).unwrap_or(code),
            None => code,
        }
    }
}

/// Replaces each `{}` with the next parameter.
fn interpolate(text: &str, params: &[Value]) -> String {
    let mut params = params.iter();
    let mut parts = text.split("{}");
    let mut out = parts.next().unwrap_or_default().to_string();
    for part in parts {
        match params.next() {
            Some(param) => out.push_str(&param.to_string()),
            None => out.push_str("{}"),
        }
        out.push_str(part);
    }
    out
}
