//! `${...}` templates.
//!
//! Rendering happens in two passes: [`preprocess`] rewrites the formatting filters
//! into plain `__fmt__` calls, then a [`TemplateEngine`] evaluates every
//! interpolation.
//!
//! ```text
//! ${order?.state | text}   ->  ${__fmt__.text(order, 'state')}
//! ${state | text}          ->  ${__fmt__.text('state')}
//! ${note | e}              ->  ${(note) ?: ''}
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;

use crate::config::TemplateConfig;
use crate::context::Bindings;
use crate::format::FieldFormatter;
use crate::script::{ScriptError, ScriptEvaluator, ScriptHost, ScriptResult, SimpleScriptEngine};
use crate::value::Value;

/// Name the formatter is reachable under from template expressions.
pub const FORMATTER_BINDING: &str = "__fmt__";

const XML_PROLOG: &str = "<?xml";

lazy_static! {
    static ref ROOTED_PATH_PATTERN: Regex = Regex::new(r"^(\w+)\??\.(.+)$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    /// Filters are rewritten before rendering.
    Script,
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Text(&'a str),
    Interpolation(&'a str),
}

/// Splits `text` into literal runs and `${...}` bodies. An unterminated `${` and
/// everything after it is literal text.
fn segments(text: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("${") {
        let body_start = start + 2;
        let Some(len) = closing_brace(&rest[body_start..]) else {
            break;
        };
        if start > 0 {
            segments.push(Segment::Text(&rest[..start]));
        }
        segments.push(Segment::Interpolation(&rest[body_start..body_start + len]));
        rest = &rest[body_start + len + 1..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Text(rest));
    }
    segments
}

/// Byte offset of the `}` closing an interpolation body, skipping nested braces
/// and quoted strings.
fn closing_brace(body: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in body.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '{' => depth += 1,
            '}' if depth == 0 => return Some(i),
            '}' => depth -= 1,
            _ => {}
        }
    }
    None
}

enum Filter {
    Text,
    Escape,
}

/// Splits a trailing `| text` or `| e` filter off `body`.
fn split_filter(body: &str) -> Option<(&str, Filter)> {
    let pipe = body.rfind('|')?;
    if pipe > 0 && body.as_bytes()[pipe - 1] == b'|' {
        return None;
    }
    let filter = match body[pipe + 1..].trim() {
        "text" => Filter::Text,
        "e" => Filter::Escape,
        _ => return None,
    };
    Some((body[..pipe].trim(), filter))
}

fn rewrite(body: &str, xml: bool) -> String {
    let rewritten = match split_filter(body) {
        Some((expr, Filter::Text)) => match ROOTED_PATH_PATTERN.captures(expr) {
            Some(captures) => format!(
                "{}.text({}, '{}')",
                FORMATTER_BINDING, &captures[1], &captures[2]
            ),
            None => format!("{}.text('{}')", FORMATTER_BINDING, expr),
        },
        Some((expr, Filter::Escape)) => format!("({}) ?: ''", expr),
        None => body.to_string(),
    };
    if xml {
        format!("{}.escape({})", FORMATTER_BINDING, rewritten)
    } else {
        rewritten
    }
}

/// Rewrites the formatting filters of `raw` into formatter calls.
///
/// Text without filters, and outside of XML documents, comes back unchanged.
pub fn preprocess(raw: &str, config: &TemplateConfig) -> String {
    let xml = config.xml_escape && raw.trim_start().starts_with(XML_PROLOG);
    let mut out = String::with_capacity(raw.len());
    for segment in segments(raw) {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Interpolation(body) => {
                out.push_str("${");
                out.push_str(&rewrite(body, xml));
                out.push('}');
            }
        }
    }
    out
}

#[async_trait]
pub trait TemplateEngine: Send + Sync {
    async fn render(
        &self,
        template: &str,
        scope: &Bindings,
        host: &dyn ScriptHost,
    ) -> ScriptResult<String>;
}

/// Renders interpolations by evaluating them as scripts. `null` renders as `null`.
pub struct ScriptTemplateEngine {
    script: Arc<dyn ScriptEvaluator>,
}

impl ScriptTemplateEngine {
    pub fn new(script: Arc<dyn ScriptEvaluator>) -> Self {
        Self { script }
    }
}

impl Default for ScriptTemplateEngine {
    fn default() -> Self {
        Self::new(Arc::new(SimpleScriptEngine::new()))
    }
}

#[async_trait]
impl TemplateEngine for ScriptTemplateEngine {
    async fn render(
        &self,
        template: &str,
        scope: &Bindings,
        host: &dyn ScriptHost,
    ) -> ScriptResult<String> {
        let mut out = String::with_capacity(template.len());
        for segment in segments(template) {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Interpolation(body) => {
                    let value = self.script.eval(body, scope, host).await?;
                    out.push_str(&value.to_string());
                }
            }
        }
        Ok(out)
    }
}

/// Resolves `__fmt__` calls and hands everything else to `inner`.
pub struct TemplateHost<'a> {
    formatter: FieldFormatter<'a>,
    inner: &'a dyn ScriptHost,
}

impl<'a> TemplateHost<'a> {
    pub fn new(formatter: FieldFormatter<'a>, inner: &'a dyn ScriptHost) -> Self {
        Self { formatter, inner }
    }

    fn format(&self, method: &str, args: &[Value]) -> ScriptResult<Value> {
        let value = match (method, args) {
            ("text", [Value::String(expr)]) => Value::String(self.formatter.text(expr)),
            ("text", [root, Value::String(path)]) => Value::String(self.formatter.text_of(root, path)),
            ("escape", [value]) => Value::String(self.formatter.escape(value)),
            ("info", [text, params @ ..]) => self.formatter.info(&text.to_string(), params),
            ("debug", [text, params @ ..]) => self.formatter.debug(&text.to_string(), params),
            ("warn", [text, params @ ..]) => self.formatter.warn(&text.to_string(), params),
            ("error", [text, params @ ..]) => self.formatter.error(&text.to_string(), params),
            ("trace", [text, params @ ..]) => self.formatter.trace(&text.to_string(), params),
            _ => {
                return Err(ScriptError::UnknownMethod {
                    target: FORMATTER_BINDING.to_string(),
                    method: method.to_string(),
                });
            }
        };
        Ok(value)
    }
}

#[async_trait]
impl ScriptHost for TemplateHost<'_> {
    async fn invoke_static(
        &self,
        target: &str,
        method: &str,
        args: Vec<Value>,
    ) -> ScriptResult<Value> {
        if target == FORMATTER_BINDING {
            return self.format(method, &args);
        }
        self.inner.invoke_static(target, method, args).await
    }

    async fn invoke_method(
        &self,
        receiver: &Value,
        method: &str,
        args: Vec<Value>,
    ) -> ScriptResult<Value> {
        self.inner.invoke_method(receiver, method, args).await
    }
}
