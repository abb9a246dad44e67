//! Prefix grammar of action expressions.
//!
//! ```text
//! eval: <script>            script evaluated against the bindings
//! action: <name>            named action definition
//! call: <controller>:<m>    controller method invocation
//! select: <query>           single row query
//! select[]: <query>         row list query
//! ```
//!
//! Anything else is a literal and evaluates to itself.

use lazy_static::lazy_static;
use regex::Regex;
use strum::{Display, EnumString, IntoStaticStr};

lazy_static! {
    static ref EXPRESSION_PATTERN: Regex =
        Regex::new(r"^(select\[\]|select|action|call|eval):\s*(.*)$").unwrap();
    static ref METHOD_CALL_PATTERN: Regex = Regex::new(r"^(\w+)\((.*?)\)$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
pub enum ExpressionKind {
    #[strum(serialize = "eval")]
    Eval,
    #[strum(serialize = "action")]
    Action,
    #[strum(serialize = "call")]
    Call,
    #[strum(serialize = "select")]
    SelectOne,
    #[strum(serialize = "select[]")]
    SelectAll,
    #[strum(serialize = "literal")]
    Literal,
}

/// An expression tagged with its kind and the text following the prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    kind: ExpressionKind,
    body: String,
}

impl Expression {
    /// Classifies `text`. Never fails: unmatched text becomes a literal.
    pub fn parse(text: &str) -> Self {
        let Some(captures) = EXPRESSION_PATTERN.captures(text) else {
            return Self::literal(text);
        };
        // the alternation only yields known prefixes
        let kind = captures[1]
            .parse::<ExpressionKind>()
            .unwrap_or(ExpressionKind::Literal);
        Self {
            kind,
            body: captures[2].to_string(),
        }
    }

    pub fn literal(text: &str) -> Self {
        Self {
            kind: ExpressionKind::Literal,
            body: text.to_string(),
        }
    }

    pub fn kind(&self) -> ExpressionKind {
        self.kind
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

impl From<&str> for Expression {
    fn from(text: &str) -> Self {
        Self::parse(text)
    }
}

/// Rewrites `expression` into a call of `method`.
///
/// Unparenthesized bodies become a single opaque string argument so quotes and
/// colons inside them are never read as script syntax.
pub fn make_method_call(method: &str, expression: &str) -> String {
    let expression = expression.trim();
    if expression.starts_with('(') {
        return format!("{}{}", method, expression);
    }
    if is_quoted(expression) {
        format!("{}({})", method, expression)
    } else {
        format!("{}(\"\"\"{}\"\"\")", method, expression)
    }
}

fn is_quoted(text: &str) -> bool {
    let mut chars = text.chars();
    match (chars.next(), chars.next_back()) {
        (Some(first), Some(last)) => first == last && (first == '"' || first == '\''),
        _ => false,
    }
}

/// `controller:method` target of a `call:` expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallTarget {
    pub controller: String,
    pub method: String,
}

impl CallTarget {
    /// `None` unless the body splits into exactly two non-empty parts.
    pub fn parse(body: &str) -> Option<Self> {
        let parts: Vec<&str> = body.split(':').map(str::trim).collect();
        match parts.as_slice() {
            [controller, method] if !controller.is_empty() && !method.is_empty() => Some(Self {
                controller: controller.to_string(),
                method: method.to_string(),
            }),
            _ => None,
        }
    }
}

/// `name(args)` text of an rpc-style call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInvocation {
    pub method: String,
    pub arguments: String,
}

impl MethodInvocation {
    pub fn parse(text: &str) -> Option<Self> {
        METHOD_CALL_PATTERN.captures(text.trim()).map(|captures| Self {
            method: captures[1].to_string(),
            arguments: captures[2].to_string(),
        })
    }
}
