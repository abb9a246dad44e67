use async_recursion::async_recursion;
use async_trait::async_trait;
use tracing::debug;

use super::ast::{BinaryOp, ScriptExpr};
use super::parser::parse_script;
use super::{ScriptError, ScriptEvaluator, ScriptHost, ScriptObject, ScriptResult};
use crate::context::Bindings;
use crate::value::Value;

/// Tree-walking evaluator for the expression subset used in action metadata.
///
/// Unbound names read as `null`. A call whose receiver is a path of unbound names
/// (`__me__.selectOne(..)`, `Order.all()`) goes to the host.
#[derive(Debug, Default, Clone)]
pub struct SimpleScriptEngine;

impl SimpleScriptEngine {
    pub fn new() -> Self {
        Self
    }

    #[async_recursion]
    async fn eval_expr(
        &self,
        expr: &ScriptExpr,
        scope: &Bindings,
        host: &dyn ScriptHost,
    ) -> ScriptResult<Value> {
        match expr {
            ScriptExpr::Literal(value) => Ok(value.clone()),
            ScriptExpr::List(items) => Ok(Value::List(self.eval_args(items, scope, host).await?)),
            ScriptExpr::Name(name) => Ok(scope.get(name).unwrap_or_default()),
            ScriptExpr::Property { target, name, safe } => {
                let receiver = self.eval_expr(target, scope, host).await?;
                read_property(&receiver, name, *safe)
            }
            ScriptExpr::Index { target, index } => {
                let receiver = self.eval_expr(target, scope, host).await?;
                let index = self.eval_expr(index, scope, host).await?;
                read_index(&receiver, &index)
            }
            ScriptExpr::Call {
                target: None,
                method,
                ..
            } => Err(ScriptError::UnknownName(method.clone())),
            ScriptExpr::Call {
                target: Some(target),
                method,
                args,
                safe,
            } => {
                if let Some(path) = static_path(target, scope) {
                    let args = self.eval_args(args, scope, host).await?;
                    return host.invoke_static(&path, method, args).await;
                }
                let receiver = self.eval_expr(target, scope, host).await?;
                if receiver.is_null() {
                    return if *safe {
                        Ok(Value::Null)
                    } else {
                        Err(ScriptError::NullReference(method.clone()))
                    };
                }
                let args = self.eval_args(args, scope, host).await?;
                match builtin_method(&receiver, method, &args) {
                    Some(result) => result,
                    None => host.invoke_method(&receiver, method, args).await,
                }
            }
            ScriptExpr::Not(inner) => {
                let value = self.eval_expr(inner, scope, host).await?;
                Ok(Value::Boolean(!value.truthy()))
            }
            ScriptExpr::Binary { op, left, right } => {
                let left = self.eval_expr(left, scope, host).await?;
                match op {
                    BinaryOp::And if !left.truthy() => Ok(Value::Boolean(false)),
                    BinaryOp::Or if left.truthy() => Ok(Value::Boolean(true)),
                    BinaryOp::And | BinaryOp::Or => {
                        let right = self.eval_expr(right, scope, host).await?;
                        Ok(Value::Boolean(right.truthy()))
                    }
                    BinaryOp::Eq => {
                        let right = self.eval_expr(right, scope, host).await?;
                        Ok(Value::Boolean(left.loose_eq(&right)))
                    }
                    BinaryOp::Ne => {
                        let right = self.eval_expr(right, scope, host).await?;
                        Ok(Value::Boolean(!left.loose_eq(&right)))
                    }
                    BinaryOp::Add => {
                        let right = self.eval_expr(right, scope, host).await?;
                        add(left, right)
                    }
                }
            }
            ScriptExpr::Elvis(left, right) => {
                let value = self.eval_expr(left, scope, host).await?;
                if value.truthy() {
                    Ok(value)
                } else {
                    self.eval_expr(right, scope, host).await
                }
            }
        }
    }

    async fn eval_args(
        &self,
        args: &[ScriptExpr],
        scope: &Bindings,
        host: &dyn ScriptHost,
    ) -> ScriptResult<Vec<Value>> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval_expr(arg, scope, host).await?);
        }
        Ok(values)
    }
}

#[async_trait]
impl ScriptEvaluator for SimpleScriptEngine {
    async fn eval(
        &self,
        text: &str,
        scope: &Bindings,
        host: &dyn ScriptHost,
    ) -> ScriptResult<Value> {
        debug!("eval script: {}", text);
        let expr = parse_script(text)?;
        self.eval_expr(&expr, scope, host).await
    }

    async fn call(
        &self,
        target: &dyn ScriptObject,
        method_call: &str,
        scope: &Bindings,
        host: &dyn ScriptHost,
    ) -> ScriptResult<Value> {
        match parse_script(method_call)? {
            ScriptExpr::Call {
                target: None,
                method,
                args,
                ..
            } => {
                let args = self.eval_args(&args, scope, host).await?;
                target.call_method(&method, args).await
            }
            _ => Err(ScriptError::Parse(format!(
                "not a method call: {}",
                method_call
            ))),
        }
    }
}

/// Dotted path of `expr` when its head is a name missing from `scope`.
fn static_path(expr: &ScriptExpr, scope: &Bindings) -> Option<String> {
    match expr {
        ScriptExpr::Name(name) if !scope.contains(name) => Some(name.clone()),
        ScriptExpr::Property {
            target,
            name,
            safe: false,
        } => static_path(target, scope).map(|path| format!("{}.{}", path, name)),
        _ => None,
    }
}

fn read_property(receiver: &Value, name: &str, safe: bool) -> ScriptResult<Value> {
    match receiver {
        Value::Null if safe => Ok(Value::Null),
        Value::Null => Err(ScriptError::NullReference(name.to_string())),
        Value::Map(map) => Ok(map.get(name).cloned().unwrap_or_default()),
        Value::Query(query) => Ok(match name {
            "model" => Value::String(query.model.clone()),
            "filter" => query.filter.clone().map(Value::String).unwrap_or_default(),
            _ => Value::Null,
        }),
        other => Err(ScriptError::Type(format!(
            "cannot read property '{}' of {}",
            name,
            other.type_name()
        ))),
    }
}

fn read_index(receiver: &Value, index: &Value) -> ScriptResult<Value> {
    match (receiver, index) {
        (Value::Null, _) => Err(ScriptError::NullReference("[]".to_string())),
        (Value::List(items), Value::Integer(i)) => Ok(usize::try_from(*i)
            .ok()
            .and_then(|i| items.get(i).cloned())
            .unwrap_or_default()),
        (Value::Map(map), Value::String(key)) => Ok(map.get(key).cloned().unwrap_or_default()),
        (receiver, index) => Err(ScriptError::Type(format!(
            "cannot index {} with {}",
            receiver.type_name(),
            index.type_name()
        ))),
    }
}

fn add(left: Value, right: Value) -> ScriptResult<Value> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => a
            .checked_add(b)
            .map(Value::Integer)
            .ok_or_else(|| ScriptError::Type("integer overflow".to_string())),
        (Value::Integer(a), Value::Float(b)) => Ok(Value::Float(a as f64 + b)),
        (Value::Float(a), Value::Integer(b)) => Ok(Value::Float(a + b as f64)),
        (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a + b)),
        (Value::String(a), b) => Ok(Value::String(format!("{}{}", a, b))),
        (a, Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
        (Value::List(mut a), Value::List(b)) => {
            a.extend(b);
            Ok(Value::List(a))
        }
        (Value::List(mut a), b) => {
            a.push(b);
            Ok(Value::List(a))
        }
        (a, b) => Err(ScriptError::Type(format!(
            "cannot add {} and {}",
            a.type_name(),
            b.type_name()
        ))),
    }
}

fn builtin_method(receiver: &Value, method: &str, args: &[Value]) -> Option<ScriptResult<Value>> {
    let value = match (receiver, method, args) {
        (_, "toString", []) => Value::String(receiver.to_string()),
        (Value::String(s), "size" | "length", []) => Value::Integer(s.chars().count() as i64),
        (Value::List(items), "size", []) => Value::Integer(items.len() as i64),
        (Value::Map(map), "size", []) => Value::Integer(map.len() as i64),
        (Value::String(s), "isEmpty", []) => Value::Boolean(s.is_empty()),
        (Value::List(items), "isEmpty", []) => Value::Boolean(items.is_empty()),
        (Value::Map(map), "isEmpty", []) => Value::Boolean(map.is_empty()),
        (Value::String(s), "toUpperCase", []) => Value::String(s.to_uppercase()),
        (Value::String(s), "toLowerCase", []) => Value::String(s.to_lowercase()),
        (Value::String(s), "trim", []) => Value::String(s.trim().to_string()),
        (Value::String(s), "contains", [Value::String(part)]) => Value::Boolean(s.contains(part.as_str())),
        (Value::List(items), "contains", [item]) => {
            Value::Boolean(items.iter().any(|candidate| candidate.loose_eq(item)))
        }
        (Value::Map(map), "containsKey", [Value::String(key)]) => {
            Value::Boolean(map.contains_key(key))
        }
        (Value::Map(_) | Value::List(_), "get", [index]) => {
            return Some(read_index(receiver, index));
        }
        _ => return None,
    };
    Some(Ok(value))
}
