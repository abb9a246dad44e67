//! In-memory record store answering a small query dialect:
//!
//! ```text
//! SELECT self FROM Order self WHERE self.customer.code = :code AND self.state = ?1
//! ```
//!
//! Conditions are equality (`=`) or inequality (`!=`) between a field path of the
//! alias and a named parameter, a positional parameter or a literal.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use dashmap::DashMap;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::trace;

use crate::context::Bindings;
use crate::query::{QueryEngine, QueryError, QueryHandle, QueryResult};
use crate::value::{MODEL_KEY, QueryValue, Value};

const DEFAULT_ALIAS: &str = "self";

lazy_static! {
    static ref SELECT_PATTERN: Regex = Regex::new(
        r"(?is)^\s*select\s+(?P<projection>[\w.]+)\s+from\s+(?P<model>[\w.]+)(?:\s+(?P<alias>\w+))?(?:\s+where\s+(?P<conditions>.+?))?\s*$"
    )
    .unwrap();
    static ref AND_PATTERN: Regex = Regex::new(r"(?i)\s+and\s+").unwrap();
    static ref CONDITION_PATTERN: Regex =
        Regex::new(r"(?s)^\s*(?P<alias>\w+)\.(?P<path>[\w.]+)\s*(?P<op>!=|=)\s*(?P<operand>.+?)\s*$")
            .unwrap();
    static ref POSITIONAL_PATTERN: Regex = Regex::new(r"^\?(\d+)$").unwrap();
    static ref NAMED_PATTERN: Regex = Regex::new(r"^:(\w+)$").unwrap();
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Named(String),
    Positional(usize),
    Literal(Value),
}

#[derive(Debug, Clone, PartialEq)]
struct Condition {
    path: Vec<String>,
    negated: bool,
    operand: Operand,
}

#[derive(Debug, Clone, PartialEq)]
struct ParsedQuery {
    model: String,
    /// Field path selected from each row; empty selects the whole row.
    projection: Vec<String>,
    conditions: Vec<Condition>,
}

impl ParsedQuery {
    fn parse(text: &str) -> QueryResult<Self> {
        let captures = SELECT_PATTERN
            .captures(text)
            .ok_or_else(|| QueryError::Invalid(text.to_string()))?;
        let model = captures["model"].to_string();
        let alias = captures
            .name("alias")
            .map(|m| m.as_str())
            .unwrap_or(DEFAULT_ALIAS);

        let projection = &captures["projection"];
        let projection = if projection == alias {
            vec![]
        } else {
            match projection.strip_prefix(alias).and_then(|p| p.strip_prefix('.')) {
                Some(path) => path.split('.').map(str::to_string).collect(),
                None => return Err(QueryError::Invalid(format!("unknown projection: {}", projection))),
            }
        };

        let conditions = match captures.name("conditions") {
            Some(conditions) => parse_conditions(conditions.as_str(), alias)?,
            None => vec![],
        };

        Ok(Self {
            model,
            projection,
            conditions,
        })
    }

    fn from_value(query: &QueryValue) -> QueryResult<Self> {
        let conditions = match query.filter.as_deref().map(str::trim) {
            Some(filter) if !filter.is_empty() => parse_conditions(filter, DEFAULT_ALIAS)?,
            _ => vec![],
        };
        Ok(Self {
            model: query.model.clone(),
            projection: vec![],
            conditions,
        })
    }
}

fn parse_conditions(text: &str, alias: &str) -> QueryResult<Vec<Condition>> {
    AND_PATTERN
        .split(text.trim())
        .map(|part| parse_condition(part, alias))
        .collect()
}

fn parse_condition(text: &str, alias: &str) -> QueryResult<Condition> {
    let captures = CONDITION_PATTERN
        .captures(text)
        .ok_or_else(|| QueryError::Invalid(format!("unsupported condition: {}", text)))?;
    if &captures["alias"] != alias {
        return Err(QueryError::Invalid(format!(
            "unknown alias '{}' in: {}",
            &captures["alias"], text
        )));
    }
    Ok(Condition {
        path: captures["path"].split('.').map(str::to_string).collect(),
        negated: &captures["op"] == "!=",
        operand: parse_operand(&captures["operand"])?,
    })
}

fn parse_operand(text: &str) -> QueryResult<Operand> {
    if let Some(captures) = NAMED_PATTERN.captures(text) {
        return Ok(Operand::Named(captures[1].to_string()));
    }
    if let Some(captures) = POSITIONAL_PATTERN.captures(text) {
        return captures[1]
            .parse::<usize>()
            .ok()
            .filter(|index| *index > 0)
            .map(Operand::Positional)
            .ok_or_else(|| QueryError::Invalid(format!("bad positional parameter: {}", text)));
    }
    let literal = match text {
        "null" => Value::Null,
        "true" => Value::Boolean(true),
        "false" => Value::Boolean(false),
        _ => {
            let quoted = text.len() >= 2
                && ((text.starts_with('\'') && text.ends_with('\''))
                    || (text.starts_with('"') && text.ends_with('"')));
            if quoted {
                Value::String(text[1..text.len() - 1].to_string())
            } else if let Ok(i) = text.parse::<i64>() {
                Value::Integer(i)
            } else if let Ok(f) = text.parse::<f64>() {
                Value::Float(f)
            } else {
                return Err(QueryError::Invalid(format!("unsupported operand: {}", text)));
            }
        }
    };
    Ok(Operand::Literal(literal))
}

fn read_path<'a>(row: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter().try_fold(row, |value, segment| value.field(segment))
}

/// Rows grouped by entity type.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: DashMap<String, Vec<Value>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: HashMap<String, Vec<Value>>) -> Self {
        let store = Self::new();
        for (model, rows) in records {
            for row in rows {
                store.insert(&model, row);
            }
        }
        store
    }

    /// Adds a row; map rows are tagged with their model.
    pub fn insert(&self, model: &str, row: Value) {
        let row = match row {
            Value::Map(mut map) => {
                map.entry(MODEL_KEY.to_string())
                    .or_insert_with(|| Value::String(model.to_string()));
                Value::Map(map)
            }
            other => other,
        };
        self.records.entry(model.to_string()).or_default().push(row);
    }

    pub fn count(&self, model: &str) -> usize {
        self.records.get(model).map(|rows| rows.len()).unwrap_or(0)
    }

    fn prepare(&self, query: ParsedQuery, params: Vec<Value>) -> QueryResult<Box<dyn QueryHandle>> {
        let rows = self
            .records
            .get(&query.model)
            .map(|rows| rows.value().clone())
            .ok_or_else(|| QueryError::UnknownModel(query.model.clone()))?;
        Ok(Box::new(MemoryQuery {
            query,
            rows,
            named: BTreeMap::new(),
            positional: params,
        }))
    }
}

impl QueryEngine for MemoryRecordStore {
    fn create_query(&self, text: &str) -> QueryResult<Box<dyn QueryHandle>> {
        self.prepare(ParsedQuery::parse(text)?, vec![])
    }

    fn from_value(&self, query: &QueryValue) -> QueryResult<Box<dyn QueryHandle>> {
        self.prepare(ParsedQuery::from_value(query)?, query.params.clone())
    }
}

struct MemoryQuery {
    query: ParsedQuery,
    rows: Vec<Value>,
    named: BTreeMap<String, Value>,
    positional: Vec<Value>,
}

impl MemoryQuery {
    fn operand(&self, operand: &Operand) -> QueryResult<Value> {
        match operand {
            Operand::Literal(value) => Ok(value.clone()),
            Operand::Named(name) => self
                .named
                .get(name)
                .cloned()
                .ok_or_else(|| QueryError::MissingParameter(format!(":{}", name))),
            Operand::Positional(index) => self
                .positional
                .get(index - 1)
                .cloned()
                .ok_or_else(|| QueryError::MissingParameter(format!("?{}", index))),
        }
    }

    fn execute(&self) -> QueryResult<Vec<Value>> {
        trace!("execute query on {}: {:?}", self.query.model, self.query.conditions);
        let mut expected = Vec::with_capacity(self.query.conditions.len());
        for condition in &self.query.conditions {
            expected.push(self.operand(&condition.operand)?);
        }

        Ok(self
            .rows
            .iter()
            .filter(|row| {
                self.query
                    .conditions
                    .iter()
                    .zip(&expected)
                    .all(|(condition, expected)| {
                        let actual = read_path(row, &condition.path).unwrap_or(&Value::Null);
                        actual.loose_eq(expected) != condition.negated
                    })
            })
            .map(|row| {
                read_path(row, &self.query.projection)
                    .cloned()
                    .unwrap_or_default()
            })
            .collect())
    }
}

#[async_trait]
impl QueryHandle for MemoryQuery {
    fn bind(&mut self, scope: &Bindings, params: &[Value]) {
        self.named = scope.snapshot();
        if !params.is_empty() {
            self.positional = params.to_vec();
        }
    }

    async fn single_result(&self) -> QueryResult<Value> {
        let mut rows = self.execute()?;
        match rows.len() {
            0 => Err(QueryError::NoResult),
            1 => Ok(rows.remove(0)),
            n => Err(QueryError::NonUnique(n)),
        }
    }

    async fn result_list(&self) -> QueryResult<Vec<Value>> {
        self.execute()
    }
}
