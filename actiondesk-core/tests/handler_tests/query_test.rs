use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use actiondesk_core::{
    ActionResult, ActionServices, EvalError, QueryValue, Value,
    context::Bindings,
    query::{QueryEngine, QueryError, QueryHandle, QueryResult},
};
use async_trait::async_trait;
use pretty_assertions::assert_eq;

use super::{app, default_services, order_handler, setup_services};

/// Records query texts and answers every query with no rows.
#[derive(Default)]
struct RecordingQueries {
    texts: Mutex<Vec<String>>,
}

struct NoRows;

#[async_trait]
impl QueryHandle for NoRows {
    fn bind(&mut self, _scope: &Bindings, _params: &[Value]) {}

    async fn single_result(&self) -> QueryResult<Value> {
        Err(QueryError::NoResult)
    }

    async fn result_list(&self) -> QueryResult<Vec<Value>> {
        Err(QueryError::Execution("connection lost".to_string()))
    }
}

impl QueryEngine for RecordingQueries {
    fn create_query(&self, text: &str) -> QueryResult<Box<dyn QueryHandle>> {
        self.texts.lock().unwrap().push(text.to_string());
        Ok(Box::new(NoRows))
    }

    fn from_value(&self, query: &QueryValue) -> QueryResult<Box<dyn QueryHandle>> {
        self.texts.lock().unwrap().push(format!("{:?}", query));
        Ok(Box::new(NoRows))
    }
}

#[tokio::test]
async fn test_select_one_binds_named_parameters_from_record() {
    let (services, _) = default_services();
    let handler = order_handler(&services, None);

    let result = handler.evaluate("action: find-customer").await.unwrap();
    let partner = result.as_value().unwrap();
    assert_eq!(partner.field("name"), Some(&Value::from("ACME")));
    assert_eq!(partner.model(), Some("Partner"));
}

#[tokio::test]
async fn test_select_one_positional_parameters() {
    let (services, _) = default_services();
    let handler = order_handler(&services, None);

    let result = handler
        .evaluate(r#"eval: __me__.selectOne("self.name FROM Partner self WHERE self.code = ?1", 'C2')"#)
        .await
        .unwrap();
    assert_eq!(result, ActionResult::Value(Value::from("Globex")));

    let value = handler
        .select_one(
            "SELECT p.name FROM Partner p WHERE p.kind = ?1",
            &[Value::from("CODE1")],
        )
        .await
        .unwrap();
    assert_eq!(value, Value::from("ACME"));
}

#[tokio::test]
async fn test_select_one_without_rows_is_null() {
    let (services, _) = default_services();
    let handler = order_handler(&services, None);

    let result = handler
        .evaluate("select: self FROM Partner self WHERE self.code = 'C9'")
        .await
        .unwrap();
    assert!(result.is_null());
}

#[tokio::test]
async fn test_select_one_propagates_other_errors() {
    let (services, _) = default_services();
    let handler = order_handler(&services, None);

    assert!(matches!(
        handler.select_one("self FROM Partner self", &[]).await,
        Err(EvalError::Query(QueryError::NonUnique(2)))
    ));
    assert!(matches!(
        handler.select_one("nonsense", &[]).await,
        Err(EvalError::Query(QueryError::Invalid(_)))
    ));
}

#[tokio::test]
async fn test_select_all() {
    let (services, _) = default_services();
    let handler = order_handler(&services, None);

    let result = handler
        .evaluate("select[]: self.code FROM Partner self")
        .await
        .unwrap();
    assert_eq!(
        result,
        ActionResult::Value(Value::List(vec![Value::from("C1"), Value::from("C2")]))
    );
}

#[tokio::test]
async fn test_select_all_failures_are_null() {
    let (services, _) = default_services();
    let handler = order_handler(&services, None);

    for query in [
        "self FROM Invoice self",
        "self FROM Partner self WHERE self.code = :unbound",
        "not a query",
    ] {
        assert_eq!(handler.select_all(query, &[]).await.unwrap(), Value::Null, "{}", query);
    }

    let queries = Arc::new(RecordingQueries::default());
    let (services, _) = setup_services(ActionServices::from_app(app()).with_queries(queries));
    let handler = order_handler(&services, None);
    assert!(handler.evaluate("select[]: self FROM Partner self").await.unwrap().is_null());
}

#[tokio::test]
async fn test_empty_query_is_fatal() {
    let (services, _) = default_services();
    let handler = order_handler(&services, None);

    assert!(matches!(handler.select_one("", &[]).await, Err(EvalError::EmptyQuery)));
    assert!(matches!(handler.select_all("  ", &[]).await, Err(EvalError::EmptyQuery)));
    assert!(handler.evaluate("select[]: ").await.is_err());
}

#[tokio::test]
async fn test_quoted_select_reaches_script_evaluator() {
    let queries = Arc::new(RecordingQueries::default());
    let (services, _) =
        setup_services(ActionServices::from_app(app()).with_queries(queries.clone()));
    let handler = order_handler(&services, None);

    let result = handler
        .evaluate(r#"select: "com.example.Entity""#)
        .await
        .unwrap();
    assert!(result.is_null());
    assert_eq!(
        *queries.texts.lock().unwrap(),
        vec!["SELECT com.example.Entity".to_string()]
    );
}

#[tokio::test]
async fn test_search() {
    let (services, _) = default_services();
    let handler = order_handler(&services, None);

    let mut params = BTreeMap::new();
    params.insert("code".to_string(), Value::from("C2"));
    let partner = handler
        .search("Partner", "self.code = :code", &params)
        .await
        .unwrap();
    assert_eq!(partner.field("name"), Some(&Value::from("Globex")));

    let partner = handler
        .search("Partner", "('self.code = ?1', customerCode)", &BTreeMap::new())
        .await
        .unwrap();
    assert_eq!(partner.field("name"), Some(&Value::from("ACME")));

    let missing = handler
        .search("Partner", "self.code = 'C9'", &BTreeMap::new())
        .await
        .unwrap();
    assert_eq!(missing, Value::Null);
}

#[tokio::test]
async fn test_search_from_script() {
    let (services, _) = default_services();
    let handler = order_handler(&services, None);

    let result = handler
        .evaluate("eval: __me__.search('Partner', 'self.code = :customerCode')?.name")
        .await
        .unwrap();
    assert_eq!(result, ActionResult::Value(Value::from("ACME")));
}
