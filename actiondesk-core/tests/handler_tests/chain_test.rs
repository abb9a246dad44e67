use actiondesk_core::{ActionResponse, EvalError, ResponseStatus, Value};
use pretty_assertions::assert_eq;
use serde_json::json;

use super::{default_services, order_handler};

#[tokio::test]
async fn test_values_are_wrapped_in_success_response() {
    let (services, _) = default_services();
    let response = order_handler(&services, Some("total, total"))
        .execute()
        .await
        .unwrap();

    assert_eq!(
        response,
        ActionResponse::success(Value::List(vec![Value::Integer(15), Value::Integer(15)]))
    );
    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!({"status": "success", "data": [15, 15]})
    );
}

#[tokio::test]
async fn test_blank_names_are_skipped() {
    let (services, _) = default_services();
    let response = order_handler(&services, Some(" , total ,"))
        .execute()
        .await
        .unwrap();
    assert_eq!(response.data, Some(Value::List(vec![Value::Integer(15)])));
}

#[tokio::test]
async fn test_first_response_is_returned_unmodified() {
    let (services, greeter) = default_services();
    let response = order_handler(&services, Some("total,say-hello,explode"))
        .execute()
        .await
        .unwrap();

    assert_eq!(response.status, ResponseStatus::Success);
    assert_eq!(response.data, Some(Value::from("hi")));
    assert!(response.exception.is_none());
    assert_eq!(greeter.count(), 1);
}

#[tokio::test]
async fn test_controller_failure_is_reported_in_response() {
    let (services, _) = default_services();
    let response = order_handler(&services, Some("explode"))
        .execute()
        .await
        .unwrap();

    assert_eq!(response.status, ResponseStatus::Failure);
    let exception = response.exception.unwrap();
    assert_eq!(exception.kind, "Failed");
    assert_eq!(exception.message, "Controller failed: boom");
}

#[tokio::test]
async fn test_evaluation_errors_become_failure_responses() {
    let (services, _) = default_services();

    let response = order_handler(&services, Some("broken"))
        .execute()
        .await
        .unwrap();
    assert_eq!(response.status, ResponseStatus::Failure);
    assert_eq!(response.exception.unwrap().kind, "Script");

    let response = order_handler(&services, Some("ping"))
        .execute()
        .await
        .unwrap();
    assert_eq!(response.exception.unwrap().kind, "CyclicAction");
}

#[tokio::test]
async fn test_cycle_through_script_keeps_its_kind() {
    let (services, _) = default_services();
    let handler = order_handler(&services, None);
    let err = handler.evaluate("action: loop").await.unwrap_err();
    assert!(matches!(err, EvalError::CyclicAction { ref name, .. } if name == "loop"));

    let response = order_handler(&services, Some("total, loop"))
        .execute()
        .await
        .unwrap();
    assert_eq!(response.status, ResponseStatus::Failure);
    let exception = response.exception.unwrap();
    assert_eq!(exception.kind, "CyclicAction");
    assert!(exception.message.contains("loop"));
}

#[tokio::test]
async fn test_unknown_actions_yield_null_steps() {
    let (services, _) = default_services();
    let response = order_handler(&services, Some("nothing-here"))
        .execute()
        .await
        .unwrap();
    assert_eq!(response, ActionResponse::success(Value::List(vec![Value::Null])));
}

#[tokio::test]
async fn test_missing_action_is_a_contract_violation() {
    let (services, _) = default_services();
    let err = order_handler(&services, None).execute().await.unwrap_err();
    assert!(matches!(err, EvalError::MissingAction));
}
