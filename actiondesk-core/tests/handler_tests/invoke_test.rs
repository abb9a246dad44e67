use actiondesk_core::{EvalError, ResponseStatus, Value};
use pretty_assertions::assert_eq;

use super::{default_services, order_handler};

#[tokio::test]
async fn test_call_unknown_controller_or_method() {
    let (services, _) = default_services();
    let handler = order_handler(&services, None);

    let response = handler.call("nobody", "sayHello").await;
    assert_eq!(response.status, ResponseStatus::Failure);
    let exception = response.exception.unwrap();
    assert_eq!(exception.kind, "NotFound");
    assert_eq!(exception.message, "Controller not found: nobody");

    let response = handler.call("greeter", "missing").await;
    assert_eq!(response.exception.unwrap().kind, "MethodNotFound");
}

#[tokio::test]
async fn test_rpc_evaluates_arguments_against_bindings() {
    let (services, _) = default_services();
    let handler = order_handler(&services, None);

    let value = handler
        .rpc("greeter", "greet(name, customer.code, 'x')")
        .await
        .unwrap();
    assert_eq!(value, Value::from("hello SO-1 C1 x"));

    let value = handler.rpc("greeter", "greet()").await.unwrap();
    assert_eq!(value, Value::from("hello "));
}

#[tokio::test]
async fn test_rpc_without_call_syntax_is_null() {
    let (services, _) = default_services();
    let handler = order_handler(&services, None);

    assert_eq!(handler.rpc("greeter", "greet").await.unwrap(), Value::Null);
    assert_eq!(handler.rpc("nobody", "a.b(1)").await.unwrap(), Value::Null);
}

#[tokio::test]
async fn test_rpc_failures_are_invocation_errors() {
    let (services, _) = default_services();
    let handler = order_handler(&services, None);

    assert!(matches!(
        handler.rpc("nobody", "greet()").await,
        Err(EvalError::Invocation(_))
    ));
    assert!(matches!(
        handler.rpc("greeter", "sayHello()").await,
        Err(EvalError::Invocation(_))
    ));
    assert!(matches!(
        handler.rpc("greeter", "greet(missing.field)").await,
        Err(EvalError::Invocation(_))
    ));
}

#[tokio::test]
async fn test_script_evaluate_converts_response_to_value() {
    let (services, greeter) = default_services();
    let handler = order_handler(&services, None);

    let result = handler
        .evaluate("eval: __me__.evaluate('call: greeter:sayHello')")
        .await
        .unwrap();
    assert_eq!(
        result,
        actiondesk_core::ActionResult::Value(Value::from(
            serde_json::json!({"status": "success", "data": "hi"})
        ))
    );
    assert_eq!(greeter.count(), 1);
}
