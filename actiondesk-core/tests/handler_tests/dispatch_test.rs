use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use actiondesk_core::{
    ActionResult, ActionServices, EvalError, ResponseStatus, Value,
    config::DispatcherConfig,
    context::Bindings,
    script::{ScriptEvaluator, ScriptHost, ScriptObject, ScriptResult, SimpleScriptEngine},
};
use async_trait::async_trait;
use pretty_assertions::assert_eq;

use super::{app, default_services, order_handler, setup_services};

#[derive(Default)]
struct CountingEngine {
    inner: SimpleScriptEngine,
    evals: AtomicUsize,
}

#[async_trait]
impl ScriptEvaluator for CountingEngine {
    async fn eval(&self, text: &str, scope: &Bindings, host: &dyn ScriptHost) -> ScriptResult<Value> {
        self.evals.fetch_add(1, Ordering::SeqCst);
        self.inner.eval(text, scope, host).await
    }

    async fn call(
        &self,
        target: &dyn ScriptObject,
        method_call: &str,
        scope: &Bindings,
        host: &dyn ScriptHost,
    ) -> ScriptResult<Value> {
        self.inner.call(target, method_call, scope, host).await
    }
}

#[tokio::test]
async fn test_empty_and_literal_expressions() {
    let (services, _) = default_services();
    let handler = order_handler(&services, None);

    assert!(handler.evaluate("").await.unwrap().is_null());
    for text in ["hello", "Select: x", "call greeter", "  eval: x", "eval: 1\n+ 2"] {
        assert_eq!(
            handler.evaluate(text).await.unwrap(),
            ActionResult::Value(Value::from(text)),
            "{}",
            text
        );
    }
}

#[tokio::test]
async fn test_eval_uses_record_bindings() {
    let (services, _) = default_services();
    let handler = order_handler(&services, None);

    assert_eq!(
        handler.evaluate("eval: amount + 10").await.unwrap(),
        ActionResult::Value(Value::Integer(15))
    );
    assert_eq!(
        handler.evaluate("eval: name + '/' + _model").await.unwrap(),
        ActionResult::Value(Value::from("SO-1/Order"))
    );
    assert_eq!(
        handler.evaluate("eval: __self__.customer.code").await.unwrap(),
        ActionResult::Value(Value::from("C1"))
    );
    assert!(matches!(
        handler.evaluate("eval: missing.field").await,
        Err(EvalError::Script(_))
    ));
}

#[tokio::test]
async fn test_each_prefix_dispatches_once() {
    let engine = Arc::new(CountingEngine::default());
    let (services, greeter) =
        setup_services(ActionServices::from_app(app()).with_script(engine.clone()));
    let handler = order_handler(&services, None);

    handler.evaluate("eval: 1").await.unwrap();
    assert_eq!(engine.evals.load(Ordering::SeqCst), 1);

    handler
        .evaluate("select: self FROM Partner self WHERE self.code = 'C1'")
        .await
        .unwrap();
    assert_eq!(engine.evals.load(Ordering::SeqCst), 2);

    handler.evaluate("select[]: self FROM Partner self").await.unwrap();
    assert_eq!(engine.evals.load(Ordering::SeqCst), 3);

    handler.evaluate("call: greeter:sayHello").await.unwrap();
    assert_eq!(greeter.count(), 1);
    assert_eq!(engine.evals.load(Ordering::SeqCst), 3);

    handler.evaluate("action: say-hello").await.unwrap();
    assert_eq!(greeter.count(), 2);
}

#[tokio::test]
async fn test_action_resolves_transitively() {
    let (services, _) = default_services();
    let handler = order_handler(&services, None);

    assert_eq!(
        handler.evaluate("action: to-total").await.unwrap(),
        ActionResult::Value(Value::Integer(15))
    );
    assert_eq!(
        handler.evaluate("action: double-total").await.unwrap(),
        ActionResult::Value(Value::List(vec![Value::Integer(15), Value::Integer(15)]))
    );
    assert!(handler.evaluate("action: missing").await.unwrap().is_null());
}

#[tokio::test]
async fn test_cyclic_actions_fail() {
    let (services, _) = default_services();
    let handler = order_handler(&services, None);

    let err = handler.evaluate("action: ping").await.unwrap_err();
    match err {
        EvalError::CyclicAction { name, depth } => {
            assert_eq!(depth, 33);
            assert!(name == "ping" || name == "pong");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_depth_limit_is_configurable() {
    let config = DispatcherConfig {
        max_action_depth: 1,
        ..Default::default()
    };
    let (services, _) = setup_services(ActionServices::from_app(app()).with_config(config));
    let handler = order_handler(&services, None);

    assert_eq!(
        handler.evaluate("action: total").await.unwrap(),
        ActionResult::Value(Value::Integer(15))
    );
    let err = handler.evaluate("action: to-total").await.unwrap_err();
    assert!(matches!(
        err,
        EvalError::CyclicAction { ref name, depth: 2 } if name == "total"
    ));
}

#[tokio::test]
async fn test_call_returns_controller_response() {
    let (services, _) = default_services();
    let handler = order_handler(&services, None);

    let result = handler.evaluate("call: greeter:sayHello").await.unwrap();
    let response = result.as_response().unwrap();
    assert_eq!(response.status, ResponseStatus::Success);
    assert_eq!(response.data, Some(Value::from("hi")));
    assert!(response.exception.is_none());

    let result = handler.evaluate("call: greeter:reload").await.unwrap();
    let response = result.as_response().unwrap();
    assert!(response.reload);
    assert_eq!(response.flash.as_deref(), Some("reloaded Order"));
}

#[tokio::test]
async fn test_malformed_call_is_null() {
    let (services, greeter) = default_services();
    let handler = order_handler(&services, None);

    for text in ["call: greeter", "call: a:b:c", "call: greeter:", "call: "] {
        assert!(handler.evaluate(text).await.unwrap().is_null(), "{}", text);
    }
    assert_eq!(greeter.count(), 0);
}
