use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use actiondesk_core::{
    ActionHandler, ActionRequest, ActionServices, ControllerError, FnController, Value,
    config::{self, AppDefinition},
};
use serde_json::json;

pub mod chain_test;
pub mod dispatch_test;
pub mod invoke_test;
pub mod query_test;
pub mod template_test;

const APP: &str = r#"{
    "actions": {
        "say-hello": {"type": "method", "controller": "greeter", "method": "sayHello"},
        "explode": {"type": "method", "controller": "greeter", "method": "explode"},
        "total": {"type": "expression", "expression": "eval: amount + 10"},
        "double-total": {"type": "group", "actions": ["total", " total "]},
        "to-total": {"type": "expression", "expression": "action: total"},
        "ping": {"type": "expression", "expression": "action: pong"},
        "pong": {"type": "expression", "expression": "action: ping"},
        "loop": {"type": "expression", "expression": "eval: __me__.evaluate('action: loop')"},
        "broken": {"type": "expression", "expression": "eval: missing.field"},
        "find-customer": {
            "type": "expression",
            "expression": "select: self FROM Partner self WHERE self.code = :customerCode"
        }
    },
    "models": {
        "Order": {"customer": {"target": "Partner"}, "state": {"selection": "order.state"}},
        "Partner": {"kind": {"selection": "partner.kind"}}
    },
    "selections": {
        "order.state": {"draft": "Draft", "confirmed": "Confirmed"},
        "partner.kind": {"CODE1": "Label One"}
    },
    "records": {
        "Partner": [
            {"code": "C1", "name": "ACME", "kind": "CODE1"},
            {"code": "C2", "name": "Globex", "kind": "CODE2"}
        ]
    }
}"#;

/// Counts handled `sayHello` calls across handlers sharing the controller.
pub struct Greeter {
    pub hellos: Arc<AtomicUsize>,
}

impl Greeter {
    pub fn count(&self) -> usize {
        self.hellos.load(Ordering::SeqCst)
    }
}

pub fn app() -> AppDefinition {
    config::from_str(APP).unwrap()
}

pub fn greeter_controller(hellos: Arc<AtomicUsize>) -> FnController {
    FnController::new("greeter")
        .on("sayHello", move |_, response| {
            hellos.fetch_add(1, Ordering::SeqCst);
            response.set_data("hi");
            Ok(())
        })
        .on("reload", |request, response| {
            response.set_reload(true);
            response.set_flash(format!(
                "reloaded {}",
                request.model.as_deref().unwrap_or("nothing")
            ));
            Ok(())
        })
        .on("explode", |_, _| Err(ControllerError::Failed("boom".to_string())))
        .on_call("greet", |args| {
            let names: Vec<String> = args.iter().map(Value::to_string).collect();
            Ok(Value::from(format!("hello {}", names.join(" "))))
        })
}

pub fn setup_services(services: ActionServices) -> (Arc<ActionServices>, Greeter) {
    let hellos = Arc::new(AtomicUsize::new(0));
    services
        .controllers
        .register(Arc::new(greeter_controller(hellos.clone())));
    (Arc::new(services), Greeter { hellos })
}

pub fn default_services() -> (Arc<ActionServices>, Greeter) {
    setup_services(ActionServices::from_app(app()))
}

pub fn order() -> BTreeMap<String, Value> {
    serde_json::from_value(json!({
        "name": "SO-1",
        "amount": 5,
        "state": "draft",
        "note": "a < b",
        "customerCode": "C1",
        "customer": {"_model": "Partner", "code": "C1", "kind": "CODE1"}
    }))
    .unwrap()
}

pub fn order_handler(services: &Arc<ActionServices>, action: Option<&str>) -> ActionHandler {
    let request = ActionRequest {
        action: action.map(str::to_string),
        model: Some("Order".to_string()),
        data: Some(order()),
    };
    ActionHandler::for_request(services.clone(), request)
}
