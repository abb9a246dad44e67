use actiondesk_core::{
    TemplateKind, Value,
    context::Bindings,
    format::FieldFormatter,
    mapper::{MemoryMapper, Property},
    selection::MemoryCatalog,
};
use pretty_assertions::assert_eq;
use serde_json::json;

use super::{default_services, order_handler};

#[tokio::test]
async fn test_render_script_template_with_filters() {
    let (services, _) = default_services();
    let handler = order_handler(&services, None);

    let rendered = handler
        .render_template(
            TemplateKind::Script,
            "Order ${name}: ${state | text}, customer kind ${customer?.kind | text}${missing | e}",
        )
        .await
        .unwrap();
    assert_eq!(rendered, "Order SO-1: Draft, customer kind Label One");
}

#[tokio::test]
async fn test_render_plain_template_skips_rewriting() {
    let (services, _) = default_services();
    let handler = order_handler(&services, None);

    let rendered = handler
        .render_template(TemplateKind::Plain, "Hello ${name}, ${missing}")
        .await
        .unwrap();
    assert_eq!(rendered, "Hello SO-1, null");

    assert!(
        handler
            .render_template(TemplateKind::Plain, "${state | text}")
            .await
            .is_err()
    );
}

#[tokio::test]
async fn test_blank_template_renders_empty() {
    let (services, _) = default_services();
    let handler = order_handler(&services, None);

    for kind in [TemplateKind::Script, TemplateKind::Plain] {
        assert_eq!(handler.render_template(kind, " \n ").await.unwrap(), "");
    }
}

#[tokio::test]
async fn test_xml_template_escapes_values() {
    let (services, _) = default_services();
    let handler = order_handler(&services, None);

    let rendered = handler
        .render_template(
            TemplateKind::Script,
            "<?xml version=\"1.0\"?>\n<order note=\"${note}\">${missing}${state | text}</order>",
        )
        .await
        .unwrap();
    assert_eq!(
        rendered,
        "<?xml version=\"1.0\"?>\n<order note=\"a &lt; b\">Draft</order>"
    );
}

#[tokio::test]
async fn test_template_reaches_handler_helpers() {
    let (services, _) = default_services();
    let handler = order_handler(&services, None);

    let rendered = handler
        .render_template(
            TemplateKind::Script,
            "${__me__.selectOne('self.name FROM Partner self WHERE self.code = :customerCode')}${__fmt__.info('rendered {}', name)}",
        )
        .await
        .unwrap();
    assert_eq!(rendered, "ACMEnull");
}

#[tokio::test]
async fn test_render_does_not_leak_into_bindings() {
    let (services, _) = default_services();
    let handler = order_handler(&services, None);
    let before = handler.bindings().len();

    handler
        .render_template(TemplateKind::Script, "${state | text}")
        .await
        .unwrap();
    assert_eq!(handler.bindings().len(), before);
    assert!(!handler.bindings().contains("__fmt__"));
}

#[test]
fn test_formatter_titles_nested_selection() {
    let mapper = MemoryMapper::new();
    mapper.register("Holder", "a", Property::default().with_target("Inner"));
    mapper.register("Inner", "b", Property::default().with_selection("codes"));
    let catalog = MemoryCatalog::new();
    catalog.register("codes", "CODE1", "Label One");
    let scope = Bindings::new();
    let formatter = FieldFormatter::new(None, &scope, &mapper, &catalog);

    let root = Value::from(json!({"_model": "Holder", "a": {"b": "CODE1"}}));
    assert_eq!(formatter.text_of(&root, "a.b"), "Label One");
    assert_eq!(formatter.text_of(&root, "a?.b"), "Label One");

    let unmapped = MemoryMapper::new();
    let formatter = FieldFormatter::new(None, &scope, &unmapped, &catalog);
    assert_eq!(formatter.text_of(&root, "a.b"), "CODE1");
    assert_eq!(formatter.text_of(&Value::Null, "a.b"), "");
}
