//! End-to-end pipeline tests: device-list payload in, rendered
//! advertisements out, including the shipped firmware templates.

use std::fs;

use mqtt_bridge_discovery::bridge::render_batch;
use mqtt_bridge_discovery::{BridgeError, TemplateStore};
use tempfile::TempDir;

fn store_with(templates: &[(&str, &str)]) -> (TempDir, TemplateStore) {
    let dir = TempDir::new().unwrap();
    for (name, content) in templates {
        fs::write(dir.path().join(name), content).unwrap();
    }
    let store = TemplateStore::open(dir.path()).unwrap();
    (dir, store)
}

#[test]
fn test_full_inventory_renders_one_advertisement_per_known_firmware() {
    let (_dir, store) = store_with(&[
        ("led-pwm.yaml", "light:\n  unique_id: {{ device.id }}\n  name: {{ device.alias }}"),
        ("motion-detector.yaml", "binary_sensor:\n  unique_id: {{ device.id }}"),
        ("climate-monitor.yaml", "sensor:\n  unique_id: {{ device.id }}"),
    ]);

    // inventory shape as published by the gateway
    let payload = br#"[
        {"id": "72335554ea02", "alias": "led-pwm:terasa:0"},
        {"id": "d704ee327346", "alias": "motion-detector:terasa:0"},
        {"id": "13d444d82727", "alias": "doorbell:bell:0"},
        {"id": "eaf0e05f9dfa", "alias": "climate-monitor:0"},
        {"id": "e450ffcccdba", "alias": "motion-detector:schodiste:1"}
    ]"#;

    let rendered = render_batch(&store, payload).unwrap();

    // doorbell has no template and is skipped; everything else renders in order
    let ids: Vec<&str> = rendered.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(
        ids,
        ["72335554ea02", "d704ee327346", "eaf0e05f9dfa", "e450ffcccdba"]
    );
    assert!(rendered[0].1.contains("unique_id: 72335554ea02"));
    assert!(rendered[0].1.contains("name: led-pwm:terasa:0"));
}

#[test]
fn test_malformed_message_is_discarded_and_next_one_processed() {
    let (_dir, store) = store_with(&[("led-pwm.yaml", "unique_id: {{ device.id }}")]);

    // an object instead of a list
    let malformed = br#"{"id": "72335554ea02", "alias": "led-pwm:terasa:0"}"#;
    assert!(matches!(
        render_batch(&store, malformed),
        Err(BridgeError::Payload(_))
    ));

    // a list element missing its alias
    let missing_alias = br#"[{"id": "72335554ea02"}]"#;
    assert!(matches!(
        render_batch(&store, missing_alias),
        Err(BridgeError::Payload(_))
    ));

    // the next valid message still renders
    let valid = br#"[{"id": "72335554ea02", "alias": "led-pwm:terasa:0"}]"#;
    let rendered = render_batch(&store, valid).unwrap();
    assert_eq!(rendered.len(), 1);
    assert_eq!(rendered[0].1, "unique_id: 72335554ea02");
}

#[test]
fn test_shipped_firmware_templates_render() {
    let store = TemplateStore::open("firmware").unwrap();
    assert!(!store.is_empty());

    let payload = br#"[
        {"id": "72335554ea02", "alias": "led-pwm:terasa:0"},
        {"id": "eaf0e05f9dfa", "alias": "climate-monitor:0"}
    ]"#;

    let rendered = render_batch(&store, payload).unwrap();
    assert_eq!(rendered.len(), 2);
    for (_, advertisement) in &rendered {
        assert!(advertisement.contains("unique_id"));
    }
}
