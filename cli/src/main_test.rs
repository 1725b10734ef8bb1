use serde_json::json;

use super::*;

fn script(value: Value) -> Script {
    serde_json::from_value(value).expect("script")
}

fn kinds(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .map(|line| {
            let value: Value = serde_json::from_str(line).expect("json line");
            value["kind"].as_str().unwrap_or_default().to_owned()
        })
        .collect()
}

fn base() -> Value {
    json!({
        "origin": "https://a.example",
        "options": {
            "url": "https://a.example/embed",
            "width": 800,
            "height": 600,
            "displayScopePath": "/doc"
        },
        "scenes": { "/doc": 3 },
        "scene": "/doc/1",
        "steps": []
    })
}

#[test]
fn options_default_to_clicker_only() {
    let parsed = script(base());
    assert!(parsed.options.use_clicker);
    assert!(!parsed.options.use_selector);
    assert_eq!(parsed.room_id, "simulated");
}

#[test]
fn steps_parse_by_type() {
    let mut value = base();
    value["steps"] = json!([
        { "type": "load" },
        { "type": "message", "data": { "kind": "NextPage" } },
        { "type": "state", "tool": "clicker" },
        { "type": "broadcast", "event": "tick", "author": 9 },
        { "type": "phase", "phase": "playing" },
        { "type": "mount" }
    ]);
    let parsed = script(value);
    assert_eq!(parsed.steps.len(), 6);
    assert!(matches!(parsed.steps[3], Step::Broadcast { author: 9, .. }));
    assert!(matches!(parsed.steps[4], Step::Phase { phase: PlayerPhase::Playing }));
}

#[test]
fn simulate_prints_posted_messages() {
    let mut value = base();
    value["steps"] = json!([
        { "type": "load" },
        { "type": "message", "data": { "kind": "RegisterMagixEvent", "payload": "tick" } },
        { "type": "broadcast", "event": "tick", "payload": { "n": 1 }, "author": 9 },
        { "type": "message", "origin": "https://evil.example", "data": { "kind": "GetAttributes" } },
        { "type": "state", "scene": "/doc/2" }
    ]);

    let lines = simulate(script(value)).expect("simulate");

    assert_eq!(kinds(&lines), vec!["Init", "ReciveMagixEvent", "RoomStateChanged"]);
}

#[test]
fn simulate_waits_for_mount() {
    let mut value = base();
    value["mountLater"] = json!(true);
    value["steps"] = json!([
        { "type": "load" },
        { "type": "mount" },
        { "type": "load" }
    ]);

    let lines = simulate(script(value)).expect("simulate");

    assert_eq!(kinds(&lines), vec!["Init"]);
}

#[test]
fn simulate_rejects_invalid_options() {
    let mut value = base();
    value["options"]["width"] = json!(0);
    assert!(matches!(simulate(script(value)), Err(CliError::Bridge(BridgeError::InvalidOptions(_)))));
}
