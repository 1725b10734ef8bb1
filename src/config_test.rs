use std::collections::HashMap;

use super::*;

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn defaults_when_nothing_set() {
    let cfg = BridgeConfig::from_lookup(lookup(&[])).expect("config");
    assert_eq!(cfg, BridgeConfig::default());
    assert_eq!(cfg.duplicate_policy, DuplicatePolicy::ReturnExisting);
    assert_eq!(cfg.element_id, DEFAULT_ELEMENT_ID);
    assert_eq!(cfg.interactive_tools, vec![CLICKER.to_owned()]);
    assert_eq!(cfg.target_origin, "*");
}

#[test]
fn overrides_are_applied() {
    let cfg = BridgeConfig::from_lookup(lookup(&[
        ("IFRAME_BRIDGE_DUPLICATE_POLICY", "reject"),
        ("IFRAME_BRIDGE_ELEMENT_ID", "Embed"),
        ("IFRAME_BRIDGE_INTERACTIVE_TOOLS", "clicker, hand ,,laser"),
        ("IFRAME_BRIDGE_TARGET_ORIGIN", "https://a.example"),
    ]))
    .expect("config");
    assert_eq!(cfg.duplicate_policy, DuplicatePolicy::Reject);
    assert_eq!(cfg.element_id, "Embed");
    assert_eq!(cfg.interactive_tools, vec!["clicker", "hand", "laser"]);
    assert_eq!(cfg.target_origin, "https://a.example");
}

#[test]
fn unknown_policy_is_config_error() {
    let err = BridgeConfig::from_lookup(lookup(&[("IFRAME_BRIDGE_DUPLICATE_POLICY", "overwrite")])).unwrap_err();
    assert!(matches!(err, BridgeError::Config(ref msg) if msg.contains("overwrite")));
}

#[test]
fn selector_is_added_on_request() {
    let cfg = BridgeConfig::default();
    assert_eq!(cfg.allowed_tools(false), vec!["clicker"]);
    assert_eq!(cfg.allowed_tools(true), vec!["clicker", "selector"]);
}

#[test]
fn selector_is_not_duplicated() {
    let cfg = BridgeConfig { interactive_tools: vec!["selector".to_owned()], ..BridgeConfig::default() };
    assert_eq!(cfg.allowed_tools(true), vec!["selector"]);
}
