use super::*;
use crate::memory::RecordingFrame;

#[test]
fn origin_strips_path_and_query() {
    assert_eq!(origin_of("https://a.example/app/index.html?x=1").as_deref(), Some("https://a.example"));
}

#[test]
fn origin_keeps_non_default_port() {
    assert_eq!(origin_of("http://localhost:5000/").as_deref(), Some("http://localhost:5000"));
}

#[test]
fn origin_drops_default_port() {
    assert_eq!(origin_of("https://a.example:443/x").as_deref(), Some("https://a.example"));
}

#[test]
fn origin_of_garbage_is_none() {
    assert!(origin_of("not a url").is_none());
}

#[test]
fn expected_origin_follows_source() {
    let frame = RecordingFrame::new();
    assert!(expected_origin(&*frame).is_none());
    frame.set_source("https://b.example/page");
    assert_eq!(expected_origin(&*frame).as_deref(), Some("https://b.example"));
}

#[test]
fn same_source_ignores_browser_normalization() {
    assert!(same_source("https://a.example/", "https://a.example"));
    assert!(same_source("https://A.example:443/app", "https://a.example/app"));
    assert!(!same_source("https://a.example/app", "https://a.example/other"));
    assert!(!same_source("https://a.example/", "https://b.example/"));
}

#[test]
fn same_source_compares_unparseable_values_verbatim() {
    assert!(same_source("about blank", "about blank"));
    assert!(!same_source("about blank", "https://a.example/"));
}
