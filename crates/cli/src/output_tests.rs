// SPDX-License-Identifier: MIT

use serde::Serialize;

use super::{format_or_json, OutputFormat};

#[derive(Debug, Clone, Serialize)]
struct FakeEntry {
    name: String,
    detail: String,
}

#[test]
fn format_or_json_renders_json_when_requested() {
    let entry = FakeEntry { name: "a".into(), detail: "d1".into() };
    let result = format_or_json(OutputFormat::Json, &entry, || panic!("text_fn should not run"));
    assert!(result.is_ok());
}

#[test]
fn format_or_json_calls_text_fn_for_text_format() {
    let entry = FakeEntry { name: "a".into(), detail: "d1".into() };
    let mut called = false;
    let result = format_or_json(OutputFormat::Text, &entry, || called = true);
    assert!(result.is_ok());
    assert!(called);
}

#[test]
fn output_format_defaults_to_text() {
    assert_eq!(OutputFormat::default(), OutputFormat::Text);
}
