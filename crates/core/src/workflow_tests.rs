// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn workflow_name_is_default_only_for_literal_default() {
    assert!(WorkflowName::new("default").is_default());
    assert!(!WorkflowName::new("quick-fix").is_default());
}

#[test]
fn workflow_name_display() {
    assert_eq!(WorkflowName::new("quick-fix").to_string(), "quick-fix");
}

#[test]
fn phase_partial_eq_str() {
    let phase = Phase::new("implement");
    assert_eq!(phase, *"implement");
    assert_eq!(phase, "implement");
}

#[test]
fn provider_map_provider_canonicalizes_aliases() {
    assert_eq!(Provider::map_provider("claude").unwrap(), Provider::Claude);
    assert_eq!(Provider::map_provider("Claude-Code").unwrap(), Provider::Claude);
    assert_eq!(Provider::map_provider("anthropic").unwrap(), Provider::Claude);
    assert_eq!(Provider::map_provider("codex").unwrap(), Provider::Codex);
    assert_eq!(Provider::map_provider("openai-codex").unwrap(), Provider::Codex);
    assert_eq!(Provider::map_provider("FAKE").unwrap(), Provider::Fake);
    assert_eq!(Provider::map_provider("noop").unwrap(), Provider::Fake);
}

#[test]
fn provider_map_provider_fails_loudly_on_unknown() {
    let err = Provider::map_provider("gpt-5").unwrap_err();
    assert_eq!(err.0, "gpt-5");
    assert_eq!(err.to_string(), "unknown provider: \"gpt-5\"");
}

#[test]
fn provider_display() {
    assert_eq!(Provider::Claude.to_string(), "claude");
    assert_eq!(Provider::Codex.to_string(), "codex");
    assert_eq!(Provider::Fake.to_string(), "fake");
}
