// SPDX-License-Identifier: MIT

//! Workflow/phase naming and the runner provider tagged variant.
//!
//! The workflow engine itself (resolving `(phase, issue) -> next phase`) is
//! an external collaborator — this module only carries the vocabulary both
//! the engine and the orchestrator need to agree on.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of an installed workflow (e.g. `"default"`, `"quick-fix"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowName(pub String);

impl WorkflowName {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_default(&self) -> bool {
        self.0 == "default"
    }
}

impl fmt::Display for WorkflowName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for WorkflowName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for WorkflowName {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// A named step in a workflow. Opaque to the orchestrator beyond string
/// equality — only the workflow engine interprets phase semantics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Phase(pub String);

impl Phase {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Phase {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Phase {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl PartialEq<str> for Phase {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Phase {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// The runner provider, modeled as a tagged variant. `map_provider`
/// canonicalizes aliases and fails loudly on unknowns rather than silently
/// defaulting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Claude,
    Codex,
    /// In-process fake runner for tests and local dry-runs.
    Fake,
}

crate::simple_display! {
    Provider {
        Claude => "claude",
        Codex => "codex",
        Fake => "fake",
    }
}

/// An unrecognized provider name was given to `map_provider`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown provider: {0:?}")]
pub struct InvalidProvider(pub String);

impl Provider {
    /// Canonicalize a provider name (case-insensitive, with common aliases).
    /// Fails loudly rather than silently defaulting to a provider.
    pub fn map_provider(name: &str) -> Result<Self, InvalidProvider> {
        match name.to_ascii_lowercase().as_str() {
            "claude" | "claude-code" | "anthropic" => Ok(Provider::Claude),
            "codex" | "openai-codex" => Ok(Provider::Codex),
            "fake" | "noop" | "test" => Ok(Provider::Fake),
            other => Err(InvalidProvider(other.to_string())),
        }
    }
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
