// SPDX-License-Identifier: MIT

//! Operation journal types. The lock + journal *persistence* lives in
//! `warden-storage`; this module only carries the FSM vocabulary so external
//! provider-operation collaborators and the storage layer agree on shape.

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a journaled external-provider operation.
    pub struct OperationId("opj-");
}

/// What kind of external operation this journal entry tracks. Each kind has
/// its own FSM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Ingest,
    Credentials,
}

crate::simple_display! {
    OperationKind {
        Ingest => "ingest",
        Credentials => "credentials",
    }
}

/// FSM state for a journaled operation. The `Ingest` and `Credentials` kinds
/// use disjoint state subsets; `is_terminal` is true for every `Done*`
/// variant regardless of kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalState {
    Validating,
    CreatingRemote,
    ResolvingExisting,
    FetchingHierarchy,
    PersistingIssueState,
    AutoSelecting,
    AutoStartingRun,
    PersistingSecret,
    ReconcilingWorktree,
    RecordingStatus,
    DoneSuccess,
    DonePartial,
    DoneError,
}

impl JournalState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JournalState::DoneSuccess | JournalState::DonePartial | JournalState::DoneError)
    }
}

crate::simple_display! {
    JournalState {
        Validating => "validating",
        CreatingRemote => "creating_remote",
        ResolvingExisting => "resolving_existing",
        FetchingHierarchy => "fetching_hierarchy",
        PersistingIssueState => "persisting_issue_state",
        AutoSelecting => "auto_selecting",
        AutoStartingRun => "auto_starting_run",
        PersistingSecret => "persisting_secret",
        ReconcilingWorktree => "reconciling_worktree",
        RecordingStatus => "recording_status",
        DoneSuccess => "done_success",
        DonePartial => "done_partial",
        DoneError => "done_error",
    }
}

/// One append-only journal entry / snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationJournal {
    pub operation_id: OperationId,
    pub kind: OperationKind,
    pub state: JournalState,
    pub issue_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default)]
    pub checkpoint: serde_json::Map<String, serde_json::Value>,
}

impl OperationJournal {
    pub fn new(operation_id: OperationId, kind: OperationKind, issue_ref: impl Into<String>) -> Self {
        Self {
            operation_id,
            kind,
            state: JournalState::Validating,
            issue_ref: issue_ref.into(),
            provider: None,
            checkpoint: serde_json::Map::new(),
        }
    }
}

#[cfg(test)]
#[path = "journal_tests.rs"]
mod tests;
