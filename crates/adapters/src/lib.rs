// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! warden-adapters: the I/O edges the engine depends on as traits --
//! desktop notifications, subprocess execution, and git worktree
//! sandboxing for runner processes and parallel task workers.

pub mod notify;
pub mod spawner;
pub mod subprocess;
pub mod worktree;

pub use notify::{DesktopNotifyAdapter, NotifyAdapter, NotifyError};
#[cfg(any(test, feature = "test-support"))]
pub use notify::{FakeNotifyAdapter, NotifyCall};
pub use spawner::{spawn_runner, RunnerEnv, RunnerHandle, RunnerSpawnInputs, SpawnerError};
pub use subprocess::{exit_code_of, run_with_timeout, SubprocessError, GIT_WORKTREE_TIMEOUT, SHELL_COMMAND_TIMEOUT};
pub use worktree::{create_worktree, remove_worktree, WorktreeError};
