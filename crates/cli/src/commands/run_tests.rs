use super::*;
use tempfile::tempdir;
use warden_core::test_support::issue_json;
use warden_storage::IssueStore;

fn base_args(data_dir: std::path::PathBuf, worktree: std::path::PathBuf) -> RunArgs {
    RunArgs {
        issue: IssueLocator { issue: "acme/widgets#1".to_string(), data_dir },
        worktree,
        runner_bin: std::path::PathBuf::from("/no/such/runner"),
        workflow: None,
        provider: "fake".to_string(),
        max_parallel_tasks: None,
        max_iterations: Some(1),
        iteration_timeout_sec: 3600,
        inactivity_timeout_sec: 600,
        watchdog_poll_ms: 150,
        provider_lock_timeout_sec: 30,
    }
}

#[tokio::test]
async fn run_rejects_an_issue_with_no_issue_json() {
    let dir = tempdir().unwrap();
    let worktree = dir.path().join("worktree");
    std::fs::create_dir_all(&worktree).unwrap();
    let args = base_args(dir.path().join("data"), worktree);

    let result = run(args).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn run_completes_immediately_when_issue_is_already_on_a_terminal_phase() {
    let dir = tempdir().unwrap();
    let data_dir = dir.path().join("data");
    let worktree = dir.path().join("worktree");
    std::fs::create_dir_all(&worktree).unwrap();

    let mut args = base_args(data_dir.clone(), worktree);
    let (issue_ref, state_dir) = args.issue.resolve().unwrap();
    std::fs::create_dir_all(&state_dir).unwrap();
    let mut issue = issue_json("done");
    issue.workflow = "default".to_string();
    IssueStore::new().write_issue_json(&state_dir, &issue).unwrap();
    args.issue.issue = issue_ref.to_string();

    let result = run(args).await;
    assert!(result.is_ok());
}

#[test]
fn decline_quick_fix_always_declines() {
    let oracle = DeclineQuickFix;
    let issue = issue_json("design");
    let decided =
        tokio::runtime::Runtime::new().unwrap().block_on(oracle.decide_quick_fix_routing(&issue));
    assert_eq!(decided, Ok(false));
}
