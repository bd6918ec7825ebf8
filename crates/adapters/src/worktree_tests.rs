use super::*;
use tempfile::tempdir;
use tokio::process::Command as TokioCommand;

async fn run(repo: &Path, args: &[&str]) {
    let status = TokioCommand::new("git")
        .args(args)
        .current_dir(repo)
        .status()
        .await
        .expect("git command spawned");
    assert!(status.success(), "git {args:?} failed");
}

async fn init_repo_with_commit(repo: &Path) {
    run(repo, &["init", "-q"]).await;
    run(repo, &["config", "user.email", "test@example.com"]).await;
    run(repo, &["config", "user.name", "Test"]).await;
    tokio::fs::write(repo.join("README.md"), b"hello\n").await.unwrap();
    run(repo, &["add", "."]).await;
    run(repo, &["commit", "-q", "-m", "initial"]).await;
}

#[tokio::test]
async fn create_worktree_checks_out_new_branch() {
    let repo_dir = tempdir().unwrap();
    init_repo_with_commit(repo_dir.path()).await;
    let worktree_dir = tempdir().unwrap();
    let worktree_path = worktree_dir.path().join("wt");

    create_worktree(repo_dir.path(), &worktree_path, "task/1", None).await.unwrap();

    assert!(worktree_path.join("README.md").exists());
    assert!(worktree_path.join(".git").is_file());
}

#[tokio::test]
async fn remove_worktree_deletes_directory_and_branch() {
    let repo_dir = tempdir().unwrap();
    init_repo_with_commit(repo_dir.path()).await;
    let worktree_dir = tempdir().unwrap();
    let worktree_path = worktree_dir.path().join("wt");
    create_worktree(repo_dir.path(), &worktree_path, "task/2", None).await.unwrap();

    remove_worktree(&worktree_path, Some("task/2")).await.unwrap();

    assert!(!worktree_path.exists());
}

#[tokio::test]
async fn remove_worktree_on_plain_directory_just_removes_it() {
    let dir = tempdir().unwrap();
    let plain = dir.path().join("plain");
    tokio::fs::create_dir_all(&plain).await.unwrap();
    tokio::fs::write(plain.join("file.txt"), b"hi").await.unwrap();

    remove_worktree(&plain, None).await.unwrap();

    assert!(!plain.exists());
}

#[tokio::test]
async fn create_worktree_fails_loudly_for_nonexistent_repo() {
    let worktree_dir = tempdir().unwrap();
    let worktree_path = worktree_dir.path().join("wt");

    let result =
        create_worktree(Path::new("/nonexistent/repo/path"), &worktree_path, "task/3", None).await;

    assert!(result.is_err());
}
