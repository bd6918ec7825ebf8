use super::*;
use tempfile::tempdir;

#[test]
fn acquire_on_empty_state_dir_succeeds() {
    let dir = tempdir().unwrap();
    let lock = OperationLock::new(dir.path());

    let outcome = lock.acquire("opj-1", "owner/repo#1", Duration::from_secs(60)).unwrap();

    assert_eq!(outcome, AcquireOutcome::Acquired);
    assert!(dir.path().join(".lock").exists());
}

#[test]
fn acquire_while_live_holder_present_reports_busy() {
    let dir = tempdir().unwrap();
    let lock = OperationLock::new(dir.path());
    lock.acquire("opj-1", "owner/repo#1", Duration::from_secs(60)).unwrap();

    let outcome = lock.acquire("opj-2", "owner/repo#1", Duration::from_secs(60)).unwrap();

    assert_eq!(outcome, AcquireOutcome::Busy { holder_operation_id: "opj-1".to_string() });
}

#[test]
fn acquire_past_ttl_cleans_stale_lock_and_reports_it() {
    let dir = tempdir().unwrap();
    let lock = OperationLock::new(dir.path());
    let stale = LockContents {
        operation_id: "opj-stale".to_string(),
        issue_ref: "owner/repo#1".to_string(),
        pid: std::process::id(),
        acquired_at_ms: 0,
    };
    write_json_atomic(&dir.path().join(".lock"), &stale).unwrap();

    let outcome = lock.acquire("opj-new", "owner/repo#1", Duration::from_millis(1)).unwrap();

    assert_eq!(outcome, AcquireOutcome::StaleCleaned);
    let contents = std::fs::read_to_string(dir.path().join(".lock")).unwrap();
    assert!(contents.contains("opj-new"));
}

#[test]
fn acquire_with_dead_pid_cleans_stale_lock_even_within_ttl() {
    let dir = tempdir().unwrap();
    let lock = OperationLock::new(dir.path());
    let stale = LockContents {
        operation_id: "opj-stale".to_string(),
        issue_ref: "owner/repo#1".to_string(),
        pid: u32::MAX,
        acquired_at_ms: now_ms(),
    };
    write_json_atomic(&dir.path().join(".lock"), &stale).unwrap();

    let outcome = lock.acquire("opj-new", "owner/repo#1", Duration::from_secs(3600)).unwrap();

    assert_eq!(outcome, AcquireOutcome::StaleCleaned);
}

#[test]
fn release_removes_lock_file() {
    let dir = tempdir().unwrap();
    let lock = OperationLock::new(dir.path());
    lock.acquire("opj-1", "owner/repo#1", Duration::from_secs(60)).unwrap();

    lock.release().unwrap();

    assert!(!dir.path().join(".lock").exists());
}

#[test]
fn release_on_absent_lock_is_not_an_error() {
    let dir = tempdir().unwrap();
    let lock = OperationLock::new(dir.path());

    assert!(lock.release().is_ok());
}

#[test]
fn acquire_after_release_succeeds_again() {
    let dir = tempdir().unwrap();
    let lock = OperationLock::new(dir.path());
    lock.acquire("opj-1", "owner/repo#1", Duration::from_secs(60)).unwrap();
    lock.release().unwrap();

    let outcome = lock.acquire("opj-2", "owner/repo#1", Duration::from_secs(60)).unwrap();

    assert_eq!(outcome, AcquireOutcome::Acquired);
}
