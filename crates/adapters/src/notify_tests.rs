use super::fake::FakeNotifyAdapter;
use super::NotifyAdapter;

#[tokio::test]
async fn fake_notify_adapter_records_calls() {
    let adapter = FakeNotifyAdapter::new();

    adapter.notify("Run finished", "owner/repo#42 completed").await.unwrap();
    adapter.notify("Run stopped", "owner/repo#7 stopped").await.unwrap();

    let calls = adapter.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].title, "Run finished");
    assert_eq!(calls[1].message, "owner/repo#7 stopped");
}

#[tokio::test]
async fn fake_notify_adapter_starts_with_no_calls() {
    let adapter = FakeNotifyAdapter::new();

    assert!(adapter.calls().is_empty());
}

#[tokio::test]
async fn desktop_notify_adapter_construction_does_not_panic() {
    let _adapter = super::DesktopNotifyAdapter::new();
}
