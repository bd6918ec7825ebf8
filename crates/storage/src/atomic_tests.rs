use super::*;
use tempfile::tempdir;

#[yare::parameterized(
    simple = {"hello"},
    empty = {""},
    multiline = {"line one\nline two\n"},
)]
fn write_bytes_atomic_roundtrips(body: &str) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("out.txt");

    write_bytes_atomic(&path, body.as_bytes()).unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), body);
}

#[test]
fn write_json_atomic_overwrites_existing_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("issue.json");

    write_json_atomic(&path, &serde_json::json!({"phase": "design"})).unwrap();
    write_json_atomic(&path, &serde_json::json!({"phase": "implement"})).unwrap();

    let body = std::fs::read_to_string(&path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["phase"], "implement");
}

#[test]
fn write_json_atomic_leaves_no_temp_file_behind() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("issue.json");

    write_json_atomic(&path, &serde_json::json!({"phase": "design"})).unwrap();

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().contains(".tmp-"))
        .collect();
    assert!(leftovers.is_empty(), "temp file left behind: {leftovers:?}");
}

#[test]
fn write_json_atomic_creates_parent_directories() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("deeper").join("issue.json");

    write_json_atomic(&path, &serde_json::json!({"phase": "design"})).unwrap();

    assert!(path.exists());
}

#[test]
fn append_text_creates_file_then_appends() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("progress.txt");

    append_text(&path, "first\n").unwrap();
    append_text(&path, "second\n").unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");
}
