use memory_store::{LocalBackend, Record, StorageBackend};
use serde_json::json;
use tempfile::TempDir;

fn record(value: serde_json::Value) -> Record {
    value.as_object().cloned().unwrap()
}

/// Shared root at the temp dir, records under `mcp-data`
fn backend() -> (TempDir, LocalBackend) {
    let dir = tempfile::tempdir().unwrap();
    let backend = LocalBackend::new(dir.path().join("mcp-data"), Some(dir.path().to_path_buf()));
    (dir, backend)
}

#[tokio::test]
async fn test_record_round_trip() {
    let (dir, backend) = backend();
    let tasks = record(json!({"tasks": [{"id": "TASK-1"}]}));

    backend.save_record("tasks.json", &tasks).await.unwrap();

    assert_eq!(backend.load_record("tasks.json").await, tasks);
    assert!(dir.path().join("mcp-data/tasks.json").is_file());
}

#[tokio::test]
async fn test_missing_record_is_empty() {
    let (_dir, backend) = backend();
    assert!(backend.load_record("never_written.json").await.is_empty());
}

#[tokio::test]
async fn test_malformed_record_is_empty() {
    let (dir, backend) = backend();
    std::fs::write(dir.path().join("mcp-data/broken.json"), "{\"tasks\": [").unwrap();
    std::fs::write(dir.path().join("mcp-data/list.json"), "[1, 2, 3]").unwrap();

    assert!(backend.load_record("broken.json").await.is_empty());
    assert!(backend.load_record("list.json").await.is_empty());
}

#[tokio::test]
async fn test_record_save_replaces_content() {
    let (_dir, backend) = backend();
    backend
        .save_record("decisions.json", &record(json!({"decisions": [1, 2]})))
        .await
        .unwrap();
    backend
        .save_record("decisions.json", &record(json!({"decisions": []})))
        .await
        .unwrap();

    assert_eq!(
        backend.load_record("decisions.json").await,
        record(json!({"decisions": []}))
    );
}

#[tokio::test]
async fn test_write_creates_parent_directories() {
    let (dir, backend) = backend();
    backend
        .write_blob("daily/2026/01/03.md", "# Notes\n")
        .await
        .unwrap();

    assert_eq!(
        std::fs::read_to_string(dir.path().join("daily/2026/01/03.md")).unwrap(),
        "# Notes\n"
    );
    assert_eq!(
        backend.read_blob("daily/2026/01/03.md").await.as_deref(),
        Some("# Notes\n")
    );
}

#[tokio::test]
async fn test_read_missing_blob() {
    let (_dir, backend) = backend();
    assert_eq!(backend.read_blob("nope.md").await, None);
    assert!(!backend.exists("nope.md").await);
}

#[tokio::test]
async fn test_read_falls_back_to_latin1() {
    let (dir, backend) = backend();
    std::fs::write(dir.path().join("legacy.txt"), [b'c', b'a', b'f', 0xE9]).unwrap();

    assert_eq!(backend.read_blob("legacy.txt").await.as_deref(), Some("café"));
}

#[tokio::test]
async fn test_append_on_absent_path_writes() {
    let (_dir, backend) = backend();
    backend.append_blob("logs/a.md", "first\n").await.unwrap();
    assert_eq!(backend.read_blob("logs/a.md").await.as_deref(), Some("first\n"));

    backend.append_blob("logs/a.md", "second\n").await.unwrap();
    assert_eq!(
        backend.read_blob("logs/a.md").await.as_deref(),
        Some("first\nsecond\n")
    );
}

#[tokio::test]
async fn test_list_newest_first() {
    let (_dir, backend) = backend();
    for name in ["2026-01-01.md", "2026-01-03.md", "2026-01-02.md"] {
        backend
            .write_blob(&format!("logs/{}", name), "entry")
            .await
            .unwrap();
    }
    backend.write_blob("logs/notes.txt", "other").await.unwrap();
    backend.write_blob("logs/2026-01-04.md.bak", "old").await.unwrap();

    assert_eq!(
        backend.list_blobs("logs", "*.md").await,
        vec!["logs/2026-01-03.md", "logs/2026-01-02.md", "logs/2026-01-01.md"]
    );
}

#[tokio::test]
async fn test_list_missing_or_empty_directory() {
    let (dir, backend) = backend();
    std::fs::create_dir(dir.path().join("empty")).unwrap();

    assert!(backend.list_blobs("empty", "*.md").await.is_empty());
    assert!(backend.list_blobs("missing", "*.md").await.is_empty());
}

#[tokio::test]
async fn test_paths_are_normalized() {
    let (_dir, backend) = backend();
    backend.write_blob("/logs//a.md", "x").await.unwrap();

    assert!(backend.exists("logs/a.md").await);
    assert!(backend.exists("logs/./a.md").await);
    assert_eq!(backend.list_blobs("/logs/", "*").await, vec!["logs/a.md"]);
}

#[tokio::test]
async fn test_traversal_is_rejected() {
    let (_dir, backend) = backend();
    assert!(backend.write_blob("../outside.md", "x").await.is_err());
    assert_eq!(backend.read_blob("../outside.md").await, None);
    assert!(!backend.exists("../outside.md").await);
}
