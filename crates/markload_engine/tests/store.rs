use std::fs;

use chrono::Utc;
use markload_core::{EnqueueRequest, QueueState, QueueStatus};
use markload_engine::{
    ensure_dir, write_atomically, ArtifactWriter, JsonFileStore, StateStore, StoreError,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

#[test]
fn missing_file_reads_as_empty_queue() {
    let temp = TempDir::new().unwrap();
    let store = JsonFileStore::new(temp.path().join("state.json"));
    assert_eq!(store.read().unwrap(), QueueState::default());
}

#[test]
fn written_state_reads_back() {
    let temp = TempDir::new().unwrap();
    let store = JsonFileStore::new(temp.path().join("nested").join("state.json"));

    let mut state = QueueState::new();
    let id = state
        .enqueue(EnqueueRequest::new("https://example.com/a"), Utc::now())
        .unwrap();
    state.begin_submission(id);
    state.record_job(id, "j1");
    store.write(&state).unwrap();

    let loaded = store.read().unwrap();
    assert_eq!(loaded, state);
    let item = loaded.item(id).unwrap();
    assert_eq!(item.status, QueueStatus::Processing);
    assert_eq!(item.job_id.as_deref(), Some("j1"));
}

#[test]
fn document_uses_wire_field_names() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("state.json");
    let store = JsonFileStore::new(&path);

    let mut state = QueueState::new();
    state
        .enqueue(EnqueueRequest::new("https://example.com/a"), Utc::now())
        .unwrap();
    store.write(&state).unwrap();

    let raw = fs::read_to_string(&path).unwrap();
    assert!(raw.contains("\"queue\""));
    assert!(raw.contains("\"ready\""));
    assert!(raw.contains("\"contentType\": \"article\""));
    assert!(raw.contains("\"status\": \"pending\""));
    assert!(raw.contains("\"addedAt\""));
}

#[test]
fn document_without_ready_list_still_loads() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("state.json");
    fs::write(&path, r#"{"queue": []}"#).unwrap();

    let state = JsonFileStore::new(&path).read().unwrap();
    assert!(state.queue.is_empty());
    assert!(state.ready.is_empty());
}

#[test]
fn malformed_document_is_a_format_error() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("state.json");
    fs::write(&path, "{ not json").unwrap();

    let err = JsonFileStore::new(&path).read().unwrap_err();
    assert!(matches!(err, StoreError::Format(_)));
}

#[test]
fn atomic_write_replaces_whole_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("out.md");
    write_atomically(&path, b"a much longer first version").unwrap();
    write_atomically(&path, b"short").unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "short");
    let entries = fs::read_dir(temp.path()).unwrap().count();
    assert_eq!(entries, 1, "no temp files left behind");
}

#[test]
fn ensure_dir_rejects_a_file() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("occupied");
    fs::write(&file, "x").unwrap();

    let err = ensure_dir(&file).unwrap_err();
    assert!(matches!(err, StoreError::Directory(_)));
}

#[test]
fn artifact_writer_sanitizes_and_overwrites() {
    let temp = TempDir::new().unwrap();
    let writer = ArtifactWriter::new(temp.path().join("output"));

    let first = writer.write("notes: draft", "# One").unwrap();
    assert_eq!(first, temp.path().join("output").join("notes_ draft.md"));

    let second = writer.write("notes: draft.md", "# Two").unwrap();
    assert_eq!(second, first);
    assert_eq!(fs::read_to_string(&second).unwrap(), "# Two");
}

#[test]
fn artifact_writer_stays_inside_its_directory() {
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("output");
    let writer = ArtifactWriter::new(out.clone());

    let path = writer.write("../escape", "x").unwrap();
    assert_eq!(path.parent(), Some(out.as_path()));
    assert!(!temp.path().join("escape.md").exists());
}
