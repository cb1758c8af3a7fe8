//! End-to-end batch scenarios.

use crate::common::*;

#[test]
fn stale_delete_stops_the_batch() {
    let db = Database::in_memory();
    let stale = seed(&db, "B", json!({"v": 1}));
    seed(&db, "B", json!({"v": 2}));
    let b_before = version_of(&db, "B");

    let failure = db
        .execute_batch(&[
            Command::put("A", json!({"content": 1})),
            Command::delete("B").with_expected_version(stale),
            Command::put("C", json!({"content": 2})),
        ])
        .unwrap_err();

    assert_eq!(failure.results.len(), 1);
    let a = failure.results[0].snapshot();
    assert_eq!(a.key, "A");
    assert!(a.version.is_some());

    assert_eq!(failure.error.kind(), ErrorKind::ConcurrencyConflict);
    assert_eq!(failure.error.key(), Some("B"));
    assert_eq!(version_of(&db, "B"), b_before);
    assert!(db.get("C").unwrap().is_none());
}

#[test]
fn put_with_generated_key_and_metadata() {
    let db = Database::in_memory();
    let result = run_one(&db, Command::put("", json!({"body": "hi"})).with_metadata(tagged("x")));

    assert!(!result.key.is_empty());
    let doc = db.get(&result.key).unwrap().unwrap();
    assert_eq!(doc.content, json!({"body": "hi"}));
    let mut keys: Vec<&str> = doc.metadata.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, vec![docwrite::LAST_MODIFIED, "tag"]);
    assert_eq!(doc.metadata.get("tag"), Some(&json!("x")));
}

#[test]
fn put_metadata_is_kept_exactly_without_stamping() {
    let dir = tempfile::TempDir::new().unwrap();
    let file = dir.path().join(docwrite::CONFIG_FILE_NAME);
    std::fs::write(&file, "[store]\nstamp_last_modified = false\n").unwrap();
    let db = Database::from_config_file(&file).unwrap();

    let result = run_one(&db, Command::put("", json!({"body": "hi"})).with_metadata(tagged("x")));
    let doc = db.get(&result.key).unwrap().unwrap();
    assert_eq!(doc.metadata, tagged("x"));
    assert_eq!(result.metadata, tagged("x"));
}

#[test]
fn delete_then_get_is_absent() {
    let db = Database::in_memory();
    let v = seed(&db, "doc", json!({}));

    let result = run_one(&db, Command::delete("doc").with_expected_version(v));
    assert_eq!(result.deleted, Some(true));
    assert!(db.get("doc").unwrap().is_none());
}

#[test]
fn patch_on_absent_target_changes_nothing() {
    let db = Database::in_memory();
    let before = db.store().current_version();

    let result = run_one(&db, Command::patch("nope", vec![PatchOp::set(path("a"), json!(1))]));
    assert_eq!(result.patch_outcome, Some(PatchOutcome::DocumentDoesNotExist));
    assert!(db.get("nope").unwrap().is_none());
    assert_eq!(db.store().current_version(), before);
}

#[test]
fn repeated_patch_is_idempotent() {
    let db = Database::in_memory();
    seed(&db, "doc", json!({"tags": []}));
    let patch = Command::patch("doc", vec![PatchOp::set(path("state"), json!("ready"))]);

    let first = run_one(&db, patch.clone());
    let v1 = version_of(&db, "doc");
    let second = run_one(&db, patch);

    assert_eq!(first.patch_outcome, Some(PatchOutcome::Patched));
    assert_eq!(second.patch_outcome, Some(PatchOutcome::AlreadyPatched));
    assert_eq!(version_of(&db, "doc"), v1);
}

#[test]
fn mixed_batch_end_to_end() {
    let db = Database::in_memory();
    let batch: Vec<Command> = serde_json::from_value(json!([
        {"method": "PUT", "key": "orders/", "content": {"items": [], "total": 0}},
        {"method": "PATCH", "key": "orders/1", "patches": [
            {"type": "Add", "path": "items", "value": "book"},
            {"type": "Inc", "path": "total", "by": 12}
        ]},
        {"method": "EVAL", "key": "orders/1",
         "script": "if total == 12 then set status = \"priced\"\noutput done",
         "debug_mode": true},
        {"method": "DELETE", "key": "orders/99"}
    ]))
    .unwrap();

    let results = db.execute_batch(&batch).unwrap();
    assert_eq!(results.len(), 4);

    let eval = results[2].snapshot();
    assert_eq!(eval.patch_outcome, Some(PatchOutcome::Patched));
    assert!(eval.debug_log.unwrap().contains(&"done".to_string()));
    assert_eq!(results[3].snapshot().deleted, Some(false));

    let order = db.get("orders/1").unwrap().unwrap();
    assert_eq!(
        order.content,
        json!({"items": ["book"], "total": 12, "status": "priced"})
    );
}

#[test]
fn config_file_drives_limits() {
    let dir = tempfile::TempDir::new().unwrap();
    let file = dir.path().join(docwrite::CONFIG_FILE_NAME);
    std::fs::write(&file, "max_batch_size = 1\n[scripts]\nmax_steps = 2\n").unwrap();

    let db = Database::from_config_file(&file).unwrap();
    let failure = db
        .execute_batch(&[Command::put("a", json!({})), Command::put("b", json!({}))])
        .unwrap_err();
    assert_eq!(failure.error.kind(), ErrorKind::Validation);

    seed(&db, "a", json!({"n": 0}));
    let failure = db
        .execute_batch(&[Command::script("a", "inc n\ninc n\ninc n")])
        .unwrap_err();
    assert_eq!(failure.error.kind(), ErrorKind::ScriptExecution);
}
