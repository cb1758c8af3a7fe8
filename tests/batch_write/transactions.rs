//! Batches inside explicit transactions.

use crate::common::*;

#[test]
fn patch_result_is_final_only_after_commit() {
    let db = Database::in_memory();
    seed(&db, "doc", json!({"n": 1}));

    let session = db.begin();
    let results = session
        .run_batch(&[
            Command::patch("doc", vec![PatchOp::inc(path("n"), 1)]).with_metadata(tagged("t"))
        ])
        .unwrap();

    // mid-transaction: outcome known, identity not yet refreshed
    let pending = results[0].snapshot();
    assert_eq!(pending.patch_outcome, Some(PatchOutcome::Patched));
    assert_eq!(pending.version, None);
    assert_eq!(db.get("doc").unwrap().unwrap().content, json!({"n": 1}));

    session.commit().unwrap();

    let doc = db.get("doc").unwrap().unwrap();
    let done = results[0].snapshot();
    assert_eq!(done.version, Some(doc.version));
    assert_eq!(done.metadata.get("tag"), Some(&json!("t")));
    assert!(done.metadata.contains_key(docwrite::LAST_MODIFIED));
}

#[test]
fn aborted_transaction_never_refreshes() {
    let db = Database::in_memory();
    seed(&db, "doc", json!({"n": 1}));

    let session = db.begin();
    let results = session.run_batch(&[Command::script("doc", "inc n")]).unwrap();
    session.rollback().unwrap();

    assert_eq!(results[0].snapshot().version, None);
    assert_eq!(db.get("doc").unwrap().unwrap().content, json!({"n": 1}));
}

#[test]
fn debug_script_in_transaction_is_self_contained() {
    let db = Database::in_memory();
    seed(&db, "doc", json!({"n": 1}));

    let session = db.begin();
    let results = session
        .run_batch(&[Command::script("doc", "inc n").with_debug_mode(true)])
        .unwrap();
    assert_eq!(session.pending_callbacks(), 0);

    let result = results[0].snapshot();
    assert!(!result.debug_log.as_ref().unwrap().is_empty());
    assert_eq!(result.additional_data.get("Document"), Some(&json!({"n": 2})));

    session.commit().unwrap();
    assert_eq!(results[0].snapshot(), result);
}

#[test]
fn atomic_batch_is_all_or_nothing() {
    let db = Database::in_memory();
    seed(&db, "B", json!({}));

    let failure = db
        .execute_batch_atomic(&[
            Command::put("A", json!({})),
            Command::delete("B").with_expected_version(Version::new(12345)),
        ])
        .unwrap_err();
    assert_eq!(failure.failed_at, 1);
    assert!(db.get("A").unwrap().is_none());

    let results = db
        .execute_batch_atomic(&[Command::put("A", json!({})), Command::delete("B")])
        .unwrap();
    assert_eq!(results.len(), 2);
    assert!(db.get("A").unwrap().is_some());
    assert!(db.get("B").unwrap().is_none());
}

#[test]
fn racing_session_loses_to_earlier_commit() {
    let db = Database::in_memory();
    seed(&db, "doc", json!({"n": 0}));

    let racing = db.begin();
    racing.run_batch(&[Command::script("doc", "inc n")]).unwrap();

    db.execute_batch_atomic(&[Command::script("doc", "inc n 5")]).unwrap();
    let err = racing.commit().unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(db.get("doc").unwrap().unwrap().content, json!({"n": 5}));
}
