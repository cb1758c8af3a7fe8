//! Concurrent batches against one database.

use std::sync::{Arc, Barrier};
use std::thread;

use crate::common::*;

#[test]
fn concurrent_cas_puts_have_one_winner() {
    let db = Arc::new(Database::in_memory());
    let v = seed(&db, "doc", json!({"owner": null}));

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let db = Arc::clone(&db);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                db.execute_batch(&[Command::put("doc", json!({"owner": i})).with_expected_version(v)])
                    .is_ok()
            })
        })
        .collect();

    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(winners, 1);
    assert!(version_of(&db, "doc").unwrap() > v);
}

#[test]
fn concurrent_sessions_on_one_key_lose_no_updates() {
    let db = Arc::new(Database::in_memory());
    seed(&db, "counter", json!({"n": 0}));

    let threads = 4;
    let per_thread = 25;
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let db = Arc::clone(&db);
            thread::spawn(move || {
                let mut applied = 0;
                while applied < per_thread {
                    // retry on conflict is the caller's job
                    if db
                        .execute_batch_atomic(&[Command::script("counter", "inc n")])
                        .is_ok()
                    {
                        applied += 1;
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(
        db.get("counter").unwrap().unwrap().content,
        json!({"n": threads * per_thread})
    );
}

#[test]
fn generated_keys_are_unique_across_threads() {
    let db = Arc::new(Database::in_memory());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let db = Arc::clone(&db);
            thread::spawn(move || {
                (0..20)
                    .map(|_| run_one(&db, Command::put("items/", json!({}))).key)
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut keys: Vec<String> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), 80);
}
