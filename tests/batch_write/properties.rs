//! Property tests for versioning and fail-fast aggregation.

use proptest::prelude::*;

use crate::common::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn put_versions_strictly_increase(keys in prop::collection::vec("[a-c]", 1..40)) {
        let db = Database::in_memory();
        let mut last = std::collections::HashMap::new();

        for key in keys {
            let result = run_one(&db, Command::put(key.clone(), json!({})));
            let version = result.version.unwrap();
            if let Some(previous) = last.insert(key, version) {
                prop_assert!(version > previous);
            }
        }
    }

    #[test]
    fn batch_stops_at_first_invalid_command(
        size in 1usize..12,
        bad_at in 0usize..12,
    ) {
        let bad_at = bad_at % size;
        let db = Database::in_memory();
        let commands: Vec<Command> = (0..size)
            .map(|i| {
                if i == bad_at {
                    Command::put(format!("k{}", i), json!("not an object"))
                } else {
                    Command::put(format!("k{}", i), json!({"i": i}))
                }
            })
            .collect();

        let failure = db.execute_batch(&commands).unwrap_err();
        prop_assert_eq!(failure.failed_at, bad_at);
        prop_assert_eq!(failure.results.len(), bad_at);
        for i in 0..size {
            let present = db.get(&format!("k{}", i)).unwrap().is_some();
            prop_assert_eq!(present, i < bad_at);
        }
    }

    #[test]
    fn inc_patches_sum(increments in prop::collection::vec(-50i64..50, 1..20)) {
        let db = Database::in_memory();
        seed(&db, "n", json!({"v": 0}));

        let commands: Vec<Command> = increments
            .iter()
            .map(|by| Command::patch("n", vec![PatchOp::inc(path("v"), *by)]))
            .collect();
        db.execute_batch(&commands).unwrap();

        let total: i64 = increments.iter().sum();
        prop_assert_eq!(db.get("n").unwrap().unwrap().content, json!({"v": total}));
    }
}
