//! Properties over random transactions.

use docjar_core::{PersistentObject, Serial, TransactionId, TransactionParticipant};
use docjar_testkit::prelude::*;
use proptest::prelude::*;

const TX: TransactionId = TransactionId::new(7);

/// Applies `ops` to a transaction that starts with `pool` loaded.
fn run(t: &TestCoordinator, pool: &mut Vec<PersistentObject>, ops: &[TransactionOp]) {
    for op in ops {
        match op {
            TransactionOp::Insert(state) => {
                let obj = PersistentObject::new(person_class(), state.clone());
                t.insert(&obj).unwrap();
                pool.push(obj);
            }
            TransactionOp::Set(i, field, value) => {
                if !pool.is_empty() {
                    pool[i % pool.len()].set(field.clone(), value.clone()).unwrap();
                }
            }
            TransactionOp::Remove(i) => {
                if !pool.is_empty() {
                    let obj = pool.remove(i % pool.len());
                    t.remove(&obj).unwrap();
                }
            }
            TransactionOp::Flush => t.flush().unwrap(),
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn abort_restores_the_store(seeded in 0usize..4, ops in transaction_strategy(24)) {
        let (t, references) = scenarios::committed_people(seeded);
        let before = t.contents();

        let mut pool: Vec<_> = references.iter().map(|r| t.load(r).unwrap()).collect();
        run(&t, &mut pool, &ops);
        t.tpc_abort(TX).unwrap();

        prop_assert_eq!(t.contents(), before);
        prop_assert!(t.registered_objects().is_empty());
        prop_assert!(t.inserted_objects().is_empty());
        prop_assert!(t.removed_objects().is_empty());
    }

    #[test]
    fn finish_leaves_every_survivor_stored(seeded in 0usize..4, ops in transaction_strategy(24)) {
        let (t, references) = scenarios::committed_people(seeded);
        let mut pool: Vec<_> = references.iter().map(|r| t.load(r).unwrap()).collect();
        run(&t, &mut pool, &ops);
        t.commit(TX).unwrap();
        t.tpc_finish(TX).unwrap();

        let contents = t.contents();
        let stored = contents.get("docjar.people").map_or(0, Vec::len);
        prop_assert_eq!(stored, pool.len());
        for obj in &pool {
            prop_assert!(!obj.is_changed());
            let reloaded = t.load(&obj.reference().unwrap()).unwrap();
            prop_assert_eq!(reloaded.state().unwrap(), obj.state().unwrap());
            prop_assert_eq!(reloaded.serial(), obj.serial());
        }
    }

    #[test]
    fn serials_strictly_increase(values in prop::collection::vec(any::<i64>(), 1..12)) {
        let t = TestCoordinator::detecting();
        let obj = person("counter");
        t.insert(&obj).unwrap();
        prop_assert_eq!(obj.serial(), Serial::INITIAL);

        for value in values {
            let before = obj.serial();
            obj.set("value", value).unwrap();
            t.flush().unwrap();
            prop_assert!(obj.serial() > before);
            prop_assert!(!obj.is_changed());
            prop_assert!(t.registered_objects().is_empty());
        }
    }

    #[test]
    fn second_flush_is_a_no_op(ops in transaction_strategy(16)) {
        let t = TestCoordinator::memory();
        let mut pool = Vec::new();
        run(&t, &mut pool, &ops);
        t.flush().unwrap();
        let contents = t.contents();
        t.flush().unwrap();
        prop_assert_eq!(t.contents(), contents);
    }
}
