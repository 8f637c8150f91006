use std::collections::BTreeSet;

use proptest::prelude::*;
use serde_json::json;
use uuid::Uuid;

use smartcow_sync::{
    core::reconcile::{Upserted, merge_fetched_with_local, remove_from_list, upsert_into_list},
    record::{Record, RecordDraft},
    types::RecordId,
};

// Small id pool so generated lists collide often.
fn id_for(idx: u8) -> RecordId {
    Uuid::from_u128(u128::from(idx % 16) + 1)
}

fn rec(idx: u8, lote: u8) -> Record {
    RecordDraft::from_value(json!({"lote": lote})).into_record_with_id(id_for(idx))
}

fn unique(records: Vec<Record>) -> Vec<Record> {
    let mut seen = BTreeSet::new();
    records.into_iter().filter(|r| seen.insert(r.id)).collect()
}

fn list_strategy() -> impl Strategy<Value = Vec<Record>> {
    prop::collection::vec((any::<u8>(), any::<u8>()), 0..12)
        .prop_map(|pairs| unique(pairs.into_iter().map(|(i, l)| rec(i, l)).collect()))
}

fn id_set(list: &[Record]) -> BTreeSet<RecordId> {
    list.iter().map(|r| r.id).collect()
}

proptest! {
    #[test]
    fn upsert_is_idempotent(list in list_strategy(), idx in any::<u8>(), lote in any::<u8>()) {
        let record = rec(idx, lote);
        let mut once = list.clone();
        upsert_into_list(&mut once, &record);
        let mut twice = once.clone();
        let second = upsert_into_list(&mut twice, &record);

        prop_assert_eq!(second, Upserted::Merged);
        prop_assert_eq!(&once, &twice);
        prop_assert_eq!(id_set(&once).len(), once.len());
    }

    #[test]
    fn upsert_preserves_order_of_existing_entries(list in list_strategy(), idx in any::<u8>(), lote in any::<u8>()) {
        let record = rec(idx, lote);
        let mut out = list.clone();
        let outcome = upsert_into_list(&mut out, &record);

        let before: Vec<RecordId> = list.iter().map(|r| r.id).collect();
        let after: Vec<RecordId> = out.iter().map(|r| r.id).collect();
        match outcome {
            Upserted::Merged => prop_assert_eq!(after, before),
            Upserted::Appended => {
                prop_assert_eq!(&after[..before.len()], &before[..]);
                prop_assert_eq!(after.last().copied(), Some(record.id));
            }
        }
        let merged = out.iter().find(|r| r.id == record.id).map(|r| r.get("lote").cloned());
        prop_assert_eq!(merged, Some(Some(json!(lote))));
    }

    #[test]
    fn merge_never_drops_server_or_local_only_records(fetched in list_strategy(), local in list_strategy()) {
        let merged = merge_fetched_with_local(fetched.clone(), &local);
        let merged_ids = id_set(&merged);

        prop_assert!(id_set(&fetched).is_subset(&merged_ids));
        prop_assert!(id_set(&local).is_subset(&merged_ids));
        prop_assert_eq!(merged_ids.len(), merged.len());
        // Server rows come first, unchanged.
        prop_assert_eq!(&merged[..fetched.len()], &fetched[..]);
    }

    #[test]
    fn remove_only_drops_the_target(list in list_strategy(), idx in any::<u8>()) {
        let target = id_for(idx);
        let mut out = list.clone();
        let removed = remove_from_list(&mut out, target);

        prop_assert_eq!(removed, list.iter().any(|r| r.id == target));
        prop_assert!(out.iter().all(|r| r.id != target));
        let expected: Vec<Record> = list.into_iter().filter(|r| r.id != target).collect();
        prop_assert_eq!(out, expected);
    }
}
