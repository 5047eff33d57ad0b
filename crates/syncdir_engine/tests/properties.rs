//! Property tests over generated commit response batches.

use proptest::prelude::*;
use syncdir_engine::{ProcessCommitResponseCommand, ResponseType, SyncSession};
use syncdir_testkit::prelude::*;

fn server_id_for(id: &EntryId) -> EntryId {
    let n: i64 = id.value().parse().unwrap();
    EntryId::server(n + SERVER_ID_OFFSET)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn responses_land_on_their_entries(case in batch_strategy(12)) {
        let sync = TestSync::memory();
        case.install(&sync);
        let count = sync.entries().len();

        let session = sync.session(case.responses.clone());
        let outcome = ProcessCommitResponseCommand::new().execute(&session).unwrap();

        prop_assert_eq!(sync.entries().len(), count);
        let mut missing = 0;
        for response in &case.responses {
            let id = response.pre_commit_id.clone().unwrap();
            if !case.is_planned(&id) {
                missing += 1;
                prop_assert!(sync.entry(&response.server_id().unwrap()).is_none());
                continue;
            }
            match response.response_type {
                ResponseType::Success => {
                    prop_assert!(sync.entry(&id).is_none());
                    let entry = sync.entry(&server_id_for(&id)).unwrap();
                    prop_assert_eq!(entry.base_version(), response.version.unwrap());
                    prop_assert!(!entry.is_unsynced());
                }
                other => {
                    let entry = sync.entry(&id).unwrap();
                    prop_assert!(entry.is_unsynced());
                    prop_assert_eq!(entry.base_version(), 0);
                    let listed = outcome.conflicting_new_folder_ids.contains(&id);
                    prop_assert_eq!(listed, other == ResponseType::Conflict && entry.is_dir());
                }
            }
        }
        prop_assert_eq!(session.status().lock().num_missing_entries, missing);
    }

    #[test]
    fn second_pass_is_a_no_op(case in batch_strategy(12)) {
        let sync = TestSync::memory();
        case.install(&sync);

        ProcessCommitResponseCommand::new()
            .execute(&sync.session(case.responses.clone()))
            .unwrap();
        let entries = sync.entries();
        let saves = sync.directory.store().save_count();

        let outcome = ProcessCommitResponseCommand::new()
            .execute(&sync.session(case.responses.clone()))
            .unwrap();

        prop_assert_eq!(outcome.successes, 0);
        prop_assert_eq!(sync.entries(), entries);
        prop_assert_eq!(sync.directory.store().save_count(), saves);
    }
}
