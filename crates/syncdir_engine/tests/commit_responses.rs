//! Commit response processing against a real directory.

use std::collections::BTreeSet;
use syncdir_engine::{
    CommitOutcome, CommitResponseEntry, EngineConfig, ParentOrdering, ProcessCommitResponseCommand,
    SyncError, SyncSession,
};
use syncdir_testkit::prelude::*;
use syncdir_testkit::scenarios;

#[test]
fn success_rewrites_id_and_clears_pending() {
    init_test_logging();
    let sync = TestSync::memory();
    let handle = sync.add_pending_entry(EntryId::client(100), &EntryId::root(), "a", false);
    let session = sync.session(vec![CommitResponseEntry::success(
        EntryId::client(100),
        "5000",
        1,
    )]);

    let outcome = ProcessCommitResponseCommand::new().execute(&session).unwrap();

    assert_eq!(outcome.successes, 1);
    assert_eq!(outcome.result, CommitOutcome::Ok);
    assert!(sync.entry(&EntryId::client(100)).is_none());

    let entry = sync.entry(&EntryId::server(5000)).unwrap();
    assert_eq!(entry.meta_handle(), handle);
    assert_eq!(entry.base_version(), 1);
    assert!(!entry.is_unsynced());
    assert!(!entry.is_syncing());
}

#[test]
fn conflict_on_new_folder_is_reported_and_entry_kept() {
    init_test_logging();
    let sync = TestSync::memory();
    sync.add_pending_entry(EntryId::client(101), &EntryId::root(), "folder", true);
    sync.add_pending_entry(EntryId::client(102), &EntryId::root(), "file", false);
    let before = sync.entry(&EntryId::client(101)).unwrap();

    let session = sync.session(vec![
        CommitResponseEntry::conflict(EntryId::client(101)),
        CommitResponseEntry::conflict(EntryId::client(102)),
    ]);
    let outcome = ProcessCommitResponseCommand::new().execute(&session).unwrap();

    assert_eq!(
        outcome.conflicting_new_folder_ids,
        BTreeSet::from([EntryId::client(101)])
    );
    assert_eq!(outcome.result, CommitOutcome::Conflict);

    let after = sync.entry(&EntryId::client(101)).unwrap();
    assert_eq!(after.id(), before.id());
    assert_eq!(after.base_version(), before.base_version());
    assert!(after.is_unsynced());
    assert_eq!(session.status().lock().num_conflicting_commits, 2);
}

#[test]
fn retryable_responses_stay_pending() {
    let sync = TestSync::memory();
    for n in 1..=4 {
        sync.add_pending_entry(EntryId::client(n), &EntryId::root(), &format!("e{n}"), false);
    }
    let session = sync.session(vec![
        CommitResponseEntry::transient_error(EntryId::client(1)),
        CommitResponseEntry::new(ResponseType::Retry, EntryId::client(2)),
        CommitResponseEntry::over_quota(EntryId::client(3)),
        CommitResponseEntry::new(ResponseType::InvalidMessage, EntryId::client(4))
            .with_error_message("bad specifics"),
    ]);

    let outcome = ProcessCommitResponseCommand::new().execute(&session).unwrap();

    assert_eq!(outcome.result, CommitOutcome::OverQuota);
    for n in 1..=4 {
        let entry = sync.entry(&EntryId::client(n)).unwrap();
        assert!(entry.is_unsynced(), "c{n} should stay pending");
        assert_eq!(entry.base_version(), 0);
    }
    let status = session.status().lock().clone();
    assert!(status.over_quota);
    assert_eq!(status.num_transient_errors, 2);
}

#[test]
fn unmatched_response_does_not_stop_the_batch() {
    let sync = TestSync::memory();
    sync.add_pending_entry(EntryId::client(100), &EntryId::root(), "a", false);
    let before = sync.entries().len();

    let session = sync.session(vec![
        CommitResponseEntry::success(EntryId::client(999), "9999", 1),
        CommitResponseEntry::success(EntryId::client(100), "5000", 1),
    ]);
    let outcome = ProcessCommitResponseCommand::new().execute(&session).unwrap();

    assert_eq!(outcome.successes, 1);
    assert_eq!(outcome.skipped, 1);
    assert_eq!(sync.entries().len(), before);
    assert!(sync.entry(&EntryId::server(9999)).is_none());
    assert!(!sync.entry(&EntryId::server(5000)).unwrap().is_unsynced());
    assert_eq!(session.status().lock().num_missing_entries, 1);
}

#[test]
fn malformed_responses_are_skipped() {
    let sync = TestSync::memory();
    sync.add_pending_entry(EntryId::client(1), &EntryId::root(), "a", false);
    sync.add_pending_entry(EntryId::client(2), &EntryId::root(), "b", false);

    let mut no_id_string = CommitResponseEntry::success(EntryId::client(1), "10", 1);
    no_id_string.id_string = None;
    let session = sync.session(vec![
        no_id_string,
        CommitResponseEntry::success(EntryId::client(2), "20", 1),
    ]);

    let outcome = ProcessCommitResponseCommand::new().execute(&session).unwrap();

    assert_eq!(outcome.successes, 1);
    assert!(sync.entry(&EntryId::client(1)).unwrap().is_unsynced());
    assert_eq!(session.status().lock().num_malformed_responses, 1);
}

#[test]
fn replaying_an_applied_batch_changes_nothing() {
    let sync = TestSync::memory();
    sync.add_pending_entry(EntryId::client(100), &EntryId::root(), "a", false);
    sync.add_pending_entry(EntryId::client(101), &EntryId::root(), "folder", true);
    let responses = vec![
        CommitResponseEntry::success(EntryId::client(100), "5000", 1).with_name("renamed"),
        CommitResponseEntry::conflict(EntryId::client(101)),
    ];

    let first = ProcessCommitResponseCommand::new()
        .execute(&sync.session(responses.clone()))
        .unwrap();
    assert_eq!(first.successes, 1);

    let entries = sync.entries();
    let saves = sync.directory.store().save_count();
    let session = sync.session(responses);
    let second = ProcessCommitResponseCommand::new().execute(&session).unwrap();

    assert_eq!(second.successes, 0);
    assert_eq!(second.names_applied, 0);
    assert_eq!(sync.entries(), entries);
    assert_eq!(sync.directory.store().save_count(), saves);
    assert_eq!(session.status().lock().num_missing_entries, 0);
}

#[test]
fn children_follow_folder_id_rewrite() {
    let sync = TestSync::memory();
    let (folder, children) = scenarios::pending_folder(&sync, 3);

    let session = sync.session(vec![CommitResponseEntry::success(folder, "10", 1)]);
    ProcessCommitResponseCommand::new().execute(&session).unwrap();

    for child in &children {
        let entry = sync.entry(child).unwrap();
        assert_eq!(entry.parent_id(), &EntryId::server(10));
        assert!(entry.is_unsynced());
    }
}

#[test]
fn child_first_batch_is_reordered_by_default() {
    let sync = TestSync::memory();
    let (folder, children) = scenarios::pending_folder(&sync, 1);
    let responses = vec![
        CommitResponseEntry::success(children[0].clone(), "20", 1),
        CommitResponseEntry::success(folder, "10", 1),
    ];

    let outcome = ProcessCommitResponseCommand::new()
        .execute(&sync.session(responses))
        .unwrap();

    assert_eq!(outcome.successes, 2);
    let child = sync.entry(&EntryId::server(20)).unwrap();
    assert_eq!(child.parent_id(), &EntryId::server(10));
}

#[test]
fn child_first_batch_can_be_rejected() {
    let sync = TestSync::memory();
    let (folder, children) = scenarios::pending_folder(&sync, 1);
    let before = sync.entries();
    let responses = vec![
        CommitResponseEntry::success(children[0].clone(), "20", 1),
        CommitResponseEntry::success(folder.clone(), "10", 1),
    ];

    let command = ProcessCommitResponseCommand::with_config(
        EngineConfig::default().with_ordering(ParentOrdering::Reject),
    );
    let err = command.execute(&sync.session(responses)).unwrap_err();

    match err {
        SyncError::OutOfOrderBatch { child, parent } => {
            assert_eq!(child, children[0]);
            assert_eq!(parent, folder);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(sync.entries(), before);
}

#[test]
fn swapped_sibling_names_settle_without_collision() {
    let sync = TestSync::memory();
    sync.add_pending_entry(EntryId::client(1), &EntryId::root(), "x", false);
    sync.add_pending_entry(EntryId::client(2), &EntryId::root(), "y", false);

    let session = sync.session(vec![
        CommitResponseEntry::success(EntryId::client(1), "10", 1).with_name("y"),
        CommitResponseEntry::success(EntryId::client(2), "11", 1).with_name("x"),
    ]);
    let outcome = ProcessCommitResponseCommand::new().execute(&session).unwrap();

    assert_eq!(outcome.names_applied, 2);
    let first = sync.entry(&EntryId::server(10)).unwrap();
    let second = sync.entry(&EntryId::server(11)).unwrap();
    assert_eq!(first.name(), "y");
    assert_eq!(first.server_name(), "y");
    assert_eq!(second.name(), "x");
    assert_eq!(second.server_name(), "x");
}

#[test]
fn server_name_held_by_bystander_is_uniquified() {
    let sync = TestSync::memory();
    sync.add_synced_entry(EntryId::server(50), &EntryId::root(), "report", false, 3);
    sync.add_pending_entry(EntryId::client(1), &EntryId::root(), "draft", false);

    let session = sync.session(vec![CommitResponseEntry::success(EntryId::client(1), "51", 1)
        .with_name("report")
        .with_non_unique_name("report")]);
    ProcessCommitResponseCommand::new().execute(&session).unwrap();

    let entry = sync.entry(&EntryId::server(51)).unwrap();
    assert_eq!(entry.name(), "report (2)");
    assert_eq!(entry.server_name(), "report");
    assert_eq!(entry.non_unique_name(), "report");
    assert_eq!(sync.entry(&EntryId::server(50)).unwrap().name(), "report");
}

#[test]
fn sibling_on_temporary_name_does_not_abort_the_batch() {
    init_test_logging();
    let sync = TestSync::memory();
    let renamed = sync.add_pending_entry(EntryId::client(1), &EntryId::root(), "a", false);
    sync.add_pending_entry(EntryId::client(2), &EntryId::root(), "o", false);
    let squatter = format!("b~aside.{}", renamed.as_i64());
    sync.add_synced_entry(EntryId::server(800), &EntryId::root(), &squatter, false, 1);

    let session = sync.session(vec![
        CommitResponseEntry::success(EntryId::client(2), "900", 1),
        CommitResponseEntry::success(EntryId::client(1), "901", 1).with_name("b"),
    ]);
    let outcome = ProcessCommitResponseCommand::new().execute(&session).unwrap();

    assert_eq!(outcome.successes, 2);
    assert!(sync.entry(&EntryId::client(2)).is_none());
    assert!(!sync.entry(&EntryId::server(900)).unwrap().is_unsynced());
    let entry = sync.entry(&EntryId::server(901)).unwrap();
    assert_eq!(entry.name(), "b");
    assert_eq!(entry.server_name(), "b");
    assert_eq!(sync.entry(&EntryId::server(800)).unwrap().name(), squatter);
}

#[test]
fn no_free_temporary_name_keeps_local_name_and_batch() {
    let sync = TestSync::memory();
    let renamed = sync.add_pending_entry(EntryId::client(1), &EntryId::root(), "a", false);
    sync.add_pending_entry(EntryId::client(2), &EntryId::root(), "o", false);
    let squatter = format!("b~aside.{}", renamed.as_i64());
    sync.add_synced_entry(EntryId::server(800), &EntryId::root(), &squatter, false, 1);

    let session = sync.session(vec![
        CommitResponseEntry::success(EntryId::client(2), "900", 1),
        CommitResponseEntry::success(EntryId::client(1), "901", 1).with_name("b"),
    ]);
    let config = EngineConfig::default().with_max_uniquify_attempts(0);
    let outcome = ProcessCommitResponseCommand::with_config(config)
        .execute(&session)
        .unwrap();

    assert_eq!(outcome.successes, 2);
    assert_eq!(outcome.names_applied, 0);
    assert!(sync.entry(&EntryId::server(900)).is_some());
    let entry = sync.entry(&EntryId::server(901)).unwrap();
    assert_eq!(entry.name(), "a");
    assert_eq!(entry.server_name(), "b");
    assert!(!entry.is_unsynced());
}

#[test]
fn deleted_folder_cascades_to_synced_children_once() {
    init_test_logging();
    let sync = TestSync::memory();
    let (folder, descendants) = scenarios::synced_tree(&sync, 100);
    let wip = EntryId::client(7);
    sync.add_pending_entry(wip.clone(), &folder, "wip", false);
    sync.delete_locally(&folder);

    let responses = vec![CommitResponseEntry::success(folder.clone(), "100", 2)];
    let outcome = ProcessCommitResponseCommand::new()
        .execute(&sync.session(responses.clone()))
        .unwrap();

    assert_eq!(outcome.deleted_folders, BTreeSet::from([folder.clone()]));
    assert_eq!(outcome.cascaded_deletions, descendants.len());
    for id in &descendants {
        assert!(sync.entry(id).unwrap().is_del(), "{id} should be deleted");
    }
    let pending = sync.entry(&wip).unwrap();
    assert!(!pending.is_del());
    assert!(pending.is_unsynced());

    let again = ProcessCommitResponseCommand::new()
        .execute(&sync.session(responses))
        .unwrap();
    assert!(again.deleted_folders.is_empty());
    assert_eq!(again.cascaded_deletions, 0);
}

#[test]
fn existing_entry_with_foreign_id_is_skipped() {
    let sync = TestSync::memory();
    sync.add_synced_entry(EntryId::server(1), &EntryId::root(), "a", false, 1);
    sync.delete_locally(&EntryId::server(1));

    let session = sync.session(vec![CommitResponseEntry::success(EntryId::server(1), "2", 2)]);
    let outcome = ProcessCommitResponseCommand::new().execute(&session).unwrap();

    assert_eq!(outcome.successes, 0);
    assert!(sync.entry(&EntryId::server(1)).unwrap().is_unsynced());
    assert!(sync.entry(&EntryId::server(2)).is_none());
}

#[test]
fn missing_directory_fails_the_step() {
    let sync = TestSync::memory();
    sync.manager.close(TEST_ACCOUNT);

    let err = ProcessCommitResponseCommand::new()
        .execute(&sync.session(Vec::new()))
        .unwrap_err();
    assert!(matches!(err, SyncError::DirectoryLookup { .. }));
    assert!(err.is_retryable());
}

#[test]
fn file_backed_results_survive_reopen() {
    let sync = TestSync::file();
    sync.add_pending_entry(EntryId::client(100), &EntryId::root(), "a", false);
    ProcessCommitResponseCommand::new()
        .execute(&sync.session(vec![CommitResponseEntry::success(
            EntryId::client(100),
            "5000",
            1,
        )]))
        .unwrap();

    let path = sync.path().unwrap();
    sync.manager.close_all();

    let manager = syncdir_core::DirectoryManager::on_disk(&path, Default::default());
    let dir = manager.open(TEST_ACCOUNT).unwrap();
    let read = dir.read_transaction().unwrap();
    let entry = read.get_by_id(&EntryId::server(5000)).unwrap();
    assert_eq!(entry.base_version(), 1);
    assert!(!entry.is_unsynced());
}
