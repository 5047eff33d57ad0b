//! Listener channel behavior.

use parking_lot::Mutex;
use std::sync::Arc;
use syncdir_engine::{
    ListenerError, NotifyReport, SyncSessionSnapshot, SyncerEvent, SyncerEventChannel,
    SyncerEventListener, SyncerStatus,
};
use syncdir_testkit::prelude::*;

fn cycle_ended() -> SyncerEvent {
    SyncerEvent::sync_cycle_ended(SyncSessionSnapshot {
        account_name: TEST_ACCOUNT.to_owned(),
        status: SyncerStatus::default(),
        has_more_to_sync: false,
        initial_sync_ended: Some(true),
    })
}

struct Ordered {
    tag: usize,
    log: Arc<Mutex<Vec<usize>>>,
}

impl SyncerEventListener for Ordered {
    fn on_event(&self, _event: &SyncerEvent) -> Result<(), ListenerError> {
        self.log.lock().push(self.tag);
        Ok(())
    }
}

#[test]
fn delivery_follows_registration_order() {
    let channel = SyncerEventChannel::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    for tag in 0..5 {
        channel.subscribe(Arc::new(Ordered {
            tag,
            log: Arc::clone(&log),
        }));
    }

    channel.notify_listeners(&cycle_ended());
    assert_eq!(*log.lock(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn bad_listeners_do_not_block_others() {
    init_test_logging();
    let channel = SyncerEventChannel::new();
    let before = RecordingListener::new();
    let after = RecordingListener::new();
    channel.subscribe(before.clone());
    channel.subscribe(Arc::new(FailingListener));
    channel.subscribe(Arc::new(PanickingListener));
    channel.subscribe(after.clone());

    let report = channel.notify_listeners(&cycle_ended());

    assert_eq!(
        report,
        NotifyReport {
            delivered: 2,
            failed: 2
        }
    );
    assert_eq!(before.count(), 1);
    assert_eq!(after.events(), vec![cycle_ended()]);
}

#[test]
fn subscribing_during_broadcast_applies_next_time() {
    let channel = Arc::new(SyncerEventChannel::new());
    let subscriber = SubscribingListener::new(&channel);
    channel.subscribe(subscriber.clone());

    let first = channel.notify_listeners(&cycle_ended());
    assert_eq!(first.delivered, 1);
    let spawned = subscriber.spawned().unwrap();
    assert_eq!(spawned.count(), 0);
    assert_eq!(channel.listener_count(), 2);

    let second = channel.notify_listeners(&cycle_ended());
    assert_eq!(second.delivered, 2);
    assert_eq!(spawned.count(), 1);
}

#[test]
fn unsubscribed_listener_hears_nothing() {
    let channel = SyncerEventChannel::new();
    let recorder = RecordingListener::new();
    let id = channel.subscribe(recorder.clone());

    assert!(channel.unsubscribe(id));
    let report = channel.notify_listeners(&cycle_ended());

    assert_eq!(report, NotifyReport::default());
    assert_eq!(recorder.count(), 0);
}
