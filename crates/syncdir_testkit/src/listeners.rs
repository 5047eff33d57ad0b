//! Event listeners for channel tests.

use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use syncdir_engine::{ListenerError, SyncerEvent, SyncerEventChannel, SyncerEventListener};

/// Stores every event it receives.
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<SyncerEvent>>,
}

impl RecordingListener {
    /// Creates an empty recorder.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Returns copies of the recorded events.
    pub fn events(&self) -> Vec<SyncerEvent> {
        self.events.lock().clone()
    }

    /// Returns the number of recorded events.
    pub fn count(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns the most recent event.
    pub fn last(&self) -> Option<SyncerEvent> {
        self.events.lock().last().cloned()
    }
}

impl SyncerEventListener for RecordingListener {
    fn on_event(&self, event: &SyncerEvent) -> Result<(), ListenerError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

/// Rejects every event.
pub struct FailingListener;

impl SyncerEventListener for FailingListener {
    fn on_event(&self, _event: &SyncerEvent) -> Result<(), ListenerError> {
        Err(ListenerError::Rejected("failing listener".to_owned()))
    }
}

/// Panics on every event.
pub struct PanickingListener;

impl SyncerEventListener for PanickingListener {
    fn on_event(&self, _event: &SyncerEvent) -> Result<(), ListenerError> {
        panic!("panicking listener");
    }
}

/// Subscribes a fresh [`RecordingListener`] on its first event.
pub struct SubscribingListener {
    channel: Weak<SyncerEventChannel>,
    spawned: Mutex<Option<Arc<RecordingListener>>>,
}

impl SubscribingListener {
    /// Creates a listener that will subscribe to `channel` from its handler.
    pub fn new(channel: &Arc<SyncerEventChannel>) -> Arc<Self> {
        Arc::new(Self {
            channel: Arc::downgrade(channel),
            spawned: Mutex::new(None),
        })
    }

    /// Returns the listener subscribed from inside the handler, if any.
    pub fn spawned(&self) -> Option<Arc<RecordingListener>> {
        self.spawned.lock().clone()
    }
}

impl SyncerEventListener for SubscribingListener {
    fn on_event(&self, _event: &SyncerEvent) -> Result<(), ListenerError> {
        let mut spawned = self.spawned.lock();
        if spawned.is_none() {
            let channel = self.channel.upgrade().ok_or(ListenerError::Disconnected)?;
            let recorder = RecordingListener::new();
            channel.subscribe(recorder.clone());
            *spawned = Some(recorder);
        }
        Ok(())
    }
}
