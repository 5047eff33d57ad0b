//! Syncer events and the listener channel.
//!
//! Listeners register on a [`SyncerEventChannel`] and are called
//! synchronously, in registration order, for every broadcast. A listener
//! that fails or panics is logged and counted; the others still receive
//! the event.
//!
//! # Usage
//!
//! ```rust,ignore
//! let channel = SyncerEventChannel::new();
//! let (_id, receiver) = channel.subscribe_receiver();
//!
//! // ... run a cycle ...
//!
//! while let Ok(event) = receiver.try_recv() {
//!     println!("cycle ended for {}", event.snapshot.account_name);
//! }
//! ```

use crate::error::ListenerError;
use crate::session::SyncSession;
use crate::status::SyncerStatus;
use parking_lot::RwLock;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use tracing::{debug, warn};

/// Kind of syncer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum SyncerEventKind {
    /// A sync cycle finished, successfully or not.
    SyncCycleEnded,
}

impl fmt::Display for SyncerEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncerEventKind::SyncCycleEnded => f.write_str("SYNC_CYCLE_ENDED"),
        }
    }
}

/// Session state captured when an event is raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSessionSnapshot {
    /// Account the cycle ran for.
    pub account_name: String,
    /// Session counters at the time of the event.
    pub status: SyncerStatus,
    /// Whether another round was requested.
    pub has_more_to_sync: bool,
    /// Directory flag, or `None` if the directory was unavailable.
    pub initial_sync_ended: Option<bool>,
}

impl SyncSessionSnapshot {
    /// Captures a snapshot of `session`.
    pub fn capture<S: SyncSession + ?Sized>(session: &S, initial_sync_ended: Option<bool>) -> Self {
        Self {
            account_name: session.account_name().to_owned(),
            status: session.status().lock().clone(),
            has_more_to_sync: session.should_sync_again(),
            initial_sync_ended,
        }
    }
}

/// An event broadcast to listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncerEvent {
    /// What happened.
    pub what: SyncerEventKind,
    /// Session state at the time.
    pub snapshot: SyncSessionSnapshot,
}

impl SyncerEvent {
    /// Creates a cycle-ended event.
    pub fn sync_cycle_ended(snapshot: SyncSessionSnapshot) -> Self {
        Self {
            what: SyncerEventKind::SyncCycleEnded,
            snapshot,
        }
    }
}

/// Receives syncer events.
pub trait SyncerEventListener: Send + Sync {
    /// Handles one event.
    ///
    /// # Errors
    ///
    /// An error is logged by the channel and does not affect other
    /// listeners. [`ListenerError::Disconnected`] also unsubscribes the
    /// listener.
    fn on_event(&self, event: &SyncerEvent) -> Result<(), ListenerError>;
}

/// Forwards events into an mpsc channel.
pub struct SenderListener {
    sender: Sender<SyncerEvent>,
}

impl SenderListener {
    /// Wraps a sender.
    pub fn new(sender: Sender<SyncerEvent>) -> Self {
        Self { sender }
    }
}

impl SyncerEventListener for SenderListener {
    fn on_event(&self, event: &SyncerEvent) -> Result<(), ListenerError> {
        self.sender
            .send(event.clone())
            .map_err(|_| ListenerError::Disconnected)
    }
}

/// Handle returned by [`SyncerEventChannel::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Result of one broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NotifyReport {
    /// Listeners that handled the event.
    pub delivered: usize,
    /// Listeners that returned an error or panicked.
    pub failed: usize,
}

type Registered = (ListenerId, Arc<dyn SyncerEventListener>);

/// Observer list for syncer events.
///
/// The list is copied before each broadcast, so a listener may subscribe or
/// unsubscribe from inside `on_event`; the change applies from the next
/// broadcast on.
pub struct SyncerEventChannel {
    listeners: RwLock<Vec<Registered>>,
    next_id: AtomicU64,
}

impl SyncerEventChannel {
    /// Creates a channel with no listeners.
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a listener.
    pub fn subscribe(&self, listener: Arc<dyn SyncerEventListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        debug!(listener = id.0, "listener subscribed");
        id
    }

    /// Registers an mpsc receiver for all future events.
    ///
    /// Dropping the receiver unsubscribes it on the next broadcast.
    pub fn subscribe_receiver(&self) -> (ListenerId, Receiver<SyncerEvent>) {
        let (tx, rx) = mpsc::channel();
        let id = self.subscribe(Arc::new(SenderListener::new(tx)));
        (id, rx)
    }

    /// Removes a listener. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(registered, _)| *registered != id);
        before != listeners.len()
    }

    /// Returns the number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Delivers `event` to every listener registered when the call starts.
    pub fn notify_listeners(&self, event: &SyncerEvent) -> NotifyReport {
        let snapshot: Vec<Registered> = self.listeners.read().clone();
        let mut report = NotifyReport::default();
        let mut disconnected = Vec::new();

        for (id, listener) in &snapshot {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(event)));
            match outcome {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(err)) => {
                    warn!(listener = id.0, event = %event.what, error = %err, "listener failed");
                    if err == ListenerError::Disconnected {
                        disconnected.push(*id);
                    }
                    report.failed += 1;
                }
                Err(payload) => {
                    warn!(
                        listener = id.0,
                        event = %event.what,
                        panic = %panic_message(payload.as_ref()),
                        "listener panicked"
                    );
                    report.failed += 1;
                }
            }
        }

        for id in disconnected {
            self.unsubscribe(id);
        }

        debug!(
            event = %event.what,
            delivered = report.delivered,
            failed = report.failed,
            "event broadcast"
        );
        report
    }
}

impl Default for SyncerEventChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SyncerEventChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncerEventChannel")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn event() -> SyncerEvent {
        SyncerEvent::sync_cycle_ended(SyncSessionSnapshot {
            account_name: "alice".to_owned(),
            status: SyncerStatus::default(),
            has_more_to_sync: false,
            initial_sync_ended: Some(true),
        })
    }

    struct Counting(Mutex<usize>);

    impl SyncerEventListener for Counting {
        fn on_event(&self, _event: &SyncerEvent) -> Result<(), ListenerError> {
            *self.0.lock() += 1;
            Ok(())
        }
    }

    struct Failing;

    impl SyncerEventListener for Failing {
        fn on_event(&self, _event: &SyncerEvent) -> Result<(), ListenerError> {
            Err(ListenerError::Rejected("nope".into()))
        }
    }

    struct Panicking;

    impl SyncerEventListener for Panicking {
        fn on_event(&self, _event: &SyncerEvent) -> Result<(), ListenerError> {
            panic!("listener blew up");
        }
    }

    #[test]
    fn broadcast_reaches_everyone() {
        let channel = SyncerEventChannel::new();
        let a = Arc::new(Counting(Mutex::new(0)));
        let b = Arc::new(Counting(Mutex::new(0)));
        channel.subscribe(a.clone());
        channel.subscribe(b.clone());

        let report = channel.notify_listeners(&event());

        assert_eq!(report, NotifyReport { delivered: 2, failed: 0 });
        assert_eq!(*a.0.lock(), 1);
        assert_eq!(*b.0.lock(), 1);
    }

    #[test]
    fn failures_are_isolated() {
        let channel = SyncerEventChannel::new();
        let last = Arc::new(Counting(Mutex::new(0)));
        channel.subscribe(Arc::new(Failing));
        channel.subscribe(Arc::new(Panicking));
        channel.subscribe(last.clone());

        let report = channel.notify_listeners(&event());

        assert_eq!(report, NotifyReport { delivered: 1, failed: 2 });
        assert_eq!(*last.0.lock(), 1);
        assert_eq!(channel.listener_count(), 3);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let channel = SyncerEventChannel::new();
        let counter = Arc::new(Counting(Mutex::new(0)));
        let id = channel.subscribe(counter.clone());

        assert!(channel.unsubscribe(id));
        assert!(!channel.unsubscribe(id));
        channel.notify_listeners(&event());
        assert_eq!(*counter.0.lock(), 0);
    }

    #[test]
    fn receiver_subscription() {
        let channel = SyncerEventChannel::new();
        let (_id, rx) = channel.subscribe_receiver();

        channel.notify_listeners(&event());
        assert_eq!(rx.recv().unwrap(), event());

        drop(rx);
        let report = channel.notify_listeners(&event());
        assert_eq!(report.failed, 1);
        assert_eq!(channel.listener_count(), 0);
    }

    #[test]
    fn panic_message_extraction() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
