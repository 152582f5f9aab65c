//! Fire-and-forget state change notifications.

use tokio::sync::mpsc;
use tracing::debug;

/// Default capacity for [`Notifier::channel`].
pub const DEFAULT_CAPACITY: usize = 16;

/// A state change worth telling an observer about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// The vault was unlocked.
    Unlocked,
    /// The vault was locked.
    Locked,
    /// A query was refused because the vault is not unlocked yet.
    NotReady,
}

/// Sending half of the notification channel.
///
/// Delivery is at most once and never blocks: if the queue is full or the
/// observer is gone the notification is dropped.
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    tx: Option<mpsc::Sender<Notification>>,
}

impl Notifier {
    /// Create a bounded channel and its notifier.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx: Some(tx) }, rx)
    }

    /// A notifier with no observer.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Deliver a notification if there is room.
    pub fn notify(&self, notification: Notification) {
        let Some(tx) = &self.tx else {
            return;
        };

        if let Err(e) = tx.try_send(notification) {
            debug!("Dropped {:?} notification: {}", notification, e);
        }
    }
}
