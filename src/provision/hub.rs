//! Live session updates
//!
//! Fan-out of session changes to connected observers. Each subscriber owns a
//! bounded queue; delivery never blocks the publisher. A subscriber whose
//! queue is full or closed is dropped from the hub without affecting the
//! others. There is no replay: a subscriber sees only what is published after
//! it subscribed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::defaults::SUBSCRIBER_QUEUE_DEPTH;
use crate::core::session::ProvisioningSession;

/// What caused an update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    Created,
    FirmwareReported,
    Failed,
    Completed,
}

/// A published session change carrying the full post-change record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUpdate {
    pub kind: UpdateKind,
    pub session: ProvisioningSession,
}

type Subscribers = Mutex<HashMap<Uuid, mpsc::Sender<SessionUpdate>>>;

fn locked(subscribers: &Subscribers) -> MutexGuard<'_, HashMap<Uuid, mpsc::Sender<SessionUpdate>>> {
    // Critical sections never panic, so a poisoned map is still consistent.
    subscribers.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Broadcaster of [`SessionUpdate`]s
#[derive(Debug, Clone)]
pub struct LiveUpdateHub {
    subscribers: Arc<Subscribers>,
    queue_depth: usize,
}

impl Default for LiveUpdateHub {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveUpdateHub {
    pub fn new() -> Self {
        Self::with_queue_depth(SUBSCRIBER_QUEUE_DEPTH)
    }

    /// Hub with a custom per-subscriber queue depth
    pub fn with_queue_depth(queue_depth: usize) -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(HashMap::new())),
            queue_depth: queue_depth.max(1),
        }
    }

    /// Register a new observer
    pub fn subscribe(&self) -> Subscription {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.queue_depth);
        locked(&self.subscribers).insert(id, tx);
        tracing::debug!(subscriber = %id, "Live subscriber added");

        Subscription {
            id,
            rx,
            hub: Arc::downgrade(&self.subscribers),
        }
    }

    /// Deliver `update` to every current subscriber
    ///
    /// Returns the number of subscribers that accepted it.
    pub fn publish(&self, update: SessionUpdate) -> usize {
        let mut subscribers = locked(&self.subscribers);
        let mut delivered = 0;

        subscribers.retain(|id, tx| match tx.try_send(update.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(subscriber = %id, "Live subscriber is not keeping up; dropping it");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(subscriber = %id, "Live subscriber went away");
                false
            }
        });

        tracing::trace!(
            serial = %update.session.serial,
            session_key = %update.session.session_key,
            delivered,
            "Published session update"
        );
        delivered
    }

    /// Number of registered subscribers
    pub fn subscriber_count(&self) -> usize {
        locked(&self.subscribers).len()
    }
}

/// Receiving end of a hub subscription
///
/// Dropping it unregisters the subscriber.
#[derive(Debug)]
pub struct Subscription {
    id: Uuid,
    rx: mpsc::Receiver<SessionUpdate>,
    hub: Weak<Subscribers>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Wait for the next update
    ///
    /// Returns `None` once the hub has dropped this subscriber.
    pub async fn recv(&mut self) -> Option<SessionUpdate> {
        self.rx.recv().await
    }

    /// Next queued update, if any
    pub fn try_recv(&mut self) -> Option<SessionUpdate> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(subscribers) = self.hub.upgrade() {
            if locked(&subscribers).remove(&self.id).is_some() {
                tracing::debug!(subscriber = %self.id, "Live subscriber removed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::DeviceInfo;
    use chrono::Utc;

    fn update(serial: &str) -> SessionUpdate {
        SessionUpdate {
            kind: UpdateKind::Created,
            session: ProvisioningSession::start(
                serial,
                "1",
                DeviceInfo::default(),
                "prod",
                "base.img",
                None,
                Utc::now(),
            ),
        }
    }

    #[tokio::test]
    async fn test_every_subscriber_receives_update() {
        let hub = LiveUpdateHub::new();
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();

        assert_eq!(hub.publish(update("SN1")), 2);
        assert_eq!(a.recv().await.unwrap().session.serial, "SN1");
        assert_eq!(b.recv().await.unwrap().session.serial, "SN1");
    }

    #[test]
    fn test_no_replay_for_late_subscribers() {
        let hub = LiveUpdateHub::new();
        assert_eq!(hub.publish(update("SN1")), 0);

        let mut late = hub.subscribe();
        assert!(late.try_recv().is_none());
    }

    #[test]
    fn test_drop_unsubscribes() {
        let hub = LiveUpdateHub::new();
        let sub = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 1);
        drop(sub);
        assert_eq!(hub.subscriber_count(), 0);
        assert_eq!(hub.publish(update("SN1")), 0);
    }

    #[test]
    fn test_full_subscriber_is_dropped_without_affecting_others() {
        let hub = LiveUpdateHub::with_queue_depth(1);
        let mut slow = hub.subscribe();
        let mut fast = hub.subscribe();

        assert_eq!(hub.publish(update("SN1")), 2);
        assert!(fast.try_recv().is_some());

        // `slow` never drained its queue
        assert_eq!(hub.publish(update("SN2")), 1);
        assert_eq!(hub.subscriber_count(), 1);
        assert_eq!(fast.try_recv().unwrap().session.serial, "SN2");

        assert_eq!(slow.try_recv().unwrap().session.serial, "SN1");
        assert!(slow.try_recv().is_none());
    }

    #[test]
    fn test_update_serializes_with_kind() {
        let json = serde_json::to_value(update("SN1")).unwrap();
        assert_eq!(json["kind"], "created");
        assert_eq!(json["session"]["serial"], "SN1");
    }
}
