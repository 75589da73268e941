//! The presence tracker: identity → the one connection currently serving it.
//!
//! # Lifecycle
//!
//! ```text
//! register(P, conn-1) ──→ [P online on conn-1]
//! register(P, conn-2) ──→ conn-1 told to leave, [P online on conn-2]
//! unregister(P, conn-1) ─→ ignored: conn-1 is no longer current
//! unregister(P, conn-2) ─→ [P offline]
//! ```
//!
//! The map is the only shared state and `register`/`unregister` are its
//! only writers, so "at most one connection per identity" holds without
//! any cooperation from the connections themselves.

use std::collections::HashMap;

use caro_protocol::PlayerId;
use caro_transport::ConnectionId;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};

/// Instructions the tracker sends to a connection's handler task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Control {
    /// A newer connection took over this identity. The handler tells its
    /// client why, then closes the connection.
    Evict { reason: String },
}

/// What the tracker keeps per identity: the connection id, and a way to
/// reach the task serving it.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    control: mpsc::UnboundedSender<Control>,
}

impl ConnectionHandle {
    /// Creates a handle and the receiver the connection task listens on.
    pub fn new(id: ConnectionId) -> (Self, mpsc::UnboundedReceiver<Control>) {
        let (control, rx) = mpsc::unbounded_channel();
        (Self { id, control }, rx)
    }

    /// Best effort: the task may already be gone.
    fn send(&self, control: Control) -> bool {
        self.control.send(control).is_ok()
    }
}

/// Returned by [`PresenceTracker::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    /// The connection that was superseded, if any.
    pub evicted: Option<ConnectionId>,
    /// `true` if the identity had no connection before. An eviction is a
    /// handover, not a new arrival, so friends are not told twice.
    pub came_online: bool,
}

/// Shared registry of who is online.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    online: RwLock<HashMap<PlayerId, ConnectionHandle>>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `handle` the connection for `player`, evicting any previous
    /// one.
    pub async fn register(&self, player: PlayerId, handle: ConnectionHandle) -> Registration {
        let new_id = handle.id;
        let previous = self.online.write().await.insert(player, handle);

        match previous {
            Some(old) if old.id != new_id => {
                let delivered = old.send(Control::Evict {
                    reason: "signed in from another connection".into(),
                });
                info!(%player, evicted = %old.id, by = %new_id, delivered, "connection superseded");
                Registration {
                    evicted: Some(old.id),
                    came_online: false,
                }
            }
            Some(_) => Registration {
                evicted: None,
                came_online: false,
            },
            None => {
                info!(%player, conn_id = %new_id, "player online");
                Registration {
                    evicted: None,
                    came_online: true,
                }
            }
        }
    }

    /// Removes `player`'s mapping if `conn_id` is still the registered
    /// connection. Returns `true` if the player went offline.
    ///
    /// A superseded connection shutting down late must not take its
    /// successor offline, hence the id check.
    pub async fn unregister(&self, player: PlayerId, conn_id: ConnectionId) -> bool {
        let mut online = self.online.write().await;
        match online.get(&player) {
            Some(current) if current.id == conn_id => {
                online.remove(&player);
                info!(%player, %conn_id, "player offline");
                true
            }
            Some(current) => {
                debug!(%player, stale = %conn_id, current = %current.id, "ignoring stale unregister");
                false
            }
            None => false,
        }
    }

    pub async fn is_online(&self, player: PlayerId) -> bool {
        self.online.read().await.contains_key(&player)
    }

    /// The connection currently serving `player`.
    pub async fn connection(&self, player: PlayerId) -> Option<ConnectionId> {
        self.online.read().await.get(&player).map(|handle| handle.id)
    }

    pub async fn online_count(&self) -> usize {
        self.online.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(id: u64) -> (ConnectionHandle, mpsc::UnboundedReceiver<Control>) {
        ConnectionHandle::new(ConnectionId::new(id))
    }

    #[tokio::test]
    async fn test_register_first_connection_comes_online() {
        let tracker = PresenceTracker::new();
        let (h, _rx) = handle(1);
        let reg = tracker.register(PlayerId(1), h).await;
        assert_eq!(
            reg,
            Registration {
                evicted: None,
                came_online: true
            }
        );
        assert!(tracker.is_online(PlayerId(1)).await);
    }

    #[tokio::test]
    async fn test_register_second_connection_evicts_first() {
        let tracker = PresenceTracker::new();
        let (h1, mut rx1) = handle(1);
        let (h2, _rx2) = handle(2);
        tracker.register(PlayerId(1), h1).await;

        let reg = tracker.register(PlayerId(1), h2).await;
        assert_eq!(reg.evicted, Some(ConnectionId::new(1)));
        assert!(!reg.came_online);
        assert!(matches!(rx1.try_recv(), Ok(Control::Evict { .. })));
        assert_eq!(tracker.connection(PlayerId(1)).await, Some(ConnectionId::new(2)));
        assert_eq!(tracker.online_count().await, 1);
    }

    #[tokio::test]
    async fn test_unregister_stale_connection_keeps_successor() {
        let tracker = PresenceTracker::new();
        let (h1, _rx1) = handle(1);
        let (h2, _rx2) = handle(2);
        tracker.register(PlayerId(1), h1).await;
        tracker.register(PlayerId(1), h2).await;

        assert!(!tracker.unregister(PlayerId(1), ConnectionId::new(1)).await);
        assert!(tracker.is_online(PlayerId(1)).await);

        assert!(tracker.unregister(PlayerId(1), ConnectionId::new(2)).await);
        assert!(!tracker.is_online(PlayerId(1)).await);
    }

    #[tokio::test]
    async fn test_unregister_unknown_player_is_noop() {
        let tracker = PresenceTracker::new();
        assert!(!tracker.unregister(PlayerId(9), ConnectionId::new(1)).await);
    }

    #[tokio::test]
    async fn test_register_evicted_task_gone_still_replaces() {
        let tracker = PresenceTracker::new();
        let (h1, rx1) = handle(1);
        drop(rx1);
        tracker.register(PlayerId(1), h1).await;
        let (h2, _rx2) = handle(2);
        let reg = tracker.register(PlayerId(1), h2).await;
        assert_eq!(reg.evicted, Some(ConnectionId::new(1)));
    }
}
