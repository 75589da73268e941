//! Topic fan-out from room actors to connection tasks.
//!
//! Every connection task owns one unbounded receiver. Subscribing puts a
//! clone of its sender under a [`Topic`]; [`Hub::publish`] pushes the event
//! into every sender subscribed to the topic. Pushing never blocks, so a
//! room actor publishing from inside a command cannot be stalled by a slow
//! client.

use std::collections::HashMap;
use std::sync::RwLock;

use caro_protocol::{Event, Publisher, Topic};
use caro_transport::ConnectionId;
use tokio::sync::mpsc;
use tracing::trace;

/// What a connection task receives from the hub.
pub type Delivery = (Topic, Event);

pub type DeliverySender = mpsc::UnboundedSender<Delivery>;

/// In-process [`Publisher`] routing events to subscribed connections.
#[derive(Debug, Default)]
pub struct Hub {
    topics: RwLock<HashMap<Topic, HashMap<ConnectionId, DeliverySender>>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `conn_id` to `topic`. Returns `false` if it already was.
    pub fn subscribe(&self, topic: Topic, conn_id: ConnectionId, sender: DeliverySender) -> bool {
        let Ok(mut topics) = self.topics.write() else {
            return false;
        };
        topics
            .entry(topic)
            .or_default()
            .insert(conn_id, sender)
            .is_none()
    }

    pub fn unsubscribe(&self, topic: &Topic, conn_id: ConnectionId) {
        if let Ok(mut topics) = self.topics.write() {
            if let Some(subscribers) = topics.get_mut(topic) {
                subscribers.remove(&conn_id);
                if subscribers.is_empty() {
                    topics.remove(topic);
                }
            }
        }
    }

    /// Drops every subscription of `conn_id`.
    pub fn unsubscribe_all(&self, conn_id: ConnectionId) {
        if let Ok(mut topics) = self.topics.write() {
            topics.retain(|_, subscribers| {
                subscribers.remove(&conn_id);
                !subscribers.is_empty()
            });
        }
    }

    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.topics
            .read()
            .map(|topics| topics.get(topic).map_or(0, HashMap::len))
            .unwrap_or(0)
    }
}

impl Publisher for Hub {
    fn publish(&self, topic: Topic, event: Event) {
        let Ok(topics) = self.topics.read() else {
            return;
        };
        let Some(subscribers) = topics.get(&topic) else {
            return;
        };
        trace!(%topic, subscribers = subscribers.len(), "publishing");
        for sender in subscribers.values() {
            // A closed receiver means the connection is shutting down and
            // will unsubscribe itself.
            let _ = sender.send((topic.clone(), event.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caro_protocol::{PlayerId, RoomCode};

    fn online(id: u64) -> Event {
        Event::UserOnline {
            player_id: PlayerId(id),
        }
    }

    #[test]
    fn test_publish_reaches_only_subscribers_of_topic() {
        let hub = Hub::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let room = Topic::Room(RoomCode::new("AAAAAA"));
        hub.subscribe(room.clone(), ConnectionId::new(1), tx_a);
        hub.subscribe(Topic::Lobby, ConnectionId::new(2), tx_b);

        hub.publish(room.clone(), online(1));

        assert_eq!(rx_a.try_recv().unwrap(), (room, online(1)));
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_unsubscribe_all_removes_every_topic() {
        let hub = Hub::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = ConnectionId::new(7);
        hub.subscribe(Topic::Lobby, conn, tx.clone());
        hub.subscribe(Topic::User(PlayerId(7)), conn, tx);

        hub.unsubscribe_all(conn);
        hub.publish(Topic::Lobby, online(1));

        assert!(rx.try_recv().is_err());
        assert_eq!(hub.subscriber_count(&Topic::Lobby), 0);
    }

    #[test]
    fn test_subscribe_twice_reports_existing() {
        let hub = Hub::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(hub.subscribe(Topic::Lobby, ConnectionId::new(1), tx.clone()));
        assert!(!hub.subscribe(Topic::Lobby, ConnectionId::new(1), tx));
        assert_eq!(hub.subscriber_count(&Topic::Lobby), 1);
    }
}
