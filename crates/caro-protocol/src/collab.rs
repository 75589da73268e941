//! Seams to the collaborators outside the match engine.
//!
//! The engine never talks to sockets or user tables directly. It publishes
//! events to a [`Publisher`] and asks a [`Directory`] who a player is and
//! who their friends are. The server crate provides real implementations;
//! tests plug in recording fakes.

use std::sync::Mutex;

use crate::{Event, PlayerDisplay, PlayerId, Topic};

/// Fan-out channel the engine publishes committed state to.
///
/// `publish` is synchronous and must not block: room actors call it while
/// they own the match, and events must leave in commit order.
pub trait Publisher: Send + Sync + 'static {
    fn publish(&self, topic: Topic, event: Event);
}

/// Identity information owned by the account system.
pub trait Directory: Send + Sync + 'static {
    /// Display information for `player_id`. Unknown identities get a
    /// placeholder rather than an error; display data is cosmetic.
    fn display(&self, player_id: PlayerId) -> PlayerDisplay;

    /// Accepted friends of `player_id`, notified on presence changes.
    fn friends(&self, player_id: PlayerId) -> Vec<PlayerId>;
}

/// A [`Publisher`] that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPublisher;

impl Publisher for NullPublisher {
    fn publish(&self, _topic: Topic, _event: Event) {}
}

/// A [`Publisher`] that keeps every event in memory, in publish order.
///
/// Used by tests to assert on what was broadcast and in which order.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<(Topic, Event)>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far.
    pub fn events(&self) -> Vec<(Topic, Event)> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Events published to one topic, in order.
    pub fn events_for(&self, topic: &Topic) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, e)| e)
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl Publisher for RecordingPublisher {
    fn publish(&self, topic: Topic, event: Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push((topic, event));
        }
    }
}

/// A [`Directory`] that names players after their id and has no friends.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousDirectory;

impl Directory for AnonymousDirectory {
    fn display(&self, player_id: PlayerId) -> PlayerDisplay {
        PlayerDisplay {
            player_id,
            username: format!("player-{}", player_id.0),
        }
    }

    fn friends(&self, _player_id: PlayerId) -> Vec<PlayerId> {
        Vec::new()
    }
}
