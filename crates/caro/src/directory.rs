//! In-memory player directory.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use caro_protocol::{Directory, PlayerDisplay, PlayerId};

#[derive(Debug, Default)]
struct Profile {
    username: Option<String>,
    friends: BTreeSet<PlayerId>,
}

/// A [`Directory`] holding display names and friendships in memory.
///
/// Players without a registered name are shown as `player-<id>`.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    profiles: RwLock<HashMap<PlayerId, Profile>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_username(&self, player: PlayerId, username: impl Into<String>) {
        if let Ok(mut profiles) = self.profiles.write() {
            profiles.entry(player).or_default().username = Some(username.into());
        }
    }

    /// Records an accepted friendship, in both directions.
    pub fn befriend(&self, a: PlayerId, b: PlayerId) {
        if a == b {
            return;
        }
        if let Ok(mut profiles) = self.profiles.write() {
            profiles.entry(a).or_default().friends.insert(b);
            profiles.entry(b).or_default().friends.insert(a);
        }
    }
}

impl Directory for MemoryDirectory {
    fn display(&self, player_id: PlayerId) -> PlayerDisplay {
        let username = self
            .profiles
            .read()
            .ok()
            .and_then(|profiles| profiles.get(&player_id).and_then(|p| p.username.clone()))
            .unwrap_or_else(|| format!("player-{}", player_id.0));
        PlayerDisplay {
            player_id,
            username,
        }
    }

    fn friends(&self, player_id: PlayerId) -> Vec<PlayerId> {
        self.profiles
            .read()
            .ok()
            .and_then(|profiles| {
                profiles
                    .get(&player_id)
                    .map(|p| p.friends.iter().copied().collect())
            })
            .unwrap_or_default()
    }
}
