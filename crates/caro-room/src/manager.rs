//! Room manager: creates rooms, routes commands to them, and tracks which
//! room each player is seated in.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use caro_protocol::{Amount, Coord, MatchId, MatchSnapshot, PlayerId, RoomCode, RoomListEntry, RoomStatus, Slot};
use rand::Rng;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::room::{spawn_room, Departure, RoomHandle, RoomInfo, RoomServices, NewRoom};
use crate::RoomError;

/// Counter for generating unique match IDs.
static NEXT_MATCH_ID: AtomicU64 = AtomicU64::new(1);

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_LENGTH: usize = 6;

#[derive(Default)]
struct Index {
    rooms: HashMap<RoomCode, RoomHandle>,
    /// Seat bindings. A player is seated in at most one live room.
    bindings: HashMap<PlayerId, RoomCode>,
}

/// Entry point for room operations from the connection handlers.
///
/// The index lock is only held for map lookups and updates. Handles are
/// cloned out and the lock released before any actor is awaited.
pub struct RoomManager {
    services: RoomServices,
    index: RwLock<Index>,
}

impl RoomManager {
    pub fn new(services: RoomServices) -> Self {
        Self {
            services,
            index: RwLock::new(Index::default()),
        }
    }

    pub fn services(&self) -> &RoomServices {
        &self.services
    }

    /// Opens a room with `player` in slot 1.
    pub async fn create(
        &self,
        player: PlayerId,
        stake: Amount,
        capacity: usize,
    ) -> Result<MatchSnapshot, RoomError> {
        self.services.config.check_stake(stake)?;
        self.services.config.check_capacity(capacity)?;
        self.ensure_unbound(player, None).await?;

        let handle = {
            let mut index = self.index.write().await;
            if let Some(code) = index.bindings.get(&player) {
                return Err(RoomError::InOtherRoom {
                    player,
                    code: code.clone(),
                });
            }
            let code = unused_code(&index.rooms);
            let room = NewRoom {
                code: code.clone(),
                match_id: MatchId(NEXT_MATCH_ID.fetch_add(1, Ordering::Relaxed)),
                creator: player,
                stake,
                capacity,
            };
            let handle = spawn_room(room, self.services.clone());
            index.rooms.insert(code.clone(), handle.clone());
            index.bindings.insert(player, code);
            handle
        };

        Ok(handle.snapshot().await?.snapshot)
    }

    /// Seats `player` in slot 2, seats them again after a disconnect, or
    /// lets them watch.
    pub async fn join(&self, player: PlayerId, code: &RoomCode) -> Result<MatchSnapshot, RoomError> {
        let handle = self.handle(code).await?;
        self.ensure_unbound(player, Some(code)).await?;

        // Reserve the binding so a concurrent create or join for the same
        // player cannot seat them twice.
        let reserved = {
            let mut index = self.index.write().await;
            match index.bindings.get(&player) {
                Some(bound) if bound != code => {
                    return Err(RoomError::InOtherRoom {
                        player,
                        code: bound.clone(),
                    });
                }
                Some(_) => false,
                None => {
                    index.bindings.insert(player, code.clone());
                    true
                }
            }
        };

        match handle.join(player).await {
            Ok(ack) => {
                if ack.info.is_seated(player) && !ack.info.status.is_terminal() {
                    self.index.write().await.bindings.insert(player, code.clone());
                } else if reserved {
                    self.unbind(player, code).await;
                }
                self.sync(&ack.info).await;
                Ok(ack.snapshot)
            }
            Err(e) => {
                if reserved {
                    self.unbind(player, code).await;
                }
                Err(e)
            }
        }
    }

    /// Explicit leave.
    pub async fn leave(&self, player: PlayerId, code: &RoomCode) -> Result<MatchSnapshot, RoomError> {
        let handle = self.handle(code).await?;
        let ack = handle.leave(player, Departure::Left).await?;
        self.settle_departure(player, &ack.info).await;
        Ok(ack.snapshot)
    }

    /// The player's last connection went away while they were in `code`.
    pub async fn disconnect(&self, player: PlayerId, code: &RoomCode) -> Result<(), RoomError> {
        let handle = self.handle(code).await?;
        let ack = handle.leave(player, Departure::Disconnected).await?;
        self.settle_departure(player, &ack.info).await;
        Ok(())
    }

    pub async fn ready(&self, player: PlayerId, code: &RoomCode) -> Result<MatchSnapshot, RoomError> {
        let handle = self.handle(code).await?;
        let ack = handle.ready(player).await?;
        self.sync(&ack.info).await;
        Ok(ack.snapshot)
    }

    pub async fn submit_move(
        &self,
        player: PlayerId,
        code: &RoomCode,
        coord: Coord,
        slot: Slot,
    ) -> Result<MatchSnapshot, RoomError> {
        let handle = self.handle(code).await?;
        let ack = handle.submit_move(player, coord, slot).await?;
        self.sync(&ack.info).await;
        Ok(ack.snapshot)
    }

    pub async fn fetch(&self, code: &RoomCode) -> Result<MatchSnapshot, RoomError> {
        let handle = self.handle(code).await?;
        Ok(handle.snapshot().await?.snapshot)
    }

    /// Discoverable rooms, oldest first.
    ///
    /// Also closes rooms that finished with nobody left in them. Rooms
    /// that fail to respond are skipped.
    pub async fn list(&self) -> Vec<RoomListEntry> {
        let handles: Vec<RoomHandle> = self.index.read().await.rooms.values().cloned().collect();

        let mut infos = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Ok(info) = handle.info().await {
                self.sync(&info).await;
                if info.listable {
                    infos.push(info);
                }
            }
        }
        infos.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.code.cmp(&b.code)));
        infos.iter().map(RoomInfo::entry).collect()
    }

    /// The live room `player` is seated in, if any.
    pub async fn player_room(&self, player: PlayerId) -> Option<RoomCode> {
        self.index.read().await.bindings.get(&player).cloned()
    }

    pub async fn room_count(&self) -> usize {
        self.index.read().await.rooms.len()
    }

    /// Stops every room actor.
    pub async fn shutdown_all(&self) {
        let handles: Vec<RoomHandle> = {
            let mut index = self.index.write().await;
            index.bindings.clear();
            index.rooms.drain().map(|(_, handle)| handle).collect()
        };
        for handle in handles {
            let _ = handle.shutdown().await;
        }
    }

    async fn handle(&self, code: &RoomCode) -> Result<RoomHandle, RoomError> {
        self.index
            .read()
            .await
            .rooms
            .get(code)
            .cloned()
            .ok_or_else(|| RoomError::NotFound(code.clone()))
    }

    async fn unbind(&self, player: PlayerId, code: &RoomCode) {
        let mut index = self.index.write().await;
        if index.bindings.get(&player) == Some(code) {
            index.bindings.remove(&player);
        }
    }

    /// Fails with `InOtherRoom` if `player` is seated in a live room other
    /// than `target`. Bindings to rooms that ended or no longer seat the
    /// player are dropped on the way.
    async fn ensure_unbound(&self, player: PlayerId, target: Option<&RoomCode>) -> Result<(), RoomError> {
        let (bound, handle) = {
            let index = self.index.read().await;
            let Some(bound) = index.bindings.get(&player).cloned() else {
                return Ok(());
            };
            let handle = index.rooms.get(&bound).cloned();
            (bound, handle)
        };
        if Some(&bound) == target {
            return Ok(());
        }

        let live = match handle {
            Some(handle) => handle
                .info()
                .await
                .is_ok_and(|info| !info.status.is_terminal() && info.is_seated(player)),
            None => false,
        };
        if live {
            return Err(RoomError::InOtherRoom { player, code: bound });
        }

        debug!(%player, code = %bound, "dropping stale seat binding");
        self.unbind(player, &bound).await;
        Ok(())
    }

    /// Releases `player`'s seat binding once the room says they no longer
    /// hold a seat in it.
    async fn settle_departure(&self, player: PlayerId, info: &RoomInfo) {
        if !info.is_seated(player) {
            self.unbind(player, &info.code).await;
        }
        self.sync(info).await;
    }

    /// Brings the index in line with what a room reported.
    ///
    /// `info` may already be outdated when this runs, so only facts that
    /// cannot be undone are acted on: a terminal room releases every seat
    /// bound to it. Closing is decided by the actor against its current
    /// state, never against `info`.
    async fn sync(&self, info: &RoomInfo) {
        let closing = info.status == RoomStatus::Cancelled
            || (info.status == RoomStatus::Finished && info.present == 0);

        let handle = {
            let mut index = self.index.write().await;
            if info.status.is_terminal() {
                index.bindings.retain(|_, bound| bound != &info.code);
            }
            if !closing {
                return;
            }
            match index.rooms.get(&info.code) {
                Some(handle) => handle.clone(),
                None => return,
            }
        };

        match handle.close_if_idle().await {
            Ok(true) | Err(_) => {
                let mut index = self.index.write().await;
                if index
                    .rooms
                    .get(&info.code)
                    .is_some_and(|current| current.same_actor(&handle))
                {
                    index.rooms.remove(&info.code);
                    info!(code = %info.code, status = %info.status, "room closed");
                }
            }
            Ok(false) => {
                debug!(code = %info.code, "room no longer idle, kept open");
            }
        }
    }
}

/// A fresh room code not used by any live room.
fn unused_code(rooms: &HashMap<RoomCode, RoomHandle>) -> RoomCode {
    let mut rng = rand::rng();
    loop {
        let code: String = (0..CODE_LENGTH)
            .map(|_| char::from(CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())]))
            .collect();
        let code = RoomCode::new(code);
        if !rooms.contains_key(&code) {
            return code;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use caro_ledger::MemoryStore;
    use caro_protocol::{AnonymousDirectory, NullPublisher};

    use super::*;
    use crate::GameConfig;

    const ALICE: PlayerId = PlayerId(1);
    const BOB: PlayerId = PlayerId(2);

    fn manager() -> RoomManager {
        RoomManager::new(RoomServices {
            store: Arc::new(MemoryStore::with_opening_balance(Amount(100))),
            publisher: Arc::new(NullPublisher),
            directory: Arc::new(AnonymousDirectory),
            config: Arc::new(GameConfig {
                sweep_interval: None,
                ..GameConfig::default()
            }),
        })
    }

    #[tokio::test]
    async fn test_sync_with_outdated_info_keeps_newer_binding() {
        let manager = manager();
        let code = manager.create(ALICE, Amount(10), 2).await.unwrap().code;
        let before_join = manager.handle(&code).await.unwrap().info().await.unwrap();

        manager.join(BOB, &code).await.unwrap();
        manager.sync(&before_join).await;

        assert_eq!(manager.player_room(BOB).await, Some(code));
        let err = manager.create(BOB, Amount(10), 2).await.unwrap_err();
        assert!(matches!(err, RoomError::InOtherRoom { player: BOB, .. }));
    }

    #[tokio::test]
    async fn test_sync_with_outdated_idle_info_keeps_rejoined_room() {
        let manager = manager();
        let code = manager.create(ALICE, Amount(10), 2).await.unwrap().code;
        manager.join(BOB, &code).await.unwrap();
        manager.ready(ALICE, &code).await.unwrap();
        manager.ready(BOB, &code).await.unwrap();
        // Untimed: Alice dropping out forfeits, Bob is the last one present.
        manager.disconnect(ALICE, &code).await.unwrap();

        // Bob's departure is seen by the room but not yet by the index.
        let handle = manager.handle(&code).await.unwrap();
        let emptied = handle.leave(BOB, Departure::Disconnected).await.unwrap().info;
        assert_eq!(emptied.status, RoomStatus::Finished);
        assert_eq!(emptied.present, 0);

        manager.join(BOB, &code).await.unwrap();
        manager.sync(&emptied).await;

        assert_eq!(manager.room_count().await, 1);
        assert!(manager.fetch(&code).await.is_ok());

        manager.leave(BOB, &code).await.unwrap();
        assert_eq!(manager.room_count().await, 0);
    }

    #[test]
    fn test_unused_code_shape() {
        let code = unused_code(&HashMap::new());
        assert_eq!(code.as_str().len(), CODE_LENGTH);
        assert!(code
            .as_str()
            .bytes()
            .all(|b| CODE_ALPHABET.contains(&b)));
    }
}
