//! Rooms and matches for caro.
//!
//! Each room runs as its own Tokio task (an actor) that owns its
//! [`Match`](game::Match). All commands for a room go through its
//! [`RoomHandle`], so a room processes one command at a time and never
//! needs a lock around its state.
//!
//! ```text
//! RoomManager::join(player, code)
//!   → RoomHandle::join()            (clone handle, release index lock)
//!     → mpsc → RoomActor::handle_join()
//!       → Publisher::publish(room:<code>, RoomUpdated)
//!     ← oneshot Ack { snapshot, info }
//!   → RoomManager::sync(info)       (bindings, closing finished rooms)
//! ```
//!
//! Money moves only through [`caro_ledger`]: stakes are collected when both
//! players are ready, and a finished match is settled exactly once, before
//! the room reports it finished.

mod config;
mod error;
pub mod game;
mod manager;
mod room;

pub use config::GameConfig;
pub use error::RoomError;
pub use manager::RoomManager;
pub use room::{Ack, Departure, RoomHandle, RoomInfo, RoomServices};
