//! The wire format spoken between clients and the caro server.
//!
//! Every frame is an [`Envelope`]. Its [`Payload`] is either plumbing
//! ([`SystemMessage`]: handshake, heartbeat, eviction), a client
//! [`Request`] tagged with a client-chosen id, the matching [`Reply`] or
//! [`Rejection`], or a broadcast [`Event`] on some [`Topic`].
//!
//! ```text
//! client                                   server
//!   │ System(Handshake{version, token})  →   │
//!   │ ←  System(HandshakeAck{player_id})     │
//!   │ Request{id: 1, CreateRoom{..}}     →   │
//!   │ ←  Reply{id: 1, Snapshot{..}}          │
//!   │ ←  Event{topic: room:K3ZQ8A, ..}       │
//! ```

use serde::{Deserialize, Serialize};

use crate::{Amount, Event, MatchSnapshot, PlayerId, Rejection, RoomCode, RoomListEntry, Slot, Topic};

/// Framework-level messages that are not part of the game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SystemMessage {
    /// Client → Server, first frame on every connection.
    Handshake { version: u32, token: Option<String> },

    /// Server → Client: authenticated as `player_id`.
    HandshakeAck { player_id: PlayerId, server_time: u64 },

    /// Client → Server keep-alive.
    Heartbeat { client_time: u64 },

    HeartbeatAck { client_time: u64, server_time: u64 },

    /// Server → Client: a newer connection for the same identity took
    /// over. The server closes this connection right after.
    Evicted { reason: String },

    /// Either direction: orderly goodbye.
    Disconnect { reason: String },

    /// Server → Client: a frame-level failure (bad handshake, undecodable
    /// frame). Request failures use [`Payload::Rejected`] instead.
    Error { code: u16, message: String },
}

/// Operations a client can ask for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Request {
    /// Discovery listing. Also subscribes the connection to the lobby.
    ListRooms,
    JoinLobby,
    LeaveLobby,
    FetchRoom { code: RoomCode },
    CreateRoom { stake: Amount, capacity: usize },
    JoinRoom { code: RoomCode },
    LeaveRoom { code: RoomCode },
    Ready { code: RoomCode },
    Move { code: RoomCode, x: i64, y: i64, slot: Slot },
}

/// Successful answers to a [`Request`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reply {
    Snapshot { snapshot: MatchSnapshot },
    Rooms { rooms: Vec<RoomListEntry> },
    Done,
}

/// The content of one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    System(SystemMessage),
    Request { id: u64, request: Request },
    Reply { id: u64, reply: Reply },
    Rejected { id: u64, rejection: Rejection },
    Event { topic: Topic, event: Event },
}

/// The top-level frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Per-direction frame counter, starting at 0 for the handshake.
    pub seq: u64,
    /// Milliseconds since the sender started.
    pub timestamp: u64,
    pub payload: Payload,
}

impl Envelope {
    pub fn new(seq: u64, timestamp: u64, payload: Payload) -> Self {
        Self {
            seq,
            timestamp,
            payload,
        }
    }
}
