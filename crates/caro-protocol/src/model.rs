//! Match state as seen from outside the room actor.
//!
//! Everything here is plain data: the room actor builds a
//! [`MatchSnapshot`] after each committed mutation, and the same structs
//! travel to clients inside events and replies.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Amount, Coord, PlayerId, RoomCode, Slot};

// ---------------------------------------------------------------------------
// Lifecycle enums
// ---------------------------------------------------------------------------

/// Lifecycle of a room (the lobby entry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Waiting,
    Active,
    Finished,
    Cancelled,
}

impl RoomStatus {
    /// Finished and cancelled rooms never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled)
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Active => write!(f, "active"),
            Self::Finished => write!(f, "finished"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Lifecycle of the match inside a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Waiting,
    Playing,
    Finished,
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Playing => write!(f, "playing"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

/// The coordinator's view of where a room is in its lifecycle.
///
/// ```text
/// Waiting ──(2nd player seated)──→ ReadyPending ──(both ready)──→ Playing ──→ Finished
///    ↑                                  │
///    └──────(2nd player leaves)─────────┘        (creator leaves) ──→ Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Waiting,
    ReadyPending,
    Playing,
    Finished,
    Cancelled,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::ReadyPending => write!(f, "ready-pending"),
            Self::Playing => write!(f, "playing"),
            Self::Finished => write!(f, "finished"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Why a match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Win,
    Timeout,
    Forfeit,
    Draw,
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Win => write!(f, "win"),
            Self::Timeout => write!(f, "timeout"),
            Self::Forfeit => write!(f, "forfeit"),
            Self::Draw => write!(f, "draw"),
        }
    }
}

/// The settled outcome of a finished match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    /// `None` for a draw.
    pub winner: Option<Slot>,
    pub winner_id: Option<PlayerId>,
    pub reason: FinishReason,
    /// What the winner was credited (zero for a draw).
    pub payout: Amount,
}

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

/// Aggregate statistics kept per player by the ledger collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub games_played: u32,
    pub games_won: u32,
    pub total_earnings: Amount,
    pub level: u32,
}

impl PlayerStats {
    /// Level reached with `games_won` wins: `floor(sqrt(wins)) + 1`.
    ///
    /// Level 1 at 0 wins, level 2 from 1 win, level 3 from 4, level 4 from 9.
    pub fn level_for_wins(games_won: u32) -> u32 {
        games_won.isqrt() + 1
    }

    /// Games played but not won.
    pub fn losses(&self) -> u32 {
        self.games_played.saturating_sub(self.games_won)
    }

    /// Win rate in percent, `0.0` before the first game.
    pub fn win_rate(&self) -> f64 {
        if self.games_played == 0 {
            0.0
        } else {
            f64::from(self.games_won) / f64::from(self.games_played) * 100.0
        }
    }
}

impl Default for PlayerStats {
    fn default() -> Self {
        Self {
            games_played: 0,
            games_won: 0,
            total_earnings: Amount::ZERO,
            level: 1,
        }
    }
}

/// Display information for an identity, provided by the directory
/// collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerDisplay {
    pub player_id: PlayerId,
    pub username: String,
}

/// One seated player as shown in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub player_id: PlayerId,
    pub username: String,
    pub slot: Slot,
    pub ready: bool,
    pub online: bool,
    pub stats: PlayerStats,
}

// ---------------------------------------------------------------------------
// Moves and board
// ---------------------------------------------------------------------------

/// A committed move. Sequence numbers start at 1 and have no gaps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub seq: u32,
    pub coord: Coord,
    pub mark: Slot,
    pub at: DateTime<Utc>,
}

/// One occupied cell of the derived board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardCell {
    pub x: i64,
    pub y: i64,
    pub mark: Slot,
}

/// Remaining time budgets in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockView {
    pub first_ms: u64,
    pub second_ms: u64,
}

impl ClockView {
    pub fn for_slot(&self, slot: Slot) -> u64 {
        match slot {
            Slot::First => self.first_ms,
            Slot::Second => self.second_ms,
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot and listing
// ---------------------------------------------------------------------------

/// The full, broadcastable state of a room and its match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    pub code: RoomCode,
    pub room_status: RoomStatus,
    pub match_status: MatchStatus,
    pub phase: Phase,
    pub stake: Amount,
    pub capacity: usize,
    pub occupancy: usize,
    pub first: Option<PlayerView>,
    pub second: Option<PlayerView>,
    pub current_turn: Slot,
    pub clock: Option<ClockView>,
    pub moves: Vec<MoveRecord>,
    pub board: Vec<BoardCell>,
    pub result: Option<MatchResult>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl MatchSnapshot {
    /// The seated player in `slot`, if any.
    pub fn player(&self, slot: Slot) -> Option<&PlayerView> {
        match slot {
            Slot::First => self.first.as_ref(),
            Slot::Second => self.second.as_ref(),
        }
    }

    /// Which slot `player_id` occupies, if seated.
    pub fn slot_of(&self, player_id: PlayerId) -> Option<Slot> {
        Slot::BOTH
            .into_iter()
            .find(|slot| self.player(*slot).is_some_and(|p| p.player_id == player_id))
    }
}

/// A summary of a joinable room, returned by discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomListEntry {
    pub code: RoomCode,
    pub stake: Amount,
    pub occupancy: usize,
    pub capacity: usize,
}

// ---------------------------------------------------------------------------
// Broadcast topics and events
// ---------------------------------------------------------------------------

/// Where a broadcast goes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "topic", content = "key", rename_all = "snake_case")]
pub enum Topic {
    /// Everyone browsing the room list.
    Lobby,
    /// Participants and spectators of one room.
    Room(RoomCode),
    /// One identity's private channel (friend presence, evictions).
    User(PlayerId),
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lobby => write!(f, "lobby"),
            Self::Room(code) => write!(f, "room:{code}"),
            Self::User(player_id) => write!(f, "user:{player_id}"),
        }
    }
}

/// Server-issued broadcasts. Only committed state is ever broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum Event {
    /// A room became discoverable.
    RoomCreated { room: RoomListEntry },
    /// A room changed (seat taken or freed, spectator joined, …).
    RoomUpdated { snapshot: MatchSnapshot },
    /// A room stopped being discoverable (full, started or cancelled).
    RoomRemoved { code: RoomCode },
    PlayerReady {
        code: RoomCode,
        player_id: PlayerId,
        first_ready: bool,
        second_ready: bool,
    },
    /// Stake collection failed; both ready flags were cleared.
    StartAborted {
        code: RoomCode,
        player_id: PlayerId,
        reason: String,
    },
    GameStarted { snapshot: MatchSnapshot },
    MoveMade {
        code: RoomCode,
        record: MoveRecord,
        next_turn: Slot,
        clock: Option<ClockView>,
    },
    GameFinished {
        code: RoomCode,
        result: MatchResult,
        snapshot: MatchSnapshot,
    },
    PlayerForfeited {
        code: RoomCode,
        player_id: PlayerId,
        winner: Slot,
    },
    UserOnline {
        player_id: PlayerId,
    },
    UserOffline {
        player_id: PlayerId,
    },
}

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

/// The error taxonomy surfaced to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectKind {
    /// Bad turn, occupied cell, wrong status. Retry with corrected input.
    Validation,
    /// Room full or already seated elsewhere.
    Capacity,
    /// Insufficient balance when the match tried to start.
    Funds,
    /// Unknown room code.
    NotFound,
    /// Store unavailable or the room actor is gone.
    Internal,
}

impl RejectKind {
    /// HTTP-style status code carried alongside the kind.
    pub fn code(self) -> u16 {
        match self {
            Self::Validation => 400,
            Self::Funds => 402,
            Self::NotFound => 404,
            Self::Capacity => 409,
            Self::Internal => 500,
        }
    }
}

/// A synchronous refusal of a client request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub kind: RejectKind,
    pub code: u16,
    pub message: String,
}

impl Rejection {
    pub fn new(kind: RejectKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: kind.code(),
            message: message.into(),
        }
    }
}
