//! Shared vocabulary of the caro server.
//!
//! - **Types** ([`PlayerId`], [`RoomCode`], [`Slot`], [`Coord`], [`Amount`])
//!   identify players, rooms and board cells.
//! - **Model** ([`MatchSnapshot`], [`Event`], [`Topic`], [`Rejection`]) is
//!   the broadcastable view of a match.
//! - **Collaborators** ([`Publisher`], [`Directory`]) are the seams to the
//!   notification fan-out and the account system.
//! - **Wire** ([`Envelope`], [`Payload`], [`Codec`]) is how all of the above
//!   travels over a connection.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Presence / Rooms
//! ```

mod codec;
mod collab;
mod error;
mod model;
mod types;
mod wire;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use collab::{AnonymousDirectory, Directory, NullPublisher, Publisher, RecordingPublisher};
pub use error::ProtocolError;
pub use model::{
    BoardCell, ClockView, Event, FinishReason, MatchResult, MatchSnapshot, MatchStatus, MoveRecord,
    Phase, PlayerDisplay, PlayerStats, PlayerView, RejectKind, Rejection, RoomListEntry,
    RoomStatus, Topic,
};
pub use types::{Amount, Coord, MatchId, PlayerId, RoomCode, Slot};
pub use wire::{Envelope, Payload, Reply, Request, SystemMessage};

/// Version clients must send in their handshake.
pub const PROTOCOL_VERSION: u32 = 1;
