//! Error types for the room layer.

use caro_ledger::StoreError;
use caro_protocol::{Amount, Coord, PlayerId, RejectKind, Rejection, RoomCode, Slot};

/// Why a room refused a command. Every refusal leaves the room unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    #[error("room {0} not found")]
    NotFound(RoomCode),

    /// The match is not in a status that allows this operation.
    #[error("{0}")]
    WrongStatus(String),

    #[error("{0} is not seated in this match")]
    NotSeated(PlayerId),

    #[error("{0} is not in room {1}")]
    NotInRoom(PlayerId, RoomCode),

    #[error("move claims {claimed} but the player holds {actual}")]
    SlotMismatch { claimed: Slot, actual: Slot },

    #[error("not your turn: {turn} is to move")]
    NotYourTurn { turn: Slot },

    #[error("cell {0} is already occupied")]
    PositionOccupied(Coord),

    #[error("stake {0} is outside the allowed range")]
    InvalidStake(Amount),

    #[error("capacity {0} is outside the allowed range")]
    InvalidCapacity(usize),

    #[error("room {0} is full")]
    RoomFull(RoomCode),

    #[error("{player} is already playing in room {code}")]
    InOtherRoom { player: PlayerId, code: RoomCode },

    #[error("{player} cannot cover the stake: balance {balance}, required {required}")]
    InsufficientFunds {
        player: PlayerId,
        balance: Amount,
        required: Amount,
    },

    #[error("ledger error: {0}")]
    Store(#[from] StoreError),

    /// The room's actor is gone or its queue is closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomCode),
}

impl RoomError {
    /// The category reported to clients.
    pub fn kind(&self) -> RejectKind {
        match self {
            Self::NotFound(_) => RejectKind::NotFound,
            Self::WrongStatus(_)
            | Self::NotSeated(_)
            | Self::NotInRoom(..)
            | Self::SlotMismatch { .. }
            | Self::NotYourTurn { .. }
            | Self::PositionOccupied(_)
            | Self::InvalidStake(_)
            | Self::InvalidCapacity(_) => RejectKind::Validation,
            Self::RoomFull(_) | Self::InOtherRoom { .. } => RejectKind::Capacity,
            Self::InsufficientFunds { .. } | Self::Store(StoreError::InsufficientFunds { .. }) => {
                RejectKind::Funds
            }
            Self::Store(_) | Self::Unavailable(_) => RejectKind::Internal,
        }
    }

    pub fn to_rejection(&self) -> Rejection {
        Rejection::new(self.kind(), self.to_string())
    }
}
