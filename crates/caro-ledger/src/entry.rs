use std::fmt;

use caro_protocol::{Amount, MatchId, PlayerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a ledger entry was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerCategory {
    /// Stake debited when a match starts.
    Stake,
    /// Payout credited to the winner.
    GameWin,
    /// The loser's lost stake. Record-only: the money already left with
    /// the [`Stake`](Self::Stake) entry.
    GameLoss,
    /// Stake returned after a draw.
    Refund,
}

impl LedgerCategory {
    /// Whether an entry of this category accompanies an actual balance
    /// change.
    pub fn moves_money(self) -> bool {
        !matches!(self, Self::GameLoss)
    }
}

impl fmt::Display for LedgerCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stake => write!(f, "stake"),
            Self::GameWin => write!(f, "game_win"),
            Self::GameLoss => write!(f, "game_loss"),
            Self::Refund => write!(f, "refund"),
        }
    }
}

/// One line of a player's transaction history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub player: PlayerId,
    /// Signed: debits are negative.
    pub amount: Amount,
    pub category: LedgerCategory,
    pub reason: String,
    pub match_id: Option<MatchId>,
    pub at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn new(
        player: PlayerId,
        amount: Amount,
        category: LedgerCategory,
        reason: impl Into<String>,
        match_id: Option<MatchId>,
    ) -> Self {
        Self {
            player,
            amount,
            category,
            reason: reason.into(),
            match_id,
            at: Utc::now(),
        }
    }
}
