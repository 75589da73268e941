//! Stake collection and settlement.
//!
//! Both functions only stage work on the transaction they are given; the
//! caller commits. A match is paid out at most once: [`settle`] writes the
//! match's settled marker in the same unit of work as the payout and does
//! nothing if the marker is already there.

use caro_protocol::{Amount, FinishReason, MatchId, PlayerId, PlayerStats, RoomCode, Slot};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{LedgerCategory, LedgerEntry, StoreError, Transaction};

/// The house's cut, as the fraction of the pot paid to the winner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutPolicy {
    /// Basis points of the pot (both stakes) credited to the winner.
    /// `10_000` pays the whole pot.
    pub payout_bps: u32,
}

impl Default for PayoutPolicy {
    fn default() -> Self {
        Self { payout_bps: 8_000 }
    }
}

impl PayoutPolicy {
    const BPS_DENOMINATOR: i128 = 10_000;

    /// Winner's payout for a match staked at `stake`, rounded down to a
    /// whole minor unit.
    pub fn payout(&self, stake: Amount) -> Amount {
        let pot = i128::from(stake.0) * 2;
        let payout = pot * i128::from(self.payout_bps) / Self::BPS_DENOMINATOR;
        Amount(i64::try_from(payout).unwrap_or(i64::MAX))
    }
}

/// Who put what into a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stakes {
    pub match_id: MatchId,
    pub code: RoomCode,
    pub stake: Amount,
    /// Indexed by [`Slot::index`].
    pub players: [PlayerId; 2],
}

impl Stakes {
    pub fn player(&self, slot: Slot) -> PlayerId {
        self.players[slot.index()]
    }
}

/// How a match ended, from the ledger's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Winner { slot: Slot, reason: FinishReason },
    Draw,
}

/// What [`settle`] staged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    Paid {
        winner: PlayerId,
        loser: PlayerId,
        payout: Amount,
        /// Updated statistics, indexed by [`Slot::index`].
        stats: [PlayerStats; 2],
    },
    Refunded {
        stake: Amount,
        stats: [PlayerStats; 2],
    },
    /// The settled marker was already present; nothing was staged.
    AlreadySettled,
}

impl Settlement {
    pub fn payout(&self) -> Amount {
        match self {
            Self::Paid { payout, .. } => *payout,
            Self::Refunded { .. } | Self::AlreadySettled => Amount::ZERO,
        }
    }

    pub fn stats(&self) -> Option<[PlayerStats; 2]> {
        match self {
            Self::Paid { stats, .. } | Self::Refunded { stats, .. } => Some(*stats),
            Self::AlreadySettled => None,
        }
    }
}

/// Debits both stakes and records a `stake` entry for each player.
///
/// # Errors
/// [`StoreError::InsufficientFunds`] for the first player who cannot cover
/// the stake. The caller drops the transaction, so neither wallet changes.
pub fn collect_stakes(tx: &mut dyn Transaction, stakes: &Stakes) -> Result<(), StoreError> {
    for player in stakes.players {
        tx.debit(player, stakes.stake)?;
        tx.record(LedgerEntry::new(
            player,
            -stakes.stake,
            LedgerCategory::Stake,
            format!("Stake for caro room {}", stakes.code),
            Some(stakes.match_id),
        ))?;
    }
    Ok(())
}

/// Pays out a finished match.
///
/// Winner: credited [`PayoutPolicy::payout`] with a `game_win` entry; the
/// loser gets a record-only `game_loss` entry for the stake. Draw: both
/// stakes are refunded. Statistics are updated for both players in either
/// case.
pub fn settle(
    tx: &mut dyn Transaction,
    stakes: &Stakes,
    outcome: Outcome,
    policy: &PayoutPolicy,
) -> Result<Settlement, StoreError> {
    if !tx.mark_settled(stakes.match_id)? {
        return Ok(Settlement::AlreadySettled);
    }

    match outcome {
        Outcome::Winner { slot, reason } => {
            let winner = stakes.player(slot);
            let loser = stakes.player(slot.opponent());
            let payout = policy.payout(stakes.stake);

            tx.credit(winner, payout)?;
            tx.record(LedgerEntry::new(
                winner,
                payout,
                LedgerCategory::GameWin,
                format!("Won caro room {} ({reason})", stakes.code),
                Some(stakes.match_id),
            ))?;
            tx.record(LedgerEntry::new(
                loser,
                -stakes.stake,
                LedgerCategory::GameLoss,
                format!("Lost caro room {} ({reason})", stakes.code),
                Some(stakes.match_id),
            ))?;

            let winner_stats = record_game(tx, winner, true, payout)?;
            let loser_stats = record_game(tx, loser, false, -stakes.stake)?;
            let mut stats = [PlayerStats::default(); 2];
            stats[slot.index()] = winner_stats;
            stats[slot.opponent().index()] = loser_stats;

            info!(
                match_id = %stakes.match_id,
                code = %stakes.code,
                %winner,
                %payout,
                %reason,
                "match settled"
            );
            Ok(Settlement::Paid {
                winner,
                loser,
                payout,
                stats,
            })
        }
        Outcome::Draw => {
            let mut stats = [PlayerStats::default(); 2];
            for slot in Slot::BOTH {
                let player = stakes.player(slot);
                tx.credit(player, stakes.stake)?;
                tx.record(LedgerEntry::new(
                    player,
                    stakes.stake,
                    LedgerCategory::Refund,
                    format!("Draw in caro room {}", stakes.code),
                    Some(stakes.match_id),
                ))?;
                stats[slot.index()] = record_game(tx, player, false, Amount::ZERO)?;
            }
            info!(match_id = %stakes.match_id, code = %stakes.code, "match drawn, stakes refunded");
            Ok(Settlement::Refunded {
                stake: stakes.stake,
                stats,
            })
        }
    }
}

/// Counts one finished game for `player`. The level only ever goes up.
fn record_game(
    tx: &mut dyn Transaction,
    player: PlayerId,
    won: bool,
    earnings: Amount,
) -> Result<PlayerStats, StoreError> {
    let mut stats = tx.stats(player)?;
    stats.games_played += 1;
    if won {
        stats.games_won += 1;
    }
    stats.total_earnings = stats
        .total_earnings
        .checked_add(earnings)
        .ok_or(StoreError::Overflow(player))?;
    stats.level = stats.level.max(PlayerStats::level_for_wins(stats.games_won));
    tx.put_stats(player, stats)?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payout_default_is_eighty_percent_of_pot() {
        assert_eq!(PayoutPolicy::default().payout(Amount(10)), Amount(16));
        assert_eq!(PayoutPolicy::default().payout(Amount(7)), Amount(11));
    }

    #[test]
    fn test_payout_full_pot() {
        let policy = PayoutPolicy { payout_bps: 10_000 };
        assert_eq!(policy.payout(Amount(25)), Amount(50));
    }

    #[test]
    fn test_payout_huge_stake_saturates() {
        let policy = PayoutPolicy { payout_bps: 10_000 };
        assert_eq!(policy.payout(Amount(i64::MAX)), Amount(i64::MAX));
    }
}
