//! Rules and limits shared by every room.

use std::time::Duration;

use caro_board::DEFAULT_WIN_LENGTH;
use caro_clock::SweepConfig;
use caro_ledger::PayoutPolicy;
use caro_protocol::Amount;
use serde::{Deserialize, Serialize};

use crate::RoomError;

/// Configuration applied to every room the manager creates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Marks in a row needed to win.
    pub win_length: u32,

    /// Share of the pot paid to the winner.
    pub payout: PayoutPolicy,

    /// Per-player time budget. `None` plays untimed: a player who leaves
    /// mid-game forfeits immediately.
    pub time_budget: Option<Duration>,

    /// Total moves after which a match without a winner is drawn. `None`
    /// means the board is unbounded and a draw never happens.
    pub max_moves: Option<u32>,

    pub min_stake: Amount,

    /// `None` for no upper bound.
    pub max_stake: Option<Amount>,

    /// Largest allowed room capacity (seated players plus spectators).
    pub max_capacity: usize,

    /// How often a timed room checks for a mover whose budget ran out.
    /// `None` leaves timeouts to be found at the next move.
    pub sweep_interval: Option<Duration>,

    /// Command queue length of each room actor.
    pub channel_size: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            win_length: DEFAULT_WIN_LENGTH,
            payout: PayoutPolicy::default(),
            time_budget: None,
            max_moves: None,
            min_stake: Amount(1),
            max_stake: None,
            max_capacity: 10,
            sweep_interval: Some(Duration::from_secs(1)),
            channel_size: 64,
        }
    }
}

impl GameConfig {
    /// Seats in a match. Capacity can never be below this.
    pub const SEATS: usize = 2;

    pub fn timed(budget: Duration) -> Self {
        Self {
            time_budget: Some(budget),
            ..Default::default()
        }
    }

    pub fn check_stake(&self, stake: Amount) -> Result<(), RoomError> {
        let too_high = self.max_stake.is_some_and(|max| stake > max);
        if stake < self.min_stake || too_high {
            return Err(RoomError::InvalidStake(stake));
        }
        Ok(())
    }

    pub fn check_capacity(&self, capacity: usize) -> Result<(), RoomError> {
        if !(Self::SEATS..=self.max_capacity.max(Self::SEATS)).contains(&capacity) {
            return Err(RoomError::InvalidCapacity(capacity));
        }
        Ok(())
    }

    pub fn sweep_config(&self) -> SweepConfig {
        match self.sweep_interval {
            Some(interval) => SweepConfig::every(interval),
            None => SweepConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_untimed_five_in_a_row() {
        let config = GameConfig::default();
        assert_eq!(config.win_length, 5);
        assert_eq!(config.time_budget, None);
        assert_eq!(config.max_moves, None);
        assert_eq!(config.payout.payout_bps, 8_000);
    }

    #[test]
    fn test_check_stake_bounds() {
        let config = GameConfig {
            min_stake: Amount(5),
            max_stake: Some(Amount(100)),
            ..Default::default()
        };
        assert!(config.check_stake(Amount(5)).is_ok());
        assert!(config.check_stake(Amount(100)).is_ok());
        assert!(matches!(config.check_stake(Amount(4)), Err(RoomError::InvalidStake(_))));
        assert!(matches!(config.check_stake(Amount(101)), Err(RoomError::InvalidStake(_))));
        assert!(config.check_stake(Amount(-1)).is_err());
    }

    #[test]
    fn test_check_capacity_requires_both_seats() {
        let config = GameConfig::default();
        assert!(matches!(config.check_capacity(1), Err(RoomError::InvalidCapacity(1))));
        assert!(config.check_capacity(2).is_ok());
        assert!(config.check_capacity(10).is_ok());
        assert!(config.check_capacity(11).is_err());
    }

    #[test]
    fn test_config_roundtrips_through_json() {
        let config = GameConfig::timed(Duration::from_secs(300));
        let json = serde_json::to_string(&config).unwrap();
        let back: GameConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.time_budget, Some(Duration::from_secs(300)));
    }
}
