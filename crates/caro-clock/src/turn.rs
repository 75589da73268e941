use std::time::Duration;

use caro_protocol::{ClockView, Slot};
use tokio::time::Instant;

/// Result of charging the mover for the time since the last move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charge {
    /// The move may be applied; `remaining` is what the mover keeps.
    Within { remaining: Duration },
    /// The budget was used up before the move arrived.
    Expired,
}

/// Remaining time budget per slot and the instant the running turn began.
///
/// The clock never ticks on its own. [`charge`](Self::charge) computes the
/// outcome of a move without changing anything, and
/// [`commit`](Self::commit) records it once the move is accepted, so a
/// rejected move costs the mover nothing.
#[derive(Debug, Clone)]
pub struct TurnClock {
    budget: Duration,
    remaining: [Duration; 2],
    last_move_at: Instant,
}

impl TurnClock {
    /// Both players get the full `budget`; the first turn starts at `now`.
    pub fn start(budget: Duration, now: Instant) -> Self {
        Self {
            budget,
            remaining: [budget; 2],
            last_move_at: now,
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Budget left for `slot` as of the last committed move.
    pub fn remaining(&self, slot: Slot) -> Duration {
        self.remaining[slot.index()]
    }

    pub fn last_move_at(&self) -> Instant {
        self.last_move_at
    }

    /// What `slot` would have left if it moved at `now`.
    ///
    /// Running out exactly at `now` counts as expired: a remaining budget of
    /// zero is not a budget.
    pub fn charge(&self, slot: Slot, now: Instant) -> Charge {
        let elapsed = now.saturating_duration_since(self.last_move_at);
        match self.remaining[slot.index()].checked_sub(elapsed) {
            Some(remaining) if !remaining.is_zero() => Charge::Within { remaining },
            _ => Charge::Expired,
        }
    }

    /// Records an accepted move by `slot` made at `now`.
    pub fn commit(&mut self, slot: Slot, remaining: Duration, now: Instant) {
        self.remaining[slot.index()] = remaining;
        self.last_move_at = now;
    }

    /// Marks `slot` as having run out. Used when the match ends on time.
    pub fn exhaust(&mut self, slot: Slot) {
        self.remaining[slot.index()] = Duration::ZERO;
    }

    /// Whether the player to move has already run out at `now`.
    pub fn is_expired(&self, to_move: Slot, now: Instant) -> bool {
        self.charge(to_move, now) == Charge::Expired
    }

    /// Budgets for display. The player to move is shown with the time
    /// elapsed in the running turn already deducted.
    pub fn view(&self, to_move: Slot, now: Instant) -> ClockView {
        let live = match self.charge(to_move, now) {
            Charge::Within { remaining } => remaining,
            Charge::Expired => Duration::ZERO,
        };
        let ms = |slot: Slot| {
            let remaining = if slot == to_move {
                live
            } else {
                self.remaining[slot.index()]
            };
            u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX)
        };
        ClockView {
            first_ms: ms(Slot::First),
            second_ms: ms(Slot::Second),
        }
    }

    /// A frozen view with no live deduction, for finished matches.
    pub fn settled_view(&self) -> ClockView {
        let ms = |slot: Slot| u64::try_from(self.remaining[slot.index()].as_millis()).unwrap_or(u64::MAX);
        ClockView {
            first_ms: ms(Slot::First),
            second_ms: ms(Slot::Second),
        }
    }
}
