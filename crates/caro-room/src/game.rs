//! The match inside a room: seats, turn order, the move log and the clock.
//!
//! [`Match`] is plain data owned by one room actor. It never talks to the
//! ledger or the publisher; the actor decides what a [`MovePlan`] means for
//! money and broadcasts. Moves are handled in two steps so a move that
//! would end the match is only applied once settlement succeeded:
//!
//! ```text
//! plan_move() ──→ MovePlan ──(settle if terminal)──→ apply_move()
//! ```

use std::time::Duration;

use caro_board::{Board, Placement};
use caro_clock::{Charge, TurnClock};
use caro_protocol::{
    Amount, ClockView, Coord, FinishReason, MatchId, MatchResult, MatchStatus, MoveRecord,
    PlayerId, Slot,
};
use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::RoomError;

/// A seated player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seat {
    pub player: PlayerId,
    pub ready: bool,
    pub online: bool,
}

impl Seat {
    fn new(player: PlayerId) -> Self {
        Self {
            player,
            ready: false,
            online: true,
        }
    }
}

/// Rules a match is played under, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rules {
    pub win_length: u32,
    pub time_budget: Option<Duration>,
    pub max_moves: Option<u32>,
}

/// How the board stands after a planned placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Won,
    Drawn,
}

/// A validated move, not yet applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovePlan {
    /// The mover's budget ran out before the move arrived. The move is
    /// discarded and the mover loses on time.
    TimedOut { mover: Slot },
    Place {
        slot: Slot,
        coord: Coord,
        /// Mover's budget after this move, for timed matches.
        remaining: Option<Duration>,
        verdict: Verdict,
    },
}

/// The match state machine.
#[derive(Debug, Clone)]
pub struct Match {
    id: MatchId,
    status: MatchStatus,
    seats: [Option<Seat>; 2],
    turn: Slot,
    moves: Vec<MoveRecord>,
    board: Board,
    clock: Option<TurnClock>,
    result: Option<MatchResult>,
    stake: Amount,
    rules: Rules,
}

impl Match {
    /// A waiting match with `creator` in slot 1.
    pub fn new(id: MatchId, creator: PlayerId, stake: Amount, rules: Rules) -> Self {
        Self {
            id,
            status: MatchStatus::Waiting,
            seats: [Some(Seat::new(creator)), None],
            turn: Slot::First,
            moves: Vec::new(),
            board: Board::new(),
            clock: None,
            result: None,
            stake,
            rules,
        }
    }

    pub fn id(&self) -> MatchId {
        self.id
    }

    pub fn status(&self) -> MatchStatus {
        self.status
    }

    pub fn stake(&self) -> Amount {
        self.stake
    }

    pub fn rules(&self) -> Rules {
        self.rules
    }

    pub fn turn(&self) -> Slot {
        self.turn
    }

    pub fn moves(&self) -> &[MoveRecord] {
        &self.moves
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn result(&self) -> Option<&MatchResult> {
        self.result.as_ref()
    }

    pub fn seat(&self, slot: Slot) -> Option<&Seat> {
        self.seats[slot.index()].as_ref()
    }

    pub fn player(&self, slot: Slot) -> Option<PlayerId> {
        self.seat(slot).map(|seat| seat.player)
    }

    pub fn slot_of(&self, player: PlayerId) -> Option<Slot> {
        Slot::BOTH
            .into_iter()
            .find(|slot| self.player(*slot) == Some(player))
    }

    pub fn seated(&self) -> usize {
        self.seats.iter().flatten().count()
    }

    /// Both players, once both seats are filled.
    pub fn players(&self) -> Option<[PlayerId; 2]> {
        Some([self.player(Slot::First)?, self.player(Slot::Second)?])
    }

    pub fn is_timed(&self) -> bool {
        self.rules.time_budget.is_some()
    }

    // -- seating -----------------------------------------------------------

    /// Puts `player` in slot 2.
    pub fn seat_second(&mut self, player: PlayerId) -> Result<(), RoomError> {
        if self.status != MatchStatus::Waiting {
            return Err(RoomError::WrongStatus(format!("cannot take a seat while {}", self.status)));
        }
        if self.seats[Slot::Second.index()].is_some() {
            return Err(RoomError::WrongStatus("seat two is taken".into()));
        }
        self.seats[Slot::Second.index()] = Some(Seat::new(player));
        Ok(())
    }

    /// Frees slot 2 and clears both ready flags. Only while waiting.
    pub fn vacate_second(&mut self) -> Option<PlayerId> {
        if self.status != MatchStatus::Waiting {
            return None;
        }
        let left = self.seats[Slot::Second.index()].take().map(|seat| seat.player);
        self.clear_ready();
        left
    }

    pub fn set_online(&mut self, slot: Slot, online: bool) {
        if let Some(seat) = self.seats[slot.index()].as_mut() {
            seat.online = online;
        }
    }

    // -- readiness ---------------------------------------------------------

    /// Flags `slot` ready. Returns `true` when both seats are filled and
    /// ready.
    pub fn set_ready(&mut self, slot: Slot, ready: bool) -> bool {
        if let Some(seat) = self.seats[slot.index()].as_mut() {
            seat.ready = ready;
        }
        self.both_ready()
    }

    pub fn both_ready(&self) -> bool {
        self.seats.iter().all(|seat| seat.is_some_and(|s| s.ready))
    }

    pub fn ready_flags(&self) -> (bool, bool) {
        let ready = |slot: Slot| self.seat(slot).is_some_and(|s| s.ready);
        (ready(Slot::First), ready(Slot::Second))
    }

    pub fn clear_ready(&mut self) {
        for seat in self.seats.iter_mut().flatten() {
            seat.ready = false;
        }
    }

    /// Starts play: slot 1 moves first, budgets (if any) start at `now`.
    pub fn start(&mut self, now: Instant) {
        self.status = MatchStatus::Playing;
        self.turn = Slot::First;
        self.clock = self.rules.time_budget.map(|budget| TurnClock::start(budget, now));
    }

    // -- moves -------------------------------------------------------------

    /// Validates a move without changing anything.
    ///
    /// Checked in order: match is playing, requester is seated, the claimed
    /// slot is theirs, it is their turn, their clock has not run out, and
    /// the cell is free.
    pub fn plan_move(
        &self,
        player: PlayerId,
        coord: Coord,
        claimed: Slot,
        now: Instant,
    ) -> Result<MovePlan, RoomError> {
        if self.status != MatchStatus::Playing {
            return Err(RoomError::WrongStatus(format!("match is {}", self.status)));
        }
        let slot = self.slot_of(player).ok_or(RoomError::NotSeated(player))?;
        if slot != claimed {
            return Err(RoomError::SlotMismatch {
                claimed,
                actual: slot,
            });
        }
        if slot != self.turn {
            return Err(RoomError::NotYourTurn { turn: self.turn });
        }

        let remaining = match &self.clock {
            Some(clock) => match clock.charge(slot, now) {
                Charge::Within { remaining } => Some(remaining),
                Charge::Expired => return Ok(MovePlan::TimedOut { mover: slot }),
            },
            None => None,
        };

        if self.board.is_occupied(coord) {
            return Err(RoomError::PositionOccupied(coord));
        }

        let verdict = if self.board.wins_with(coord, slot, self.rules.win_length) {
            Verdict::Won
        } else if self
            .rules
            .max_moves
            .is_some_and(|max| self.moves.len() + 1 >= max as usize)
        {
            Verdict::Drawn
        } else {
            Verdict::Continue
        };

        Ok(MovePlan::Place {
            slot,
            coord,
            remaining,
            verdict,
        })
    }

    /// Applies a planned placement and returns the committed record.
    ///
    /// The turn passes to the opponent only if the match continues.
    pub fn apply_move(
        &mut self,
        slot: Slot,
        coord: Coord,
        remaining: Option<Duration>,
        verdict: Verdict,
        now: Instant,
        at: DateTime<Utc>,
    ) -> Result<MoveRecord, RoomError> {
        if let Placement::Occupied(_) = self.board.place(coord, slot) {
            return Err(RoomError::PositionOccupied(coord));
        }
        let seq = u32::try_from(self.moves.len() + 1).unwrap_or(u32::MAX);
        let record = MoveRecord {
            seq,
            coord,
            mark: slot,
            at,
        };
        self.moves.push(record.clone());
        if let (Some(clock), Some(remaining)) = (self.clock.as_mut(), remaining) {
            clock.commit(slot, remaining, now);
        }
        if verdict == Verdict::Continue {
            self.turn = slot.opponent();
        }
        Ok(record)
    }

    // -- time --------------------------------------------------------------

    /// The player to move, if their budget has already run out at `now`.
    pub fn expired_mover(&self, now: Instant) -> Option<Slot> {
        if self.status != MatchStatus::Playing {
            return None;
        }
        let clock = self.clock.as_ref()?;
        clock.is_expired(self.turn, now).then_some(self.turn)
    }

    /// Remaining budgets for display.
    pub fn clock_view(&self, now: Instant) -> Option<ClockView> {
        let clock = self.clock.as_ref()?;
        Some(match self.status {
            MatchStatus::Playing => clock.view(self.turn, now),
            _ => clock.settled_view(),
        })
    }

    // -- finishing ---------------------------------------------------------

    /// Moves the match to `finished`. Returns `false`, changing nothing, if
    /// it already was.
    pub fn finish(&mut self, result: MatchResult) -> bool {
        if self.status == MatchStatus::Finished {
            return false;
        }
        if result.reason == FinishReason::Timeout {
            if let (Some(clock), Some(winner)) = (self.clock.as_mut(), result.winner) {
                clock.exhaust(winner.opponent());
            }
        }
        self.status = MatchStatus::Finished;
        self.result = Some(result);
        true
    }
}
