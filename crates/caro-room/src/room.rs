//! Room actor: one Tokio task per room, owning its match.
//!
//! Every mutation of a room happens inside its task, one command at a
//! time. That is what makes "finish and settle at most once" hold when a
//! winning move, a leave and a timer sweep race each other: whichever
//! command runs first finishes the match, and the others find it finished.
//! Broadcasts are published from inside the task right after each commit,
//! so observers see them in commit order.

use std::collections::BTreeSet;
use std::sync::Arc;

use caro_clock::SweepTimer;
use caro_ledger::{collect_stakes, settle, Outcome, Settlement, Stakes, Store, StoreError};
use caro_protocol::{
    Amount, Coord, Directory, Event, FinishReason, MatchId, MatchResult, MatchSnapshot,
    MatchStatus, Phase, PlayerId, PlayerView, Publisher, RoomCode, RoomListEntry, RoomStatus,
    Slot, Topic,
};
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::game::{Match, MovePlan, Rules, Verdict};
use crate::{GameConfig, RoomError};

/// Collaborators every room needs, shared by all of them.
#[derive(Clone)]
pub struct RoomServices {
    pub store: Arc<dyn Store>,
    pub publisher: Arc<dyn Publisher>,
    pub directory: Arc<dyn Directory>,
    pub config: Arc<GameConfig>,
}

/// How an identity stopped being present in a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Departure {
    /// The player asked to leave.
    Left,
    /// The player's last connection went away.
    Disconnected,
}

/// Room metadata, without the match itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub code: RoomCode,
    pub match_id: MatchId,
    pub status: RoomStatus,
    pub stake: Amount,
    /// Seated players plus spectators.
    pub occupancy: usize,
    pub capacity: usize,
    /// Identities currently in the room, seated or watching.
    pub present: usize,
    pub seated: [Option<PlayerId>; 2],
    pub created_at: DateTime<Utc>,
    /// Whether the room belongs in the discovery list.
    pub listable: bool,
}

impl RoomInfo {
    pub fn entry(&self) -> RoomListEntry {
        RoomListEntry {
            code: self.code.clone(),
            stake: self.stake,
            occupancy: self.occupancy,
            capacity: self.capacity,
        }
    }

    pub fn is_seated(&self, player: PlayerId) -> bool {
        self.seated.contains(&Some(player))
    }
}

/// Reply to a room command: the state after it, for the caller and for the
/// manager's bookkeeping.
#[derive(Debug, Clone)]
pub struct Ack {
    pub snapshot: MatchSnapshot,
    pub info: RoomInfo,
}

type Reply<T> = oneshot::Sender<Result<T, RoomError>>;

pub(crate) enum RoomCommand {
    Join {
        player: PlayerId,
        reply: Reply<Ack>,
    },
    Leave {
        player: PlayerId,
        departure: Departure,
        reply: Reply<Ack>,
    },
    Ready {
        player: PlayerId,
        reply: Reply<Ack>,
    },
    Move {
        player: PlayerId,
        coord: Coord,
        slot: Slot,
        reply: Reply<Ack>,
    },
    Snapshot {
        reply: oneshot::Sender<Ack>,
    },
    Info {
        reply: oneshot::Sender<RoomInfo>,
    },
    /// Stop if the room is over and empty; replies whether it stopped.
    CloseIfIdle {
        reply: oneshot::Sender<bool>,
    },
    Shutdown,
}

/// Handle to a running room actor. Cheap to clone.
#[derive(Clone)]
pub struct RoomHandle {
    code: RoomCode,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    /// Whether both handles drive the same actor task.
    pub fn same_actor(&self, other: &RoomHandle) -> bool {
        self.sender.same_channel(&other.sender)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))
    }

    pub async fn join(&self, player: PlayerId) -> Result<Ack, RoomError> {
        self.request(|reply| RoomCommand::Join { player, reply })
            .await?
    }

    pub async fn leave(&self, player: PlayerId, departure: Departure) -> Result<Ack, RoomError> {
        self.request(|reply| RoomCommand::Leave {
            player,
            departure,
            reply,
        })
        .await?
    }

    pub async fn ready(&self, player: PlayerId) -> Result<Ack, RoomError> {
        self.request(|reply| RoomCommand::Ready { player, reply })
            .await?
    }

    pub async fn submit_move(
        &self,
        player: PlayerId,
        coord: Coord,
        slot: Slot,
    ) -> Result<Ack, RoomError> {
        self.request(|reply| RoomCommand::Move {
            player,
            coord,
            slot,
            reply,
        })
        .await?
    }

    pub async fn snapshot(&self) -> Result<Ack, RoomError> {
        self.request(|reply| RoomCommand::Snapshot { reply }).await
    }

    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        self.request(|reply| RoomCommand::Info { reply }).await
    }

    /// Stops the actor if, as of now, the room is cancelled, or finished
    /// with nobody in it. Returns whether it stopped.
    pub async fn close_if_idle(&self) -> Result<bool, RoomError> {
        self.request(|reply| RoomCommand::CloseIfIdle { reply }).await
    }

    /// Asks the actor to stop. Commands already queued are dropped.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))
    }
}

/// Everything needed to open a room.
pub(crate) struct NewRoom {
    pub code: RoomCode,
    pub match_id: MatchId,
    pub creator: PlayerId,
    pub stake: Amount,
    pub capacity: usize,
}

struct RoomActor {
    code: RoomCode,
    capacity: usize,
    status: RoomStatus,
    created_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    game: Match,
    spectators: BTreeSet<PlayerId>,
    present: BTreeSet<PlayerId>,
    services: RoomServices,
    sweep: SweepTimer,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    async fn run(mut self) {
        info!(code = %self.code, "room actor started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if !self.handle(cmd) {
                        break;
                    }
                }
                sweep = self.sweep.wait_for_sweep() => {
                    trace!(code = %self.code, sweep = sweep.sweep, "sweeping");
                    self.handle_sweep();
                }
            }
        }

        info!(code = %self.code, "room actor stopped");
    }

    /// Returns `false` when the actor should stop.
    fn handle(&mut self, cmd: RoomCommand) -> bool {
        match cmd {
            RoomCommand::Join { player, reply } => {
                let _ = reply.send(self.handle_join(player));
            }
            RoomCommand::Leave {
                player,
                departure,
                reply,
            } => {
                let _ = reply.send(self.handle_leave(player, departure));
            }
            RoomCommand::Ready { player, reply } => {
                let _ = reply.send(self.handle_ready(player));
            }
            RoomCommand::Move {
                player,
                coord,
                slot,
                reply,
            } => {
                let result = self.handle_move(player, coord, slot);
                if let Err(e) = &result {
                    debug!(code = %self.code, %player, %coord, error = %e, "move rejected");
                }
                let _ = reply.send(result);
            }
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(self.ack());
            }
            RoomCommand::Info { reply } => {
                let _ = reply.send(self.info());
            }
            RoomCommand::CloseIfIdle { reply } => {
                let idle = self.is_idle();
                let _ = reply.send(idle);
                if idle {
                    info!(code = %self.code, status = %self.status, "idle room closing");
                    return false;
                }
            }
            RoomCommand::Shutdown => {
                info!(code = %self.code, "room shutting down");
                return false;
            }
        }
        true
    }

    // -- join / leave ------------------------------------------------------

    fn handle_join(&mut self, player: PlayerId) -> Result<Ack, RoomError> {
        let was_listable = self.listable();

        if let Some(slot) = self.game.slot_of(player) {
            // Seated players may always come back; this is how a
            // disconnected player resumes a timed match.
            self.game.set_online(slot, true);
            self.present.insert(player);
            info!(code = %self.code, %player, %slot, "seated player rejoined");
        } else if self.spectators.contains(&player) {
            return Ok(self.ack());
        } else {
            if self.status.is_terminal() {
                return Err(RoomError::WrongStatus(format!("room is {}", self.status)));
            }
            if self.occupancy() >= self.capacity {
                return Err(RoomError::RoomFull(self.code.clone()));
            }
            if self.status == RoomStatus::Waiting && self.game.player(Slot::Second).is_none() {
                self.game.seat_second(player)?;
                info!(code = %self.code, %player, "player took seat two");
            } else {
                self.spectators.insert(player);
                debug!(code = %self.code, %player, "spectator joined");
            }
            self.present.insert(player);
        }

        let ack = self.ack();
        self.publish_room(Event::RoomUpdated {
            snapshot: ack.snapshot.clone(),
        });
        self.sync_lobby(was_listable, &ack);
        Ok(ack)
    }

    fn handle_leave(&mut self, player: PlayerId, departure: Departure) -> Result<Ack, RoomError> {
        let was_listable = self.listable();
        let was_present = self.present.remove(&player);

        let Some(slot) = self.game.slot_of(player) else {
            self.spectators.remove(&player);
            if !was_present {
                return match departure {
                    Departure::Left => Err(RoomError::NotInRoom(player, self.code.clone())),
                    Departure::Disconnected => Ok(self.ack()),
                };
            }
            let ack = self.ack();
            self.publish_room(Event::RoomUpdated {
                snapshot: ack.snapshot.clone(),
            });
            self.sync_lobby(was_listable, &ack);
            return Ok(ack);
        };

        match (self.status, self.game.status()) {
            (RoomStatus::Waiting, MatchStatus::Waiting) => match slot {
                Slot::First => self.cancel(player),
                Slot::Second => {
                    self.game.vacate_second();
                    info!(code = %self.code, %player, ?departure, "seat two freed");
                    let ack = self.ack();
                    self.publish_room(Event::RoomUpdated {
                        snapshot: ack.snapshot.clone(),
                    });
                    self.sync_lobby(was_listable, &ack);
                }
            },
            (_, MatchStatus::Playing) => {
                self.game.set_online(slot, false);
                if self.game.is_timed() {
                    info!(code = %self.code, %player, ?departure, "player offline, clock keeps running");
                    self.publish_room(Event::RoomUpdated {
                        snapshot: self.snapshot(),
                    });
                } else {
                    self.forfeit(player, slot)?;
                }
            }
            // Finished or cancelled: the match no longer changes.
            _ => {}
        }

        Ok(self.ack())
    }

    /// The creator left before the match started.
    fn cancel(&mut self, creator: PlayerId) {
        let was_listable = self.listable();
        self.status = RoomStatus::Cancelled;
        self.finished_at = Some(Utc::now());
        self.game.clear_ready();
        self.spectators.clear();
        self.present.clear();
        info!(code = %self.code, %creator, "room cancelled by creator");

        self.publish_room(Event::RoomUpdated {
            snapshot: self.snapshot(),
        });
        if was_listable {
            self.publish_lobby(Event::RoomRemoved {
                code: self.code.clone(),
            });
        }
    }

    fn forfeit(&mut self, player: PlayerId, slot: Slot) -> Result<(), RoomError> {
        let winner = slot.opponent();
        let result = self
            .settle_outcome(Outcome::Winner {
                slot: winner,
                reason: FinishReason::Forfeit,
            })
            .inspect_err(|e| {
                error!(code = %self.code, %player, error = %e, "forfeit settlement failed");
            })?;
        self.finish(result.clone());
        self.publish_room(Event::PlayerForfeited {
            code: self.code.clone(),
            player_id: player,
            winner,
        });
        self.publish_finished(result);
        Ok(())
    }

    // -- ready -------------------------------------------------------------

    fn handle_ready(&mut self, player: PlayerId) -> Result<Ack, RoomError> {
        if self.status != RoomStatus::Waiting || self.game.status() != MatchStatus::Waiting {
            return Err(RoomError::WrongStatus(format!(
                "cannot ready up while the room is {}",
                self.status
            )));
        }
        let slot = self.game.slot_of(player).ok_or(RoomError::NotSeated(player))?;
        if self.game.seat(slot).is_some_and(|seat| seat.ready) {
            return Ok(self.ack());
        }

        if !self.game.set_ready(slot, true) {
            self.publish_ready(player);
            return Ok(self.ack());
        }

        match self.take_stakes() {
            Ok(()) => {
                self.start();
                self.publish_ready(player);
                let ack = self.ack();
                self.publish_room(Event::GameStarted {
                    snapshot: ack.snapshot.clone(),
                });
                Ok(ack)
            }
            Err(StoreError::InsufficientFunds {
                player: short,
                balance,
                required,
            }) => {
                self.game.clear_ready();
                info!(code = %self.code, %short, %balance, %required, "start aborted: insufficient funds");
                self.publish_room(Event::StartAborted {
                    code: self.code.clone(),
                    player_id: short,
                    reason: format!("{short} cannot cover the stake of {required}"),
                });
                self.publish_room(Event::RoomUpdated {
                    snapshot: self.snapshot(),
                });
                Err(RoomError::InsufficientFunds {
                    player: short,
                    balance,
                    required,
                })
            }
            Err(e) => {
                self.game.set_ready(slot, false);
                error!(code = %self.code, %player, error = %e, "stake collection failed");
                Err(RoomError::Store(e))
            }
        }
    }

    fn take_stakes(&self) -> Result<(), StoreError> {
        let stakes = self.stakes().ok_or_else(|| StoreError::Unavailable("seat two is empty".into()))?;
        let mut tx = self.services.store.begin()?;
        collect_stakes(tx.as_mut(), &stakes)?;
        tx.commit()
    }

    fn start(&mut self) {
        self.game.start(Instant::now());
        self.status = RoomStatus::Active;
        if self.game.is_timed() {
            self.sweep.arm();
        }
        info!(
            code = %self.code,
            match_id = %self.game.id(),
            stake = %self.game.stake(),
            timed = self.game.is_timed(),
            "game started"
        );
    }

    // -- moves -------------------------------------------------------------

    fn handle_move(&mut self, player: PlayerId, coord: Coord, slot: Slot) -> Result<Ack, RoomError> {
        let now = Instant::now();
        match self.game.plan_move(player, coord, slot, now)? {
            MovePlan::TimedOut { mover } => {
                info!(code = %self.code, %player, "move arrived after the clock ran out");
                self.end_on_time(mover)?;
            }
            MovePlan::Place {
                slot,
                coord,
                remaining,
                verdict,
            } => {
                // A move that ends the match is applied only once the
                // payout is committed.
                let settled = match verdict {
                    Verdict::Continue => None,
                    Verdict::Won => Some(self.settle_outcome(Outcome::Winner {
                        slot,
                        reason: FinishReason::Win,
                    })?),
                    Verdict::Drawn => Some(self.settle_outcome(Outcome::Draw)?),
                };

                let record = self
                    .game
                    .apply_move(slot, coord, remaining, verdict, now, Utc::now())?;
                if let Some(result) = &settled {
                    self.finish(result.clone());
                }

                self.publish_room(Event::MoveMade {
                    code: self.code.clone(),
                    record,
                    next_turn: self.game.turn(),
                    clock: self.game.clock_view(now),
                });
                if let Some(result) = settled {
                    self.publish_finished(result);
                }
            }
        }
        Ok(self.ack())
    }

    fn handle_sweep(&mut self) {
        let Some(mover) = self.game.expired_mover(Instant::now()) else {
            return;
        };
        if let Err(e) = self.end_on_time(mover) {
            warn!(code = %self.code, error = %e, "timeout settlement failed, retrying next sweep");
        }
    }

    fn end_on_time(&mut self, mover: Slot) -> Result<(), RoomError> {
        let result = self.settle_outcome(Outcome::Winner {
            slot: mover.opponent(),
            reason: FinishReason::Timeout,
        })?;
        self.finish(result.clone());
        self.publish_finished(result);
        Ok(())
    }

    // -- settlement --------------------------------------------------------

    fn stakes(&self) -> Option<Stakes> {
        Some(Stakes {
            match_id: self.game.id(),
            code: self.code.clone(),
            stake: self.game.stake(),
            players: self.game.players()?,
        })
    }

    /// Pays out `outcome` in one unit of work. Touches nothing in the room.
    fn settle_outcome(&self, outcome: Outcome) -> Result<MatchResult, RoomError> {
        if self.game.status() != MatchStatus::Playing {
            return Err(RoomError::WrongStatus(format!("match is {}", self.game.status())));
        }
        let stakes = self
            .stakes()
            .ok_or_else(|| RoomError::WrongStatus("seat two is empty".into()))?;

        let mut tx = self.services.store.begin()?;
        let settlement = settle(tx.as_mut(), &stakes, outcome, &self.services.config.payout)?;
        tx.commit()?;

        if settlement == Settlement::AlreadySettled {
            // The ledger already paid this match; record the result without
            // paying again.
            warn!(code = %self.code, match_id = %stakes.match_id, "ledger reports match already settled");
        }

        Ok(match outcome {
            Outcome::Winner { slot, reason } => MatchResult {
                winner: Some(slot),
                winner_id: Some(stakes.player(slot)),
                reason,
                payout: self.services.config.payout.payout(stakes.stake),
            },
            Outcome::Draw => MatchResult {
                winner: None,
                winner_id: None,
                reason: FinishReason::Draw,
                payout: Amount::ZERO,
            },
        })
    }

    fn finish(&mut self, result: MatchResult) {
        if !self.game.finish(result.clone()) {
            debug!(code = %self.code, "match already finished, ignoring");
            return;
        }
        self.status = RoomStatus::Finished;
        self.finished_at = Some(Utc::now());
        self.sweep.disarm();
        info!(
            code = %self.code,
            match_id = %self.game.id(),
            winner = ?result.winner_id,
            reason = %result.reason,
            payout = %result.payout,
            "game finished"
        );
    }

    // -- views -------------------------------------------------------------

    fn occupancy(&self) -> usize {
        self.game.seated() + self.spectators.len()
    }

    fn is_idle(&self) -> bool {
        self.status == RoomStatus::Cancelled
            || (self.status == RoomStatus::Finished && self.present.is_empty())
    }

    fn listable(&self) -> bool {
        self.status == RoomStatus::Waiting
            && self.game.status() == MatchStatus::Waiting
            && self.game.player(Slot::Second).is_none()
            && self.occupancy() < self.capacity
    }

    fn phase(&self) -> Phase {
        match (self.status, self.game.status()) {
            (RoomStatus::Cancelled, _) => Phase::Cancelled,
            (_, MatchStatus::Finished) => Phase::Finished,
            (_, MatchStatus::Playing) => Phase::Playing,
            (_, MatchStatus::Waiting) if self.game.seated() == 2 => Phase::ReadyPending,
            (_, MatchStatus::Waiting) => Phase::Waiting,
        }
    }

    fn player_view(&self, slot: Slot) -> Option<PlayerView> {
        let seat = self.game.seat(slot)?;
        let display = self.services.directory.display(seat.player);
        let stats = self
            .services
            .store
            .stats(seat.player)
            .unwrap_or_else(|e| {
                warn!(code = %self.code, player = %seat.player, error = %e, "stats unavailable, showing defaults");
                Default::default()
            });
        Some(PlayerView {
            player_id: seat.player,
            username: display.username,
            slot,
            ready: seat.ready,
            online: seat.online,
            stats,
        })
    }

    fn snapshot(&self) -> MatchSnapshot {
        MatchSnapshot {
            code: self.code.clone(),
            room_status: self.status,
            match_status: self.game.status(),
            phase: self.phase(),
            stake: self.game.stake(),
            capacity: self.capacity,
            occupancy: self.occupancy(),
            first: self.player_view(Slot::First),
            second: self.player_view(Slot::Second),
            current_turn: self.game.turn(),
            clock: self.game.clock_view(Instant::now()),
            moves: self.game.moves().to_vec(),
            board: self.game.board().cells(),
            result: self.game.result().cloned(),
            created_at: self.created_at,
            finished_at: self.finished_at,
        }
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            code: self.code.clone(),
            match_id: self.game.id(),
            status: self.status,
            stake: self.game.stake(),
            occupancy: self.occupancy(),
            capacity: self.capacity,
            present: self.present.len(),
            seated: [self.game.player(Slot::First), self.game.player(Slot::Second)],
            created_at: self.created_at,
            listable: self.listable(),
        }
    }

    fn ack(&self) -> Ack {
        Ack {
            snapshot: self.snapshot(),
            info: self.info(),
        }
    }

    // -- broadcasts --------------------------------------------------------

    fn publish_room(&self, event: Event) {
        self.services
            .publisher
            .publish(Topic::Room(self.code.clone()), event);
    }

    fn publish_lobby(&self, event: Event) {
        self.services.publisher.publish(Topic::Lobby, event);
    }

    fn publish_ready(&self, player: PlayerId) {
        let (first_ready, second_ready) = self.game.ready_flags();
        self.publish_room(Event::PlayerReady {
            code: self.code.clone(),
            player_id: player,
            first_ready,
            second_ready,
        });
    }

    fn publish_finished(&self, result: MatchResult) {
        self.publish_room(Event::GameFinished {
            code: self.code.clone(),
            result,
            snapshot: self.snapshot(),
        });
    }

    /// Tells the lobby how this room's discoverability changed.
    fn sync_lobby(&self, was_listable: bool, ack: &Ack) {
        match (was_listable, ack.info.listable) {
            (true, false) => self.publish_lobby(Event::RoomRemoved {
                code: self.code.clone(),
            }),
            (false, true) => self.publish_lobby(Event::RoomCreated {
                room: ack.info.entry(),
            }),
            (true, true) => self.publish_lobby(Event::RoomUpdated {
                snapshot: ack.snapshot.clone(),
            }),
            (false, false) => {}
        }
    }
}

/// Spawns a room actor with `room.creator` seated in slot 1 and announces
/// the room to the lobby.
pub(crate) fn spawn_room(room: NewRoom, services: RoomServices) -> RoomHandle {
    let config = Arc::clone(&services.config);
    let (tx, rx) = mpsc::channel(config.channel_size.max(1));

    let rules = Rules {
        win_length: config.win_length,
        time_budget: config.time_budget,
        max_moves: config.max_moves,
    };
    let actor = RoomActor {
        code: room.code.clone(),
        capacity: room.capacity,
        status: RoomStatus::Waiting,
        created_at: Utc::now(),
        finished_at: None,
        game: Match::new(room.match_id, room.creator, room.stake, rules),
        spectators: BTreeSet::new(),
        present: BTreeSet::from([room.creator]),
        services,
        sweep: SweepTimer::new(config.sweep_config()),
        receiver: rx,
    };

    let info = actor.info();
    if info.listable {
        actor.publish_lobby(Event::RoomCreated { room: info.entry() });
    }
    info!(code = %room.code, creator = %room.creator, stake = %room.stake, capacity = room.capacity, "room created");

    tokio::spawn(actor.run());

    RoomHandle {
        code: room.code,
        sender: tx,
    }
}
