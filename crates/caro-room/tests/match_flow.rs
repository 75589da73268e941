//! End-to-end match flows through the room manager.

use std::sync::Arc;
use std::time::Duration;

use caro_ledger::{LedgerCategory, MemoryStore, Store, StoreError};
use caro_protocol::{
    Amount, AnonymousDirectory, Coord, Event, FinishReason, MatchSnapshot, MatchStatus, Phase,
    PlayerId, PlayerStats, RecordingPublisher, RoomCode, RoomStatus, Slot, Topic,
};
use caro_room::{GameConfig, RoomError, RoomManager, RoomServices};

const ALICE: PlayerId = PlayerId(1);
const BOB: PlayerId = PlayerId(2);
const CAROL: PlayerId = PlayerId(3);
const DAVE: PlayerId = PlayerId(4);

struct Fixture {
    manager: RoomManager,
    store: Arc<MemoryStore>,
    publisher: Arc<RecordingPublisher>,
}

fn fixture(config: GameConfig) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    for player in [ALICE, BOB, CAROL, DAVE] {
        store.open_account(player, Amount(100));
    }
    let publisher = Arc::new(RecordingPublisher::new());
    let services = RoomServices {
        store: store.clone(),
        publisher: publisher.clone(),
        directory: Arc::new(AnonymousDirectory),
        config: Arc::new(config),
    };
    Fixture {
        manager: RoomManager::new(services),
        store,
        publisher,
    }
}

fn untimed() -> GameConfig {
    GameConfig {
        sweep_interval: None,
        ..GameConfig::default()
    }
}

impl Fixture {
    fn balance(&self, player: PlayerId) -> Amount {
        self.store.balance(player).unwrap()
    }

    fn room_events(&self, code: &RoomCode) -> Vec<Event> {
        self.publisher.events_for(&Topic::Room(code.clone()))
    }

    /// Alice creates a two-seat room staked at 10 and Bob takes seat two.
    async fn seated_room(&self) -> RoomCode {
        let snapshot = self.manager.create(ALICE, Amount(10), 2).await.unwrap();
        self.manager.join(BOB, &snapshot.code).await.unwrap();
        snapshot.code
    }

    async fn started_room(&self) -> RoomCode {
        let code = self.seated_room().await;
        self.manager.ready(ALICE, &code).await.unwrap();
        let snapshot = self.manager.ready(BOB, &code).await.unwrap();
        assert_eq!(snapshot.match_status, MatchStatus::Playing);
        code
    }

    async fn play(&self, code: &RoomCode, player: PlayerId, slot: Slot, x: i64, y: i64) -> MatchSnapshot {
        self.manager
            .submit_move(player, code, Coord::new(x, y), slot)
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn test_horizontal_five_wins_and_pays_out() {
    let f = fixture(untimed());
    let code = f.started_room().await;
    assert_eq!(f.balance(ALICE), Amount(90));
    assert_eq!(f.balance(BOB), Amount(90));

    for x in 0..4 {
        f.play(&code, ALICE, Slot::First, x, 0).await;
        f.play(&code, BOB, Slot::Second, x, 1).await;
    }
    let snapshot = f.play(&code, ALICE, Slot::First, 4, 0).await;

    let result = snapshot.result.clone().unwrap();
    assert_eq!(snapshot.match_status, MatchStatus::Finished);
    assert_eq!(snapshot.room_status, RoomStatus::Finished);
    assert_eq!(result.winner, Some(Slot::First));
    assert_eq!(result.winner_id, Some(ALICE));
    assert_eq!(result.reason, FinishReason::Win);
    assert_eq!(result.payout, Amount(16));

    assert_eq!(f.balance(ALICE), Amount(106));
    assert_eq!(f.balance(BOB), Amount(90));

    let seqs: Vec<u32> = snapshot.moves.iter().map(|m| m.seq).collect();
    assert_eq!(seqs, (1..=9).collect::<Vec<_>>());

    let stats = f.store.stats(ALICE).unwrap();
    assert_eq!(stats.games_won, 1);
    assert_eq!(stats.games_played, 1);
    assert_eq!(stats.level, 2);

    // The winning move is broadcast before the result.
    let events = f.room_events(&code);
    let tail = &events[events.len() - 2..];
    assert!(matches!(tail[0], Event::MoveMade { ref record, .. } if record.seq == 9));
    assert!(matches!(tail[1], Event::GameFinished { .. }));

    // Finished rooms stay fetchable but no longer bind their players.
    assert_eq!(f.manager.player_room(ALICE).await, None);
    assert!(f.manager.fetch(&code).await.is_ok());
}

#[tokio::test]
async fn test_disconnect_untimed_forfeits_to_opponent() {
    let f = fixture(untimed());
    let code = f.started_room().await;
    f.play(&code, ALICE, Slot::First, 0, 0).await;

    f.manager.disconnect(ALICE, &code).await.unwrap();

    let snapshot = f.manager.fetch(&code).await.unwrap();
    let result = snapshot.result.unwrap();
    assert_eq!(result.winner_id, Some(BOB));
    assert_eq!(result.reason, FinishReason::Forfeit);
    assert_eq!(result.payout, Amount(16));
    assert_eq!(f.balance(BOB), Amount(106));
    assert_eq!(f.balance(ALICE), Amount(90));

    let events = f.room_events(&code);
    let forfeited = events
        .iter()
        .position(|e| matches!(e, Event::PlayerForfeited { player_id, winner: Slot::Second, .. } if *player_id == ALICE))
        .unwrap();
    let finished = events
        .iter()
        .position(|e| matches!(e, Event::GameFinished { .. }))
        .unwrap();
    assert!(forfeited < finished);
}

#[tokio::test(start_paused = true)]
async fn test_move_after_budget_expired_is_timeout_loss() {
    let f = fixture(GameConfig {
        time_budget: Some(Duration::from_secs(60)),
        sweep_interval: None,
        ..GameConfig::default()
    });
    let code = f.started_room().await;

    tokio::time::advance(Duration::from_secs(61)).await;
    let snapshot = f.play(&code, ALICE, Slot::First, 0, 0).await;

    assert!(snapshot.moves.is_empty());
    assert!(snapshot.board.is_empty());
    let result = snapshot.result.unwrap();
    assert_eq!(result.winner, Some(Slot::Second));
    assert_eq!(result.reason, FinishReason::Timeout);
    assert_eq!(snapshot.clock.unwrap().first_ms, 0);
    assert_eq!(f.balance(BOB), Amount(106));
}

#[tokio::test]
async fn test_second_player_leaving_while_waiting_relists_room() {
    let f = fixture(untimed());
    let code = f.seated_room().await;
    assert!(f.manager.list().await.is_empty());

    let snapshot = f.manager.leave(BOB, &code).await.unwrap();
    assert_eq!(snapshot.second, None);
    assert_eq!(snapshot.phase, Phase::Waiting);
    assert_eq!(snapshot.room_status, RoomStatus::Waiting);

    let listed: Vec<RoomCode> = f.manager.list().await.into_iter().map(|e| e.code).collect();
    assert_eq!(listed, vec![code.clone()]);

    let lobby = f.publisher.events_for(&Topic::Lobby);
    assert!(matches!(lobby.last(), Some(Event::RoomCreated { room }) if room.code == code));
}

#[tokio::test]
async fn test_move_on_occupied_cell_changes_nothing() {
    let f = fixture(untimed());
    let code = f.started_room().await;
    f.play(&code, ALICE, Slot::First, 0, 0).await;
    let events_before = f.room_events(&code).len();

    let err = f
        .manager
        .submit_move(BOB, &code, Coord::new(0, 0), Slot::Second)
        .await
        .unwrap_err();
    assert_eq!(err, RoomError::PositionOccupied(Coord::new(0, 0)));

    let snapshot = f.manager.fetch(&code).await.unwrap();
    assert_eq!(snapshot.moves.len(), 1);
    assert_eq!(snapshot.current_turn, Slot::Second);
    assert_eq!(f.room_events(&code).len(), events_before);
}

#[tokio::test]
async fn test_move_out_of_turn_or_wrong_slot_rejected() {
    let f = fixture(untimed());
    let code = f.started_room().await;

    let err = f
        .manager
        .submit_move(BOB, &code, Coord::new(0, 0), Slot::Second)
        .await
        .unwrap_err();
    assert_eq!(err, RoomError::NotYourTurn { turn: Slot::First });

    let err = f
        .manager
        .submit_move(ALICE, &code, Coord::new(0, 0), Slot::Second)
        .await
        .unwrap_err();
    assert!(matches!(err, RoomError::SlotMismatch { .. }));

    let err = f
        .manager
        .submit_move(CAROL, &code, Coord::new(0, 0), Slot::First)
        .await
        .unwrap_err();
    assert_eq!(err, RoomError::NotSeated(CAROL));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_win_and_leave_settle_once() {
    let f = fixture(untimed());
    let code = f.started_room().await;
    for x in 0..4 {
        f.play(&code, ALICE, Slot::First, x, 0).await;
        f.play(&code, BOB, Slot::Second, x, 1).await;
    }

    let (winning, leaving) = tokio::join!(
        f.manager.submit_move(ALICE, &code, Coord::new(4, 0), Slot::First),
        f.manager.leave(BOB, &code),
    );
    // Whichever ran second found the match finished (or the move no longer
    // applicable); either way exactly one settlement happened.
    let _ = (winning, leaving);

    let wins = f
        .store
        .entries()
        .into_iter()
        .filter(|e| e.category == LedgerCategory::GameWin)
        .count();
    assert_eq!(wins, 1);
    assert_eq!(f.balance(ALICE), Amount(106));
    assert_eq!(f.balance(BOB), Amount(90));

    let finished = f
        .room_events(&code)
        .into_iter()
        .filter(|e| matches!(e, Event::GameFinished { .. }))
        .count();
    assert_eq!(finished, 1);
}

#[tokio::test]
async fn test_ready_with_insufficient_funds_clears_flags_and_debits_nobody() {
    let f = fixture(untimed());
    f.store.open_account(BOB, Amount(5));
    let code = f.seated_room().await;

    f.manager.ready(ALICE, &code).await.unwrap();
    let err = f.manager.ready(BOB, &code).await.unwrap_err();
    assert!(matches!(err, RoomError::InsufficientFunds { player, .. } if player == BOB));

    let snapshot = f.manager.fetch(&code).await.unwrap();
    assert_eq!(snapshot.match_status, MatchStatus::Waiting);
    assert!(!snapshot.first.unwrap().ready);
    assert!(!snapshot.second.unwrap().ready);
    assert_eq!(f.balance(ALICE), Amount(100));
    assert_eq!(f.balance(BOB), Amount(5));
    assert!(f.store.entries().is_empty());

    assert!(f
        .room_events(&code)
        .iter()
        .any(|e| matches!(e, Event::StartAborted { player_id, .. } if *player_id == BOB)));
}

#[tokio::test]
async fn test_ready_with_store_down_keeps_match_waiting() {
    let f = fixture(untimed());
    let code = f.seated_room().await;
    f.manager.ready(ALICE, &code).await.unwrap();

    f.store.set_unavailable(true);
    let err = f.manager.ready(BOB, &code).await.unwrap_err();
    assert!(matches!(err, RoomError::Store(StoreError::Unavailable(_))));
    f.store.set_unavailable(false);

    let snapshot = f.manager.fetch(&code).await.unwrap();
    assert_eq!(snapshot.match_status, MatchStatus::Waiting);
    assert!(snapshot.first.unwrap().ready);
    assert!(!snapshot.second.unwrap().ready);
    assert_eq!(f.balance(ALICE), Amount(100));
    assert_eq!(f.balance(BOB), Amount(100));

    // Readying again once the store is back starts the match.
    let snapshot = f.manager.ready(BOB, &code).await.unwrap();
    assert_eq!(snapshot.match_status, MatchStatus::Playing);
}

#[tokio::test]
async fn test_creator_leaving_before_start_cancels_room() {
    let f = fixture(untimed());
    let code = f.seated_room().await;

    let snapshot = f.manager.leave(ALICE, &code).await.unwrap();
    assert_eq!(snapshot.room_status, RoomStatus::Cancelled);
    assert_eq!(snapshot.phase, Phase::Cancelled);

    assert!(f.manager.list().await.is_empty());
    assert_eq!(f.manager.room_count().await, 0);
    assert_eq!(f.manager.player_room(BOB).await, None);
    assert!(matches!(
        f.manager.fetch(&code).await,
        Err(RoomError::NotFound(_))
    ));

    let lobby = f.publisher.events_for(&Topic::Lobby);
    assert!(matches!(lobby.last(), Some(Event::RoomRemoved { code: removed }) if *removed == code));
    // Seat two filling the room already delisted it; cancelling adds nothing.
    let removals = lobby
        .iter()
        .filter(|e| matches!(e, Event::RoomRemoved { .. }))
        .count();
    assert_eq!(removals, 1);
}

#[tokio::test]
async fn test_list_returns_oldest_first() {
    let f = fixture(untimed());
    let mut created = Vec::new();
    for player in [ALICE, BOB, CAROL] {
        created.push(f.manager.create(player, Amount(5), 2).await.unwrap().code);
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    let listed: Vec<RoomCode> = f.manager.list().await.into_iter().map(|e| e.code).collect();
    assert_eq!(listed, created);
}

#[tokio::test(start_paused = true)]
async fn test_sweep_ends_silently_expired_match() {
    let f = fixture(GameConfig::timed(Duration::from_secs(10)));
    let code = f.started_room().await;

    // Nobody moves. The sweep notices slot 1 ran out.
    tokio::time::sleep(Duration::from_secs(12)).await;

    let snapshot = f.manager.fetch(&code).await.unwrap();
    let result = snapshot.result.unwrap();
    assert_eq!(result.reason, FinishReason::Timeout);
    assert_eq!(result.winner_id, Some(BOB));
    assert_eq!(f.balance(BOB), Amount(106));
    assert!(f
        .room_events(&code)
        .iter()
        .any(|e| matches!(e, Event::GameFinished { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_timed_disconnect_then_rejoin_resumes_match() {
    let f = fixture(GameConfig {
        time_budget: Some(Duration::from_secs(60)),
        sweep_interval: None,
        ..GameConfig::default()
    });
    let code = f.started_room().await;
    f.play(&code, ALICE, Slot::First, 0, 0).await;

    f.manager.disconnect(BOB, &code).await.unwrap();
    let snapshot = f.manager.fetch(&code).await.unwrap();
    assert_eq!(snapshot.match_status, MatchStatus::Playing);
    assert!(!snapshot.second.unwrap().online);

    let snapshot = f.manager.join(BOB, &code).await.unwrap();
    assert!(snapshot.second.unwrap().online);

    let snapshot = f.play(&code, BOB, Slot::Second, 0, 1).await;
    assert_eq!(snapshot.moves.len(), 2);
    assert_eq!(snapshot.match_status, MatchStatus::Playing);
}

#[tokio::test]
async fn test_join_beyond_seats_spectates_until_full() {
    let f = fixture(untimed());
    let code = f.manager.create(ALICE, Amount(10), 3).await.unwrap().code;
    f.manager.join(BOB, &code).await.unwrap();

    let snapshot = f.manager.join(CAROL, &code).await.unwrap();
    assert_eq!(snapshot.occupancy, 3);
    assert_eq!(snapshot.slot_of(CAROL), None);
    assert_eq!(f.manager.player_room(CAROL).await, None);

    assert_eq!(f.manager.ready(CAROL, &code).await.unwrap_err(), RoomError::NotSeated(CAROL));
    assert_eq!(
        f.manager.join(DAVE, &code).await.unwrap_err(),
        RoomError::RoomFull(code.clone())
    );
}

#[tokio::test]
async fn test_create_while_seated_elsewhere_rejected() {
    let f = fixture(untimed());
    let code = f.manager.create(ALICE, Amount(10), 2).await.unwrap().code;

    let err = f.manager.create(ALICE, Amount(10), 2).await.unwrap_err();
    assert_eq!(
        err,
        RoomError::InOtherRoom {
            player: ALICE,
            code: code.clone()
        }
    );

    f.manager.leave(ALICE, &code).await.unwrap();
    assert!(f.manager.create(ALICE, Amount(10), 2).await.is_ok());
}

#[tokio::test]
async fn test_create_rejects_bad_stake_and_capacity() {
    let f = fixture(untimed());
    assert_eq!(
        f.manager.create(ALICE, Amount(0), 2).await.unwrap_err(),
        RoomError::InvalidStake(Amount(0))
    );
    assert_eq!(
        f.manager.create(ALICE, Amount(10), 1).await.unwrap_err(),
        RoomError::InvalidCapacity(1)
    );
    assert_eq!(f.manager.room_count().await, 0);
}

#[tokio::test]
async fn test_draw_at_move_limit_refunds_both() {
    let f = fixture(GameConfig {
        max_moves: Some(2),
        ..untimed()
    });
    let code = f.started_room().await;
    f.play(&code, ALICE, Slot::First, 0, 0).await;
    let snapshot = f.play(&code, BOB, Slot::Second, 5, 5).await;

    let result = snapshot.result.unwrap();
    assert_eq!(result.reason, FinishReason::Draw);
    assert_eq!(result.winner, None);
    assert_eq!(f.balance(ALICE), Amount(100));
    assert_eq!(f.balance(BOB), Amount(100));
}

#[tokio::test]
async fn test_finished_room_closes_after_last_occupant_leaves() {
    let f = fixture(untimed());
    let code = f.started_room().await;
    f.manager.disconnect(ALICE, &code).await.unwrap();
    assert_eq!(f.manager.room_count().await, 1);

    f.manager.leave(BOB, &code).await.unwrap();
    assert_eq!(f.manager.room_count().await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_moves_at_coordinate_edges_keep_room_responsive() {
    let f = fixture(untimed());
    let code = f.started_room().await;

    let edges = [
        (Slot::First, ALICE, i64::MAX, 0),
        (Slot::Second, BOB, i64::MIN, i64::MIN),
        (Slot::First, ALICE, i64::MAX - 1, 0),
        (Slot::Second, BOB, i64::MIN + 1, i64::MIN + 1),
        (Slot::First, ALICE, i64::MAX, i64::MAX),
    ];
    for (slot, player, x, y) in edges {
        let snapshot = tokio::time::timeout(
            Duration::from_secs(5),
            f.manager.submit_move(player, &code, Coord::new(x, y), slot),
        )
        .await
        .expect("room stopped answering")
        .unwrap();
        assert_eq!(snapshot.match_status, MatchStatus::Playing);
    }

    let snapshot = f.manager.fetch(&code).await.unwrap();
    assert_eq!(snapshot.moves.len(), 5);
    assert_eq!(snapshot.current_turn, Slot::Second);
}

#[tokio::test]
async fn test_snapshot_with_stats_unreadable_shows_defaults() {
    let f = fixture(untimed());
    let code = f.started_room().await;
    f.manager.disconnect(ALICE, &code).await.unwrap();

    let snapshot = f.manager.fetch(&code).await.unwrap();
    assert_eq!(snapshot.second.unwrap().stats.games_won, 1);

    f.store.set_unavailable(true);
    let snapshot = f.manager.fetch(&code).await.unwrap();
    assert_eq!(snapshot.second.unwrap().stats, PlayerStats::default());
    f.store.set_unavailable(false);
}

#[tokio::test]
async fn test_creator_leaving_listed_room_delists_once() {
    let f = fixture(untimed());
    let code = f.manager.create(ALICE, Amount(10), 2).await.unwrap().code;
    f.manager.leave(ALICE, &code).await.unwrap();

    let removals = f
        .publisher
        .events_for(&Topic::Lobby)
        .into_iter()
        .filter(|e| matches!(e, Event::RoomRemoved { code: removed } if *removed == code))
        .count();
    assert_eq!(removals, 1);
    assert_eq!(f.manager.room_count().await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_listing_keeps_seat_binding() {
    let f = Arc::new(fixture(untimed()));

    for _ in 0..50 {
        let code = f.manager.create(ALICE, Amount(10), 2).await.unwrap().code;

        let lister = {
            let f = Arc::clone(&f);
            tokio::spawn(async move {
                for _ in 0..20 {
                    f.manager.list().await;
                    tokio::task::yield_now().await;
                }
            })
        };
        f.manager.join(BOB, &code).await.unwrap();
        lister.await.unwrap();

        assert_eq!(f.manager.player_room(BOB).await, Some(code.clone()));
        let err = f.manager.create(BOB, Amount(10), 2).await.unwrap_err();
        assert!(matches!(err, RoomError::InOtherRoom { player: BOB, .. }));

        // Seat two leaves, then the creator, which cancels the room.
        f.manager.leave(BOB, &code).await.unwrap();
        assert_eq!(f.manager.player_room(BOB).await, None);
        f.manager.leave(ALICE, &code).await.unwrap();
    }
    assert_eq!(f.manager.room_count().await, 0);
}
