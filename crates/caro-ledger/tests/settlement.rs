//! Settlement against the in-memory store.

use caro_ledger::{
    collect_stakes, settle, LedgerCategory, MemoryStore, Outcome, PayoutPolicy, Settlement,
    Stakes, Store, StoreError, Transaction,
};
use caro_protocol::{Amount, FinishReason, MatchId, PlayerId, PlayerStats, RoomCode, Slot};

const ALICE: PlayerId = PlayerId(1);
const BOB: PlayerId = PlayerId(2);

fn stakes(stake: i64) -> Stakes {
    Stakes {
        match_id: MatchId(7),
        code: RoomCode::new("ROOM01"),
        stake: Amount(stake),
        players: [ALICE, BOB],
    }
}

fn funded_store(alice: i64, bob: i64) -> MemoryStore {
    let store = MemoryStore::new();
    store.open_account(ALICE, Amount(alice));
    store.open_account(BOB, Amount(bob));
    store
}

fn start(store: &MemoryStore, stakes: &Stakes) {
    let mut tx = store.begin().unwrap();
    collect_stakes(tx.as_mut(), stakes).unwrap();
    tx.commit().unwrap();
}

#[test]
fn test_collect_stakes_debits_both_with_entries() {
    let store = funded_store(100, 100);
    start(&store, &stakes(10));

    assert_eq!(store.balance(ALICE), Ok(Amount(90)));
    assert_eq!(store.balance(BOB), Ok(Amount(90)));
    let entries = store.entries_for(BOB);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].category, LedgerCategory::Stake);
    assert_eq!(entries[0].amount, Amount(-10));
}

#[test]
fn test_collect_stakes_insufficient_funds_debits_nobody() {
    let store = funded_store(100, 5);
    {
        let mut tx = store.begin().unwrap();
        let err = collect_stakes(tx.as_mut(), &stakes(10)).unwrap_err();
        assert!(matches!(err, StoreError::InsufficientFunds { player, .. } if player == BOB));
    }
    assert_eq!(store.balance(ALICE), Ok(Amount(100)));
    assert_eq!(store.balance(BOB), Ok(Amount(5)));
    assert!(store.entries().is_empty());
}

#[test]
fn test_settle_win_pays_winner_and_records_loss() {
    let store = funded_store(100, 100);
    let stakes = stakes(10);
    start(&store, &stakes);

    let mut tx = store.begin().unwrap();
    let settlement = settle(
        tx.as_mut(),
        &stakes,
        Outcome::Winner {
            slot: Slot::First,
            reason: FinishReason::Win,
        },
        &PayoutPolicy::default(),
    )
    .unwrap();
    tx.commit().unwrap();

    assert_eq!(settlement.payout(), Amount(16));
    assert_eq!(store.balance(ALICE), Ok(Amount(106)));
    assert_eq!(store.balance(BOB), Ok(Amount(90)));

    let alice = store.stats(ALICE).unwrap();
    assert_eq!(alice.games_played, 1);
    assert_eq!(alice.games_won, 1);
    assert_eq!(alice.total_earnings, Amount(16));
    assert_eq!(alice.level, 2);

    let bob = store.stats(BOB).unwrap();
    assert_eq!(bob.games_played, 1);
    assert_eq!(bob.games_won, 0);
    assert_eq!(bob.total_earnings, Amount(-10));
    assert_eq!(bob.level, 1);

    let bob_entries = store.entries_for(BOB);
    let loss = bob_entries.last().unwrap();
    assert_eq!(loss.category, LedgerCategory::GameLoss);
    assert_eq!(loss.amount, Amount(-10));
    assert!(store.is_settled(MatchId(7)));
}

#[test]
fn test_settle_twice_pays_once() {
    let store = funded_store(100, 100);
    let stakes = stakes(10);
    start(&store, &stakes);

    let outcome = Outcome::Winner {
        slot: Slot::Second,
        reason: FinishReason::Timeout,
    };
    for _ in 0..2 {
        let mut tx = store.begin().unwrap();
        settle(tx.as_mut(), &stakes, outcome, &PayoutPolicy::default()).unwrap();
        tx.commit().unwrap();
    }

    let mut tx = store.begin().unwrap();
    let third = settle(tx.as_mut(), &stakes, outcome, &PayoutPolicy::default()).unwrap();
    assert_eq!(third, Settlement::AlreadySettled);
    drop(tx);

    assert_eq!(store.balance(BOB), Ok(Amount(106)));
    assert_eq!(store.stats(BOB).unwrap().games_won, 1);
    let wins = store
        .entries()
        .iter()
        .filter(|e| e.category == LedgerCategory::GameWin)
        .count();
    assert_eq!(wins, 1);
}

#[test]
fn test_settle_draw_refunds_net_zero() {
    let store = funded_store(100, 100);
    let stakes = stakes(25);
    start(&store, &stakes);

    let mut tx = store.begin().unwrap();
    let settlement = settle(tx.as_mut(), &stakes, Outcome::Draw, &PayoutPolicy::default()).unwrap();
    tx.commit().unwrap();

    assert!(matches!(settlement, Settlement::Refunded { .. }));
    assert_eq!(store.balance(ALICE), Ok(Amount(100)));
    assert_eq!(store.balance(BOB), Ok(Amount(100)));
    for player in [ALICE, BOB] {
        let stats = store.stats(player).unwrap();
        assert_eq!(stats.games_played, 1);
        assert_eq!(stats.games_won, 0);
        assert_eq!(stats.total_earnings, Amount::ZERO);
    }
}

#[test]
fn test_settle_level_never_lowered() {
    let store = funded_store(100, 100);
    {
        let mut tx = store.begin().unwrap();
        tx.put_stats(
            ALICE,
            PlayerStats {
                games_played: 3,
                games_won: 0,
                total_earnings: Amount::ZERO,
                level: 5,
            },
        )
        .unwrap();
        tx.commit().unwrap();
    }
    let stakes = stakes(1);
    start(&store, &stakes);

    let mut tx = store.begin().unwrap();
    settle(
        tx.as_mut(),
        &stakes,
        Outcome::Winner {
            slot: Slot::First,
            reason: FinishReason::Forfeit,
        },
        &PayoutPolicy::default(),
    )
    .unwrap();
    tx.commit().unwrap();

    let alice = store.stats(ALICE).unwrap();
    assert_eq!(alice.games_won, 1);
    assert_eq!(alice.level, 5);
}
