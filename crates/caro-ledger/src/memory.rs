use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use caro_protocol::{Amount, MatchId, PlayerId, PlayerStats};
use tracing::{debug, warn};

use crate::{LedgerEntry, Store, StoreError, Transaction};

#[derive(Debug, Default)]
struct Books {
    balances: HashMap<PlayerId, Amount>,
    stats: HashMap<PlayerId, PlayerStats>,
    entries: Vec<LedgerEntry>,
    settled: HashSet<MatchId>,
}

/// In-process [`Store`].
///
/// A transaction holds the books lock from `begin` until it is committed or
/// dropped, so units of work are fully serialized. Writes are staged in the
/// transaction and applied in one step on commit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    books: Mutex<Books>,
    opening_balance: Option<Amount>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that opens a wallet holding `amount` the first time an
    /// unknown player is touched.
    pub fn with_opening_balance(amount: Amount) -> Self {
        Self {
            opening_balance: Some(amount),
            ..Self::default()
        }
    }

    /// Creates (or resets) `player`'s wallet.
    pub fn open_account(&self, player: PlayerId, balance: Amount) {
        if let Ok(mut books) = self.books.lock() {
            books.balances.insert(player, balance);
        }
    }

    /// While set, [`begin`](Store::begin) and reads fail with
    /// [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// `player`'s history in the order it was committed.
    pub fn entries_for(&self, player: PlayerId) -> Vec<LedgerEntry> {
        self.books
            .lock()
            .map(|books| {
                books
                    .entries
                    .iter()
                    .filter(|entry| entry.player == player)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.books
            .lock()
            .map(|books| books.entries.clone())
            .unwrap_or_default()
    }

    pub fn is_settled(&self, match_id: MatchId) -> bool {
        self.books
            .lock()
            .map(|books| books.settled.contains(&match_id))
            .unwrap_or(false)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Books>, StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("ledger offline".into()));
        }
        self.books
            .lock()
            .map_err(|_| StoreError::Unavailable("ledger lock poisoned".into()))
    }
}

impl Store for MemoryStore {
    fn begin(&self) -> Result<Box<dyn Transaction + '_>, StoreError> {
        let books = self.lock()?;
        Ok(Box::new(MemoryTransaction {
            books,
            opening_balance: self.opening_balance,
            balances: HashMap::new(),
            stats: HashMap::new(),
            entries: Vec::new(),
            settled: HashSet::new(),
        }))
    }

    fn balance(&self, player: PlayerId) -> Result<Amount, StoreError> {
        let books = self.lock()?;
        books
            .balances
            .get(&player)
            .copied()
            .or(self.opening_balance)
            .ok_or(StoreError::UnknownAccount(player))
    }

    fn stats(&self, player: PlayerId) -> Result<PlayerStats, StoreError> {
        let books = self.lock()?;
        Ok(books.stats.get(&player).copied().unwrap_or_default())
    }
}

struct MemoryTransaction<'a> {
    books: MutexGuard<'a, Books>,
    opening_balance: Option<Amount>,
    balances: HashMap<PlayerId, Amount>,
    stats: HashMap<PlayerId, PlayerStats>,
    entries: Vec<LedgerEntry>,
    settled: HashSet<MatchId>,
}

impl MemoryTransaction<'_> {
    fn current_balance(&self, player: PlayerId) -> Result<Amount, StoreError> {
        self.balances
            .get(&player)
            .or_else(|| self.books.balances.get(&player))
            .copied()
            .or(self.opening_balance)
            .ok_or(StoreError::UnknownAccount(player))
    }
}

impl Transaction for MemoryTransaction<'_> {
    fn balance(&mut self, player: PlayerId) -> Result<Amount, StoreError> {
        self.current_balance(player)
    }

    fn debit(&mut self, player: PlayerId, amount: Amount) -> Result<Amount, StoreError> {
        let balance = self.current_balance(player)?;
        if balance < amount {
            debug!(%player, %balance, required = %amount, "debit refused");
            return Err(StoreError::InsufficientFunds {
                player,
                balance,
                required: amount,
            });
        }
        let updated = balance
            .checked_sub(amount)
            .ok_or(StoreError::Overflow(player))?;
        self.balances.insert(player, updated);
        Ok(updated)
    }

    fn credit(&mut self, player: PlayerId, amount: Amount) -> Result<Amount, StoreError> {
        let balance = self.current_balance(player)?;
        let updated = balance
            .checked_add(amount)
            .ok_or(StoreError::Overflow(player))?;
        self.balances.insert(player, updated);
        Ok(updated)
    }

    fn record(&mut self, entry: LedgerEntry) -> Result<(), StoreError> {
        self.entries.push(entry);
        Ok(())
    }

    fn stats(&mut self, player: PlayerId) -> Result<PlayerStats, StoreError> {
        Ok(self
            .stats
            .get(&player)
            .or_else(|| self.books.stats.get(&player))
            .copied()
            .unwrap_or_default())
    }

    fn put_stats(&mut self, player: PlayerId, stats: PlayerStats) -> Result<(), StoreError> {
        self.stats.insert(player, stats);
        Ok(())
    }

    fn mark_settled(&mut self, match_id: MatchId) -> Result<bool, StoreError> {
        if self.books.settled.contains(&match_id) || self.settled.contains(&match_id) {
            warn!(%match_id, "match already settled");
            return Ok(false);
        }
        self.settled.insert(match_id);
        Ok(true)
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTransaction {
            mut books,
            balances,
            stats,
            entries,
            settled,
            ..
        } = *self;
        books.balances.extend(balances);
        books.stats.extend(stats);
        books.entries.extend(entries);
        books.settled.extend(settled);
        Ok(())
    }
}
