use caro_protocol::{Amount, MatchId, PlayerId, PlayerStats};

use crate::{LedgerEntry, StoreError};

/// The wallet and statistics backend.
///
/// Reads outside a transaction are for display only (snapshots, lobby).
/// Every write goes through [`begin`](Self::begin).
pub trait Store: Send + Sync + 'static {
    /// Opens a unit of work.
    ///
    /// The transaction is committed when [`Transaction::commit`] is called
    /// and rolled back when dropped without committing. Callers must not
    /// hold it across an `.await`.
    fn begin(&self) -> Result<Box<dyn Transaction + '_>, StoreError>;

    fn balance(&self, player: PlayerId) -> Result<Amount, StoreError>;

    /// Statistics for `player`; a player who never finished a match has
    /// [`PlayerStats::default`].
    fn stats(&self, player: PlayerId) -> Result<PlayerStats, StoreError>;
}

/// One unit of work against a [`Store`].
///
/// Nothing staged here is visible to other readers until
/// [`commit`](Self::commit) returns `Ok`.
pub trait Transaction {
    fn balance(&mut self, player: PlayerId) -> Result<Amount, StoreError>;

    /// Removes `amount` from the wallet and returns the new balance.
    ///
    /// # Errors
    /// [`StoreError::InsufficientFunds`] if the balance is below `amount`.
    /// Nothing is staged in that case.
    fn debit(&mut self, player: PlayerId, amount: Amount) -> Result<Amount, StoreError>;

    /// Adds `amount` to the wallet and returns the new balance.
    fn credit(&mut self, player: PlayerId, amount: Amount) -> Result<Amount, StoreError>;

    /// Appends a history entry. Does not touch balances.
    fn record(&mut self, entry: LedgerEntry) -> Result<(), StoreError>;

    fn stats(&mut self, player: PlayerId) -> Result<PlayerStats, StoreError>;

    fn put_stats(&mut self, player: PlayerId, stats: PlayerStats) -> Result<(), StoreError>;

    /// Writes the settled marker for `match_id`.
    ///
    /// Returns `false` if the marker already exists, in which case the
    /// caller must not pay anything out.
    fn mark_settled(&mut self, match_id: MatchId) -> Result<bool, StoreError>;

    fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
