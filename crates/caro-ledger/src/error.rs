use caro_protocol::{Amount, PlayerId};

/// Errors raised by a [`Store`](crate::Store) or one of its transactions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("insufficient funds for {player}: balance {balance}, required {required}")]
    InsufficientFunds {
        player: PlayerId,
        balance: Amount,
        required: Amount,
    },

    #[error("no wallet for {0}")]
    UnknownAccount(PlayerId),

    #[error("balance overflow for {0}")]
    Overflow(PlayerId),

    /// The backing store could not be reached. Nothing was written.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
