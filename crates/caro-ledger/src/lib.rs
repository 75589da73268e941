//! Money for caro matches.
//!
//! The match engine never writes balances directly. It opens a unit of
//! work with [`Store::begin`], performs its debits, credits and ledger
//! entries through the returned [`Transaction`], and commits. Dropping a
//! transaction without committing discards everything it staged.
//!
//! [`settlement`] holds the two money movements a match makes: collecting
//! both stakes when it starts, and paying out (or refunding) exactly once
//! when it ends. [`MemoryStore`] is the in-process implementation used by
//! the server binary and the tests.

mod entry;
mod error;
mod memory;
pub mod settlement;
mod store;

pub use entry::{LedgerCategory, LedgerEntry};
pub use error::StoreError;
pub use memory::MemoryStore;
pub use settlement::{collect_stakes, settle, Outcome, PayoutPolicy, Settlement, Stakes};
pub use store::{Store, Transaction};
