//! Time keeping for timed caro matches.
//!
//! Two pieces live here:
//!
//! - [`TurnClock`]: each player's remaining time budget. Time is charged
//!   lazily, when the player to move submits a move. A move that arrives
//!   after the mover's budget ran out is not applied; it is a timeout.
//! - [`SweepTimer`]: an optional periodic wake-up for the room actor, so a
//!   match whose mover silently walked away still ends without waiting for
//!   a move that will never come.
//!
//! Both use [`tokio::time::Instant`], so tests drive them with
//! `tokio::time::pause()` and `advance()`.
//!
//! # Integration
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands */ }
//!         _ = sweep.wait_for_sweep() => {
//!             if game.clock_expired(Instant::now()) { /* end by timeout */ }
//!         }
//!     }
//! }
//! ```

mod sweep;
mod turn;

pub use sweep::{SweepConfig, SweepInfo, SweepTimer};
pub use turn::{Charge, TurnClock};
