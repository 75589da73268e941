//! # Caro
//!
//! Real-time, wagered five-in-a-row match server.
//!
//! Two players stake the same amount, take turns placing marks on an
//! unbounded grid, and the first to line up five wins the pot minus the
//! house cut. Every room runs as its own actor task; wallets move only
//! through the ledger's units of work.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use caro::prelude::*;
//!
//! # async fn run() -> Result<(), CaroError> {
//! let server = CaroServerBuilder::new()
//!     .bind("0.0.0.0:8080")
//!     .store(Arc::new(MemoryStore::with_opening_balance(Amount(1_000))))
//!     .build(NumericTokenAuthenticator)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod directory;
mod error;
mod handler;
mod hub;
mod server;

pub use directory::MemoryDirectory;
pub use error::CaroError;
pub use hub::Hub;
pub use server::{CaroServer, CaroServerBuilder};

/// Everything needed to configure and run a server.
pub mod prelude {
    pub use crate::{CaroError, CaroServer, CaroServerBuilder, Hub, MemoryDirectory};
    pub use caro_ledger::{MemoryStore, PayoutPolicy, Store};
    pub use caro_presence::{Authenticator, NumericTokenAuthenticator, PresenceConfig, PresenceError};
    pub use caro_protocol::{
        Amount, Coord, Envelope, Event, MatchSnapshot, Payload, PlayerId, Reply, Request, RoomCode,
        Slot, SystemMessage, Topic, PROTOCOL_VERSION,
    };
    pub use caro_room::GameConfig;
}
