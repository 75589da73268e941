//! Who is online, and on which connection.
//!
//! This crate handles the identity side of a connection:
//!
//! 1. **Authentication** turns a handshake token into a [`PlayerId`]
//!    ([`Authenticator`] trait).
//! 2. **Presence tracking** maps each identity to its one live connection
//!    ([`PresenceTracker`]). A second connection for the same identity
//!    evicts the first.
//! 3. **Fan-out** tells an identity's friends and its room when it comes
//!    online or goes offline ([`announce`]).
//!
//! # How it fits in the stack
//!
//! ```text
//! Server (above)     ← registers connections, announces presence
//!     ↕
//! Presence (here)    ← identity → connection, eviction, online/offline
//!     ↕
//! Protocol (below)   ← PlayerId, Event, Publisher, Directory
//! ```
//!
//! [`PlayerId`]: caro_protocol::PlayerId

mod auth;
mod config;
mod error;
mod fanout;
mod tracker;

pub use auth::{Authenticator, NumericTokenAuthenticator};
pub use config::PresenceConfig;
pub use error::PresenceError;
pub use fanout::announce;
pub use tracker::{ConnectionHandle, Control, PresenceTracker, Registration};
