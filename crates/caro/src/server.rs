//! `CaroServer` builder and server loop.
//!
//! This is the entry point for running a caro server. It ties together all
//! the layers: transport → protocol → presence → rooms → ledger.

use std::net::SocketAddr;
use std::sync::Arc;

use caro_ledger::{MemoryStore, Store};
use caro_presence::{Authenticator, PresenceConfig, PresenceTracker};
use caro_protocol::{AnonymousDirectory, Codec, Directory, JsonCodec};
use caro_room::{GameConfig, RoomManager, RoomServices};
use caro_transport::{Transport, WebSocketTransport};

use crate::handler::handle_connection;
use crate::{CaroError, Hub};

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<A: Authenticator, C: Codec> {
    pub(crate) rooms: RoomManager,
    pub(crate) presence: PresenceTracker,
    pub(crate) hub: Arc<Hub>,
    pub(crate) directory: Arc<dyn Directory>,
    pub(crate) auth: A,
    pub(crate) codec: C,
    pub(crate) config: PresenceConfig,
}

/// Builder for configuring and starting a caro server.
///
/// # Example
///
/// ```rust,ignore
/// use caro::prelude::*;
///
/// let server = CaroServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .game_config(GameConfig::timed(Duration::from_secs(300)))
///     .store(Arc::new(MemoryStore::with_opening_balance(Amount(1_000))))
///     .build(NumericTokenAuthenticator)
///     .await?;
/// server.run().await
/// ```
pub struct CaroServerBuilder {
    bind_addr: String,
    game: GameConfig,
    presence: PresenceConfig,
    store: Option<Arc<dyn Store>>,
    directory: Option<Arc<dyn Directory>>,
}

impl CaroServerBuilder {
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            game: GameConfig::default(),
            presence: PresenceConfig::default(),
            store: None,
            directory: None,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    pub fn game_config(mut self, config: GameConfig) -> Self {
        self.game = config;
        self
    }

    pub fn presence_config(mut self, config: PresenceConfig) -> Self {
        self.presence = config;
        self
    }

    /// Wallets, ledger and statistics. Defaults to an empty
    /// [`MemoryStore`].
    pub fn store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    /// Display names and friendships. Defaults to [`AnonymousDirectory`].
    pub fn directory(mut self, directory: Arc<dyn Directory>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Binds the listener and assembles the server around `auth`.
    pub async fn build<A: Authenticator>(self, auth: A) -> Result<CaroServer<A, JsonCodec>, CaroError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let hub = Arc::new(Hub::new());
        let directory = self
            .directory
            .unwrap_or_else(|| Arc::new(AnonymousDirectory));
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));

        let services = RoomServices {
            store,
            publisher: hub.clone(),
            directory: Arc::clone(&directory),
            config: Arc::new(self.game),
        };

        let state = Arc::new(ServerState {
            rooms: RoomManager::new(services),
            presence: PresenceTracker::new(),
            hub,
            directory,
            auth,
            codec: JsonCodec,
            config: self.presence,
        });

        Ok(CaroServer { transport, state })
    }
}

impl Default for CaroServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A caro server bound to its address.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct CaroServer<A: Authenticator, C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<A, C>>,
}

impl<A, C> CaroServer<A, C>
where
    A: Authenticator,
    C: Codec,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, CaroError> {
        Ok(self.transport.local_addr()?)
    }

    /// Runs the accept loop until the process is terminated.
    ///
    /// Each accepted connection gets its own handler task.
    pub async fn run(mut self) -> Result<(), CaroError> {
        tracing::info!("caro server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
