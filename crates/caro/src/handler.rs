//! Per-connection handler: handshake, presence, request routing and event
//! delivery.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive Handshake → validate version
//!   2. Authenticate token → get PlayerId
//!   3. Register with presence (evicting any older connection) → HandshakeAck
//!   4. Loop over three inputs until one of them ends the connection:
//!      inbound frames, hub deliveries, and presence control messages
//!   5. Unregister; if the player went offline, tell their rooms and friends

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use caro_presence::{announce, Authenticator, ConnectionHandle, Control, PresenceError};
use caro_protocol::{
    Codec, Coord, Envelope, Payload, PlayerId, ProtocolError, RejectKind, Reply, Request,
    RoomCode, SystemMessage, Topic, PROTOCOL_VERSION,
};
use caro_room::RoomError;
use caro_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::sync::mpsc;

use crate::hub::{Delivery, DeliverySender};
use crate::server::ServerState;
use crate::CaroError;

/// Outbound side of one connection: the socket plus its frame counter.
struct Outbound<'a, C: Codec> {
    conn: &'a WebSocketConnection,
    codec: &'a C,
    seq: u64,
    start: Instant,
}

impl<C: Codec> Outbound<'_, C> {
    async fn send(&mut self, payload: Payload) -> Result<(), CaroError> {
        let envelope = Envelope::new(self.seq, elapsed_ms(&self.start), payload);
        self.seq += 1;
        let bytes = self.codec.encode(&envelope)?;
        self.conn.send(&bytes).await?;
        Ok(())
    }

    async fn send_error(&mut self, code: u16, message: impl Into<String>) -> Result<(), CaroError> {
        self.send(Payload::System(SystemMessage::Error {
            code,
            message: message.into(),
        }))
        .await
    }
}

/// Per-connection bookkeeping after the handshake.
struct Session {
    player: PlayerId,
    conn_id: ConnectionId,
    deliveries: DeliverySender,
    /// Rooms this connection joined or created and has not left.
    rooms: BTreeSet<RoomCode>,
}

impl Session {
    fn subscribe<A: Authenticator, C: Codec>(&self, state: &ServerState<A, C>, topic: Topic) -> bool {
        state.hub.subscribe(topic, self.conn_id, self.deliveries.clone())
    }
}

/// Why the message loop stopped.
enum Exit {
    Closed,
    Evicted,
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<A, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<A, C>>,
) -> Result<(), CaroError>
where
    A: Authenticator,
    C: Codec,
{
    let conn_id = conn.id();
    let mut out = Outbound {
        conn: &conn,
        codec: &state.codec,
        seq: 0,
        start: Instant::now(),
    };
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    // --- Step 1: Handshake ---
    let player = perform_handshake(&conn, &*state, &mut out).await?;

    // --- Step 2: Presence ---
    let (handle, mut control) = ConnectionHandle::new(conn_id);
    let (deliveries, mut inbox) = mpsc::unbounded_channel::<Delivery>();
    let mut session = Session {
        player,
        conn_id,
        deliveries,
        rooms: BTreeSet::new(),
    };
    session.subscribe(&*state, Topic::User(player));

    let registration = state.presence.register(player, handle).await;
    out.send(Payload::System(SystemMessage::HandshakeAck {
        player_id: player,
        server_time: elapsed_ms(&out.start),
    }))
    .await?;
    tracing::info!(%conn_id, %player, evicted = ?registration.evicted, "player connected");

    if registration.came_online {
        let room = state.rooms.player_room(player).await;
        announce(state.hub.as_ref(), state.directory.as_ref(), player, true, room.as_ref());
    }

    // --- Step 3: Message loop ---
    let result = message_loop(&conn, &*state, &mut out, &mut session, &mut control, &mut inbox).await;

    // --- Step 4: Cleanup ---
    state.hub.unsubscribe_all(conn_id);
    if state.presence.unregister(player, conn_id).await {
        let bound = state.rooms.player_room(player).await;
        let mut rooms = std::mem::take(&mut session.rooms);
        rooms.extend(bound.clone());
        for code in &rooms {
            if let Err(e) = state.rooms.disconnect(player, code).await {
                tracing::debug!(%player, %code, error = %e, "disconnect from room failed");
            }
        }
        announce(state.hub.as_ref(), state.directory.as_ref(), player, false, bound.as_ref());
    }

    match result {
        Ok(Exit::Evicted) => {
            tracing::info!(%conn_id, %player, "connection evicted");
            Ok(())
        }
        Ok(Exit::Closed) => Ok(()),
        Err(e) => Err(e),
    }
}

async fn message_loop<A, C>(
    conn: &WebSocketConnection,
    state: &ServerState<A, C>,
    out: &mut Outbound<'_, C>,
    session: &mut Session,
    control: &mut mpsc::UnboundedReceiver<Control>,
    inbox: &mut mpsc::UnboundedReceiver<Delivery>,
) -> Result<Exit, CaroError>
where
    A: Authenticator,
    C: Codec,
{
    let idle = (state.config.idle_timeout_secs > 0)
        .then(|| Duration::from_secs(state.config.idle_timeout_secs));
    let player = session.player;

    loop {
        tokio::select! {
            frame = recv_frame(conn, idle) => {
                let Some(data) = frame else {
                    return Ok(Exit::Closed);
                };
                if !handle_frame(state, out, session, &data).await? {
                    return Ok(Exit::Closed);
                }
            }
            Some((topic, event)) = inbox.recv() => {
                out.send(Payload::Event { topic, event }).await?;
            }
            Some(Control::Evict { reason }) = control.recv() => {
                tracing::info!(%player, conn_id = %session.conn_id, %reason, "evicting connection");
                let _ = out.send(Payload::System(SystemMessage::Evicted { reason })).await;
                let _ = conn.close().await;
                return Ok(Exit::Evicted);
            }
        }
    }
}

/// Next inbound frame, or `None` when the connection is done (closed,
/// broken or idle for too long).
async fn recv_frame(conn: &WebSocketConnection, idle: Option<Duration>) -> Option<Vec<u8>> {
    let received = match idle {
        Some(limit) => match tokio::time::timeout(limit, conn.recv()).await {
            Ok(received) => received,
            Err(_) => {
                tracing::info!(conn_id = %conn.id(), "connection idle, closing");
                return None;
            }
        },
        None => conn.recv().await,
    };
    match received {
        Ok(Some(data)) => Some(data),
        Ok(None) => {
            tracing::debug!(conn_id = %conn.id(), "connection closed cleanly");
            None
        }
        Err(e) => {
            tracing::debug!(conn_id = %conn.id(), error = %e, "recv error");
            None
        }
    }
}

/// Handles one inbound frame. Returns `false` if the connection should
/// close.
async fn handle_frame<A, C>(
    state: &ServerState<A, C>,
    out: &mut Outbound<'_, C>,
    session: &mut Session,
    data: &[u8],
) -> Result<bool, CaroError>
where
    A: Authenticator,
    C: Codec,
{
    let envelope: Envelope = match state.codec.decode(data) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::debug!(player = %session.player, error = %e, "failed to decode envelope");
            out.send_error(400, format!("undecodable frame: {e}")).await?;
            return Ok(true);
        }
    };

    match envelope.payload {
        Payload::System(SystemMessage::Heartbeat { client_time }) => {
            let server_time = elapsed_ms(&out.start);
            out.send(Payload::System(SystemMessage::HeartbeatAck {
                client_time,
                server_time,
            }))
            .await?;
        }
        Payload::System(SystemMessage::Disconnect { reason }) => {
            tracing::info!(player = %session.player, %reason, "client disconnected");
            return Ok(false);
        }
        Payload::Request { id, request } => {
            let payload = match handle_request(state, session, request).await {
                Ok(reply) => Payload::Reply { id, reply },
                Err(e) => {
                    if e.kind() == RejectKind::Internal {
                        tracing::warn!(player = %session.player, request_id = id, error = %e, "request failed");
                    } else {
                        tracing::debug!(player = %session.player, request_id = id, error = %e, "request rejected");
                    }
                    Payload::Rejected {
                        id,
                        rejection: e.to_rejection(),
                    }
                }
            };
            out.send(payload).await?;
        }
        other => {
            tracing::debug!(player = %session.player, payload = ?other, "ignoring unexpected payload");
            out.send_error(400, "unexpected payload from client").await?;
        }
    }
    Ok(true)
}

/// Runs one client request against the room manager.
async fn handle_request<A, C>(
    state: &ServerState<A, C>,
    session: &mut Session,
    request: Request,
) -> Result<Reply, RoomError>
where
    A: Authenticator,
    C: Codec,
{
    let player = session.player;
    let rooms = &state.rooms;

    match request {
        Request::ListRooms => {
            session.subscribe(state, Topic::Lobby);
            Ok(Reply::Rooms {
                rooms: rooms.list().await,
            })
        }
        Request::JoinLobby => {
            session.subscribe(state, Topic::Lobby);
            Ok(Reply::Done)
        }
        Request::LeaveLobby => {
            state.hub.unsubscribe(&Topic::Lobby, session.conn_id);
            Ok(Reply::Done)
        }
        Request::FetchRoom { code } => Ok(Reply::Snapshot {
            snapshot: rooms.fetch(&code).await?,
        }),
        Request::CreateRoom { stake, capacity } => {
            let snapshot = rooms.create(player, stake, capacity).await?;
            session.subscribe(state, Topic::Room(snapshot.code.clone()));
            session.rooms.insert(snapshot.code.clone());
            Ok(Reply::Snapshot { snapshot })
        }
        Request::JoinRoom { code } => {
            // Subscribe first so no event between the join and the reply
            // is missed.
            let topic = Topic::Room(code.clone());
            let fresh = session.subscribe(state, topic.clone());
            match rooms.join(player, &code).await {
                Ok(snapshot) => {
                    session.rooms.insert(code);
                    Ok(Reply::Snapshot { snapshot })
                }
                Err(e) => {
                    if fresh {
                        state.hub.unsubscribe(&topic, session.conn_id);
                    }
                    Err(e)
                }
            }
        }
        Request::LeaveRoom { code } => {
            let snapshot = rooms.leave(player, &code).await?;
            state.hub.unsubscribe(&Topic::Room(code.clone()), session.conn_id);
            session.rooms.remove(&code);
            Ok(Reply::Snapshot { snapshot })
        }
        Request::Ready { code } => Ok(Reply::Snapshot {
            snapshot: rooms.ready(player, &code).await?,
        }),
        Request::Move { code, x, y, slot } => Ok(Reply::Snapshot {
            snapshot: rooms.submit_move(player, &code, Coord::new(x, y), slot).await?,
        }),
    }
}

/// Receives the Handshake, validates it and authenticates its token.
async fn perform_handshake<A, C>(
    conn: &WebSocketConnection,
    state: &ServerState<A, C>,
    out: &mut Outbound<'_, C>,
) -> Result<PlayerId, CaroError>
where
    A: Authenticator,
    C: Codec,
{
    let limit = Duration::from_secs(state.config.handshake_timeout_secs);
    let data = match tokio::time::timeout(limit, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage("connection closed before handshake".into()).into());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => return Err(PresenceError::HandshakeTimeout.into()),
    };

    let envelope: Envelope = match state.codec.decode(&data) {
        Ok(envelope) => envelope,
        Err(e) => {
            out.send_error(400, "expected Handshake").await?;
            return Err(e.into());
        }
    };

    let (version, token) = match envelope.payload {
        Payload::System(SystemMessage::Handshake { version, token }) => (version, token),
        _ => {
            out.send_error(400, "expected Handshake").await?;
            return Err(ProtocolError::InvalidMessage("first message must be Handshake".into()).into());
        }
    };

    if version != PROTOCOL_VERSION {
        out.send_error(
            400,
            format!("version mismatch: expected {PROTOCOL_VERSION}, got {version}"),
        )
        .await?;
        return Err(ProtocolError::InvalidMessage("protocol version mismatch".into()).into());
    }

    let Some(token) = token else {
        out.send_error(401, "missing token").await?;
        return Err(PresenceError::MissingToken.into());
    };

    match state.auth.authenticate(&token).await {
        Ok(player) => Ok(player),
        Err(e) => {
            out.send_error(401, "unauthorized").await?;
            Err(e.into())
        }
    }
}

fn elapsed_ms(start: &Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
