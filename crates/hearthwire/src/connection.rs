//! Per-connection loop: read a frame, decrypt, dispatch, flush.
//!
//! Each accepted connection gets its own Tokio task running
//! [`handle_connection`]. Packets from one client are handled strictly
//! one after another; the cipher depends on it.
//!
//! ```text
//! frame → Packet → (secured? decrypt) → handler → pending actions → flush
//! ```
//!
//! However the loop ends (clean close, idle timeout, kick, fatal
//! handler error) it goes through [`teardown`] exactly once.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use hearthwire_protocol::formats::LogoutAck;
use hearthwire_protocol::{Packet, ServerOpcode};
use hearthwire_session::Authenticator;
use hearthwire_transport::{Connection, TcpConnection, TransportError};

use crate::client::{Client, ServerRole};
use crate::dispatcher::{Dispatcher, Flow};
use crate::handlers::{apply_pending, save_actor};
use crate::server::ServerState;
use crate::storage::Storage;
use crate::{HandlerError, HearthwireError};

/// Why the receive loop woke up.
enum Event {
    Frame(Result<Option<Bytes>, TransportError>),
    Kicked,
    Idle,
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<A, S>(
    conn: TcpConnection,
    dispatcher: Arc<Dispatcher<A, S>>,
    state: Arc<ServerState<A, S>>,
) -> Result<(), HearthwireError>
where
    A: Authenticator,
    S: Storage,
{
    let conn_id = conn.id();
    let role = dispatcher.role();
    tracing::debug!(%conn_id, %role, peer = %conn.peer_addr(), "handling new connection");

    let mut client = Client::new(conn_id, role, state.config.pending_action_limit);
    let result = serve(&conn, &dispatcher, &state, &mut client).await;
    teardown(&conn, &state, &mut client).await;

    result
}

async fn serve<A, S>(
    conn: &TcpConnection,
    dispatcher: &Dispatcher<A, S>,
    state: &ServerState<A, S>,
    client: &mut Client,
) -> Result<(), HearthwireError>
where
    A: Authenticator,
    S: Storage,
{
    let conn_id = conn.id();

    loop {
        let event = next_event(conn, client, state).await;
        let body = match event {
            Event::Frame(Ok(Some(body))) => body,
            Event::Frame(Ok(None)) => {
                tracing::debug!(%conn_id, "connection closed cleanly");
                return Ok(());
            }
            Event::Frame(Err(e)) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                return Err(e.into());
            }
            Event::Kicked => {
                tracing::info!(%conn_id, username = ?client.username(), "replaced by a newer login");
                return Ok(());
            }
            Event::Idle => {
                tracing::info!(%conn_id, "connection timed out");
                return Ok(());
            }
        };

        let (opcode, mut payload) = Packet::decode_client(body)?;

        if opcode.is_secured() {
            let Some(cipher) = client.cipher.as_mut() else {
                return Err(HandlerError::ProtocolViolation(format!(
                    "{opcode} before encryption was negotiated"
                ))
                .into());
            };
            payload = cipher.open(&payload);
        }

        client.touch(Instant::now());
        tracing::trace!(%conn_id, %opcode, len = payload.len(), "dispatching");

        let outcome = dispatcher.dispatch(opcode, client, state, payload).await;
        apply_pending(client, state).await;
        flush(conn, client).await?;

        match outcome {
            Ok(Flow::Continue) => {}
            Ok(Flow::Disconnect) => return Ok(()),
            Err(e) => return Err(e.into()),
        }
    }
}

/// Waits for the next frame, a kick, or the idle deadline.
async fn next_event<A, S>(
    conn: &TcpConnection,
    client: &mut Client,
    state: &ServerState<A, S>,
) -> Event {
    let recv = tokio::time::timeout(state.config.idle_timeout(), conn.recv());

    match client.kick.as_mut() {
        Some(kick) => tokio::select! {
            frame = recv => frame.map_or(Event::Idle, Event::Frame),
            // A dropped sender means our directory entry is gone too.
            _ = kick => Event::Kicked,
        },
        None => recv.await.map_or(Event::Idle, Event::Frame),
    }
}

/// Writes every queued packet in order, sealing secured ones.
async fn flush(conn: &TcpConnection, client: &mut Client) -> Result<(), TransportError> {
    for packet in client.take_outbox() {
        let secured = ServerOpcode::try_from(packet.opcode).is_ok_and(|op| op.is_secured());
        let packet = if secured {
            let Some(cipher) = client.cipher.as_mut() else {
                tracing::warn!(conn_id = %client.id(), opcode = packet.opcode, "secured packet with no cipher; dropped");
                continue;
            };
            Packet::new(packet.opcode, cipher.seal(&packet.payload))
        } else {
            packet
        };
        let redirect = packet.opcode == ServerOpcode::Redirect.as_u8();
        conn.send(packet.encode()).await?;
        if redirect {
            client.redirect_delivered = true;
        }
    }
    Ok(())
}

/// Releases everything this connection held in shared state.
///
/// Only entries this connection owns are touched: a newer login of the
/// same account shares username and serial, and its directory slot,
/// party seat, warp marker and redirect must survive the old session
/// closing.
async fn teardown<A, S>(conn: &TcpConnection, state: &ServerState<A, S>, client: &mut Client)
where
    A: Authenticator,
    S: Storage,
{
    client.dialog = None;

    if let Some(identity) = client.identity.clone() {
        state.warps.release(identity.serial.0, client.id());

        // The directory slot says which connection is the live one.
        // Losing it to a newer login means the party seat is theirs.
        if client.role() == ServerRole::World
            && state.directory.release(&identity.username, client.id())
        {
            state.parties.leave(&identity.username);
        }

        // A redirect that reached the client belongs to its next
        // connection. One that never went out is dead weight.
        if let Some(token_id) = client.issued_redirect {
            if !client.redirect_delivered {
                state.redirects.remove_issued(&identity.username, token_id);
            }
        }
    }

    if client.in_world() {
        save_actor(client, state).await;
        if client.issued_redirect.is_none() && !client.logout_sent {
            client.send(LogoutAck);
        }
        // Best effort: the peer may already be gone.
        let _ = flush(conn, client).await;
        tracing::info!(conn_id = %client.id(), username = ?client.username(), "player disconnected");
    }

    let _ = conn.close().await;
}

