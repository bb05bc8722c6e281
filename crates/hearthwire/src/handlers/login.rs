//! Handshake, authentication, handoff, and leaving.

use std::net::SocketAddrV4;
use std::time::Instant;

use bytes::Bytes;
use hearthwire_protocol::formats::{
    EncryptionAck, EncryptionInit, EnterWorld, Heartbeat, KeepaliveAck,
    LeaveGame, Login, LoginResult, LogoutAck, Redirect, SystemMessage,
    TimerSync,
};
use hearthwire_protocol::{
    Cipher, CipherMode, CipherParameters, ClientFormat, RedirectKind,
};
use hearthwire_session::{Authenticator, RedirectToken};

use crate::client::{Client, Identity};
use crate::dispatcher::{Flow, HandlerOutcome};
use crate::handlers::{autosave_if_due, send_location};
use crate::server::ServerState;
use crate::storage::{ActorRecord, Storage};
use crate::HandlerError;

// ---------------------------------------------------------------------------
// Both roles
// ---------------------------------------------------------------------------

/// Negotiates the connection's cipher and acknowledges in the shape the
/// requested mode expects.
pub(crate) async fn encryption_init<A, S>(
    client: &mut Client,
    state: &ServerState<A, S>,
    payload: Bytes,
) -> HandlerOutcome
where
    A: Authenticator,
    S: Storage,
{
    let init = EncryptionInit::parse(payload)?;

    if client.cipher.is_some() {
        tracing::debug!(conn_id = %client.id(), "encryption already negotiated; ignored");
        return Ok(Flow::Continue);
    }

    let mode = CipherMode::from_init_byte(init.kind);
    let params = match init.custom_key {
        Some((seed, salt)) => CipherParameters::new(salt, seed, mode),
        None => state.config.default_cipher.clone().with_mode(mode),
    };

    client.cipher = Some(Cipher::new(params));
    client.send(EncryptionAck { mode });
    tracing::debug!(conn_id = %client.id(), ?mode, "encryption negotiated");
    Ok(Flow::Continue)
}

pub(crate) async fn heartbeat<A, S>(
    client: &mut Client,
    state: &ServerState<A, S>,
    payload: Bytes,
) -> HandlerOutcome
where
    A: Authenticator,
    S: Storage,
{
    Heartbeat::parse(payload)?;
    client.liveness.last_heartbeat = Some(Instant::now());
    client.send(KeepaliveAck);
    autosave_if_due(client, state);
    Ok(Flow::Continue)
}

pub(crate) async fn timer_sync<A, S>(
    client: &mut Client,
    state: &ServerState<A, S>,
    payload: Bytes,
) -> HandlerOutcome
where
    A: Authenticator,
    S: Storage,
{
    TimerSync::parse(payload)?;
    autosave_if_due(client, state);
    Ok(Flow::Continue)
}

// ---------------------------------------------------------------------------
// Login role
// ---------------------------------------------------------------------------

/// Checks the credentials and, on success, hands the client off to the
/// world role with a fresh redirect.
pub(crate) async fn login<A, S>(
    client: &mut Client,
    state: &ServerState<A, S>,
    payload: Bytes,
) -> HandlerOutcome
where
    A: Authenticator,
    S: Storage,
{
    let request = Login::parse(payload)?;

    if client.is_authenticated() {
        return Err(HandlerError::ProtocolViolation(
            "second login on one connection".into(),
        ));
    }

    let serial = match state
        .auth
        .authenticate(&request.username, &request.password)
        .await
    {
        Ok(serial) => serial,
        Err(e) => {
            tracing::info!(conn_id = %client.id(), username = %request.username, error = %e, "login rejected");
            client.send(LoginResult::rejected(
                LoginResult::BAD_CREDENTIALS,
                "Incorrect username or password.",
            ));
            return Ok(Flow::Continue);
        }
    };

    let params = session_cipher(client, state);
    let target = state.endpoints.world;
    let token = RedirectToken::issue(
        serial,
        &request.username,
        &params,
        target,
        RedirectKind::LoginHandoff,
    );
    hand_off(client, state, token);

    client.identity = Some(Identity {
        serial,
        username: request.username,
    });
    client.send(LoginResult::ok());
    tracing::info!(conn_id = %client.id(), %serial, %target, "login accepted; handing off");
    Ok(Flow::Continue)
}

/// A client coming back from the world role. The transfer token gives
/// it its cipher back; it then logs in again as usual.
pub(crate) async fn resume_login<A, S>(
    client: &mut Client,
    state: &ServerState<A, S>,
    payload: Bytes,
) -> HandlerOutcome
where
    A: Authenticator,
    S: Storage,
{
    let request = EnterWorld::parse(payload)?;

    if client.is_authenticated() {
        return Err(HandlerError::ProtocolViolation(
            "resume after login".into(),
        ));
    }

    let token = redeem(client, state, &request)?;
    if token.kind != RedirectKind::Transfer {
        return Err(HandlerError::ProtocolViolation(format!(
            "{} token presented at the login role",
            token.kind
        )));
    }

    client.cipher = Some(Cipher::new(cipher_from(client, &token, state)));
    tracing::info!(conn_id = %client.id(), username = %token.username(), "returned to login");
    Ok(Flow::Continue)
}

// ---------------------------------------------------------------------------
// World role
// ---------------------------------------------------------------------------

/// Admits a session carrying a valid redirect and loads its character.
///
/// No matching token means the client is spoofing or replaying: the
/// connection is dropped.
pub(crate) async fn enter_world<A, S>(
    client: &mut Client,
    state: &ServerState<A, S>,
    payload: Bytes,
) -> HandlerOutcome
where
    A: Authenticator,
    S: Storage,
{
    let request = EnterWorld::parse(payload)?;

    if client.is_authenticated() {
        return Err(HandlerError::ProtocolViolation(
            "enter world twice".into(),
        ));
    }

    let token = redeem(client, state, &request)?;
    let username = token.username().to_string();
    client.cipher = Some(Cipher::new(cipher_from(client, &token, state)));

    let mut record = match state.storage.load(&username).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            let spawn = state.catalog.spawn();
            tracing::info!(conn_id = %client.id(), %username, "new character");
            ActorRecord::new(&username, spawn.map_id, spawn.x, spawn.y)
        }
        Err(e) => {
            tracing::error!(conn_id = %client.id(), %username, error = %e, "could not load character");
            client.send(LoginResult::rejected(
                LoginResult::CORRUPT_RECORD,
                &state.config.corrupt_record_message,
            ));
            return Ok(Flow::Disconnect);
        }
    };

    if let Err(reason) = record.check_sanity() {
        client.send(LoginResult::rejected(
            LoginResult::CORRUPT_RECORD,
            &state.config.corrupt_record_message,
        ));
        return Err(HandlerError::StateCorruption { username, reason });
    }

    let on_map = state
        .catalog
        .map(record.map_id)
        .is_some_and(|m| m.contains(record.x, record.y));
    if !on_map {
        let spawn = state.catalog.spawn();
        tracing::warn!(conn_id = %client.id(), %username, map_id = record.map_id, "saved position invalid; respawning");
        record.map_id = spawn.map_id;
        record.x = spawn.x;
        record.y = spawn.y;
    }

    client.kick = Some(state.directory.claim(&username, client.id()));
    client.identity = Some(Identity {
        serial: token.serial(),
        username: username.clone(),
    });
    client.provenance = Some(token);
    client.actor = Some(record);
    client.map_ready = false;
    client.liveness.last_save = Instant::now();

    send_location(client);
    client.send(SystemMessage::bar(&state.config.welcome_message));
    tracing::info!(conn_id = %client.id(), %username, "entered world");
    Ok(Flow::Continue)
}

/// `kind` 0 goes back to the login role with a transfer token; anything
/// else logs out.
pub(crate) async fn leave_game<A, S>(
    client: &mut Client,
    state: &ServerState<A, S>,
    payload: Bytes,
) -> HandlerOutcome
where
    A: Authenticator,
    S: Storage,
{
    let request = LeaveGame::parse(payload)?;

    let Some(identity) = client.identity.clone() else {
        return Ok(Flow::Continue);
    };

    if request.kind == 0 {
        let params = session_cipher(client, state);
        let token = RedirectToken::issue(
            identity.serial,
            &identity.username,
            &params,
            state.endpoints.login,
            RedirectKind::Transfer,
        );
        hand_off(client, state, token);
        tracing::info!(conn_id = %client.id(), username = %identity.username, "returning to login");
    } else {
        client.send(LogoutAck);
        client.logout_sent = true;
        tracing::info!(conn_id = %client.id(), username = %identity.username, "logged out");
    }
    Ok(Flow::Disconnect)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Cipher parameters to carry across a handoff: the negotiated ones, or
/// the defaults if the client never negotiated.
fn session_cipher<A, S>(client: &Client, state: &ServerState<A, S>) -> CipherParameters {
    client
        .cipher
        .as_ref()
        .map(|c| c.parameters().clone())
        .unwrap_or_else(|| state.config.default_cipher.clone())
}

/// Rebuilds the cipher a redirected client keeps using. The mode is
/// whatever this connection negotiated, or the default.
fn cipher_from<A, S>(
    client: &Client,
    token: &RedirectToken,
    state: &ServerState<A, S>,
) -> CipherParameters {
    let mode = client
        .cipher
        .as_ref()
        .map_or(state.config.default_cipher.mode, |c| c.parameters().mode);
    CipherParameters::new(token.credentials.salt.clone(), token.credentials.seed, mode)
}

/// Registers `token` and tells the client where to go.
fn hand_off<A, S>(client: &mut Client, state: &ServerState<A, S>, token: RedirectToken) {
    let target: SocketAddrV4 = token.target;
    let redirect = Redirect {
        address: *target.ip(),
        port: target.port(),
        credentials: token.credentials.clone(),
        kind: token.kind,
    };
    client.issued_redirect = Some(token.id);
    state.redirects.insert(token);
    client.send(redirect);
}

/// Consumes the token matching `request`, logging why if there is none.
fn redeem<A, S>(
    client: &Client,
    state: &ServerState<A, S>,
    request: &EnterWorld,
) -> Result<RedirectToken, HandlerError> {
    state
        .redirects
        .consume_if_present(&request.credentials)
        .map_err(|e| {
            tracing::warn!(
                conn_id = %client.id(),
                username = %request.credentials.username,
                error = %e,
                "redirect rejected; dropping connection"
            );
            HandlerError::Session(e)
        })
}
