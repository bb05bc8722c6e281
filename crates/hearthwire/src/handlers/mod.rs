//! Packet handlers, grouped by what they touch.
//!
//! Every handler has the same shape:
//!
//! ```text
//! async fn name<A, S>(client: &mut Client, state: &ServerState<A, S>, payload: Bytes) -> HandlerOutcome
//! ```
//!
//! It parses its payload first, then checks its preconditions. A failed
//! precondition returns `Ok(Flow::Continue)` without sending anything.
//!
//! This module also holds the few operations several handlers share:
//! saving, changing maps, showing dialogs, and applying deferred
//! actions.

pub(crate) mod action;
pub(crate) mod board;
pub(crate) mod interaction;
pub(crate) mod login;
pub(crate) mod movement;
pub(crate) mod social;

use std::sync::Arc;
use std::time::Instant;

use hearthwire_dialog::{DialogSession, Transition};
use hearthwire_protocol::formats::{DialogView, Location, MapLoaded};
use hearthwire_session::Authenticator;

use crate::client::{Client, PendingAction};
use crate::server::ServerState;
use crate::storage::Storage;

pub use interaction::standard_checkpoints;

/// Persists the loaded character, if any. Failures are logged; the
/// session carries on with its in-memory copy.
pub(crate) async fn save_actor<A, S>(client: &mut Client, state: &ServerState<A, S>)
where
    A: Authenticator,
    S: Storage,
{
    let Some(record) = client.actor.as_ref() else {
        return;
    };
    match state.storage.save(record).await {
        Ok(()) => {
            client.liveness.last_save = Instant::now();
            tracing::debug!(conn_id = %client.id(), username = %record.username, "actor saved");
        }
        Err(e) => {
            tracing::warn!(conn_id = %client.id(), username = %record.username, error = %e, "actor save failed");
        }
    }
}

/// Queues a save if the autosave interval has passed.
pub(crate) fn autosave_if_due<A, S>(client: &mut Client, state: &ServerState<A, S>) {
    if client.in_world()
        && client.liveness.last_save.elapsed() >= state.config.autosave_interval()
    {
        client.defer(PendingAction::Save);
    }
}

/// Moves the player to `(x, y)` on `map_id`.
///
/// The client has to request the new map's data before it can act
/// again, so the map is marked not ready. Any open dialog is dropped.
/// Returns `false` if the map doesn't exist or the spot is off it.
pub(crate) fn change_map<A, S>(
    client: &mut Client,
    state: &ServerState<A, S>,
    map_id: u16,
    x: u16,
    y: u16,
) -> bool {
    let Some(map) = state.catalog.map(map_id) else {
        tracing::warn!(conn_id = %client.id(), map_id, "warp to unknown map");
        return false;
    };
    if !map.contains(x, y) {
        tracing::warn!(conn_id = %client.id(), map_id, x, y, "warp off the map");
        return false;
    }
    let Some(actor) = client.actor.as_mut() else {
        return false;
    };

    actor.map_id = map_id;
    actor.x = x;
    actor.y = y;
    client.map_ready = false;
    client.world_map = None;
    client.dialog = None;
    client.send(MapLoaded {
        map_id,
        width: map.width,
        height: map.height,
        name: map.name.clone(),
    });
    client.send(Location { x, y });
    tracing::debug!(conn_id = %client.id(), map_id, x, y, "changed map");
    true
}

pub(crate) fn send_location(client: &mut Client) {
    if let Some(actor) = client.actor.as_ref() {
        let location = Location {
            x: actor.x,
            y: actor.y,
        };
        client.send(location);
    }
}

/// Opens the dialog `key` on behalf of object `serial`, replacing any
/// dialog already open.
pub(crate) fn start_dialog<A, S>(
    client: &mut Client,
    state: &ServerState<A, S>,
    serial: u32,
    key: &str,
) {
    let Some(graph) = state.catalog.dialog(key) else {
        tracing::warn!(conn_id = %client.id(), dialog = key, "unknown dialog");
        return;
    };
    match DialogSession::start(graph, Arc::clone(&state.checkpoints), serial) {
        Ok(session) => {
            if let Some(old) = client.dialog.replace(session) {
                tracing::debug!(conn_id = %client.id(), dialog = old.graph_key(), "previous dialog discarded");
            }
            show_dialog(client);
        }
        Err(e) => {
            tracing::warn!(conn_id = %client.id(), dialog = key, error = %e, "dialog failed to start");
        }
    }
}

/// Sends the current step of the open dialog. A session that has
/// finished (a terminal step) is shown once and then dropped.
pub(crate) fn show_dialog(client: &mut Client) {
    let Some(session) = client.dialog.as_ref() else {
        return;
    };
    let view = match session.current_step() {
        Ok(step) => DialogView {
            serial: session.actor(),
            step: step.id,
            prompt: step.prompt.clone(),
            answers: step.labels(),
        },
        Err(e) => {
            tracing::warn!(conn_id = %client.id(), dialog = session.graph_key(), error = %e, "dialog lost its step");
            DialogView::closed(session.actor())
        }
    };
    let finished = session.is_finished();

    client.send(view);
    if finished {
        client.dialog = None;
    }
}

/// Applies the outcome of a dialog action to the client's window.
pub(crate) fn present_transition(client: &mut Client, serial: u32, transition: Transition) {
    match transition {
        Transition::Moved(_) | Transition::Stayed => show_dialog(client),
        Transition::Completed { final_step } => {
            tracing::debug!(conn_id = %client.id(), final_step, "dialog completed");
            client.dialog = None;
            client.send(DialogView::closed(serial));
        }
    }
}

/// Runs everything handlers and checkpoints queued during the last
/// packet, in order.
pub(crate) async fn apply_pending<A, S>(client: &mut Client, state: &ServerState<A, S>)
where
    A: Authenticator,
    S: Storage,
{
    for action in client.take_pending() {
        match action {
            PendingAction::Save => save_actor(client, state).await,
            PendingAction::Warp { map_id, x, y } => {
                change_map(client, state, map_id, x, y);
            }
            PendingAction::Refresh => send_location(client),
        }
    }
}
