//! Walking, turning, map loading and world-map travel.

use std::time::Instant;

use bytes::Bytes;
use hearthwire_protocol::ClientFormat;
use hearthwire_protocol::formats::{
    MapLoaded, Turn, TurnNotice, Walk, WalkAck, WorldMapClick,
};
use hearthwire_session::Authenticator;

use crate::catalog::WarpTarget;
use crate::client::Client;
use crate::dispatcher::{Flow, HandlerOutcome};
use crate::handlers::{change_map, send_location, start_dialog};
use crate::server::ServerState;
use crate::storage::Storage;

/// Applies `direction` (0 up, 1 right, 2 down, 3 left) to a position.
/// `None` for an unknown direction or a step below zero.
fn step(x: u16, y: u16, direction: u8) -> Option<(u16, u16)> {
    match direction {
        0 => Some((x, y.checked_sub(1)?)),
        1 => Some((x.checked_add(1)?, y)),
        2 => Some((x, y.checked_add(1)?)),
        3 => Some((x.checked_sub(1)?, y)),
        _ => None,
    }
}

/// The client finished loading the map it was sent to.
pub(crate) async fn map_data_request<A, S>(
    client: &mut Client,
    state: &ServerState<A, S>,
    _payload: Bytes,
) -> HandlerOutcome
where
    A: Authenticator,
    S: Storage,
{
    let Some(map_id) = client.actor().map(|a| a.map_id) else {
        return Ok(Flow::Continue);
    };
    let Some(map) = state.catalog.map(map_id) else {
        return Ok(Flow::Continue);
    };

    client.send(MapLoaded {
        map_id,
        width: map.width,
        height: map.height,
        name: map.name.clone(),
    });
    client.map_ready = true;
    Ok(Flow::Continue)
}

pub(crate) async fn walk<A, S>(
    client: &mut Client,
    state: &ServerState<A, S>,
    payload: Bytes,
) -> HandlerOutcome
where
    A: Authenticator,
    S: Storage,
{
    let request = Walk::parse(payload)?;

    if !client.can_act() {
        return Ok(Flow::Continue);
    }
    if !client
        .gates
        .walk
        .try_pass(Instant::now(), state.config.walk_min_interval())
    {
        tracing::debug!(conn_id = %client.id(), "walk faster than allowed; ignored");
        return Ok(Flow::Continue);
    }
    let Some(actor) = client.actor() else {
        return Ok(Flow::Continue);
    };
    let (from_x, from_y, map_id) = (actor.x, actor.y, actor.map_id);
    let Some(map) = state.catalog.map(map_id) else {
        return Ok(Flow::Continue);
    };

    let target = step(from_x, from_y, request.direction).filter(|(x, y)| map.contains(*x, *y));
    let Some((x, y)) = target else {
        // Put the client back where the server thinks it is.
        send_location(client);
        return Ok(Flow::Continue);
    };

    if let Some(actor) = client.actor_mut() {
        actor.x = x;
        actor.y = y;
        actor.direction = request.direction;
    }
    client.send(WalkAck {
        direction: request.direction,
        from_x,
        from_y,
    });

    if let Some(popup) = map.popup_at(x, y) {
        start_dialog(client, state, popup.serial, &popup.dialog);
    }
    if let Some(warp) = map.warp_at(x, y) {
        match warp.target {
            WarpTarget::Map { map_id, x, y } => {
                change_map(client, state, map_id, x, y);
            }
            WarpTarget::WorldMap { field } => {
                if let Some(world_map) = state.catalog.world_map(field) {
                    client.world_map = Some(field);
                    client.send(world_map.descriptor());
                }
            }
        }
    }
    Ok(Flow::Continue)
}

pub(crate) async fn turn<A, S>(
    client: &mut Client,
    _state: &ServerState<A, S>,
    payload: Bytes,
) -> HandlerOutcome
where
    A: Authenticator,
    S: Storage,
{
    let request = Turn::parse(payload)?;

    if !client.can_act() || request.direction > 3 {
        return Ok(Flow::Continue);
    }
    let Some(serial) = client.serial() else {
        return Ok(Flow::Continue);
    };
    if let Some(actor) = client.actor_mut() {
        actor.direction = request.direction;
    }
    client.send(TurnNotice {
        serial: serial.0,
        direction: request.direction,
    });
    Ok(Flow::Continue)
}

/// Resends the player's position, at most once per refresh interval.
pub(crate) async fn refresh<A, S>(
    client: &mut Client,
    state: &ServerState<A, S>,
    _payload: Bytes,
) -> HandlerOutcome
where
    A: Authenticator,
    S: Storage,
{
    if !client.in_world()
        || !client
            .gates
            .refresh
            .try_pass(Instant::now(), state.config.refresh_min_interval())
    {
        return Ok(Flow::Continue);
    }
    send_location(client);
    Ok(Flow::Continue)
}

/// Travels to a destination picked on the open world map.
///
/// The move pauses twice (leaving, then arriving) so the client can play
/// its loading sequence. Only this connection waits; a second click
/// during the pauses is ignored.
pub(crate) async fn world_map_click<A, S>(
    client: &mut Client,
    state: &ServerState<A, S>,
    payload: Bytes,
) -> HandlerOutcome
where
    A: Authenticator,
    S: Storage,
{
    let request = WorldMapClick::parse(payload)?;

    let (Some(field), Some(serial)) = (client.world_map, client.serial()) else {
        return Ok(Flow::Continue);
    };
    if !client.in_world() {
        return Ok(Flow::Continue);
    }
    let Some(portal) = state
        .catalog
        .world_map(field)
        .and_then(|w| w.portal_to(request.area_id))
    else {
        tracing::debug!(conn_id = %client.id(), field, area_id = request.area_id, "no such destination");
        return Ok(Flow::Continue);
    };
    let Some(_pass) = state.warps.begin(serial.0, client.id()) else {
        return Ok(Flow::Continue);
    };

    tracing::debug!(conn_id = %client.id(), field, destination = %portal.name, "world map travel");
    tokio::time::sleep(state.config.world_transition_delay()).await;
    client.world_map = None;
    tokio::time::sleep(state.config.world_transition_delay()).await;

    if !change_map(client, state, portal.map_id, portal.dest_x, portal.dest_y) {
        send_location(client);
    }
    Ok(Flow::Continue)
}
