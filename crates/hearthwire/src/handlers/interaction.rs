//! Clicking things and talking to them.

use std::time::Instant;

use bytes::Bytes;
use hearthwire_dialog::{
    CheckpointError, CheckpointInput, CheckpointRegistry, DialogError, Navigation,
    Transition,
};
use hearthwire_protocol::ClientFormat;
use hearthwire_protocol::formats::{
    Click, DialogResponse, DialogView, MenuResponse, SystemMessage,
};
use hearthwire_session::Authenticator;

use crate::client::{Client, PendingAction};
use crate::dispatcher::{Flow, HandlerOutcome};
use crate::handlers::{present_transition, start_dialog};
use crate::server::ServerState;
use crate::storage::Storage;

/// How far away (in tiles, either axis) an NPC can be clicked.
const VIEW_RANGE: u16 = 12;

pub(crate) async fn click<A, S>(
    client: &mut Client,
    state: &ServerState<A, S>,
    payload: Bytes,
) -> HandlerOutcome
where
    A: Authenticator,
    S: Storage,
{
    let request = Click::parse(payload)?;

    if !client.can_act() {
        return Ok(Flow::Continue);
    }
    let Some(actor) = client.actor() else {
        return Ok(Flow::Continue);
    };
    let Some(npc) = state
        .catalog
        .map(actor.map_id)
        .and_then(|m| m.npc(request.serial))
    else {
        return Ok(Flow::Continue);
    };
    if actor.x.abs_diff(npc.x) > VIEW_RANGE || actor.y.abs_diff(npc.y) > VIEW_RANGE {
        return Ok(Flow::Continue);
    }

    tracing::debug!(conn_id = %client.id(), npc = %npc.name, "talking to npc");
    start_dialog(client, state, npc.serial, &npc.dialog);
    Ok(Flow::Continue)
}

/// The player picked an answer in the open dialog.
pub(crate) async fn menu_response<A, S>(
    client: &mut Client,
    state: &ServerState<A, S>,
    payload: Bytes,
) -> HandlerOutcome
where
    A: Authenticator,
    S: Storage,
{
    let request = MenuResponse::parse(payload)?;

    if !client.can_act() {
        return Ok(Flow::Continue);
    }
    if !take_live_dialog(client, state, request.serial) || request.answer == 0 {
        return Ok(Flow::Continue);
    }
    let Some(mut session) = client.dialog.take() else {
        return Ok(Flow::Continue);
    };

    let index = usize::from(request.answer - 1);
    let result = session
        .select(index, request.input.as_deref(), client)
        .await;
    client.dialog = Some(session);

    match result {
        Ok(transition) => present_transition(client, request.serial, transition),
        Err(DialogError::NoSuchAnswer(index)) => {
            tracing::debug!(conn_id = %client.id(), index, "answer out of range");
        }
        Err(DialogError::Finished) => client.dialog = None,
        Err(e) => {
            tracing::warn!(conn_id = %client.id(), error = %e, "dialog broke; closing");
            client.dialog = None;
            client.send(DialogView::closed(request.serial));
        }
    }
    Ok(Flow::Continue)
}

/// Next, back or close on the dialog window.
pub(crate) async fn dialog_response<A, S>(
    client: &mut Client,
    state: &ServerState<A, S>,
    payload: Bytes,
) -> HandlerOutcome
where
    A: Authenticator,
    S: Storage,
{
    let request = DialogResponse::parse(payload)?;

    if request.script_id == DialogResponse::NO_SCRIPT && request.step == 0 {
        client.dialog = None;
        return Ok(Flow::Continue);
    }
    // Closing is always allowed; moving on is not while incapacitated.
    if !client.can_act() {
        return Ok(Flow::Continue);
    }
    if !take_live_dialog(client, state, request.serial) {
        return Ok(Flow::Continue);
    }
    let Some(mut session) = client.dialog.take() else {
        return Ok(Flow::Continue);
    };

    let nav = match request.step {
        1 => Navigation::Next,
        0 | 2 => Navigation::Close,
        _ => Navigation::Back,
    };
    let result = session.navigate(nav, client).await;
    client.dialog = Some(session);

    match result {
        // The client already closed its window; don't leave the session
        // behind just because the step had no close answer.
        Ok(Transition::Stayed) if nav == Navigation::Close => {
            client.dialog = None;
        }
        Ok(transition) => present_transition(client, request.serial, transition),
        Err(e) => {
            tracing::debug!(conn_id = %client.id(), error = %e, "dialog navigation dropped");
            client.dialog = None;
        }
    }
    Ok(Flow::Continue)
}

/// `true` if there is an open dialog shown by `serial` that hasn't sat
/// idle too long. An idle one is discarded.
fn take_live_dialog<A, S>(client: &mut Client, state: &ServerState<A, S>, serial: u32) -> bool {
    let Some(session) = client.dialog.as_ref() else {
        return false;
    };
    if session.actor() != serial {
        return false;
    }
    if session.is_idle(Instant::now(), state.config.dialog_idle()) {
        tracing::debug!(conn_id = %client.id(), dialog = session.graph_key(), "idle dialog discarded");
        client.dialog = None;
        return false;
    }
    true
}

// ---------------------------------------------------------------------------
// Checkpoints
// ---------------------------------------------------------------------------

/// The checkpoints every server registers.
///
/// | Name            | Value        | Passes when                      |
/// |-----------------|--------------|----------------------------------|
/// | `HasQuest`      | quest key    | the quest is in the log          |
/// | `GiveQuest`     | quest key    | always; adds it                  |
/// | `CompleteQuest` | quest key    | it was in the log; removes it    |
/// | `HasGold`       | amount       | the player has at least that     |
/// | `TakeGold`      | amount       | the player could pay; pays       |
/// | `GiveGold`      | amount       | always; adds it                  |
/// | `Warp`          | `map,x,y`    | always; moves after the packet   |
/// | `Say`           | text         | always; shows a popup            |
///
/// Anything that changes the record queues a save.
pub fn standard_checkpoints() -> CheckpointRegistry<Client> {
    let mut registry = CheckpointRegistry::new();

    registry.register_sync("HasQuest", |client: &mut Client, args: CheckpointInput<'_>| {
        Ok(client.actor().is_some_and(|a| a.has_quest(args.value)))
    });

    registry.register_sync("GiveQuest", |client: &mut Client, args: CheckpointInput<'_>| {
        let Some(actor) = client.actor_mut() else {
            return Ok(false);
        };
        if !actor.has_quest(args.value) {
            actor.quests.push(args.value.to_string());
        }
        client.defer(PendingAction::Save);
        Ok(true)
    });

    registry.register_sync("CompleteQuest", |client: &mut Client, args: CheckpointInput<'_>| {
        let Some(actor) = client.actor_mut() else {
            return Ok(false);
        };
        let before = actor.quests.len();
        actor.quests.retain(|q| q != args.value);
        if actor.quests.len() == before {
            return Ok(false);
        }
        client.defer(PendingAction::Save);
        Ok(true)
    });

    registry.register_sync("HasGold", |client: &mut Client, args: CheckpointInput<'_>| {
        let amount = amount("HasGold", args.value)?;
        Ok(client.actor().is_some_and(|a| a.gold >= amount))
    });

    registry.register_sync("TakeGold", |client: &mut Client, args: CheckpointInput<'_>| {
        let amount = amount("TakeGold", args.value)?;
        let Some(actor) = client.actor_mut() else {
            return Ok(false);
        };
        let Some(left) = actor.gold.checked_sub(amount) else {
            return Ok(false);
        };
        actor.gold = left;
        client.defer(PendingAction::Save);
        Ok(true)
    });

    registry.register_sync("GiveGold", |client: &mut Client, args: CheckpointInput<'_>| {
        let amount = amount("GiveGold", args.value)?;
        let Some(actor) = client.actor_mut() else {
            return Ok(false);
        };
        actor.gold = actor.gold.saturating_add(amount);
        client.defer(PendingAction::Save);
        Ok(true)
    });

    registry.register_sync("Warp", |client: &mut Client, args: CheckpointInput<'_>| {
        let (map_id, x, y) = destination(args.value).ok_or_else(|| CheckpointError::Failed {
            name: "Warp".into(),
            reason: format!("bad destination {:?}", args.value),
        })?;
        Ok(client.defer(PendingAction::Warp { map_id, x, y }))
    });

    registry.register_sync("Say", |client: &mut Client, args: CheckpointInput<'_>| {
        client.send(SystemMessage::popup(args.value));
        Ok(true)
    });

    registry
}

fn amount(name: &str, value: &str) -> Result<u32, CheckpointError> {
    value.trim().parse().map_err(|_| CheckpointError::Failed {
        name: name.into(),
        reason: format!("bad amount {value:?}"),
    })
}

/// Parses `map,x,y`.
fn destination(value: &str) -> Option<(u16, u16, u16)> {
    let mut parts = value.split(',').map(|p| p.trim().parse::<u16>());
    let map_id = parts.next()?.ok()?;
    let x = parts.next()?.ok()?;
    let y = parts.next()?.ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((map_id, x, y))
}
