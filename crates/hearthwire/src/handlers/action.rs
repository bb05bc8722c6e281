//! Combat actions.

use std::time::{Duration, Instant};

use bytes::Bytes;
use hearthwire_protocol::ClientFormat;
use hearthwire_protocol::formats::{Animation, CooldownNotice, UseSkill};
use hearthwire_session::Authenticator;

use crate::client::Client;
use crate::dispatcher::{Flow, HandlerOutcome};
use crate::server::ServerState;
use crate::storage::Storage;

/// Animation played for a plain attack.
const ASSAIL_ANIMATION: u16 = 0x01;
const ANIMATION_SPEED: u16 = 20;

/// Basic attack. Has no payload.
pub(crate) async fn assail<A, S>(
    client: &mut Client,
    state: &ServerState<A, S>,
    _payload: Bytes,
) -> HandlerOutcome
where
    A: Authenticator,
    S: Storage,
{
    let Some(serial) = client.serial() else {
        return Ok(Flow::Continue);
    };
    if !client.can_act()
        || !client
            .gates
            .action
            .try_pass(Instant::now(), state.config.global_action_interval())
    {
        return Ok(Flow::Continue);
    }

    client.send(Animation {
        serial: serial.0,
        animation: ASSAIL_ANIMATION,
        speed: ANIMATION_SPEED,
    });
    Ok(Flow::Continue)
}

/// Uses the skill learned in `slot`.
///
/// The slot's own cooldown is checked before the shared action gate, so
/// a skill still cooling down doesn't use up the gate.
pub(crate) async fn use_skill<A, S>(
    client: &mut Client,
    state: &ServerState<A, S>,
    payload: Bytes,
) -> HandlerOutcome
where
    A: Authenticator,
    S: Storage,
{
    let request = UseSkill::parse(payload)?;

    let (Some(serial), Some(actor)) = (client.serial(), client.actor()) else {
        return Ok(Flow::Continue);
    };
    if !client.can_act() {
        return Ok(Flow::Continue);
    }
    let Some(skill) = actor
        .skills
        .iter()
        .find(|s| s.slot == request.slot)
        .and_then(|s| state.catalog.skill(&s.key))
    else {
        return Ok(Flow::Continue);
    };

    let now = Instant::now();
    if !client.gates.cooldowns.is_ready(request.slot, now) {
        tracing::debug!(conn_id = %client.id(), slot = request.slot, "skill on cooldown");
        return Ok(Flow::Continue);
    }
    if !client
        .gates
        .action
        .try_pass(now, state.config.global_action_interval())
    {
        return Ok(Flow::Continue);
    }

    client.gates.cooldowns.start(
        request.slot,
        now,
        Duration::from_secs(u64::from(skill.cooldown_secs)),
    );
    client.send(Animation {
        serial: serial.0,
        animation: skill.animation,
        speed: ANIMATION_SPEED,
    });
    if skill.cooldown_secs > 0 {
        client.send(CooldownNotice {
            slot: request.slot,
            seconds: skill.cooldown_secs,
        });
    }
    tracing::debug!(conn_id = %client.id(), skill = %skill.key, "skill used");
    Ok(Flow::Continue)
}
