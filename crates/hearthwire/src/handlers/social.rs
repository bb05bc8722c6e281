//! Groups and social status.

use bytes::Bytes;
use hearthwire_protocol::ClientFormat;
use hearthwire_protocol::formats::{GroupRequest, GroupUpdate, SocialStatus, SystemMessage};
use hearthwire_session::Authenticator;

use crate::client::Client;
use crate::dispatcher::{Flow, HandlerOutcome};
use crate::server::ServerState;
use crate::storage::Storage;

pub(crate) async fn group_request<A, S>(
    client: &mut Client,
    state: &ServerState<A, S>,
    payload: Bytes,
) -> HandlerOutcome
where
    A: Authenticator,
    S: Storage,
{
    let request = GroupRequest::parse(payload)?;

    let Some(username) = client.username().map(str::to_string) else {
        return Ok(Flow::Continue);
    };
    if !client.in_world() {
        return Ok(Flow::Continue);
    }

    match request.kind {
        GroupRequest::INVITE => {
            if !state.directory.is_online(&request.target) {
                client.send(SystemMessage::bar(format!(
                    "{} is not online.",
                    request.target
                )));
                return Ok(Flow::Continue);
            }
            match state.parties.invite(&username, &request.target) {
                Ok(members) => {
                    tracing::debug!(conn_id = %client.id(), %username, target = %request.target, "grouped");
                    client.send(GroupUpdate { members });
                }
                Err(e) => client.send(SystemMessage::bar(e.to_string())),
            }
        }
        GroupRequest::LEAVE => {
            if state.parties.leave(&username).is_some() {
                client.send(GroupUpdate {
                    members: Vec::new(),
                });
            }
        }
        other => {
            tracing::debug!(conn_id = %client.id(), kind = other, "unknown group request");
        }
    }
    Ok(Flow::Continue)
}

pub(crate) async fn social_status<A, S>(
    client: &mut Client,
    _state: &ServerState<A, S>,
    payload: Bytes,
) -> HandlerOutcome
where
    A: Authenticator,
    S: Storage,
{
    let request = SocialStatus::parse(payload)?;

    if client.in_world() {
        client.social_status = request.status;
    }
    Ok(Flow::Continue)
}
