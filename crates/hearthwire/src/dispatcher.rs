//! Opcode → handler table.
//!
//! Each role gets its own table, built once by [`Dispatcher::for_role`]
//! and never changed afterwards. Looking a handler up is an array index;
//! no lock, no branching on magic numbers.

use bytes::Bytes;
use futures_util::future::BoxFuture;
use hearthwire_protocol::ClientOpcode;
use hearthwire_session::Authenticator;

use crate::client::{Client, ServerRole};
use crate::handlers::{action, board, interaction, login, movement, social};
use crate::server::ServerState;
use crate::storage::Storage;
use crate::HandlerError;

/// Whether the connection keeps going after a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Flush what's queued, then close.
    Disconnect,
}

/// What every handler returns. `Err` is always fatal for the
/// connection; everything recoverable is handled inside the handler.
pub type HandlerOutcome = Result<Flow, HandlerError>;

/// A handler: borrows the connection's client and the shared state for
/// the duration of one packet.
pub(crate) type Handler<A, S> = for<'a> fn(
    &'a mut Client,
    &'a ServerState<A, S>,
    Bytes,
) -> BoxFuture<'a, HandlerOutcome>;

/// Wraps an `async fn` handler into a [`Handler`] pointer.
macro_rules! route {
    ($handler:path) => {
        |client, state, payload| Box::pin($handler(client, state, payload))
    };
}

pub(crate) struct Dispatcher<A, S> {
    role: ServerRole,
    routes: [Option<Handler<A, S>>; 256],
}

impl<A, S> Dispatcher<A, S>
where
    A: Authenticator,
    S: Storage,
{
    /// Builds the table for `role`.
    pub(crate) fn for_role(role: ServerRole) -> Self {
        let mut dispatcher = Self {
            role,
            routes: [None; 256],
        };

        dispatcher.add(ClientOpcode::EncryptionInit, route!(login::encryption_init));
        dispatcher.add(ClientOpcode::Heartbeat, route!(login::heartbeat));
        dispatcher.add(ClientOpcode::TimerSync, route!(login::timer_sync));

        match role {
            ServerRole::Login => {
                dispatcher.add(ClientOpcode::Login, route!(login::login));
                dispatcher.add(ClientOpcode::EnterWorld, route!(login::resume_login));
            }
            ServerRole::World => {
                dispatcher.add(ClientOpcode::EnterWorld, route!(login::enter_world));
                dispatcher.add(ClientOpcode::LeaveGame, route!(login::leave_game));
                dispatcher.add(ClientOpcode::MapDataRequest, route!(movement::map_data_request));
                dispatcher.add(ClientOpcode::Walk, route!(movement::walk));
                dispatcher.add(ClientOpcode::Turn, route!(movement::turn));
                dispatcher.add(ClientOpcode::Refresh, route!(movement::refresh));
                dispatcher.add(ClientOpcode::WorldMapClick, route!(movement::world_map_click));
                dispatcher.add(ClientOpcode::Assail, route!(action::assail));
                dispatcher.add(ClientOpcode::UseSkill, route!(action::use_skill));
                dispatcher.add(ClientOpcode::Click, route!(interaction::click));
                dispatcher.add(ClientOpcode::MenuResponse, route!(interaction::menu_response));
                dispatcher.add(ClientOpcode::DialogResponse, route!(interaction::dialog_response));
                dispatcher.add(ClientOpcode::Board, route!(board::board));
                dispatcher.add(ClientOpcode::GroupRequest, route!(social::group_request));
                dispatcher.add(ClientOpcode::SocialStatus, route!(social::social_status));
            }
        }

        dispatcher
    }

    fn add(&mut self, opcode: ClientOpcode, handler: Handler<A, S>) {
        self.routes[usize::from(opcode.as_u8())] = Some(handler);
    }

    pub(crate) fn role(&self) -> ServerRole {
        self.role
    }

    /// Returns `true` if `opcode` has a handler in this table.
    pub(crate) fn handles(&self, opcode: ClientOpcode) -> bool {
        self.routes[usize::from(opcode.as_u8())].is_some()
    }

    /// Runs the handler for `opcode` against `payload` (already
    /// decrypted).
    ///
    /// - An opcode this role doesn't handle is a protocol violation
    ///   before authentication and ignored after.
    /// - A payload that doesn't parse is ignored on plaintext packets.
    ///   On secured packets it's fatal: the cipher stream can't be
    ///   trusted any more.
    pub(crate) async fn dispatch(
        &self,
        opcode: ClientOpcode,
        client: &mut Client,
        state: &ServerState<A, S>,
        payload: Bytes,
    ) -> HandlerOutcome {
        let Some(handler) = self.routes[usize::from(opcode.as_u8())] else {
            if client.is_authenticated() {
                tracing::debug!(conn_id = %client.id(), %opcode, role = %self.role, "unhandled opcode ignored");
                return Ok(Flow::Continue);
            }
            return Err(HandlerError::ProtocolViolation(format!(
                "{opcode} is not accepted by the {} role",
                self.role
            )));
        };

        match handler(client, state, payload).await {
            Err(HandlerError::Malformed(e)) if !opcode.is_secured() => {
                tracing::debug!(conn_id = %client.id(), %opcode, error = %e, "malformed packet ignored");
                Ok(Flow::Continue)
            }
            outcome => outcome,
        }
    }
}
