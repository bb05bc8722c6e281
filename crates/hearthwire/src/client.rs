//! Per-connection state.
//!
//! A [`Client`] belongs to exactly one connection task. Handlers get it
//! as `&mut Client`, so nothing in here needs a lock: the cipher, the
//! dialog, the rate gates and the outbox are all touched by one task,
//! one packet at a time.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::time::{Duration, Instant};

use hearthwire_dialog::DialogSession;
use hearthwire_protocol::{Cipher, Packet, ServerFormat};
use hearthwire_session::{RedirectToken, Serial, TokenId};
use hearthwire_transport::ConnectionId;
use tokio::sync::oneshot;

use crate::storage::ActorRecord;

// ---------------------------------------------------------------------------
// ServerRole
// ---------------------------------------------------------------------------

/// Which endpoint a connection arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerRole {
    /// Authenticates and hands off.
    Login,
    /// Runs the game session.
    World,
}

impl fmt::Display for ServerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Login => write!(f, "login"),
            Self::World => write!(f, "world"),
        }
    }
}

// ---------------------------------------------------------------------------
// Pending actions
// ---------------------------------------------------------------------------

/// Work a handler or checkpoint queues for after the current packet.
///
/// Checkpoints run deep inside a dialog transition and only see the
/// `Client`. Anything that needs the server (saving, moving maps) is
/// queued here and applied by the connection loop once the handler
/// returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingAction {
    Save,
    Warp { map_id: u16, x: u16, y: u16 },
    /// Resend the player's position.
    Refresh,
}

// ---------------------------------------------------------------------------
// Rate gates
// ---------------------------------------------------------------------------

/// Minimum spacing between two occurrences of something.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gate {
    last: Option<Instant>,
}

impl Gate {
    /// `true` (and records `now`) if at least `interval` passed since
    /// the last success.
    pub fn try_pass(&mut self, now: Instant, interval: Duration) -> bool {
        if let Some(last) = self.last {
            if now.saturating_duration_since(last) < interval {
                return false;
            }
        }
        self.last = Some(now);
        true
    }
}

/// Per-slot skill cooldowns.
#[derive(Debug, Clone, Default)]
pub struct Cooldowns {
    ready_at: HashMap<u8, Instant>,
}

impl Cooldowns {
    pub fn is_ready(&self, slot: u8, now: Instant) -> bool {
        self.ready_at.get(&slot).is_none_or(|at| now >= *at)
    }

    pub fn start(&mut self, slot: u8, now: Instant, length: Duration) {
        if length.is_zero() {
            self.ready_at.remove(&slot);
        } else {
            self.ready_at.insert(slot, now + length);
        }
    }
}

/// The rate limits a player is subject to.
#[derive(Debug, Clone, Default)]
pub struct Gates {
    pub walk: Gate,
    /// Shared by every combat action.
    pub action: Gate,
    pub refresh: Gate,
    pub cooldowns: Cooldowns,
}

/// When things last happened on this connection.
#[derive(Debug, Clone, Copy)]
pub struct Liveness {
    pub connected_at: Instant,
    pub last_packet: Instant,
    pub last_heartbeat: Option<Instant>,
    pub last_save: Instant,
}

impl Liveness {
    fn new(now: Instant) -> Self {
        Self {
            connected_at: now,
            last_packet: now,
            last_heartbeat: None,
            last_save: now,
        }
    }
}

/// Who the connection is, once authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub serial: Serial,
    pub username: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Everything one connection knows about its player.
#[derive(Debug)]
pub struct Client {
    id: ConnectionId,
    role: ServerRole,
    pub(crate) cipher: Option<Cipher>,
    pub(crate) identity: Option<Identity>,
    /// The token this session was admitted with.
    pub(crate) provenance: Option<RedirectToken>,
    pub(crate) actor: Option<ActorRecord>,
    /// `false` between a map change and the client's map data request.
    pub(crate) map_ready: bool,
    /// World map field on screen, if any.
    pub(crate) world_map: Option<u16>,
    pub(crate) dialog: Option<DialogSession<Client>>,
    pub(crate) gates: Gates,
    pub(crate) liveness: Liveness,
    /// The redirect this connection minted for its own player, if any.
    pub(crate) issued_redirect: Option<TokenId>,
    /// Set once the `Redirect` packet for `issued_redirect` was written.
    pub(crate) redirect_delivered: bool,
    pub(crate) logout_sent: bool,
    pub(crate) social_status: u8,
    pub(crate) kick: Option<oneshot::Receiver<()>>,
    pending: VecDeque<PendingAction>,
    pending_limit: usize,
    outbox: Vec<Packet>,
}

impl Client {
    pub(crate) fn new(id: ConnectionId, role: ServerRole, pending_limit: usize) -> Self {
        Self {
            id,
            role,
            cipher: None,
            identity: None,
            provenance: None,
            actor: None,
            map_ready: false,
            world_map: None,
            dialog: None,
            gates: Gates::default(),
            liveness: Liveness::new(Instant::now()),
            issued_redirect: None,
            redirect_delivered: false,
            logout_sent: false,
            social_status: 0,
            kick: None,
            pending: VecDeque::new(),
            pending_limit,
            outbox: Vec::new(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn role(&self) -> ServerRole {
        self.role
    }

    pub fn username(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.username.as_str())
    }

    pub fn serial(&self) -> Option<Serial> {
        self.identity.as_ref().map(|i| i.serial)
    }

    /// `true` once the connection authenticated (login role) or was
    /// admitted with a redirect (world role).
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    /// `true` once a character is loaded.
    pub fn in_world(&self) -> bool {
        self.actor.is_some()
    }

    pub fn actor(&self) -> Option<&ActorRecord> {
        self.actor.as_ref()
    }

    pub fn actor_mut(&mut self) -> Option<&mut ActorRecord> {
        self.actor.as_mut()
    }

    /// In the world, on a loaded map, alive, and free to move.
    pub fn can_act(&self) -> bool {
        self.map_ready
            && self
                .actor
                .as_ref()
                .is_some_and(|a| a.is_alive() && !a.conditions.is_incapacitated())
    }

    /// Queues a packet for the end of the current dispatch.
    pub fn send<F: ServerFormat>(&mut self, format: F) {
        self.outbox.push(format.to_packet());
    }

    pub(crate) fn take_outbox(&mut self) -> Vec<Packet> {
        std::mem::take(&mut self.outbox)
    }

    /// Queues deferred work. Returns `false` (and drops the action) if
    /// the queue is full.
    pub fn defer(&mut self, action: PendingAction) -> bool {
        if self.pending.len() >= self.pending_limit {
            tracing::warn!(conn_id = %self.id, ?action, "pending action queue full; dropped");
            return false;
        }
        // One save covers any number of requests.
        if action == PendingAction::Save && self.pending.contains(&action) {
            return true;
        }
        self.pending.push_back(action);
        true
    }

    pub(crate) fn take_pending(&mut self) -> Vec<PendingAction> {
        self.pending.drain(..).collect()
    }

    pub(crate) fn touch(&mut self, now: Instant) {
        self.liveness.last_packet = now;
    }
}

#[cfg(test)]
mod tests {
    use hearthwire_protocol::formats::KeepaliveAck;

    use super::*;

    fn client() -> Client {
        Client::new(ConnectionId::new(1), ServerRole::World, 2)
    }

    #[test]
    fn test_gate_try_pass_enforces_interval() {
        let mut gate = Gate::default();
        let start = Instant::now();
        let interval = Duration::from_millis(100);

        assert!(gate.try_pass(start, interval));
        assert!(!gate.try_pass(start + Duration::from_millis(50), interval));
        assert!(gate.try_pass(start + Duration::from_millis(100), interval));
    }

    #[test]
    fn test_cooldowns_per_slot() {
        let mut cooldowns = Cooldowns::default();
        let now = Instant::now();
        cooldowns.start(1, now, Duration::from_secs(5));

        assert!(!cooldowns.is_ready(1, now + Duration::from_secs(4)));
        assert!(cooldowns.is_ready(1, now + Duration::from_secs(5)));
        assert!(cooldowns.is_ready(2, now));
    }

    #[test]
    fn test_defer_bounded_and_saves_coalesce() {
        let mut client = client();

        assert!(client.defer(PendingAction::Save));
        assert!(client.defer(PendingAction::Save));
        assert!(client.defer(PendingAction::Refresh));
        assert!(!client.defer(PendingAction::Warp { map_id: 1, x: 0, y: 0 }));
        assert_eq!(
            client.take_pending(),
            vec![PendingAction::Save, PendingAction::Refresh]
        );
        assert!(client.take_pending().is_empty());
    }

    #[test]
    fn test_can_act_requires_map_ready_and_free_actor() {
        let mut client = client();
        assert!(!client.can_act());

        client.actor = Some(ActorRecord::new("ayla", 1, 1, 1));
        assert!(!client.can_act());

        client.map_ready = true;
        assert!(client.can_act());

        if let Some(actor) = client.actor_mut() {
            actor.conditions.frozen = true;
        }
        assert!(!client.can_act());
    }

    #[test]
    fn test_send_queues_until_taken() {
        let mut client = client();
        client.send(KeepaliveAck);

        let out = client.take_outbox();

        assert_eq!(out.len(), 1);
        assert!(client.take_outbox().is_empty());
    }
}
