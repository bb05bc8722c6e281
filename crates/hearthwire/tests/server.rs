//! Integration tests for the Hearthwire server: real sockets, both
//! roles, full handshake and handoff.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use hearthwire::prelude::*;
use hearthwire::registry::Board;
use hearthwire_protocol::formats::{
    BoardRequest, BoardResponse, Click, DialogResponse, DialogView, EncryptionInit,
    EnterWorld, Heartbeat, LeaveGame, Location, Login, LoginResult, MenuResponse,
    PortalDescriptor, Redirect, Walk, WorldMapClick,
};
use hearthwire_protocol::{
    Cipher, ClientFormat, ClientOpcode, Packet, RedirectCredentials, RedirectKind,
    ServerOpcode,
};
use hearthwire_transport::{Connection, TcpConnection};

// =========================================================================
// Fixtures
// =========================================================================

const CATALOG: &str = r#"{
    "spawn": { "map_id": 1, "x": 3, "y": 3 },
    "maps": [
        { "id": 1, "name": "Hearth", "width": 10, "height": 10,
          "npcs": [ { "serial": 100, "name": "Elder", "x": 4, "y": 4, "dialog": "elder" } ],
          "warps": [ { "x": 4, "y": 3, "target": { "kind": "world_map", "field": 1 } } ] },
        { "id": 2, "name": "Fields", "width": 20, "height": 20 }
    ],
    "world_maps": [
        { "field": 1, "portals": [
            { "name": "Fields", "screen_x": 100, "screen_y": 40,
              "map_id": 2, "dest_x": 5, "dest_y": 6 }
        ] }
    ],
    "dialogs": [
        { "key": "elder", "start": 1, "steps": [
            { "id": 1, "prompt": "Rats in the cellar.", "answers": [
                { "text": "I'll help", "target": 2,
                  "checkpoint": { "name": "GiveQuest", "value": "rats" } },
                { "text": "close", "target": 1 }
            ] },
            { "id": 2, "prompt": "Good luck.", "answers": [
                { "text": "next", "target": 3 }
            ] },
            { "id": 3, "prompt": "Off you go." }
        ] }
    ],
    "boards": [ { "id": 1, "name": "Town Square" } ]
}"#;

/// Accepts any user whose password is "hunter2".
struct TestAuth;

impl Authenticator for TestAuth {
    async fn authenticate(&self, username: &str, password: &str) -> Result<Serial, SessionError> {
        if password != "hunter2" {
            return Err(SessionError::AuthFailed(format!("bad password for {username}")));
        }
        Ok(Serial(username.bytes().map(u32::from).sum()))
    }
}

/// Memory storage whose board writes always fail.
#[derive(Default)]
struct BrokenBoards {
    inner: MemoryStorage,
}

impl Storage for BrokenBoards {
    async fn load(&self, username: &str) -> Result<Option<ActorRecord>, StorageError> {
        self.inner.load(username).await
    }

    async fn save(&self, record: &ActorRecord) -> Result<(), StorageError> {
        self.inner.save(record).await
    }

    async fn load_boards(&self) -> Result<Vec<Board>, StorageError> {
        Ok(Vec::new())
    }

    async fn save_boards(&self, _boards: &[Board]) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("disk full".into()))
    }
}

fn config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.login_addr = "127.0.0.1:0".into();
    config.world_addr = "127.0.0.1:0".into();
    config.walk_min_interval_ms = 0;
    config.world_transition_delay_ms = 10;
    config
}

struct Running<S> {
    login: SocketAddr,
    state: Arc<ServerState<TestAuth, S>>,
}

async fn start<S: Storage>(storage: S) -> Running<S> {
    let server = HearthwireServerBuilder::new()
        .config(config())
        .catalog(TemplateCatalog::from_json_str(CATALOG).unwrap())
        .build(TestAuth, storage)
        .await
        .unwrap();

    let login = server.login_addr().unwrap();
    let state = server.state();
    tokio::spawn(server.run());
    tokio::time::sleep(Duration::from_millis(20)).await;

    Running { login, state }
}

// =========================================================================
// Test client
// =========================================================================

/// Speaks the protocol from the client side, mirroring the server's
/// cipher.
struct TestClient {
    conn: TcpConnection,
    cipher: Option<Cipher>,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        Self {
            conn: TcpConnection::connect(addr).await.unwrap(),
            cipher: None,
        }
    }

    async fn send_raw(&mut self, opcode: ClientOpcode, payload: &[u8]) {
        let payload = match (&mut self.cipher, opcode.is_secured()) {
            (Some(cipher), true) => cipher.seal(payload),
            _ => Bytes::copy_from_slice(payload),
        };
        self.conn
            .send(Packet::new(opcode.as_u8(), payload).encode())
            .await
            .unwrap();
    }

    async fn send<F: ClientFormat>(&mut self, format: &F) {
        let packet = format.to_packet();
        self.send_raw(F::OPCODE, &packet.payload).await;
    }

    /// Next packet, decrypted. `None` once the server closed the
    /// connection.
    async fn recv(&mut self) -> Option<(ServerOpcode, Bytes)> {
        let body = tokio::time::timeout(Duration::from_secs(2), self.conn.recv())
            .await
            .expect("timed out waiting for the server")
            .ok()??;
        let opcode = ServerOpcode::try_from(body[0]).unwrap();
        let payload = body.slice(1..);
        let payload = match (&mut self.cipher, opcode.is_secured()) {
            (Some(cipher), true) => cipher.open(&payload),
            _ => payload,
        };
        Some((opcode, payload))
    }

    /// Skips packets until one with `opcode` arrives.
    async fn expect(&mut self, opcode: ServerOpcode) -> Bytes {
        loop {
            match self.recv().await {
                Some((op, payload)) if op == opcode => return payload,
                Some(_) => continue,
                None => panic!("connection closed while waiting for {opcode}"),
            }
        }
    }

    /// `true` if the server closes the connection, skipping anything
    /// it sends first.
    async fn is_dropped(&mut self) -> bool {
        loop {
            match tokio::time::timeout(Duration::from_secs(2), self.conn.recv()).await {
                Ok(Ok(Some(_))) => continue,
                Ok(Ok(None)) | Ok(Err(_)) => return true,
                Err(_) => return false,
            }
        }
    }

    async fn negotiate(&mut self) {
        self.send(&EncryptionInit {
            kind: 0,
            custom_key: None,
        })
        .await;
        self.expect(ServerOpcode::EncryptionAck).await;
        self.cipher = Some(Cipher::new(CipherParameters::default()));
    }

    async fn login(&mut self, username: &str, password: &str) -> LoginResult {
        self.send(&Login {
            username: username.into(),
            password: password.into(),
        })
        .await;
        LoginResult::parse(self.expect(ServerOpcode::LoginResult).await).unwrap()
    }

    /// Presents `credentials` on a fresh connection to `addr`, taking
    /// on the cipher they carry.
    async fn redeem(addr: SocketAddr, credentials: &RedirectCredentials) -> Self {
        let mut client = Self::connect(addr).await;
        client
            .send(&EnterWorld {
                credentials: credentials.clone(),
            })
            .await;
        client.cipher = Some(Cipher::new(CipherParameters::new(
            credentials.salt.clone(),
            credentials.seed,
            CipherMode::Standard,
        )));
        client
    }
}

/// Logs in and returns the redirect to the world role.
async fn handoff(login: SocketAddr, username: &str) -> Redirect {
    let mut client = TestClient::connect(login).await;
    client.negotiate().await;
    client
        .send(&Login {
            username: username.into(),
            password: "hunter2".into(),
        })
        .await;

    // The redirect goes out ahead of the result.
    let redirect = Redirect::parse(client.expect(ServerOpcode::Redirect).await).unwrap();
    let result = LoginResult::parse(client.expect(ServerOpcode::LoginResult).await).unwrap();
    assert_eq!(result.code, LoginResult::OK);
    redirect
}

/// Logs in, enters the world and loads the map.
async fn enter(login: SocketAddr, username: &str) -> TestClient {
    let redirect = handoff(login, username).await;
    let world = SocketAddr::from((redirect.address, redirect.port));
    let mut client = TestClient::redeem(world, &redirect.credentials).await;
    client.expect(ServerOpcode::Location).await;
    client.send_raw(ClientOpcode::MapDataRequest, &[]).await;
    client.expect(ServerOpcode::MapLoaded).await;
    client
}

// =========================================================================
// Handshake
// =========================================================================

#[tokio::test]
async fn test_encryption_init_standard_ack_is_four_zero_bytes() {
    let running = start(MemoryStorage::new()).await;
    let mut client = TestClient::connect(running.login).await;

    client
        .send(&EncryptionInit {
            kind: 0,
            custom_key: None,
        })
        .await;
    let ack = client.expect(ServerOpcode::EncryptionAck).await;

    assert_eq!(&ack[..], &[0x00, 0x00, 0x00, 0x00]);
}

#[tokio::test]
async fn test_encryption_init_extended_ack_is_five_bytes() {
    let running = start(MemoryStorage::new()).await;
    let mut client = TestClient::connect(running.login).await;

    client
        .send(&EncryptionInit {
            kind: 1,
            custom_key: None,
        })
        .await;
    let ack = client.expect(ServerOpcode::EncryptionAck).await;

    assert_eq!(&ack[..], &[0x01, 0x00, 0x00, 0x00, 0x00]);
}

#[tokio::test]
async fn test_secured_packet_without_cipher_is_dropped() {
    let running = start(MemoryStorage::new()).await;
    let mut client = TestClient::connect(running.login).await;

    client.send(&Walk { direction: 1 }).await;

    assert!(client.is_dropped().await);
}

#[tokio::test]
async fn test_login_bad_password_rejected_connection_survives() {
    let running = start(MemoryStorage::new()).await;
    let mut client = TestClient::connect(running.login).await;
    client.negotiate().await;

    let result = client.login("ayla", "wrong").await;
    client.send(&Heartbeat { value: 0 }).await;

    assert_eq!(result.code, LoginResult::BAD_CREDENTIALS);
    client.expect(ServerOpcode::Ack).await;
    assert!(running.state.redirects().is_empty());
}

// =========================================================================
// Handoff
// =========================================================================

#[tokio::test]
async fn test_login_then_enter_world_places_new_player_at_spawn() {
    let running = start(MemoryStorage::new()).await;
    let redirect = handoff(running.login, "ayla").await;
    assert_eq!(redirect.kind, RedirectKind::LoginHandoff);
    assert!(running.state.redirects().contains("ayla"));

    let world = SocketAddr::from((redirect.address, redirect.port));
    let mut client = TestClient::redeem(world, &redirect.credentials).await;
    let location = Location::parse(client.expect(ServerOpcode::Location).await).unwrap();

    assert_eq!(location, Location { x: 3, y: 3 });
    assert!(!running.state.redirects().contains("ayla"));
    assert!(running.state.directory().is_online("ayla"));
}

#[tokio::test]
async fn test_enter_world_replayed_redirect_is_dropped() {
    let running = start(MemoryStorage::new()).await;
    let redirect = handoff(running.login, "ayla").await;
    let world = SocketAddr::from((redirect.address, redirect.port));

    let mut first = TestClient::redeem(world, &redirect.credentials).await;
    first.expect(ServerOpcode::Location).await;
    let mut replay = TestClient::redeem(world, &redirect.credentials).await;

    assert!(replay.is_dropped().await);
}

#[tokio::test]
async fn test_enter_world_forged_serial_dropped_and_token_kept() {
    let running = start(MemoryStorage::new()).await;
    let redirect = handoff(running.login, "ayla").await;
    let world = SocketAddr::from((redirect.address, redirect.port));

    let mut forged = redirect.credentials.clone();
    forged.serial = forged.serial.wrapping_add(1);
    let mut spoofer = TestClient::redeem(world, &forged).await;
    assert!(spoofer.is_dropped().await);

    let mut real = TestClient::redeem(world, &redirect.credentials).await;
    real.expect(ServerOpcode::Location).await;
}

#[tokio::test]
async fn test_duplicate_login_kicks_older_session() {
    let running = start(MemoryStorage::new()).await;
    let mut older = enter(running.login, "ayla").await;

    let _newer = enter(running.login, "ayla").await;

    older.expect(ServerOpcode::LogoutAck).await;
    assert!(older.is_dropped().await);
    assert!(running.state.directory().is_online("ayla"));
}

#[tokio::test]
async fn test_older_session_closing_keeps_newer_redirect() {
    let running = start(MemoryStorage::new()).await;
    let older = enter(running.login, "ayla").await;
    let fresh = handoff(running.login, "ayla").await;

    drop(older);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(running.state.redirects().contains("ayla"));

    let world = SocketAddr::from((fresh.address, fresh.port));
    let mut newer = TestClient::redeem(world, &fresh.credentials).await;
    newer.expect(ServerOpcode::Location).await;
    assert!(running.state.directory().is_online("ayla"));
}

#[tokio::test]
async fn test_leave_game_back_to_login_issues_transfer() {
    let running = start(MemoryStorage::new()).await;
    let mut client = enter(running.login, "ayla").await;

    client.send(&LeaveGame { kind: 0 }).await;
    let redirect = Redirect::parse(client.expect(ServerOpcode::Redirect).await).unwrap();

    assert_eq!(redirect.kind, RedirectKind::Transfer);
    assert_eq!(redirect.port, running.login.port());
    assert!(client.is_dropped().await);
    assert!(running.state.redirects().contains("ayla"));

    // The login role takes the transfer, and the stored character keeps
    // its position.
    let mut back = TestClient::redeem(running.login, &redirect.credentials).await;
    back.send(&Heartbeat { value: 0 }).await;
    back.expect(ServerOpcode::Ack).await;
    assert!(running.state.storage().get("ayla").await.is_some());
}

// =========================================================================
// World
// =========================================================================

#[tokio::test]
async fn test_dialog_accept_quest_then_next_closes_and_saves() {
    let running = start(MemoryStorage::new()).await;
    let mut client = enter(running.login, "ayla").await;

    client.send(&Click { kind: 1, serial: 100 }).await;
    let first = DialogView::parse(client.expect(ServerOpcode::Dialog).await).unwrap();
    assert_eq!(first.step, 1);
    assert_eq!(first.answers, vec!["I'll help".to_string(), "close".to_string()]);

    client
        .send(&MenuResponse {
            serial: 100,
            answer: 1,
            input: None,
        })
        .await;
    let second = DialogView::parse(client.expect(ServerOpcode::Dialog).await).unwrap();
    assert_eq!(second.step, 2);

    client
        .send(&DialogResponse {
            serial: 100,
            script_id: 1,
            step: 1,
            input: None,
        })
        .await;
    let closed = DialogView::parse(client.expect(ServerOpcode::Dialog).await).unwrap();
    assert!(closed.is_close());

    let saved = running.state.storage().get("ayla").await.unwrap();
    assert_eq!(saved.quests, vec!["rats".to_string()]);
}

#[tokio::test]
async fn test_world_map_click_moves_to_portal_destination() {
    let running = start(MemoryStorage::new()).await;
    let mut client = enter(running.login, "ayla").await;

    // (3, 3) → (4, 3) is the world map warp.
    client.send(&Walk { direction: 1 }).await;
    let descriptor =
        PortalDescriptor::parse(client.expect(ServerOpcode::PortalDescriptor).await).unwrap();
    assert_eq!(descriptor.name, "field001");
    assert_eq!(descriptor.destinations[0].area_id, 2);

    client.send(&WorldMapClick { area_id: 2 }).await;
    client.expect(ServerOpcode::MapLoaded).await;
    let location = Location::parse(client.expect(ServerOpcode::Location).await).unwrap();

    assert_eq!(location, Location { x: 5, y: 6 });
}

#[tokio::test]
async fn test_board_post_persist_failure_reported_and_kept_in_memory() {
    let running = start(BrokenBoards::default()).await;
    let mut client = enter(running.login, "ayla").await;

    client
        .send(&BoardRequest::Post {
            board: 1,
            subject: "Rats".into(),
            body: "Cellar is full of them.".into(),
        })
        .await;
    let outcome = BoardResponse::parse(client.expect(ServerOpcode::BoardResult).await).unwrap();
    assert!(matches!(outcome, BoardResponse::Outcome { success: false, .. }));

    client.send(&BoardRequest::ReadBoard { board: 1 }).await;
    let listing = BoardResponse::parse(client.expect(ServerOpcode::BoardResult).await).unwrap();
    let BoardResponse::Posts { posts, .. } = listing else {
        panic!("expected a post listing, got {listing:?}");
    };
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].subject, "Rats");
}

#[tokio::test]
async fn test_board_mail_to_unknown_player_fails() {
    let running = start(MemoryStorage::new()).await;
    let mut client = enter(running.login, "ayla").await;

    client
        .send(&BoardRequest::SendMail {
            board: 0,
            to: "nobody".into(),
            subject: "Hi".into(),
            body: "Hello?".into(),
        })
        .await;
    let outcome = BoardResponse::parse(client.expect(ServerOpcode::BoardResult).await).unwrap();

    assert!(matches!(outcome, BoardResponse::Outcome { success: false, .. }));
}
