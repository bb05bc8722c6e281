//! A small playable realm: one village, a field reachable over the
//! world map, an elder with a quest, and a notice board.
//!
//! ```text
//! cargo run -p realm                  # defaults: login :2610, world :2611
//! cargo run -p realm -- server.json   # settings from a file
//! ```
//!
//! Accounts are hard-coded below. Characters live in memory and are
//! gone when the process exits.

use std::collections::HashMap;

use hearthwire::prelude::*;
use hearthwire::telemetry;

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// Fixed accounts: username → (password, serial).
struct DemoAccounts {
    accounts: HashMap<&'static str, (&'static str, Serial)>,
}

impl DemoAccounts {
    fn new() -> Self {
        let accounts = HashMap::from([
            ("ayla", ("lantern", Serial(1001))),
            ("bren", ("anvil", Serial(1002))),
            ("cole", ("thistle", Serial(1003))),
        ]);
        Self { accounts }
    }
}

impl Authenticator for DemoAccounts {
    async fn authenticate(&self, username: &str, password: &str) -> Result<Serial, SessionError> {
        let key = username.to_ascii_lowercase();
        match self.accounts.get(key.as_str()) {
            Some((expected, serial)) if *expected == password => Ok(*serial),
            Some(_) => Err(SessionError::AuthFailed(format!("wrong password for {username}"))),
            None => Err(SessionError::AuthFailed(format!("no account {username}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

const CATALOG: &str = r#"{
    "spawn": { "map_id": 1, "x": 8, "y": 8 },
    "maps": [
        { "id": 1, "name": "Emberfold", "width": 24, "height": 24,
          "npcs": [
            { "serial": 500, "name": "Elder Maren", "x": 10, "y": 7, "dialog": "elder" }
          ],
          "popups": [
            { "serial": 501, "x": 12, "y": 12, "dialog": "well" }
          ],
          "warps": [
            { "x": 23, "y": 8, "target": { "kind": "world_map", "field": 1 } }
          ] },
        { "id": 2, "name": "Greyfield", "width": 40, "height": 40,
          "npcs": [
            { "serial": 600, "name": "Old Guard", "x": 3, "y": 18, "dialog": "veteran" }
          ],
          "warps": [
            { "x": 0, "y": 20, "target": { "kind": "map", "map_id": 1, "x": 22, "y": 8 } }
          ] }
    ],
    "world_maps": [
        { "field": 1, "portals": [
            { "name": "Emberfold", "screen_x": 120, "screen_y": 80,
              "map_id": 1, "dest_x": 22, "dest_y": 8 },
            null,
            { "name": "Greyfield", "screen_x": 260, "screen_y": 140,
              "map_id": 2, "dest_x": 1, "dest_y": 20 }
        ] }
    ],
    "skills": [
        { "key": "cleave", "cooldown_secs": 6, "animation": 12 }
    ],
    "dialogs": [
        { "key": "elder", "start": 1, "steps": [
            { "id": 1, "prompt": "Rats have taken the granary. Will you clear them out?",
              "answers": [
                { "text": "I'll do it", "target": 2,
                  "checkpoint": { "name": "GiveQuest", "value": "granary_rats" } },
                { "text": "I cleared them", "target": 3,
                  "checkpoint": { "name": "CompleteQuest", "value": "granary_rats" } },
                { "text": "close", "target": 1 }
              ] },
            { "id": 2, "prompt": "Greyfield lies east, past the old gate.",
              "answers": [ { "text": "next", "target": 4 } ] },
            { "id": 3, "prompt": "Well done. Take this for your trouble.",
              "answers": [
                { "text": "next", "target": 4,
                  "checkpoint": { "name": "GiveGold", "value": "50" } }
              ] },
            { "id": 4, "prompt": "Safe travels." }
        ] },
        { "key": "well", "start": 1, "steps": [
            { "id": 1, "prompt": "The well is deep. Toss a coin?",
              "answers": [
                { "text": "Toss a coin", "target": 2,
                  "checkpoint": { "name": "TakeGold", "value": "1" } },
                { "text": "close", "target": 1 }
              ] },
            { "id": 2, "prompt": "It splashes somewhere far below." }
        ] },
        { "key": "veteran", "start": 1, "steps": [
            { "id": 1, "prompt": "Only seasoned hands may pass.",
              "answers": [
                { "text": "Let me through", "target": 2,
                  "checkpoint": { "name": "MinLevel", "value": "10" } },
                { "text": "close", "target": 1 }
              ] },
            { "id": 2, "prompt": "Go on, then.",
              "answers": [
                { "text": "next", "target": 3,
                  "checkpoint": { "name": "Warp", "value": "2,30,30" } }
              ] },
            { "id": 3, "prompt": "" }
        ] }
    ],
    "boards": [
        { "id": 1, "name": "Emberfold Notices" },
        { "id": 2, "name": "Trade" }
    ]
}"#;

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init("info,hearthwire=debug");

    let config = match std::env::args().nth(1) {
        Some(path) => ServerConfig::from_json_file(path)?,
        None => ServerConfig::default(),
    };

    let server = HearthwireServerBuilder::new()
        .config(config)
        .catalog(TemplateCatalog::from_json_str(CATALOG)?)
        .checkpoint("MinLevel", |client: &mut Client, args: CheckpointInput<'_>| {
            let needed: u32 = args.value.parse().map_err(|_| CheckpointError::Failed {
                name: "MinLevel".into(),
                reason: format!("bad level {:?}", args.value),
            })?;
            Ok(client.actor().is_some_and(|a| a.level >= needed))
        })
        .build(DemoAccounts::new(), MemoryStorage::new())
        .await?;

    tracing::info!(
        login = %server.login_addr()?,
        world = %server.world_addr()?,
        "realm is open"
    );
    server.run().await?;
    Ok(())
}
