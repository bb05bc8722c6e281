//! # Hearthwire
//!
//! Server for a tile-based online game client speaking a binary,
//! partly encrypted TCP protocol.
//!
//! One process runs two roles. The **login** role checks credentials
//! and hands the client off with a one-time redirect; the **world** role
//! admits redirected clients and runs their session: movement, combat,
//! NPC dialogs, boards, and groups.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hearthwire::prelude::*;
//!
//! // Implement Authenticator for your account store, then:
//! // let server = HearthwireServerBuilder::new()
//! //     .config(ServerConfig::from_json_file("server.json")?)
//! //     .catalog(TemplateCatalog::from_json_file("catalog.json")?)
//! //     .build(my_auth, MemoryStorage::new())
//! //     .await?;
//! // server.run().await
//! ```

pub mod catalog;
pub mod client;
pub mod config;
mod connection;
mod dispatcher;
mod error;
mod handlers;
pub mod registry;
pub mod server;
pub mod storage;
pub mod telemetry;

pub use dispatcher::{Flow, HandlerOutcome};
pub use error::{HandlerError, HearthwireError};
pub use handlers::standard_checkpoints;

/// Convenience re-exports for common usage.
///
/// ```rust
/// use hearthwire::prelude::*;
/// ```
pub mod prelude {
    pub use crate::catalog::TemplateCatalog;
    pub use crate::client::{Client, PendingAction, ServerRole};
    pub use crate::config::ServerConfig;
    pub use crate::server::{HearthwireServer, HearthwireServerBuilder, ServerState};
    pub use crate::storage::{ActorRecord, MemoryStorage, Storage, StorageError};
    pub use crate::{HandlerError, HearthwireError};

    pub use hearthwire_dialog::{CheckpointError, CheckpointInput};
    pub use hearthwire_protocol::{CipherMode, CipherParameters};
    pub use hearthwire_session::{Authenticator, Serial, SessionConfig, SessionError};
}
