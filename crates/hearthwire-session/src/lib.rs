//! Session handoff for Hearthwire.
//!
//! A player logs in on one endpoint and plays on another. This crate
//! owns the pieces that make that move safe:
//!
//! 1. **Authentication**: checking a username and password
//!    ([`Authenticator`] trait)
//! 2. **Redirect tokens**: the one-time credential a client carries to
//!    the next endpoint ([`RedirectToken`])
//! 3. **The registry**: where pending tokens wait until they are
//!    redeemed exactly once or expire ([`RedirectRegistry`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Server (above)        ← login handler inserts, enter-world handler consumes
//!     ↕
//! Session (this crate)  ← pending handoffs and their TTL
//!     ↕
//! Protocol (below)      ← RedirectCredentials, RedirectKind, CipherParameters
//! ```

mod auth;
mod error;
mod registry;
mod token;

pub use auth::Authenticator;
pub use error::SessionError;
pub use registry::RedirectRegistry;
pub use token::{RedirectToken, Serial, SessionConfig, TokenId};
