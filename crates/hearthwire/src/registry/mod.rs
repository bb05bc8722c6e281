//! Registries shared by every connection.
//!
//! Each one guards its own data with its own lock, sized to what it
//! protects. Only the board writer lock is held across an `.await`
//! (the storage save it serializes).
//!
//! | Registry | Lock | Touched by |
//! |---|---|---|
//! | [`BoardRegistry`] | `tokio::sync::Mutex` (cache, writer) | board handler |
//! | [`WarpLedger`] | `std::sync::Mutex` | world-map travel, teardown |
//! | [`PartyTable`] | `std::sync::Mutex` | group handler, teardown |
//! | [`ClientDirectory`] | `std::sync::Mutex` | enter-world, group invites, teardown |
//!
//! The redirect registry lives in `hearthwire-session`.

mod boards;
mod directory;
mod parties;
mod warps;

pub use boards::{Board, BoardError, BoardRegistry, MAIL_BOARD, Post};
pub use directory::ClientDirectory;
pub use parties::{MAX_PARTY_SIZE, PartyError, PartyTable};
pub use warps::{WarpLedger, WarpPass};
