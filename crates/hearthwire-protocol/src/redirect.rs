//! Fields shared by the `Redirect` and `EnterWorld` packets.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a session is being handed to another endpoint. Travels as a
/// one-character decimal string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RedirectKind {
    /// Fresh login handing off to the world.
    LoginHandoff,
    /// A live session moving between endpoints.
    Transfer,
}

impl RedirectKind {
    pub fn as_wire(self) -> &'static str {
        match self {
            Self::LoginHandoff => "1",
            Self::Transfer => "2",
        }
    }

    pub fn from_wire(text: &str) -> Option<Self> {
        match text.trim() {
            "1" => Some(Self::LoginHandoff),
            "2" => Some(Self::Transfer),
            _ => None,
        }
    }
}

impl fmt::Display for RedirectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoginHandoff => write!(f, "login-handoff"),
            Self::Transfer => write!(f, "transfer"),
        }
    }
}

/// The four values a redirect binds and a reconnecting client must
/// present unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectCredentials {
    pub serial: u32,
    pub username: String,
    pub salt: Vec<u8>,
    pub seed: u32,
}
