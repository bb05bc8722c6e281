//! Redirect tokens: the one-time credential that moves a session from
//! one endpoint to another.
//!
//! A token records what the client was told in its `Redirect` packet
//! (serial, username, salt, seed), where it was sent, and when. The
//! receiving endpoint admits the client only if it presents the same
//! four values while the token is still live.

use std::fmt;
use std::net::SocketAddrV4;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use hearthwire_protocol::{CipherParameters, RedirectCredentials, RedirectKind};
use rand::Rng;
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Serial
// ---------------------------------------------------------------------------

/// A player's object serial. Nonzero; zero means "no object" on the
/// wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Serial(pub u32);

impl Serial {
    /// Draws a fresh random nonzero serial.
    pub fn random() -> Self {
        let mut rng = rand::rng();
        Self(rng.random_range(1..=u32::MAX))
    }
}

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for redirect handling.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Seconds an issued redirect stays redeemable.
    ///
    /// Default: 30. A client normally reconnects within a second or
    /// two; anything older is treated as abandoned.
    pub redirect_ttl_secs: u64,

    /// Seconds between sweeps of expired redirects.
    pub sweep_interval_secs: u64,
}

impl SessionConfig {
    pub fn redirect_ttl(&self) -> Duration {
        Duration::from_secs(self.redirect_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            redirect_ttl_secs: 30,
            sweep_interval_secs: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// RedirectToken
// ---------------------------------------------------------------------------

/// Process-unique identity of one issued token.
///
/// Serials and cipher parameters repeat across logins of the same
/// account, so they cannot tell two tokens apart. This can.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenId(u64);

impl TokenId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "token-{}", self.0)
    }
}

/// A pending handoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectToken {
    pub id: TokenId,
    pub credentials: RedirectCredentials,
    /// Endpoint the client was told to reconnect to.
    pub target: SocketAddrV4,
    pub kind: RedirectKind,
    pub issued_at: Instant,
}

impl RedirectToken {
    /// Mints a token for `username` carrying the cipher parameters the
    /// client must keep using after it reconnects.
    pub fn issue(
        serial: Serial,
        username: impl Into<String>,
        cipher: &CipherParameters,
        target: SocketAddrV4,
        kind: RedirectKind,
    ) -> Self {
        Self {
            id: TokenId::next(),
            credentials: RedirectCredentials {
                serial: serial.0,
                username: username.into(),
                salt: cipher.salt.clone(),
                seed: cipher.seed,
            },
            target,
            kind,
            issued_at: Instant::now(),
        }
    }

    pub fn username(&self) -> &str {
        &self.credentials.username
    }

    pub fn serial(&self) -> Serial {
        Serial(self.credentials.serial)
    }

    /// Returns `true` once `ttl` has fully elapsed since issue.
    pub fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.issued_at) >= ttl
    }

    /// Whether `claim` carries exactly the values this token was issued
    /// with. The username compares case-insensitively; everything else
    /// must be identical.
    pub fn matches(&self, claim: &RedirectCredentials) -> bool {
        self.credentials.serial == claim.serial
            && self.credentials.seed == claim.seed
            && self.credentials.salt == claim.salt
            && self
                .credentials
                .username
                .eq_ignore_ascii_case(&claim.username)
    }
}
