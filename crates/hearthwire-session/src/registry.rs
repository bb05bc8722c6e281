//! The redirect registry: process-wide store of pending handoffs.
//!
//! Connection tasks on both roles touch this map, so it is guarded by
//! its own mutex and exposes only whole operations. Callers never see
//! the map itself, and every read-then-write happens under one lock
//! acquisition.
//!
//! # Concurrency note
//!
//! The lock is a `std::sync::Mutex`, not a Tokio one: no critical
//! section awaits anything, so holding it never blocks the runtime. A
//! poisoned lock is recovered rather than propagated, since every
//! critical section leaves the map consistent.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use hearthwire_protocol::RedirectCredentials;

use crate::{RedirectToken, SessionConfig, SessionError, TokenId};

/// Pending redirects keyed by lowercased username.
///
/// ## Lifecycle
///
/// ```text
/// insert() ──→ [pending] ──→ consume_if_present() ──→ admitted
///                  │
///                  ├──→ remove()          (teardown, explicit cancel)
///                  └──→ sweep_expired()   (TTL elapsed)
/// ```
///
/// At most one token per username is live. Inserting a second one
/// supersedes the first.
#[derive(Debug)]
pub struct RedirectRegistry {
    tokens: Mutex<HashMap<String, RedirectToken>>,
    config: SessionConfig,
}

impl RedirectRegistry {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            tokens: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, RedirectToken>> {
        self.tokens
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stores `token`, superseding any token already pending for the
    /// same username. Returns the superseded token.
    pub fn insert(&self, token: RedirectToken) -> Option<RedirectToken> {
        let key = token.username().to_ascii_lowercase();
        let serial = token.serial();
        let kind = token.kind;

        let previous = self.lock().insert(key, token);

        if let Some(old) = &previous {
            tracing::debug!(
                username = %old.username(),
                old_serial = %old.serial(),
                "superseded pending redirect"
            );
        }
        tracing::debug!(%serial, %kind, "redirect issued");
        previous
    }

    /// Redeems the token matching `claim`, removing it in the same
    /// critical section as the check.
    ///
    /// A second call with the same claim finds nothing. A mismatched
    /// claim leaves the token in place, so a guess at someone's
    /// username cannot burn their handoff.
    ///
    /// # Errors
    /// - [`SessionError::NoPendingRedirect`]: nothing pending for the
    ///   username
    /// - [`SessionError::TokenExpired`]: pending but past its TTL (the
    ///   token is removed)
    /// - [`SessionError::CredentialMismatch`]: serial, salt or seed
    ///   differ
    pub fn consume_if_present(
        &self,
        claim: &RedirectCredentials,
    ) -> Result<RedirectToken, SessionError> {
        self.consume_at(claim, Instant::now())
    }

    fn consume_at(
        &self,
        claim: &RedirectCredentials,
        now: Instant,
    ) -> Result<RedirectToken, SessionError> {
        let key = claim.username.to_ascii_lowercase();
        let mut tokens = self.lock();

        let Some(pending) = tokens.get(&key) else {
            return Err(SessionError::NoPendingRedirect(claim.username.clone()));
        };

        if pending.is_expired(now, self.config.redirect_ttl()) {
            tokens.remove(&key);
            return Err(SessionError::TokenExpired(claim.username.clone()));
        }

        if !pending.matches(claim) {
            return Err(SessionError::CredentialMismatch(
                claim.username.clone(),
            ));
        }

        tokens
            .remove(&key)
            .ok_or_else(|| SessionError::NoPendingRedirect(claim.username.clone()))
    }

    /// Drops whatever is pending for `username`.
    pub fn remove(&self, username: &str) -> Option<RedirectToken> {
        self.lock().remove(&username.to_ascii_lowercase())
    }

    /// Drops the token pending for `username` only if it is the one
    /// identified by `id`. A token minted since then (a newer login of
    /// the same account) stays put.
    pub fn remove_issued(&self, username: &str, id: TokenId) -> Option<RedirectToken> {
        let key = username.to_ascii_lowercase();
        let mut tokens = self.lock();
        match tokens.get(&key) {
            Some(token) if token.id == id => tokens.remove(&key),
            _ => None,
        }
    }

    /// Removes and returns every token past its TTL.
    pub fn sweep_expired(&self) -> Vec<RedirectToken> {
        self.sweep_at(Instant::now())
    }

    fn sweep_at(&self, now: Instant) -> Vec<RedirectToken> {
        let ttl = self.config.redirect_ttl();
        let mut tokens = self.lock();

        let expired: Vec<String> = tokens
            .iter()
            .filter(|(_, token)| token.is_expired(now, ttl))
            .map(|(key, _)| key.clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|key| tokens.remove(&key))
            .collect()
    }

    /// Returns `true` if a token is pending for `username`.
    pub fn contains(&self, username: &str) -> bool {
        self.lock().contains_key(&username.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl Default for RedirectRegistry {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

// =========================================================================
// Tests
// =========================================================================
