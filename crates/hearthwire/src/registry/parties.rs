//! Party (group) membership.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Largest party the client can display.
pub const MAX_PARTY_SIZE: usize = 13;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PartyError {
    #[error("you cannot group with yourself")]
    SelfInvite,

    #[error("{0} is already in a group")]
    AlreadyGrouped(String),

    #[error("your group is full")]
    Full,
}

#[derive(Debug, Default)]
struct Parties {
    next_id: u32,
    /// Party id → members in join order. Display names.
    members: HashMap<u32, Vec<String>>,
    /// Lowercased username → party id.
    membership: HashMap<String, u32>,
}

impl Parties {
    fn party_of(&self, username: &str) -> Option<u32> {
        self.membership.get(&username.to_ascii_lowercase()).copied()
    }

    fn roster(&self, party: u32) -> Vec<String> {
        self.members.get(&party).cloned().unwrap_or_default()
    }
}

/// Shared party table. Form, join and leave each run under one lock
/// acquisition.
#[derive(Debug, Default)]
pub struct PartyTable {
    inner: Mutex<Parties>,
}

impl PartyTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Parties> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Adds `member` to `leader`'s party, forming one if `leader` has
    /// none. Returns the roster afterwards.
    pub fn invite(
        &self,
        leader: &str,
        member: &str,
    ) -> Result<Vec<String>, PartyError> {
        if leader.eq_ignore_ascii_case(member) {
            return Err(PartyError::SelfInvite);
        }

        let mut parties = self.lock();
        if parties.party_of(member).is_some() {
            return Err(PartyError::AlreadyGrouped(member.to_string()));
        }

        let party = match parties.party_of(leader) {
            Some(id) => id,
            None => {
                parties.next_id += 1;
                let id = parties.next_id;
                parties.members.insert(id, vec![leader.to_string()]);
                parties.membership.insert(leader.to_ascii_lowercase(), id);
                id
            }
        };

        if parties.roster(party).len() >= MAX_PARTY_SIZE {
            return Err(PartyError::Full);
        }
        parties
            .members
            .entry(party)
            .or_default()
            .push(member.to_string());
        parties.membership.insert(member.to_ascii_lowercase(), party);

        Ok(parties.roster(party))
    }

    /// Removes `username` from its party. A party left with one member
    /// disbands. Returns the remaining roster, or `None` if `username`
    /// wasn't grouped.
    pub fn leave(&self, username: &str) -> Option<Vec<String>> {
        let mut parties = self.lock();
        let party = parties.membership.remove(&username.to_ascii_lowercase())?;

        let remaining = {
            let roster = parties.members.entry(party).or_default();
            roster.retain(|m| !m.eq_ignore_ascii_case(username));
            roster.clone()
        };

        if remaining.len() < 2 {
            parties.members.remove(&party);
            for last in &remaining {
                parties.membership.remove(&last.to_ascii_lowercase());
            }
            return Some(Vec::new());
        }
        Some(remaining)
    }

    /// The roster of `username`'s party; empty if ungrouped.
    pub fn members(&self, username: &str) -> Vec<String> {
        let parties = self.lock();
        parties
            .party_of(username)
            .map(|id| parties.roster(id))
            .unwrap_or_default()
    }
}
