//! Persistence of actor records and message boards.
//!
//! The server doesn't care where records live. It talks to a
//! [`Storage`] implementation; [`MemoryStorage`] is the in-process one
//! used by the demo and tests.

use std::collections::HashMap;
use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::registry::Board;

// ---------------------------------------------------------------------------
// ActorRecord
// ---------------------------------------------------------------------------

/// Status effects that stop a player from acting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Conditions {
    pub asleep: bool,
    pub frozen: bool,
    pub stunned: bool,
    pub paralyzed: bool,
}

impl Conditions {
    pub fn is_incapacitated(&self) -> bool {
        self.asleep || self.frozen || self.stunned || self.paralyzed
    }
}

/// A skill in one of the player's slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnedSkill {
    pub slot: u8,
    /// Key into the catalog's skill templates.
    pub key: String,
}

/// Everything persisted about a player character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorRecord {
    pub username: String,
    pub map_id: u16,
    pub x: u16,
    pub y: u16,
    #[serde(default)]
    pub direction: u8,
    pub level: u32,
    pub strength: i32,
    pub armor_class: i32,
    pub hp: u32,
    pub max_hp: u32,
    #[serde(default)]
    pub gold: u32,
    #[serde(default)]
    pub conditions: Conditions,
    #[serde(default)]
    pub skills: Vec<LearnedSkill>,
    #[serde(default)]
    pub quests: Vec<String>,
}

impl ActorRecord {
    pub const MAX_ARMOR_CLASS: i32 = 200;
    pub const MAX_LEVEL: u32 = 99;

    /// A fresh level-one character on `map_id`.
    pub fn new(username: impl Into<String>, map_id: u16, x: u16, y: u16) -> Self {
        Self {
            username: username.into(),
            map_id,
            x,
            y,
            direction: 2,
            level: 1,
            strength: 3,
            armor_class: 0,
            hp: 100,
            max_hp: 100,
            gold: 0,
            conditions: Conditions::default(),
            skills: Vec::new(),
            quests: Vec::new(),
        }
    }

    /// Rejects records no legitimate play could have produced.
    ///
    /// # Errors
    /// A description of the first bound that failed.
    pub fn check_sanity(&self) -> Result<(), String> {
        if self.strength <= 0 {
            return Err(format!("strength {} is not positive", self.strength));
        }
        if self.armor_class > Self::MAX_ARMOR_CLASS {
            return Err(format!("armor class {} exceeds {}", self.armor_class, Self::MAX_ARMOR_CLASS));
        }
        if self.level > Self::MAX_LEVEL {
            return Err(format!("level {} exceeds {}", self.level, Self::MAX_LEVEL));
        }
        Ok(())
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    pub fn has_quest(&self, quest: &str) -> bool {
        self.quests.iter().any(|q| q == quest)
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Errors from the persistence service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("could not encode record: {0}")]
    Encoding(String),
}

/// Loads and saves what must outlive a connection.
///
/// Implementations are shared by every connection task, so they must be
/// `Send + Sync`, and the futures they return must be `Send`.
pub trait Storage: Send + Sync + 'static {
    /// Returns `Ok(None)` if no character exists for `username`.
    fn load(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Option<ActorRecord>, StorageError>> + Send;

    fn save(
        &self,
        record: &ActorRecord,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn load_boards(
        &self,
    ) -> impl Future<Output = Result<Vec<Board>, StorageError>> + Send;

    fn save_boards(
        &self,
        boards: &[Board],
    ) -> impl Future<Output = Result<(), StorageError>> + Send;
}

/// Keeps everything in memory. Records are keyed by lowercased
/// username.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    actors: Mutex<HashMap<String, ActorRecord>>,
    boards: Mutex<Vec<Board>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with existing characters.
    pub fn with_actors(records: impl IntoIterator<Item = ActorRecord>) -> Self {
        let actors = records
            .into_iter()
            .map(|r| (r.username.to_ascii_lowercase(), r))
            .collect();
        Self {
            actors: Mutex::new(actors),
            boards: Mutex::new(Vec::new()),
        }
    }

    /// A copy of the stored record, for inspection.
    pub async fn get(&self, username: &str) -> Option<ActorRecord> {
        self.actors
            .lock()
            .await
            .get(&username.to_ascii_lowercase())
            .cloned()
    }
}

impl Storage for MemoryStorage {
    async fn load(&self, username: &str) -> Result<Option<ActorRecord>, StorageError> {
        Ok(self.get(username).await)
    }

    async fn save(&self, record: &ActorRecord) -> Result<(), StorageError> {
        self.actors
            .lock()
            .await
            .insert(record.username.to_ascii_lowercase(), record.clone());
        Ok(())
    }

    async fn load_boards(&self) -> Result<Vec<Board>, StorageError> {
        Ok(self.boards.lock().await.clone())
    }

    async fn save_boards(&self, boards: &[Board]) -> Result<(), StorageError> {
        *self.boards.lock().await = boards.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_sanity_fresh_record_passes() {
        assert!(ActorRecord::new("ayla", 1, 5, 5).check_sanity().is_ok());
    }

    #[test]
    fn test_check_sanity_bounds() {
        let mut weak = ActorRecord::new("ayla", 1, 5, 5);
        weak.strength = 0;
        let mut plated = ActorRecord::new("ayla", 1, 5, 5);
        plated.armor_class = 201;
        let mut ancient = ActorRecord::new("ayla", 1, 5, 5);
        ancient.level = 100;

        assert!(weak.check_sanity().is_err());
        assert!(plated.check_sanity().is_err());
        assert!(ancient.check_sanity().is_err());
    }

    #[test]
    fn test_conditions_any_flag_incapacitates() {
        assert!(!Conditions::default().is_incapacitated());
        assert!(
            Conditions {
                paralyzed: true,
                ..Conditions::default()
            }
            .is_incapacitated()
        );
    }

    #[tokio::test]
    async fn test_memory_storage_load_is_case_insensitive() {
        let storage = MemoryStorage::with_actors([ActorRecord::new("Ayla", 1, 5, 5)]);

        let loaded = storage.load("AYLA").await.unwrap();

        assert_eq!(loaded.map(|r| r.username), Some("Ayla".to_string()));
    }

    #[tokio::test]
    async fn test_memory_storage_save_then_load() {
        let storage = MemoryStorage::new();
        let mut record = ActorRecord::new("ayla", 1, 5, 5);
        record.gold = 40;

        storage.save(&record).await.unwrap();

        assert_eq!(storage.load("ayla").await.unwrap(), Some(record));
    }
}
