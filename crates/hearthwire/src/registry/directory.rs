//! Who is in the world right now.
//!
//! The directory maps each username to the connection playing it. A
//! second admission for the same username kicks the first connection
//! through a oneshot channel its loop is waiting on.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use hearthwire_transport::ConnectionId;
use tokio::sync::oneshot;

#[derive(Debug)]
struct Entry {
    conn_id: ConnectionId,
    kick: oneshot::Sender<()>,
}

#[derive(Debug, Default)]
pub struct ClientDirectory {
    entries: Mutex<HashMap<String, Entry>>,
}

impl ClientDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers `conn_id` as the live session for `username`.
    ///
    /// Any other connection holding the name is signalled to drop. The
    /// returned receiver fires when a later claim displaces this one.
    pub fn claim(
        &self,
        username: &str,
        conn_id: ConnectionId,
    ) -> oneshot::Receiver<()> {
        let (kick, kicked) = oneshot::channel();
        let previous = self
            .lock()
            .insert(username.to_ascii_lowercase(), Entry { conn_id, kick });

        if let Some(old) = previous {
            if old.conn_id != conn_id {
                tracing::warn!(
                    %username,
                    old = %old.conn_id,
                    new = %conn_id,
                    "duplicate login; dropping older session"
                );
                // The old loop may already be gone.
                let _ = old.kick.send(());
            }
        }
        kicked
    }

    /// Removes `username` if `conn_id` still holds it.
    pub fn release(&self, username: &str, conn_id: ConnectionId) -> bool {
        let mut entries = self.lock();
        let key = username.to_ascii_lowercase();
        match entries.get(&key) {
            Some(entry) if entry.conn_id == conn_id => {
                entries.remove(&key);
                true
            }
            _ => false,
        }
    }

    pub fn is_online(&self, username: &str) -> bool {
        self.lock().contains_key(&username.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
