//! Warp bookkeeping: which players are mid-transit between maps.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Mutex, MutexGuard};

use hearthwire_transport::ConnectionId;

/// Serials currently travelling, and the connection moving each one.
///
/// A world-map transfer suspends for a while; a second click during
/// that pause must not start a second transfer. Serials repeat across
/// logins of one account, so every release names its connection.
#[derive(Debug, Default)]
pub struct WarpLedger {
    in_transit: Mutex<HashMap<u32, ConnectionId>>,
}

/// Proof that a serial is in transit. Dropping it ends the transit, so
/// the entry is released on every exit path, including cancellation.
#[derive(Debug)]
pub struct WarpPass<'a> {
    ledger: &'a WarpLedger,
    serial: u32,
    owner: ConnectionId,
}

impl WarpLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u32, ConnectionId>> {
        self.in_transit
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Marks `serial` as travelling for `owner`. `None` if it already
    /// is, whoever moves it.
    pub fn begin(&self, serial: u32, owner: ConnectionId) -> Option<WarpPass<'_>> {
        match self.lock().entry(serial) {
            Entry::Occupied(_) => return None,
            Entry::Vacant(slot) => {
                slot.insert(owner);
            }
        }
        Some(WarpPass {
            ledger: self,
            serial,
            owner,
        })
    }

    pub fn is_in_transit(&self, serial: u32) -> bool {
        self.lock().contains_key(&serial)
    }

    /// Clears the marker if `owner` set it.
    pub fn release(&self, serial: u32, owner: ConnectionId) -> bool {
        let mut in_transit = self.lock();
        match in_transit.get(&serial) {
            Some(held_by) if *held_by == owner => in_transit.remove(&serial).is_some(),
            _ => false,
        }
    }
}

impl Drop for WarpPass<'_> {
    fn drop(&mut self) {
        self.ledger.release(self.serial, self.owner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OLD: ConnectionId = ConnectionId::new(1);
    const NEW: ConnectionId = ConnectionId::new(2);

    #[test]
    fn test_begin_twice_second_refused() {
        let ledger = WarpLedger::new();

        let first = ledger.begin(7, OLD);
        let second = ledger.begin(7, NEW);

        assert!(first.is_some());
        assert!(second.is_none());
    }

    #[test]
    fn test_dropping_pass_releases_serial() {
        let ledger = WarpLedger::new();
        {
            let _pass = ledger.begin(7, OLD);
            assert!(ledger.is_in_transit(7));
        }
        assert!(!ledger.is_in_transit(7));
        assert!(ledger.begin(7, OLD).is_some());
    }

    #[test]
    fn test_serials_are_independent() {
        let ledger = WarpLedger::new();
        let _a = ledger.begin(1, OLD);
        assert!(ledger.begin(2, OLD).is_some());
    }

    #[test]
    fn test_release_by_other_connection_keeps_marker() {
        let ledger = WarpLedger::new();
        let _pass = ledger.begin(7, NEW);

        assert!(!ledger.release(7, OLD));
        assert!(ledger.is_in_transit(7));
        assert!(ledger.release(7, NEW));
    }
}
