//! Key Gate Module
//!
//! Per-key gates that serialize recomputation, so at most one caller runs the
//! underlying operation for a given key at a time.
//!
//! A gate lives in the map only while some caller holds a ticket for it.
//! The last ticket to drop removes it, including when the holder is
//! cancelled or unwinds from a panic.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::cache::CacheKey;

// == Key Gates ==
/// Map of in-flight keys to their gate.
///
/// `G` is the lock callers contend on: `tokio::sync::Mutex<()>` for async
/// wrappers, `std::sync::Mutex<()>` for blocking ones.
#[derive(Debug)]
pub struct KeyGates<G> {
    gates: Mutex<HashMap<CacheKey, Arc<G>>>,
}

impl<G: Default> KeyGates<G> {
    /// Creates an empty gate map.
    pub fn new() -> Self {
        Self {
            gates: Mutex::new(HashMap::new()),
        }
    }

    // == Acquire ==
    /// Returns a ticket for `key`'s gate, creating the gate if needed.
    ///
    /// The ticket does not lock the gate; callers lock `ticket.gate()`.
    pub fn acquire(&self, key: &CacheKey) -> GateTicket<'_, G> {
        let gate = self
            .lock()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(G::default()))
            .clone();

        GateTicket {
            owner: self,
            key: key.clone(),
            gate,
        }
    }
}

impl<G> KeyGates<G> {
    /// Number of keys that currently have a gate.
    pub fn in_flight(&self) -> usize {
        self.lock().len()
    }

    // Only map bookkeeping happens under this lock, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, Arc<G>>> {
        self.gates.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<G: Default> Default for KeyGates<G> {
    fn default() -> Self {
        Self::new()
    }
}

// == Gate Ticket ==
/// A caller's claim on one key's gate.
pub struct GateTicket<'a, G> {
    owner: &'a KeyGates<G>,
    key: CacheKey,
    gate: Arc<G>,
}

impl<G> GateTicket<'_, G> {
    /// The gate shared by every caller of this key.
    pub fn gate(&self) -> &G {
        &self.gate
    }
}

impl<G> Drop for GateTicket<'_, G> {
    fn drop(&mut self) {
        let mut gates = self.owner.lock();
        // Tickets are only cloned under the map lock, so a count of two
        // (the map plus this ticket) means nobody else is waiting.
        if Arc::strong_count(&self.gate) == 2 {
            if let Some(current) = gates.get(&self.key) {
                if Arc::ptr_eq(current, &self.gate) {
                    gates.remove(&self.key);
                }
            }
        }
    }
}
