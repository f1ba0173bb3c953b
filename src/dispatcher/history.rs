//! # Command History
//!
//! Every command the dispatcher has accepted, keyed by id. Each entry sits
//! behind its own lock so lifecycle updates on one command never block
//! readers of another.
//!
//! With a retention limit set, the oldest terminal commands are evicted in
//! insertion order once the limit is exceeded. Pending and executing
//! commands are never evicted, so the history may temporarily hold more
//! than the limit when that many commands are in flight.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::models::Command;

/// Shared handle to one command's authoritative state
pub type CommandEntry = Arc<RwLock<Command>>;

#[derive(Debug)]
pub struct CommandHistory {
    entries: DashMap<Uuid, CommandEntry>,
    order: Mutex<VecDeque<Uuid>>,
    retention_limit: Option<usize>,
}

impl CommandHistory {
    pub fn new(retention_limit: Option<usize>) -> Self {
        Self {
            entries: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            retention_limit,
        }
    }

    pub fn retention_limit(&self) -> Option<usize> {
        self.retention_limit
    }

    /// Store a command and return the shared entry. `None` when the id is
    /// already held; the existing entry is left untouched.
    pub fn insert(&self, command: Command) -> Option<CommandEntry> {
        let id = command.id();
        let entry = match self.entries.entry(id) {
            Entry::Occupied(_) => return None,
            Entry::Vacant(slot) => {
                let entry = Arc::new(RwLock::new(command));
                slot.insert(entry.clone());
                entry
            }
        };
        // Shard lock is released before `order` is taken
        if self.retention_limit.is_some() {
            self.order.lock().push_back(id);
        }
        Some(entry)
    }

    pub fn entry(&self, id: &Uuid) -> Option<CommandEntry> {
        self.entries.get(id).map(|e| e.value().clone())
    }

    /// Snapshot of a command
    pub fn get(&self, id: &Uuid) -> Option<Command> {
        self.entry(id).map(|e| e.read().clone())
    }

    /// Drop a command that never entered execution
    pub fn remove(&self, id: &Uuid) -> Option<Command> {
        // The stale id left in `order` is skipped during eviction
        self.entries
            .remove(id)
            .map(|(_, entry)| entry.read().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Count commands matching a predicate on their current state
    pub fn count_where(&self, predicate: impl Fn(&Command) -> bool) -> usize {
        self.entries
            .iter()
            .filter(|e| predicate(&e.value().read()))
            .count()
    }

    /// Evict the oldest terminal commands while over the retention limit
    pub fn enforce_retention(&self) -> usize {
        let Some(limit) = self.retention_limit else {
            return 0;
        };

        let mut order = self.order.lock();
        if self.entries.len() <= limit && order.len() <= limit {
            return 0;
        }

        let mut evicted = 0;
        let mut kept = VecDeque::with_capacity(order.len());
        while let Some(id) = order.pop_front() {
            let terminal = match self.entries.get(&id) {
                Some(entry) => entry.value().read().status().is_terminal(),
                // Already removed; forget the id
                None => continue,
            };
            if terminal && self.entries.len() > limit {
                self.entries.remove(&id);
                evicted += 1;
            } else {
                kept.push_back(id);
            }
        }
        *order = kept;

        if evicted > 0 {
            debug!(
                evicted = evicted,
                retained = self.entries.len(),
                limit = limit,
                "🧹 HISTORY: Evicted terminal commands"
            );
        }
        evicted
    }
}
