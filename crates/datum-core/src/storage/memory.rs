//! In-memory action store built on sharded concurrent maps.
//!
//! Writers touching different chains usually land on different shards and
//! proceed in parallel. An action is inserted after its entry and before any
//! index row that names it, so every hash reachable through an index
//! resolves.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::{DatumError, DatumResult};
use crate::storage::ActionStore;
use crate::types::{sort_actions, Action, ActionBody, ActionHash, AgentPubKey, Datum, EntryHash};

/// Volatile action store.
#[derive(Debug, Default)]
pub struct MemoryActionStore {
    entries: DashMap<EntryHash, Datum>,
    actions: DashMap<ActionHash, Action>,
    /// previous_action_hash -> updates
    successors: DashMap<ActionHash, Vec<ActionHash>>,
    /// original_action_hash -> updates
    updates: DashMap<ActionHash, Vec<ActionHash>>,
    /// deletes_action_hash -> deletes
    deletes: DashMap<ActionHash, Vec<ActionHash>>,
    last_seqs: DashMap<AgentPubKey, u32>,
}

impl MemoryActionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn resolve(&self, index: &DashMap<ActionHash, Vec<ActionHash>>, key: &ActionHash) -> Vec<Action> {
        let hashes = index.get(key).map(|h| h.clone()).unwrap_or_default();
        let mut actions: Vec<Action> = hashes
            .iter()
            .filter_map(|h| self.actions.get(h).map(|a| a.clone()))
            .collect();
        sort_actions(&mut actions);
        actions
    }
}

impl ActionStore for MemoryActionStore {
    fn append(&self, action: &Action, entry: Option<&Datum>) -> DatumResult<()> {
        match self.actions.entry(action.hash.clone()) {
            Entry::Occupied(_) => {
                return Err(DatumError::storage(format!(
                    "action '{}' already stored",
                    action.hash
                )))
            }
            Entry::Vacant(slot) => {
                // The entry lands while the slot is reserved, so it is never
                // written for a rejected append and always precedes its action.
                if let (Some(entry), Some(entry_hash)) = (entry, action.entry_hash()) {
                    self.entries
                        .entry(entry_hash.clone())
                        .or_insert_with(|| entry.clone());
                }
                slot.insert(action.clone());
            }
        }

        match &action.body {
            ActionBody::Create { .. } => {}
            ActionBody::Update {
                original_action_hash,
                previous_action_hash,
                ..
            } => {
                self.successors
                    .entry(previous_action_hash.clone())
                    .or_default()
                    .push(action.hash.clone());
                self.updates
                    .entry(original_action_hash.clone())
                    .or_default()
                    .push(action.hash.clone());
            }
            ActionBody::Delete {
                deletes_action_hash,
                ..
            } => {
                self.deletes
                    .entry(deletes_action_hash.clone())
                    .or_default()
                    .push(action.hash.clone());
            }
        }

        self.last_seqs
            .entry(action.author.clone())
            .and_modify(|seq| *seq = (*seq).max(action.action_seq))
            .or_insert(action.action_seq);

        Ok(())
    }

    fn get_action(&self, hash: &ActionHash) -> DatumResult<Option<Action>> {
        Ok(self.actions.get(hash).map(|a| a.clone()))
    }

    fn get_entry(&self, hash: &EntryHash) -> DatumResult<Option<Datum>> {
        Ok(self.entries.get(hash).map(|e| e.clone()))
    }

    fn successors(&self, previous: &ActionHash) -> DatumResult<Vec<Action>> {
        Ok(self.resolve(&self.successors, previous))
    }

    fn updates_for(&self, original: &ActionHash) -> DatumResult<Vec<Action>> {
        Ok(self.resolve(&self.updates, original))
    }

    fn deletes_for(&self, target: &ActionHash) -> DatumResult<Vec<Action>> {
        Ok(self.resolve(&self.deletes, target))
    }

    fn last_seq(&self, author: &AgentPubKey) -> DatumResult<Option<u32>> {
        Ok(self.last_seqs.get(author).map(|s| *s))
    }

    fn count_actions(&self) -> DatumResult<usize> {
        Ok(self.actions.len())
    }
}
