//! Durable storage and content-addressing layer.
//!
//! The [`VersionedRecordStore`](crate::store::VersionedRecordStore) owns the
//! chain semantics; an [`ActionStore`] only persists entries and actions and
//! answers the three reverse-index questions the chain walk needs.

mod memory;
mod sqlite;

pub use memory::MemoryActionStore;
pub use sqlite::SqliteActionStore;

use crate::error::DatumResult;
use crate::types::{Action, ActionHash, AgentPubKey, Datum, EntryHash};

/// Trait for action storage backends.
///
/// Every list returned by an index lookup is ordered ascending by
/// `(timestamp, hash)`.
pub trait ActionStore: Send + Sync {
    /// Persist `action` and, for creates and updates, its entry.
    ///
    /// Either the entry, the action and all index rows become visible
    /// together, or the call fails and nothing does. Appending a hash that
    /// already exists is an error.
    fn append(&self, action: &Action, entry: Option<&Datum>) -> DatumResult<()>;

    /// Get an action by hash.
    fn get_action(&self, hash: &ActionHash) -> DatumResult<Option<Action>>;

    /// Get an entry by hash.
    fn get_entry(&self, hash: &EntryHash) -> DatumResult<Option<Datum>>;

    /// Updates whose `previous_action_hash` is `previous`.
    fn successors(&self, previous: &ActionHash) -> DatumResult<Vec<Action>>;

    /// Updates whose `original_action_hash` is `original`, across all branches.
    fn updates_for(&self, original: &ActionHash) -> DatumResult<Vec<Action>>;

    /// Delete markers targeting `target`.
    fn deletes_for(&self, target: &ActionHash) -> DatumResult<Vec<Action>>;

    /// Highest `action_seq` stored for `author`.
    fn last_seq(&self, author: &AgentPubKey) -> DatumResult<Option<u32>>;

    /// Count stored actions.
    fn count_actions(&self) -> DatumResult<usize>;
}
