//! Versioned record store: revision chains and delete markers over an
//! [`ActionStore`].
//!
//! A record is born as a `Create` action. Each revision appends an `Update`
//! that names both the chain root (`original_action_hash`) and the action it
//! revises (`previous_action_hash`). Nothing locks a chain between reading
//! the previous action and appending, so two writers revising the same action
//! both succeed and the chain branches. Reads resolve branches with a
//! `(timestamp, hash)` tie-break, which gives every reader the same answer
//! for the same set of actions.
//!
//! Deletes are additive markers. They never hide or remove the actions and
//! entries they point at.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::{BackendKind, LatestPolicy, StoreConfig};
use crate::error::{DatumError, DatumResult, ErrorCode};
use crate::storage::{ActionStore, MemoryActionStore, SqliteActionStore};
use crate::types::{Action, ActionBody, ActionHash, AgentPubKey, Datum, Record, RecordDetails};

/// Store handle. Cheap to share behind an `Arc`; every method takes `&self`.
pub struct VersionedRecordStore {
    backend: Arc<dyn ActionStore>,
    clock: Arc<dyn Clock>,
    latest_policy: LatestPolicy,
    /// Next `action_seq` per author, seeded from the backend on first use.
    next_seqs: DashMap<AgentPubKey, u32>,
}

impl VersionedRecordStore {
    /// Create a store over `backend` with the system clock and default policy.
    pub fn new(backend: Arc<dyn ActionStore>) -> Self {
        Self {
            backend,
            clock: Arc::new(SystemClock),
            latest_policy: LatestPolicy::default(),
            next_seqs: DashMap::new(),
        }
    }

    /// Build the backend described by `config` and wrap it.
    pub fn open(config: &StoreConfig) -> DatumResult<Self> {
        let backend: Arc<dyn ActionStore> = match config.backend {
            BackendKind::Memory => Arc::new(MemoryActionStore::new()),
            BackendKind::Sqlite => Arc::new(SqliteActionStore::new(&config.db_path)?),
        };
        info!(
            backend = %config.backend,
            latest_policy = %config.latest_policy,
            "Opened datum store"
        );
        Ok(Self::new(backend).with_latest_policy(config.latest_policy))
    }

    /// Replace the timestamp source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the head resolution rule.
    pub fn with_latest_policy(mut self, policy: LatestPolicy) -> Self {
        self.latest_policy = policy;
        self
    }

    pub fn latest_policy(&self) -> LatestPolicy {
        self.latest_policy
    }

    pub fn backend(&self) -> &Arc<dyn ActionStore> {
        &self.backend
    }

    /// Count every stored action.
    pub fn count_actions(&self) -> DatumResult<usize> {
        self.backend.count_actions()
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Store a new datum as the root of a fresh revision chain.
    pub fn create(&self, author: &AgentPubKey, datum: Datum) -> DatumResult<Record> {
        datum.validate()?;
        let body = ActionBody::Create {
            entry_type: datum.entry_type(),
            entry_hash: datum.hash()?,
        };
        let action = self.append(author, body, Some(&datum))?;
        Ok(Record::new(action, Some(datum)))
    }

    /// Append a revision of `previous_action_hash` to the chain rooted at
    /// `original_action_hash`.
    ///
    /// `previous_action_hash` may be the root itself or any update of the
    /// same chain, not only the current head.
    pub fn update(
        &self,
        author: &AgentPubKey,
        original_action_hash: &ActionHash,
        previous_action_hash: &ActionHash,
        updated: Datum,
    ) -> DatumResult<Record> {
        updated.validate()?;

        let original = self.fetch_action(original_action_hash)?;
        let (original_entry_type, original_entry_hash) = match &original.body {
            ActionBody::Create {
                entry_type,
                entry_hash,
            } => (*entry_type, entry_hash.clone()),
            _ => {
                return Err(DatumError::invalid_reference(
                    original_action_hash.as_str(),
                    format!(
                        "original action '{}' is a {}, not a create",
                        original_action_hash,
                        original.action_type()
                    ),
                ))
            }
        };
        if original_entry_type != updated.entry_type() {
            return Err(DatumError::invalid_reference(
                original_action_hash.as_str(),
                format!(
                    "original action '{}' holds a {} entry, update holds a {}",
                    original_action_hash,
                    original_entry_type,
                    updated.entry_type()
                ),
            ));
        }

        let previous = self
            .backend
            .get_action(previous_action_hash)?
            .ok_or_else(|| DatumError::wrong_chain(previous_action_hash.as_str(), original_action_hash))?;
        if previous.chain_root() != Some(&original.hash) {
            return Err(DatumError::wrong_chain(
                previous_action_hash.as_str(),
                original_action_hash,
            ));
        }

        let body = ActionBody::Update {
            entry_type: updated.entry_type(),
            entry_hash: updated.hash()?,
            original_action_hash: original.hash.clone(),
            original_entry_hash,
            previous_action_hash: previous.hash.clone(),
        };
        let action = self.append(author, body, Some(&updated))?;
        Ok(Record::new(action, Some(updated)))
    }

    /// Mark `action_hash` deleted. Any create or update may be targeted, and
    /// repeated deletes of one target are all kept.
    pub fn delete(&self, author: &AgentPubKey, action_hash: &ActionHash) -> DatumResult<ActionHash> {
        let target = self.fetch_action(action_hash)?;
        let deletes_entry_hash = target.entry_hash().cloned().ok_or_else(|| {
            DatumError::invalid_reference(
                action_hash.as_str(),
                format!("action '{}' is a delete marker and cannot be deleted", action_hash),
            )
        })?;

        let body = ActionBody::Delete {
            deletes_action_hash: target.hash,
            deletes_entry_hash,
        };
        let action = self.append(author, body, None)?;
        Ok(action.hash)
    }

    fn append(
        &self,
        author: &AgentPubKey,
        body: ActionBody,
        entry: Option<&Datum>,
    ) -> DatumResult<Action> {
        let seq = self.next_seq(author)?;
        let action = Action::new(author.clone(), seq, self.clock.now(), body)?;
        self.backend.append(&action, entry)?;
        debug!(
            hash = %action.hash,
            author = %action.author,
            action_seq = action.action_seq,
            kind = %action.action_type(),
            "Appended action"
        );
        Ok(action)
    }

    fn next_seq(&self, author: &AgentPubKey) -> DatumResult<u32> {
        let mut next = match self.next_seqs.entry(author.clone()) {
            Entry::Occupied(slot) => slot.into_ref(),
            Entry::Vacant(slot) => {
                let start = self.backend.last_seq(author)?.map_or(0, |seq| seq + 1);
                slot.insert(start)
            }
        };
        let seq = *next;
        *next += 1;
        Ok(seq)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// The record stored at exactly `action_hash`.
    pub fn get_original(&self, action_hash: &ActionHash) -> DatumResult<Record> {
        let action = self.fetch_action(action_hash)?;
        self.to_record(action)
    }

    /// Head of the chain containing `action_hash`, which may be the root or
    /// any of its updates.
    pub fn get_latest(&self, action_hash: &ActionHash) -> DatumResult<Record> {
        let action = self.fetch_action(action_hash)?;
        let root_hash = match action.chain_root() {
            Some(root) => root.clone(),
            None => {
                return Err(DatumError::invalid_reference(
                    action_hash.as_str(),
                    format!("action '{}' is a delete marker, not part of a chain", action_hash),
                ))
            }
        };
        let root = if root_hash == action.hash {
            action
        } else {
            self.fetch_action(&root_hash)?
        };

        let head = match self.latest_policy {
            LatestPolicy::ChainWalk => self.walk_to_head(root)?,
            LatestPolicy::MostRecent => self
                .backend
                .updates_for(&root.hash)?
                .pop()
                .unwrap_or(root),
        };
        self.to_record(head)
    }

    fn walk_to_head(&self, root: Action) -> DatumResult<Action> {
        let mut current = root;
        // Successor lists are sorted ascending, so the winner is the last one.
        while let Some(next) = self.backend.successors(&current.hash)?.pop() {
            current = next;
        }
        Ok(current)
    }

    /// Every action of the chain rooted at `original_action_hash`, all
    /// branches included.
    ///
    /// The root comes first; after that an action is emitted only once the
    /// action it revises has been, and among the actions ready at the same
    /// time the lowest `(timestamp, hash)` goes first.
    pub fn get_all_revisions(&self, original_action_hash: &ActionHash) -> DatumResult<Vec<Record>> {
        let root = self.fetch_action(original_action_hash)?;
        if !matches!(root.body, ActionBody::Create { .. }) {
            return Err(DatumError::invalid_reference(
                original_action_hash.as_str(),
                format!(
                    "action '{}' is a {}, not the root of a chain",
                    original_action_hash,
                    root.action_type()
                ),
            ));
        }

        let updates = self.backend.updates_for(&root.hash)?;
        let total = updates.len() + 1;

        let mut children: HashMap<ActionHash, Vec<Action>> = HashMap::new();
        for update in updates {
            if let Some(previous) = update.previous_action_hash() {
                children.entry(previous.clone()).or_default().push(update);
            }
        }

        let mut ready: BinaryHeap<Reverse<(DateTime<Utc>, ActionHash)>> = BinaryHeap::new();
        let mut pending: HashMap<ActionHash, Action> = HashMap::new();
        ready.push(Reverse((root.timestamp, root.hash.clone())));
        pending.insert(root.hash.clone(), root);

        let mut ordered = Vec::with_capacity(total);
        while let Some(Reverse((_, hash))) = ready.pop() {
            let Some(action) = pending.remove(&hash) else {
                continue;
            };
            for child in children.remove(&hash).unwrap_or_default() {
                ready.push(Reverse((child.timestamp, child.hash.clone())));
                pending.insert(child.hash.clone(), child);
            }
            ordered.push(action);
        }

        if ordered.len() < total {
            // Updates whose previous action is outside the chain cannot be
            // placed topologically; keep them visible at the end.
            let mut orphans: Vec<Action> = children.into_values().flatten().collect();
            crate::types::sort_actions(&mut orphans);
            warn!(
                original = %original_action_hash,
                orphans = orphans.len(),
                "Revision chain holds updates with unreachable previous actions"
            );
            ordered.extend(orphans);
        }

        ordered.into_iter().map(|a| self.to_record(a)).collect()
    }

    /// Earliest delete marker for `action_hash`.
    pub fn get_oldest_delete(&self, action_hash: &ActionHash) -> DatumResult<Action> {
        self.get_all_deletes(action_hash)?
            .into_iter()
            .next()
            .ok_or_else(|| DatumError::NotFound {
                message: format!("No delete markers for action '{}'", action_hash),
                code: ErrorCode::DatNotFound,
                hash: Some(action_hash.to_string()),
            })
    }

    /// Every delete marker for `action_hash`, by `(timestamp, hash)`.
    pub fn get_all_deletes(&self, action_hash: &ActionHash) -> DatumResult<Vec<Action>> {
        self.fetch_action(action_hash)?;
        self.backend.deletes_for(action_hash)
    }

    /// The record at `action_hash` with its direct updates and its deletes.
    pub fn get_details(&self, action_hash: &ActionHash) -> DatumResult<RecordDetails> {
        let record = self.get_original(action_hash)?;
        let updates = self.backend.successors(action_hash)?;
        let deletes = self.backend.deletes_for(action_hash)?;
        Ok(RecordDetails {
            record,
            updates,
            deletes,
        })
    }

    fn fetch_action(&self, hash: &ActionHash) -> DatumResult<Action> {
        self.backend
            .get_action(hash)?
            .ok_or_else(|| DatumError::not_found(hash.as_str()))
    }

    fn to_record(&self, action: Action) -> DatumResult<Record> {
        let entry = match action.entry_hash() {
            Some(entry_hash) => Some(self.backend.get_entry(entry_hash)?.ok_or_else(|| {
                DatumError::corrupted(format!(
                    "entry '{}' of action '{}' is missing",
                    entry_hash, action.hash
                ))
            })?),
            None => None,
        };
        Ok(Record::new(action, entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{Duration, TimeZone};

    fn alice() -> AgentPubKey {
        AgentPubKey::from("alice")
    }

    fn bob() -> AgentPubKey {
        AgentPubKey::from("bob")
    }

    fn datum(value: &str) -> Datum {
        Datum::new("humidity", "percent", value, "4f7c-uuid")
    }

    fn store_with_clock() -> (VersionedRecordStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap()));
        let store = VersionedRecordStore::new(Arc::new(MemoryActionStore::new()))
            .with_clock(clock.clone());
        (store, clock)
    }

    #[test]
    fn test_create_then_read() {
        let (store, _) = store_with_clock();
        let created = store.create(&alice(), datum("40")).unwrap();
        assert_eq!(created.entry(), Some(&datum("40")));

        let latest = store.get_latest(created.action_hash()).unwrap();
        assert_eq!(latest, created);
        let original = store.get_original(created.action_hash()).unwrap();
        assert_eq!(original, created);
    }

    #[test]
    fn test_create_rejects_empty_field() {
        let (store, _) = store_with_clock();
        let err = store
            .create(&alice(), Datum::new("n", "", "v", "u"))
            .unwrap_err();
        assert!(matches!(err, DatumError::Validation { .. }));
        assert_eq!(store.count_actions().unwrap(), 0);
    }

    #[test]
    fn test_create_accepts_whitespace_value() {
        let (store, _) = store_with_clock();
        let created = store
            .create(&alice(), Datum::new("note", "string", " ", "u-1"))
            .unwrap();
        assert_eq!(created.entry().unwrap().value, " ");
    }

    #[test]
    fn test_update_chain_monotonic() {
        let (store, clock) = store_with_clock();
        let root = store.create(&alice(), datum("v0")).unwrap();
        let root_hash = root.action_hash().clone();

        clock.advance(Duration::seconds(1));
        let a1 = store.update(&alice(), &root_hash, &root_hash, datum("v1")).unwrap();
        clock.advance(Duration::seconds(1));
        let a2 = store
            .update(&alice(), &root_hash, a1.action_hash(), datum("v2"))
            .unwrap();

        let latest = store.get_latest(&root_hash).unwrap();
        assert_eq!(latest.action_hash(), a2.action_hash());
        assert_eq!(latest.entry(), Some(&datum("v2")));
        // Any member of the chain resolves to the same head.
        assert_eq!(store.get_latest(a1.action_hash()).unwrap(), latest);

        let revisions = store.get_all_revisions(&root_hash).unwrap();
        let values: Vec<_> = revisions
            .iter()
            .map(|r| r.entry().unwrap().value.as_str())
            .collect();
        assert_eq!(values, vec!["v0", "v1", "v2"]);
    }

    #[test]
    fn test_branching_updates_both_kept() {
        let (store, clock) = store_with_clock();
        let root = store.create(&alice(), datum("v0")).unwrap();
        let root_hash = root.action_hash().clone();

        clock.advance(Duration::seconds(1));
        let from_alice = store.update(&alice(), &root_hash, &root_hash, datum("a")).unwrap();
        let from_bob = store.update(&bob(), &root_hash, &root_hash, datum("b")).unwrap();

        let revisions = store.get_all_revisions(&root_hash).unwrap();
        assert_eq!(revisions.len(), 3);

        // Same timestamp: the higher hash wins.
        let expected = std::cmp::max(from_alice.action_hash(), from_bob.action_hash());
        let latest = store.get_latest(&root_hash).unwrap();
        assert_eq!(latest.action_hash(), expected);
        assert_eq!(store.get_latest(&root_hash).unwrap(), latest);

        // Ascending order among the siblings in the revision list.
        assert!(revisions[1].action_hash() < revisions[2].action_hash());
    }

    #[test]
    fn test_branch_with_later_timestamp_wins() {
        let (store, clock) = store_with_clock();
        let root = store.create(&alice(), datum("v0")).unwrap();
        let root_hash = root.action_hash().clone();

        clock.advance(Duration::seconds(1));
        store.update(&alice(), &root_hash, &root_hash, datum("early")).unwrap();
        clock.advance(Duration::seconds(1));
        let late = store.update(&bob(), &root_hash, &root_hash, datum("late")).unwrap();

        assert_eq!(store.get_latest(&root_hash).unwrap(), late);
    }

    #[test]
    fn test_latest_policies_differ_on_deep_branch() {
        let (store, clock) = store_with_clock();
        let root = store.create(&alice(), datum("v0")).unwrap();
        let root_hash = root.action_hash().clone();

        // Branch A: two updates, the second is the most recent action overall.
        clock.advance(Duration::seconds(1));
        let a1 = store.update(&alice(), &root_hash, &root_hash, datum("a1")).unwrap();
        // Branch B: one update, newer than a1 but older than a2.
        clock.advance(Duration::seconds(1));
        let b1 = store.update(&bob(), &root_hash, &root_hash, datum("b1")).unwrap();
        clock.advance(Duration::seconds(1));
        let a2 = store
            .update(&alice(), &root_hash, a1.action_hash(), datum("a2"))
            .unwrap();

        assert_eq!(store.get_latest(&root_hash).unwrap(), b1);

        let store = store.with_latest_policy(LatestPolicy::MostRecent);
        assert_eq!(store.get_latest(&root_hash).unwrap(), a2);

        // Revision order: root, a1, b1, a2 (a2 becomes ready after a1 and is
        // the newest of the remaining ones).
        let revisions = store.get_all_revisions(&root_hash).unwrap();
        let values: Vec<_> = revisions
            .iter()
            .map(|r| r.entry().unwrap().value.as_str())
            .collect();
        assert_eq!(values, vec!["v0", "a1", "b1", "a2"]);
    }

    #[test]
    fn test_update_rejects_bogus_previous() {
        let (store, _) = store_with_clock();
        let root = store.create(&alice(), datum("v0")).unwrap();
        let err = store
            .update(&alice(), root.action_hash(), &"bogus".into(), datum("v1"))
            .unwrap_err();
        assert!(matches!(err, DatumError::InvalidReference { .. }));
    }

    #[test]
    fn test_update_rejects_previous_from_other_chain() {
        let (store, _) = store_with_clock();
        let first = store.create(&alice(), datum("first")).unwrap();
        let second = store.create(&alice(), datum("second")).unwrap();
        let err = store
            .update(&alice(), first.action_hash(), second.action_hash(), datum("x"))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::RefWrongChain);
    }

    #[test]
    fn test_update_requires_create_as_original() {
        let (store, _) = store_with_clock();
        let root = store.create(&alice(), datum("v0")).unwrap();
        let u1 = store
            .update(&alice(), root.action_hash(), root.action_hash(), datum("v1"))
            .unwrap();
        let err = store
            .update(&alice(), u1.action_hash(), u1.action_hash(), datum("v2"))
            .unwrap_err();
        assert!(matches!(err, DatumError::InvalidReference { .. }));

        let err = store
            .update(&alice(), &"nope".into(), root.action_hash(), datum("v2"))
            .unwrap_err();
        assert!(matches!(err, DatumError::NotFound { .. }));
    }

    #[test]
    fn test_update_from_historical_action_branches() {
        let (store, clock) = store_with_clock();
        let root = store.create(&alice(), datum("v0")).unwrap();
        let root_hash = root.action_hash().clone();
        clock.advance(Duration::seconds(1));
        store.update(&alice(), &root_hash, &root_hash, datum("v1")).unwrap();
        clock.advance(Duration::seconds(1));
        // Revising the root again, not the head.
        let again = store.update(&bob(), &root_hash, &root_hash, datum("v1b")).unwrap();

        assert_eq!(store.get_all_revisions(&root_hash).unwrap().len(), 3);
        assert_eq!(store.get_latest(&root_hash).unwrap(), again);
    }

    #[test]
    fn test_unknown_hash_not_found() {
        let (store, _) = store_with_clock();
        let unknown: ActionHash = "unknown".into();
        assert!(matches!(
            store.get_latest(&unknown).unwrap_err(),
            DatumError::NotFound { .. }
        ));
        assert!(matches!(
            store.get_all_revisions(&unknown).unwrap_err(),
            DatumError::NotFound { .. }
        ));
        assert!(matches!(
            store.get_all_deletes(&unknown).unwrap_err(),
            DatumError::NotFound { .. }
        ));
        assert!(matches!(
            store.delete(&alice(), &unknown).unwrap_err(),
            DatumError::NotFound { .. }
        ));
    }

    #[test]
    fn test_delete_plurality() {
        let (store, clock) = store_with_clock();
        let root = store.create(&alice(), datum("v0")).unwrap();
        let root_hash = root.action_hash().clone();

        clock.advance(Duration::seconds(1));
        let first = store.delete(&bob(), &root_hash).unwrap();
        clock.advance(Duration::seconds(1));
        let second = store.delete(&alice(), &root_hash).unwrap();

        let deletes = store.get_all_deletes(&root_hash).unwrap();
        assert_eq!(deletes.len(), 2);
        assert_eq!(deletes[0].hash, first);
        assert_eq!(deletes[1].hash, second);
        assert_eq!(store.get_oldest_delete(&root_hash).unwrap().hash, first);
    }

    #[test]
    fn test_delete_keeps_chain_readable() {
        let (store, clock) = store_with_clock();
        let root = store.create(&alice(), datum("v0")).unwrap();
        let root_hash = root.action_hash().clone();
        let other = store.create(&alice(), datum("other")).unwrap();
        clock.advance(Duration::seconds(1));
        let u1 = store.update(&alice(), &root_hash, &root_hash, datum("v1")).unwrap();

        store.delete(&bob(), u1.action_hash()).unwrap();

        assert_eq!(store.get_all_revisions(&root_hash).unwrap().len(), 2);
        assert_eq!(store.get_latest(&root_hash).unwrap(), u1);
        assert_eq!(store.get_latest(other.action_hash()).unwrap(), other);
        assert!(store.get_all_deletes(other.action_hash()).unwrap().is_empty());

        let details = store.get_details(u1.action_hash()).unwrap();
        assert!(details.is_deleted());
        assert_eq!(details.record, u1);
    }

    #[test]
    fn test_delete_of_delete_rejected() {
        let (store, _) = store_with_clock();
        let root = store.create(&alice(), datum("v0")).unwrap();
        let marker = store.delete(&alice(), root.action_hash()).unwrap();
        let err = store.delete(&alice(), &marker).unwrap_err();
        assert!(matches!(err, DatumError::InvalidReference { .. }));
        assert!(matches!(
            store.get_latest(&marker).unwrap_err(),
            DatumError::InvalidReference { .. }
        ));
        // The marker itself is still readable as a record without an entry.
        assert!(store.get_original(&marker).unwrap().entry().is_none());
    }

    #[test]
    fn test_oldest_delete_missing() {
        let (store, _) = store_with_clock();
        let root = store.create(&alice(), datum("v0")).unwrap();
        assert!(matches!(
            store.get_oldest_delete(root.action_hash()).unwrap_err(),
            DatumError::NotFound { .. }
        ));
    }

    #[test]
    fn test_identical_actions_get_distinct_hashes() {
        // Same author, same content, same instant: the sequence number keeps
        // them apart.
        let (store, _) = store_with_clock();
        let a = store.create(&alice(), datum("dup")).unwrap();
        let b = store.create(&alice(), datum("dup")).unwrap();
        assert_ne!(a.action_hash(), b.action_hash());
        assert_eq!(a.action.action_seq + 1, b.action.action_seq);
        assert_eq!(a.action.entry_hash(), b.action.entry_hash());
    }

    #[test]
    fn test_details_list_direct_updates() {
        let (store, clock) = store_with_clock();
        let root = store.create(&alice(), datum("v0")).unwrap();
        let root_hash = root.action_hash().clone();
        clock.advance(Duration::seconds(1));
        let u1 = store.update(&alice(), &root_hash, &root_hash, datum("v1")).unwrap();
        store.update(&alice(), &root_hash, u1.action_hash(), datum("v2")).unwrap();

        let details = store.get_details(&root_hash).unwrap();
        assert_eq!(details.updates, vec![u1.action]);
        assert!(!details.is_deleted());
    }
}
