//! Actions: the immutable, content-addressed events that make up a store.
//!
//! A record never changes in place. Creating, revising and deleting it each
//! append one [`Action`]; the current state is derived from the actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use super::datum::{Datum, EntryType};
use super::hash::{hash_content, ActionHash, AgentPubKey, EntryHash};
use crate::error::DatumResult;

/// Discriminant of an action.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Create,
    Update,
    Delete,
}

/// Kind-specific content of an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionBody {
    Create {
        entry_type: EntryType,
        entry_hash: EntryHash,
    },
    Update {
        entry_type: EntryType,
        entry_hash: EntryHash,
        /// Root `Create` of the chain.
        original_action_hash: ActionHash,
        original_entry_hash: EntryHash,
        /// Action this update revises; the root or another update.
        previous_action_hash: ActionHash,
    },
    Delete {
        deletes_action_hash: ActionHash,
        deletes_entry_hash: EntryHash,
    },
}

/// Everything that goes into an action hash.
#[derive(Serialize)]
struct HashableAction<'a> {
    author: &'a AgentPubKey,
    action_seq: u32,
    timestamp_micros: i64,
    body: &'a ActionBody,
}

/// An appended event together with its content address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub hash: ActionHash,
    pub author: AgentPubKey,
    /// Position of this action in its author's sequence.
    pub action_seq: u32,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub body: ActionBody,
}

impl Action {
    /// Build an action and compute its hash.
    pub fn new(
        author: AgentPubKey,
        action_seq: u32,
        timestamp: DateTime<Utc>,
        body: ActionBody,
    ) -> DatumResult<Self> {
        let hash = Self::compute_hash(&author, action_seq, &timestamp, &body)?;
        Ok(Self {
            hash,
            author,
            action_seq,
            timestamp,
            body,
        })
    }

    fn compute_hash(
        author: &AgentPubKey,
        action_seq: u32,
        timestamp: &DateTime<Utc>,
        body: &ActionBody,
    ) -> DatumResult<ActionHash> {
        let hashable = HashableAction {
            author,
            action_seq,
            timestamp_micros: timestamp.timestamp_micros(),
            body,
        };
        hash_content("action", &hashable).map(ActionHash::from_raw)
    }

    /// Recompute the hash and compare it with the stored one.
    pub fn verify_hash(&self) -> DatumResult<bool> {
        let expected =
            Self::compute_hash(&self.author, self.action_seq, &self.timestamp, &self.body)?;
        Ok(expected == self.hash)
    }

    pub fn action_type(&self) -> ActionType {
        match self.body {
            ActionBody::Create { .. } => ActionType::Create,
            ActionBody::Update { .. } => ActionType::Update,
            ActionBody::Delete { .. } => ActionType::Delete,
        }
    }

    /// Entry written by this action; `None` for deletes.
    pub fn entry_hash(&self) -> Option<&EntryHash> {
        match &self.body {
            ActionBody::Create { entry_hash, .. } | ActionBody::Update { entry_hash, .. } => {
                Some(entry_hash)
            }
            ActionBody::Delete { .. } => None,
        }
    }

    pub fn entry_type(&self) -> Option<EntryType> {
        match &self.body {
            ActionBody::Create { entry_type, .. } | ActionBody::Update { entry_type, .. } => {
                Some(*entry_type)
            }
            ActionBody::Delete { .. } => None,
        }
    }

    /// Root of the revision chain this action belongs to.
    ///
    /// A create is its own root; deletes belong to no chain.
    pub fn chain_root(&self) -> Option<&ActionHash> {
        match &self.body {
            ActionBody::Create { .. } => Some(&self.hash),
            ActionBody::Update {
                original_action_hash,
                ..
            } => Some(original_action_hash),
            ActionBody::Delete { .. } => None,
        }
    }

    pub fn previous_action_hash(&self) -> Option<&ActionHash> {
        match &self.body {
            ActionBody::Update {
                previous_action_hash,
                ..
            } => Some(previous_action_hash),
            _ => None,
        }
    }

    pub fn original_action_hash(&self) -> Option<&ActionHash> {
        match &self.body {
            ActionBody::Update {
                original_action_hash,
                ..
            } => Some(original_action_hash),
            _ => None,
        }
    }

    pub fn deletes_action_hash(&self) -> Option<&ActionHash> {
        match &self.body {
            ActionBody::Delete {
                deletes_action_hash,
                ..
            } => Some(deletes_action_hash),
            _ => None,
        }
    }

    /// Ordering key used for every tie-break in the store.
    pub fn sort_key(&self) -> (DateTime<Utc>, &ActionHash) {
        (self.timestamp, &self.hash)
    }
}

/// Sort actions ascending by `(timestamp, hash)`.
pub fn sort_actions(actions: &mut [Action]) {
    actions.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
}

/// An action with its entry, if it has one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<Datum>,
}

impl Record {
    pub fn new(action: Action, entry: Option<Datum>) -> Self {
        Self { action, entry }
    }

    pub fn action_hash(&self) -> &ActionHash {
        &self.action.hash
    }

    pub fn entry(&self) -> Option<&Datum> {
        self.entry.as_ref()
    }
}

/// A record plus the actions that reference it directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDetails {
    pub record: Record,
    /// Updates whose previous action is this record, by `(timestamp, hash)`.
    pub updates: Vec<Action>,
    /// Delete markers targeting this record, by `(timestamp, hash)`.
    pub deletes: Vec<Action>,
}

impl RecordDetails {
    pub fn is_deleted(&self) -> bool {
        !self.deletes.is_empty()
    }
}
