//! Core types for datum.

mod action;
mod datum;
mod hash;

pub use action::{sort_actions, Action, ActionBody, ActionType, Record, RecordDetails};
pub use datum::{Datum, EntryType};
pub use hash::{ActionHash, AgentPubKey, EntryHash};
