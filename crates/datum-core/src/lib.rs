//! datum-core - Core library for datum.
//!
//! This crate provides the entry and action types, the storage backends and
//! the [`VersionedRecordStore`] that turns appended actions into revision
//! chains with delete markers.
//!
//! # Example
//!
//! ```
//! use datum_core::{AgentPubKey, Datum, StoreConfig, VersionedRecordStore};
//!
//! let store = VersionedRecordStore::open(&StoreConfig::default())?;
//! let author = AgentPubKey::from("alice");
//!
//! let created = store.create(&author, Datum::new("temp", "celsius", "21.5", "a1b2"))?;
//! let root = created.action_hash().clone();
//! store.update(&author, &root, &root, Datum::new("temp", "celsius", "22.0", "a1b2"))?;
//!
//! let latest = store.get_latest(&root)?;
//! assert_eq!(latest.entry().map(|d| d.value.as_str()), Some("22.0"));
//! # Ok::<(), datum_core::DatumError>(())
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod storage;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{BackendKind, LatestPolicy, StoreConfig, StoreConfigBuilder};
pub use error::{DatumError, DatumResult, ErrorCode};
pub use storage::{ActionStore, MemoryActionStore, SqliteActionStore};
pub use store::VersionedRecordStore;
pub use types::{
    Action, ActionBody, ActionHash, ActionType, AgentPubKey, Datum, EntryHash, EntryType, Record,
    RecordDetails,
};
