//! SQLite-backed action store.
//!
//! Provides durable persistence for entries and actions. Each append runs in
//! one transaction, so an action and its index columns are committed together.

use chrono::DateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::error::{DatumError, DatumResult};
use crate::storage::ActionStore;
use crate::types::{
    Action, ActionBody, ActionHash, ActionType, AgentPubKey, Datum, EntryHash, EntryType,
};

const ACTION_COLUMNS: &str = "hash, author, action_seq, timestamp_micros, action_type, \
     entry_type, entry_hash, original_action_hash, original_entry_hash, \
     previous_action_hash, deletes_action_hash, deletes_entry_hash";

/// SQLite-backed action store
pub struct SqliteActionStore {
    conn: Mutex<Connection>,
}

impl SqliteActionStore {
    /// Open (or create) a store at the given path
    pub fn new(path: impl AsRef<Path>) -> DatumResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Self::open_connection(path.as_ref()).map_err(|e| {
            DatumError::connection_failed(
                format!("failed to open sqlite database at {}: {}", path.as_ref().display(), e),
                e,
            )
        })?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn open_connection(path: &Path) -> rusqlite::Result<Connection> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Ok(conn)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> DatumResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> DatumResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| DatumError::storage("sqlite connection lock poisoned"))
    }

    fn init_schema(&self) -> DatumResult<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS entries (
                hash TEXT PRIMARY KEY,
                entry_type TEXT NOT NULL,
                content TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS actions (
                hash TEXT PRIMARY KEY,
                author TEXT NOT NULL,
                action_seq INTEGER NOT NULL,
                timestamp_micros INTEGER NOT NULL,
                action_type TEXT NOT NULL,
                entry_type TEXT,
                entry_hash TEXT REFERENCES entries(hash),
                original_action_hash TEXT,
                original_entry_hash TEXT,
                previous_action_hash TEXT,
                deletes_action_hash TEXT,
                deletes_entry_hash TEXT
            );

            -- Reverse index for chain walks
            CREATE INDEX IF NOT EXISTS idx_actions_previous
                ON actions(previous_action_hash, timestamp_micros, hash);

            -- All updates of one original, across branches
            CREATE INDEX IF NOT EXISTS idx_actions_original
                ON actions(original_action_hash, timestamp_micros, hash);

            -- Delete markers by target
            CREATE INDEX IF NOT EXISTS idx_actions_deletes
                ON actions(deletes_action_hash, timestamp_micros, hash);

            CREATE INDEX IF NOT EXISTS idx_actions_author
                ON actions(author, action_seq);
        "#,
        )?;
        Ok(())
    }

    fn row_to_action(row: &Row<'_>) -> DatumResult<Action> {
        let hash: String = row.get(0)?;
        let author: String = row.get(1)?;
        let action_seq: u32 = row.get(2)?;
        let timestamp_micros: i64 = row.get(3)?;
        let action_type: String = row.get(4)?;
        let entry_type: Option<String> = row.get(5)?;
        let entry_hash: Option<String> = row.get(6)?;
        let original_action_hash: Option<String> = row.get(7)?;
        let original_entry_hash: Option<String> = row.get(8)?;
        let previous_action_hash: Option<String> = row.get(9)?;
        let deletes_action_hash: Option<String> = row.get(10)?;
        let deletes_entry_hash: Option<String> = row.get(11)?;

        let required = |value: Option<String>, column: &str| {
            value.ok_or_else(|| {
                DatumError::corrupted(format!("action '{}' is missing column {}", hash, column))
            })
        };
        let parse_entry_type = |value: Option<String>| -> DatumResult<EntryType> {
            let value = required(value, "entry_type")?;
            value
                .parse::<EntryType>()
                .map_err(|_| DatumError::corrupted(format!("unknown entry type '{}'", value)))
        };

        let action_type = action_type
            .parse::<ActionType>()
            .map_err(|_| DatumError::corrupted(format!("unknown action type '{}'", action_type)))?;

        let body = match action_type {
            ActionType::Create => ActionBody::Create {
                entry_type: parse_entry_type(entry_type)?,
                entry_hash: required(entry_hash, "entry_hash")?.into(),
            },
            ActionType::Update => ActionBody::Update {
                entry_type: parse_entry_type(entry_type)?,
                entry_hash: required(entry_hash, "entry_hash")?.into(),
                original_action_hash: required(original_action_hash, "original_action_hash")?
                    .into(),
                original_entry_hash: required(original_entry_hash, "original_entry_hash")?.into(),
                previous_action_hash: required(previous_action_hash, "previous_action_hash")?
                    .into(),
            },
            ActionType::Delete => ActionBody::Delete {
                deletes_action_hash: required(deletes_action_hash, "deletes_action_hash")?.into(),
                deletes_entry_hash: required(deletes_entry_hash, "deletes_entry_hash")?.into(),
            },
        };

        let timestamp = DateTime::from_timestamp_micros(timestamp_micros).ok_or_else(|| {
            DatumError::corrupted(format!("action '{}' has an invalid timestamp", hash))
        })?;

        Ok(Action {
            hash: ActionHash::from_raw(hash),
            author: AgentPubKey::from_raw(author),
            action_seq,
            timestamp,
            body,
        })
    }

    fn query_actions(&self, column: &str, key: &ActionHash) -> DatumResult<Vec<Action>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM actions WHERE {} = ?1 ORDER BY timestamp_micros ASC, hash ASC",
            ACTION_COLUMNS, column
        ))?;

        let results = stmt.query_map(params![key.as_str()], |row| Ok(Self::row_to_action(row)))?;

        results
            .map(|r| r.map_err(|e| e.into()).and_then(|inner| inner))
            .collect()
    }
}

impl ActionStore for SqliteActionStore {
    fn append(&self, action: &Action, entry: Option<&Datum>) -> DatumResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        if let (Some(entry), Some(entry_hash)) = (entry, action.entry_hash()) {
            tx.execute(
                "INSERT OR IGNORE INTO entries (hash, entry_type, content) VALUES (?1, ?2, ?3)",
                params![
                    entry_hash.as_str(),
                    entry.entry_type().to_string(),
                    serde_json::to_string(entry)?,
                ],
            )?;
        }

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM actions WHERE hash = ?1)",
            params![action.hash.as_str()],
            |row| row.get(0),
        )?;
        if exists {
            return Err(DatumError::storage(format!(
                "action '{}' already stored",
                action.hash
            )));
        }

        tx.execute(
            &format!(
                "INSERT INTO actions ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                ACTION_COLUMNS
            ),
            params![
                action.hash.as_str(),
                action.author.as_str(),
                action.action_seq,
                action.timestamp.timestamp_micros(),
                action.action_type().to_string(),
                action.entry_type().map(|t| t.to_string()),
                action.entry_hash().map(|h| h.as_str()),
                action.original_action_hash().map(|h| h.as_str()),
                match &action.body {
                    ActionBody::Update {
                        original_entry_hash,
                        ..
                    } => Some(original_entry_hash.as_str()),
                    _ => None,
                },
                action.previous_action_hash().map(|h| h.as_str()),
                action.deletes_action_hash().map(|h| h.as_str()),
                match &action.body {
                    ActionBody::Delete {
                        deletes_entry_hash,
                        ..
                    } => Some(deletes_entry_hash.as_str()),
                    _ => None,
                },
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn get_action(&self, hash: &ActionHash) -> DatumResult<Option<Action>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM actions WHERE hash = ?1",
            ACTION_COLUMNS
        ))?;

        stmt.query_row(params![hash.as_str()], |row| Ok(Self::row_to_action(row)))
            .optional()?
            .transpose()
    }

    fn get_entry(&self, hash: &EntryHash) -> DatumResult<Option<Datum>> {
        let conn = self.conn()?;
        let content: Option<String> = conn
            .query_row(
                "SELECT content FROM entries WHERE hash = ?1",
                params![hash.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        match content {
            Some(content) => Ok(Some(serde_json::from_str(&content)?)),
            None => Ok(None),
        }
    }

    fn successors(&self, previous: &ActionHash) -> DatumResult<Vec<Action>> {
        self.query_actions("previous_action_hash", previous)
    }

    fn updates_for(&self, original: &ActionHash) -> DatumResult<Vec<Action>> {
        self.query_actions("original_action_hash", original)
    }

    fn deletes_for(&self, target: &ActionHash) -> DatumResult<Vec<Action>> {
        self.query_actions("deletes_action_hash", target)
    }

    fn last_seq(&self, author: &AgentPubKey) -> DatumResult<Option<u32>> {
        let conn = self.conn()?;
        let max: Option<u32> = conn.query_row(
            "SELECT MAX(action_seq) FROM actions WHERE author = ?1",
            params![author.as_str()],
            |row| row.get(0),
        )?;
        Ok(max)
    }

    fn count_actions(&self) -> DatumResult<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM actions", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
