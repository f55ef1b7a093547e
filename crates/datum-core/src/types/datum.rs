//! The `Datum` entry type.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use super::hash::{hash_content, EntryHash};
use crate::error::{DatumError, DatumResult};

/// Kinds of entry an action can point at.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Datum,
}

/// A named, typed value. Immutable once written; changes are new entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Datum {
    pub name: String,
    pub dtype: String,
    pub value: String,
    pub uuid: String,
}

impl Datum {
    /// Create a new datum.
    pub fn new(
        name: impl Into<String>,
        dtype: impl Into<String>,
        value: impl Into<String>,
        uuid: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            dtype: dtype.into(),
            value: value.into(),
            uuid: uuid.into(),
        }
    }

    /// Entry type of this content.
    pub fn entry_type(&self) -> EntryType {
        EntryType::Datum
    }

    /// Reject a datum with any empty field.
    pub fn validate(&self) -> DatumResult<()> {
        let fields = [
            ("name", &self.name),
            ("dtype", &self.dtype),
            ("value", &self.value),
            ("uuid", &self.uuid),
        ];
        for (field, value) in fields {
            if value.is_empty() {
                return Err(DatumError::missing_field(field));
            }
        }
        Ok(())
    }

    /// Content address of this datum.
    pub fn hash(&self) -> DatumResult<EntryHash> {
        let domain = format!("entry:{}", self.entry_type());
        hash_content(&domain, self).map(EntryHash::from_raw)
    }
}
