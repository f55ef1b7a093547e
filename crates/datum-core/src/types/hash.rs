//! Content addresses and author identifiers.
//!
//! Hashes are SHA-256 over a domain tag followed by the JSON encoding of the
//! hashed value, rendered as lowercase hex. The domain tag keeps entry and
//! action addresses from ever colliding with each other.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::DatumResult;

macro_rules! hash_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an already computed hash string.
            pub fn from_raw(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// Borrow the hex form.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume into the hex form.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self(raw.to_string())
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self(raw)
            }
        }
    };
}

hash_newtype!(
    /// Content address of an action.
    ActionHash
);

hash_newtype!(
    /// Content address of an entry.
    EntryHash
);

hash_newtype!(
    /// Opaque author identifier. Nothing is assumed about its format.
    AgentPubKey
);

/// Hash `value` under `domain`.
pub(crate) fn hash_content<T: Serialize + ?Sized>(domain: &str, value: &T) -> DatumResult<String> {
    let encoded = serde_json::to_vec(value)?;
    let mut hasher = Sha256::new();
    hasher.update(domain.as_bytes());
    hasher.update([0u8]);
    hasher.update(&encoded);
    Ok(hex::encode(hasher.finalize()))
}
