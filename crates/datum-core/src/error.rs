//! Error types for datum operations.
//!
//! Every store operation reports failures synchronously through [`DatumError`].
//! Each variant carries a structured [`ErrorCode`] so callers on the other side
//! of an HTTP boundary can match on it without parsing messages.

use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for datum operations.
pub type DatumResult<T> = Result<T, DatumError>;

/// Main error type for all datum operations.
#[derive(Error, Debug)]
pub enum DatumError {
    /// A hash did not resolve to any known action or entry.
    #[error("Not found: {message}")]
    NotFound {
        message: String,
        code: ErrorCode,
        hash: Option<String>,
    },

    /// A supplied reference exists but is not usable where it was given
    /// (wrong action kind, different chain, or unreachable).
    #[error("Invalid reference: {message}")]
    InvalidReference {
        message: String,
        code: ErrorCode,
        hash: Option<String>,
    },

    /// Input validation failed.
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        code: ErrorCode,
        details: HashMap<String, String>,
        suggestion: Option<String>,
    },

    /// The storage layer could not complete a read or write.
    #[error("Storage error: {message}")]
    Storage {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Network error (client side of the REST API).
    #[error("Network error: {message}")]
    Network {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Lookup (DAT_xxx)
    DatNotFound,
    DatCorrupted,

    // References (REF_xxx)
    RefInvalidTarget,
    RefWrongChain,

    // Validation (VAL_xxx)
    ValInvalidInput,
    ValMissingField,

    // Database (DB_xxx)
    DbConnectionFailed,
    DbOperationFailed,

    // Network (NET_xxx)
    NetConnectionFailed,

    // Internal
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::DatNotFound => "DAT_001",
            ErrorCode::DatCorrupted => "DAT_002",
            ErrorCode::RefInvalidTarget => "REF_001",
            ErrorCode::RefWrongChain => "REF_002",
            ErrorCode::ValInvalidInput => "VAL_001",
            ErrorCode::ValMissingField => "VAL_002",
            ErrorCode::DbConnectionFailed => "DB_001",
            ErrorCode::DbOperationFailed => "DB_002",
            ErrorCode::NetConnectionFailed => "NET_002",
            ErrorCode::Internal => "INT_001",
        }
    }

    /// Parse the string form produced by [`as_str`](Self::as_str).
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "DAT_001" => Some(ErrorCode::DatNotFound),
            "DAT_002" => Some(ErrorCode::DatCorrupted),
            "REF_001" => Some(ErrorCode::RefInvalidTarget),
            "REF_002" => Some(ErrorCode::RefWrongChain),
            "VAL_001" => Some(ErrorCode::ValInvalidInput),
            "VAL_002" => Some(ErrorCode::ValMissingField),
            "DB_001" => Some(ErrorCode::DbConnectionFailed),
            "DB_002" => Some(ErrorCode::DbOperationFailed),
            "NET_002" => Some(ErrorCode::NetConnectionFailed),
            "INT_001" => Some(ErrorCode::Internal),
            _ => None,
        }
    }
}

impl DatumError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValInvalidInput,
            details: HashMap::new(),
            suggestion: None,
        }
    }

    /// Create a validation error for a required field that is empty.
    pub fn missing_field(field: &str) -> Self {
        let mut details = HashMap::new();
        details.insert("field".to_string(), field.to_string());
        Self::Validation {
            message: format!("field '{}' must not be empty", field),
            code: ErrorCode::ValMissingField,
            details,
            suggestion: Some(format!("Provide a non-empty value for '{}'", field)),
        }
    }

    /// Create a not found error for a hash.
    pub fn not_found(hash: impl Into<String>) -> Self {
        let hash = hash.into();
        Self::NotFound {
            message: format!("No action or entry with hash '{}'", hash),
            code: ErrorCode::DatNotFound,
            hash: Some(hash),
        }
    }

    /// Create an invalid reference error.
    pub fn invalid_reference(hash: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidReference {
            message: message.into(),
            code: ErrorCode::RefInvalidTarget,
            hash: Some(hash.into()),
        }
    }

    /// Create an invalid reference error for an action outside the expected chain.
    pub fn wrong_chain(hash: impl Into<String>, original: impl AsRef<str>) -> Self {
        let hash = hash.into();
        Self::InvalidReference {
            message: format!(
                "action '{}' is not part of the revision chain rooted at '{}'",
                hash,
                original.as_ref()
            ),
            code: ErrorCode::RefWrongChain,
            hash: Some(hash),
        }
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            code: ErrorCode::DbOperationFailed,
            source: None,
        }
    }

    /// Create a storage error for a database that could not be opened.
    pub fn connection_failed(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            code: ErrorCode::DbConnectionFailed,
            source: Some(Box::new(source)),
        }
    }

    /// Create a storage error for data that could not be decoded.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            code: ErrorCode::DatCorrupted,
            source: None,
        }
    }

    /// Create an API error.
    pub fn api(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            code: ErrorCode::NetConnectionFailed,
            source: None,
        }
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { code, .. } => *code,
            Self::InvalidReference { code, .. } => *code,
            Self::Validation { code, .. } => *code,
            Self::Storage { code, .. } => *code,
            Self::Network { code, .. } => *code,
            _ => ErrorCode::Internal,
        }
    }

    /// Get a user-friendly suggestion for resolving this error.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::NotFound { .. } => Some("Please check the hash and ensure the action exists"),
            Self::InvalidReference { .. } => {
                Some("Reference an action that belongs to the same revision chain")
            }
            Self::Validation { suggestion, .. } => suggestion.as_deref(),
            Self::Storage { .. } => Some("Please check your storage backend settings"),
            _ => None,
        }
    }

    /// Convert from HTTP status code (for client errors).
    pub fn from_http_status(status: u16, body: &str) -> Self {
        match status {
            400 | 422 => Self::Validation {
                message: body.to_string(),
                code: ErrorCode::ValInvalidInput,
                details: HashMap::new(),
                suggestion: Some("Please check your request parameters".to_string()),
            },
            404 => Self::NotFound {
                message: body.to_string(),
                code: ErrorCode::DatNotFound,
                hash: None,
            },
            409 => Self::InvalidReference {
                message: body.to_string(),
                code: ErrorCode::RefInvalidTarget,
                hash: None,
            },
            _ => Self::Internal(format!("HTTP {}: {}", status, body)),
        }
    }
}

impl DatumError {
    /// Rebuild an error from a server response.
    ///
    /// The error code sent by the server wins over the status; responses
    /// without a known code fall back to [`from_http_status`](Self::from_http_status).
    pub fn from_http_response(status: u16, message: &str, code: Option<&str>) -> Self {
        let message = message.to_string();
        match code.and_then(ErrorCode::from_code) {
            Some(code @ ErrorCode::DatNotFound) => Self::NotFound {
                message,
                code,
                hash: None,
            },
            Some(code @ (ErrorCode::RefInvalidTarget | ErrorCode::RefWrongChain)) => {
                Self::InvalidReference {
                    message,
                    code,
                    hash: None,
                }
            }
            Some(code @ (ErrorCode::ValInvalidInput | ErrorCode::ValMissingField)) => {
                Self::Validation {
                    message,
                    code,
                    details: HashMap::new(),
                    suggestion: None,
                }
            }
            Some(
                code @ (ErrorCode::DatCorrupted
                | ErrorCode::DbConnectionFailed
                | ErrorCode::DbOperationFailed),
            ) => Self::Storage {
                message,
                code,
                source: None,
            },
            Some(code @ ErrorCode::NetConnectionFailed) => Self::Network {
                message,
                code,
                source: None,
            },
            Some(ErrorCode::Internal) | None => Self::from_http_status(status, &message),
        }
    }
}

impl From<rusqlite::Error> for DatumError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage {
            message: err.to_string(),
            code: ErrorCode::DbOperationFailed,
            source: Some(Box::new(err)),
        }
    }
}
