//! # Domain Errors
//!
//! Error taxonomy for the settlement core.
//!
//! Every failure belongs to one of four classes that the block-processing
//! driver can branch on (see [`ErrorKind`]). Storage and codec failures are
//! carried separately because they are never caused by caller input.
//!
//! Any error returned from a mutating step aborts the whole step: the staged
//! writes are dropped and nothing becomes visible.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for settlement operations.
pub type SettlementResult<T> = Result<T, SettlementError>;

/// Coarse error class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Malformed or out-of-order input.
    InvalidArgument,
    /// Duplicate key, ref or binding.
    Conflict,
    /// Unknown key or binding.
    NotFound,
    /// Illegal lifecycle transition.
    InvalidState,
    /// Backing store or codec failure.
    Internal,
}

/// Settlement core errors.
#[derive(Debug, Error)]
pub enum SettlementError {
    /// Malformed or out-of-order input.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Duplicate key, ref or binding.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Unknown key or binding.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Illegal packet lifecycle transition.
    #[error("Invalid state transition for packet {key}: {from} -> {to}")]
    InvalidState {
        /// Packet key (hex)
        key: String,
        /// Current status
        from: String,
        /// Attempted status
        to: String,
    },

    /// Backing key-value store failure.
    #[error("Storage error: {0}")]
    Storage(#[from] KVStoreError),

    /// Stored value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SettlementError {
    /// Error class for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::Storage(_) | Self::Serialization(_) => ErrorKind::Internal,
        }
    }

    /// Shorthand for `kind() == ErrorKind::NotFound`.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl From<bincode::Error> for SettlementError {
    fn from(err: bincode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Key-value store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KVStoreError {
    /// I/O error during read/write.
    #[error("KV store I/O error: {message}")]
    IOError {
        /// Backend message
        message: String,
    },
    /// Data corruption in the store.
    #[error("KV store corruption: {message}")]
    CorruptionError {
        /// Backend message
        message: String,
    },
}
