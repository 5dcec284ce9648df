//! Error types for the ledger
//!
//! Every error belongs to one [`ErrorClass`]. Validation, business and
//! external failures are recoverable: they are raised before any write is
//! committed and leave state untouched. Invariant, corruption and storage
//! failures are fatal and abort the enclosing state transition.

use crate::types::{Amount, EpochDay};
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification used by callers to decide whether to reject the
/// request or halt the state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed input
    Validation,
    /// Valid input that violates a business rule
    Business,
    /// A collaborator outside the ledger failed
    External,
    /// Calling logic broke a ledger invariant
    Invariant,
    /// Persisted bytes do not decode
    Corruption,
    /// Backend failure
    Storage,
}

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed input (bad identifier, bad denom, zero amount, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Vault id not known to this ledger
    #[error("Unknown vault: {0}")]
    UnknownVault(String),

    /// Requested withdrawal exceeds the actual withdrawable balance
    #[error("Insufficient funds: requested {requested}{denom}, available {available}{denom}")]
    InsufficientFunds {
        /// Denom of the request
        denom: String,
        /// Amount requested
        requested: Amount,
        /// Amount available
        available: Amount,
    },

    /// Subtraction would take a balance below zero
    #[error("Negative balance: cannot subtract {requested}{denom} from {available}{denom}")]
    NegativeBalance {
        /// Denom being subtracted
        denom: String,
        /// Amount subtracted
        requested: Amount,
        /// Amount held
        available: Amount,
    },

    /// Epoch tick for a day that was already swept
    #[error("Epoch day {requested} already processed (last processed {last})")]
    EpochAlreadyProcessed {
        /// Day supplied by the clock
        requested: EpochDay,
        /// Last day swept
        last: EpochDay,
    },

    /// Clock jumped further ahead than catch-up allows
    #[error("Epoch day {requested} skips more than {max} days since last processed {last}")]
    EpochGapTooLarge {
        /// Day supplied by the clock
        requested: EpochDay,
        /// Last day swept
        last: EpochDay,
        /// Longest gap swept in one tick
        max: u64,
    },

    /// Transfer service rejected the movement of funds
    #[error("Transfer failed: {0}")]
    Transfer(String),

    /// Subtract against an entry that was never created
    #[error("Invariant violation: subtract against non-existent balance in {namespace} ({key})")]
    MissingBalance {
        /// Ledger namespace
        namespace: &'static str,
        /// Human readable key
        key: String,
    },

    /// Invariant violation (overflow, denom mismatch, etc.)
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Stored bytes failed to decode to the expected shape
    #[error("Corrupted state: {0}")]
    Corruption(String),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Metrics registration error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl Error {
    /// Classify this error
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::Validation(_) | Error::UnknownVault(_) | Error::Config(_) => {
                ErrorClass::Validation
            }
            Error::InsufficientFunds { .. }
            | Error::NegativeBalance { .. }
            | Error::EpochAlreadyProcessed { .. }
            | Error::EpochGapTooLarge { .. } => ErrorClass::Business,
            Error::Transfer(_) => ErrorClass::External,
            Error::MissingBalance { .. } | Error::InvariantViolation(_) => ErrorClass::Invariant,
            Error::Corruption(_) | Error::Serialization(_) => ErrorClass::Corruption,
            Error::Storage(_) | Error::Io(_) | Error::Metrics(_) => ErrorClass::Storage,
        }
    }

    /// True when the enclosing state transition must be aborted
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.class(),
            ErrorClass::Invariant | ErrorClass::Corruption | ErrorClass::Storage
        )
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub(crate) fn corruption(msg: impl Into<String>) -> Self {
        Error::Corruption(msg.into())
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
