//! Error handling for the ledger
//!
//! Every fallible operation in the crate returns [`Result`], carrying a
//! [`LedgerError`] that says which layer failed and why.

use std::fmt;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Error taxonomy for ledger operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Stored bytes could not be decoded into a structurally valid block
    CorruptBlock(String),
    /// A ledger already exists where a new one was requested
    AlreadyExists(String),
    /// No ledger exists where an existing one was requested
    NotFound(String),
    /// The nonce space ran out before a hash below target was found
    SealingExhausted { difficulty: u32 },
    /// Spendable outputs do not cover the requested amount
    InsufficientFunds { required: u64, available: u64 },
    /// Failure reported by the persistence layer
    Store(String),
    /// A block hash referenced by the chain has no stored block
    MissingBlock(String),
    /// The block being appended does not extend the current tip
    StaleTip { expected: String, found: String },
    /// Block rejected before sealing or appending
    InvalidBlock(String),
    /// Transaction rejected by construction or validation
    InvalidTransaction(String),
    /// Address or identity the keyring cannot resolve
    InvalidAddress(String),
    /// Serialization errors outside block decoding
    Serialization(String),
    /// Configuration errors
    Config(String),
    /// File I/O errors
    Io(String),
    /// A poisoned lock guarding the append path
    Lock(String),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::CorruptBlock(msg) => write!(f, "Corrupt block: {msg}"),
            LedgerError::AlreadyExists(msg) => write!(f, "Ledger already exists: {msg}"),
            LedgerError::NotFound(msg) => write!(f, "Ledger not found: {msg}"),
            LedgerError::SealingExhausted { difficulty } => {
                write!(f, "Nonce space exhausted at difficulty {difficulty}")
            }
            LedgerError::InsufficientFunds {
                required,
                available,
            } => {
                write!(
                    f,
                    "Insufficient funds: required {required}, available {available}"
                )
            }
            LedgerError::Store(msg) => write!(f, "Store error: {msg}"),
            LedgerError::MissingBlock(hash) => write!(f, "Missing block: {hash}"),
            LedgerError::StaleTip { expected, found } => {
                write!(f, "Stale tip: block extends {found}, current tip is {expected}")
            }
            LedgerError::InvalidBlock(msg) => write!(f, "Invalid block: {msg}"),
            LedgerError::InvalidTransaction(msg) => write!(f, "Invalid transaction: {msg}"),
            LedgerError::InvalidAddress(addr) => write!(f, "Invalid address: {addr}"),
            LedgerError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            LedgerError::Config(msg) => write!(f, "Configuration error: {msg}"),
            LedgerError::Io(msg) => write!(f, "I/O error: {msg}"),
            LedgerError::Lock(msg) => write!(f, "Lock error: {msg}"),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Io(err.to_string())
    }
}

impl From<sled::Error> for LedgerError {
    fn from(err: sled::Error) -> Self {
        LedgerError::Store(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for LedgerError {
    fn from(err: bincode::error::EncodeError) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for LedgerError {
    fn from(err: bincode::error::DecodeError) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(err: toml::de::Error) -> Self {
        LedgerError::Config(err.to_string())
    }
}
