//! # pow-ledger
//!
//! A single-node, append-only ledger of proof-of-work sealed blocks that
//! carry UTXO-style value transfers.
//!
//! ## Layout
//! - `core/`: blocks, transactions, the proof-of-work sealer and the chain store
//! - `storage/`: the key-value seam (sled or in-memory) and the derived UTXO view
//! - `wallet/`: the key collaborator that maps identities to locking keys
//! - `ledger/`: the caller-facing service that serializes appends
//! - `config/`: defaults, TOML file and environment layering
//! - `utils/`: hashing, timestamps and bincode helpers
//! - `cli/`: command-line arguments for the `pow-ledger` binary

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod ledger;
pub mod storage;
pub mod utils;
pub mod wallet;

#[cfg(test)]
pub mod testnet;

pub use cli::{Command, Opt};
pub use config::{Config, GLOBAL_CONFIG};
pub use core::{Block, Blockchain, BlockchainIterator, ProofOfWork, TXInput, TXOutput, Transaction};
pub use error::{LedgerError, Result};
pub use ledger::Ledger;
pub use storage::{BatchOutcome, KvStore, MemoryStore, SledStore, SpendableOutputs, UTXOSet};
pub use utils::{current_timestamp, ripemd160_digest, sha256_digest};
pub use wallet::{hash_pub_key, ExactKeyring, HashedKeyring, Keyring};
