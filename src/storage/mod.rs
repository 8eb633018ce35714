//! Data storage
//!
//! The key-value seam the ledger persists through, and the UTXO view
//! derived from the stored chain.

pub mod kv;
pub mod utxo_set;

pub use kv::{BatchOutcome, KvStore, MemoryStore, SledStore};
pub use utxo_set::{SpendableOutputs, UTXOSet};
