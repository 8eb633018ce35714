//! Key collaborator
//!
//! The ledger never handles private keys. It only needs a locking key to
//! put on new outputs, an unlocking key to put on new inputs, and a
//! predicate telling whether the two belong together.

pub mod keyring;

pub use keyring::{hash_pub_key, ExactKeyring, HashedKeyring, Keyring};
