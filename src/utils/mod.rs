//! Utility functions and helpers
//!
//! Hashing, timestamps, and the bincode helpers shared by the block and
//! transaction encodings.

pub mod crypto;
pub mod serialization;

pub use crypto::{current_timestamp, ripemd160_digest, sha256_digest};

pub use serialization::{deserialize, serialize};
