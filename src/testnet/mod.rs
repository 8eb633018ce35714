//! Fixtures for fast in-process ledger tests
//!
//! Everything here runs on `MemoryStore` at difficulty 1 so sealing is
//! near-instant.

pub mod test_utils;

pub use test_utils::*;
