//! Configuration management
//!
//! Ledger settings (data directory, proof-of-work difficulty, coinbase
//! subsidy) resolved from defaults, an optional TOML file, and the
//! environment, in that order.

pub mod settings;

pub use settings::{
    Config, DEFAULT_DIFFICULTY, DEFAULT_SUBSIDY, GLOBAL_CONFIG, MAX_DIFFICULTY,
};
