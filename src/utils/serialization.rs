//! Thin bincode 2.x wrappers so every module encodes with the same configuration

use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};

/// Serialize data using bincode 2.0 with standard configuration
pub fn serialize<T: Serialize + bincode::Encode>(data: &T) -> Result<Vec<u8>> {
    let config = bincode::config::standard();
    bincode::encode_to_vec(data, config)
        .map_err(|e| LedgerError::Serialization(format!("Serialization failed: {e}")))
}

/// Deserialize data using bincode 2.0 with standard configuration.
///
/// The whole buffer must be consumed; trailing bytes are an error.
pub fn deserialize<T>(bytes: &[u8]) -> Result<T>
where
    T: for<'de> Deserialize<'de> + bincode::Decode<()>,
{
    let config = bincode::config::standard();
    let (data, read) = bincode::decode_from_slice(bytes, config)
        .map_err(|e| LedgerError::Serialization(format!("Deserialization failed: {e}")))?;
    if read != bytes.len() {
        return Err(LedgerError::Serialization(format!(
            "Deserialization left {} trailing bytes",
            bytes.len() - read
        )));
    }
    Ok(data)
}
