use ring::digest::{Context, SHA256};
use ripemd::{Digest as RipemdDigest, Ripemd160};

use crate::error::{LedgerError, Result};
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch.
pub fn current_timestamp() -> Result<i64> {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| LedgerError::InvalidBlock(format!("System time error: {e}")))?
        .as_secs();

    i64::try_from(secs).map_err(|_| LedgerError::InvalidBlock("Timestamp overflow".to_string()))
}

pub fn sha256_digest(data: &[u8]) -> Vec<u8> {
    let mut context = Context::new(&SHA256);
    context.update(data);
    let digest = context.finish();
    digest.as_ref().to_vec()
}

pub fn ripemd160_digest(data: &[u8]) -> Vec<u8> {
    let mut hasher = Ripemd160::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_encoding::HEXLOWER;

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            HEXLOWER.encode(&sha256_digest(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_ripemd160_width() {
        assert_eq!(ripemd160_digest(b"key").len(), 20);
    }

    #[test]
    fn test_timestamp_is_seconds() {
        let now = current_timestamp().unwrap();
        // Well past 2020 in seconds, well below the same instant in millis
        assert!(now > 1_577_836_800);
        assert!(now < 100_000_000_000);
    }
}
