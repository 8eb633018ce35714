use crate::error::{LedgerError, Result};
use crate::utils::{ripemd160_digest, sha256_digest};

/// Ownership capability consumed by the ledger.
///
/// Swapping the implementation (for instance for one that checks real
/// signatures) changes who may spend an output without touching the chain
/// or UTXO logic.
pub trait Keyring: Send + Sync {
    /// Locking key embedded in an output paid to `address`.
    fn locking_key_for(&self, address: &str) -> Result<Vec<u8>>;

    /// Unlocking key embedded in inputs spent by `identity`.
    fn unlocking_key_for(&self, identity: &str) -> Result<Vec<u8>>;

    /// True when `unlocking_key` may spend an output locked with `locking_key`.
    fn matches(&self, unlocking_key: &[u8], locking_key: &[u8]) -> bool;
}

/// RIPEMD160(SHA256(pub_key)), the usual public-key-hash construction.
pub fn hash_pub_key(pub_key: &[u8]) -> Vec<u8> {
    let pub_key_sha256 = sha256_digest(pub_key);
    ripemd160_digest(pub_key_sha256.as_slice())
}

fn identity_bytes(identity: &str) -> Result<&[u8]> {
    if identity.is_empty() {
        return Err(LedgerError::InvalidAddress(
            "Address must not be empty".to_string(),
        ));
    }
    Ok(identity.as_bytes())
}

/// Treats an identity's bytes as its public key and locks outputs to the
/// public-key hash.
#[derive(Debug, Default, Clone, Copy)]
pub struct HashedKeyring;

impl Keyring for HashedKeyring {
    fn locking_key_for(&self, address: &str) -> Result<Vec<u8>> {
        Ok(hash_pub_key(identity_bytes(address)?))
    }

    fn unlocking_key_for(&self, identity: &str) -> Result<Vec<u8>> {
        Ok(identity_bytes(identity)?.to_vec())
    }

    fn matches(&self, unlocking_key: &[u8], locking_key: &[u8]) -> bool {
        hash_pub_key(unlocking_key).as_slice() == locking_key
    }
}

/// Locking and unlocking keys are the identity bytes themselves.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExactKeyring;

impl Keyring for ExactKeyring {
    fn locking_key_for(&self, address: &str) -> Result<Vec<u8>> {
        Ok(identity_bytes(address)?.to_vec())
    }

    fn unlocking_key_for(&self, identity: &str) -> Result<Vec<u8>> {
        Ok(identity_bytes(identity)?.to_vec())
    }

    fn matches(&self, unlocking_key: &[u8], locking_key: &[u8]) -> bool {
        unlocking_key == locking_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashed_keyring_matches_own_keys() {
        let keyring = HashedKeyring;
        let locking = keyring.locking_key_for("alice").unwrap();
        let unlocking = keyring.unlocking_key_for("alice").unwrap();

        assert_eq!(locking.len(), 20);
        assert!(keyring.matches(&unlocking, &locking));
    }

    #[test]
    fn test_hashed_keyring_rejects_other_identity() {
        let keyring = HashedKeyring;
        let locking = keyring.locking_key_for("alice").unwrap();
        let unlocking = keyring.unlocking_key_for("bob").unwrap();
        assert!(!keyring.matches(&unlocking, &locking));
        // The raw hash itself is not an unlocking key
        assert!(!keyring.matches(&locking, &locking));
    }

    #[test]
    fn test_exact_keyring() {
        let keyring = ExactKeyring;
        let locking = keyring.locking_key_for("carol").unwrap();
        assert_eq!(locking, b"carol".to_vec());
        assert!(keyring.matches(b"carol", &locking));
        assert!(!keyring.matches(b"carl", &locking));
    }

    #[test]
    fn test_empty_identity_rejected() {
        assert!(matches!(
            HashedKeyring.locking_key_for(""),
            Err(LedgerError::InvalidAddress(_))
        ));
        assert!(ExactKeyring.unlocking_key_for("").is_err());
    }
}
