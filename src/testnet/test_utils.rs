//! Test utilities for ledger testing

use crate::config::Config;
use crate::core::{Blockchain, ProofOfWork};
use crate::error::Result;
use crate::ledger::Ledger;
use crate::storage::{KvStore, MemoryStore};
use crate::wallet::{HashedKeyring, Keyring};
use std::sync::Arc;

pub const TEST_DIFFICULTY: u32 = 1;
pub const TEST_SUBSIDY: u64 = 10;

pub fn test_config() -> Config {
    Config {
        difficulty: TEST_DIFFICULTY,
        subsidy: TEST_SUBSIDY,
        ..Config::default()
    }
}

/// Locking key of `identity` under the default `HashedKeyring`.
pub fn locking_key(identity: &str) -> Vec<u8> {
    HashedKeyring.locking_key_for(identity).unwrap()
}

/// In-memory ledger whose genesis pays `reward_identity`.
pub fn create_test_ledger(reward_identity: &str) -> Result<Ledger> {
    Ledger::create(
        Arc::new(MemoryStore::new()),
        &locking_key(reward_identity),
        &test_config(),
        Arc::new(HashedKeyring),
    )
}

/// Bare chain over a fresh `MemoryStore`, returned with the store so tests
/// can poke at raw entries.
pub fn create_test_blockchain(genesis_locking_key: &[u8]) -> Result<(Blockchain, Arc<dyn KvStore>)> {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let blockchain = Blockchain::create_blockchain(
        Arc::clone(&store),
        genesis_locking_key,
        ProofOfWork::new(TEST_DIFFICULTY)?,
        TEST_SUBSIDY,
    )?;
    Ok((blockchain, store))
}

/// Walk the chain newest-first checking linkage and seals.
pub fn validate_chain_integrity(blockchain: &Blockchain) -> Result<bool> {
    let mut expected_hash = blockchain.get_tip_hash()?;
    let mut saw_genesis = false;

    for block in blockchain.iterator()? {
        let block = block?;
        if block.get_hash() != expected_hash.as_slice() {
            return Ok(false);
        }
        if !blockchain.get_pow().validate(&block) {
            return Ok(false);
        }
        saw_genesis = block.is_genesis();
        expected_hash = block.get_pre_block_hash().to_vec();
    }

    Ok(saw_genesis)
}

/// Sum of every unspent output on the chain, whatever key locks it.
pub fn total_unspent(ledger: &Ledger) -> Result<u64> {
    let unspent = ledger.utxo_set().find_all_unspent()?;
    Ok(unspent
        .values()
        .flat_map(|outputs| outputs.iter().map(|(_, output)| output.get_value()))
        .sum())
}

/// Count of coinbase transactions on the chain.
pub fn count_coinbases(blockchain: &Blockchain) -> Result<u64> {
    let mut count = 0;
    for block in blockchain.iterator()? {
        count += block?
            .get_transactions()
            .iter()
            .filter(|tx| tx.is_coinbase())
            .count() as u64;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_chain_is_intact() {
        let ledger = create_test_ledger("alice").unwrap();
        assert!(validate_chain_integrity(ledger.get_blockchain()).unwrap());
        assert_eq!(total_unspent(&ledger).unwrap(), TEST_SUBSIDY);
        assert_eq!(count_coinbases(ledger.get_blockchain()).unwrap(), 1);
    }
}
