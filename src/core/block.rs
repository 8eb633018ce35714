use crate::core::{ProofOfWork, Transaction};
use crate::error::{LedgerError, Result};
use crate::utils::{current_timestamp, deserialize, serialize, sha256_digest};
use data_encoding::HEXLOWER;
use log::info;
use serde::{Deserialize, Serialize};

const HASH_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Block {
    timestamp: i64,
    pre_block_hash: Vec<u8>, // empty only on genesis
    hash: Vec<u8>,
    transactions: Vec<Transaction>,
    nonce: u64,
}

impl Block {
    /// Build a block on top of `pre_block_hash` and seal it.
    pub fn new_block(
        pre_block_hash: &[u8],
        transactions: &[Transaction],
        pow: &ProofOfWork,
    ) -> Result<Block> {
        let timestamp = current_timestamp()?;
        Self::new_block_at(timestamp, pre_block_hash, transactions, pow)
    }

    pub(crate) fn new_block_at(
        timestamp: i64,
        pre_block_hash: &[u8],
        transactions: &[Transaction],
        pow: &ProofOfWork,
    ) -> Result<Block> {
        if transactions.is_empty() {
            return Err(LedgerError::InvalidBlock(
                "Block must contain at least one transaction".to_string(),
            ));
        }

        let mut block = Block {
            timestamp,
            pre_block_hash: pre_block_hash.to_vec(),
            hash: vec![],
            transactions: transactions.to_vec(),
            nonce: 0,
        };

        let (nonce, hash) = pow.run(&block)?;
        block.nonce = nonce;
        block.hash = hash;
        info!(
            "Sealed block {} with nonce {nonce} (difficulty {})",
            block.get_hash_hex(),
            pow.get_difficulty()
        );

        Ok(block)
    }

    pub fn generate_genesis_block(coinbase: &Transaction, pow: &ProofOfWork) -> Result<Block> {
        if !coinbase.is_coinbase() {
            return Err(LedgerError::InvalidBlock(
                "Genesis block must hold a coinbase transaction".to_string(),
            ));
        }
        Block::new_block(&[], std::slice::from_ref(coinbase), pow)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Block> {
        let block: Block = deserialize(bytes)
            .map_err(|e| LedgerError::CorruptBlock(format!("Undecodable block: {e}")))?;

        if block.hash.len() != HASH_LEN {
            return Err(LedgerError::CorruptBlock(format!(
                "Block hash has {} bytes, expected {HASH_LEN}",
                block.hash.len()
            )));
        }
        if block.transactions.is_empty() {
            return Err(LedgerError::CorruptBlock(format!(
                "Block {} has no transactions",
                block.get_hash_hex()
            )));
        }
        if !block.pre_block_hash.is_empty() && block.pre_block_hash.len() != HASH_LEN {
            return Err(LedgerError::CorruptBlock(format!(
                "Block {} has a malformed previous hash",
                block.get_hash_hex()
            )));
        }
        Ok(block)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn get_pre_block_hash(&self) -> &[u8] {
        self.pre_block_hash.as_slice()
    }

    pub fn get_hash(&self) -> &[u8] {
        self.hash.as_slice()
    }

    pub fn get_hash_hex(&self) -> String {
        HEXLOWER.encode(&self.hash)
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_nonce(&self) -> u64 {
        self.nonce
    }

    pub fn is_genesis(&self) -> bool {
        self.pre_block_hash.is_empty()
    }

    /// SHA-256 over the transaction ids concatenated in block order.
    pub fn hash_transactions(&self) -> Vec<u8> {
        let mut txhashs = vec![];
        for transaction in &self.transactions {
            txhashs.extend(transaction.get_id());
        }

        sha256_digest(txhashs.as_slice())
    }

    #[cfg(test)]
    pub(crate) fn set_nonce_for_test(&mut self, nonce: u64) {
        self.nonce = nonce;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pow() -> ProofOfWork {
        ProofOfWork::new(1).unwrap()
    }

    fn coinbase() -> Transaction {
        Transaction::new_coinbase_tx(b"miner", "test", 10).unwrap()
    }

    #[test]
    fn test_new_block_is_sealed() {
        let block = Block::new_block(&[7u8; 32], &[coinbase()], &pow()).unwrap();
        assert_eq!(block.get_hash().len(), 32);
        assert!(pow().validate(&block));
        assert!(!block.is_genesis());
    }

    #[test]
    fn test_empty_block_rejected() {
        assert!(matches!(
            Block::new_block(&[7u8; 32], &[], &pow()),
            Err(LedgerError::InvalidBlock(_))
        ));
    }

    #[test]
    fn test_genesis_has_empty_prev_hash() {
        let block = Block::generate_genesis_block(&coinbase(), &pow()).unwrap();
        assert!(block.is_genesis());
        assert!(block.get_pre_block_hash().is_empty());
    }

    #[test]
    fn test_hash_transactions_depends_on_order() {
        let a = coinbase();
        let b = Transaction::new_coinbase_tx(b"other", "test", 10).unwrap();
        let ab = Block::new_block(&[1u8; 32], &[a.clone(), b.clone()], &pow()).unwrap();
        let ba = Block::new_block(&[1u8; 32], &[b, a], &pow()).unwrap();
        assert_ne!(ab.hash_transactions(), ba.hash_transactions());

        let mut ids = ab.get_transactions()[0].get_id().to_vec();
        ids.extend(ab.get_transactions()[1].get_id());
        assert_eq!(ab.hash_transactions(), sha256_digest(&ids));
    }

    #[test]
    fn test_serialize_roundtrip() {
        let block = Block::new_block(&[3u8; 32], &[coinbase()], &pow()).unwrap();
        let decoded = Block::deserialize(&block.serialize().unwrap()).unwrap();
        assert_eq!(decoded, block);
        assert!(pow().validate(&decoded));
    }

    #[test]
    fn test_garbage_is_corrupt_block() {
        assert!(matches!(
            Block::deserialize(&[0xFF, 0x01, 0x02]),
            Err(LedgerError::CorruptBlock(_))
        ));
    }

    #[test]
    fn test_truncated_bytes_are_corrupt_block() {
        let block = Block::new_block(&[3u8; 32], &[coinbase()], &pow()).unwrap();
        let bytes = block.serialize().unwrap();
        assert!(matches!(
            Block::deserialize(&bytes[..bytes.len() / 2]),
            Err(LedgerError::CorruptBlock(_))
        ));
    }

    #[test]
    fn test_unsealed_block_is_corrupt() {
        let unsealed = Block {
            timestamp: 0,
            pre_block_hash: vec![],
            hash: vec![],
            transactions: vec![coinbase()],
            nonce: 0,
        };
        let bytes = unsealed.serialize().unwrap();
        assert!(matches!(
            Block::deserialize(&bytes),
            Err(LedgerError::CorruptBlock(_))
        ));
    }
}
