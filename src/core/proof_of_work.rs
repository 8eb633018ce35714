use crate::config::MAX_DIFFICULTY;
use crate::core::Block;
use crate::error::{LedgerError, Result};
use crate::utils::sha256_digest;
use log::debug;
use num_bigint::{BigInt, Sign};
use std::ops::ShlAssign;

const MAX_NONCE: u64 = u64::MAX;

/// Seals blocks by searching for a nonce whose hash falls below
/// `1 << (256 - 4 * difficulty)`.
#[derive(Debug, Clone)]
pub struct ProofOfWork {
    difficulty: u32,
    target: BigInt,
    max_nonce: u64,
}

impl ProofOfWork {
    pub fn new(difficulty: u32) -> Result<ProofOfWork> {
        if difficulty == 0 || difficulty > MAX_DIFFICULTY {
            return Err(LedgerError::Config(format!(
                "Difficulty must be within 1..={MAX_DIFFICULTY}, got {difficulty}"
            )));
        }
        let mut target = BigInt::from(1);
        target.shl_assign(256 - 4 * difficulty);
        Ok(ProofOfWork {
            difficulty,
            target,
            max_nonce: MAX_NONCE,
        })
    }

    #[cfg(test)]
    fn with_max_nonce(mut self, max_nonce: u64) -> ProofOfWork {
        self.max_nonce = max_nonce;
        self
    }

    pub fn get_difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn get_target(&self) -> &BigInt {
        &self.target
    }

    fn prepare_data(&self, block: &Block, nonce: u64) -> Vec<u8> {
        let mut data_bytes = vec![];
        data_bytes.extend(block.get_pre_block_hash());
        data_bytes.extend(block.hash_transactions());
        data_bytes.extend(block.get_timestamp().to_be_bytes());
        data_bytes.extend(self.difficulty.to_be_bytes());
        data_bytes.extend(nonce.to_be_bytes());
        data_bytes
    }

    fn meets_target(&self, hash: &[u8]) -> bool {
        BigInt::from_bytes_be(Sign::Plus, hash) < self.target
    }

    /// Search nonces from zero upward; returns the first `(nonce, hash)`
    /// below target.
    pub fn run(&self, block: &Block) -> Result<(u64, Vec<u8>)> {
        // The transactions digest does not change between attempts
        let mut prefix = vec![];
        prefix.extend(block.get_pre_block_hash());
        prefix.extend(block.hash_transactions());
        prefix.extend(block.get_timestamp().to_be_bytes());
        prefix.extend(self.difficulty.to_be_bytes());
        let nonce_at = prefix.len();

        for nonce in 0..self.max_nonce {
            prefix.truncate(nonce_at);
            prefix.extend(nonce.to_be_bytes());
            let hash = sha256_digest(prefix.as_slice());
            if self.meets_target(&hash) {
                debug!("Found nonce {nonce} after {} attempts", nonce + 1);
                return Ok((nonce, hash));
            }
        }

        Err(LedgerError::SealingExhausted {
            difficulty: self.difficulty,
        })
    }

    /// Recompute the seal from the stored nonce. True when the digest is
    /// below target and equals the stored hash.
    pub fn validate(&self, block: &Block) -> bool {
        let data = self.prepare_data(block, block.get_nonce());
        let hash = sha256_digest(data.as_slice());
        self.meets_target(&hash) && hash.as_slice() == block.get_hash()
    }
}
