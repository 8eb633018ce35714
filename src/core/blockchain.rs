//! The ledger store: sealed blocks keyed by hash plus one reserved key holding
//! the tip. Block and tip are always written in the same atomic batch, and
//! only if the tip still holds the block's parent at commit time.

use crate::core::{Block, ProofOfWork, Transaction};
use crate::error::{LedgerError, Result};
use crate::storage::{BatchOutcome, KvStore};
use data_encoding::HEXLOWER;
use log::{info, warn};
use std::collections::HashSet;
use std::sync::Arc;

const TIP_BLOCK_HASH_KEY: &[u8] = b"tip_block_hash";
const GENESIS_COINBASE_DATA: &str =
    "The Times 03/Jan/2009 Chancellor on brink of second bailout for banks";

#[derive(Clone)]
pub struct Blockchain {
    store: Arc<dyn KvStore>,
    pow: ProofOfWork,
}

impl Blockchain {
    /// Initialise a new ledger whose genesis block pays `subsidy` to
    /// `genesis_locking_key`. Fails if the store already holds a tip.
    pub fn create_blockchain(
        store: Arc<dyn KvStore>,
        genesis_locking_key: &[u8],
        pow: ProofOfWork,
        subsidy: u64,
    ) -> Result<Blockchain> {
        if let Some(tip) = store.get(TIP_BLOCK_HASH_KEY)? {
            return Err(LedgerError::AlreadyExists(format!(
                "Ledger with tip {} already exists",
                HEXLOWER.encode(&tip)
            )));
        }

        info!(
            "Creating genesis block for locking key {}",
            HEXLOWER.encode(genesis_locking_key)
        );
        let coinbase_tx =
            Transaction::new_coinbase_tx(genesis_locking_key, GENESIS_COINBASE_DATA, subsidy)?;
        let genesis = Block::generate_genesis_block(&coinbase_tx, &pow)?;

        let blockchain = Blockchain { store, pow };
        match blockchain.write_block_and_tip(&genesis, None)? {
            BatchOutcome::Written => {
                info!("Genesis block {} written", genesis.get_hash_hex());
                Ok(blockchain)
            }
            BatchOutcome::Conflict(tip) => Err(LedgerError::AlreadyExists(format!(
                "Ledger with tip {} was created concurrently",
                HEXLOWER.encode(tip.as_deref().unwrap_or_default())
            ))),
        }
    }

    /// Open an existing ledger. Fails if the store holds no tip.
    pub fn open_blockchain(store: Arc<dyn KvStore>, pow: ProofOfWork) -> Result<Blockchain> {
        if store.get(TIP_BLOCK_HASH_KEY)?.is_none() {
            return Err(LedgerError::NotFound(
                "No existing blockchain found. Create one first.".to_string(),
            ));
        }
        Ok(Blockchain { store, pow })
    }

    pub fn get_pow(&self) -> &ProofOfWork {
        &self.pow
    }

    pub fn get_tip_hash(&self) -> Result<Vec<u8>> {
        self.store
            .get(TIP_BLOCK_HASH_KEY)?
            .ok_or_else(|| LedgerError::NotFound("Tip hash not found".to_string()))
    }

    fn write_block_and_tip(
        &self,
        block: &Block,
        expected_tip: Option<&[u8]>,
    ) -> Result<BatchOutcome> {
        let block_data = block.serialize()?;
        self.store.write_batch_if(
            TIP_BLOCK_HASH_KEY,
            expected_tip,
            &[
                (block.get_hash().to_vec(), block_data),
                (TIP_BLOCK_HASH_KEY.to_vec(), block.get_hash().to_vec()),
            ],
        )
    }

    /// Persist a sealed block that extends the current tip and move the tip
    /// to it, both in one atomic batch. The parent check happens inside that
    /// batch, so of two blocks sealed on the same tip only one lands.
    pub fn append_block(&self, block: &Block) -> Result<()> {
        if !self.pow.validate(block) {
            return Err(LedgerError::InvalidBlock(format!(
                "Block {} does not satisfy proof-of-work",
                block.get_hash_hex()
            )));
        }

        match self.write_block_and_tip(block, Some(block.get_pre_block_hash()))? {
            BatchOutcome::Written => {
                info!("Appended block {}", block.get_hash_hex());
                Ok(())
            }
            BatchOutcome::Conflict(Some(tip)) => {
                warn!(
                    "Rejecting block {} built on {}",
                    block.get_hash_hex(),
                    HEXLOWER.encode(block.get_pre_block_hash())
                );
                Err(LedgerError::StaleTip {
                    expected: HEXLOWER.encode(&tip),
                    found: HEXLOWER.encode(block.get_pre_block_hash()),
                })
            }
            BatchOutcome::Conflict(None) => {
                Err(LedgerError::NotFound("Tip hash not found".to_string()))
            }
        }
    }

    /// Seal `transactions` on top of the current tip and append the block.
    ///
    /// If another block lands first the append is refused with `StaleTip`.
    pub fn mine_block(&self, transactions: &[Transaction]) -> Result<Block> {
        let tip = self.get_tip_hash()?;
        self.mine_block_on(&tip, transactions)
    }

    /// Like [`Blockchain::mine_block`], against a tip the caller read earlier.
    /// Anything the caller checked against the chain at `tip` stays valid:
    /// the append fails with `StaleTip` if the tip has moved since.
    pub fn mine_block_on(&self, tip: &[u8], transactions: &[Transaction]) -> Result<Block> {
        Self::check_block_structure(transactions)?;
        Self::check_for_double_spending(transactions)?;
        self.check_ids_unused(tip, transactions)?;

        info!(
            "Mining block on {} with {} transactions (difficulty: {})",
            HEXLOWER.encode(tip),
            transactions.len(),
            self.pow.get_difficulty()
        );
        let block = Block::new_block(tip, transactions, &self.pow)?;
        self.append_block(&block)?;
        Ok(block)
    }

    // A coinbase may only appear as the first transaction, and at most once
    fn check_block_structure(transactions: &[Transaction]) -> Result<()> {
        if transactions.is_empty() {
            return Err(LedgerError::InvalidBlock(
                "Block must contain at least one transaction".to_string(),
            ));
        }
        let mut ids: HashSet<&[u8]> = HashSet::new();
        for (idx, tx) in transactions.iter().enumerate() {
            if !ids.insert(tx.get_id()) {
                return Err(LedgerError::InvalidTransaction(format!(
                    "Transaction {} appears twice in the block",
                    HEXLOWER.encode(tx.get_id())
                )));
            }
            if idx > 0 && tx.is_coinbase() {
                return Err(LedgerError::InvalidBlock(format!(
                    "Coinbase transaction at position {idx}; only the first may be a coinbase"
                )));
            }
            if !tx.is_coinbase() && tx.get_vin().iter().any(|vin| vin.is_coinbase_input()) {
                return Err(LedgerError::InvalidTransaction(format!(
                    "Transaction {} mixes a coinbase input with other inputs",
                    HEXLOWER.encode(tx.get_id())
                )));
            }
            if tx.hash()?.as_slice() != tx.get_id() {
                return Err(LedgerError::InvalidTransaction(format!(
                    "Transaction id {} does not match its contents",
                    HEXLOWER.encode(tx.get_id())
                )));
            }
        }
        Ok(())
    }

    // The same outpoint must not be spent twice within one block
    fn check_for_double_spending(transactions: &[Transaction]) -> Result<()> {
        let mut spent_outputs: HashSet<(Vec<u8>, usize)> = HashSet::new();

        for (tx_index, transaction) in transactions.iter().enumerate() {
            if transaction.is_coinbase() {
                continue;
            }
            for input in transaction.get_vin() {
                let Some(vout) = input.get_vout() else {
                    continue;
                };
                if !spent_outputs.insert((input.get_txid().to_vec(), vout)) {
                    return Err(LedgerError::InvalidTransaction(format!(
                        "Double-spending in transaction {}: output {}:{} already spent in this block",
                        tx_index,
                        HEXLOWER.encode(input.get_txid()),
                        vout
                    )));
                }
            }
        }
        Ok(())
    }

    // A txid names one transaction for the life of the chain; a repeat would
    // make two sets of outputs share outpoints
    fn check_ids_unused(&self, tip: &[u8], transactions: &[Transaction]) -> Result<()> {
        let ids: HashSet<&[u8]> = transactions.iter().map(|tx| tx.get_id()).collect();
        for block in BlockchainIterator::new(tip.to_vec(), Arc::clone(&self.store)) {
            let block = block?;
            for tx in block.get_transactions() {
                if ids.contains(tx.get_id()) {
                    return Err(LedgerError::InvalidTransaction(format!(
                        "Transaction {} is already on the chain",
                        HEXLOWER.encode(tx.get_id())
                    )));
                }
            }
        }
        Ok(())
    }

    /// Cursor over the chain, newest block first, ending at genesis.
    pub fn iterator(&self) -> Result<BlockchainIterator> {
        Ok(BlockchainIterator::new(
            self.get_tip_hash()?,
            Arc::clone(&self.store),
        ))
    }

    /// Number of blocks above genesis.
    pub fn get_best_height(&self) -> Result<usize> {
        let mut height = 0usize;
        for block in self.iterator()? {
            block?;
            height += 1;
        }
        Ok(height.saturating_sub(1))
    }

    pub fn find_transaction(&self, txid: &[u8]) -> Result<Option<Transaction>> {
        for block in self.iterator()? {
            let block = block?;
            for transaction in block.get_transactions() {
                if txid.eq(transaction.get_id()) {
                    return Ok(Some(transaction.clone()));
                }
            }
        }
        Ok(None)
    }
}

/// Backward cursor over stored blocks.
///
/// The tip is read once, when the cursor is created; blocks appended later
/// are not visited by this cursor.
pub struct BlockchainIterator {
    store: Arc<dyn KvStore>,
    current_hash: Option<Vec<u8>>,
}

impl BlockchainIterator {
    fn new(tip_hash: Vec<u8>, store: Arc<dyn KvStore>) -> BlockchainIterator {
        BlockchainIterator {
            store,
            current_hash: Some(tip_hash),
        }
    }

    fn load(&self, hash: &[u8]) -> Result<Block> {
        let data = self
            .store
            .get(hash)?
            .ok_or_else(|| LedgerError::MissingBlock(HEXLOWER.encode(hash)))?;
        let block = Block::deserialize(&data)?;
        if block.get_hash() != hash {
            return Err(LedgerError::CorruptBlock(format!(
                "Block stored under {} hashes to {}",
                HEXLOWER.encode(hash),
                block.get_hash_hex()
            )));
        }
        Ok(block)
    }
}

impl Iterator for BlockchainIterator {
    type Item = Result<Block>;

    // Stops after genesis, or after the first error
    fn next(&mut self) -> Option<Self::Item> {
        let hash = self.current_hash.take()?;
        match self.load(&hash) {
            Ok(block) => {
                if !block.is_genesis() {
                    self.current_hash = Some(block.get_pre_block_hash().to_vec());
                }
                Some(Ok(block))
            }
            Err(e) => Some(Err(e)),
        }
    }
}
