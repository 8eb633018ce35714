//! Caller-facing ledger service
//!
//! Ties the block store, the sealer, the derived UTXO view and the key
//! collaborator together behind the operations a CLI or service layer
//! needs: create, mine, balance, send and iterate.

use crate::config::Config;
use crate::core::{Block, Blockchain, BlockchainIterator, ProofOfWork, Transaction};
use crate::error::{LedgerError, Result};
use crate::storage::{KvStore, SledStore, UTXOSet};
use crate::wallet::Keyring;
use data_encoding::HEXLOWER;
use log::info;
use std::sync::{Arc, Mutex, MutexGuard};

pub struct Ledger {
    blockchain: Blockchain,
    keyring: Arc<dyn Keyring>,
    subsidy: u64,
    // Serializes appends through this handle; appends through other handles
    // on the same store are caught by the guarded tip write
    append_lock: Mutex<()>,
}

impl Ledger {
    pub fn create(
        store: Arc<dyn KvStore>,
        reward_locking_key: &[u8],
        config: &Config,
        keyring: Arc<dyn Keyring>,
    ) -> Result<Ledger> {
        config.validate()?;
        let pow = ProofOfWork::new(config.difficulty)?;
        let blockchain =
            Blockchain::create_blockchain(store, reward_locking_key, pow, config.subsidy)?;
        Ok(Self::from_parts(blockchain, keyring, config.subsidy))
    }

    pub fn open(
        store: Arc<dyn KvStore>,
        config: &Config,
        keyring: Arc<dyn Keyring>,
    ) -> Result<Ledger> {
        config.validate()?;
        let pow = ProofOfWork::new(config.difficulty)?;
        let blockchain = Blockchain::open_blockchain(store, pow)?;
        Ok(Self::from_parts(blockchain, keyring, config.subsidy))
    }

    /// Create a sled-backed ledger under `config.db_path()`.
    pub fn create_with_path(
        reward_locking_key: &[u8],
        config: &Config,
        keyring: Arc<dyn Keyring>,
    ) -> Result<Ledger> {
        let store = SledStore::open(&config.db_path())?;
        let ledger = Self::create(Arc::new(store.clone()), reward_locking_key, config, keyring)?;
        store.flush()?;
        Ok(ledger)
    }

    pub fn open_with_path(config: &Config, keyring: Arc<dyn Keyring>) -> Result<Ledger> {
        let store = SledStore::open(&config.db_path())?;
        info!("Opening ledger at {}", store.get_path().display());
        Self::open(Arc::new(store), config, keyring)
    }

    fn from_parts(blockchain: Blockchain, keyring: Arc<dyn Keyring>, subsidy: u64) -> Ledger {
        Ledger {
            blockchain,
            keyring,
            subsidy,
            append_lock: Mutex::new(()),
        }
    }

    pub fn get_blockchain(&self) -> &Blockchain {
        &self.blockchain
    }

    pub fn utxo_set(&self) -> UTXOSet {
        UTXOSet::new(self.blockchain.clone(), Arc::clone(&self.keyring))
    }

    fn lock_appends(&self) -> Result<MutexGuard<'_, ()>> {
        self.append_lock
            .lock()
            .map_err(|e| LedgerError::Lock(format!("Append lock poisoned: {e}")))
    }

    // A coinbase mints exactly one output worth the configured subsidy
    fn check_coinbase(&self, coinbase: &Transaction) -> Result<()> {
        let txid_hex = HEXLOWER.encode(coinbase.get_id());
        match coinbase.get_vout() {
            [output] if output.get_value() == self.subsidy => Ok(()),
            [output] => Err(LedgerError::InvalidTransaction(format!(
                "Coinbase {txid_hex} mints {} instead of the subsidy {}",
                output.get_value(),
                self.subsidy
            ))),
            outputs => Err(LedgerError::InvalidTransaction(format!(
                "Coinbase {txid_hex} has {} outputs, expected 1",
                outputs.len()
            ))),
        }
    }

    // Caller holds the append lock and read `tip` before building anything
    // from chain state, so a tip that moves in between fails the append
    fn validate_and_mine(&self, tip: &[u8], transactions: &[Transaction]) -> Result<Block> {
        let utxo_set = self.utxo_set();
        for transaction in transactions {
            if transaction.is_coinbase() {
                self.check_coinbase(transaction)?;
            }
            utxo_set.validate_transaction(transaction)?;
        }
        self.blockchain.mine_block_on(tip, transactions)
    }

    /// Validate `transactions` against the current chain, seal them into a
    /// block on top of the tip and append it.
    pub fn mine_block(&self, transactions: &[Transaction]) -> Result<Block> {
        let _guard = self.lock_appends()?;
        let tip = self.blockchain.get_tip_hash()?;
        self.validate_and_mine(&tip, transactions)
    }

    /// Like [`Ledger::mine_block`], with a fresh coinbase paying the subsidy
    /// to `reward_locking_key` placed first.
    pub fn mine_block_with_reward(
        &self,
        transactions: &[Transaction],
        reward_locking_key: &[u8],
    ) -> Result<Block> {
        let coinbase = Transaction::new_coinbase_tx(reward_locking_key, "", self.subsidy)?;
        let mut block_transactions = Vec::with_capacity(transactions.len() + 1);
        block_transactions.push(coinbase);
        block_transactions.extend_from_slice(transactions);

        let _guard = self.lock_appends()?;
        let tip = self.blockchain.get_tip_hash()?;
        self.validate_and_mine(&tip, &block_transactions)
    }

    pub fn get_balance(&self, locking_key: &[u8]) -> Result<u64> {
        self.utxo_set().get_balance(locking_key)
    }

    /// Build a spend of `amount` from `from_identity` to `to_locking_key` and
    /// mine it in its own block. Nothing is written when it fails.
    pub fn send(&self, from_identity: &str, to_locking_key: &[u8], amount: u64) -> Result<Block> {
        self.send_inner(from_identity, to_locking_key, amount, None)
    }

    /// [`Ledger::send`] with a subsidy coinbase to `reward_locking_key` in the
    /// same block.
    pub fn send_with_reward(
        &self,
        from_identity: &str,
        to_locking_key: &[u8],
        amount: u64,
        reward_locking_key: &[u8],
    ) -> Result<Block> {
        self.send_inner(from_identity, to_locking_key, amount, Some(reward_locking_key))
    }

    fn send_inner(
        &self,
        from_identity: &str,
        to_locking_key: &[u8],
        amount: u64,
        reward_locking_key: Option<&[u8]>,
    ) -> Result<Block> {
        let from_unlocking_key = self.keyring.unlocking_key_for(from_identity)?;
        let from_locking_key = self.keyring.locking_key_for(from_identity)?;

        let mut transactions = vec![];
        if let Some(reward_locking_key) = reward_locking_key {
            transactions.push(Transaction::new_coinbase_tx(
                reward_locking_key,
                "",
                self.subsidy,
            )?);
        }

        // Selection and append share one critical section so two sends
        // cannot pick the same outputs
        let _guard = self.lock_appends()?;
        let tip = self.blockchain.get_tip_hash()?;
        transactions.push(Transaction::new_utxo_transaction(
            &from_unlocking_key,
            &from_locking_key,
            to_locking_key,
            amount,
            &self.utxo_set(),
        )?);
        let block = self.validate_and_mine(&tip, &transactions)?;
        info!(
            "Sent {amount} from {from_identity} to {} in block {}",
            HEXLOWER.encode(to_locking_key),
            block.get_hash_hex()
        );
        Ok(block)
    }

    /// Newest-first walk over the chain, ending with genesis.
    pub fn iterate_chain(&self) -> Result<BlockchainIterator> {
        self.blockchain.iterator()
    }
}
