use crate::core::{Blockchain, TXOutput, Transaction};
use crate::error::{LedgerError, Result};
use crate::wallet::Keyring;
use data_encoding::HEXLOWER;
use log::debug;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Selected outpoints grouped by transaction id, in scan order.
pub type SpendableOutputs = Vec<(Vec<u8>, Vec<usize>)>;

/// Unspent-output view derived from the chain on every query.
///
/// Nothing is cached or persisted: each call walks the ledger from tip to
/// genesis, so answers always reflect the chain at the moment of the call.
pub struct UTXOSet {
    blockchain: Blockchain,
    keyring: Arc<dyn Keyring>,
}

impl UTXOSet {
    pub fn new(blockchain: Blockchain, keyring: Arc<dyn Keyring>) -> UTXOSet {
        UTXOSet {
            blockchain,
            keyring,
        }
    }

    pub fn get_blockchain(&self) -> &Blockchain {
        &self.blockchain
    }

    // Walks newest to oldest. Within a block every input is recorded before
    // any output is considered, so an output spent later in the same block
    // is never reported. `visit` returns false to stop early.
    fn scan_unspent<F>(&self, locking_key: &[u8], mut visit: F) -> Result<()>
    where
        F: FnMut(&Transaction, usize, &TXOutput) -> bool,
    {
        let mut spent_txos: HashMap<Vec<u8>, Vec<usize>> = HashMap::new();

        for block in self.blockchain.iterator()? {
            let block = block?;

            for tx in block.get_transactions() {
                if tx.is_coinbase() {
                    continue;
                }
                for txin in tx.get_vin() {
                    let Some(vout) = txin.get_vout() else {
                        continue;
                    };
                    if self.keyring.matches(txin.get_unlocking_key(), locking_key) {
                        spent_txos
                            .entry(txin.get_txid().to_vec())
                            .or_default()
                            .push(vout);
                    }
                }
            }

            for tx in block.get_transactions() {
                let spent = spent_txos.get(tx.get_id());
                for (idx, out) in tx.get_vout().iter().enumerate() {
                    if !out.is_locked_with_key(locking_key) {
                        continue;
                    }
                    if spent.is_some_and(|outs| outs.contains(&idx)) {
                        continue;
                    }
                    if !visit(tx, idx, out) {
                        return Ok(());
                    }
                }
            }
        }
        Ok(())
    }

    /// Collect unspent outputs locked with `locking_key` until they cover
    /// `amount`. A short total is returned as is; the caller decides whether
    /// it is enough.
    pub fn find_spendable_outputs(
        &self,
        locking_key: &[u8],
        amount: u64,
    ) -> Result<(u64, SpendableOutputs)> {
        let mut unspent_outputs: SpendableOutputs = vec![];
        let mut accumulated = 0u64;

        self.scan_unspent(locking_key, |tx, idx, out| {
            if accumulated >= amount {
                return false;
            }
            accumulated = accumulated.saturating_add(out.get_value());
            match unspent_outputs.last_mut() {
                Some((txid, outs)) if txid.as_slice() == tx.get_id() => outs.push(idx),
                _ => unspent_outputs.push((tx.get_id().to_vec(), vec![idx])),
            }
            accumulated < amount
        })?;

        debug!(
            "Spendable scan for {}: {accumulated} of {amount} across {} transactions",
            HEXLOWER.encode(locking_key),
            unspent_outputs.len()
        );
        Ok((accumulated, unspent_outputs))
    }

    /// Every unspent output locked with `locking_key`.
    pub fn find_utxo(&self, locking_key: &[u8]) -> Result<Vec<TXOutput>> {
        let mut utxos = vec![];
        self.scan_unspent(locking_key, |_, _, out| {
            utxos.push(out.clone());
            true
        })?;
        Ok(utxos)
    }

    pub fn get_balance(&self, locking_key: &[u8]) -> Result<u64> {
        let mut balance = 0u64;
        for utxo in self.find_utxo(locking_key)? {
            balance = balance.checked_add(utxo.get_value()).ok_or_else(|| {
                LedgerError::InvalidTransaction("Balance overflow".to_string())
            })?;
        }
        Ok(balance)
    }

    /// Whole-chain UTXO map regardless of owner: every input consumes the
    /// output it references. Keyed by hex transaction id.
    pub fn find_all_unspent(&self) -> Result<HashMap<String, Vec<(usize, TXOutput)>>> {
        let mut utxo: HashMap<String, Vec<(usize, TXOutput)>> = HashMap::new();
        let mut spent_txos: HashSet<(Vec<u8>, usize)> = HashSet::new();

        for block in self.blockchain.iterator()? {
            let block = block?;
            for tx in block.get_transactions() {
                if tx.is_coinbase() {
                    continue;
                }
                for txin in tx.get_vin() {
                    if let Some(vout) = txin.get_vout() {
                        spent_txos.insert((txin.get_txid().to_vec(), vout));
                    }
                }
            }
            for tx in block.get_transactions() {
                for (idx, out) in tx.get_vout().iter().enumerate() {
                    if spent_txos.contains(&(tx.get_id().to_vec(), idx)) {
                        continue;
                    }
                    utxo.entry(HEXLOWER.encode(tx.get_id()))
                        .or_default()
                        .push((idx, out.clone()));
                }
            }
        }
        Ok(utxo)
    }

    pub fn is_output_spent(&self, txid: &[u8], vout: usize) -> Result<bool> {
        for block in self.blockchain.iterator()? {
            let block = block?;
            for transaction in block.get_transactions() {
                if transaction.is_coinbase() {
                    continue;
                }
                for input in transaction.get_vin() {
                    if input.get_txid() == txid && input.get_vout() == Some(vout) {
                        return Ok(true);
                    }
                }
            }
        }
        Ok(false)
    }

    /// Check a transaction against the current chain: every input must name
    /// an existing, unspent output its unlocking key matches, and input value
    /// must equal output value. Coinbases pass as long as they are well formed.
    pub fn validate_transaction(&self, tx: &Transaction) -> Result<()> {
        let txid_hex = HEXLOWER.encode(tx.get_id());
        if tx.get_vout().is_empty() {
            return Err(LedgerError::InvalidTransaction(format!(
                "Transaction {txid_hex} has no outputs"
            )));
        }
        if tx.is_coinbase() {
            return Ok(());
        }
        if tx.get_vin().is_empty() {
            return Err(LedgerError::InvalidTransaction(format!(
                "Transaction {txid_hex} has no inputs"
            )));
        }

        let mut input_value = 0u64;
        for vin in tx.get_vin() {
            let prev_hex = HEXLOWER.encode(vin.get_txid());
            let vout = vin.get_vout().ok_or_else(|| {
                LedgerError::InvalidTransaction(format!(
                    "Transaction {txid_hex} has an input without an output index"
                ))
            })?;
            let prev_tx = self.blockchain.find_transaction(vin.get_txid())?.ok_or_else(|| {
                LedgerError::InvalidTransaction(format!(
                    "Referenced transaction not found: {prev_hex}"
                ))
            })?;
            let prev_out = prev_tx.get_vout().get(vout).ok_or_else(|| {
                LedgerError::InvalidTransaction(format!("Invalid output index {prev_hex}:{vout}"))
            })?;

            if !self
                .keyring
                .matches(vin.get_unlocking_key(), prev_out.get_locking_key())
            {
                return Err(LedgerError::InvalidTransaction(format!(
                    "Input {prev_hex}:{vout} is not unlocked by its key"
                )));
            }
            if self.is_output_spent(vin.get_txid(), vout)? {
                return Err(LedgerError::InvalidTransaction(format!(
                    "Input already spent: {prev_hex}:{vout}"
                )));
            }
            input_value = input_value.checked_add(prev_out.get_value()).ok_or_else(|| {
                LedgerError::InvalidTransaction("Input value overflow".to_string())
            })?;
        }

        let output_value = tx.get_output_value()?;
        if input_value != output_value {
            return Err(LedgerError::InvalidTransaction(format!(
                "Transaction {txid_hex} spends {input_value} but pays out {output_value}"
            )));
        }
        Ok(())
    }
}
