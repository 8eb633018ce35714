//! Transactions move value by consuming earlier outputs and creating new ones.
//! A coinbase is the exception: it consumes nothing and mints the subsidy.

use crate::error::{LedgerError, Result};
use crate::storage::UTXOSet;
use crate::utils::{deserialize, serialize, sha256_digest};
use data_encoding::HEXLOWER;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A transaction input points at one earlier output: output `vout` of transaction `txid`
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct TXInput {
    txid: Vec<u8>,
    vout: Option<usize>, // None only on the coinbase input
    unlocking_key: Vec<u8>,
}

impl TXInput {
    pub fn new(txid: &[u8], vout: usize, unlocking_key: &[u8]) -> TXInput {
        TXInput {
            txid: txid.to_vec(),
            vout: Some(vout),
            unlocking_key: unlocking_key.to_vec(),
        }
    }

    fn coinbase(memo: &[u8]) -> TXInput {
        TXInput {
            txid: vec![],
            vout: None,
            unlocking_key: memo.to_vec(),
        }
    }

    pub fn get_txid(&self) -> &[u8] {
        self.txid.as_slice()
    }

    pub fn get_vout(&self) -> Option<usize> {
        self.vout
    }

    pub fn get_unlocking_key(&self) -> &[u8] {
        self.unlocking_key.as_slice()
    }

    pub fn is_coinbase_input(&self) -> bool {
        self.txid.is_empty() && self.vout.is_none()
    }
}

/// An output holds value that whoever matches `locking_key` can spend later
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct TXOutput {
    value: u64,
    locking_key: Vec<u8>,
}

impl TXOutput {
    pub fn new(value: u64, locking_key: &[u8]) -> TXOutput {
        TXOutput {
            value,
            locking_key: locking_key.to_vec(),
        }
    }

    pub fn get_value(&self) -> u64 {
        self.value
    }

    pub fn get_locking_key(&self) -> &[u8] {
        self.locking_key.as_slice()
    }

    pub fn is_locked_with_key(&self, locking_key: &[u8]) -> bool {
        self.locking_key.eq(locking_key)
    }
}

#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct Transaction {
    id: Vec<u8>,
    vin: Vec<TXInput>,
    vout: Vec<TXOutput>,
}

impl Transaction {
    /// Reward transaction paying `subsidy` to `to`.
    ///
    /// The memo rides in the sentinel input. With an empty memo a random one
    /// is generated, so two rewards to the same key never share an id.
    pub fn new_coinbase_tx(to: &[u8], memo: &str, subsidy: u64) -> Result<Transaction> {
        let memo = if memo.is_empty() {
            format!("Reward to '{}' {}", HEXLOWER.encode(to), Uuid::new_v4())
        } else {
            memo.to_string()
        };

        let mut tx = Transaction {
            id: vec![],
            vin: vec![TXInput::coinbase(memo.as_bytes())],
            vout: vec![TXOutput::new(subsidy, to)],
        };
        tx.id = tx.hash()?;
        Ok(tx)
    }

    /// Spend `amount` from the owner of `from_locking_key` to `to`.
    ///
    /// Inputs are taken in UTXO scan order until the amount is covered; any
    /// surplus comes back to `from_locking_key` as a change output.
    pub fn new_utxo_transaction(
        from_unlocking_key: &[u8],
        from_locking_key: &[u8],
        to: &[u8],
        amount: u64,
        utxo_set: &UTXOSet,
    ) -> Result<Transaction> {
        if amount == 0 {
            return Err(LedgerError::InvalidTransaction(
                "Amount must be positive".to_string(),
            ));
        }

        let (accumulated, valid_outputs) =
            utxo_set.find_spendable_outputs(from_locking_key, amount)?;

        if accumulated < amount {
            return Err(LedgerError::InsufficientFunds {
                required: amount,
                available: accumulated,
            });
        }

        let mut inputs = vec![];
        for (txid, outs) in valid_outputs {
            for out in outs {
                inputs.push(TXInput::new(&txid, out, from_unlocking_key));
            }
        }

        let mut outputs = vec![TXOutput::new(amount, to)];
        let change = accumulated - amount;
        if change > 0 {
            outputs.push(TXOutput::new(change, from_locking_key));
        }

        let mut tx = Transaction {
            id: vec![],
            vin: inputs,
            vout: outputs,
        };
        tx.id = tx.hash()?;
        Ok(tx)
    }

    pub fn is_coinbase(&self) -> bool {
        self.vin.len() == 1 && self.vin[0].is_coinbase_input()
    }

    /// Content hash over the encoded transaction with the id left empty.
    pub fn hash(&self) -> Result<Vec<u8>> {
        let tx_copy = Transaction {
            id: vec![],
            vin: self.vin.clone(),
            vout: self.vout.clone(),
        };
        Ok(sha256_digest(&tx_copy.serialize()?))
    }

    pub fn get_id(&self) -> &[u8] {
        self.id.as_slice()
    }

    pub fn get_vin(&self) -> &[TXInput] {
        self.vin.as_slice()
    }

    pub fn get_vout(&self) -> &[TXOutput] {
        self.vout.as_slice()
    }

    pub fn get_output_value(&self) -> Result<u64> {
        let mut total = 0u64;
        for vout in &self.vout {
            total = total
                .checked_add(vout.get_value())
                .ok_or_else(|| LedgerError::InvalidTransaction("Output value overflow".to_string()))?;
        }
        Ok(total)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Transaction> {
        deserialize(bytes)
    }

    /// Assemble a transaction from parts, computing its id.
    #[cfg(test)]
    pub fn from_parts(vin: Vec<TXInput>, vout: Vec<TXOutput>) -> Transaction {
        let mut tx = Transaction {
            id: vec![],
            vin,
            vout,
        };
        tx.id = tx.hash().unwrap();
        tx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coinbase_shape() {
        let tx = Transaction::new_coinbase_tx(b"alice-lock", "genesis", 10).unwrap();

        assert!(tx.is_coinbase());
        assert_eq!(tx.get_vin().len(), 1);
        assert!(tx.get_vin()[0].get_txid().is_empty());
        assert_eq!(tx.get_vin()[0].get_vout(), None);
        assert_eq!(tx.get_vin()[0].get_unlocking_key(), b"genesis");
        assert_eq!(tx.get_vout().len(), 1);
        assert_eq!(tx.get_vout()[0].get_value(), 10);
        assert!(tx.get_vout()[0].is_locked_with_key(b"alice-lock"));
    }

    #[test]
    fn test_id_is_content_hash_without_id() {
        let tx = Transaction::new_coinbase_tx(b"alice-lock", "memo", 10).unwrap();
        assert_eq!(tx.get_id().len(), 32);
        assert_eq!(tx.get_id(), tx.hash().unwrap().as_slice());
    }

    #[test]
    fn test_same_memo_same_id() {
        let a = Transaction::new_coinbase_tx(b"k", "memo", 10).unwrap();
        let b = Transaction::new_coinbase_tx(b"k", "memo", 10).unwrap();
        assert_eq!(a.get_id(), b.get_id());
    }

    #[test]
    fn test_empty_memo_gives_distinct_ids() {
        let a = Transaction::new_coinbase_tx(b"k", "", 10).unwrap();
        let b = Transaction::new_coinbase_tx(b"k", "", 10).unwrap();
        assert_ne!(a.get_id(), b.get_id());
    }

    #[test]
    fn test_spend_input_is_not_coinbase() {
        let tx = Transaction::from_parts(
            vec![TXInput::new(b"prev", 0, b"alice")],
            vec![TXOutput::new(5, b"bob-lock")],
        );
        assert!(!tx.is_coinbase());
    }

    #[test]
    fn test_empty_txid_with_index_is_not_coinbase() {
        let tx = Transaction::from_parts(
            vec![TXInput::new(b"", 0, b"alice")],
            vec![TXOutput::new(5, b"bob-lock")],
        );
        assert!(!tx.is_coinbase());
    }

    #[test]
    fn test_serialize_roundtrip_keeps_id() {
        let tx = Transaction::new_coinbase_tx(b"alice-lock", "memo", 10).unwrap();
        let decoded = Transaction::deserialize(&tx.serialize().unwrap()).unwrap();
        assert_eq!(decoded, tx);
    }

    #[test]
    fn test_output_value_sums() {
        let tx = Transaction::from_parts(
            vec![TXInput::new(b"prev", 0, b"alice")],
            vec![TXOutput::new(4, b"bob"), TXOutput::new(6, b"alice")],
        );
        assert_eq!(tx.get_output_value().unwrap(), 10);
    }
}
