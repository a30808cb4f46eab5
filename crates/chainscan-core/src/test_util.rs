//! Shared test helpers for `chainscan-core` unit tests.
//!
//! Builders for normalized transactions, consensus transactions and scripts,
//! plus a decode hook that records what it was asked to decode.

use std::collections::HashSet;
use std::sync::Mutex;

use bitcoin::hashes::Hash;
use bitcoin::script::PushBytesBuf;
use bitcoin::transaction::Version;
use bitcoin::{absolute, Amount, OutPoint, PubkeyHash, ScriptBuf, Sequence, TxIn, TxOut, Txid, Witness};

use crate::scan::MessageDecoder;
use crate::types::{MessageFilter, Transaction, TxInput, TxOutput};

// ==============================================================================
// Normalized Transactions
// ==============================================================================

pub fn make_tx(txid: &str, inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Transaction {
    Transaction {
        txid: txid.to_owned(),
        block_height: None,
        tip: Amount::from_sat(1000),
        inputs,
        outputs,
    }
}

pub fn spending_input(prev_txid: &str, vout: u32) -> TxInput {
    TxInput {
        prev_txid: prev_txid.to_owned(),
        output_index: vout,
        script: ScriptBuf::new(),
    }
}

pub fn addr_output(address: &str) -> TxOutput {
    TxOutput {
        address: Some(address.to_owned()),
        value: Amount::from_sat(5460),
        script: ScriptBuf::new(),
    }
}

// ==============================================================================
// Consensus Transactions
// ==============================================================================

pub fn p2pkh_script(b: u8) -> ScriptBuf {
    ScriptBuf::new_p2pkh(&PubkeyHash::from_byte_array([b; 20]))
}

pub fn op_return_script(data: &[u8]) -> ScriptBuf {
    let push = PushBytesBuf::try_from(data.to_vec()).expect("test payload fits in one push");
    ScriptBuf::new_op_return(&push)
}

/// A one-input transaction paying `value` sats to each of `scripts`.
pub fn consensus_tx(scripts: &[ScriptBuf], value: u64) -> bitcoin::Transaction {
    bitcoin::Transaction {
        version: Version::ONE,
        lock_time: absolute::LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint::new(Txid::from_byte_array([7; 32]), 0),
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }],
        output: scripts
            .iter()
            .map(|script| TxOut {
                value: Amount::from_sat(value),
                script_pubkey: script.clone(),
            })
            .collect(),
    }
}

// ==============================================================================
// Decode Hook
// ==============================================================================

#[derive(Debug, thiserror::Error)]
#[error("cannot decode {0}")]
pub struct TestDecodeError(pub String);

/// Decodes every transaction to its own txid, except the configured ones.
#[derive(Default)]
pub struct RecordingDecoder {
    seen: Mutex<Vec<String>>,
    absent: HashSet<String>,
    failing: HashSet<String>,
}

impl RecordingDecoder {
    pub fn absent_for(mut self, txid: &str) -> Self {
        self.absent.insert(txid.to_owned());
        self
    }

    pub fn failing_for(mut self, txid: &str) -> Self {
        self.failing.insert(txid.to_owned());
        self
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().expect("seen lock").clone()
    }
}

impl MessageDecoder for RecordingDecoder {
    type Message = String;
    type Error = TestDecodeError;

    fn decode(
        &self,
        tx: &Transaction,
        _filter: &MessageFilter,
    ) -> Result<Option<String>, TestDecodeError> {
        self.seen.lock().expect("seen lock").push(tx.txid.clone());
        if self.failing.contains(&tx.txid) {
            return Err(TestDecodeError(tx.txid.clone()));
        }
        if self.absent.contains(&tx.txid) {
            return Ok(None);
        }
        Ok(Some(tx.txid.clone()))
    }
}
