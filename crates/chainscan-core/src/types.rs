//! Canonical shapes every explorer backend normalizes into.
//!
//! Contains the normalized transaction types (`Transaction`, `TxInput`,
//! `TxOutput`), unspent outputs (`Utxo`), the caller-supplied
//! `MessageFilter`, and the per-message envelope `ScannedMessage`.

use bitcoin::hashes::Hash;
use bitcoin::{Address, Amount, Network, ScriptBuf};
use serde::{Deserialize, Serialize};

use crate::error::ExplorerError;

// ==============================================================================
// Block Height
// ==============================================================================

/// A Bitcoin block height, wrapped for type safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockHeight(pub u32);

impl From<u32> for BlockHeight {
    fn from(h: u32) -> Self {
        Self(h)
    }
}

impl From<BlockHeight> for u32 {
    fn from(h: BlockHeight) -> Self {
        h.0
    }
}

impl std::ops::Deref for BlockHeight {
    type Target = u32;
    fn deref(&self) -> &u32 {
        &self.0
    }
}

impl std::fmt::Display for BlockHeight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for BlockHeight {
    type Err = ExplorerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ExplorerError::InvalidArgument(
                "height is a required parameter".to_owned(),
            ));
        }
        trimmed
            .parse::<u32>()
            .map(Self)
            .map_err(|e| ExplorerError::InvalidArgument(format!("invalid block height `{s}`: {e}")))
    }
}

// ==============================================================================
// Transaction Types
// ==============================================================================

/// A transaction as normalized from any backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Backend-stable identifier; taken verbatim from the request or listing.
    pub txid: String,
    /// `None` for unconfirmed (mempool) transactions.
    pub block_height: Option<BlockHeight>,
    /// Fee paid by the transaction.
    pub tip: Amount,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

impl Transaction {
    /// Normalize a consensus-decoded transaction.
    ///
    /// Output addresses are derived from their scripts for `network`; scripts
    /// with no address form (OP_RETURN, bare multisig) get `None`.
    pub fn from_consensus(
        txid: impl Into<String>,
        tx: &bitcoin::Transaction,
        block_height: Option<BlockHeight>,
        tip: Amount,
        network: Network,
    ) -> Self {
        let inputs = tx
            .input
            .iter()
            .map(|txin| TxInput {
                prev_txid: txin.previous_output.txid.to_string(),
                output_index: txin.previous_output.vout,
                script: txin.script_sig.clone(),
            })
            .collect();
        let outputs = tx
            .output
            .iter()
            .map(|txout| TxOutput {
                address: Address::from_script(&txout.script_pubkey, network)
                    .ok()
                    .map(|addr| addr.to_string()),
                value: txout.value,
                script: txout.script_pubkey.clone(),
            })
            .collect();

        Self {
            txid: txid.into(),
            block_height,
            tip,
            inputs,
            outputs,
        }
    }

    /// A generation transaction has a single input spending the null outpoint.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].is_null_prevout()
    }

    pub fn first_output_address(&self) -> Option<&str> {
        self.outputs.first().and_then(|out| out.address.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub prev_txid: String,
    pub output_index: u32,
    pub script: ScriptBuf,
}

impl TxInput {
    /// An input spending `0000…0000:ffffffff`, i.e. a coinbase input.
    pub fn coinbase(script: ScriptBuf) -> Self {
        Self {
            prev_txid: bitcoin::Txid::all_zeros().to_string(),
            output_index: u32::MAX,
            script,
        }
    }

    pub fn is_null_prevout(&self) -> bool {
        self.output_index == u32::MAX
            && self.prev_txid.len() == 64
            && self.prev_txid.bytes().all(|b| b == b'0')
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    /// Receiving address, when the script has one.
    pub address: Option<String>,
    pub value: Amount,
    pub script: ScriptBuf,
}

// ==============================================================================
// Unspent Outputs
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub address: String,
    pub txid: String,
    pub output_index: u32,
    pub script: ScriptBuf,
    pub value: Amount,
    pub confirmations: u64,
}

// ==============================================================================
// Relay
// ==============================================================================

/// What the backend said about a broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    Accepted,
    Rejected(String),
}

impl RelayOutcome {
    pub fn into_result(self) -> Result<(), ExplorerError> {
        match self {
            Self::Accepted => Ok(()),
            Self::Rejected(reason) => Err(ExplorerError::RelayUnaccepted(reason)),
        }
    }
}

// ==============================================================================
// Message Scanning
// ==============================================================================

/// Caller-supplied scan criteria.
///
/// `criteria` is opaque to this crate and handed to the decode hook as-is.
/// `message_type` is the only field the scan pipeline itself looks at.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageFilter {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,
    #[serde(default)]
    pub criteria: serde_json::Value,
}

impl MessageFilter {
    pub fn of_type(message_type: impl Into<String>) -> Self {
        Self {
            message_type: Some(message_type.into()),
            criteria: serde_json::Value::Null,
        }
    }

    pub fn with_criteria(mut self, criteria: serde_json::Value) -> Self {
        self.criteria = criteria;
        self
    }
}

/// A decoded application message plus the transaction facts that carried it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannedMessage<M> {
    pub txid: String,
    pub block_height: Option<BlockHeight>,
    pub tip: Amount,
    pub message: M,
}

impl<M> ScannedMessage<M> {
    /// Replace the carrying transaction's height with one the caller asked for.
    pub fn at_height(mut self, height: BlockHeight) -> Self {
        self.block_height = Some(height);
        self
    }
}
