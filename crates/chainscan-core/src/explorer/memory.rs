use std::sync::Arc;

use async_trait::async_trait;
use bitcoin::{Amount, Network};
use futures::future::ready;
use tokio::sync::RwLock;

use crate::error::{require_non_empty, ExplorerError, TransportError};
use crate::scan::{CreatedRecordShortcut, MessageDecoder, MessageScan};
use crate::types::{BlockHeight, MessageFilter, ScannedMessage, Transaction, TxInput, TxOutput, Utxo};

use super::http::parsing::decode_raw_tx;
use super::ExplorerBackend;

/// An explorer backed by in-process state, for testing code that consumes
/// [`ExplorerBackend`]. Populated via the builder; `relay` appends the
/// decoded transaction and updates the unspent set like a real node would.
pub struct MemoryExplorer<D: ?Sized> {
    network: Network,
    relay_rejection: Option<String>,
    shortcut: Option<CreatedRecordShortcut>,
    state: RwLock<MemoryState>,
    decoder: Arc<D>,
}

#[derive(Default)]
struct MemoryState {
    /// In insertion order, which is also listing order.
    transactions: Vec<Transaction>,
    utxos: Vec<Utxo>,
    calls: Vec<&'static str>,
}

impl<D: MessageDecoder + ?Sized> MemoryExplorer<D> {
    pub fn builder(decoder: Arc<D>) -> MemoryExplorerBuilder<D> {
        MemoryExplorerBuilder {
            network: Network::Bitcoin,
            relay_rejection: None,
            shortcut: None,
            state: MemoryState::default(),
            decoder,
        }
    }

    /// Forget every transaction and unspent output.
    pub async fn clear_transactions(&self) {
        let mut state = self.state.write().await;
        state.transactions.clear();
        state.utxos.clear();
    }

    pub async fn transaction_count(&self) -> usize {
        self.state.read().await.transactions.len()
    }

    /// Names of the contract operations invoked so far, in order.
    pub async fn calls(&self) -> Vec<&'static str> {
        self.state.read().await.calls.clone()
    }

    async fn record_call(&self, name: &'static str) {
        self.state.write().await.calls.push(name);
    }

    async fn scan(
        &self,
        txs: Vec<Transaction>,
        filter: &MessageFilter,
    ) -> Result<Vec<ScannedMessage<D::Message>>, ExplorerError> {
        MessageScan::new(&*self.decoder, filter)
            .with_shortcut(self.shortcut.as_ref())
            .run(txs, |tx| ready(Ok(Some(tx))))
            .await
    }
}

pub struct MemoryExplorerBuilder<D: ?Sized> {
    network: Network,
    relay_rejection: Option<String>,
    shortcut: Option<CreatedRecordShortcut>,
    state: MemoryState,
    decoder: Arc<D>,
}

impl<D: MessageDecoder + ?Sized> MemoryExplorerBuilder<D> {
    /// Network used to derive addresses of relayed transactions.
    pub fn with_network(mut self, network: Network) -> Self {
        self.network = network;
        self
    }

    pub fn with_tx(mut self, tx: Transaction) -> Self {
        self.state.transactions.push(tx);
        self
    }

    pub fn with_utxo(mut self, utxo: Utxo) -> Self {
        self.state.utxos.push(utxo);
        self
    }

    /// Make every `relay` fail with this diagnostic.
    pub fn rejecting_relays(mut self, reason: impl Into<String>) -> Self {
        self.relay_rejection = Some(reason.into());
        self
    }

    pub fn with_created_record_shortcut(mut self, shortcut: CreatedRecordShortcut) -> Self {
        self.shortcut = Some(shortcut);
        self
    }

    pub fn build(self) -> MemoryExplorer<D> {
        MemoryExplorer {
            network: self.network,
            relay_rejection: self.relay_rejection,
            shortcut: self.shortcut,
            state: RwLock::new(self.state),
            decoder: self.decoder,
        }
    }
}

/// Whether `tx` pays to `address` or spends an output that paid to it.
/// Spent outputs are resolved against `known`.
fn touches(tx: &Transaction, address: &str, known: &[Transaction]) -> bool {
    let pays = |out: &TxOutput| out.address.as_deref() == Some(address);
    tx.outputs.iter().any(pays)
        || tx
            .inputs
            .iter()
            .filter_map(|vin| spent_output(known, vin))
            .any(pays)
}

fn spent_output<'a>(known: &'a [Transaction], vin: &TxInput) -> Option<&'a TxOutput> {
    known
        .iter()
        .find(|tx| tx.txid == vin.prev_txid)?
        .outputs
        .get(vin.output_index as usize)
}

#[async_trait]
impl<D: MessageDecoder + ?Sized> ExplorerBackend for MemoryExplorer<D> {
    type Message = D::Message;

    async fn tx_by_id(&self, txid: &str) -> Result<Option<Transaction>, ExplorerError> {
        require_non_empty(txid, "txid")?;
        self.record_call("tx_by_id").await;
        let state = self.state.read().await;
        match state.transactions.iter().find(|tx| tx.txid == txid) {
            Some(tx) => Ok(Some(tx.clone())),
            None => Err(TransportError::Status {
                status: reqwest::StatusCode::NOT_FOUND,
                body: format!("unknown transaction {txid}"),
            }
            .into()),
        }
    }

    async fn messages_by_addr(
        &self,
        address: &str,
        filter: &MessageFilter,
    ) -> Result<Vec<ScannedMessage<D::Message>>, ExplorerError> {
        require_non_empty(address, "address")?;
        self.record_call("messages_by_addr").await;
        let txs: Vec<Transaction> = {
            let state = self.state.read().await;
            state
                .transactions
                .iter()
                .filter(|tx| touches(tx, address, &state.transactions))
                .cloned()
                .collect()
        };
        self.scan(txs, filter).await
    }

    async fn messages_in_block(
        &self,
        height: BlockHeight,
        filter: &MessageFilter,
    ) -> Result<Vec<ScannedMessage<D::Message>>, ExplorerError> {
        self.record_call("messages_in_block").await;
        let txs: Vec<Transaction> = {
            let state = self.state.read().await;
            state
                .transactions
                .iter()
                .filter(|tx| tx.block_height == Some(height))
                .cloned()
                .collect()
        };
        let messages = self.scan(txs, filter).await?;
        Ok(messages.into_iter().map(|m| m.at_height(height)).collect())
    }

    async fn get_utxos(&self, address: &str) -> Result<Vec<Utxo>, ExplorerError> {
        require_non_empty(address, "address")?;
        self.record_call("get_utxos").await;
        let state = self.state.read().await;
        let utxos: Vec<Utxo> = state
            .utxos
            .iter()
            .filter(|utxo| utxo.address == address)
            .cloned()
            .collect();
        if utxos.is_empty() {
            return Err(ExplorerError::NoUtxos {
                address: address.to_owned(),
            });
        }
        Ok(utxos)
    }

    async fn relay(&self, raw_tx_hex: &str) -> Result<(), ExplorerError> {
        require_non_empty(raw_tx_hex, "raw transaction")?;
        self.record_call("relay").await;
        if let Some(reason) = &self.relay_rejection {
            return Err(ExplorerError::RelayUnaccepted(reason.clone()));
        }
        let raw = decode_raw_tx(raw_tx_hex)
            .ok_or_else(|| ExplorerError::RelayUnaccepted("TX decode failed".to_owned()))?;
        let txid = raw.compute_txid().to_string();
        let tx = Transaction::from_consensus(txid.clone(), &raw, None, Amount::ZERO, self.network);

        let mut state = self.state.write().await;
        state.utxos.retain(|utxo| {
            !tx.inputs
                .iter()
                .any(|vin| vin.prev_txid == utxo.txid && vin.output_index == utxo.output_index)
        });
        for (index, out) in tx.outputs.iter().enumerate() {
            if let Some(address) = &out.address {
                state.utxos.push(Utxo {
                    address: address.clone(),
                    txid: txid.clone(),
                    output_index: index as u32,
                    script: out.script.clone(),
                    value: out.value,
                    confirmations: 0,
                });
            }
        }
        state.transactions.push(tx);
        Ok(())
    }
}
