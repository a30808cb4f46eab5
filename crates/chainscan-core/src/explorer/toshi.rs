//! Adapter for the Toshi v0 API.
//!
//! Responses are bare JSON documents with satoshi-denominated integers.
//! Listings are windowed: address history pages until a short page, block
//! contents are bounded by the reported transaction count. Toshi does not
//! rate-limit, so no [`RequestLimiter`](super::RequestLimiter) is attached.

use std::sync::Arc;

use async_trait::async_trait;
use bitcoin::{Address, Amount, Network, ScriptBuf};
use futures::future::ready;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::config::BackendConfig;
use crate::error::{require_non_empty, ExplorerError};
use crate::scan::{CreatedRecordShortcut, MessageDecoder, MessageScan, ScanRecord};
use crate::types::{BlockHeight, MessageFilter, ScannedMessage, Transaction, TxInput, TxOutput, Utxo};

use super::http::normalize::{BareJsonNormalizer, ResponseNormalizer};
use super::http::paginate::{collect_counted, collect_until_short, Page};
use super::http::parsing::{parse_sat_amount, script_from_hex, script_from_pushes};
use super::http::transport::HttpTransport;
use super::ExplorerBackend;

pub const TOSHI_MAINNET_URL: &str = "https://bitcoin.toshi.io/";
pub const TOSHI_TESTNET_URL: &str = "https://testnet3.toshi.io/";

/// Page size of address history listings.
pub const ADDRESS_PAGE_SIZE: usize = 100;
/// Page size of block listings.
pub const BLOCK_PAGE_SIZE: usize = 1000;

pub struct Toshi<D: ?Sized> {
    transport: HttpTransport,
    normalizer: BareJsonNormalizer,
    network: Network,
    decoder: Arc<D>,
    shortcut: Option<CreatedRecordShortcut>,
}

impl<D: MessageDecoder + ?Sized> Toshi<D> {
    pub fn new(config: &BackendConfig, decoder: Arc<D>) -> Result<Self, ExplorerError> {
        let default_url = if config.testnet {
            TOSHI_TESTNET_URL
        } else {
            TOSHI_MAINNET_URL
        };
        let transport = HttpTransport::new(config.resolve_base_url(default_url)?, None)?;
        Ok(Self {
            transport,
            normalizer: BareJsonNormalizer,
            network: config.network(),
            decoder,
            shortcut: None,
        })
    }

    /// Enable the "record created" scan shortcut.
    pub fn with_created_record_shortcut(mut self, shortcut: CreatedRecordShortcut) -> Self {
        self.shortcut = Some(shortcut);
        self
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<T, ExplorerError> {
        let body = self.transport.get(segments, query).await?;
        self.normalizer.payload(&body).into_payload()
    }

    async fn address_page(&self, address: &str, offset: usize) -> Result<Page<RawTx>, ExplorerError> {
        let page: AddressPage = self
            .fetch(
                &["api", "v0", "addresses", address, "transactions"],
                &window(ADDRESS_PAGE_SIZE, offset),
            )
            .await?;
        Ok(Page::new(page.transactions).with_leading(page.unconfirmed_transactions))
    }

    async fn block_page(&self, height: &str, offset: usize) -> Result<Page<RawTx>, ExplorerError> {
        let page: BlockPage = self
            .fetch(
                &["api", "v0", "blocks", height, "transactions"],
                &window(BLOCK_PAGE_SIZE, offset),
            )
            .await?;
        let mut normalized = Page::new(page.transactions);
        if let Some(count) = page.transactions_count {
            normalized = normalized.with_total(count);
        }
        Ok(normalized)
    }

    async fn scan(
        &self,
        txs: Vec<RawTx>,
        filter: &MessageFilter,
    ) -> Result<Vec<ScannedMessage<D::Message>>, ExplorerError> {
        let network = self.network;
        MessageScan::new(&*self.decoder, filter)
            .with_shortcut(self.shortcut.as_ref())
            .run(txs, move |raw| {
                let txid = raw.hash.clone();
                ready(raw.into_transaction(txid, network))
            })
            .await
    }
}

fn window(limit: usize, offset: usize) -> [(&'static str, String); 2] {
    [("limit", limit.to_string()), ("offset", offset.to_string())]
}

#[async_trait]
impl<D: MessageDecoder + ?Sized> ExplorerBackend for Toshi<D> {
    type Message = D::Message;

    async fn tx_by_id(&self, txid: &str) -> Result<Option<Transaction>, ExplorerError> {
        require_non_empty(txid, "txid")?;
        let raw: RawTx = self.fetch(&["api", "v0", "transactions", txid], &[]).await?;
        raw.into_transaction(txid.to_owned(), self.network)
    }

    async fn messages_by_addr(
        &self,
        address: &str,
        filter: &MessageFilter,
    ) -> Result<Vec<ScannedMessage<D::Message>>, ExplorerError> {
        require_non_empty(address, "address")?;
        let txs = collect_until_short(ADDRESS_PAGE_SIZE, |offset| self.address_page(address, offset))
            .await?;
        debug!(address, count = txs.len(), "collected address history");
        self.scan(txs, filter).await
    }

    async fn messages_in_block(
        &self,
        height: BlockHeight,
        filter: &MessageFilter,
    ) -> Result<Vec<ScannedMessage<D::Message>>, ExplorerError> {
        let height_segment = height.to_string();
        let txs = collect_counted(BLOCK_PAGE_SIZE, |offset| {
            self.block_page(&height_segment, offset)
        })
        .await?;
        debug!(%height, count = txs.len(), "collected block transactions");
        let messages = self.scan(txs, filter).await?;
        Ok(messages.into_iter().map(|m| m.at_height(height)).collect())
    }

    async fn get_utxos(&self, address: &str) -> Result<Vec<Utxo>, ExplorerError> {
        require_non_empty(address, "address")?;
        let unspent: Vec<RawUnspent> = self
            .fetch(&["api", "v0", "addresses", address, "unspent_outputs"], &[])
            .await?;
        if unspent.is_empty() {
            return Err(ExplorerError::NoUtxos {
                address: address.to_owned(),
            });
        }

        unspent
            .into_iter()
            .map(|utxo| {
                Ok(Utxo {
                    address: address.to_owned(),
                    txid: utxo.transaction_hash,
                    output_index: utxo.output_index,
                    script: script_from_hex(&utxo.script_hex)?,
                    value: parse_sat_amount(&utxo.amount)?,
                    confirmations: utxo.confirmations,
                })
            })
            .collect()
    }

    async fn relay(&self, raw_tx_hex: &str) -> Result<(), ExplorerError> {
        require_non_empty(raw_tx_hex, "raw transaction")?;
        let body = self
            .transport
            .post_form(&["api", "v0", "transactions"], &[("hex", raw_tx_hex)])
            .await?;
        self.normalizer.relay(&body).into_relay_outcome()?.into_result()
    }
}

// ==============================================================================
// Wire Shapes
// ==============================================================================

#[derive(Deserialize)]
struct AddressPage {
    transactions: Vec<RawTx>,
    #[serde(default)]
    unconfirmed_transactions: Vec<RawTx>,
}

#[derive(Deserialize)]
struct BlockPage {
    transactions: Vec<RawTx>,
    transactions_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawTx {
    hash: String,
    block_height: Option<u32>,
    #[serde(default)]
    fees: serde_json::Value,
    inputs: Vec<RawInput>,
    outputs: Vec<RawOutput>,
}

#[derive(Debug, Deserialize)]
struct RawInput {
    #[serde(default)]
    previous_transaction_hash: Option<String>,
    #[serde(default)]
    output_index: Option<u32>,
    /// Space-separated pushes rather than hex.
    #[serde(default)]
    script: String,
    /// Present (as hex) only on generation inputs.
    #[serde(default)]
    coinbase: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawOutput {
    amount: serde_json::Value,
    script_hex: String,
    #[serde(default)]
    addresses: Vec<String>,
}

#[derive(Deserialize)]
struct RawUnspent {
    transaction_hash: String,
    output_index: u32,
    amount: serde_json::Value,
    script_hex: String,
    #[serde(default)]
    confirmations: u64,
}

impl RawTx {
    /// Normalize. Bad amounts are a malformed response; scripts that cannot
    /// be reassembled make the record unparseable (`Ok(None)`).
    ///
    /// A null or missing `fees` reads as a zero tip, so "unknown" and "free"
    /// are indistinguishable here. A present but invalid `fees` is malformed.
    fn into_transaction(
        self,
        txid: String,
        network: Network,
    ) -> Result<Option<Transaction>, ExplorerError> {
        let tip = if self.fees.is_null() {
            Amount::ZERO
        } else {
            parse_sat_amount(&self.fees)?
        };

        let mut inputs = Vec::with_capacity(self.inputs.len());
        for vin in self.inputs {
            let input = match vin.coinbase {
                Some(coinbase_hex) => match ScriptBuf::from_hex(&coinbase_hex) {
                    Ok(script) => TxInput::coinbase(script),
                    Err(_) => return Ok(None),
                },
                None => {
                    let (Some(prev_txid), Some(output_index)) =
                        (vin.previous_transaction_hash, vin.output_index)
                    else {
                        return Err(ExplorerError::MalformedResponse(format!(
                            "input of {txid} is missing its previous output"
                        )));
                    };
                    let Some(script) = script_from_pushes(&vin.script) else {
                        debug!(txid = %txid, "input script cannot be reassembled");
                        return Ok(None);
                    };
                    TxInput {
                        prev_txid,
                        output_index,
                        script,
                    }
                }
            };
            inputs.push(input);
        }

        let mut outputs = Vec::with_capacity(self.outputs.len());
        for vout in self.outputs {
            let value = parse_sat_amount(&vout.amount)?;
            let Ok(script) = ScriptBuf::from_hex(&vout.script_hex) else {
                debug!(txid = %txid, "output script is not hex");
                return Ok(None);
            };
            let address = vout.addresses.into_iter().next().or_else(|| {
                Address::from_script(&script, network)
                    .ok()
                    .map(|addr| addr.to_string())
            });
            outputs.push(TxOutput {
                address,
                value,
                script,
            });
        }

        Ok(Some(Transaction {
            txid,
            block_height: self.block_height.map(BlockHeight),
            tip,
            inputs,
            outputs,
        }))
    }
}

impl ScanRecord for RawTx {
    fn is_coinbase(&self) -> bool {
        self.inputs.first().is_some_and(|vin| vin.coinbase.is_some())
    }

    fn first_output_address(&self) -> Option<&str> {
        self.outputs
            .first()
            .and_then(|out| out.addresses.first())
            .map(String::as_str)
    }
}
