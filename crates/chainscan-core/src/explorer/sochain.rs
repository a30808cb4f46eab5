//! Adapter for the SoChain v2 API.
//!
//! Responses use a JSend envelope and carry transactions as raw hex. The
//! service enforces a strict per-request interval, so every request goes
//! through a [`RequestLimiter`]. Listing endpoints return lightweight
//! entries that are loaded one by one through the transaction endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use bitcoin::Network;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::config::BackendConfig;
use crate::error::{require_non_empty, ExplorerError};
use crate::scan::{CreatedRecordShortcut, MessageDecoder, MessageScan, ScanRecord};
use crate::types::{BlockHeight, MessageFilter, ScannedMessage, Transaction, Utxo};

use super::http::limiter::RequestLimiter;
use super::http::normalize::{JsendNormalizer, ResponseNormalizer};
use super::http::parsing::{decode_raw_tx, parse_btc_amount, script_from_hex};
use super::http::transport::HttpTransport;
use super::ExplorerBackend;

pub const SOCHAIN_URL: &str = "https://chain.so/";

pub struct SoChain<D: ?Sized> {
    transport: HttpTransport,
    normalizer: JsendNormalizer,
    network: Network,
    decoder: Arc<D>,
    shortcut: Option<CreatedRecordShortcut>,
}

impl<D: MessageDecoder + ?Sized> SoChain<D> {
    pub fn new(config: &BackendConfig, decoder: Arc<D>) -> Result<Self, ExplorerError> {
        let limiter = RequestLimiter::new(config.rate_limit_interval)?;
        let transport = HttpTransport::new(config.resolve_base_url(SOCHAIN_URL)?, Some(limiter))?;
        Ok(Self {
            transport,
            normalizer: JsendNormalizer,
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

    fn network_flag(&self) -> &'static str {
        match self.network {
            Network::Bitcoin => "BTC",
            _ => "BTCTEST",
        }
    }

    /// GET `api/v2/{resource}/{network}/{id}` and unwrap the envelope.
    async fn fetch<T: DeserializeOwned>(&self, resource: &str, id: &str) -> Result<T, ExplorerError> {
        let body = self
            .transport
            .get(&["api", "v2", resource, self.network_flag(), id], &[])
            .await?;
        self.normalizer.payload(&body).into_payload()
    }

    async fn load_tx(&self, txid: &str) -> Result<Option<Transaction>, ExplorerError> {
        let payload: TxPayload = self.fetch("tx", txid).await?;
        let Some(raw) = decode_raw_tx(&payload.tx_hex) else {
            debug!(txid, "transaction payload is not decodable");
            return Ok(None);
        };
        let tip = parse_btc_amount(&payload.fee)?;
        Ok(Some(Transaction::from_consensus(
            txid,
            &raw,
            payload.block_no.map(BlockHeight),
            tip,
            self.network,
        )))
    }

    async fn scan(
        &self,
        entries: Vec<TxRef>,
        filter: &MessageFilter,
    ) -> Result<Vec<ScannedMessage<D::Message>>, ExplorerError> {
        MessageScan::new(&*self.decoder, filter)
            .with_shortcut(self.shortcut.as_ref())
            .run(entries, move |entry| async move { self.load_tx(&entry.txid).await })
            .await
    }
}

#[async_trait]
impl<D: MessageDecoder + ?Sized> ExplorerBackend for SoChain<D> {
    type Message = D::Message;

    async fn tx_by_id(&self, txid: &str) -> Result<Option<Transaction>, ExplorerError> {
        require_non_empty(txid, "txid")?;
        self.load_tx(txid).await
    }

    async fn messages_by_addr(
        &self,
        address: &str,
        filter: &MessageFilter,
    ) -> Result<Vec<ScannedMessage<D::Message>>, ExplorerError> {
        require_non_empty(address, "address")?;
        let listing: TxListing = self.fetch("address", address).await?;
        self.scan(listing.txs, filter).await
    }

    async fn messages_in_block(
        &self,
        height: BlockHeight,
        filter: &MessageFilter,
    ) -> Result<Vec<ScannedMessage<D::Message>>, ExplorerError> {
        let listing: TxListing = self.fetch("block", &height.to_string()).await?;
        let messages = self.scan(listing.txs, filter).await?;
        Ok(messages.into_iter().map(|m| m.at_height(height)).collect())
    }

    async fn get_utxos(&self, address: &str) -> Result<Vec<Utxo>, ExplorerError> {
        require_non_empty(address, "address")?;
        let listing: UnspentListing = self.fetch("get_tx_unspent", address).await?;
        if listing.txs.is_empty() {
            return Err(ExplorerError::NoUtxos {
                address: address.to_owned(),
            });
        }

        listing
            .txs
            .into_iter()
            .map(|utxo| {
                Ok(Utxo {
                    address: address.to_owned(),
                    txid: utxo.txid,
                    output_index: utxo.output_no,
                    script: script_from_hex(&utxo.script_hex)?,
                    value: parse_btc_amount(&utxo.value)?,
                    confirmations: utxo.confirmations.unwrap_or(0),
                })
            })
            .collect()
    }

    async fn relay(&self, raw_tx_hex: &str) -> Result<(), ExplorerError> {
        require_non_empty(raw_tx_hex, "raw transaction")?;
        let body = self
            .transport
            .post_form(&["api", "v2", "send_tx", self.network_flag()], &[("tx_hex", raw_tx_hex)])
            .await?;
        self.normalizer.relay(&body).into_relay_outcome()?.into_result()
    }
}

// ==============================================================================
// Wire Shapes
// ==============================================================================

#[derive(Deserialize)]
struct TxPayload {
    tx_hex: String,
    block_no: Option<u32>,
    fee: serde_json::Value,
}

#[derive(Deserialize)]
struct TxListing {
    txs: Vec<TxRef>,
}

/// A listing entry. Address listings give objects without outputs; block
/// listings may give bare txids or objects with outputs.
#[derive(Deserialize)]
#[serde(from = "TxRefRepr")]
struct TxRef {
    txid: String,
    first_output_address: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TxRefRepr {
    Id(String),
    Entry {
        txid: String,
        #[serde(default)]
        outputs: Vec<OutputRef>,
    },
}

#[derive(Deserialize)]
struct OutputRef {
    address: Option<String>,
}

impl From<TxRefRepr> for TxRef {
    fn from(repr: TxRefRepr) -> Self {
        match repr {
            TxRefRepr::Id(txid) => Self {
                txid,
                first_output_address: None,
            },
            TxRefRepr::Entry { txid, outputs } => Self {
                txid,
                first_output_address: outputs.into_iter().next().and_then(|out| out.address),
            },
        }
    }
}

impl ScanRecord for TxRef {
    // Listings do not say; coinbase is caught once the transaction is loaded.
    fn is_coinbase(&self) -> bool {
        false
    }

    fn first_output_address(&self) -> Option<&str> {
        self.first_output_address.as_deref()
    }
}

#[derive(Deserialize)]
struct UnspentListing {
    txs: Vec<UnspentEntry>,
}

#[derive(Deserialize)]
struct UnspentEntry {
    txid: String,
    output_no: u32,
    script_hex: String,
    value: serde_json::Value,
    confirmations: Option<u64>,
}
