//! Turning a stream of raw transactions into decoded application messages.
//!
//! The decode hook ([`MessageDecoder`]) belongs to the caller; this module
//! only decides which transactions reach it, in what order, and how its
//! answers are collected.

use std::future::Future;

use tracing::debug;

use crate::error::ExplorerError;
use crate::types::{MessageFilter, ScannedMessage, Transaction};

/// Message type discriminator for "record created" messages.
pub const RECORD_CREATED_MARKER: &str = "ITCRTE";

/// Address prefix every "record created" message is sent to.
pub const RESERVED_ADDRESS_PREFIX: &str = "1DZ";

/// The external codec that recognizes application messages in transactions.
pub trait MessageDecoder: Send + Sync {
    type Message: Send;
    type Error: std::error::Error + Send + Sync + 'static;

    /// `Ok(None)` means the transaction is well-formed but carries no
    /// message this codec recognizes. `Err` is a real failure and aborts
    /// the scan.
    fn decode(
        &self,
        tx: &Transaction,
        filter: &MessageFilter,
    ) -> Result<Option<Self::Message>, Self::Error>;
}

/// What the pipeline needs to know about a listing entry before it is
/// loaded and decoded.
pub trait ScanRecord {
    fn is_coinbase(&self) -> bool;
    fn first_output_address(&self) -> Option<&str>;
}

impl ScanRecord for Transaction {
    fn is_coinbase(&self) -> bool {
        Transaction::is_coinbase(self)
    }

    fn first_output_address(&self) -> Option<&str> {
        Transaction::first_output_address(self)
    }
}

/// Skip decoding "record created" candidates whose first output is not sent
/// to the reserved address prefix.
///
/// Only sound while the codec guarantees that such messages are always
/// addressed to that prefix, so it is off unless an adapter is given one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedRecordShortcut {
    pub marker: String,
    pub address_prefix: String,
}

impl Default for CreatedRecordShortcut {
    fn default() -> Self {
        Self {
            marker: RECORD_CREATED_MARKER.to_owned(),
            address_prefix: RESERVED_ADDRESS_PREFIX.to_owned(),
        }
    }
}

impl CreatedRecordShortcut {
    fn applies_to(&self, filter: &MessageFilter) -> bool {
        filter.message_type.as_deref() == Some(self.marker.as_str())
    }

    /// Whether a loaded transaction can skip the decode hook. A first output
    /// without an address cannot carry the prefix.
    pub fn skips<R: ScanRecord + ?Sized>(&self, record: &R, filter: &MessageFilter) -> bool {
        self.applies_to(filter)
            && !record
                .first_output_address()
                .is_some_and(|addr| addr.starts_with(&self.address_prefix))
    }

    /// Whether a listing entry can skip loading altogether. Only an entry
    /// that reports its first output address can be judged this early.
    pub fn skips_unloaded<R: ScanRecord + ?Sized>(&self, record: &R, filter: &MessageFilter) -> bool {
        self.applies_to(filter)
            && record
                .first_output_address()
                .is_some_and(|addr| !addr.starts_with(&self.address_prefix))
    }
}

/// One scan request: the decode hook, the caller's filter, and the optional
/// shortcut.
pub struct MessageScan<'a, D: ?Sized> {
    decoder: &'a D,
    filter: &'a MessageFilter,
    shortcut: Option<&'a CreatedRecordShortcut>,
}

impl<'a, D: MessageDecoder + ?Sized> MessageScan<'a, D> {
    pub fn new(decoder: &'a D, filter: &'a MessageFilter) -> Self {
        Self {
            decoder,
            filter,
            shortcut: None,
        }
    }

    pub fn with_shortcut(mut self, shortcut: Option<&'a CreatedRecordShortcut>) -> Self {
        self.shortcut = shortcut;
        self
    }

    fn admits<R: ScanRecord + ?Sized>(&self, record: &R) -> bool {
        if record.is_coinbase() {
            return false;
        }
        !self
            .shortcut
            .is_some_and(|shortcut| shortcut.skips_unloaded(record, self.filter))
    }

    fn skips_loaded(&self, tx: &Transaction) -> bool {
        self.shortcut
            .is_some_and(|shortcut| shortcut.skips(tx, self.filter))
    }

    fn decode(&self, tx: &Transaction) -> Result<Option<D::Message>, ExplorerError> {
        self.decoder
            .decode(tx, self.filter)
            .map_err(|e| ExplorerError::Decode(Box::new(e)))
    }

    /// Run the pipeline over `records` in order.
    ///
    /// `load` turns an admitted listing entry into a full transaction; it may
    /// return `None` for entries whose payload cannot be decoded. Coinbase
    /// transactions are dropped both before and after loading, so the decode
    /// hook never sees one. The shortcut is likewise checked on the entry and
    /// again on the loaded transaction, whose first address is always known.
    pub async fn run<R, F, Fut>(
        &self,
        records: Vec<R>,
        mut load: F,
    ) -> Result<Vec<ScannedMessage<D::Message>>, ExplorerError>
    where
        R: ScanRecord,
        F: FnMut(R) -> Fut,
        Fut: Future<Output = Result<Option<Transaction>, ExplorerError>>,
    {
        let candidates = records.len();
        let mut messages = Vec::new();
        for record in records {
            if !self.admits(&record) {
                continue;
            }
            let Some(tx) = load(record).await? else {
                continue;
            };
            if tx.is_coinbase() || self.skips_loaded(&tx) {
                continue;
            }
            if let Some(message) = self.decode(&tx)? {
                messages.push(ScannedMessage {
                    txid: tx.txid,
                    block_height: tx.block_height,
                    tip: tx.tip,
                    message,
                });
            }
        }
        debug!(
            candidates,
            decoded = messages.len(),
            message_type = ?self.filter.message_type,
            "message scan finished"
        );
        Ok(messages)
    }
}
