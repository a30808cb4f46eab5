//! Block explorer abstraction layer.
//!
//! Defines the [`ExplorerBackend`] trait and provides adapters for two web
//! explorers ([`SoChain`], [`Toshi`]) plus an in-process backend
//! ([`MemoryExplorer`]) for tests of code that consumes the trait.

mod http;
pub mod memory;
pub mod sochain;
pub mod toshi;

pub use http::limiter::RequestLimiter;
pub use http::normalize::Reply;
pub use http::paginate::{collect_counted, collect_until_short, Page};
pub use memory::MemoryExplorer;
pub use sochain::SoChain;
pub use toshi::Toshi;

use async_trait::async_trait;

use crate::error::ExplorerError;
use crate::types::{BlockHeight, MessageFilter, ScannedMessage, Transaction, Utxo};

/// The five capabilities every explorer adapter offers.
///
/// Implementations handle URL construction, rate limiting, pagination and
/// response normalization internally; nothing backend-specific crosses this
/// boundary.
#[async_trait]
pub trait ExplorerBackend: Send + Sync {
    /// The application message type produced by the adapter's decode hook.
    type Message: Send;

    /// Fetch one transaction. `Ok(None)` when the backend answered but the
    /// payload could not be decoded into a transaction.
    async fn tx_by_id(&self, txid: &str) -> Result<Option<Transaction>, ExplorerError>;

    /// Decoded messages from every transaction touching `address`, including
    /// unconfirmed ones, in backend listing order.
    async fn messages_by_addr(
        &self,
        address: &str,
        filter: &MessageFilter,
    ) -> Result<Vec<ScannedMessage<Self::Message>>, ExplorerError>;

    /// Decoded messages from the transactions of one block. Every message is
    /// stamped with `height`.
    async fn messages_in_block(
        &self,
        height: BlockHeight,
        filter: &MessageFilter,
    ) -> Result<Vec<ScannedMessage<Self::Message>>, ExplorerError>;

    /// Unspent outputs of `address`; [`ExplorerError::NoUtxos`] when there
    /// are none.
    async fn get_utxos(&self, address: &str) -> Result<Vec<Utxo>, ExplorerError>;

    /// Broadcast a signed raw transaction.
    async fn relay(&self, raw_tx_hex: &str) -> Result<(), ExplorerError>;
}
