pub mod config;
pub mod error;
pub mod explorer;
pub mod scan;
pub mod types;

#[cfg(test)]
mod test_util;

pub use config::BackendConfig;
pub use error::{ExplorerError, TransportError};
pub use explorer::{ExplorerBackend, MemoryExplorer, SoChain, Toshi};
pub use scan::{CreatedRecordShortcut, MessageDecoder};
pub use types::{BlockHeight, MessageFilter, ScannedMessage, Transaction, Utxo};
