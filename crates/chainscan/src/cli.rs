use clap::{Parser, Subcommand, ValueEnum};

/// chainscan: query Bitcoin block explorers and scan transactions for
/// OP_RETURN messages.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Cli {
    /// Explorer service to query.
    #[arg(long, value_enum, default_value_t = Backend::Sochain, env = "CHAINSCAN_BACKEND")]
    pub backend: Backend,

    /// Override the backend's base URL (self-hosted mirror, test server).
    #[arg(long, env = "CHAINSCAN_BASE_URL")]
    pub base_url: Option<String>,

    /// Query testnet instead of mainnet.
    #[arg(long, env = "CHAINSCAN_TESTNET")]
    pub testnet: bool,

    /// Minimum spacing between requests to rate-limited backends.
    #[arg(long, default_value = "250", env = "CHAINSCAN_RATE_LIMIT_MS")]
    pub rate_limit_ms: u64,

    /// Only load reserved-prefix transactions when scanning for
    /// "record created" messages.
    #[arg(long)]
    pub created_record_shortcut: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    Sochain,
    Toshi,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Fetch one transaction.
    Tx { txid: String },

    /// List unspent outputs of an address.
    Utxos { address: String },

    /// Broadcast a raw transaction given as hex.
    Relay { hex: String },

    /// Scan an address's history for messages.
    AddressMessages {
        address: String,
        /// Only report messages with this type tag.
        #[arg(long = "type")]
        message_type: Option<String>,
    },

    /// Scan a block for messages.
    BlockMessages {
        height: u32,
        /// Only report messages with this type tag.
        #[arg(long = "type")]
        message_type: Option<String>,
    },
}
