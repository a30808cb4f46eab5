mod cli;
mod opreturn;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use eyre::WrapErr;
use serde::Serialize;

use chainscan_core::{
    BackendConfig, BlockHeight, CreatedRecordShortcut, ExplorerBackend, ExplorerError,
    MessageFilter, SoChain, Toshi,
};

use cli::{Backend, Cli, Command};
use opreturn::{OpReturnDecoder, OpReturnMessage};

type Explorer = Box<dyn ExplorerBackend<Message = OpReturnMessage>>;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let explorer = build_explorer(&args).context("configure explorer backend")?;
    tracing::info!(backend = ?args.backend, testnet = args.testnet, "explorer ready");

    match args.command {
        Command::Tx { txid } => {
            let tx = explorer
                .tx_by_id(&txid)
                .await
                .with_context(|| format!("fetch transaction {txid}"))?;
            if tx.is_none() {
                tracing::warn!(%txid, "backend returned a transaction that could not be parsed");
            }
            print_json(&tx)
        }
        Command::Utxos { address } => match explorer.get_utxos(&address).await {
            Ok(utxos) => print_json(&utxos),
            Err(err) if err.is_no_data() => {
                tracing::info!(%address, "address has no unspent outputs");
                print_json(&Vec::<()>::new())
            }
            Err(err) => Err(err).with_context(|| format!("list unspent outputs of {address}")),
        },
        Command::Relay { hex } => {
            relay(explorer.as_ref(), &hex).await?;
            print_json(&serde_json::json!({ "accepted": true }))
        }
        Command::AddressMessages {
            address,
            message_type,
        } => {
            let messages = explorer
                .messages_by_addr(&address, &filter(message_type))
                .await
                .with_context(|| format!("scan address {address}"))?;
            print_json(&messages)
        }
        Command::BlockMessages {
            height,
            message_type,
        } => {
            let messages = explorer
                .messages_in_block(BlockHeight(height), &filter(message_type))
                .await
                .with_context(|| format!("scan block {height}"))?;
            print_json(&messages)
        }
    }
}

fn build_explorer(args: &Cli) -> Result<Explorer, ExplorerError> {
    let mut config = BackendConfig::default()
        .with_testnet(args.testnet)
        .with_rate_limit_interval(Duration::from_millis(args.rate_limit_ms));
    if let Some(url) = &args.base_url {
        config = config.with_base_url(url.clone());
    }
    let shortcut = args
        .created_record_shortcut
        .then(CreatedRecordShortcut::default);

    let decoder = Arc::new(OpReturnDecoder);
    let explorer: Explorer = match args.backend {
        Backend::Sochain => {
            let adapter = SoChain::new(&config, decoder)?;
            match shortcut {
                Some(shortcut) => Box::new(adapter.with_created_record_shortcut(shortcut)),
                None => Box::new(adapter),
            }
        }
        Backend::Toshi => {
            let adapter = Toshi::new(&config, decoder)?;
            match shortcut {
                Some(shortcut) => Box::new(adapter.with_created_record_shortcut(shortcut)),
                None => Box::new(adapter),
            }
        }
    };
    Ok(explorer)
}

async fn relay(
    explorer: &dyn ExplorerBackend<Message = OpReturnMessage>,
    hex: &str,
) -> eyre::Result<()> {
    match explorer.relay(hex).await {
        Ok(()) => {
            tracing::info!("transaction accepted for relay");
            Ok(())
        }
        Err(ExplorerError::RelayUnaccepted(reason)) => {
            Err(eyre::eyre!("backend refused the transaction: {reason}"))
        }
        Err(err) => Err(err).context("relay transaction"),
    }
}

fn filter(message_type: Option<String>) -> MessageFilter {
    match message_type {
        Some(tag) => MessageFilter::of_type(tag),
        None => MessageFilter::default(),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> eyre::Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("render JSON output")?;
    println!("{rendered}");
    Ok(())
}
