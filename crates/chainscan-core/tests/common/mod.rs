#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Once};
use std::time::Instant;

use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::Router;
use bitcoin::consensus::encode::serialize_hex;
use bitcoin::hashes::Hash;
use bitcoin::transaction::Version;
use bitcoin::{absolute, Amount, OutPoint, PubkeyHash, ScriptBuf, Sequence, TxIn, TxOut, Txid, Witness};
use chainscan_core::{MessageDecoder, MessageFilter, Transaction};

static TRACING_INIT: Once = Once::new();

pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("chainscan_core=debug")),
            )
            .with_target(true)
            .with_test_writer()
            .try_init();
    });
}

// ==============================================================================
// Mock Explorer Server
// ==============================================================================

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    /// Path plus query string, e.g. `/api/v0/blocks/7/transactions?limit=1000&offset=0`.
    pub target: String,
    pub body: String,
    pub at: Instant,
}

/// Serves canned bodies keyed by `METHOD target`; anything else is a 404.
#[derive(Clone, Default)]
pub struct MockExplorer {
    routes: Arc<Mutex<HashMap<String, (StatusCode, String)>>>,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockExplorer {
    pub fn respond(&self, method: Method, target: &str, status: StatusCode, body: impl Into<String>) {
        self.routes
            .lock()
            .expect("routes lock")
            .insert(format!("{method} {target}"), (status, body.into()));
    }

    pub fn get_json(&self, target: &str, body: serde_json::Value) {
        self.respond(Method::GET, target, StatusCode::OK, body.to_string());
    }

    pub fn post_json(&self, target: &str, body: serde_json::Value) {
        self.respond(Method::POST, target, StatusCode::OK, body.to_string());
    }

    /// Bind to an ephemeral port and serve in the background.
    pub async fn start(&self) -> String {
        init_tracing();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("ephemeral port must bind");
        let addr = listener.local_addr().expect("bound listener has an address");
        let router = Router::new().fallback(handle).with_state(self.clone());
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("mock explorer must serve");
        });
        format!("http://{addr}/")
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub fn targets(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.target).collect()
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.target.starts_with(prefix))
            .count()
    }
}

async fn handle(
    State(mock): State<MockExplorer>,
    method: Method,
    uri: Uri,
    body: String,
) -> (StatusCode, String) {
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_owned())
        .unwrap_or_else(|| uri.path().to_owned());
    mock.requests.lock().expect("requests lock").push(Recorded {
        method: method.clone(),
        target: target.clone(),
        body,
        at: Instant::now(),
    });

    mock.routes
        .lock()
        .expect("routes lock")
        .get(&format!("{method} {target}"))
        .cloned()
        .unwrap_or((StatusCode::NOT_FOUND, format!("no route for {method} {target}")))
}

// ==============================================================================
// Transactions
// ==============================================================================

pub fn p2pkh_script(b: u8) -> ScriptBuf {
    ScriptBuf::new_p2pkh(&PubkeyHash::from_byte_array([b; 20]))
}

/// Raw hex of a one-input transaction paying `values` to distinct P2PKH scripts.
pub fn raw_tx_hex(values: &[u64]) -> String {
    let tx = bitcoin::Transaction {
        version: Version::TWO,
        lock_time: absolute::LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint::new(Txid::from_byte_array([3; 32]), 1),
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }],
        output: values
            .iter()
            .enumerate()
            .map(|(i, value)| TxOut {
                value: Amount::from_sat(*value),
                script_pubkey: p2pkh_script(i as u8 + 1),
            })
            .collect(),
    };
    serialize_hex(&tx)
}

/// A Toshi-shaped transaction document.
pub fn toshi_tx(hash: &str, first_address: &str) -> serde_json::Value {
    serde_json::json!({
        "hash": hash,
        "block_height": 300000,
        "fees": 10000,
        "inputs": [{
            "previous_transaction_hash": "11".repeat(32),
            "output_index": 0,
            "script": "3045022100aa 02bb"
        }],
        "outputs": [{
            "amount": 5460,
            "script_hex": "76a914000000000000000000000000000000000000000088ac",
            "addresses": [first_address]
        }]
    })
}

// ==============================================================================
// Decode Hook
// ==============================================================================

#[derive(Debug, thiserror::Error)]
#[error("decode hook failure")]
pub struct HookError;

/// Decodes every transaction to its txid and remembers what it saw.
#[derive(Default)]
pub struct TxidDecoder {
    seen: Mutex<Vec<String>>,
}

impl TxidDecoder {
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().expect("seen lock").clone()
    }
}

impl MessageDecoder for TxidDecoder {
    type Message = String;
    type Error = HookError;

    fn decode(&self, tx: &Transaction, _filter: &MessageFilter) -> Result<Option<String>, HookError> {
        self.seen.lock().expect("seen lock").push(tx.txid.clone());
        Ok(Some(tx.txid.clone()))
    }
}
