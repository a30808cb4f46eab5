use bitcoin::hex::FromHex;
use bitcoin::script::{Builder, PushBytesBuf};
use bitcoin::{Amount, Denomination, ScriptBuf};

use crate::error::ExplorerError;

/// Parse a BTC-denominated amount into exact satoshis.
///
/// Strings go through `Amount::from_str_in`, which never touches floating
/// point. Numbers are rendered back to decimal text first for the same
/// reason; only exponent forms fall back to `from_float_in`.
pub(crate) fn parse_btc_amount(value: &serde_json::Value) -> Result<Amount, ExplorerError> {
    match value {
        serde_json::Value::String(s) => btc_str_to_amount(s),
        serde_json::Value::Number(n) => {
            let text = n.to_string();
            if text.contains(['e', 'E']) {
                let parsed = n.as_f64().ok_or_else(|| malformed_amount(value, "not finite"))?;
                Amount::from_float_in(parsed, Denomination::Bitcoin)
                    .map_err(|e| malformed_amount(value, &e.to_string()))
            } else {
                btc_str_to_amount(&text)
            }
        }
        _ => Err(malformed_amount(value, "expected a number or decimal string")),
    }
}

pub(crate) fn btc_str_to_amount(s: &str) -> Result<Amount, ExplorerError> {
    Amount::from_str_in(s.trim(), Denomination::Bitcoin)
        .map_err(|e| ExplorerError::MalformedResponse(format!("invalid BTC amount `{s}`: {e}")))
}

/// Parse an amount that is already in satoshis.
pub(crate) fn parse_sat_amount(value: &serde_json::Value) -> Result<Amount, ExplorerError> {
    if let Some(sats) = value.as_u64() {
        return Ok(Amount::from_sat(sats));
    }
    value
        .as_str()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Amount::from_sat)
        .ok_or_else(|| malformed_amount(value, "expected a non-negative satoshi integer"))
}

fn malformed_amount(value: &serde_json::Value, why: &str) -> ExplorerError {
    ExplorerError::MalformedResponse(format!("invalid amount `{value}`: {why}"))
}

pub(crate) fn script_from_hex(hex_str: &str) -> Result<ScriptBuf, ExplorerError> {
    ScriptBuf::from_hex(hex_str)
        .map_err(|e| ExplorerError::MalformedResponse(format!("invalid script hex: {e}")))
}

/// Consensus-decode a raw transaction. `None` if the hex or the encoding is bad.
pub(crate) fn decode_raw_tx(hex_str: &str) -> Option<bitcoin::Transaction> {
    let bytes = Vec::<u8>::from_hex(hex_str.trim()).ok()?;
    bitcoin::consensus::deserialize(&bytes).ok()
}

/// Reassemble script bytes from a space-separated list of pushes.
///
/// Some explorers render input scripts as `"<sig> <pubkey>"` instead of raw
/// hex. A bare `0` stands for `OP_0`; every other token is hex data and gets
/// a push of the matching length. Returns `None` for a token that is not hex.
pub(crate) fn script_from_pushes(asm: &str) -> Option<ScriptBuf> {
    let mut builder = Builder::new();
    for token in asm.split_whitespace() {
        if token == "0" {
            builder = builder.push_int(0);
            continue;
        }
        let bytes = Vec::<u8>::from_hex(token).ok()?;
        let push = PushBytesBuf::try_from(bytes).ok()?;
        builder = builder.push_slice(push);
    }
    Some(builder.into_script())
}
