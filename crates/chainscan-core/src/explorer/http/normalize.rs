//! Per-backend response envelopes.
//!
//! Each backend signals success and failure its own way. A normalizer turns a
//! raw body into a [`Reply`], and the adapter translates that into the shared
//! error taxonomy, so backend field names never leak past the adapter.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::warn;

use crate::error::ExplorerError;
use crate::types::RelayOutcome;

/// Outcome of one backend call before it is mapped onto [`ExplorerError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply<T> {
    Success(T),
    Rejected(String),
    Malformed(String),
}

impl<T> Reply<T> {
    /// For read calls there is no "rejected": anything but success means the
    /// response did not meet the adapter's expectations.
    pub fn into_payload(self) -> Result<T, ExplorerError> {
        match self {
            Self::Success(payload) => Ok(payload),
            Self::Rejected(reason) => Err(ExplorerError::MalformedResponse(format!(
                "backend reported failure: {reason}"
            ))),
            Self::Malformed(reason) => Err(ExplorerError::MalformedResponse(reason)),
        }
    }
}

impl Reply<()> {
    pub fn into_relay_outcome(self) -> Result<RelayOutcome, ExplorerError> {
        match self {
            Self::Success(()) => Ok(RelayOutcome::Accepted),
            Self::Rejected(reason) => Ok(RelayOutcome::Rejected(reason)),
            Self::Malformed(reason) => Err(ExplorerError::MalformedResponse(reason)),
        }
    }
}

pub trait ResponseNormalizer {
    /// Validate the envelope and deserialize the payload.
    fn payload<T: DeserializeOwned>(&self, body: &str) -> Reply<T>;

    /// Apply the backend's rejection predicate to a broadcast response.
    fn relay(&self, body: &str) -> Reply<()>;
}

// ==============================================================================
// JSend envelope: {"status": "success" | "fail", "data": {...}}
// ==============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct JsendNormalizer;

#[derive(Deserialize)]
struct JsendEnvelope {
    status: Option<String>,
    #[serde(default)]
    data: serde_json::Value,
}

impl JsendNormalizer {
    fn envelope(body: &str) -> Result<JsendEnvelope, String> {
        serde_json::from_str(body).map_err(|e| format!("response is not a JSON envelope: {e}"))
    }

    /// The diagnostic a failed call carries. Broadcast failures put it under
    /// `data.tx_hex`; anything else is reported as the raw `data` value.
    fn failure_reason(data: &serde_json::Value) -> String {
        match data.get("tx_hex").and_then(serde_json::Value::as_str) {
            Some(reason) => reason.to_owned(),
            None => data.to_string(),
        }
    }
}

impl ResponseNormalizer for JsendNormalizer {
    fn payload<T: DeserializeOwned>(&self, body: &str) -> Reply<T> {
        let envelope = match Self::envelope(body) {
            Ok(envelope) => envelope,
            Err(reason) => return Reply::Malformed(reason),
        };
        match envelope.status.as_deref() {
            Some("success") => match serde_json::from_value(envelope.data) {
                Ok(payload) => Reply::Success(payload),
                Err(e) => Reply::Malformed(format!("unexpected payload shape: {e}")),
            },
            Some("fail") => Reply::Rejected(Self::failure_reason(&envelope.data)),
            other => {
                warn!(status = ?other, "unrecognized envelope status");
                Reply::Malformed(format!("unrecognized envelope status {other:?}"))
            }
        }
    }

    fn relay(&self, body: &str) -> Reply<()> {
        let envelope = match Self::envelope(body) {
            Ok(envelope) => envelope,
            Err(reason) => return Reply::Malformed(reason),
        };
        match envelope.status.as_deref() {
            Some("success") => Reply::Success(()),
            Some("fail") => Reply::Rejected(Self::failure_reason(&envelope.data)),
            other => Reply::Malformed(format!("unrecognized envelope status {other:?}")),
        }
    }
}

// ==============================================================================
// Bare JSON: the payload is the document itself
// ==============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct BareJsonNormalizer;

impl ResponseNormalizer for BareJsonNormalizer {
    fn payload<T: DeserializeOwned>(&self, body: &str) -> Reply<T> {
        match serde_json::from_str(body) {
            Ok(payload) => Reply::Success(payload),
            Err(e) => Reply::Malformed(format!("unexpected payload shape: {e}")),
        }
    }

    fn relay(&self, body: &str) -> Reply<()> {
        let value: serde_json::Value = match serde_json::from_str(body) {
            Ok(value) => value,
            Err(e) => return Reply::Malformed(format!("response is not JSON: {e}")),
        };
        match value.get("error") {
            None | Some(serde_json::Value::Null) => Reply::Success(()),
            Some(serde_json::Value::String(reason)) => Reply::Rejected(reason.clone()),
            Some(other) => Reply::Rejected(other.to_string()),
        }
    }
}
