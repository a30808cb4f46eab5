/// Failures that prevent an outbound request from completing at all.
///
/// These are kept apart from [`ExplorerError::MalformedResponse`] so callers
/// can tell "the service answered with garbage" from "we never got an answer".
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("cannot build request URL: {0}")]
    Url(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ExplorerError {
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("malformed explorer response: {0}")]
    MalformedResponse(String),

    #[error("no unspent outputs for address {address}")]
    NoUtxos { address: String },

    #[error("relay not accepted: {0}")]
    RelayUnaccepted(String),

    #[error("message decode failed: {0}")]
    Decode(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid backend configuration: {0}")]
    InvalidConfig(String),
}

impl ExplorerError {
    /// The backend affirmatively reported that there is nothing to return.
    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoUtxos { .. })
    }

    /// We could not determine whether the requested data exists.
    pub fn is_indeterminate(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::MalformedResponse(_))
    }
}

impl From<reqwest::Error> for ExplorerError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(TransportError::Request(err))
    }
}

/// Reject empty per-call inputs before any network activity.
pub(crate) fn require_non_empty(value: &str, name: &str) -> Result<(), ExplorerError> {
    if value.trim().is_empty() {
        return Err(ExplorerError::InvalidArgument(format!(
            "{name} is a required parameter"
        )));
    }
    Ok(())
}
