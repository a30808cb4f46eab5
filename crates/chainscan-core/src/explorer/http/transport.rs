use std::time::Duration;

use reqwest::Url;
use tracing::{debug, trace};

use crate::error::{ExplorerError, TransportError};

use super::limiter::RequestLimiter;

/// Issues GET and form POST requests against one backend's base URL.
///
/// When a [`RequestLimiter`] is attached, every request waits for a token
/// before it is sent.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
    limiter: Option<RequestLimiter>,
}

impl HttpTransport {
    pub fn new(base_url: Url, limiter: Option<RequestLimiter>) -> Result<Self, ExplorerError> {
        if base_url.cannot_be_a_base() {
            return Err(ExplorerError::InvalidConfig(format!(
                "base URL `{base_url}` cannot carry path segments"
            )));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(8)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| ExplorerError::InvalidConfig(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            limiter,
        })
    }

    /// Build `base_url/segment/segment?query`. Segments are percent-encoded.
    pub fn url(&self, segments: &[&str], query: &[(&str, String)]) -> Result<Url, ExplorerError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| TransportError::Url(format!("`{}` cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    pub async fn get(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<String, ExplorerError> {
        let url = self.url(segments, query)?;
        self.wait_for_rate_limit().await;
        debug!(http.method = "GET", %url, "explorer request");
        let response = self.client.get(url.clone()).send().await?;
        read_body(&url, response).await
    }

    /// POST a form-encoded body.
    pub async fn post_form(
        &self,
        segments: &[&str],
        form: &[(&str, &str)],
    ) -> Result<String, ExplorerError> {
        let url = self.url(segments, &[])?;
        self.wait_for_rate_limit().await;
        debug!(http.method = "POST", %url, fields = form.len(), "explorer request");
        let response = self.client.post(url.clone()).form(form).send().await?;
        read_body(&url, response).await
    }

    async fn wait_for_rate_limit(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.acquire().await;
        }
    }
}

async fn read_body(url: &Url, response: reqwest::Response) -> Result<String, ExplorerError> {
    let status = response.status();
    let body = response.text().await?;
    debug!(%url, %status, body_len = body.len(), "explorer response");
    trace!(%url, body = %body, "explorer response body");

    if !status.is_success() {
        return Err(TransportError::Status { status, body }.into());
    }
    Ok(body)
}
