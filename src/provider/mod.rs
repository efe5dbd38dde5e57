
use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::ProviderError;
use crate::config::ProviderConfig;

/// Blocking JSON-over-HTTP transport shared by the embedding and completion
/// clients. Every call is a single attempt; non-2xx responses are returned
/// as [`ProviderError`] with the body untouched.
#[derive(Debug, Clone)]
pub struct ProviderTransport {
    base_url: Url,
    api_key: Option<String>,
    agent: ureq::Agent,
}

impl ProviderTransport {
    #[inline]
    pub fn new(base_url: Url, api_key: Option<String>, timeout: Duration) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            base_url,
            api_key,
            agent,
        }
    }

    #[inline]
    pub fn from_config(config: &ProviderConfig) -> crate::Result<Self> {
        let base_url = config.base_url()?;
        let api_key = match config.api_key() {
            Ok(key) => Some(key),
            Err(e) => {
                warn!("{}; requests will be sent without authorization", e);
                None
            }
        };

        Ok(Self::new(
            base_url,
            api_key,
            Duration::from_secs(config.timeout_seconds),
        ))
    }

    #[inline]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// POST `body` as JSON to `endpoint` (relative to the base url) and decode
    /// the JSON response.
    #[inline]
    pub fn post_json<B, R>(&self, endpoint: &str, body: &B) -> Result<R, ProviderError>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let url = self
            .base_url
            .join(endpoint)
            .map_err(|e| ProviderError::transport(format!("invalid endpoint {endpoint}: {e}")))?;

        let request_json = serde_json::to_string(body)
            .map_err(|e| ProviderError::transport(format!("failed to encode request: {e}")))?;

        debug!("POST {} ({} bytes)", url, request_json.len());

        let mut request = self
            .agent
            .post(url.as_str())
            .header("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let mut response = request
            .send(&request_json)
            .map_err(|e| ProviderError::transport(e.to_string()))?;

        let status = response.status();
        let response_text = response
            .body_mut()
            .read_to_string()
            .map_err(|e| ProviderError::transport(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            warn!("Provider returned HTTP {} for {}", status.as_u16(), url);
            return Err(ProviderError::status(status.as_u16(), response_text));
        }

        serde_json::from_str(&response_text).map_err(|e| {
            debug!("Undecodable provider response: {}", response_text);
            ProviderError::status(
                status.as_u16(),
                format!("unexpected response shape ({e}): {response_text}"),
            )
        })
    }
}
