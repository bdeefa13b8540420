//! HTTP client for the external completion endpoint.
//!
//! Posts a [`CompletionRequest`] as JSON and expects a
//! `{response, tokens, cost}` body back. Error bodies of the form
//! `{"error": "..."}` are surfaced verbatim.

use async_trait::async_trait;
use launchpad_core::completion::{CompletionRequest, CompletionResponse, CompletionService};
use launchpad_core::config::CompletionSettings;
use launchpad_core::error::{LaunchpadError, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Completion service that talks to a remote HTTP function.
#[derive(Clone)]
pub struct HttpCompletionClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl HttpCompletionClient {
    /// Creates a client for `endpoint` with the given request timeout.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LaunchpadError::config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: None,
        })
    }

    /// Builds a client from configuration.
    ///
    /// Returns `Ok(None)` when no endpoint is configured.
    pub fn from_settings(settings: &CompletionSettings) -> Result<Option<Self>> {
        let Some(endpoint) = settings.endpoint.as_deref().filter(|e| !e.trim().is_empty()) else {
            return Ok(None);
        };
        let client = Self::new(endpoint, Duration::from_secs(settings.timeout_secs))?;
        Ok(Some(match &settings.api_key {
            Some(key) => client.with_api_key(key.clone()),
            None => client,
        }))
    }

    /// Sends `key` as a bearer token on every request.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CompletionService for HttpCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        tracing::debug!(
            endpoint = %self.endpoint,
            session_id = %request.session_id,
            history = request.history.len(),
            "invoking completion endpoint"
        );

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| LaunchpadError::completion(format!("request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LaunchpadError::completion(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or(body);
            return Err(LaunchpadError::completion(format!(
                "endpoint returned {status}: {detail}"
            )));
        }

        serde_json::from_str(&body)
            .map_err(|e| LaunchpadError::completion(format!("malformed response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_settings_without_endpoint() {
        let settings = CompletionSettings::default();
        assert!(HttpCompletionClient::from_settings(&settings).unwrap().is_none());

        let blank = CompletionSettings {
            endpoint: Some("  ".into()),
            ..Default::default()
        };
        assert!(HttpCompletionClient::from_settings(&blank).unwrap().is_none());
    }

    #[test]
    fn test_from_settings_with_endpoint() {
        let settings = CompletionSettings {
            endpoint: Some("http://127.0.0.1:9/complete".into()),
            api_key: Some("secret".into()),
            timeout_secs: 5,
        };
        let client = HttpCompletionClient::from_settings(&settings)
            .unwrap()
            .unwrap();
        assert_eq!(client.endpoint(), "http://127.0.0.1:9/complete");
        assert_eq!(client.api_key.as_deref(), Some("secret"));
    }
}
