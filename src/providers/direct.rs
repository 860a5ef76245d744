//! Direct-LLM provider client
//!
//! Second member of the fallback chain. Connects to a local or remote LLM
//! server speaking the `/api/chat` protocol. No credentials are required;
//! the provider is configured as soon as a host is set.

use crate::classify::{error_for_status, error_for_transport};
use crate::config::DirectConfig;
use crate::error::{ConvokeError, Result};
use crate::providers::{
    extract_content, unrecognized_shape, ContextEntry, ProviderClient, ProviderReply,
    ProviderRequest,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// Direct LLM server client
pub struct DirectClient {
    client: Client,
    config: DirectConfig,
}

/// Request payload for the chat endpoint
#[derive(Debug, Serialize)]
struct DirectRequest<'a> {
    model: &'a str,
    messages: &'a [ContextEntry],
    stream: bool,
}

impl DirectClient {
    /// Create a new direct-LLM client
    ///
    /// # Errors
    ///
    /// Returns an error if HTTP client initialization fails.
    pub fn new(config: DirectConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("convoke/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                ConvokeError::Config(format!("Failed to create HTTP client: {}", e))
            })?;

        if let Some(host) = &config.host {
            tracing::info!(host, model = config.model, "initialized direct-LLM client");
        }

        Ok(Self { client, config })
    }
}

#[async_trait]
impl ProviderClient for DirectClient {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn is_configured(&self) -> bool {
        self.config.host.as_deref().is_some_and(|h| !h.is_empty())
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_seconds)
    }

    async fn call(
        &self,
        request: &ProviderRequest,
    ) -> std::result::Result<ProviderReply, ConvokeError> {
        let host = self.config.host.as_deref().ok_or_else(|| {
            ConvokeError::Configuration {
                provider: "direct".to_string(),
                message: "no host configured".to_string(),
            }
        })?;

        let payload = DirectRequest {
            model: &self.config.model,
            messages: &request.context,
            stream: false,
        };

        let url = format!("{}/api/chat", host.trim_end_matches('/'));
        tracing::debug!(
            model = self.config.model,
            entries = request.context.len(),
            "direct request"
        );

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| error_for_transport("direct", &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status("direct", status, &body));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ConvokeError::PermanentProvider {
                provider: "direct".to_string(),
                message: format!("invalid JSON response: {}", e),
            })?;

        let content = extract_content(&body).ok_or_else(|| unrecognized_shape("direct"))?;

        let model = body
            .get("model")
            .and_then(|m| m.as_str())
            .unwrap_or(&self.config.model)
            .to_string();

        // The chat protocol reports prompt and completion counts separately.
        let tokens = match (
            body.get("prompt_eval_count").and_then(|v| v.as_u64()),
            body.get("eval_count").and_then(|v| v.as_u64()),
        ) {
            (None, None) => None,
            (prompt, eval) => Some(prompt.unwrap_or(0) + eval.unwrap_or(0)),
        };

        Ok(ProviderReply {
            content,
            model,
            tokens,
        })
    }
}
