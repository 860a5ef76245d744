//! Workflow-webhook provider client
//!
//! Last member of the fallback chain. Posts the message and context to an
//! automation-workflow webhook and accepts whatever JSON comes back, as
//! long as it carries one of the recognized content fields.

use crate::classify::{error_for_status, error_for_transport};
use crate::config::WebhookConfig;
use crate::error::{ConvokeError, Result};
use crate::providers::{
    extract_content, unrecognized_shape, ContextEntry, ProviderClient, ProviderReply,
    ProviderRequest,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// Workflow webhook client
pub struct WebhookClient {
    client: Client,
    config: WebhookConfig,
}

/// Webhook payload: the new message plus the context window
#[derive(Debug, Serialize)]
struct WebhookRequest<'a> {
    message: &'a str,
    context: &'a [ContextEntry],
}

impl WebhookClient {
    /// Create a new webhook client
    ///
    /// # Errors
    ///
    /// Returns an error if HTTP client initialization fails.
    pub fn new(config: WebhookConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("convoke/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                ConvokeError::Config(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl ProviderClient for WebhookClient {
    fn name(&self) -> &'static str {
        "webhook"
    }

    fn is_configured(&self) -> bool {
        self.config.url.is_some()
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_seconds)
    }

    async fn call(
        &self,
        request: &ProviderRequest,
    ) -> std::result::Result<ProviderReply, ConvokeError> {
        let url = self.config.url.as_ref().ok_or_else(|| {
            ConvokeError::Configuration {
                provider: "webhook".to_string(),
                message: "no webhook URL configured".to_string(),
            }
        })?;

        let payload = WebhookRequest {
            message: &request.content,
            context: &request.context,
        };

        tracing::debug!(entries = request.context.len(), "webhook request");

        let response = self
            .client
            .post(url.clone())
            .json(&payload)
            .send()
            .await
            .map_err(|e| error_for_transport("webhook", &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status("webhook", status, &body));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ConvokeError::PermanentProvider {
                provider: "webhook".to_string(),
                message: format!("invalid JSON response: {}", e),
            })?;

        let content = extract_content(&body).ok_or_else(|| unrecognized_shape("webhook"))?;

        let model = body
            .get("model")
            .and_then(|m| m.as_str())
            .unwrap_or("webhook")
            .to_string();

        let tokens = body.get("tokens").and_then(|t| t.as_u64());

        Ok(ProviderReply {
            content,
            model,
            tokens,
        })
    }
}
