//! Cloud-AI provider client
//!
//! First member of the fallback chain. Talks to a hosted chat-completions
//! API over HTTPS with a bearer API key. The key comes from the config, or
//! failing that from the OS keyring entry `convoke/cloud_api_key`.

use crate::classify::{error_for_status, error_for_transport};
use crate::config::CloudConfig;
use crate::error::{ConvokeError, Result};
use crate::providers::{
    extract_content, unrecognized_shape, ProviderClient, ProviderReply, ProviderRequest,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// Keyring service/entry names for the fallback key lookup
const KEYRING_SERVICE: &str = "convoke";
const KEYRING_ENTRY: &str = "cloud_api_key";

/// Hosted cloud-AI chat client
pub struct CloudClient {
    client: Client,
    config: CloudConfig,
    api_key: Option<String>,
}

/// Chat-completions request payload
#[derive(Debug, Serialize)]
struct CloudRequest<'a> {
    model: &'a str,
    messages: &'a [crate::providers::ContextEntry],
    temperature: f64,
    max_tokens: u64,
}

impl CloudClient {
    /// Create a new cloud client
    ///
    /// Resolves the API key eagerly (config first, then keyring) so the
    /// router can skip an unconfigured provider without a network call.
    ///
    /// # Errors
    ///
    /// Returns an error if HTTP client initialization fails.
    pub fn new(config: CloudConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("convoke/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                ConvokeError::Config(format!("Failed to create HTTP client: {}", e))
            })?;

        let api_key = config.api_key.clone().or_else(lookup_keyring_key);
        if api_key.is_none() {
            tracing::debug!("cloud provider has no API key; it will be skipped");
        }

        Ok(Self {
            client,
            config,
            api_key,
        })
    }
}

fn lookup_keyring_key() -> Option<String> {
    match keyring::Entry::new(KEYRING_SERVICE, KEYRING_ENTRY) {
        Ok(entry) => match entry.get_password() {
            Ok(key) if !key.is_empty() => Some(key),
            Ok(_) => None,
            Err(err) => {
                tracing::debug!(%err, "no cloud API key in keyring");
                None
            }
        },
        Err(err) => {
            tracing::debug!(%err, "keyring unavailable");
            None
        }
    }
}

#[async_trait]
impl ProviderClient for CloudClient {
    fn name(&self) -> &'static str {
        "cloud"
    }

    fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_seconds)
    }

    async fn call(
        &self,
        request: &ProviderRequest,
    ) -> std::result::Result<ProviderReply, ConvokeError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ConvokeError::Configuration {
                provider: "cloud".to_string(),
                message: "missing API key".to_string(),
            }
        })?;

        let model = if request.settings.model.is_empty() {
            self.config.model.as_str()
        } else {
            request.settings.model.as_str()
        };

        let payload = CloudRequest {
            model,
            messages: &request.context,
            temperature: request.settings.temperature,
            max_tokens: request.settings.max_tokens,
        };

        let url = format!("{}/chat/completions", self.config.api_base.trim_end_matches('/'));
        tracing::debug!(model, entries = request.context.len(), "cloud request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| error_for_transport("cloud", &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status("cloud", status, &body));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ConvokeError::PermanentProvider {
                provider: "cloud".to_string(),
                message: format!("invalid JSON response: {}", e),
            })?;

        // Chat-completions nests the reply under choices[0]; probe the
        // canonical field names there, falling back to the response root.
        let candidate = body
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .unwrap_or(&body);

        let content =
            extract_content(candidate).ok_or_else(|| unrecognized_shape("cloud"))?;

        let reply_model = body
            .get("model")
            .and_then(|m| m.as_str())
            .unwrap_or(model)
            .to_string();

        let tokens = body
            .get("usage")
            .and_then(|u| u.get("total_tokens"))
            .and_then(|t| t.as_u64());

        Ok(ProviderReply {
            content,
            model: reply_model,
            tokens,
        })
    }
}
