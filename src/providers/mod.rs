//! Provider clients for the fallback chain
//!
//! Three heterogeneous backends sit behind one [`ProviderClient`] trait:
//! a hosted cloud-AI API, a direct LLM server, and a workflow webhook.
//! Each adapter builds its own wire payload, issues the HTTPS call, and
//! explicitly constructs the canonical [`ProviderReply`] or a typed error;
//! the router only ever pattern-matches on the result.

pub mod cloud;
pub mod direct;
pub mod webhook;

pub use cloud::CloudClient;
pub use direct::DirectClient;
pub use webhook::WebhookClient;

use crate::config::ProvidersConfig;
use crate::error::{ConvokeError, Result};
use crate::types::ConversationSettings;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One `{role, content}` entry of the context window sent to providers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEntry {
    /// Role string as providers expect it ("system", "user", "assistant")
    pub role: String,
    /// Entry text
    pub content: String,
}

impl ContextEntry {
    /// Convenience constructor
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Everything a provider needs to produce a reply
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    /// Context window, oldest-first; the new user message is the last entry
    pub context: Vec<ContextEntry>,
    /// The new user content, separately available for webhook payloads
    pub content: String,
    /// Generation settings of the owning conversation
    pub settings: ConversationSettings,
}

/// Canonical normalized provider reply
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderReply {
    /// Reply text
    pub content: String,
    /// Model that produced the reply
    pub model: String,
    /// Total tokens consumed, when the provider reports them
    pub tokens: Option<u64>,
}

/// A backend capable of producing a reply given context and content
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Stable provider name used in errors and logs
    fn name(&self) -> &'static str;

    /// Whether this provider has usable credentials/endpoint configured
    ///
    /// Unconfigured providers are skipped without a network call.
    fn is_configured(&self) -> bool;

    /// Per-call timeout enforced by the router
    fn timeout(&self) -> Duration;

    /// Issue the network call and normalize the response
    ///
    /// # Errors
    ///
    /// Returns a typed [`ConvokeError`] (never a sentinel) on missing
    /// credentials, non-success HTTP status, or a response missing all
    /// recognized content fields.
    async fn call(
        &self,
        request: &ProviderRequest,
    ) -> std::result::Result<ProviderReply, ConvokeError>;
}

/// Extract reply text from a provider response body
///
/// Probes the known field names `content`, `message`, `response` in
/// priority order. A `message` field may itself be an object carrying a
/// `content` string (direct-LLM chat shape).
pub(crate) fn extract_content(value: &serde_json::Value) -> Option<String> {
    if let Some(content) = value.get("content").and_then(|v| v.as_str()) {
        return Some(content.to_string());
    }
    if let Some(message) = value.get("message") {
        if let Some(text) = message.as_str() {
            return Some(text.to_string());
        }
        if let Some(content) = message.get("content").and_then(|v| v.as_str()) {
            return Some(content.to_string());
        }
    }
    if let Some(response) = value.get("response").and_then(|v| v.as_str()) {
        return Some(response.to_string());
    }
    None
}

/// Typed error for a response body with no recognized content field
pub(crate) fn unrecognized_shape(provider: &str) -> ConvokeError {
    ConvokeError::PermanentProvider {
        provider: provider.to_string(),
        message: "response missing recognized content fields (content/message/response)"
            .to_string(),
    }
}

/// Build the fixed-priority provider chain from configuration
///
/// Priority is not runtime-configurable: cloud-AI first, direct-LLM second,
/// workflow-webhook last.
///
/// # Errors
///
/// Returns an error if an HTTP client cannot be constructed.
pub fn build_chain(config: &ProvidersConfig) -> Result<Vec<Box<dyn ProviderClient>>> {
    Ok(vec![
        Box::new(CloudClient::new(config.cloud.clone())?) as Box<dyn ProviderClient>,
        Box::new(DirectClient::new(config.direct.clone())?),
        Box::new(WebhookClient::new(config.webhook.clone())?),
    ])
}
