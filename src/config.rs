//! Configuration management for Convoke
//!
//! Handles loading, parsing, validating, and defaulting configuration from
//! a YAML file plus environment-variable overrides for credentials.

use crate::error::{ConvokeError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Main configuration structure for Convoke
///
/// Holds provider credentials/endpoints, router retry policy, pipeline
/// limits, and the storage location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Provider chain configuration
    #[serde(default)]
    pub providers: ProvidersConfig,
    /// Retry/backoff policy
    #[serde(default)]
    pub router: RouterConfig,
    /// Message pipeline limits
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Persistence location
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Configuration for the three chain members
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Hosted cloud-AI API
    #[serde(default)]
    pub cloud: CloudConfig,
    /// Direct LLM server
    #[serde(default)]
    pub direct: DirectConfig,
    /// Workflow webhook endpoint
    #[serde(default)]
    pub webhook: WebhookConfig,
}

/// Cloud-AI provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    /// API key; when absent, the OS keyring entry `convoke/cloud_api_key`
    /// is consulted, and the provider is skipped if neither yields a key
    #[serde(default)]
    pub api_key: Option<String>,

    /// API base URL for chat completions
    #[serde(default = "default_cloud_api_base")]
    pub api_base: String,

    /// Default model when a conversation does not override it
    #[serde(default = "default_cloud_model")]
    pub model: String,

    /// Per-call timeout in seconds
    #[serde(default = "default_cloud_timeout")]
    pub timeout_seconds: u64,
}

fn default_cloud_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_cloud_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_cloud_timeout() -> u64 {
    30
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: default_cloud_api_base(),
            model: default_cloud_model(),
            timeout_seconds: default_cloud_timeout(),
        }
    }
}

/// Direct-LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectConfig {
    /// LLM server host (e.g. `http://localhost:11434`); the provider is
    /// skipped while unset
    #[serde(default)]
    pub host: Option<String>,

    /// Model served by the host
    #[serde(default = "default_direct_model")]
    pub model: String,

    /// Per-call timeout in seconds
    #[serde(default = "default_direct_timeout")]
    pub timeout_seconds: u64,
}

fn default_direct_model() -> String {
    "llama3.2:latest".to_string()
}

fn default_direct_timeout() -> u64 {
    60
}

impl Default for DirectConfig {
    fn default() -> Self {
        Self {
            host: None,
            model: default_direct_model(),
            timeout_seconds: default_direct_timeout(),
        }
    }
}

/// Workflow-webhook provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Webhook URL; the provider is skipped while unset
    #[serde(default)]
    pub url: Option<Url>,

    /// Per-call timeout in seconds
    #[serde(default = "default_webhook_timeout")]
    pub timeout_seconds: u64,
}

fn default_webhook_timeout() -> u64 {
    30
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_seconds: default_webhook_timeout(),
        }
    }
}

/// Router retry/backoff policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Whole-chain attempt budget
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay for exponential backoff between chain attempts, in
    /// milliseconds (delay = base * 2^attempt)
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1000
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

/// Message pipeline limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Per-conversation message cap; oldest messages are trimmed beyond it
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,

    /// Number of recent user/assistant messages included in the provider
    /// context window
    #[serde(default = "default_context_window")]
    pub context_window: usize,

    /// Bounded send-queue capacity
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_max_messages() -> usize {
    100
}

fn default_context_window() -> usize {
    20
}

fn default_queue_capacity() -> usize {
    32
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
            context_window: default_context_window(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Persistence location
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database directory; defaults to the platform data dir
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl StorageConfig {
    /// Resolve the database path, falling back to the platform data dir
    pub fn resolve_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }
        let dirs = directories::ProjectDirs::from("dev", "convoke", "convoke").ok_or_else(
            || ConvokeError::Config("could not determine a platform data directory".to_string()),
        )?;
        Ok(dirs.data_dir().join("conversations.db"))
    }
}

impl Config {
    /// Load configuration from a YAML file, then apply environment overrides
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let mut config: Config = serde_yaml::from_str(&raw)?;
        config.apply_env();
        Ok(config)
    }

    /// Defaults plus environment overrides, for running without a file
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env();
        config
    }

    /// Apply credential/endpoint overrides from the environment
    ///
    /// Recognized variables: `CONVOKE_CLOUD_API_KEY`, `CONVOKE_DIRECT_HOST`,
    /// `CONVOKE_WEBHOOK_URL`.
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("CONVOKE_CLOUD_API_KEY") {
            if !key.is_empty() {
                self.providers.cloud.api_key = Some(key);
            }
        }
        if let Ok(host) = std::env::var("CONVOKE_DIRECT_HOST") {
            if !host.is_empty() {
                self.providers.direct.host = Some(host);
            }
        }
        if let Ok(raw) = std::env::var("CONVOKE_WEBHOOK_URL") {
            match raw.parse::<Url>() {
                Ok(url) => self.providers.webhook.url = Some(url),
                Err(err) => {
                    tracing::warn!(%err, "ignoring invalid CONVOKE_WEBHOOK_URL");
                }
            }
        }
    }

    /// Validate limits and endpoints
    ///
    /// # Errors
    ///
    /// Returns `ConvokeError::Config` describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.router.max_attempts == 0 {
            return Err(
                ConvokeError::Config("router.max_attempts must be greater than 0".to_string())
                    .into(),
            );
        }
        if self.pipeline.max_messages == 0 {
            return Err(
                ConvokeError::Config("pipeline.max_messages must be greater than 0".to_string())
                    .into(),
            );
        }
        if self.pipeline.context_window == 0 {
            return Err(ConvokeError::Config(
                "pipeline.context_window must be greater than 0".to_string(),
            )
            .into());
        }
        if self.pipeline.queue_capacity == 0 {
            return Err(ConvokeError::Config(
                "pipeline.queue_capacity must be greater than 0".to_string(),
            )
            .into());
        }
        if let Some(host) = &self.providers.direct.host {
            if host.parse::<Url>().is_err() {
                return Err(ConvokeError::Config(format!(
                    "providers.direct.host is not a valid URL: {}",
                    host
                ))
                .into());
            }
        }
        if let Some(url) = &self.providers.webhook.url {
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(ConvokeError::Config(format!(
                    "providers.webhook.url must be http(s), got {}",
                    url.scheme()
                ))
                .into());
            }
        }
        Ok(())
    }
}
