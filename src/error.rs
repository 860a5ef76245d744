//! Error types for Convoke
//!
//! This module defines all error types used throughout the engine,
//! using `thiserror` for ergonomic error handling. The provider failure
//! taxonomy (configuration / transient / permanent / exhausted) drives
//! the router's fallback decisions, see [`crate::classify`].

use thiserror::Error;

/// Main error type for Convoke operations
///
/// This enum encompasses all possible errors that can occur during
/// conversation orchestration: provider dispatch, persistence,
/// configuration loading, and export.
#[derive(Error, Debug)]
pub enum ConvokeError {
    /// Configuration error in a loaded config file or CLI override
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider is unusable as configured (missing/invalid credentials or URL)
    ///
    /// The router advances past the provider immediately and never retries it
    /// within the same chain pass.
    #[error("Provider configuration error ({provider}): {message}")]
    Configuration {
        /// Name of the provider that is misconfigured
        provider: String,
        /// What is missing or invalid
        message: String,
    },

    /// Transient provider failure (timeout, 5xx, network error)
    ///
    /// Eligible for retry within the router's attempt budget.
    #[error("Transient provider error ({provider}): {message}")]
    TransientProvider {
        /// Name of the provider that failed
        provider: String,
        /// Failure description
        message: String,
    },

    /// Permanent provider failure (non-auth 4xx, unrecognized response shape)
    ///
    /// The router advances to the next provider without retrying this one.
    #[error("Permanent provider error ({provider}): {message}")]
    PermanentProvider {
        /// Name of the provider that failed
        provider: String,
        /// Failure description
        message: String,
    },

    /// Every provider and every retry attempt failed
    #[error("All providers exhausted after {attempts} attempt(s)")]
    AllProvidersExhausted {
        /// Number of whole-chain attempts consumed
        attempts: u32,
    },

    /// No provider in the chain has usable credentials configured
    ///
    /// Raised before any network call is issued.
    #[error("No provider configured: set credentials for at least one provider")]
    NoProviderConfigured,

    /// Message pipeline errors (queue shut down, unknown conversation)
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// Conversation storage errors (backend read/write)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Export errors (unknown conversation, serialization)
    #[error("Export error: {0}")]
    Export(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ConvokeError {
    /// True if this error is the terminal exhaustion condition
    ///
    /// Only this variant (and [`ConvokeError::NoProviderConfigured`]) may
    /// escape the router to the pipeline; the per-provider variants are
    /// consumed by the fallback loop.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConvokeError::AllProvidersExhausted { .. } | ConvokeError::NoProviderConfigured
        )
    }
}

/// Result type alias for Convoke operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = ConvokeError::Config("invalid format".to_string());
        assert_eq!(error.to_string(), "Configuration error: invalid format");
    }

    #[test]
    fn test_configuration_error_display() {
        let error = ConvokeError::Configuration {
            provider: "cloud".to_string(),
            message: "missing API key".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Provider configuration error (cloud): missing API key"
        );
    }

    #[test]
    fn test_transient_error_display() {
        let error = ConvokeError::TransientProvider {
            provider: "direct".to_string(),
            message: "request timed out".to_string(),
        };
        assert!(error.to_string().contains("Transient"));
        assert!(error.to_string().contains("direct"));
    }

    #[test]
    fn test_permanent_error_display() {
        let error = ConvokeError::PermanentProvider {
            provider: "webhook".to_string(),
            message: "HTTP 404".to_string(),
        };
        assert!(error.to_string().contains("Permanent"));
        assert!(error.to_string().contains("HTTP 404"));
    }

    #[test]
    fn test_exhausted_error_display() {
        let error = ConvokeError::AllProvidersExhausted { attempts: 3 };
        assert_eq!(
            error.to_string(),
            "All providers exhausted after 3 attempt(s)"
        );
    }

    #[test]
    fn test_no_provider_configured_display() {
        let error = ConvokeError::NoProviderConfigured;
        assert!(error.to_string().contains("No provider configured"));
    }

    #[test]
    fn test_is_terminal() {
        assert!(ConvokeError::AllProvidersExhausted { attempts: 3 }.is_terminal());
        assert!(ConvokeError::NoProviderConfigured.is_terminal());
        assert!(!ConvokeError::TransientProvider {
            provider: "cloud".to_string(),
            message: "timeout".to_string(),
        }
        .is_terminal());
        assert!(!ConvokeError::Storage("oops".to_string()).is_terminal());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: ConvokeError = io_error.into();
        assert!(matches!(error, ConvokeError::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{bad json}").unwrap_err();
        let error: ConvokeError = json_error.into();
        assert!(matches!(error, ConvokeError::Serialization(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ConvokeError>();
    }
}
