//! Failure classification for provider fallback decisions
//!
//! Maps each provider failure to one of three classes that the router uses
//! to decide between retrying, advancing to the next provider, and
//! terminating the chain:
//!
//! - `Configuration`: the provider cannot work as configured (missing or
//!   rejected credentials, bad URL). Advance immediately; retrying within
//!   the same pass is pointless.
//! - `Transient`: timeout, 5xx, or network failure. Eligible for another
//!   whole-chain attempt within the retry budget.
//! - `Permanent`: non-auth 4xx or an unrecognized response shape. Advance
//!   to the next provider without retrying this one.

use crate::error::ConvokeError;
use reqwest::StatusCode;

/// Fallback decision class for a single provider failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Unusable configuration; advance, never retry this provider
    Configuration,
    /// Temporary failure; retry-eligible within the attempt budget
    Transient,
    /// Definitive failure; advance, no retry of this provider
    Permanent,
}

/// Classify a provider error into its fallback class
///
/// Errors outside the provider taxonomy (storage, serialization) are treated
/// as permanent: they will not improve on retry and should not block the
/// rest of the chain.
///
/// # Examples
///
/// ```
/// use convoke::classify::{classify, FailureClass};
/// use convoke::error::ConvokeError;
///
/// let err = ConvokeError::TransientProvider {
///     provider: "cloud".to_string(),
///     message: "request timed out".to_string(),
/// };
/// assert_eq!(classify(&err), FailureClass::Transient);
/// ```
pub fn classify(error: &ConvokeError) -> FailureClass {
    match error {
        ConvokeError::Configuration { .. } => FailureClass::Configuration,
        ConvokeError::TransientProvider { .. } => FailureClass::Transient,
        _ => FailureClass::Permanent,
    }
}

/// Build the typed error for a non-success HTTP status from a provider
///
/// Auth rejections (401/403) mean the configured credentials are unusable
/// and classify as Configuration; 5xx and 429 are Transient; every other
/// non-success status is Permanent.
pub fn error_for_status(provider: &str, status: StatusCode, body: &str) -> ConvokeError {
    let message = if body.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("HTTP {}: {}", status.as_u16(), truncate(body, 200))
    };

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        ConvokeError::Configuration {
            provider: provider.to_string(),
            message,
        }
    } else if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        ConvokeError::TransientProvider {
            provider: provider.to_string(),
            message,
        }
    } else {
        ConvokeError::PermanentProvider {
            provider: provider.to_string(),
            message,
        }
    }
}

/// Build the typed error for a transport-level `reqwest` failure
///
/// Timeouts and connection failures are Transient; request-construction
/// problems (invalid URL scheme and friends) are Configuration.
pub fn error_for_transport(provider: &str, error: &reqwest::Error) -> ConvokeError {
    if error.is_builder() || error.is_request() && error.url().is_none() {
        ConvokeError::Configuration {
            provider: provider.to_string(),
            message: error.to_string(),
        }
    } else {
        ConvokeError::TransientProvider {
            provider: provider.to_string(),
            message: error.to_string(),
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}
