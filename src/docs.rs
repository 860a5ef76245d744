//! Documentation-context middleware
//!
//! Before a send leaves the pipeline, the outgoing user message is matched
//! against a declarative keyword table. A hit asks the mapped
//! [`DocSource`] for a short excerpt, which is appended to the provider
//! context as an extra system entry. Lookups are strictly best-effort: a
//! source failure or an empty result is logged and the send proceeds with
//! the message unmodified.

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// A searchable documentation backend
#[async_trait]
pub trait DocSource: Send + Sync {
    /// Stable source name used in logs and the injected context header
    fn name(&self) -> &'static str;

    /// Look up an excerpt for the query
    ///
    /// `Ok(None)` means the source has nothing relevant; that is not an
    /// error.
    async fn search(&self, query: &str) -> Result<Option<String>>;
}

/// One row of the routing table: keywords mapped to a source
pub struct DocRoute {
    /// Case-insensitive trigger keywords
    pub keywords: &'static [&'static str],
    /// Source consulted when a keyword matches
    pub source: Arc<dyn DocSource>,
}

/// Declarative keyword router over documentation sources
///
/// Routes are consulted in table order; the first route with a matching
/// keyword wins. An empty table disables the middleware entirely.
#[derive(Default)]
pub struct DocRouter {
    routes: Vec<DocRoute>,
}

impl DocRouter {
    /// Build a router over an explicit table
    pub fn new(routes: Vec<DocRoute>) -> Self {
        Self { routes }
    }

    /// Empty router; every message passes through untouched
    pub fn disabled() -> Self {
        Self { routes: Vec::new() }
    }

    /// True when no routes are registered
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// First source whose keywords match the message, if any
    pub fn resolve(&self, message: &str) -> Option<&DocRoute> {
        let lowered = message.to_lowercase();
        self.routes.iter().find(|route| {
            route
                .keywords
                .iter()
                .any(|keyword| lowered.contains(&keyword.to_lowercase()))
        })
    }

    /// Fetch a context excerpt for the message, best-effort
    ///
    /// Returns `None` when no route matches, the source comes back empty,
    /// or the lookup fails. Failures never propagate to the send.
    pub async fn augment(&self, message: &str) -> Option<String> {
        let route = self.resolve(message)?;
        match route.source.search(message).await {
            Ok(Some(excerpt)) => {
                tracing::debug!(source = route.source.name(), "doc context attached");
                Some(format!(
                    "Relevant documentation ({}):\n{}",
                    route.source.name(),
                    excerpt
                ))
            }
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(
                    source = route.source.name(),
                    error = %err,
                    "doc lookup failed; sending without context"
                );
                None
            }
        }
    }
}
