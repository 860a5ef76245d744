//! Provider router: ordered fallback with retry, backoff, and timeout
//!
//! Per send, the router walks the fixed provider chain top to bottom. A
//! failing provider is classified (see [`crate::classify`]) and the chain
//! advances; when a whole pass fails, the router waits out an exponential
//! backoff and re-walks the full chain from the top. The re-walk-from-top
//! behavior is deliberate and load-bearing: a provider that failed
//! permanently in one pass is still attempted again in the next pass.
//!
//! Providers with no usable credentials are skipped without a network
//! call; if nothing in the chain is configured at all the router fails
//! fast with [`ConvokeError::NoProviderConfigured`].

use crate::classify::classify;
use crate::config::RouterConfig;
use crate::error::ConvokeError;
use crate::providers::{ProviderClient, ProviderReply, ProviderRequest};
use std::time::{Duration, Instant};

/// Normalized result of a routed send
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedReply {
    /// Reply text
    pub content: String,
    /// Model that produced the reply
    pub model: String,
    /// Tokens consumed, when reported
    pub tokens: Option<u64>,
    /// Whole-chain retry attempts consumed before success (0 = first pass)
    pub retries: u32,
    /// Wall-clock dispatch time in milliseconds
    pub processing_time_ms: u64,
}

/// Ordered provider chain with retry/backoff policy
pub struct ProviderRouter {
    chain: Vec<Box<dyn ProviderClient>>,
    max_attempts: u32,
    backoff_base_ms: u64,
}

impl ProviderRouter {
    /// Build a router over an already-ordered chain
    pub fn new(chain: Vec<Box<dyn ProviderClient>>, config: &RouterConfig) -> Self {
        Self {
            chain,
            max_attempts: config.max_attempts.max(1),
            backoff_base_ms: config.backoff_base_ms,
        }
    }

    /// Backoff before chain attempt `attempt` (1-based for retries)
    fn backoff_delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_base_ms * 2u64.pow(attempt.saturating_sub(1)))
    }

    /// Provider names in priority order
    pub fn provider_names(&self) -> Vec<&'static str> {
        self.chain.iter().map(|p| p.name()).collect()
    }

    /// Route one send through the chain
    ///
    /// # Errors
    ///
    /// - [`ConvokeError::NoProviderConfigured`] when nothing in the chain
    ///   has usable credentials (no network call issued).
    /// - [`ConvokeError::AllProvidersExhausted`] once every provider and
    ///   every retry attempt has failed. Per-provider failures never
    ///   escape.
    pub async fn dispatch(
        &self,
        request: &ProviderRequest,
    ) -> std::result::Result<RoutedReply, ConvokeError> {
        if !self.chain.iter().any(|p| p.is_configured()) {
            tracing::warn!("dispatch refused: no provider configured");
            return Err(ConvokeError::NoProviderConfigured);
        }

        let started = Instant::now();

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                let delay = self.backoff_delay(attempt);
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "chain backoff");
                tokio::time::sleep(delay).await;
            }

            for provider in &self.chain {
                if !provider.is_configured() {
                    tracing::debug!(provider = provider.name(), "skipping unconfigured provider");
                    continue;
                }

                let outcome = tokio::time::timeout(provider.timeout(), provider.call(request)).await;
                let result: std::result::Result<ProviderReply, ConvokeError> = match outcome {
                    Ok(result) => result,
                    Err(_elapsed) => Err(ConvokeError::TransientProvider {
                        provider: provider.name().to_string(),
                        message: format!(
                            "call exceeded {}s timeout",
                            provider.timeout().as_secs()
                        ),
                    }),
                };

                match result {
                    Ok(reply) => {
                        tracing::info!(
                            provider = provider.name(),
                            model = reply.model,
                            attempt,
                            "provider reply"
                        );
                        return Ok(RoutedReply {
                            content: reply.content,
                            model: reply.model,
                            tokens: reply.tokens,
                            retries: attempt,
                            processing_time_ms: started.elapsed().as_millis() as u64,
                        });
                    }
                    Err(err) => {
                        let class = classify(&err);
                        tracing::warn!(
                            provider = provider.name(),
                            attempt,
                            class = ?class,
                            error = %err,
                            "provider failed; advancing"
                        );
                        // Every class advances within the pass; the pass
                        // itself never re-tries a provider.
                    }
                }
            }
        }

        tracing::error!(attempts = self.max_attempts, "all providers exhausted");
        Err(ConvokeError::AllProvidersExhausted {
            attempts: self.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ContextEntry;
    use crate::types::ConversationSettings;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Scripted provider returning a fixed outcome per call
    struct Scripted {
        name: &'static str,
        configured: bool,
        outcomes: Mutex<Vec<std::result::Result<ProviderReply, ConvokeError>>>,
        calls: Arc<AtomicUsize>,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Scripted {
        fn new(
            name: &'static str,
            configured: bool,
            outcomes: Vec<std::result::Result<ProviderReply, ConvokeError>>,
            log: Arc<Mutex<Vec<&'static str>>>,
        ) -> Self {
            Self {
                name,
                configured,
                outcomes: Mutex::new(outcomes),
                calls: Arc::new(AtomicUsize::new(0)),
                log,
            }
        }
    }

    #[async_trait]
    impl ProviderClient for Scripted {
        fn name(&self) -> &'static str {
            self.name
        }

        fn is_configured(&self) -> bool {
            self.configured
        }

        fn timeout(&self) -> Duration {
            Duration::from_secs(5)
        }

        async fn call(
            &self,
            _request: &ProviderRequest,
        ) -> std::result::Result<ProviderReply, ConvokeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.log.lock().unwrap().push(self.name);
            let mut outcomes = self.outcomes.lock().unwrap();
            if outcomes.is_empty() {
                Err(ConvokeError::TransientProvider {
                    provider: self.name.to_string(),
                    message: "script exhausted".to_string(),
                })
            } else {
                outcomes.remove(0)
            }
        }
    }

    fn reply(content: &str, model: &str) -> ProviderReply {
        ProviderReply {
            content: content.to_string(),
            model: model.to_string(),
            tokens: Some(10),
        }
    }

    fn permanent(name: &str) -> ConvokeError {
        ConvokeError::PermanentProvider {
            provider: name.to_string(),
            message: "HTTP 404".to_string(),
        }
    }

    fn transient(name: &str) -> ConvokeError {
        ConvokeError::TransientProvider {
            provider: name.to_string(),
            message: "HTTP 503".to_string(),
        }
    }

    fn request() -> ProviderRequest {
        ProviderRequest {
            context: vec![ContextEntry::new("user", "hi")],
            content: "hi".to_string(),
            settings: ConversationSettings::default(),
        }
    }

    fn fast_config() -> RouterConfig {
        RouterConfig {
            max_attempts: 3,
            backoff_base_ms: 1,
        }
    }

    #[tokio::test]
    async fn test_no_provider_configured_fails_fast() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let router = ProviderRouter::new(
            vec![
                Box::new(Scripted::new("cloud", false, vec![], log.clone())),
                Box::new(Scripted::new("direct", false, vec![], log.clone())),
            ],
            &fast_config(),
        );

        let err = router.dispatch(&request()).await.unwrap_err();
        assert!(matches!(err, ConvokeError::NoProviderConfigured));
        assert!(log.lock().unwrap().is_empty(), "no network call expected");
    }

    #[tokio::test]
    async fn test_first_provider_success_stops_chain() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let router = ProviderRouter::new(
            vec![
                Box::new(Scripted::new(
                    "cloud",
                    true,
                    vec![Ok(reply("hello", "cloud-1"))],
                    log.clone(),
                )),
                Box::new(Scripted::new("direct", true, vec![], log.clone())),
            ],
            &fast_config(),
        );

        let routed = router.dispatch(&request()).await.unwrap();
        assert_eq!(routed.content, "hello");
        assert_eq!(routed.model, "cloud-1");
        assert_eq!(routed.retries, 0);
        assert_eq!(*log.lock().unwrap(), vec!["cloud"]);
    }

    #[tokio::test]
    async fn test_permanent_failure_advances_to_next_provider() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let router = ProviderRouter::new(
            vec![
                Box::new(Scripted::new(
                    "cloud",
                    true,
                    vec![Err(permanent("cloud"))],
                    log.clone(),
                )),
                Box::new(Scripted::new(
                    "direct",
                    true,
                    vec![Ok(reply("hi", "B-1"))],
                    log.clone(),
                )),
            ],
            &fast_config(),
        );

        let routed = router.dispatch(&request()).await.unwrap();
        assert_eq!(routed.content, "hi");
        assert_eq!(routed.model, "B-1");
        assert_eq!(*log.lock().unwrap(), vec!["cloud", "direct"]);
    }

    #[tokio::test]
    async fn test_unconfigured_provider_is_skipped() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let router = ProviderRouter::new(
            vec![
                Box::new(Scripted::new("cloud", false, vec![], log.clone())),
                Box::new(Scripted::new(
                    "direct",
                    true,
                    vec![Ok(reply("hi", "d"))],
                    log.clone(),
                )),
            ],
            &fast_config(),
        );

        router.dispatch(&request()).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["direct"]);
    }

    #[tokio::test]
    async fn test_retry_rewalks_whole_chain_from_top() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let router = ProviderRouter::new(
            vec![
                Box::new(Scripted::new(
                    "cloud",
                    true,
                    vec![Err(transient("cloud")), Ok(reply("second pass", "cloud-1"))],
                    log.clone(),
                )),
                Box::new(Scripted::new(
                    "direct",
                    true,
                    vec![Err(transient("direct"))],
                    log.clone(),
                )),
            ],
            &fast_config(),
        );

        let routed = router.dispatch(&request()).await.unwrap();
        assert_eq!(routed.content, "second pass");
        assert_eq!(routed.retries, 1);
        // Second pass starts from the top, not from the failed provider.
        assert_eq!(*log.lock().unwrap(), vec!["cloud", "direct", "cloud"]);
    }

    #[tokio::test]
    async fn test_exhaustion_after_attempt_budget() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let router = ProviderRouter::new(
            vec![
                Box::new(Scripted::new("cloud", true, vec![], log.clone())),
                Box::new(Scripted::new("direct", true, vec![], log.clone())),
            ],
            &fast_config(),
        );

        let err = router.dispatch(&request()).await.unwrap_err();
        assert!(matches!(
            err,
            ConvokeError::AllProvidersExhausted { attempts: 3 }
        ));
        // 2 providers x 3 whole-chain attempts
        assert_eq!(log.lock().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_timeout_is_transient_and_falls_back() {
        struct Hanging;

        #[async_trait]
        impl ProviderClient for Hanging {
            fn name(&self) -> &'static str {
                "cloud"
            }
            fn is_configured(&self) -> bool {
                true
            }
            fn timeout(&self) -> Duration {
                Duration::from_millis(20)
            }
            async fn call(
                &self,
                _request: &ProviderRequest,
            ) -> std::result::Result<ProviderReply, ConvokeError> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                unreachable!("call should have been timed out");
            }
        }

        let log = Arc::new(Mutex::new(Vec::new()));
        let router = ProviderRouter::new(
            vec![
                Box::new(Hanging),
                Box::new(Scripted::new(
                    "direct",
                    true,
                    vec![Ok(reply("rescued", "d"))],
                    log.clone(),
                )),
            ],
            &fast_config(),
        );

        let routed = router.dispatch(&request()).await.unwrap();
        assert_eq!(routed.content, "rescued");
    }

    #[test]
    fn test_backoff_is_exponential() {
        let router = ProviderRouter::new(
            vec![],
            &RouterConfig {
                max_attempts: 3,
                backoff_base_ms: 100,
            },
        );
        assert_eq!(router.backoff_delay(1), Duration::from_millis(100));
        assert_eq!(router.backoff_delay(2), Duration::from_millis(200));
        assert_eq!(router.backoff_delay(3), Duration::from_millis(400));
    }
}
