//! Shared helpers for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use convoke::config::Config;
use convoke::docs::DocRouter;
use convoke::engine::Engine;
use convoke::error::ConvokeError;
use convoke::providers::{ContextEntry, ProviderClient, ProviderReply, ProviderRequest};
use convoke::storage::{MemoryBackend, StorageBackend};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub type Outcome = std::result::Result<ProviderReply, ConvokeError>;

/// Build a reply with fixed content/model
pub fn reply(content: &str, model: &str) -> ProviderReply {
    ProviderReply {
        content: content.to_string(),
        model: model.to_string(),
        tokens: Some(7),
    }
}

pub fn permanent(provider: &str) -> ConvokeError {
    ConvokeError::PermanentProvider {
        provider: provider.to_string(),
        message: "HTTP 404".to_string(),
    }
}

pub fn transient(provider: &str) -> ConvokeError {
    ConvokeError::TransientProvider {
        provider: provider.to_string(),
        message: "HTTP 503".to_string(),
    }
}

/// Provider that replays a scripted outcome per call, then keeps failing
pub struct ScriptedProvider {
    name: &'static str,
    configured: bool,
    outcomes: Mutex<Vec<Outcome>>,
}

impl ScriptedProvider {
    pub fn new(name: &'static str, outcomes: Vec<Outcome>) -> Self {
        Self {
            name,
            configured: true,
            outcomes: Mutex::new(outcomes),
        }
    }

    pub fn unconfigured(name: &'static str) -> Self {
        Self {
            name,
            configured: false,
            outcomes: Mutex::new(Vec::new()),
        }
    }

    /// Provider that fails transiently on every call
    pub fn always_failing(name: &'static str) -> Self {
        Self::new(name, Vec::new())
    }
}

#[async_trait]
impl ProviderClient for ScriptedProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }

    async fn call(&self, _request: &ProviderRequest) -> Outcome {
        let mut outcomes = self.outcomes.lock().unwrap();
        if outcomes.is_empty() {
            Err(transient(self.name))
        } else {
            outcomes.remove(0)
        }
    }
}

/// Provider that echoes the outgoing content back as the reply
pub struct EchoProvider;

#[async_trait]
impl ProviderClient for EchoProvider {
    fn name(&self) -> &'static str {
        "echo"
    }

    fn is_configured(&self) -> bool {
        true
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }

    async fn call(&self, request: &ProviderRequest) -> Outcome {
        Ok(ProviderReply {
            content: format!("echo:{}", request.content),
            model: "echo-1".to_string(),
            tokens: Some(request.content.len() as u64),
        })
    }
}

/// Provider that records the context window of every request it sees
pub struct CapturingProvider {
    pub requests: Arc<Mutex<Vec<Vec<ContextEntry>>>>,
}

impl CapturingProvider {
    pub fn new() -> (Self, Arc<Mutex<Vec<Vec<ContextEntry>>>>) {
        let requests = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                requests: requests.clone(),
            },
            requests,
        )
    }
}

#[async_trait]
impl ProviderClient for CapturingProvider {
    fn name(&self) -> &'static str {
        "capture"
    }

    fn is_configured(&self) -> bool {
        true
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }

    async fn call(&self, request: &ProviderRequest) -> Outcome {
        self.requests.lock().unwrap().push(request.context.clone());
        Ok(reply("captured", "capture-1"))
    }
}

/// Config with retry delays short enough for tests
pub fn fast_config() -> Config {
    let mut config = Config::default();
    config.router.backoff_base_ms = 1;
    config
}

/// Wire an engine over a fresh memory backend
pub async fn engine_with(chain: Vec<Box<dyn ProviderClient>>, config: &Config) -> Engine {
    Engine::assemble(
        config,
        Arc::new(MemoryBackend::new()),
        chain,
        DocRouter::disabled(),
    )
    .await
    .expect("engine assembly")
}

/// Wire an engine over a shared backend (restart simulation)
pub async fn engine_with_backend(
    chain: Vec<Box<dyn ProviderClient>>,
    config: &Config,
    backend: Arc<dyn StorageBackend>,
) -> Engine {
    Engine::assemble(config, backend, chain, DocRouter::disabled())
        .await
        .expect("engine assembly")
}
