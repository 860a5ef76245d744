//! Engine assembly: wires the store, router, and pipeline together
//!
//! The engine is the composition root used by the binary and by
//! integration tests. Tests inject a memory backend and scripted
//! providers; the binary wires the sled backend and the real provider
//! chain from configuration.

use crate::config::Config;
use crate::docs::DocRouter;
use crate::error::Result;
use crate::events::EventBus;
use crate::pipeline::MessagePipeline;
use crate::providers::{build_chain, ProviderClient};
use crate::router::ProviderRouter;
use crate::storage::{SledBackend, StorageBackend};
use crate::store::ConversationStore;
use std::sync::Arc;

/// A fully wired conversation engine
pub struct Engine {
    /// Conversation collection and active pointer
    pub store: Arc<ConversationStore>,
    /// Serialized send queue
    pub pipeline: MessagePipeline,
    /// Lifecycle event bus
    pub events: EventBus,
}

impl Engine {
    /// Wire the engine with the sled backend and configured provider chain
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the database
    /// cannot be opened, or an HTTP client cannot be constructed.
    pub async fn init(config: &Config) -> Result<Self> {
        config.validate()?;
        let path = config.storage.resolve_path()?;
        tracing::info!(path = %path.display(), "opening conversation database");
        let backend: Arc<dyn StorageBackend> = Arc::new(SledBackend::new(&path)?);
        let chain = build_chain(&config.providers)?;
        Self::assemble(config, backend, chain, DocRouter::disabled()).await
    }

    /// Wire the engine over explicit backend, chain, and doc router
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the persisted
    /// state cannot be loaded.
    pub async fn assemble(
        config: &Config,
        backend: Arc<dyn StorageBackend>,
        chain: Vec<Box<dyn ProviderClient>>,
        docs: DocRouter,
    ) -> Result<Self> {
        config.validate()?;

        let events = EventBus::new();
        let store = Arc::new(ConversationStore::open(backend, events.clone()).await?);
        let router = Arc::new(ProviderRouter::new(chain, &config.router));
        let pipeline = MessagePipeline::spawn(
            store.clone(),
            router,
            Arc::new(docs),
            events.clone(),
            &config.pipeline,
        );

        Ok(Self {
            store,
            pipeline,
            events,
        })
    }
}
