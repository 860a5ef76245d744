//! Convoke - conversation orchestration engine library
//!
//! This library provides the core functionality for the Convoke engine:
//! persistent conversation management, a serialized message pipeline, and
//! a fixed-priority provider fallback chain.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `store`: Conversation collection, active pointer, write-through persistence
//! - `pipeline`: Queued sends, auto-titling, trimming, context assembly
//! - `router`: Ordered provider fallback with retry, backoff, and timeout
//! - `providers`: Provider clients (cloud-AI, direct-LLM, workflow webhook)
//! - `classify`: Provider failure taxonomy driving fallback decisions
//! - `events`: Synchronous lifecycle event bus
//! - `storage`: Pluggable persistence backends (sled, in-memory)
//! - `export`: JSON/Markdown/text conversation export
//! - `docs`: Documentation-context middleware
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use convoke::{Config, Engine};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env();
//!     config.validate()?;
//!
//!     let engine = Engine::init(&config).await?;
//!     let reply = engine.pipeline.send_message(None, "hello").await?;
//!     println!("{}", reply.content);
//!     Ok(())
//! }
//! ```

pub mod chat;
pub mod classify;
pub mod cli;
pub mod config;
pub mod docs;
pub mod engine;
pub mod error;
pub mod events;
pub mod export;
pub mod pipeline;
pub mod providers;
pub mod router;
pub mod storage;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use engine::Engine;
pub use error::{ConvokeError, Result};
pub use events::{Event, EventBus, EventKind};
pub use pipeline::MessagePipeline;
pub use router::ProviderRouter;
pub use store::ConversationStore;
pub use types::{Conversation, Message, MessageRole};
