//! Message pipeline: queued, serialized sends through the provider chain
//!
//! All sends funnel into a bounded queue drained by a single worker task,
//! so exactly one send is in flight at a time and messages land in
//! conversations in submission order. Each send appends the user message
//! first (it is persisted even if every provider fails), builds the
//! context window, routes through the provider chain, and appends either
//! the assistant reply or a visible error message.
//!
//! Callers get their result back over a oneshot channel, so a send that
//! terminally fails rejects the caller as well as recording the failure
//! in the conversation.

use crate::config::PipelineConfig;
use crate::docs::DocRouter;
use crate::error::{ConvokeError, Result};
use crate::events::{Event, EventBus};
use crate::providers::{ContextEntry, ProviderRequest};
use crate::router::ProviderRouter;
use crate::store::ConversationStore;
use crate::types::{Message, MessageMetadata, MessageRole};
use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Auto-title cutoff: longer first messages are truncated with an ellipsis
const TITLE_TRUNCATE_AT: usize = 50;
/// Characters kept before the ellipsis when truncating
const TITLE_KEPT_CHARS: usize = 47;
/// Words kept when the first message is short enough to use verbatim
const TITLE_MAX_WORDS: usize = 8;

struct SendJob {
    conversation_id: Option<String>,
    content: String,
    reply: oneshot::Sender<std::result::Result<Message, ConvokeError>>,
}

/// Serialized send queue over the store and provider router
///
/// Cheap to clone; clones share the queue and worker.
#[derive(Clone)]
pub struct MessagePipeline {
    store: Arc<ConversationStore>,
    events: EventBus,
    queue: mpsc::Sender<SendJob>,
    depth: Arc<AtomicUsize>,
    max_messages: usize,
}

impl MessagePipeline {
    /// Build the pipeline and spawn its worker task
    ///
    /// The worker runs for the life of the process.
    pub fn spawn(
        store: Arc<ConversationStore>,
        router: Arc<ProviderRouter>,
        docs: Arc<DocRouter>,
        events: EventBus,
        config: &PipelineConfig,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let depth = Arc::new(AtomicUsize::new(0));

        let pipeline = Self {
            store,
            events,
            queue: tx,
            depth: depth.clone(),
            max_messages: config.max_messages,
        };

        let worker = Worker {
            pipeline: pipeline.clone(),
            router,
            docs,
            context_window: config.context_window,
        };
        tokio::spawn(worker.run(rx, depth));

        pipeline
    }

    /// Number of sends queued but not yet picked up by the worker
    pub fn queue_depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    /// Queue a send and wait for its outcome
    ///
    /// `conversation_id` of `None` targets the active conversation at the
    /// time the worker picks the job up. The returned message is the
    /// assistant reply, already appended and persisted.
    ///
    /// # Errors
    ///
    /// - [`ConvokeError::Pipeline`] for blank content, an unknown
    ///   conversation id, or a shut-down queue.
    /// - [`ConvokeError::AllProvidersExhausted`] /
    ///   [`ConvokeError::NoProviderConfigured`] when routing terminally
    ///   fails; the user message and a visible error message are still
    ///   appended to the conversation.
    pub async fn send_message(
        &self,
        conversation_id: Option<&str>,
        content: &str,
    ) -> std::result::Result<Message, ConvokeError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ConvokeError::Pipeline(
                "cannot send an empty message".to_string(),
            ));
        }

        let (tx, rx) = oneshot::channel();
        let job = SendJob {
            conversation_id: conversation_id.map(String::from),
            content: content.to_string(),
            reply: tx,
        };

        self.depth.fetch_add(1, Ordering::SeqCst);
        if self.queue.send(job).await.is_err() {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            return Err(ConvokeError::Pipeline(
                "send queue is shut down".to_string(),
            ));
        }

        rx.await.map_err(|_| {
            ConvokeError::Pipeline("send was dropped before completion".to_string())
        })?
    }

    /// Append a prepared message to a conversation without routing it
    ///
    /// Increments the message count, bumps `updated_at`, derives the title
    /// from the first user message of an untitled conversation, trims the
    /// history to the configured cap, persists, and emits `messageAdded`.
    /// The message carries its own metadata (assistant replies arrive with
    /// model/tokens/latency already attached).
    ///
    /// # Errors
    ///
    /// Returns [`ConvokeError::Pipeline`] for an unknown conversation id,
    /// or a storage error if the write-through fails.
    pub async fn add_message(
        &self,
        conversation_id: &str,
        message: Message,
    ) -> Result<Message> {
        let appended = message.clone();
        let role = message.role;
        let max_messages = self.max_messages;

        let outcome = self
            .store
            .mutate_conversation(conversation_id, move |conversation| {
                conversation.messages.push(appended);
                conversation.metadata.message_count = conversation.messages.len();
                conversation.updated_at = Utc::now();

                // Only the conversation's very first message sets the
                // title; trimming must never move it afterwards.
                if !conversation.title_pinned
                    && role == MessageRole::User
                    && conversation.messages.len() == 1
                {
                    conversation.title = derive_title(&conversation.messages[0].content);
                }

                // Trim oldest beyond the cap; count tracks what remains.
                if conversation.messages.len() > max_messages {
                    let excess = conversation.messages.len() - max_messages;
                    conversation.messages.drain(..excess);
                    conversation.metadata.message_count = conversation.messages.len();
                }
            })
            .await?;

        if outcome.is_none() {
            return Err(ConvokeError::Pipeline(format!(
                "unknown conversation: {}",
                conversation_id
            ))
            .into());
        }

        self.events.emit(&Event::MessageAdded {
            conversation_id: conversation_id.to_string(),
            message: message.clone(),
        });
        Ok(message)
    }

    /// Fold a provider's reported token usage into the conversation total
    async fn accumulate_tokens(&self, conversation_id: &str, tokens: u64) -> Result<()> {
        self.store
            .mutate_conversation(conversation_id, |conversation| {
                conversation.metadata.tokens_used += tokens;
            })
            .await?;
        Ok(())
    }
}

struct Worker {
    pipeline: MessagePipeline,
    router: Arc<ProviderRouter>,
    docs: Arc<DocRouter>,
    context_window: usize,
}

impl Worker {
    async fn run(self, mut rx: mpsc::Receiver<SendJob>, depth: Arc<AtomicUsize>) {
        tracing::debug!("pipeline worker started");
        while let Some(job) = rx.recv().await {
            depth.fetch_sub(1, Ordering::SeqCst);
            let result = self.process(&job).await;
            if job.reply.send(result).is_err() {
                tracing::debug!("send caller went away before completion");
            }
        }
        tracing::debug!("pipeline worker stopped");
    }

    async fn process(
        &self,
        job: &SendJob,
    ) -> std::result::Result<Message, ConvokeError> {
        let conversation_id = match &job.conversation_id {
            Some(id) => id.clone(),
            None => self.pipeline.store.active_id().await,
        };

        // The user message lands first and survives any provider outcome.
        let user = self
            .pipeline
            .add_message(&conversation_id, Message::user(job.content.clone()))
            .await
            .map_err(into_convoke)?;

        let conversation = self
            .pipeline
            .store
            .get_conversation(Some(&conversation_id))
            .await
            .ok_or_else(|| {
                ConvokeError::Pipeline(format!("unknown conversation: {}", conversation_id))
            })?;

        let mut context = build_context(&conversation, self.context_window);
        if let Some(doc_context) = self.docs.augment(&job.content).await {
            // Injected just before the new user message, which stays last.
            let at = context.len().saturating_sub(1);
            context.insert(at, ContextEntry::new("system", doc_context));
        }

        let request = ProviderRequest {
            context,
            content: job.content.clone(),
            settings: conversation.settings.clone(),
        };

        match self.router.dispatch(&request).await {
            Ok(routed) => {
                let metadata = MessageMetadata {
                    tokens: routed.tokens,
                    model: Some(routed.model.clone()),
                    processing_time_ms: Some(routed.processing_time_ms),
                    retries: Some(routed.retries),
                };
                let assistant = self
                    .pipeline
                    .add_message(
                        &conversation_id,
                        Message::assistant(routed.content).with_metadata(metadata),
                    )
                    .await
                    .map_err(into_convoke)?;

                if let Some(tokens) = routed.tokens {
                    self.pipeline
                        .accumulate_tokens(&conversation_id, tokens)
                        .await
                        .map_err(into_convoke)?;
                }

                self.pipeline.events.emit(&Event::MessageProcessed {
                    conversation_id: conversation_id.clone(),
                    user,
                    assistant: assistant.clone(),
                });

                Ok(assistant)
            }
            Err(err) => {
                tracing::error!(conversation = %conversation_id, error = %err, "send failed");
                let rendered = err.to_string();
                // Best-effort: the visible error record should not mask the
                // terminal routing error if its own append fails.
                if let Err(append_err) = self
                    .pipeline
                    .add_message(&conversation_id, Message::error(rendered.clone()))
                    .await
                {
                    tracing::warn!(error = %append_err, "could not record error message");
                }
                self.pipeline.events.emit(&Event::MessageError {
                    conversation_id,
                    error: rendered,
                });
                Err(err)
            }
        }
    }
}

fn into_convoke(err: anyhow::Error) -> ConvokeError {
    match err.downcast::<ConvokeError>() {
        Ok(err) => err,
        Err(err) => ConvokeError::Pipeline(err.to_string()),
    }
}

/// Build the provider context window for a conversation
///
/// The optional system prompt leads; then the most recent `window` user
/// and assistant messages, oldest first. System and error records in the
/// history are excluded. Called after the new user message is appended,
/// so that message is the final entry.
pub fn build_context(
    conversation: &crate::types::Conversation,
    window: usize,
) -> Vec<ContextEntry> {
    let mut context = Vec::new();

    if let Some(prompt) = &conversation.settings.system_prompt {
        context.push(ContextEntry::new("system", prompt.clone()));
    }

    let eligible: Vec<&Message> = conversation
        .messages
        .iter()
        .filter(|m| matches!(m.role, MessageRole::User | MessageRole::Assistant))
        .collect();
    let start = eligible.len().saturating_sub(window);
    for message in &eligible[start..] {
        context.push(ContextEntry::new(
            message.role.to_string(),
            message.content.clone(),
        ));
    }

    context
}

/// Derive a display title from the first user message
///
/// Long messages are cut at a character budget with a trailing ellipsis;
/// short ones keep their leading words verbatim.
pub fn derive_title(content: &str) -> String {
    let content = content.trim();
    if content.chars().count() > TITLE_TRUNCATE_AT {
        let kept: String = content.chars().take(TITLE_KEPT_CHARS).collect();
        format!("{}...", kept)
    } else {
        content
            .split_whitespace()
            .take(TITLE_MAX_WORDS)
            .collect::<Vec<_>>()
            .join(" ")
    }
}
