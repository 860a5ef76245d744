//! Conversation store with write-through persistence
//!
//! The store exclusively owns the conversation collection and the
//! active-conversation pointer. Every mutating call serializes the full
//! collection to the [`StorageBackend`] before returning, and the backend
//! is the sole source of truth at startup.
//!
//! The collection sits behind a `tokio::sync::Mutex`; the pipeline worker
//! and any CLI callers share the store through an `Arc`.

use crate::error::{ConvokeError, Result};
use crate::events::{Event, EventBus};
use crate::export::{export_conversation, ExportFormat};
use crate::storage::{PersistedState, StorageBackend};
use crate::types::{Conversation, SettingsUpdate};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Lightweight listing entry for UI surfaces
#[derive(Debug, Clone)]
pub struct ConversationSummary {
    /// Conversation id
    pub id: String,
    /// Display title
    pub title: String,
    /// Message count
    pub message_count: usize,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
    /// Whether this is the active conversation
    pub active: bool,
    /// Archived flag
    pub archived: bool,
    /// Starred flag
    pub starred: bool,
}

struct StoreInner {
    conversations: Vec<Conversation>,
    active_id: String,
}

impl StoreInner {
    fn find(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    fn find_mut(&mut self, id: &str) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.id == id)
    }

    fn snapshot(&self) -> PersistedState {
        PersistedState {
            conversations: self.conversations.clone(),
            active_id: Some(self.active_id.clone()),
        }
    }
}

/// Owner of the conversation collection and active pointer
///
/// Construct with [`ConversationStore::open`], which loads the persisted
/// collection and guarantees an active conversation exists before the store
/// is handed out.
pub struct ConversationStore {
    backend: Arc<dyn StorageBackend>,
    events: EventBus,
    inner: Mutex<StoreInner>,
}

impl ConversationStore {
    /// Load the persisted collection and build a ready-to-use store
    ///
    /// Persisted records are merged into the in-memory collection. If the
    /// loaded set is empty (first run or wiped backend), a fresh
    /// conversation is created, made active, persisted, and announced via
    /// `conversationCreated`. If the persisted active pointer is stale, an
    /// arbitrary conversation is promoted.
    ///
    /// # Errors
    ///
    /// Returns `ConvokeError::Storage` if the backend read or the initial
    /// write-through fails.
    pub async fn open(backend: Arc<dyn StorageBackend>, events: EventBus) -> Result<Self> {
        let loaded = backend.load().await?.unwrap_or_default();

        let mut conversations = loaded.conversations;
        let mut created: Option<Conversation> = None;

        if conversations.is_empty() {
            let fresh = Conversation::new(None);
            tracing::info!(id = %fresh.id, "no persisted conversations; creating fresh");
            created = Some(fresh.clone());
            conversations.push(fresh);
        }

        let active_id = loaded
            .active_id
            .filter(|id| conversations.iter().any(|c| &c.id == id))
            .unwrap_or_else(|| conversations[0].id.clone());

        let store = Self {
            backend,
            events,
            inner: Mutex::new(StoreInner {
                conversations,
                active_id,
            }),
        };

        // Write through so a fresh conversation or repaired pointer survives
        // an immediate restart.
        {
            let inner = store.inner.lock().await;
            store.persist(&inner).await?;
        }

        if let Some(conversation) = created {
            store.events.emit(&Event::ConversationCreated { conversation });
        }

        Ok(store)
    }

    async fn persist(&self, inner: &StoreInner) -> Result<()> {
        self.backend.save(&inner.snapshot()).await
    }

    /// Create a conversation, make it active, and persist
    ///
    /// A `Some` title pins the title against auto-derivation.
    pub async fn create_conversation(&self, title: Option<String>) -> Result<Conversation> {
        let conversation = Conversation::new(title);
        {
            let mut inner = self.inner.lock().await;
            inner.conversations.push(conversation.clone());
            inner.active_id = conversation.id.clone();
            self.persist(&inner).await?;
        }
        tracing::debug!(id = %conversation.id, "conversation created");
        self.events.emit(&Event::ConversationCreated {
            conversation: conversation.clone(),
        });
        Ok(conversation)
    }

    /// Fetch a conversation by id, or the active one when `id` is `None`
    ///
    /// Returns `None` for an unknown id; this accessor never fails.
    pub async fn get_conversation(&self, id: Option<&str>) -> Option<Conversation> {
        let inner = self.inner.lock().await;
        match id {
            Some(id) => inner.find(id).cloned(),
            None => inner.find(&inner.active_id.clone()).cloned(),
        }
    }

    /// Id of the active conversation
    pub async fn active_id(&self) -> String {
        self.inner.lock().await.active_id.clone()
    }

    /// Point the active pointer at `id`
    ///
    /// Returns `false` without side effects when the id is unknown.
    pub async fn switch_conversation(&self, id: &str) -> Result<bool> {
        {
            let mut inner = self.inner.lock().await;
            if inner.find(id).is_none() {
                return Ok(false);
            }
            inner.active_id = id.to_string();
            self.persist(&inner).await?;
        }
        self.events.emit(&Event::ConversationSwitched { id: id.to_string() });
        Ok(true)
    }

    /// Remove a conversation
    ///
    /// If the removed conversation was active, an arbitrary remaining
    /// conversation is promoted; if none remain, a fresh conversation is
    /// created so the store is never without an active conversation.
    /// Returns `false` when the id is unknown.
    pub async fn delete_conversation(&self, id: &str) -> Result<bool> {
        let mut created: Option<Conversation> = None;
        {
            let mut inner = self.inner.lock().await;
            let before = inner.conversations.len();
            inner.conversations.retain(|c| c.id != id);
            if inner.conversations.len() == before {
                return Ok(false);
            }

            if inner.active_id == id {
                if let Some(next) = inner.conversations.first() {
                    inner.active_id = next.id.clone();
                } else {
                    let fresh = Conversation::new(None);
                    inner.active_id = fresh.id.clone();
                    created = Some(fresh.clone());
                    inner.conversations.push(fresh);
                }
            }
            self.persist(&inner).await?;
        }

        self.events.emit(&Event::ConversationDeleted { id: id.to_string() });
        if let Some(conversation) = created {
            self.events.emit(&Event::ConversationCreated { conversation });
        }
        Ok(true)
    }

    /// Shallow-merge a settings update into a conversation
    ///
    /// Bumps `updated_at`, persists, emits `conversationUpdated`. Returns
    /// `false` when the id is unknown.
    pub async fn update_settings(&self, id: &str, update: &SettingsUpdate) -> Result<bool> {
        self.update_with(id, |conversation| {
            conversation.settings.merge(update);
        })
        .await
    }

    /// Explicitly rename a conversation, pinning the title
    ///
    /// After a rename the auto-title derivation never overwrites the title.
    pub async fn rename_conversation(&self, id: &str, title: impl Into<String>) -> Result<bool> {
        let title = title.into();
        self.update_with(id, move |conversation| {
            conversation.title = title;
            conversation.title_pinned = true;
        })
        .await
    }

    /// Set or clear the starred flag
    pub async fn set_starred(&self, id: &str, starred: bool) -> Result<bool> {
        self.update_with(id, move |c| c.metadata.starred = starred).await
    }

    /// Set or clear the archived flag
    pub async fn set_archived(&self, id: &str, archived: bool) -> Result<bool> {
        self.update_with(id, move |c| c.metadata.archived = archived).await
    }

    /// Add a tag
    pub async fn add_tag(&self, id: &str, tag: impl Into<String>) -> Result<bool> {
        let tag = tag.into();
        self.update_with(id, move |c| {
            c.metadata.tags.insert(tag);
        })
        .await
    }

    /// Remove a tag
    pub async fn remove_tag(&self, id: &str, tag: &str) -> Result<bool> {
        let tag = tag.to_string();
        self.update_with(id, move |c| {
            c.metadata.tags.remove(&tag);
        })
        .await
    }

    async fn update_with(
        &self,
        id: &str,
        f: impl FnOnce(&mut Conversation),
    ) -> Result<bool> {
        let updated = {
            let mut inner = self.inner.lock().await;
            let Some(conversation) = inner.find_mut(id) else {
                return Ok(false);
            };
            f(conversation);
            conversation.updated_at = Utc::now();
            let updated = conversation.clone();
            self.persist(&inner).await?;
            updated
        };
        self.events.emit(&Event::ConversationUpdated {
            conversation: updated,
        });
        Ok(true)
    }

    /// Apply an arbitrary mutation to a conversation and write through
    ///
    /// This is the pipeline's append seam: the closure runs under the store
    /// lock, the snapshot is persisted before the lock is released, and the
    /// closure's return value is handed back. No event is emitted; the
    /// caller owns the event semantics of its mutation.
    ///
    /// Returns `Ok(None)` when the id is unknown.
    pub async fn mutate_conversation<R>(
        &self,
        id: &str,
        f: impl FnOnce(&mut Conversation) -> R,
    ) -> Result<Option<R>> {
        let mut inner = self.inner.lock().await;
        let Some(conversation) = inner.find_mut(id) else {
            return Ok(None);
        };
        let result = f(conversation);
        self.persist(&inner).await?;
        Ok(Some(result))
    }

    /// Summaries of every conversation, insertion order
    pub async fn list_conversations(&self) -> Vec<ConversationSummary> {
        let inner = self.inner.lock().await;
        inner
            .conversations
            .iter()
            .map(|c| ConversationSummary {
                id: c.id.clone(),
                title: c.title.clone(),
                message_count: c.metadata.message_count,
                updated_at: c.updated_at,
                active: c.id == inner.active_id,
                archived: c.metadata.archived,
                starred: c.metadata.starred,
            })
            .collect()
    }

    /// Render a conversation in the requested export format
    ///
    /// # Errors
    ///
    /// Returns `ConvokeError::Export` for an unknown id.
    pub async fn export_conversation(&self, id: &str, format: ExportFormat) -> Result<String> {
        let conversation = self
            .get_conversation(Some(id))
            .await
            .ok_or_else(|| ConvokeError::Export(format!("unknown conversation: {}", id)))?;
        export_conversation(&conversation, format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;
    use crate::types::Message;

    async fn fresh_store() -> ConversationStore {
        ConversationStore::open(Arc::new(MemoryBackend::new()), EventBus::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_open_empty_backend_creates_active_conversation() {
        let store = fresh_store().await;
        let active = store.get_conversation(None).await.unwrap();
        assert!(active.is_empty());
        assert_eq!(store.active_id().await, active.id);
    }

    #[tokio::test]
    async fn test_open_merges_persisted_records() {
        let mut conversation = Conversation::new(Some("kept".to_string()));
        conversation.messages.push(Message::user("hi"));
        conversation.metadata.message_count = 1;
        let id = conversation.id.clone();

        let backend = Arc::new(MemoryBackend::with_state(PersistedState {
            active_id: Some(id.clone()),
            conversations: vec![conversation],
        }));

        let store = ConversationStore::open(backend, EventBus::new()).await.unwrap();
        let active = store.get_conversation(None).await.unwrap();
        assert_eq!(active.id, id);
        assert_eq!(active.title, "kept");
        assert_eq!(active.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_open_repairs_stale_active_pointer() {
        let conversation = Conversation::new(Some("only".to_string()));
        let id = conversation.id.clone();
        let backend = Arc::new(MemoryBackend::with_state(PersistedState {
            active_id: Some("gone".to_string()),
            conversations: vec![conversation],
        }));

        let store = ConversationStore::open(backend, EventBus::new()).await.unwrap();
        assert_eq!(store.active_id().await, id);
    }

    #[tokio::test]
    async fn test_create_sets_active_and_emits() {
        let events = EventBus::new();
        let created = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen = created.clone();
        events.subscribe(crate::events::EventKind::ConversationCreated, move |event| {
            if let Event::ConversationCreated { conversation } = event {
                seen.lock().unwrap().push(conversation.id.clone());
            }
            Ok(())
        });

        let store = ConversationStore::open(Arc::new(MemoryBackend::new()), events)
            .await
            .unwrap();
        let conversation = store
            .create_conversation(Some("second".to_string()))
            .await
            .unwrap();

        assert_eq!(store.active_id().await, conversation.id);
        // One event for the auto-created conversation, one for the explicit one.
        assert_eq!(created.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_get_unknown_id_returns_none() {
        let store = fresh_store().await;
        assert!(store.get_conversation(Some("nope")).await.is_none());
    }

    #[tokio::test]
    async fn test_switch_unknown_id_is_a_noop() {
        let store = fresh_store().await;
        let active_before = store.active_id().await;
        assert!(!store.switch_conversation("nope").await.unwrap());
        assert_eq!(store.active_id().await, active_before);
    }

    #[tokio::test]
    async fn test_switch_moves_active_pointer() {
        let store = fresh_store().await;
        let first = store.active_id().await;
        let second = store.create_conversation(None).await.unwrap();
        assert_eq!(store.active_id().await, second.id);

        assert!(store.switch_conversation(&first).await.unwrap());
        assert_eq!(store.active_id().await, first);
    }

    #[tokio::test]
    async fn test_delete_active_promotes_remaining() {
        let store = fresh_store().await;
        let first = store.active_id().await;
        let second = store.create_conversation(None).await.unwrap();

        assert!(store.delete_conversation(&second.id).await.unwrap());
        assert_eq!(store.active_id().await, first);
        assert!(store.get_conversation(Some(&second.id)).await.is_none());
    }

    #[tokio::test]
    async fn test_delete_last_creates_replacement() {
        let store = fresh_store().await;
        let only = store.active_id().await;

        assert!(store.delete_conversation(&only).await.unwrap());
        let active = store.get_conversation(None).await.unwrap();
        assert_ne!(active.id, only);
        assert_eq!(store.list_conversations().await.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_unknown_returns_false() {
        let store = fresh_store().await;
        assert!(!store.delete_conversation("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_update_settings_merges_and_bumps_timestamp() {
        let store = fresh_store().await;
        let id = store.active_id().await;
        let before = store.get_conversation(None).await.unwrap().updated_at;

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let update = SettingsUpdate {
            system_prompt: Some(Some("be terse".to_string())),
            temperature: Some(0.1),
            ..Default::default()
        };
        assert!(store.update_settings(&id, &update).await.unwrap());

        let after = store.get_conversation(None).await.unwrap();
        assert_eq!(after.settings.system_prompt.as_deref(), Some("be terse"));
        assert_eq!(after.settings.temperature, 0.1);
        assert!(after.updated_at > before);
    }

    #[tokio::test]
    async fn test_rename_pins_title() {
        let store = fresh_store().await;
        let id = store.active_id().await;
        assert!(store.rename_conversation(&id, "pinned").await.unwrap());

        let conversation = store.get_conversation(None).await.unwrap();
        assert_eq!(conversation.title, "pinned");
        assert!(conversation.title_pinned);
    }

    #[tokio::test]
    async fn test_star_archive_and_tags() {
        let store = fresh_store().await;
        let id = store.active_id().await;

        store.set_starred(&id, true).await.unwrap();
        store.set_archived(&id, true).await.unwrap();
        store.add_tag(&id, "rust").await.unwrap();
        store.add_tag(&id, "async").await.unwrap();
        store.remove_tag(&id, "async").await.unwrap();

        let conversation = store.get_conversation(None).await.unwrap();
        assert!(conversation.metadata.starred);
        assert!(conversation.metadata.archived);
        assert!(conversation.metadata.tags.contains("rust"));
        assert!(!conversation.metadata.tags.contains("async"));
    }

    #[tokio::test]
    async fn test_mutations_write_through() {
        let backend = Arc::new(MemoryBackend::new());
        let store = ConversationStore::open(backend.clone(), EventBus::new())
            .await
            .unwrap();
        let id = store.active_id().await;
        store.rename_conversation(&id, "durable").await.unwrap();

        let persisted = backend.load().await.unwrap().unwrap();
        assert_eq!(persisted.conversations[0].title, "durable");
        assert_eq!(persisted.active_id.as_deref(), Some(id.as_str()));
    }

    #[tokio::test]
    async fn test_mutate_conversation_unknown_id() {
        let store = fresh_store().await;
        let result = store.mutate_conversation("nope", |_| ()).await.unwrap();
        assert!(result.is_none());
    }
}
