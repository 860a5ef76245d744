//! Core conversation data model for Convoke
//!
//! Defines the `Conversation` and `Message` records shared by the store,
//! pipeline, router, and export surface. Conversations carry an append-only
//! message sequence; the only post-append mutation allowed on a message is
//! metadata enrichment after a provider response.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use ulid::Ulid;
use uuid::Uuid;

/// Role of a message within a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Message authored by the local user
    User,
    /// Reply produced by a provider
    Assistant,
    /// System prompt or injected instruction
    System,
    /// Visible record of a failed send
    Error,
}

impl MessageRole {
    /// Human-readable sender label used by the export surface
    ///
    /// # Examples
    ///
    /// ```
    /// use convoke::types::MessageRole;
    ///
    /// assert_eq!(MessageRole::User.sender_label(), "User");
    /// assert_eq!(MessageRole::Error.sender_label(), "Error");
    /// ```
    pub fn sender_label(&self) -> &'static str {
        match self {
            MessageRole::User => "User",
            MessageRole::Assistant => "Assistant",
            MessageRole::System => "System",
            MessageRole::Error => "Error",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
            MessageRole::Error => write!(f, "error"),
        }
    }
}

/// Per-message metadata populated after provider processing
///
/// All fields are optional; user messages typically carry none, assistant
/// messages carry whatever the provider reported.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// Tokens consumed producing this message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<u64>,
    /// Model that produced this message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Wall-clock processing time for the send, in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
    /// Whole-chain retry attempts consumed before this reply
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
}

impl MessageMetadata {
    /// True when no metadata field is populated
    pub fn is_empty(&self) -> bool {
        self.tokens.is_none()
            && self.model.is_none()
            && self.processing_time_ms.is_none()
            && self.retries.is_none()
    }
}

/// A single message in a conversation
///
/// Immutable once appended except for [`MessageMetadata`] enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message identifier (UUID v4)
    pub id: String,
    /// Message text
    pub content: String,
    /// Sender role
    pub role: MessageRole,
    /// Append timestamp (UTC)
    pub timestamp: DateTime<Utc>,
    /// Post-processing metadata
    #[serde(default)]
    pub metadata: MessageMetadata,
}

impl Message {
    /// Creates a new message with a fresh id and the current timestamp
    ///
    /// # Examples
    ///
    /// ```
    /// use convoke::types::{Message, MessageRole};
    ///
    /// let msg = Message::new("Hello", MessageRole::User);
    /// assert_eq!(msg.role, MessageRole::User);
    /// assert_eq!(msg.content, "Hello");
    /// ```
    pub fn new(content: impl Into<String>, role: MessageRole) -> Self {
        Self {
            id: new_message_id(),
            content: content.into(),
            role,
            timestamp: Utc::now(),
            metadata: MessageMetadata::default(),
        }
    }

    /// Creates a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(content, MessageRole::User)
    }

    /// Creates a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(content, MessageRole::Assistant)
    }

    /// Creates a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(content, MessageRole::System)
    }

    /// Creates a new error message recording a failed send
    pub fn error(content: impl Into<String>) -> Self {
        Self::new(content, MessageRole::Error)
    }

    /// Attach metadata, builder-style
    pub fn with_metadata(mut self, metadata: MessageMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Generation settings attached to a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSettings {
    /// Model requested from providers
    #[serde(default = "default_model")]
    pub model: String,
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Completion token budget
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u64,
    /// Optional system prompt prepended to the context window
    #[serde(default)]
    pub system_prompt: Option<String>,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u64 {
    2048
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            system_prompt: None,
        }
    }
}

/// Partial settings update applied by `update_settings`
///
/// Each field is individually optional; `None` leaves the existing value
/// untouched (shallow merge). `system_prompt` uses a nested option so the
/// prompt can be explicitly cleared.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsUpdate {
    /// New model, if changing
    pub model: Option<String>,
    /// New temperature, if changing
    pub temperature: Option<f64>,
    /// New token budget, if changing
    pub max_tokens: Option<u64>,
    /// New system prompt; `Some(None)` clears it
    pub system_prompt: Option<Option<String>>,
}

impl ConversationSettings {
    /// Shallow-merge a partial update into these settings
    pub fn merge(&mut self, update: &SettingsUpdate) {
        if let Some(model) = &update.model {
            self.model = model.clone();
        }
        if let Some(temperature) = update.temperature {
            self.temperature = temperature;
        }
        if let Some(max_tokens) = update.max_tokens {
            self.max_tokens = max_tokens;
        }
        if let Some(system_prompt) = &update.system_prompt {
            self.system_prompt = system_prompt.clone();
        }
    }
}

/// Bookkeeping metadata for a conversation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationMetadata {
    /// Number of messages; always equals `messages.len()`
    pub message_count: usize,
    /// Accumulated tokens reported by providers
    pub tokens_used: u64,
    /// Free-form tags
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Archived flag
    #[serde(default)]
    pub archived: bool,
    /// Starred flag
    #[serde(default)]
    pub starred: bool,
}

/// An ordered thread of messages sharing generation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation identifier (ULID)
    pub id: String,
    /// Display title; auto-derived from the first user message until
    /// explicitly renamed
    pub title: String,
    /// Whether the title has been explicitly set (rename or creation title);
    /// suppresses auto-derivation
    #[serde(default)]
    pub title_pinned: bool,
    /// Append-only message sequence, insertion order significant
    pub messages: Vec<Message>,
    /// Creation timestamp (UTC)
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp (UTC)
    pub updated_at: DateTime<Utc>,
    /// Generation settings
    #[serde(default)]
    pub settings: ConversationSettings,
    /// Bookkeeping metadata
    #[serde(default)]
    pub metadata: ConversationMetadata,
}

impl Conversation {
    /// Creates an empty conversation with default settings
    ///
    /// When `title` is `None`, a placeholder title is used and later
    /// replaced by auto-derivation from the first user message.
    ///
    /// # Examples
    ///
    /// ```
    /// use convoke::types::Conversation;
    ///
    /// let conversation = Conversation::new(None);
    /// assert_eq!(conversation.title, "New conversation");
    /// assert_eq!(conversation.metadata.message_count, 0);
    /// ```
    pub fn new(title: Option<String>) -> Self {
        let now = Utc::now();
        let title_pinned = title.is_some();
        Self {
            id: new_conversation_id(),
            title: title.unwrap_or_else(|| "New conversation".to_string()),
            title_pinned,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
            settings: ConversationSettings::default(),
            metadata: ConversationMetadata::default(),
        }
    }

    /// Number of messages in the conversation
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True if the conversation has no messages
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Generate a new ULID for a conversation
///
/// ULIDs are preferred over UUIDs for conversation ids as they are sortable
/// by timestamp and more human-readable.
pub fn new_conversation_id() -> String {
    Ulid::new().to_string()
}

/// Generate a new UUID v4 for a message
pub fn new_message_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_conversation_id_is_ulid() {
        let id = new_conversation_id();
        assert_eq!(id.len(), 26); // ULID string length
    }

    #[test]
    fn test_new_message_id_is_unique() {
        assert_ne!(new_message_id(), new_message_id());
    }

    #[test]
    fn test_message_constructors() {
        assert_eq!(Message::user("hi").role, MessageRole::User);
        assert_eq!(Message::assistant("hi").role, MessageRole::Assistant);
        assert_eq!(Message::system("hi").role, MessageRole::System);
        assert_eq!(Message::error("hi").role, MessageRole::Error);
    }

    #[test]
    fn test_message_role_serialization() {
        let json = serde_json::to_string(&MessageRole::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
        let role: MessageRole = serde_json::from_str("\"error\"").unwrap();
        assert_eq!(role, MessageRole::Error);
    }

    #[test]
    fn test_message_metadata_is_empty() {
        assert!(MessageMetadata::default().is_empty());
        let meta = MessageMetadata {
            tokens: Some(12),
            ..Default::default()
        };
        assert!(!meta.is_empty());
    }

    #[test]
    fn test_conversation_new_defaults() {
        let conversation = Conversation::new(None);
        assert!(conversation.is_empty());
        assert_eq!(conversation.metadata.message_count, 0);
        assert!(!conversation.title_pinned);
        assert_eq!(conversation.settings.temperature, 0.7);
    }

    #[test]
    fn test_conversation_explicit_title_is_pinned() {
        let conversation = Conversation::new(Some("Release notes".to_string()));
        assert_eq!(conversation.title, "Release notes");
        assert!(conversation.title_pinned);
    }

    #[test]
    fn test_settings_merge_partial() {
        let mut settings = ConversationSettings::default();
        settings.merge(&SettingsUpdate {
            temperature: Some(0.2),
            ..Default::default()
        });
        assert_eq!(settings.temperature, 0.2);
        assert_eq!(settings.model, "gpt-4o-mini");
    }

    #[test]
    fn test_settings_merge_clears_system_prompt() {
        let mut settings = ConversationSettings {
            system_prompt: Some("be brief".to_string()),
            ..Default::default()
        };
        settings.merge(&SettingsUpdate {
            system_prompt: Some(None),
            ..Default::default()
        });
        assert!(settings.system_prompt.is_none());
    }

    #[test]
    fn test_conversation_serialization_round_trip() {
        let mut conversation = Conversation::new(Some("test".to_string()));
        conversation.messages.push(Message::user("hello"));
        conversation.metadata.message_count = 1;
        conversation.metadata.tags.insert("rust".to_string());

        let json = serde_json::to_string(&conversation).unwrap();
        let back: Conversation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, conversation);
    }

    #[test]
    fn test_sender_labels() {
        assert_eq!(MessageRole::Assistant.sender_label(), "Assistant");
        assert_eq!(MessageRole::System.sender_label(), "System");
    }
}
