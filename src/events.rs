//! Synchronous event bus for conversation lifecycle events
//!
//! Subscribers register for a single event kind or for the wildcard (every
//! event). Delivery is synchronous and in subscription order; a failing
//! subscriber is logged and never interrupts delivery to the remaining
//! subscribers or the store/pipeline operation that emitted the event.

use crate::types::{Conversation, Message};
use std::sync::{Arc, Mutex};

/// Discriminant for the event catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A conversation was created and made active
    ConversationCreated,
    /// The active-conversation pointer moved
    ConversationSwitched,
    /// A conversation was removed
    ConversationDeleted,
    /// Conversation settings or flags changed
    ConversationUpdated,
    /// A message was appended
    MessageAdded,
    /// A send completed; carries the user+assistant pair
    MessageProcessed,
    /// A send terminally failed
    MessageError,
}

impl EventKind {
    /// Canonical event name, as exposed to subscribers and logs
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::ConversationCreated => "conversationCreated",
            EventKind::ConversationSwitched => "conversationSwitched",
            EventKind::ConversationDeleted => "conversationDeleted",
            EventKind::ConversationUpdated => "conversationUpdated",
            EventKind::MessageAdded => "messageAdded",
            EventKind::MessageProcessed => "messageProcessed",
            EventKind::MessageError => "messageError",
        }
    }
}

/// Lifecycle event with its payload
#[derive(Debug, Clone)]
pub enum Event {
    /// A conversation was created and made active
    ConversationCreated {
        /// The newly created conversation
        conversation: Conversation,
    },
    /// The active-conversation pointer moved
    ConversationSwitched {
        /// Id of the now-active conversation
        id: String,
    },
    /// A conversation was removed
    ConversationDeleted {
        /// Id of the removed conversation
        id: String,
    },
    /// Conversation settings or flags changed
    ConversationUpdated {
        /// The conversation after the update
        conversation: Conversation,
    },
    /// A message was appended to a conversation
    MessageAdded {
        /// Owning conversation id
        conversation_id: String,
        /// The appended message
        message: Message,
    },
    /// A send completed successfully
    MessageProcessed {
        /// Owning conversation id
        conversation_id: String,
        /// The user message that triggered the send
        user: Message,
        /// The assistant reply
        assistant: Message,
    },
    /// A send terminally failed
    MessageError {
        /// Owning conversation id
        conversation_id: String,
        /// Rendered terminal error
        error: String,
    },
}

impl Event {
    /// The kind discriminant for this event
    pub fn kind(&self) -> EventKind {
        match self {
            Event::ConversationCreated { .. } => EventKind::ConversationCreated,
            Event::ConversationSwitched { .. } => EventKind::ConversationSwitched,
            Event::ConversationDeleted { .. } => EventKind::ConversationDeleted,
            Event::ConversationUpdated { .. } => EventKind::ConversationUpdated,
            Event::MessageAdded { .. } => EventKind::MessageAdded,
            Event::MessageProcessed { .. } => EventKind::MessageProcessed,
            Event::MessageError { .. } => EventKind::MessageError,
        }
    }
}

type Handler = Box<dyn Fn(&Event) -> crate::error::Result<()> + Send + Sync>;

struct Subscription {
    /// `None` subscribes to every event (wildcard)
    filter: Option<EventKind>,
    handler: Handler,
}

/// Synchronous publish/subscribe bus
///
/// Cheap to clone; clones share the subscriber list.
///
/// # Examples
///
/// ```
/// use convoke::events::{Event, EventBus, EventKind};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let bus = EventBus::new();
/// let seen = Arc::new(AtomicUsize::new(0));
/// let counter = seen.clone();
/// bus.subscribe(EventKind::ConversationSwitched, move |_event| {
///     counter.fetch_add(1, Ordering::SeqCst);
///     Ok(())
/// });
///
/// bus.emit(&Event::ConversationSwitched { id: "abc".to_string() });
/// assert_eq!(seen.load(Ordering::SeqCst), 1);
/// ```
#[derive(Clone)]
pub struct EventBus {
    subscriptions: Arc<Mutex<Vec<Subscription>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Creates an empty bus
    pub fn new() -> Self {
        Self {
            subscriptions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Subscribe to a single event kind
    pub fn subscribe<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(&Event) -> crate::error::Result<()> + Send + Sync + 'static,
    {
        self.push(Some(kind), Box::new(handler));
    }

    /// Subscribe to every event (wildcard)
    pub fn subscribe_all<F>(&self, handler: F)
    where
        F: Fn(&Event) -> crate::error::Result<()> + Send + Sync + 'static,
    {
        self.push(None, Box::new(handler));
    }

    fn push(&self, filter: Option<EventKind>, handler: Handler) {
        let mut subscriptions = self
            .subscriptions
            .lock()
            .expect("event bus subscriber list poisoned");
        subscriptions.push(Subscription { filter, handler });
    }

    /// Deliver an event to all matching subscribers, in subscription order
    ///
    /// Handler errors are logged at warn level and swallowed so one bad
    /// subscriber cannot starve the rest or abort the emitting operation.
    pub fn emit(&self, event: &Event) {
        let subscriptions = self
            .subscriptions
            .lock()
            .expect("event bus subscriber list poisoned");
        for subscription in subscriptions.iter() {
            let matches = match subscription.filter {
                Some(kind) => kind == event.kind(),
                None => true,
            };
            if !matches {
                continue;
            }
            if let Err(err) = (subscription.handler)(event) {
                tracing::warn!(
                    event = event.kind().name(),
                    error = %err,
                    "event subscriber failed; continuing delivery"
                );
            }
        }
    }

    /// Number of registered subscribers (wildcard included)
    pub fn subscriber_count(&self) -> usize {
        self.subscriptions
            .lock()
            .expect("event bus subscriber list poisoned")
            .len()
    }
}
