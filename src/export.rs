//! Conversation export surface
//!
//! Renders a conversation as JSON (direct structural dump), Markdown
//! (`# <title>` followed by `## <Sender> (<timestamp>)` sections), or plain
//! text (same structure without markup).

use crate::error::Result;
use crate::types::Conversation;
use std::str::FromStr;

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Direct structural dump of the conversation record
    Json,
    /// Title heading plus one section per message
    Markdown,
    /// Markdown structure without markup
    Text,
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            "text" | "txt" => Ok(ExportFormat::Text),
            other => Err(format!("unknown export format: {}", other)),
        }
    }
}

/// Render a conversation in the requested format
///
/// # Examples
///
/// ```
/// use convoke::export::{export_conversation, ExportFormat};
/// use convoke::types::{Conversation, Message};
///
/// let mut conversation = Conversation::new(Some("Demo".to_string()));
/// conversation.messages.push(Message::user("hello"));
/// conversation.metadata.message_count = 1;
///
/// let markdown = export_conversation(&conversation, ExportFormat::Markdown).unwrap();
/// assert!(markdown.starts_with("# Demo"));
/// assert!(markdown.contains("## User ("));
/// ```
pub fn export_conversation(conversation: &Conversation, format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(conversation)?),
        ExportFormat::Markdown => Ok(render_sections(conversation, true)),
        ExportFormat::Text => Ok(render_sections(conversation, false)),
    }
}

fn render_sections(conversation: &Conversation, markup: bool) -> String {
    let mut out = String::new();
    if markup {
        out.push_str(&format!("# {}\n", conversation.title));
    } else {
        out.push_str(&format!("{}\n", conversation.title));
    }

    for message in &conversation.messages {
        let header = format!(
            "{} ({})",
            message.role.sender_label(),
            message.timestamp.to_rfc3339()
        );
        out.push('\n');
        if markup {
            out.push_str(&format!("## {}\n\n", header));
        } else {
            out.push_str(&format!("{}\n", header));
        }
        out.push_str(&message.content);
        out.push('\n');
    }

    out
}
