//! Reduces an exported conversation to a plain-text digest

use crate::domain::{ConversationRecord, Digest, Message};

/// Characters of digest sent to the model when nothing else is configured
pub const DEFAULT_DIGEST_CAP: usize = 50_000;

/// One line per message with non-empty content, in export order.
pub fn compact(conversation: &ConversationRecord) -> Digest {
    let lines = conversation
        .messages
        .iter()
        .filter_map(format_line)
        .collect();
    Digest::from_lines(lines)
}

fn format_line(message: &Message) -> Option<String> {
    let content = message.content.trim();
    if content.is_empty() {
        return None;
    }
    Some(format!(
        "- {} ({}): {}",
        message.author.display_name(),
        message.timestamp,
        content
    ))
}

/// First `cap` characters of `text`. The cut ignores message boundaries.
pub fn truncate_chars(text: &str, cap: usize) -> &str {
    match text.char_indices().nth(cap) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
