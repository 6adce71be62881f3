use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use digest_core::domain::{Author, ConversationRecord, Message, UNKNOWN};
use digest_core::ports::ConversationLoader;
use digest_core::LoadError;
use serde::Deserialize;

// Only the fields the digest needs; everything else in the export is ignored.

#[derive(Debug, Default, Deserialize)]
struct RawNamed {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawAuthor {
    #[serde(default)]
    nickname: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(default)]
    author: Option<RawAuthor>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawConversation {
    #[serde(default)]
    guild: Option<RawNamed>,
    #[serde(default)]
    channel: Option<RawNamed>,
    #[serde(default)]
    messages: Vec<RawMessage>,
}

impl From<RawMessage> for Message {
    fn from(raw: RawMessage) -> Self {
        let author = raw.author.unwrap_or_default();
        Self {
            author: Author {
                nickname: author.nickname,
                name: author.name,
            },
            timestamp: raw.timestamp.unwrap_or_default(),
            content: raw.content.unwrap_or_default(),
        }
    }
}

fn name_or_unknown(named: Option<RawNamed>) -> String {
    named
        .and_then(|n| n.name)
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Reads exports produced with the exporter's `Json` format
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonConversationLoader;

impl JsonConversationLoader {
    pub fn new() -> Self {
        Self
    }

    /// Parses an export already held in memory
    pub fn parse(&self, path: &Path, text: &str) -> Result<ConversationRecord, LoadError> {
        let raw: RawConversation = serde_json::from_str(text).map_err(|e| LoadError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(ConversationRecord {
            guild_name: name_or_unknown(raw.guild),
            channel_name: name_or_unknown(raw.channel),
            messages: raw.messages.into_iter().map(Message::from).collect(),
        })
    }
}

impl ConversationLoader for JsonConversationLoader {
    fn load(&self, path: &Path) -> Result<ConversationRecord, LoadError> {
        let text = fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => LoadError::NotFound(path.to_path_buf()),
            _ => LoadError::Io {
                path: path.to_path_buf(),
                source: e,
            },
        })?;

        let conversation = self.parse(path, &text)?;
        tracing::debug!(
            path = %path.display(),
            guild = %conversation.guild_name,
            channel = %conversation.channel_name,
            messages = conversation.messages.len(),
            "loaded conversation"
        );
        Ok(conversation)
    }
}
