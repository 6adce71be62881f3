use std::path::{Path, PathBuf};

use crate::domain::{ChannelId, ConversationRecord, Digest, ExportFormat, ExportRequest, Turn};
use crate::error::{Error, LoadError, ModelError};

pub type Result<T> = std::result::Result<T, Error>;

/// Persists the last processed message timestamp per channel
pub trait TimestampStore {
    /// `None` when nothing was recorded or the store is unreadable
    fn load(&self, channel_id: &ChannelId) -> Option<String>;

    fn save(&self, channel_id: &ChannelId, timestamp: &str) -> Result<()>;
}

/// Runs the external exporter to completion
pub trait Exporter {
    fn export(&self, request: &ExportRequest) -> Result<()>;
}

/// Finds the file an export produced for a channel
pub trait ArtifactLocator {
    fn locate(&self, output_dir: &Path, channel_id: &ChannelId, format: ExportFormat)
        -> Result<PathBuf>;
}

pub trait ConversationLoader {
    fn load(&self, path: &Path) -> std::result::Result<ConversationRecord, LoadError>;
}

/// Hosted chat model. Receives the prior turns and the new message, returns the reply.
pub trait ChatModel {
    fn send(&self, history: &[Turn], message: &str) -> std::result::Result<String, ModelError>;
}

/// Trait for writing a digest to its destination
pub trait DigestWriter {
    fn write(&self, conversation: &ConversationRecord, digest: &Digest) -> Result<()>;
}
