use std::fs;
use std::path::{Path, PathBuf};

use digest_core::domain::{ConversationRecord, Digest};
use digest_core::ports::{DigestWriter, Result};

const HEADER: &str = "# Compressed Conversation Summary";

/// Writes the digest as a single Markdown file
pub struct MarkdownDigestWriter {
    output_file: PathBuf,
}

impl MarkdownDigestWriter {
    pub fn new(output_file: impl Into<PathBuf>) -> Self {
        Self {
            output_file: output_file.into(),
        }
    }

    pub fn output_file(&self) -> &Path {
        &self.output_file
    }

    /// Formats the digest into the document body
    fn format_markdown(&self, digest: &Digest) -> String {
        format!("{HEADER}\n\n{}", digest.text())
    }
}

impl DigestWriter for MarkdownDigestWriter {
    fn write(&self, conversation: &ConversationRecord, digest: &Digest) -> Result<()> {
        if let Some(parent) = self.output_file.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        fs::write(&self.output_file, self.format_markdown(digest))?;
        tracing::info!(
            path = %self.output_file.display(),
            guild = %conversation.guild_name,
            channel = %conversation.channel_name,
            lines = digest.len(),
            "wrote digest"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_header_and_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports/team_chat.md");
        let writer = MarkdownDigestWriter::new(&path);
        let digest = Digest::from_lines(vec![
            "- Al (2024-01-01T00:00:00Z): hi".to_string(),
            "- bob (2024-01-01T00:01:00Z): hey".to_string(),
        ]);

        writer.write(&ConversationRecord::default(), &digest).unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "# Compressed Conversation Summary\n\n\
             - Al (2024-01-01T00:00:00Z): hi\n\
             - bob (2024-01-01T00:01:00Z): hey"
        );
    }

    #[test]
    fn empty_digest_still_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let writer = MarkdownDigestWriter::new(dir.path().join("out.md"));

        writer
            .write(&ConversationRecord::default(), &Digest::default())
            .unwrap();

        assert_eq!(
            fs::read_to_string(writer.output_file()).unwrap(),
            "# Compressed Conversation Summary\n\n"
        );
    }
}
