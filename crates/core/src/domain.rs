use std::fmt;
use std::path::PathBuf;

use secrecy::SecretString;

/// Placeholder used wherever the export omits a name
pub const UNKNOWN: &str = "Unknown";

/// Identifier of a Discord channel, used both as a lookup key and as a
/// substring filter over exported filenames
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelId(String);

impl ChannelId {
    /// Returns `None` for an empty or whitespace-only id
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into().trim().to_string();
        if id.is_empty() {
            None
        } else {
            Some(Self(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Author {
    pub nickname: Option<String>,
    pub name: Option<String>,
}

impl Author {
    /// Nickname first, then the account name, then "Unknown".
    /// Empty strings count as missing.
    pub fn display_name(&self) -> &str {
        [self.nickname.as_deref(), self.name.as_deref()]
            .into_iter()
            .flatten()
            .find(|n| !n.trim().is_empty())
            .unwrap_or(UNKNOWN)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub author: Author,
    pub timestamp: String, // ISO-8601 as emitted by the exporter
    pub content: String,
}

/// A parsed export: guild/channel descriptor plus messages in export order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationRecord {
    pub guild_name: String,
    pub channel_name: String,
    pub messages: Vec<Message>,
}

impl Default for ConversationRecord {
    fn default() -> Self {
        Self {
            guild_name: UNKNOWN.to_string(),
            channel_name: UNKNOWN.to_string(),
            messages: Vec::new(),
        }
    }
}

/// Compacted text form of a conversation, one line per non-empty message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Digest {
    lines: Vec<String>,
}

impl Digest {
    pub fn from_lines(lines: Vec<String>) -> Self {
        Self { lines }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// Output formats understood by the exporter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Json,
    HtmlDark,
    HtmlLight,
    Csv,
    PlainText,
}

impl ExportFormat {
    pub const ALL: [Self; 5] = [
        Self::Json,
        Self::HtmlDark,
        Self::HtmlLight,
        Self::Csv,
        Self::PlainText,
    ];

    /// Name passed to the exporter's `-f` flag
    pub fn exporter_name(self) -> &'static str {
        match self {
            Self::Json => "Json",
            Self::HtmlDark => "HtmlDark",
            Self::HtmlLight => "HtmlLight",
            Self::Csv => "Csv",
            Self::PlainText => "PlainText",
        }
    }

    /// Extension of the files the exporter writes for this format
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::HtmlDark | Self::HtmlLight => "html",
            Self::Csv => "csv",
            Self::PlainText => "txt",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.exporter_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown export format: {s}"))
    }
}

/// Which threads the exporter includes alongside the channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ThreadMode {
    #[default]
    None,
    Active,
    All,
}

impl ThreadMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Active => "active",
            Self::All => "all",
        }
    }
}

impl std::str::FromStr for ThreadMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "active" => Ok(Self::Active),
            "all" => Ok(Self::All),
            other => Err(format!("unknown thread mode: {other}")),
        }
    }
}

/// Time range requested for an export
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExportRange {
    #[default]
    Full,
    Range {
        start: Option<String>,
        end: Option<String>,
    },
    /// Bounded below by the last timestamp recorded for the channel
    Incremental,
}

/// What happens when several files match the channel id
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArtifactPolicy {
    /// Warn and take the first match in name order
    #[default]
    FirstMatch,
    /// Fail with `AmbiguousArtifact`
    Strict,
}

/// A single invocation of the external exporter
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub channel_id: ChannelId,
    pub output_dir: PathBuf,
    pub auth_token: SecretString,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub format: ExportFormat,
    pub download_media: bool,
    pub threads: ThreadMode,
}

/// User-facing description of an export run
#[derive(Debug, Clone)]
pub struct ExportJob {
    pub channel_id: ChannelId,
    pub output_dir: PathBuf,
    pub auth_token: SecretString,
    pub range: ExportRange,
    pub format: ExportFormat,
    pub download_media: bool,
    pub threads: ThreadMode,
}

/// Result of a completed export run
#[derive(Debug, Clone)]
pub struct ExportOutcome {
    pub artifact: PathBuf,
    /// Only populated for JSON exports
    pub conversation: Option<ConversationRecord>,
    pub start_bound: Option<String>,
    pub latest_timestamp: Option<String>,
}

/// One request/response pair exchanged with the hosted model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub user: String,
    pub model: String,
}
