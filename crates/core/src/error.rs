//! Error taxonomy shared by the core and its adapters

use std::path::PathBuf;

use thiserror::Error;

/// Failures reading an exported conversation
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures talking to the hosted model
#[derive(Debug, Error)]
pub enum ModelError {
    /// Bad or missing credential, quota, network
    #[error("model unavailable: {0}")]
    Unavailable(String),

    /// Accumulated history exceeds the model's context window
    #[error("conversation exceeds the model context window: {0}")]
    ContextLimit(String),

    #[error("model request failed: {0}")]
    Request(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),

    #[error("export failed: {0}")]
    ExportFailed(String),

    #[error("no .{extension} file found containing channel id {channel_id} (candidates: {candidates:?})")]
    NoArtifactFound {
        channel_id: String,
        extension: String,
        candidates: Vec<String>,
    },

    #[error("multiple files match channel id {channel_id}: {matches:?}")]
    AmbiguousArtifact {
        channel_id: String,
        matches: Vec<String>,
    },

    #[error("invalid date '{value}': {reason}")]
    InvalidDate { value: String, reason: String },

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("timestamp store error: {0}")]
    Store(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
