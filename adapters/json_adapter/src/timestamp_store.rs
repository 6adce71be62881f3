use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use digest_core::domain::ChannelId;
use digest_core::ports::{Result, TimestampStore};
use digest_core::Error;

type Record = BTreeMap<String, String>;

/// Flat JSON object mapping channel id to the last processed message
/// timestamp. Read and rewritten whole; assumes a single writer.
#[derive(Debug, Clone)]
pub struct JsonTimestampStore {
    path: PathBuf,
}

impl JsonTimestampStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // Missing and corrupt documents both read as empty.
    fn read_record(&self) -> Record {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Record::new(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to read timestamp store");
                return Record::new();
            }
        };

        match serde_json::from_str(&text) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "timestamp store is corrupt, treating as empty"
                );
                Record::new()
            }
        }
    }

    fn write_record(&self, record: &Record) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(record)
            .map_err(|e| Error::Store(format!("failed to serialize timestamps: {e}")))?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl TimestampStore for JsonTimestampStore {
    fn load(&self, channel_id: &ChannelId) -> Option<String> {
        self.read_record().remove(channel_id.as_str())
    }

    fn save(&self, channel_id: &ChannelId, timestamp: &str) -> Result<()> {
        let mut record = self.read_record();
        record.insert(channel_id.to_string(), timestamp.to_string());
        self.write_record(&record)?;
        tracing::debug!(
            path = %self.path.display(),
            channel_id = %channel_id,
            timestamp,
            "saved last timestamp"
        );
        Ok(())
    }
}
