use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use digest_core::artifact::{match_artifacts, select_artifact};
use digest_core::domain::{ArtifactPolicy, ChannelId, ExportFormat};
use digest_core::ports::{ArtifactLocator, Result};
use digest_core::Error;

/// Scans the export directory for the file the exporter wrote for a channel,
/// then waits for its size to stop changing
#[derive(Debug, Clone)]
pub struct DirectoryArtifactLocator {
    policy: ArtifactPolicy,
    poll_interval: Duration,
    settle_timeout: Duration,
}

impl Default for DirectoryArtifactLocator {
    fn default() -> Self {
        Self {
            policy: ArtifactPolicy::FirstMatch,
            poll_interval: Duration::from_millis(250),
            settle_timeout: Duration::from_secs(5),
        }
    }
}

impl DirectoryArtifactLocator {
    pub fn new(policy: ArtifactPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn with_settle(mut self, poll_interval: Duration, settle_timeout: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.settle_timeout = settle_timeout;
        self
    }

    /// Regular files in `dir`, newest first, then by name.
    /// Bounded exports get their own `(after ...)` file next to older ones,
    /// so the latest write is the one this run produced.
    fn file_names(dir: &Path) -> Result<Vec<String>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                files.push((modified, name.to_string()));
            }
        }
        files.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        Ok(files.into_iter().map(|(_, name)| name).collect())
    }

    /// Polls until two consecutive reads report the same size. Gives up
    /// after the settle timeout and proceeds with what is there.
    fn wait_until_stable(&self, path: &Path) -> Result<()> {
        let deadline = Instant::now() + self.settle_timeout;
        let mut last = fs::metadata(path)?.len();
        loop {
            thread::sleep(self.poll_interval);
            let size = fs::metadata(path)?.len();
            if size == last {
                return Ok(());
            }
            if Instant::now() >= deadline {
                tracing::warn!(path = %path.display(), size, "exported file still growing, proceeding");
                return Ok(());
            }
            last = size;
        }
    }
}

impl ArtifactLocator for DirectoryArtifactLocator {
    fn locate(&self, output_dir: &Path, channel_id: &ChannelId, format: ExportFormat) -> Result<PathBuf> {
        let extension = format.extension();
        let names = Self::file_names(output_dir)?;
        let matches = match_artifacts(names.iter().map(String::as_str), channel_id, extension);

        if matches.is_empty() {
            let suffix = format!(".{extension}");
            return Err(Error::NoArtifactFound {
                channel_id: channel_id.to_string(),
                extension: extension.to_string(),
                candidates: names.into_iter().filter(|n| n.ends_with(&suffix)).collect(),
            });
        }

        let chosen = select_artifact(matches, channel_id, self.policy)?;
        let path = output_dir.join(chosen);
        self.wait_until_stable(&path)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast(policy: ArtifactPolicy) -> DirectoryArtifactLocator {
        DirectoryArtifactLocator::new(policy)
            .with_settle(Duration::from_millis(1), Duration::from_millis(20))
    }

    fn touch(path: &Path, modified: SystemTime) {
        fs::write(path, "{}").unwrap();
        fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(modified)
            .unwrap();
    }

    /// Files sharing one modification time, so name order decides
    fn dir_with(files: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let stamp = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        for f in files {
            touch(&dir.path().join(f), stamp);
        }
        dir
    }

    fn channel(id: &str) -> ChannelId {
        ChannelId::new(id).unwrap()
    }

    #[test]
    fn picks_first_match_by_name() {
        let dir = dir_with(&["x.json", "123_extra.json", "123.json"]);
        let path = fast(ArtifactPolicy::FirstMatch)
            .locate(dir.path(), &channel("123"), ExportFormat::Json)
            .unwrap();
        assert_eq!(path, dir.path().join("123.json"));
    }

    #[test]
    fn newest_bounded_export_wins_over_older_ones() {
        let dir = tempfile::tempdir().unwrap();
        let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_717_000_000);
        touch(&dir.path().join("G - general [42].json"), base);
        touch(
            &dir.path().join("G - general [42] (after 2024-06-01).json"),
            base + Duration::from_secs(3600),
        );
        touch(
            &dir.path().join("G - general [42] (after 2024-06-05).json"),
            base + Duration::from_secs(7200),
        );

        let path = fast(ArtifactPolicy::FirstMatch)
            .locate(dir.path(), &channel("42"), ExportFormat::Json)
            .unwrap();

        assert_eq!(path, dir.path().join("G - general [42] (after 2024-06-05).json"));
    }

    #[test]
    fn strict_policy_fails_on_multiple_matches() {
        let dir = dir_with(&["x.json", "123.json", "123_extra.json"]);
        let err = fast(ArtifactPolicy::Strict)
            .locate(dir.path(), &channel("123"), ExportFormat::Json)
            .unwrap_err();
        assert!(matches!(err, Error::AmbiguousArtifact { .. }));
    }

    #[test]
    fn no_match_lists_candidates() {
        let dir = dir_with(&["x.json", "123.html"]);
        let err = fast(ArtifactPolicy::FirstMatch)
            .locate(dir.path(), &channel("123"), ExportFormat::Json)
            .unwrap_err();
        match err {
            Error::NoArtifactFound { candidates, extension, .. } => {
                assert_eq!(candidates, vec!["x.json".to_string()]);
                assert_eq!(extension, "json");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn uses_format_extension() {
        let dir = dir_with(&["Guild - general [123].json", "Guild - general [123].html"]);
        let path = fast(ArtifactPolicy::Strict)
            .locate(dir.path(), &channel("123"), ExportFormat::HtmlLight)
            .unwrap();
        assert_eq!(path, dir.path().join("Guild - general [123].html"));
    }

    #[test]
    fn directories_are_ignored() {
        let dir = dir_with(&[]);
        fs::create_dir(dir.path().join("123.json")).unwrap();
        let err = fast(ArtifactPolicy::FirstMatch)
            .locate(dir.path(), &channel("123"), ExportFormat::Json)
            .unwrap_err();
        assert!(matches!(err, Error::NoArtifactFound { .. }));
    }
}
