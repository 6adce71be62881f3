use crate::compactor;
use crate::domain::{
    ConversationRecord, Digest, ExportFormat, ExportJob, ExportOutcome, ExportRange, ExportRequest,
};
use crate::ports::{ArtifactLocator, ConversationLoader, DigestWriter, Exporter, Result, TimestampStore};
use crate::utils::{most_recent_timestamp, validate_date_bound};

/// Application service running one export: bound resolution, exporter
/// invocation, artifact discovery, load and timestamp bookkeeping
pub struct ExportPipeline {
    exporter: Box<dyn Exporter>,
    locator: Box<dyn ArtifactLocator>,
    loader: Box<dyn ConversationLoader>,
    store: Box<dyn TimestampStore>,
}

impl ExportPipeline {
    /// Creates a new ExportPipeline with the given adapters
    pub fn new(
        exporter: Box<dyn Exporter>,
        locator: Box<dyn ArtifactLocator>,
        loader: Box<dyn ConversationLoader>,
        store: Box<dyn TimestampStore>,
    ) -> Self {
        Self {
            exporter,
            locator,
            loader,
            store,
        }
    }

    /// Executes the export. Any failure halts the run; nothing is retried.
    pub fn run(&self, job: &ExportJob) -> Result<ExportOutcome> {
        let (start_date, end_date) = self.resolve_bounds(job)?;

        let request = ExportRequest {
            channel_id: job.channel_id.clone(),
            output_dir: job.output_dir.clone(),
            auth_token: job.auth_token.clone(),
            start_date: start_date.clone(),
            end_date,
            format: job.format,
            download_media: job.download_media,
            threads: job.threads,
        };
        self.exporter.export(&request)?;

        let artifact = self
            .locator
            .locate(&job.output_dir, &job.channel_id, job.format)?;
        tracing::info!(artifact = %artifact.display(), "located exported file");

        if job.format != ExportFormat::Json {
            return Ok(ExportOutcome {
                artifact,
                conversation: None,
                start_bound: start_date,
                latest_timestamp: None,
            });
        }

        let conversation = self.loader.load(&artifact)?;
        let latest_timestamp = most_recent_timestamp(&conversation);
        if let Some(latest) = &latest_timestamp {
            self.advance_timestamp(job, latest)?;
        }

        Ok(ExportOutcome {
            artifact,
            conversation: Some(conversation),
            start_bound: start_date,
            latest_timestamp,
        })
    }

    fn resolve_bounds(&self, job: &ExportJob) -> Result<(Option<String>, Option<String>)> {
        match &job.range {
            ExportRange::Full => Ok((None, None)),
            ExportRange::Range { start, end } => {
                let start = start.as_deref().map(validate_date_bound).transpose()?;
                let end = end.as_deref().map(validate_date_bound).transpose()?;
                Ok((start, end))
            }
            ExportRange::Incremental => match self.store.load(&job.channel_id) {
                Some(last) => {
                    tracing::info!(channel_id = %job.channel_id, after = %last, "incremental export");
                    Ok((Some(last), None))
                }
                None => {
                    tracing::info!(
                        channel_id = %job.channel_id,
                        "no previous export recorded, performing full export"
                    );
                    Ok((None, None))
                }
            },
        }
    }

    // Recorded timestamps only move forward.
    fn advance_timestamp(&self, job: &ExportJob, latest: &str) -> Result<()> {
        match self.store.load(&job.channel_id) {
            Some(previous) if previous.as_str() >= latest => {
                tracing::debug!(
                    channel_id = %job.channel_id,
                    %previous,
                    latest,
                    "recorded timestamp already up to date"
                );
                Ok(())
            }
            _ => {
                self.store.save(&job.channel_id, latest)?;
                tracing::info!(channel_id = %job.channel_id, latest, "recorded last message timestamp");
                Ok(())
            }
        }
    }
}

/// Compacts a conversation and hands the digest to a writer
pub struct DigestService {
    writer: Box<dyn DigestWriter>,
}

impl DigestService {
    pub fn new(writer: Box<dyn DigestWriter>) -> Self {
        Self { writer }
    }

    pub fn execute(&self, conversation: &ConversationRecord) -> Result<Digest> {
        let digest = compactor::compact(conversation);
        self.writer.write(conversation, &digest)?;
        Ok(digest)
    }
}
