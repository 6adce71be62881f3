//! Picking the exporter's output file out of a directory listing.
//!
//! The exporter names its files after guild and channel, so the only handle
//! we have is the channel id appearing somewhere in the name.

use crate::domain::{ArtifactPolicy, ChannelId};
use crate::error::Error;

/// Names ending in `.{extension}` that contain the channel id, in input order
pub fn match_artifacts<'a, I>(names: I, channel_id: &ChannelId, extension: &str) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let suffix = format!(".{extension}");
    names
        .into_iter()
        .filter(|name| name.ends_with(&suffix) && name.contains(channel_id.as_str()))
        .map(str::to_string)
        .collect()
}

/// Chooses one match according to `policy`
pub fn select_artifact(
    matches: Vec<String>,
    channel_id: &ChannelId,
    policy: ArtifactPolicy,
) -> Result<String, Error> {
    if matches.len() > 1 {
        if policy == ArtifactPolicy::Strict {
            return Err(Error::AmbiguousArtifact {
                channel_id: channel_id.to_string(),
                matches,
            });
        }
        tracing::warn!(
            channel_id = %channel_id,
            ?matches,
            "multiple exported files match channel, using the first one"
        );
    }

    matches
        .into_iter()
        .next()
        .ok_or_else(|| Error::NoArtifactFound {
            channel_id: channel_id.to_string(),
            extension: String::new(),
            candidates: Vec::new(),
        })
}
