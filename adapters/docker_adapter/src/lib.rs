//! Adapters around the containerized DiscordChatExporter

mod exporter;
mod locator;

pub use exporter::{build_args, DockerExporter, DEFAULT_IMAGE};
pub use locator::DirectoryArtifactLocator;
