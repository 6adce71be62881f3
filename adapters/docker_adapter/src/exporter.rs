use std::process::{Command, Stdio};

use digest_core::domain::{ExportRequest, ThreadMode};
use digest_core::ports::{Exporter, Result};
use digest_core::Error;
use secrecy::ExposeSecret;

pub const DEFAULT_IMAGE: &str = "tyrrrz/discordchatexporter:stable";

/// Container mount point of the output directory
const CONTAINER_OUT: &str = "/out";

/// Runs DiscordChatExporter through `docker run` and waits for it to exit
#[derive(Debug, Clone)]
pub struct DockerExporter {
    docker_bin: String,
    image: String,
}

impl Default for DockerExporter {
    fn default() -> Self {
        Self::new("docker", DEFAULT_IMAGE)
    }
}

impl DockerExporter {
    pub fn new(docker_bin: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            docker_bin: docker_bin.into(),
            image: image.into(),
        }
    }

    /// Checks that docker is installed and the daemon answers
    pub fn check_available(&self) -> Result<()> {
        let output = Command::new(&self.docker_bin)
            .arg("info")
            .output()
            .map_err(|e| Error::ExportFailed(format!("failed to run {}: {e}", self.docker_bin)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::ExportFailed(format!(
                "docker is not running: {}",
                stderr.trim()
            )));
        }
        Ok(())
    }
}

/// Arguments after the docker binary. The token appears verbatim, so the
/// result must not be logged.
pub fn build_args(image: &str, request: &ExportRequest) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "--rm".to_string(),
        "-v".to_string(),
        format!("{}:{CONTAINER_OUT}", request.output_dir.display()),
        image.to_string(),
        "export".to_string(),
        "-f".to_string(),
        request.format.exporter_name().to_string(),
        "-c".to_string(),
        request.channel_id.to_string(),
        "-t".to_string(),
        request.auth_token.expose_secret().to_string(),
    ];

    if let Some(start) = &request.start_date {
        args.extend(["--after".to_string(), start.clone()]);
    }
    if let Some(end) = &request.end_date {
        args.extend(["--before".to_string(), end.clone()]);
    }
    if request.download_media {
        args.push("--media".to_string());
    }
    if request.threads != ThreadMode::None {
        args.extend([
            "--include-threads".to_string(),
            request.threads.as_str().to_string(),
        ]);
    }

    args
}

impl Exporter for DockerExporter {
    fn export(&self, request: &ExportRequest) -> Result<()> {
        self.check_available()?;
        std::fs::create_dir_all(&request.output_dir)?;

        tracing::info!(
            channel_id = %request.channel_id,
            format = request.format.exporter_name(),
            after = ?request.start_date,
            before = ?request.end_date,
            media = request.download_media,
            threads = request.threads.as_str(),
            output_dir = %request.output_dir.display(),
            "running exporter"
        );

        let status = Command::new(&self.docker_bin)
            .args(build_args(&self.image, request))
            .stdin(Stdio::null())
            .status()
            .map_err(|e| Error::ExportFailed(format!("failed to run {}: {e}", self.docker_bin)))?;

        if !status.success() {
            return Err(Error::ExportFailed(format!("exporter exited with {status}")));
        }

        tracing::info!(channel_id = %request.channel_id, "exporter finished");
        Ok(())
    }
}
