use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Args, Parser, Subcommand};
use digest_core::compactor::DEFAULT_DIGEST_CAP;
use digest_core::domain::{ExportFormat, ThreadMode};
use digest_core::session::DEFAULT_MAX_HISTORY_TURNS;
use docker_adapter::DEFAULT_IMAGE;
use gemini_adapter::DEFAULT_MODEL;
use tracing_subscriber::EnvFilter;

mod commands;

/// CLI tool to export Discord channels, compact them into a digest and
/// analyze them with a hosted model
#[derive(Parser, Debug)]
#[command(name = "discord-digest", version)]
#[command(about = "Exports Discord conversations and analyzes them with Gemini")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Directory the exporter writes into
    #[arg(long, env = "DISCORD_DIGEST_OUTPUT_DIR", default_value = "team_chat", global = true)]
    output_dir: PathBuf,

    /// JSON file holding the last exported timestamp per channel
    #[arg(
        long,
        env = "DISCORD_DIGEST_STATE_FILE",
        default_value = "last_timestamps.json",
        global = true
    )]
    state_file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Export a channel and write its compressed summary
    Export {
        /// Discord channel ID to export
        channel_id: String,

        #[command(flatten)]
        source: SourceArgs,

        /// Exporter output format; only Json produces a summary
        #[arg(short, long, default_value = "json")]
        format: ExportFormat,

        /// Output filename for the summary
        #[arg(short, long, default_value = "team_chat.md")]
        output: PathBuf,
    },
    /// Export a channel (or load an existing JSON export) and ask questions about it
    Analyze {
        /// Discord channel ID to export
        #[arg(required_unless_present = "file")]
        channel_id: Option<String>,

        /// Analyze an existing JSON export instead of running the exporter
        #[arg(long, conflicts_with_all = ["channel_id", "incremental", "start_date", "end_date"])]
        file: Option<PathBuf>,

        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        model: ModelArgs,

        /// Question to ask without entering the interactive prompt (repeatable)
        #[arg(short, long = "question")]
        questions: Vec<String>,

        /// Also write the compressed summary to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List exported files
    List,
    /// Show the contents of an exported file
    Show {
        /// File name inside the output directory, or a path
        file: PathBuf,

        /// Maximum number of messages to print
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
}

/// How to export a channel
#[derive(Args, Debug)]
struct SourceArgs {
    /// Start date in ISO format (e.g. "2023-01-01")
    #[arg(long, conflicts_with = "incremental")]
    start_date: Option<String>,

    /// End date in ISO format (e.g. "2023-12-31")
    #[arg(long, conflicts_with = "incremental")]
    end_date: Option<String>,

    /// Only export messages newer than the last export of this channel
    #[arg(long)]
    incremental: bool,

    /// Download media (images, avatars, etc.)
    #[arg(long)]
    media: bool,

    /// Include threads: none, active or all
    #[arg(long, default_value = "none")]
    include_threads: ThreadMode,

    /// Fail instead of guessing when several files match the channel id
    #[arg(long)]
    strict: bool,

    /// Discord authentication token
    #[arg(long, env = "DISCORD_TOKEN", hide_env_values = true)]
    discord_token: Option<String>,

    /// Exporter container image
    #[arg(long, env = "DISCORD_DIGEST_IMAGE", default_value = DEFAULT_IMAGE)]
    image: String,
}

/// Hosted model settings
#[derive(Args, Debug)]
struct ModelArgs {
    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    gemini_api_key: Option<String>,

    /// Gemini model name
    #[arg(long, env = "DISCORD_DIGEST_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Sampling temperature
    #[arg(long, default_value_t = 0.7)]
    temperature: f32,

    /// Characters of summary sent to the model
    #[arg(long, default_value_t = DEFAULT_DIGEST_CAP)]
    digest_cap: usize,

    /// Turns of dialogue kept in the session, seed included
    #[arg(long, default_value_t = DEFAULT_MAX_HISTORY_TURNS)]
    max_history: usize,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    match commands::run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = ?e, "command failed");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
