use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use digest_core::application::{DigestService, ExportPipeline};
use digest_core::compactor;
use digest_core::domain::{
    ArtifactPolicy, ChannelId, ConversationRecord, ExportFormat, ExportJob, ExportOutcome,
    ExportRange,
};
use digest_core::ports::ConversationLoader;
use digest_core::session::{AnalysisSession, SessionOptions, SUGGESTED_QUESTIONS};
use digest_core::utils::{format_megabytes, format_system_time, format_timestamp_to_local};
use digest_core::Error;
use docker_adapter::{DirectoryArtifactLocator, DockerExporter};
use gemini_adapter::{GeminiChatModel, GenerationSettings};
use json_adapter::{JsonConversationLoader, JsonTimestampStore};
use markdown_adapter::MarkdownDigestWriter;
use secrecy::SecretString;

use crate::{Cli, Command, ModelArgs, SourceArgs};

/// Characters of a plain-text or CSV export printed by `show`
const TEXT_PREVIEW_CHARS: usize = 10_000;

/// Where `analyze` gets its conversation from
enum ConversationSource<'a> {
    Export { channel_id: &'a str, export: &'a SourceArgs },
    File(&'a Path),
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Export {
            channel_id,
            source,
            format,
            output,
        } => export(&cli.output_dir, &cli.state_file, &channel_id, &source, format, &output),
        Command::Analyze {
            channel_id,
            file,
            source,
            model,
            questions,
            output,
        } => {
            let from = match (&file, &channel_id) {
                (Some(path), _) => ConversationSource::File(path),
                (None, Some(channel_id)) => ConversationSource::Export {
                    channel_id,
                    export: &source,
                },
                (None, None) => anyhow::bail!("either a channel id or --file is required"),
            };
            analyze(
                &cli.output_dir,
                &cli.state_file,
                from,
                &model,
                &questions,
                output.as_deref(),
            )
        }
        Command::List => list(&cli.output_dir),
        Command::Show { file, limit } => show(&cli.output_dir, &file, limit),
    }
}

fn export(
    output_dir: &Path,
    state_file: &Path,
    channel_id: &str,
    source: &SourceArgs,
    format: ExportFormat,
    output: &Path,
) -> Result<()> {
    let auth_token = credential(source.discord_token.as_deref(), "DISCORD_TOKEN")?;
    let outcome = run_export(output_dir, state_file, channel_id, source, auth_token, format)?;

    match outcome.conversation {
        Some(conversation) => {
            let service = DigestService::new(Box::new(MarkdownDigestWriter::new(output)));
            let digest = service
                .execute(&conversation)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!(
                "Compressed conversation ({} messages) written to {}",
                digest.len(),
                output.display()
            );
        }
        None => println!("Conversation exported to {}", outcome.artifact.display()),
    }
    Ok(())
}

fn analyze(
    output_dir: &Path,
    state_file: &Path,
    source: ConversationSource<'_>,
    model_args: &ModelArgs,
    questions: &[String],
    output: Option<&Path>,
) -> Result<()> {
    // Credentials are checked before anything external runs.
    let api_key = credential(model_args.gemini_api_key.as_deref(), "GEMINI_API_KEY")?;

    let conversation = match source {
        ConversationSource::File(path) => {
            let path = resolve_file(output_dir, path);
            println!("Processing conversation from: {}", path.display());
            JsonConversationLoader::new().load(&path)?
        }
        ConversationSource::Export { channel_id, export } => {
            let auth_token = credential(export.discord_token.as_deref(), "DISCORD_TOKEN")?;
            run_export(output_dir, state_file, channel_id, export, auth_token, ExportFormat::Json)?
                .conversation
                .unwrap_or_default()
        }
    };

    println!("Compressing conversation...");
    let digest = match output {
        Some(path) => DigestService::new(Box::new(MarkdownDigestWriter::new(path)))
            .execute(&conversation)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => compactor::compact(&conversation),
    };
    if digest.is_empty() {
        println!("Warning: the exported conversation has no text messages");
    }

    println!("Initializing Gemini model...");
    let settings = GenerationSettings {
        model: model_args.model.clone(),
        temperature: model_args.temperature,
        ..GenerationSettings::default()
    };
    let model = GeminiChatModel::new(api_key, settings)?;
    let options = SessionOptions {
        digest_cap: model_args.digest_cap,
        max_history_turns: model_args.max_history,
    };
    let mut session =
        AnalysisSession::start(model, &digest, options).context("failed to start analysis session")?;

    if questions.is_empty() {
        repl(&mut session)
    } else {
        for question in questions {
            println!("\n> {question}");
            match session.ask(question) {
                Ok(answer) => println!("\nAnalysis: {answer}"),
                Err(e) => println!("\nError getting response: {e}"),
            }
        }
        Ok(())
    }
}

fn repl(session: &mut AnalysisSession<GeminiChatModel>) -> Result<()> {
    println!("\nConversation loaded! You can now ask questions about it.");
    println!("Type 'suggest' for ideas, 'quit' or 'exit' to end the session.\n");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("\nWhat would you like to know about the conversation? > ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let question = line?;
        let question = question.trim();

        match question.to_lowercase().as_str() {
            "" => continue,
            "quit" | "exit" => break,
            "suggest" => {
                for q in SUGGESTED_QUESTIONS {
                    println!("  - {q}");
                }
                continue;
            }
            _ => {}
        }

        match session.ask(question) {
            Ok(answer) => println!("\nAnalysis: {answer}"),
            Err(e) => println!("\nError getting response: {e}"),
        }
    }
    Ok(())
}

/// A credential from the command line or environment. Blank counts as missing.
fn credential(value: Option<&str>, name: &'static str) -> Result<SecretString, Error> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(SecretString::from)
        .ok_or(Error::MissingCredential(name))
}

fn run_export(
    output_dir: &Path,
    state_file: &Path,
    channel_id: &str,
    source: &SourceArgs,
    auth_token: SecretString,
    format: ExportFormat,
) -> Result<ExportOutcome> {
    let channel_id = ChannelId::new(channel_id).context("channel id must not be empty")?;

    let range = if source.incremental {
        ExportRange::Incremental
    } else if source.start_date.is_some() || source.end_date.is_some() {
        ExportRange::Range {
            start: source.start_date.clone(),
            end: source.end_date.clone(),
        }
    } else {
        ExportRange::Full
    };

    let exporter = DockerExporter::new("docker", source.image.as_str());

    let policy = if source.strict {
        ArtifactPolicy::Strict
    } else {
        ArtifactPolicy::FirstMatch
    };

    // Instantiate concrete adapters and inject them into the pipeline
    let pipeline = ExportPipeline::new(
        Box::new(exporter),
        Box::new(DirectoryArtifactLocator::new(policy)),
        Box::new(JsonConversationLoader::new()),
        Box::new(JsonTimestampStore::new(state_file)),
    );

    let job = ExportJob {
        channel_id,
        output_dir: absolute(output_dir)?,
        auth_token,
        range,
        format,
        download_media: source.media,
        threads: source.include_threads,
    };

    println!("Exporting channel {}... (this may take a while for large channels)", job.channel_id);
    let outcome = pipeline.run(&job)?;
    println!("Processing exported conversation from: {}", outcome.artifact.display());
    if let Some(start) = &outcome.start_bound {
        println!("Exported messages after {start}");
    }
    Ok(outcome)
}

// Docker bind mounts need an absolute host path.
fn absolute(dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    dir.canonicalize()
        .with_context(|| format!("failed to resolve {}", dir.display()))
}

fn list(output_dir: &Path) -> Result<()> {
    let entries = match fs::read_dir(output_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            println!("No exported files found. Use the export command first.");
            return Ok(());
        }
        Err(e) => return Err(e).with_context(|| format!("failed to read {}", output_dir.display())),
    };

    let mut rows = Vec::new();
    for entry in entries {
        let entry = entry?;
        let meta = entry.metadata()?;
        if !meta.is_file() {
            continue;
        }
        let modified = meta.modified().map(format_system_time).unwrap_or_default();
        rows.push((
            entry.file_name().to_string_lossy().into_owned(),
            format_megabytes(meta.len()),
            modified,
        ));
    }
    rows.sort();

    if rows.is_empty() {
        println!("No exported files found. Use the export command first.");
        return Ok(());
    }

    let width = rows.iter().map(|(name, _, _)| name.len()).max().unwrap_or(8).max(8);
    println!("{:<width$}  {:>10}  Last Modified", "Filename", "Size");
    for (name, size, modified) in rows {
        println!("{name:<width$}  {size:>10}  {modified}");
    }
    Ok(())
}

/// A path as given, or else a file name inside the output directory
fn resolve_file(output_dir: &Path, file: &Path) -> PathBuf {
    if file.exists() {
        file.to_path_buf()
    } else {
        output_dir.join(file)
    }
}

fn show(output_dir: &Path, file: &Path, limit: usize) -> Result<()> {
    let path = resolve_file(output_dir, file);
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "json" => {
            let conversation = JsonConversationLoader::new().load(&path)?;
            print_conversation(&conversation, limit);
        }
        "txt" | "csv" => {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            println!("{}", preview_text(&text, TEXT_PREVIEW_CHARS));
        }
        "html" => println!(
            "HTML exports are best viewed in a web browser: {}",
            path.display()
        ),
        _ => println!("Preview is not available for {}", path.display()),
    }
    Ok(())
}

/// The first `cap` characters, with an ellipsis when anything was cut
fn preview_text(text: &str, cap: usize) -> String {
    let cut = compactor::truncate_chars(text, cap);
    if cut.len() < text.len() {
        format!("{cut}...")
    } else {
        cut.to_string()
    }
}

fn print_conversation(conversation: &ConversationRecord, limit: usize) {
    println!("Server: {}", conversation.guild_name);
    println!("Channel: {}", conversation.channel_name);
    println!("Message Count: {}", conversation.messages.len());
    println!();

    for message in conversation.messages.iter().take(limit) {
        let content = message.content.trim();
        if content.is_empty() {
            continue;
        }
        println!(
            "{} ({}):",
            message.author.display_name(),
            format_timestamp_to_local(&message.timestamp)
        );
        println!("{content}");
        println!("---");
    }

    if conversation.messages.len() > limit {
        println!(
            "Only showing the first {limit} messages. The full conversation is available for analysis."
        );
    }
}
