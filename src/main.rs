//! genviz - ask a database questions in plain language, get a chart back.

use anyhow::{anyhow, Context};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info};

use genviz::cli::Cli;
use genviz::config::Config;
use genviz::connection::ConnectionManager;
use genviz::llm::{create_client, LlmProvider, LlmTranslator};
use genviz::logging;
use genviz::output::{empty_schema_notice, refresh_summary, SessionOutput};
use genviz::session::{Phase, Pipeline, Question, SchemaContext, SessionActor, SessionHandle, StageTimeouts};
use genviz::speech::{create_transcriber, MockTranscriber, Transcriber};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse_args();

    if cli.log_file {
        logging::init_file_logging();
    } else {
        logging::init_stderr_logging();
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let config = Config::load_from_file(&config_path)?;

    let format = cli.parse_output_format().map_err(|e| anyhow!(e))?;
    let connection = cli.resolve_connection(&config)?;
    info!("Connecting to {}", connection.display_string());

    let mut manager = ConnectionManager::new();
    let active = manager.connect(&connection).await?;

    if cli.schema {
        println!("{}", active.schema.format_for_display());
        manager.close().await?;
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(notice) = empty_schema_notice(&active.schema) {
        println!("{notice}");
    }

    let provider: LlmProvider = cli
        .llm
        .as_deref()
        .unwrap_or(config.llm.provider.as_str())
        .parse()
        .map_err(|e: String| anyhow!(e))?;
    let client = create_client(provider, None, config.llm.model.clone())?;
    info!("Translating with {}", client.name());

    let transcriber: Arc<dyn Transcriber> = match create_transcriber(&config.speech) {
        Ok(t) => Arc::from(t),
        Err(e) if cli.audio.is_none() => {
            // Typed questions never reach the transcriber.
            debug!("Speech disabled: {e}");
            Arc::new(MockTranscriber::new())
        }
        Err(e) => return Err(e.into()),
    };

    let pipeline = Pipeline::new(transcriber, Arc::new(LlmTranslator::new(client)))
        .with_timeouts(StageTimeouts::from(&config.timeouts));
    let handle = SessionActor::spawn(pipeline, SchemaContext::from(active));
    let output = SessionOutput::new(format);

    let code = if let Some(question) = cli.ask.clone() {
        ask(&handle, &output, Question::Text(question)).await?
    } else if let Some(path) = &cli.audio {
        let audio = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read audio file {}", path.display()))?;
        ask(&handle, &output, Question::Audio(audio)).await?
    } else {
        interactive(&handle, &output).await?
    };

    handle.shutdown().await?;
    manager.close().await?;
    Ok(code)
}

/// Submits one question and prints the finished session.
async fn ask(handle: &SessionHandle, output: &SessionOutput, question: Question) -> anyhow::Result<ExitCode> {
    let id = handle.submit(question).await?;
    let snapshot = handle.wait_for_terminal(id).await?;
    println!("{}", output.format(&snapshot));

    Ok(if snapshot.phase == Phase::Failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Reads questions from stdin, one per line.
///
/// `\refresh` rebuilds the schema snapshot and `\quit` exits.
async fn interactive(handle: &SessionHandle, output: &SessionOutput) -> anyhow::Result<ExitCode> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => continue,
            "\\quit" | "\\q" => break,
            "\\refresh" => {
                match handle.refresh_schema().await {
                    Ok(schema) => println!("{}", refresh_summary(&schema)),
                    Err(e) => eprintln!("Error: {e}"),
                }
            }
            _ if line.starts_with('\\') => {
                eprintln!("Unknown command: {line}. Use \\refresh or \\quit.");
            }
            question => {
                ask(handle, output, Question::text(question)).await?;
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
