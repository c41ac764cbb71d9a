//! Preview CLI
//!
//! Runs a component artifact through the preview pipeline and prints the
//! rendered HTML.
//!
//! # Usage
//! ```bash
//! preview card.js                          # render component code
//! preview artifact.json                    # render {"code", "stylesheet"}
//! preview reply.txt --raw --prompt "a card"  # validate a raw model reply first
//! preview --generate --prompt "a counter" --click 1 --click 1
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use preview_native::{
    validate_response, ArtifactStore, ChatCompletionsClient, ComponentArtifact, EventPayload,
    FileArtifactStore, Identity, MemoryArtifactStore, PreviewConfig, PreviewPipeline, RenderOutcome,
    Session,
};

/// Render generated UI components inside the preview sandbox
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Component code (.js), artifact (.json) or raw model reply (with --raw)
    input: Option<PathBuf>,

    /// Prompt the component was generated for (names the fallback)
    #[arg(short, long)]
    prompt: Option<String>,

    /// Treat the input as an unvalidated model reply
    #[arg(long)]
    raw: bool,

    /// Ask the configured generation endpoint for a component
    #[arg(short, long)]
    generate: bool,

    /// Session id used with --generate
    #[arg(long, default_value = "cli")]
    session: String,

    /// Directory for persisted session artifacts
    #[arg(long)]
    store: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dispatch a click on this node id after rendering (repeatable)
    #[arg(long = "click", value_name = "NODE_ID")]
    clicks: Vec<u32>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(args.verbose)
        .with_writer(std::io::stderr)
        .init();

    let config = match &args.config {
        Some(path) => PreviewConfig::load(path)?,
        None => PreviewConfig::default(),
    };
    let pipeline = PreviewPipeline::new(config);

    if args.generate {
        return run_session(&args, pipeline).await;
    }

    let input = args
        .input
        .as_deref()
        .ok_or("an input file is required unless --generate is given")?;
    let artifact = read_artifact(input, args.raw, args.prompt.as_deref().unwrap_or(""))?;

    let mut outcome = pipeline.load(&artifact);
    if let Some(handle) = outcome.handle_mut() {
        for node in &args.clicks {
            if let Err(failure) = handle.dispatch(*node, "click", EventPayload::default()) {
                eprintln!("{}", failure);
            }
        }
    }
    report(&outcome)
}

async fn run_session(args: &Args, pipeline: PreviewPipeline) -> Result<(), Box<dyn std::error::Error>> {
    let prompt = args
        .prompt
        .as_deref()
        .ok_or("--prompt is required with --generate")?;
    let client = ChatCompletionsClient::new(pipeline.config().generation.clone())?;
    let store: Arc<dyn ArtifactStore> = match &args.store {
        Some(dir) => Arc::new(FileArtifactStore::open(dir)?),
        None => Arc::new(MemoryArtifactStore::new()),
    };

    let mut session = Session::new(args.session.clone(), Identity::authorized("cli"), pipeline, store);
    session.submit(&client, prompt).await?;
    if let Some(failure) = session.last_failure() {
        eprintln!("Generated component rejected: {}", failure.message);
        eprintln!("{}", serde_json::to_string_pretty(&failure.diagnostics)?);
    }
    for node in &args.clicks {
        if let Err(failure) = session.dispatch(*node, "click", EventPayload::default()) {
            eprintln!("{}", failure);
        }
    }
    report(session.outcome())
}

fn read_artifact(path: &Path, raw: bool, prompt: &str) -> Result<ComponentArtifact, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)?;
    if raw {
        let response = validate_response(&text, prompt);
        if let Some(reason) = &response.fallback {
            eprintln!("Reply rejected ({}), using fallback component", reason);
        }
        return Ok(response.artifact);
    }
    if path.extension().is_some_and(|ext| ext == "json") {
        return Ok(serde_json::from_str(&text)?);
    }
    Ok(ComponentArtifact::from_code(text))
}

fn report(outcome: &RenderOutcome) -> Result<(), Box<dyn std::error::Error>> {
    match outcome {
        RenderOutcome::Loaded(handle) => {
            if let Some(failure) = handle.failure() {
                eprintln!("{}", failure);
            }
            println!("{}", handle.to_html());
            Ok(())
        }
        RenderOutcome::Error { message, diagnostics } => {
            eprintln!("{}", serde_json::to_string_pretty(diagnostics)?);
            Err(message.clone().into())
        }
        RenderOutcome::Idle | RenderOutcome::Loading => Err("nothing was rendered".into()),
    }
}
