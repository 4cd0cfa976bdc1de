//! Pilot CLI.
//!
//! Wires the real Chromium driver and OpenAI-backed translator through the
//! isolated worker and drives one or more natural-language commands end to
//! end:
//!
//!   $ OPENAI_API_KEY=... cargo run --bin pilot -- \
//!       run --command "Navigate to example.com" \
//!           --command "Click the More information link" \
//!           --headless

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use browser_pilot::chromium::ChromiumLauncher;
use browser_pilot::config::{ConfigOverrides, PilotConfig, Verbosity};
use browser_pilot::engine::ExecutionEngine;
use browser_pilot::interpreter::NlpTranslator;
use browser_pilot::llm::OpenAiChatProvider;
use browser_pilot::logging::PilotLogger;
use browser_pilot::session::BrowserSession;
use browser_pilot::worker::WorkerManager;
use clap::{Args, Parser, Subcommand};
use log::{info, warn};

#[derive(Parser)]
#[command(name = "pilot", author, version, about = "Natural-language browser automation")]
struct Cli {
    /// Increase log verbosity (pass twice for DEBUG).
    #[arg(long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a browser worker, run commands, and stop it.
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Natural-language command to execute; repeatable, run in order.
    #[arg(long = "command", required = true)]
    commands: Vec<String>,

    /// Run the browser headless.
    #[arg(long)]
    headless: bool,

    /// Path to a Chrome/Chromium executable (defaults to discovery).
    #[arg(long)]
    chrome: Option<std::path::PathBuf>,

    /// Override the translation model.
    #[arg(long)]
    model: Option<String>,

    /// Print the worker status after the commands finish.
    #[arg(long)]
    status: bool,

    /// Dump a DOM snapshot after the commands finish.
    #[arg(long)]
    dom_snapshot: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    match cli.command {
        Command::Run(args) => run(args, cli.verbose).await,
    }
}

async fn run(args: RunArgs, verbose: u8) -> Result<()> {
    let config = PilotConfig::from_env()
        .context("failed to load configuration from the environment")?
        .merged(ConfigOverrides {
            headless: Some(args.headless),
            chrome_executable: args.chrome,
            model_name: args.model,
            verbose: match verbose {
                0 => None,
                1 => Some(Verbosity::Medium),
                _ => Some(Verbosity::Detailed),
            },
            ..Default::default()
        });

    if config.model_api_key.is_none() {
        bail!("MODEL_API_KEY or OPENAI_API_KEY must be set for command translation");
    }

    let logger = Arc::new(PilotLogger::new(config.verbose));

    let session = BrowserSession::new(
        ChromiumLauncher::new(Arc::clone(&logger)),
        config.launch_options(),
        Arc::clone(&logger),
    );
    let translator = NlpTranslator::new(
        OpenAiChatProvider::new(config.model_api_key.clone()),
        config.model_name.clone(),
        Arc::clone(&logger),
    );
    let engine = ExecutionEngine::new(translator, Arc::clone(&logger))
        .with_snapshot_staleness(config.snapshot_staleness())
        .with_element_wait_timeout_ms(config.element_wait_timeout_ms);

    let mut manager = WorkerManager::new(Arc::clone(&logger));
    manager
        .start(session, engine, config.worker_timeouts())
        .await
        .context("failed to start the browser worker")?;
    info!("browser worker started");

    let mut failures = 0usize;
    for command in &args.commands {
        info!("executing: {command}");
        let result = manager.execute(command).await;
        if !result.success {
            failures += 1;
        }
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    if args.status {
        let status = manager.get_status().await;
        println!("{}", serde_json::to_string_pretty(&status)?);
    }

    if args.dom_snapshot {
        match manager.dom_snapshot().await {
            Ok(snapshot) => println!("{}", serde_json::to_string_pretty(&snapshot)?),
            Err(err) => warn!("dom snapshot failed: {err}"),
        }
    }

    if let Err(err) = manager.stop().await {
        warn!("worker stop reported: {err}");
    }

    if failures > 0 {
        bail!("{failures} of {} commands failed", args.commands.len());
    }
    Ok(())
}
