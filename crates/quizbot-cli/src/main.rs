//! QuizBot CLI
//!
//! Loads the question bank and serves the Slack webhooks.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use quizbot_core::QuestionBank;
use quizbot_server::{
    create_router, validate_bank, AppState, RecordingResponder, ResponseSender, ServerConfig,
    SlackResponder,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Default port, matching the Slack app manifest.
const DEFAULT_PORT: u16 = 5000;

/// QuizBot - multiple-choice quizzes in Slack
///
/// Serves the `/start_quiz` slash command and the interactivity endpoint.
#[derive(Parser, Debug)]
#[command(name = "quizbot")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: quizbot.json in current directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Path to the question bank (overrides bankPath)
    #[arg(short, long, value_name = "FILE")]
    bank: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Slack signing secret
    #[arg(long, env = "SLACK_SIGNING_SECRET", hide_env_values = true)]
    signing_secret: Option<String>,

    /// Log outgoing messages instead of posting them to Slack
    #[arg(long)]
    dry_run: bool,

    /// Load and validate the configuration and question bank, then exit
    #[arg(long)]
    check: bool,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::debug!(config = ?args.config, bank = ?args.bank, "Starting QuizBot");

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;

    if let Some(bank) = args.bank {
        config.bank_path = bank;
    }

    // Re-validate after overrides
    config.validate()?;

    let bank = QuestionBank::load(&config.bank_path).map_err(|e| anyhow::anyhow!("{e}"))?;
    validate_bank(&bank)?;
    print_summary(&config, &bank);

    if args.check {
        return Ok(());
    }

    let signing_secret = args
        .signing_secret
        .filter(|secret| !secret.trim().is_empty())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "No Slack signing secret configured\n\nSuggestion: Set SLACK_SIGNING_SECRET or pass --signing-secret"
            )
        })?;

    let responder: Arc<dyn ResponseSender> = if args.dry_run {
        tracing::warn!("Dry run: messages for response_url are logged, not sent");
        Arc::new(RecordingResponder::new())
    } else {
        Arc::new(SlackResponder::new(Duration::from_secs(
            config.delivery_timeout_secs,
        ))?)
    };

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address '{}:{}': {e}", args.host, args.port))?;

    let state = AppState::new(config, Arc::new(bank), &signing_secret, responder);
    let router = create_router(state);

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {addr}: {e}\n\nSuggestion: Try a different port with --port"
        )
    })?;

    tracing::info!(%addr, "QuizBot listening");
    println!("QuizBot running on http://{addr}");
    println!("Press Ctrl+C to stop");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("QuizBot stopped");
    Ok(())
}

/// Loads configuration from the given path, or from `quizbot.json` in the
/// current directory.
fn load_config(config_path: Option<&str>) -> anyhow::Result<ServerConfig> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            ServerConfig::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => {
            let current_dir = std::env::current_dir()
                .map_err(|e| anyhow::anyhow!("Cannot determine current directory: {e}"))?;
            ServerConfig::load_from_dir(&current_dir).map_err(|e| anyhow::anyhow!("{e}"))
        }
    }
}

fn print_summary(config: &ServerConfig, bank: &QuestionBank) {
    println!("Question bank: {}", config.bank_path.display());
    for name in bank.set_names() {
        let count = bank.get(name).map_or(0, |set| set.len());
        println!("  {name}: {count} questions");
    }
    println!(
        "Default quiz: {} questions from {}",
        config.default_question_count,
        config.default_exam_set.as_deref().unwrap_or("all exam sets")
    );
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
