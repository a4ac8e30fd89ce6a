//! teachbot - a question/answer bot you teach as you go
//!
//! # Usage
//!
//! ```bash
//! # Serve the chat page and JSON API
//! teachbot serve --addr 127.0.0.1:5000
//!
//! # One-off use from the shell
//! teachbot teach "What is your name?" "teachbot"
//! teachbot ask "what's your name"
//!
//! # Validate config and knowledge base
//! teachbot --config teachbot.toml check
//! ```
//!
//! # Environment Variables
//!
//! - `TEACHBOT_CONFIG`: Path to the TOML config file
//! - `TEACHBOT_SERVER_ADDR`: Override the server bind address
//! - `TEACHBOT_CORS_ORIGINS`: Comma-separated list of allowed origins
//! - `RUST_LOG`: Logging level (default: info)

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use teachbot::api::{create_app, ApiState};
use teachbot::config::{defaults, BotConfig};
use teachbot::engine::{AnswerResult, Engine};
use teachbot::storage::{
    run_store_watcher, InMemoryBackend, JsonFileBackend, KnowledgeStore, PersistenceLayer,
    ProcessLock, StoreEvent,
};

// ============================================================================
// CLI
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "teachbot")]
#[command(about = "A question/answer bot that learns from its users")]
#[command(version)]
struct CliArgs {
    /// Path to a TOML config file (default: $TEACHBOT_CONFIG, then ./teachbot.toml)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: SubCommand,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Run the HTTP server
    Serve {
        /// Override the server address from config
        #[arg(short, long, value_name = "HOST:PORT", env = defaults::SERVER_ADDR_ENV_VAR)]
        addr: Option<String>,

        /// Keep taught answers in memory only; the knowledge base file is read
        /// once at startup and never written
        #[arg(long)]
        ephemeral: bool,
    },

    /// Answer a single question and exit
    Ask {
        question: String,
    },

    /// Teach a question/answer pair and exit
    Teach {
        question: String,
        answer: String,
    },

    /// Validate config and knowledge base, then exit
    Check {
        /// Also print the effective configuration as TOML
        #[arg(long)]
        print_config: bool,
    },
}

/// Identifies each supervised task for logging.
#[derive(Debug, Clone, Copy)]
enum TaskName {
    HttpServer,
    StoreWatcher,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::HttpServer => write!(f, "HttpServer"),
            TaskName::StoreWatcher => write!(f, "StoreWatcher"),
        }
    }
}

// ============================================================================
// Setup
// ============================================================================

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

/// `--config` must load; otherwise fall back through the usual search order.
fn load_config(explicit: Option<&Path>) -> Result<BotConfig> {
    match explicit {
        Some(path) => BotConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(BotConfig::load()),
    }
}

fn open_store(config: &BotConfig, ephemeral: bool) -> Result<KnowledgeStore> {
    let path = &config.store.path;
    if ephemeral {
        let seed = JsonFileBackend::new(path)
            .read()
            .with_context(|| format!("Failed to read knowledge base {}", path.display()))?
            .unwrap_or_default();
        info!(entries = seed.len(), "Ephemeral mode: taught answers will not be saved");
        return KnowledgeStore::open(Box::new(InMemoryBackend::with_contents(seed)))
            .context("Failed to open in-memory store");
    }

    KnowledgeStore::open_file(path)
        .with_context(|| format!("Failed to open knowledge base {}", path.display()))
}

// ============================================================================
// Serve
// ============================================================================

/// Spawn the HTTP server task into the JoinSet.
fn spawn_http_server(
    task_set: &mut JoinSet<Result<TaskName>>,
    listener: tokio::net::TcpListener,
    app: axum::Router,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        info!("[HttpServer] Task starting");

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                info!("[HttpServer] Received shutdown signal");
            })
            .await;

        match result {
            Ok(()) => {
                info!("[HttpServer] Graceful shutdown complete");
                Ok(TaskName::HttpServer)
            }
            Err(e) => {
                error!("[HttpServer] Server error: {}", e);
                Err(anyhow::anyhow!("HTTP server error: {}", e))
            }
        }
    });
}

/// Spawn the knowledge base file watcher plus a task that logs its events.
fn spawn_store_watcher(
    task_set: &mut JoinSet<Result<TaskName>>,
    store: Arc<KnowledgeStore>,
    path: PathBuf,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    let (tx, mut rx) = mpsc::channel::<StoreEvent>(8);

    task_set.spawn(async move {
        info!("[StoreWatcher] Task starting");
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("[StoreWatcher] Received shutdown signal");
            }
            _ = run_store_watcher(store, path, interval, tx) => {}
        }
        Ok(TaskName::StoreWatcher)
    });

    // Ends when the watcher drops its sender
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                StoreEvent::Reloaded { entries, answers } => {
                    info!(entries, answers, "🔄 Knowledge base reloaded from disk");
                }
                StoreEvent::Error(e) => {
                    warn!(error = %e, "Knowledge base change ignored");
                }
            }
        }
    });
}

/// Monitor spawned tasks until shutdown or the first failure.
async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    cancel_token: CancellationToken,
) -> Result<()> {
    info!("🔒 Supervisor: All tasks spawned, monitoring...");

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("🛑 Supervisor: Shutdown signal received");
                break;
            }
            result = task_set.join_next() => {
                match result {
                    Some(Ok(Ok(task_name))) => {
                        info!("🔒 Supervisor: Task {} completed normally", task_name);
                    }
                    Some(Ok(Err(e))) => {
                        error!("🔒 Supervisor: Task failed with error: {}", e);
                        cancel_token.cancel();
                        return Err(e);
                    }
                    Some(Err(e)) => {
                        error!("🔒 Supervisor: Task panicked: {}", e);
                        cancel_token.cancel();
                        return Err(anyhow::anyhow!("Task panicked: {}", e));
                    }
                    None => {
                        info!("🔒 Supervisor: All tasks completed");
                        break;
                    }
                }
            }
        }
    }

    // Let the server finish in-flight requests
    while let Some(result) = task_set.join_next().await {
        if let Ok(Ok(task_name)) = result {
            info!("🔒 Supervisor: Task {} stopped", task_name);
        }
    }

    Ok(())
}

async fn run_serve(config: BotConfig, addr: Option<String>, ephemeral: bool) -> Result<()> {
    let server_addr = addr.unwrap_or_else(|| config.server.addr.clone());

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  teachbot");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let _process_lock = if ephemeral {
        None
    } else {
        Some(ProcessLock::for_knowledge_base(&config.store.path)?)
    };

    let store = Arc::new(open_store(&config, ephemeral)?);
    let engine = Arc::new(Engine::with_store(&config, Arc::clone(&store)));
    info!(
        "✓ Knowledge base: {} entries ({} backend, {} matching)",
        store.snapshot().len(),
        engine.backend_name(),
        engine.strategy_name()
    );

    let app = create_app(ApiState::new(engine));
    let listener = tokio::net::TcpListener::bind(&server_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", server_addr))?;

    info!("✓ HTTP server listening on {}", server_addr);
    info!("🎯 Chat available at: http://{}", server_addr);

    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();
    spawn_http_server(&mut task_set, listener, app, cancel_token.clone());

    if config.store.watch && !ephemeral {
        spawn_store_watcher(
            &mut task_set,
            store,
            config.store.path.clone(),
            Duration::from_secs(config.store.watch_interval_secs),
            cancel_token.clone(),
        );
    }

    run_supervisor(&mut task_set, cancel_token).await?;

    info!("✓ teachbot shutdown complete");
    Ok(())
}

// ============================================================================
// One-shot Commands
// ============================================================================

fn run_ask(config: &BotConfig, question: &str) -> Result<()> {
    let store = Arc::new(open_store(config, false)?);
    let engine = Engine::with_store(config, store);

    let result = engine.query(question).context("Cannot answer")?;
    if let AnswerResult::Answered {
        matched_question,
        score,
        ..
    } = &result
    {
        info!(matched = %matched_question, score, "Matched known question");
    }
    println!("{}", result.response());
    Ok(())
}

fn run_teach(config: &BotConfig, question: &str, answer: &str) -> Result<()> {
    let _process_lock = ProcessLock::for_knowledge_base(&config.store.path)?;
    let store = Arc::new(open_store(config, false)?);
    let engine = Engine::with_store(config, store);

    let result = engine.teach(question, answer).context("Cannot teach")?;
    println!("{}", result.message);
    Ok(())
}

fn run_check(config: &BotConfig, print_config: bool) -> Result<()> {
    if print_config {
        print!("{}", config.to_toml()?);
    }

    let kb = JsonFileBackend::new(&config.store.path)
        .read()
        .with_context(|| format!("Knowledge base {} failed to load", config.store.path.display()))?;

    match kb {
        Some(kb) => println!(
            "✓ {}: {} entries, {} answers",
            config.store.path.display(),
            kb.len(),
            kb.answer_count()
        ),
        None => println!(
            "✓ {}: not created yet (0 entries)",
            config.store.path.display()
        ),
    }
    println!("✓ Config valid ({} matching)", config.matcher.strategy);
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_json);

    let config = load_config(args.config.as_deref())?;

    match args.command {
        SubCommand::Serve { addr, ephemeral } => run_serve(config, addr, ephemeral).await,
        SubCommand::Ask { question } => run_ask(&config, &question),
        SubCommand::Teach { question, answer } => run_teach(&config, &question, &answer),
        SubCommand::Check { print_config } => run_check(&config, print_config),
    }
}
