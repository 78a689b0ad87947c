use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use compass_core::capability::search::{DuckDuckGoSearch, SearchProvider};
use compass_core::cognition::{Orchestrator, Reasoner};
use compass_core::config::CompassCfg;
use compass_core::io::input::{self, InputSender, UserInput};
use compass_core::io::output::{self, OutputReceiver};
use compass_core::memory::{FileIndex, SemanticMemory, VectorIndex};
use compass_core::memory::db::PgIndex;
use compass_core::profile::{FactStore, ProfileBackend};
use compass_core::profile::db::PgProfile;
use compass_core::profile::file::FileProfile;
use compass_core::runtime::{Session, ShutdownGuard};
use compass_llm::provider::LlmProvider;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DB_CONNECT_TIMEOUT_SECS: u64 = 3;
const DEFAULT_PROFILE_PATH: &str = "user_profile.json";
const DEFAULT_MEMORY_FILE: &str = "compass_memory.jsonl";
const DEFAULT_LOG_PATH: &str = "/tmp/compass.log";
const HELP: &str = "Commands: /upload <path>  /plan <skill> [hours per day]  /q";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Log to a file so the prompt stays readable.
    if std::env::var("RUST_LOG").is_ok() {
        let path = std::env::var("COMPASS_LOG_FILE").unwrap_or_else(|_| DEFAULT_LOG_PATH.into());
        let file = std::fs::File::create(&path).with_context(|| format!("creating log file {path}"))?;
        tracing_subscriber::registry()
            .with(EnvFilter::from_default_env())
            .with(fmt::layer().json().with_target(true).with_writer(file))
            .init();
    }

    let mut startup_notice: Option<String> = None;
    let pool = match std::env::var("DATABASE_URL") {
        Ok(url) => {
            let mut fallback = |reason: String| {
                startup_notice = Some(format!(
                    "Note: {reason}; profile and memory are kept in local files instead."
                ));
            };
            match tokio::time::timeout(
                Duration::from_secs(DB_CONNECT_TIMEOUT_SECS),
                sqlx::postgres::PgPoolOptions::new()
                    .max_connections(8)
                    .connect(&url),
            )
            .await
            {
                Ok(Ok(pool)) => match sqlx::migrate!("../../migrations").run(&pool).await {
                    Ok(()) => {
                        tracing::info!("database connected and migrations applied");
                        Some(pool)
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "database migration failed, using local storage");
                        fallback("database migration failed".into());
                        None
                    }
                },
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "database connection failed, using local storage");
                    fallback("could not connect to DATABASE_URL".into());
                    None
                }
                Err(_) => {
                    tracing::warn!(timeout_secs = DB_CONNECT_TIMEOUT_SECS, "database connection timed out");
                    fallback(format!("database connection timed out ({DB_CONNECT_TIMEOUT_SECS}s)"));
                    None
                }
            }
        }
        Err(_) => None,
    };

    let cfg = match &pool {
        Some(pool) => CompassCfg::load(pool).await?,
        None => CompassCfg::default(),
    };
    let cfg = Arc::new(cfg);

    let (profile, index): (Arc<dyn ProfileBackend>, Arc<dyn VectorIndex>) = match &pool {
        Some(pool) => (Arc::new(PgProfile::new(pool.clone())), Arc::new(PgIndex::new(pool.clone()))),
        None => {
            let profile_path =
                PathBuf::from(std::env::var("COMPASS_PROFILE_PATH").unwrap_or_else(|_| DEFAULT_PROFILE_PATH.into()));
            // memory lives next to the profile unless placed explicitly
            let memory_path = std::env::var("COMPASS_MEMORY_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| profile_path.with_file_name(DEFAULT_MEMORY_FILE));
            tracing::info!(
                profile = %profile_path.display(),
                memory = %memory_path.display(),
                "using file storage"
            );
            (Arc::new(FileProfile::new(profile_path)), Arc::new(FileIndex::new(memory_path)))
        }
    };

    let Some(provider) = compass_llm::http::from_env() else {
        anyhow::bail!("no reasoning backend configured: set COMPASS_LLM_MODEL (and COMPASS_LLM_API_KEY for hosted models)");
    };
    let provider: Arc<dyn LlmProvider> = Arc::new(provider);
    let search: Arc<dyn SearchProvider> =
        Arc::new(DuckDuckGoSearch::new(cfg.search_result_limit, cfg.call_timeout_secs)?);

    let reasoner = Reasoner::new(provider, &cfg);
    let facts = Arc::new(FactStore::open(profile));
    let memory = Arc::new(SemanticMemory::open(index));
    let orchestrator = Arc::new(Orchestrator::new(reasoner, facts, memory, search, cfg));

    let shutdown = ShutdownGuard::new();
    shutdown.spawn_signal_listener();
    let (input_tx, input_rx) = input::channel(16);
    let (output_tx, output_rx) = output::channel(64);
    let session = tokio::spawn(Session::new(orchestrator, input_rx, output_tx, shutdown.clone()).run());

    let result = run_repl(input_tx, output_rx, shutdown.token(), startup_notice).await;
    shutdown.trigger();
    if let Err(e) = session.await {
        tracing::warn!(error = %e, "session task failed");
    }
    result
}

async fn run_repl(
    input_tx: InputSender,
    mut output_rx: OutputReceiver,
    token: CancellationToken,
    startup_notice: Option<String>,
) -> anyhow::Result<()> {
    const SPINNER: [&str; 4] = ["-", "\\", "|", "/"];

    if let Some(notice) = startup_notice {
        println!("{notice}");
    }
    println!("Career Compass. {HELP}");

    let (line_tx, mut line_rx) = mpsc::unbounded_channel::<InputEvent>();
    let (ready_tx, ready_rx) = std::sync::mpsc::channel::<()>();
    spawn_input_thread(line_tx, ready_rx);
    request_next_prompt(&ready_tx);

    let mut waiting_for_reply = false;
    let mut spinner_label = String::from("thinking...");
    let mut spinner_idx: usize = 0;
    let mut spinner_interval = tokio::time::interval(Duration::from_millis(100));
    spinner_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = spinner_interval.tick(), if waiting_for_reply => {
                spinner_idx = (spinner_idx + 1) % SPINNER.len();
                draw_spinner(&spinner_label, SPINNER[spinner_idx])?;
            }
            line = line_rx.recv() => {
                let Some(line) = line else { break };
                match line {
                    InputEvent::Line(line) => {
                        let text = line.trim();
                        let input = match parse_command(text) {
                            Command::Empty => {
                                request_next_prompt(&ready_tx);
                                continue;
                            }
                            Command::Quit => break,
                            Command::Reply(msg) => {
                                println!("{msg}");
                                request_next_prompt(&ready_tx);
                                continue;
                            }
                            Command::Submit(input) => input,
                        };
                        if input_tx.send(input).await.is_err() {
                            break;
                        }
                        spinner_label = "thinking...".into();
                        spinner_idx = 0;
                        draw_spinner(&spinner_label, SPINNER[spinner_idx])?;
                        waiting_for_reply = true;
                    }
                    InputEvent::Interrupted | InputEvent::Eof => break,
                    InputEvent::Error(err) => {
                        eprintln!("input error: {err}");
                        break;
                    }
                }
            }
            msg = output_rx.recv() => {
                let Some(msg) = msg else { break };
                if msg.is_status() {
                    spinner_label = msg.content;
                    if waiting_for_reply {
                        draw_spinner(&spinner_label, SPINNER[spinner_idx])?;
                    }
                } else {
                    if waiting_for_reply {
                        waiting_for_reply = false;
                        clear_current_line()?;
                    }
                    println!("Compass> {}\n", msg.content);
                    request_next_prompt(&ready_tx);
                }
            }
        }
    }
    drop(ready_tx);

    if waiting_for_reply {
        clear_current_line()?;
    }
    println!();
    Ok(())
}

enum Command {
    Empty,
    Quit,
    /// Answered locally without a turn.
    Reply(String),
    Submit(UserInput),
}

fn parse_command(text: &str) -> Command {
    if text.is_empty() {
        return Command::Empty;
    }
    if matches!(text, "/q" | "/exit" | "/quit") {
        return Command::Quit;
    }
    if text == "/help" {
        return Command::Reply(HELP.into());
    }
    if let Some(path) = text.strip_prefix("/upload") {
        let path = path.trim();
        if path.is_empty() {
            return Command::Reply("Usage: /upload <path>".into());
        }
        return match read_document(Path::new(path)) {
            Ok((name, text)) => Command::Submit(UserInput::Upload { name, text }),
            Err(e) => Command::Reply(format!("Could not read {path}: {e:#}")),
        };
    }
    if let Some(args) = text.strip_prefix("/plan") {
        return match input::parse_plan_args(args) {
            Some(plan) => Command::Submit(plan),
            None => Command::Reply("Usage: /plan <skill> [hours per day]".into()),
        };
    }
    Command::Submit(UserInput::Text(text.to_owned()))
}

/// Plain-text documents only; binary formats are extracted before upload.
fn read_document(path: &Path) -> anyhow::Result<(String, String)> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok((name, text))
}

fn draw_spinner(label: &str, frame: &str) -> anyhow::Result<()> {
    print!("\r\x1b[2K{label} {frame}");
    io::stdout().flush()?;
    Ok(())
}

fn clear_current_line() -> anyhow::Result<()> {
    print!("\r\x1b[2K");
    io::stdout().flush()?;
    Ok(())
}

fn request_next_prompt(ready_tx: &std::sync::mpsc::Sender<()>) {
    let _ = ready_tx.send(());
}

fn spawn_input_thread(
    line_tx: mpsc::UnboundedSender<InputEvent>,
    ready_rx: std::sync::mpsc::Receiver<()>,
) {
    std::thread::spawn(move || {
        let mut editor = match rustyline::DefaultEditor::new() {
            Ok(editor) => editor,
            Err(e) => {
                let _ = line_tx.send(InputEvent::Error(e.to_string()));
                return;
            }
        };

        while ready_rx.recv().is_ok() {
            let event = match editor.readline("You> ") {
                Ok(line) => {
                    let _ = editor.add_history_entry(line.as_str());
                    InputEvent::Line(line)
                }
                Err(ReadlineError::Interrupted) => InputEvent::Interrupted,
                Err(ReadlineError::Eof) => InputEvent::Eof,
                Err(e) => InputEvent::Error(e.to_string()),
            };
            let stop = !matches!(event, InputEvent::Line(_));
            if line_tx.send(event).is_err() || stop {
                break;
            }
        }
    });
}

enum InputEvent {
    Line(String),
    Interrupted,
    Eof,
    Error(String),
}
