//! Advisory pipeline CLI
//!
//! Runs the pipeline against a local store, and feeds or inspects that store.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use advisory_pipeline::{
    error::{AppError, Result},
    models::{Advisory, AnalysisStage, Config},
    pipeline::Coordinator,
    services::AnalyzerSet,
    storage::{AdvisoryStore, LocalStorage},
    utils::log as report,
};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

/// Advisory pipeline - monitor, analyze and store travel advisories
#[derive(Parser, Debug)]
#[command(name = "advisory", version, about = "Travel advisory analysis pipeline")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "storage/config.toml")]
    config: PathBuf,

    /// Override the storage directory from the config
    #[arg(short, long)]
    storage_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the pipeline until `q` is entered or the duration elapses
    Run {
        /// Seconds between status reports
        #[arg(long, default_value_t = 10)]
        status_every: u64,

        /// Stop after this many seconds
        #[arg(long = "for")]
        duration: Option<u64>,
    },

    /// Add or edit an advisory in the store
    Ingest {
        id: String,
        text: String,

        /// Arrival time (RFC 3339), defaults to now
        #[arg(long)]
        at: Option<String>,
    },

    /// Show an advisory and its stored analysis
    Show { id: String },

    /// Show store contents and configuration
    Info,

    /// Validate configuration and analyzer rules
    Validate,
}

/// Initialize logging with the configured level, or debug when verbose.
fn init_logging(level: &str, verbose: bool) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Runtime for one-shot store commands.
fn block_on<F: std::future::Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(future))
}

fn parse_arrival(at: Option<&str>) -> Result<DateTime<Utc>> {
    match at {
        None => Ok(Utc::now()),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| AppError::validation(format!("invalid --at '{raw}': {e}"))),
    }
}

/// Lines read from stdin, forwarded until EOF.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn run(config: &Config, status_every: u64, duration: Option<u64>) -> Result<()> {
    let mut coordinator = Coordinator::from_config(config)?;
    coordinator.start()?;
    report::header("Pipeline running (enter 'q' to stop)");

    let deadline = duration.map(|secs| Instant::now() + Duration::from_secs(secs));
    let tick = Duration::from_secs(status_every.max(1));
    let input = spawn_stdin_reader();

    loop {
        let wait = match deadline {
            Some(deadline) => tick.min(deadline.saturating_duration_since(Instant::now())),
            None => tick,
        };

        match input.recv_timeout(wait) {
            Ok(line) if line.trim().eq_ignore_ascii_case("q") => break,
            Ok(_) => {}
            Err(mpsc::RecvTimeoutError::Timeout) => report::status(&coordinator.get_status()),
            // stdin closed: keep running until the deadline or forever.
            Err(mpsc::RecvTimeoutError::Disconnected) => match deadline {
                Some(deadline) => {
                    thread::sleep(deadline.saturating_duration_since(Instant::now()).min(tick));
                }
                None => {
                    thread::sleep(tick);
                    report::status(&coordinator.get_status());
                }
            },
        }

        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
    }

    coordinator.stop();
    match coordinator.wait() {
        Some(status) => report::status(&status),
        None => log::warn!("Pipeline worker did not report a final status"),
    }
    Ok(())
}

/// Main entry point for the CLI application.
fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load_or_default(&cli.config);
    if let Some(dir) = &cli.storage_dir {
        config.storage.root_dir = dir.display().to_string();
    }
    init_logging(&config.logging.level, cli.verbose);

    let storage = LocalStorage::new(&config.storage.root_dir);

    match cli.command {
        Command::Run {
            status_every,
            duration,
        } => run(&config, status_every, duration)?,

        Command::Ingest { id, text, at } => {
            let arrival = parse_arrival(at.as_deref())?;
            block_on(storage.put_item(Advisory::new(id.as_str(), text, arrival)))??;
            log::info!("Stored advisory {}", id);
        }

        Command::Show { id } => {
            block_on(async {
                let Some(text) = storage.item_text(&id).await? else {
                    log::warn!("No advisory with id {}", id);
                    return Ok(());
                };
                report::header(&format!("Advisory {id}"));
                log::info!("{}", text);
                report::separator();
                for stage in AnalysisStage::ALL {
                    match storage.result(stage, &id).await? {
                        Some(record) => report::record(&record),
                        None => log::info!("[{}] not analyzed", stage),
                    }
                }
                Ok::<_, AppError>(())
            })??;
        }

        Command::Info => {
            block_on(async {
                let items = storage.items().await?;
                let intelligence = storage.result_records(AnalysisStage::Intelligence).await?;
                let compliance = storage.result_records(AnalysisStage::Compliance).await?;
                let complete = intelligence
                    .iter()
                    .filter(|r| compliance.iter().any(|c| c.item_id == r.item_id))
                    .count();

                report::summary(
                    "Store",
                    &[
                        ("root", storage.root_dir().display().to_string()),
                        ("advisories", items.len().to_string()),
                        ("intelligence results", intelligence.len().to_string()),
                        ("compliance results", compliance.len().to_string()),
                        ("fully analyzed", complete.to_string()),
                    ],
                );
                Ok::<_, AppError>(())
            })??;

            let pipeline = &config.pipeline;
            report::summary(
                "Pipeline",
                &[
                    ("poll interval", format!("{} ms", pipeline.poll_interval_ms)),
                    ("batch size", pipeline.batch_size.to_string()),
                    ("max queue size", pipeline.max_queue_size.to_string()),
                    ("max retries", pipeline.max_retries.to_string()),
                ],
            );
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            AnalyzerSet::from_config(&config.analyzers)?;
            log::info!("✓ Config OK (pipeline, storage, analyzer rules)");
        }
    }

    Ok(())
}
