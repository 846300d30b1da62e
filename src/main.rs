use anyhow::{anyhow, ensure, Context, Result};
use clap::{Parser, Subcommand};
use probe_map::command::{Session, WALKTHROUGH};
use probe_map::{counter, EventIngest, MapConfig, ProbeEvent, TraceMap};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "probe-map",
    about = "Drive a concurrent tracing-counter map",
    version,
    long_about = "Replays the BPF hash map walkthrough, runs command scripts against a map, and stress-tests concurrent counter increments."
)]
struct Cli {
    /// Set the logging level (RUST_LOG overrides)
    #[arg(short, long, value_enum, default_value = "info")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Replay the create/update/lookup/delete/iterate walkthrough
    Walkthrough,

    /// Run commands from a script file, or stdin when no file is given
    Run {
        script: Option<PathBuf>,

        /// JSON file with the initial map configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Increment one counter from many threads through the ingest path
    Stress {
        #[arg(short, long, default_value_t = 4)]
        threads: usize,

        /// Events per thread
        #[arg(short, long, default_value_t = 10_000)]
        events: usize,

        #[arg(short, long, default_value_t = 100)]
        delta: i64,

        /// JSON file with the map configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<Option<MapConfig>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config: MapConfig = serde_json::from_str(&raw)
        .with_context(|| format!("parsing config {}", path.display()))?;
    Ok(Some(config))
}

fn run_script(mut session: Session, script: &str) {
    for (line, result) in session.run_script(script) {
        println!("> {line}");
        match result {
            Ok(outcome) => println!("{outcome}"),
            Err(e) => println!("failed: {e}"),
        }
    }
}

/// Counter value a lossless stress run ends with.
fn expected_total(threads: usize, events: usize, delta: i64) -> Result<i64> {
    let total = threads
        .checked_mul(events)
        .context("threads * events overflows")?;
    Ok(i64::try_from(total)?.wrapping_mul(delta))
}

fn stress(config: MapConfig, threads: usize, events: usize, delta: i64) -> Result<()> {
    let map = Arc::new(TraceMap::new(config)?);
    let key = counter::encode(0, map.key_size());
    let started = Instant::now();
    let reports = std::thread::scope(|s| {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let ingest = EventIngest::new(Arc::clone(&map));
                let key = key.clone();
                s.spawn(move || {
                    ingest.run((0..events).map(|_| ProbeEvent::new(key.clone(), delta)))
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| match h.join() {
                Ok(report) => Ok(report?),
                Err(_) => Err(anyhow!("ingest thread panicked")),
            })
            .collect::<Result<Vec<_>>>()
    })?;
    let dropped: u64 = reports.iter().map(|r| r.dropped).sum();
    let value = map
        .lookup(&key)?
        .map(|v| counter::decode(&v))
        .context("counter missing after stress run")?;
    let expected = expected_total(threads, events, delta)?;
    info!(elapsed = ?started.elapsed(), threads, dropped, "stress finished");
    println!("counter value: {value} (expected {expected})");
    println!("{}", serde_json::to_string_pretty(&map.stats())?);
    ensure!(value == expected, "lost updates: {value} != {expected}");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(cli.log_level.into()).into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Walkthrough => run_script(Session::new(), WALKTHROUGH),
        Commands::Run { script, config } => {
            let text = match script {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("reading script {}", path.display()))?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };
            let session = match load_config(config.as_ref())? {
                Some(config) => Session::with_map(Arc::new(TraceMap::new(config)?)),
                None => Session::new(),
            };
            run_script(session, &text);
        }
        Commands::Stress {
            threads,
            events,
            delta,
            config,
        } => {
            let config = load_config(config.as_ref())?.unwrap_or_default();
            stress(config, threads, events, delta)?
        }
    }

    Ok(())
}
