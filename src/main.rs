//! lamco-clipd - clipboard history daemon
//!
//! Entry point for the daemon binary.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer, Registry};

use lamco_clip_history::clipboard::MemoryClipboard;
use lamco_clip_history::config::Config;
use lamco_clip_history::server::ClipDaemon;
use lamco_clip_history::utils::format_user_error;

/// Command-line arguments for lamco-clipd
#[derive(Parser, Debug)]
#[command(name = "lamco-clipd")]
#[command(version, about = "Clipboard history daemon", long_about = None)]
pub struct Args {
    /// Configuration file path [default: $XDG_CONFIG_HOME/lamco-clip/config.toml]
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Socket path
    #[arg(short, long, env = "LAMCO_CLIP_SOCKET")]
    pub socket: Option<PathBuf>,

    /// Number of history entries to keep
    #[arg(long)]
    pub capacity: Option<usize>,

    /// Verbose logging (can be specified multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log format (json|pretty|compact)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Write logs to file (in addition to stdout)
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (config, config_warning) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("{}", format_user_error(&e));
            return Err(e);
        }
    };

    let _log_guard = init_logging(&args, &config)?;

    info!("════════════════════════════════════════════════════════");
    info!("  lamco-clipd v{}", env!("CARGO_PKG_VERSION"));
    info!("  Profile: {}", if cfg!(debug_assertions) { "debug" } else { "release" });
    info!("════════════════════════════════════════════════════════");

    if let Some(message) = config_warning {
        warn!("{}", message);
    }
    tracing::debug!("Config: {:?}", config);

    let daemon = match build_daemon(&config) {
        Ok(daemon) => daemon,
        Err(e) => {
            eprintln!("{}", format_user_error(&e));
            return Err(e);
        }
    };

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    if let Err(e) = daemon.run(shutdown).await {
        let e = anyhow::Error::new(e);
        eprintln!("{}", format_user_error(&e));
        return Err(e);
    }

    info!("lamco-clipd shut down");
    Ok(())
}

/// Load and validate configuration; a missing file yields defaults plus a warning
fn load_config(args: &Args) -> Result<(Config, Option<String>)> {
    let path = args.config.clone().or_else(Config::default_path);

    let (config, warning) = match path {
        Some(path) if path.exists() => (Config::load(&path)?, None),
        Some(path) => (
            Config::default(),
            Some(format!(
                "Config file {} not found, using defaults",
                path.display()
            )),
        ),
        None => (
            Config::default(),
            Some("No config directory, using defaults".to_string()),
        ),
    };

    let config = config.with_overrides(args.socket.clone(), args.capacity);
    config
        .validate()
        .context("Invalid configuration after command-line overrides")?;

    Ok((config, warning))
}

fn build_daemon(config: &Config) -> Result<ClipDaemon> {
    match config.capture.backend.as_str() {
        "memory" => {
            let clipboard = Arc::new(MemoryClipboard::new());
            let daemon = ClipDaemon::new(config, clipboard.clone())?;
            // Publishes loop straight back into the capture path
            clipboard.attach_notifier(daemon.notifier());
            Ok(daemon)
        }
        #[cfg(feature = "wayland")]
        "wayland" => {
            use lamco_clip_history::clipboard::WaylandClipboard;
            ClipDaemon::new(config, Arc::new(WaylandClipboard::new()))
        }
        other => anyhow::bail!("Invalid clipboard backend in config: {}", other),
    }
}

fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    let _ = tokio::signal::ctrl_c().await;
                    shutdown.cancel();
                    return;
                }
            };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
            _ = sigterm.recv() => info!("Received SIGTERM"),
        }
        shutdown.cancel();
    });
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn fmt_layer<W>(format: &str, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi);

    match format {
        "json" => layer.json().boxed(),
        "compact" => layer.compact().boxed(),
        _ => layer.pretty().boxed(),
    }
}

fn init_logging(args: &Args, config: &Config) -> Result<Option<WorkerGuard>> {
    let log_level = match args.verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let log_format = args
        .log_format
        .as_deref()
        .unwrap_or(config.logging.format.as_str());

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "lamco_clip_history={level},lamco_clipd={level},warn",
            level = log_level
        ))
    });

    let mut layers = vec![fmt_layer(log_format, std::io::stdout, true)];
    let mut guard = None;

    // If log file is specified, write to both stdout and file
    let log_file = args.log_file.as_ref().or(config.logging.log_file.as_ref());
    if let Some(path) = log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        let (writer, worker) = tracing_appender::non_blocking(file);
        layers.push(fmt_layer(log_format, writer, false));
        guard = Some(worker);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .init();

    if let Some(path) = log_file {
        info!("Logging to file: {}", path.display());
    }

    Ok(guard)
}
