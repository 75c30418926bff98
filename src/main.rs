//! lamco-dnd-replay - Transfer engine replay tool
//!
//! Feeds a JSON-lines script of host and desktop events through the transfer
//! engine with logging sinks, then prints a summary.

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lamco_dnd_session::config::{Config, LoggingConfig};
use lamco_dnd_session::replay::{parse_script, LoggingRpcSink, LoggingUiSink};
use lamco_dnd_session::session::SessionContext;
use lamco_dnd_session::staging::{block_control_for, StagingManager};
use lamco_dnd_session::DndManager;

/// Command-line arguments for lamco-dnd-replay
#[derive(Parser, Debug)]
#[command(name = "lamco-dnd-replay")]
#[command(version, about = "Replay clipboard and drag-and-drop session events", long_about = None)]
pub struct Args {
    /// Event script (JSON lines)
    pub script: PathBuf,

    /// Configuration file path
    #[arg(short, long, env = "LAMCO_DND_CONFIG")]
    pub config: Option<PathBuf>,

    /// Staging root directory
    #[arg(long, env = "LAMCO_DND_STAGING_ROOT")]
    pub staging_root: Option<PathBuf>,

    /// Do not block staging directories
    #[arg(long)]
    pub no_block: bool,

    /// Encode full paths in guest-native form
    #[arg(long)]
    pub local_full_paths: bool,

    /// Verbose logging (can be specified multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log format (json|pretty|compact)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Write logs to file (in addition to stderr)
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration before logging so [logging] can apply
    let (config, load_error) = match &args.config {
        Some(path) => match Config::load(path) {
            Ok(config) => (config, None),
            Err(e) => (Config::default_config(), Some(e)),
        },
        None => (Config::default_config(), None),
    };

    init_logging(&args, &config.logging)?;

    info!("lamco-dnd-replay v{}", env!("CARGO_PKG_VERSION"));
    if let Some(e) = load_error {
        warn!("Failed to load config: {:#}, using defaults", e);
    }

    // Override config with CLI args
    let config = config.with_overrides(
        args.staging_root.clone(),
        args.no_block,
        args.local_full_paths,
    );
    config.validate()?;
    tracing::debug!("Config: {:?}", config);

    let script = File::open(&args.script)
        .with_context(|| format!("Failed to open script: {}", args.script.display()))?;
    let events = parse_script(BufReader::new(script), config.transfer.local_full_paths)
        .context("Failed to parse script")?;
    info!("Loaded {} events from {}", events.len(), args.script.display());

    let rpc = Arc::new(LoggingRpcSink::new());
    let ui = Arc::new(LoggingUiSink::new());
    let block = block_control_for(config.staging.block_enabled, &config.staging.block_control);
    let staging = StagingManager::new(config.staging.resolved_root(), block);
    let ctx = SessionContext::new(rpc.clone(), ui.clone(), staging, config.transfer.clone());

    let manager = DndManager::new(ctx);
    for event in events {
        manager.send(event).await?;
    }
    let stats = manager.shutdown().await?;

    let summary = serde_json::json!({
        "stats": stats,
        "rpc_commands": rpc
            .sent()
            .iter()
            .map(|(session, name)| format!("{}@{}", name, session))
            .collect::<Vec<_>>(),
        "ui_events": ui
            .events()
            .iter()
            .map(|(role, name)| format!("{:?}:{}", role, name))
            .collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}

fn init_logging(args: &Args, logging: &LoggingConfig) -> Result<()> {
    let log_level = match args.verbose {
        0 => logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let log_format = args.log_format.as_deref().unwrap_or(logging.format.as_str());
    let log_file = args.log_file.as_ref().or(logging.log_file.as_ref());

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "lamco_dnd_session={level},lamco_dnd_replay={level},warn",
            level = log_level
        ))
    });

    // If log file is specified, write to both stdout and file
    if let Some(log_file_path) = log_file {
        let file = File::create(log_file_path)
            .with_context(|| format!("Failed to create log file: {}", log_file_path.display()))?;

        match log_format {
            "json" => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                    .with(
                        tracing_subscriber::fmt::layer()
                            .json()
                            .with_writer(file)
                            .with_ansi(false),
                    )
                    .init();
            }
            "compact" => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
                    .with(
                        tracing_subscriber::fmt::layer()
                            .compact()
                            .with_writer(file)
                            .with_ansi(false),
                    )
                    .init();
            }
            _ => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
                    .with(tracing_subscriber::fmt::layer().with_writer(file).with_ansi(false))
                    .init();
            }
        }
        info!("Logging to file: {}", log_file_path.display());
    } else {
        // Summary goes to stdout, logs to stderr
        match log_format {
            "json" => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                    .init();
            }
            "compact" => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
                    .init();
            }
            _ => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
                    .init();
            }
        }
    }

    Ok(())
}
