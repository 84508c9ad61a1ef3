//! mixlink monitor
//!
//! Connects to a console, binds the configured parameter paths and prints
//! every value and channel-name change decoded from the console's stream.

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::sync::Arc;
use tokio::net::TcpStream;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mixlink::config::{ConsoleConfig, MonitorConfig};
use mixlink::protocol::DEFAULT_TCP_PORT;
use mixlink::session;
use mixlink::{EngineEvent, LoggingRequester, ParameterPath, SubscriptionEngine};

/// Monitor parameter changes of a digital mixing console
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Console host (overrides the configuration file)
    #[arg(long, env = "MIXLINK_HOST")]
    host: Option<String>,

    /// Console TCP port
    #[arg(long)]
    port: Option<u16>,

    /// MIDI channel (1-12) the console's address layout starts at
    #[arg(long)]
    base_channel: Option<u8>,

    /// Parameter path to watch, e.g. input:0:fader (repeatable)
    #[arg(short, long = "watch")]
    watch: Vec<ParameterPath>,

    /// Print events as JSON lines
    #[arg(long)]
    json: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    let config = build_config(&args).await?;
    info!("Starting mixlink monitor for {}", config.address());

    let mut engine = SubscriptionEngine::new(
        config.engine_options(),
        Arc::new(LoggingRequester::new()),
    );

    let json = args.json;
    engine.subscribe(move |event| print_event(event, json));

    for path in &config.subscriptions {
        engine.bind(&format!("watch:{}", path), *path);
    }
    info!("Watching {} parameters", config.subscriptions.len());

    let mut stream = TcpStream::connect(config.address())
        .await
        .with_context(|| format!("Failed to connect to console at {}", config.address()))?;
    info!("Connected to console at {}", config.address());

    tokio::select! {
        result = session::pump(&mut stream, &mut engine) => {
            result?;
        }
        _ = shutdown_signal() => {
            engine.clear();
        }
    }

    info!("mixlink shutdown complete");
    Ok(())
}

/// Merge the configuration file with command line overrides
async fn build_config(args: &Args) -> Result<MonitorConfig> {
    let mut config = match &args.config {
        Some(path) => MonitorConfig::load(path).await?,
        None => MonitorConfig {
            console: ConsoleConfig {
                host: String::new(),
                port: DEFAULT_TCP_PORT,
                base_channel: 1,
            },
            subscriptions: Vec::new(),
        },
    };

    if let Some(host) = &args.host {
        config.console.host = host.clone();
    }
    if let Some(port) = args.port {
        config.console.port = port;
    }
    if let Some(base_channel) = args.base_channel {
        config.console.base_channel = base_channel;
    }
    for path in &args.watch {
        if !config.subscriptions.contains(path) {
            config.subscriptions.push(*path);
        }
    }

    config
        .validate()
        .context("Invalid configuration (use --config or --host)")?;
    Ok(config)
}

fn print_event(event: &EngineEvent, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Failed to serialize event: {}", e),
        }
        return;
    }

    let timestamp = chrono::Local::now().format("%H:%M:%S%.3f");
    match event {
        EngineEvent::ValueChanged { path, display, .. } => {
            println!(
                "[{}] {} = {}",
                timestamp.to_string().dimmed(),
                path.to_string().cyan(),
                display.green()
            );
        }
        EngineEvent::ChannelNameChanged { channel, name } => {
            println!(
                "[{}] {} name = {}",
                timestamp.to_string().dimmed(),
                channel.to_string().cyan(),
                name.yellow()
            );
        }
        EngineEvent::VariablesChanged { variables } => {
            info!("{} active variables", variables.len());
        }
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_writer(std::io::stderr),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
