//! mqtt2jsonl CLI

use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mqtt2jsonl::config::Config;
use mqtt2jsonl::network::{ConnectionManager, MqttTransport};
use mqtt2jsonl::recording::Recorder;
use mqtt2jsonl::replay::{DelayPolicy, Replayer};
use mqtt2jsonl::{Mqtt2JsonlError, Result};

/// Either record or replay MQTT via a JSONL file
#[derive(Parser, Debug)]
#[command(name = "mqtt2jsonl")]
#[command(version)]
struct Args {
    /// Command to perform against the MQTT topic queue, 'record' or 'replay'
    command: String,

    /// Increase level of logging from WARNING to INFO
    #[arg(short, long)]
    verbose: bool,

    /// Force overwrite when destination file already exists
    #[arg(short, long)]
    force: bool,

    /// JSONL file to read from or write to
    #[arg(short, long)]
    jsonl: Option<PathBuf>,

    /// MQTT server name/ip to connect to [default: localhost]
    #[arg(short, long)]
    server: Option<String>,

    /// MQTT port to connect to [default: 1883]
    #[arg(short, long)]
    port: Option<u16>,

    /// MQTT topic to record, usual wildcards apply [default: #]
    #[arg(short, long)]
    topic: Option<String>,

    /// For replay, use this delay between messages in msecs instead of the recorded one.
    /// 0 replays with no delay at all; omit the option to keep the recorded timing
    #[arg(short, long, allow_negative_numbers = true)]
    delay: Option<i64>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose);
    info!("Started");

    let outcome = tokio::select! {
        result = run(args) => result,
        () = shutdown_signal() => {
            info!("You pressed Ctrl+C!");
            Ok(())
        }
    };

    if let Err(e) = outcome {
        eprintln!("{}", e.diagnostic());
        process::exit(e.exit_code());
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(server) = args.server {
        config.broker.host = server;
    }
    if let Some(port) = args.port {
        config.broker.port = port;
    }
    config.validate()?;

    let delay = args
        .delay
        .map(|d| {
            u64::try_from(d).map_err(|_| {
                Mqtt2JsonlError::InvalidArgument("delay cannot be less than zero".to_string())
            })
        })
        .transpose()?;

    let jsonl = args
        .jsonl
        .filter(|path| !path.as_os_str().is_empty())
        .ok_or_else(|| {
            Mqtt2JsonlError::InvalidArgument("jsonl parameter must be provided".to_string())
        })?;

    let transport = MqttTransport::new(config.broker.client_id());
    let mut manager = ConnectionManager::new(transport, config.broker.endpoint())
        .with_backoff(config.backoff.policy());

    match args.command.to_lowercase().as_str() {
        "record" => {
            let topic = args.topic.unwrap_or(config.recording.topic);
            let mut recorder = Recorder::new(jsonl, &topic, args.force)?;

            println!("Ready to record, press CTRL+C when you want to stop");
            recorder.run(&mut manager).await?;
        }
        "replay" => {
            let replayer = Replayer::open(&jsonl, DelayPolicy::from_override_ms(delay))?;

            println!("Replaying with {}", replayer.policy());
            let summary = replayer.run(&mut manager).await?;
            if summary.dropped > 0 {
                eprintln!(
                    "Warning: {} message(s) dropped, could not reach {}",
                    summary.dropped,
                    config.broker.endpoint()
                );
            }
        }
        other => {
            return Err(Mqtt2JsonlError::Other(format!(
                "Unknown command {other}, use record or replay"
            )));
        }
    }

    Ok(())
}

/// Log level from `-v` or `LOGLEVEL`, defaulting to warnings only
fn init_logging(verbose: bool) {
    let level = if verbose {
        "info".to_string()
    } else {
        std::env::var("LOGLEVEL").map_or_else(|_| "warn".to_string(), |l| normalize_level(&l))
    };

    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Accept Python-style level names alongside `tracing` directives
fn normalize_level(level: &str) -> String {
    let level = level.trim();
    match level.to_ascii_uppercase().as_str() {
        "WARNING" => "warn".to_string(),
        "CRITICAL" | "FATAL" => "error".to_string(),
        "NOTSET" => "trace".to_string(),
        _ => level.to_ascii_lowercase(),
    }
}

/// Resolves on SIGINT or SIGHUP
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let hangup = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGHUP: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let hangup = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => {}
        () = hangup => {}
    }
}
