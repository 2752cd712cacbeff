//! feewatch CLI
//!
//! Command-line interface for the basefee volatility trap.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use feewatch::api::{AppState, HttpServer};
use feewatch::codec;
use feewatch::collector::build_source;
use feewatch::config::{Config, LoggingConfig};
use feewatch::models::Comparator;
use feewatch::relay::{Relay, RelayDispatcher};
use feewatch::scheduler::Scheduler;
use feewatch::trap::{percent_change, Trap, VolatilityTrap};

/// How long shutdown waits for queued alerts to reach the sinks
const DRAIN_GRACE: Duration = Duration::from_secs(10);

/// feewatch - Basefee volatility trap
#[derive(Parser)]
#[command(name = "feewatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "FEEWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (for commands that support it)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler, relay dispatcher and HTTP API
    Serve {
        /// HTTP API port (overrides configuration)
        #[arg(long, env = "FEEWATCH_HTTP_PORT")]
        http_port: Option<u16>,

        /// Do not start the HTTP API
        #[arg(long)]
        no_api: bool,
    },

    /// Take one sample from the configured source
    Collect,

    /// Decide on two samples without touching the network
    Check {
        /// Newest sample
        current: u64,

        /// Sample before it
        previous: u64,

        /// Threshold in whole percent (overrides configuration)
        #[arg(long)]
        threshold: Option<u32>,

        /// Comparator: gt or gte (overrides configuration)
        #[arg(long)]
        comparator: Option<Comparator>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        generate_completions(shell);
        return ExitCode::SUCCESS;
    }

    // Load configuration
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.logging, cli.verbose);

    // Execute command
    let result = match cli.command {
        Commands::Serve { http_port, no_api } => run_serve(config, http_port, no_api).await,
        Commands::Collect => run_collect(&config, cli.format).await,
        Commands::Check {
            current,
            previous,
            threshold,
            comparator,
        } => run_check(&config, current, previous, threshold, comparator, cli.format),
        Commands::Completions { .. } => Ok(()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(config: &LoggingConfig, verbose: bool) {
    let level = if verbose { "debug" } else { config.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if config.format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run_serve(config: Config, http_port: Option<u16>, no_api: bool) -> anyhow::Result<()> {
    if config.metrics.enabled {
        let addr: SocketAddr = format!("{}:{}", config.metrics.host, config.metrics.port)
            .parse()
            .context("invalid metrics listen address")?;
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("failed to install Prometheus exporter")?;
        info!(%addr, "Prometheus exporter listening");
    }

    let source = build_source(&config.source)?;
    let trap: Arc<dyn Trap> = Arc::new(VolatilityTrap::from_config(&config.trap)?);
    let relay = Relay::from_config(&config.relay);

    info!(
        threshold = config.trap.threshold_percent,
        comparator = %config.trap.comparator,
        event = relay.event_name(),
        "Starting feewatch"
    );

    let dispatcher = RelayDispatcher::from_config(&config.relay)?;
    let dispatcher_handle = dispatcher.spawn(relay.subscribe());

    let scheduler = Scheduler::new(&config.scheduler, trap.clone(), source.clone(), relay.clone());

    let http_handle = if config.server.enabled && !no_api {
        let port = http_port.unwrap_or(config.server.port);
        let addr = format!("{}:{}", config.server.host, port);
        let server = HttpServer::new(AppState {
            trap,
            source,
            relay: relay.clone(),
            status: scheduler.status(),
        });
        Some(tokio::spawn(async move {
            if let Err(e) = server.serve(&addr).await {
                warn!(error = %e, "HTTP server stopped");
            }
        }))
    } else {
        None
    };

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let scheduler_handle = tokio::spawn(scheduler.run(async move {
        let _ = shutdown_rx.changed().await;
    }));

    tokio::signal::ctrl_c().await?;
    info!("Ctrl+C received, shutting down...");

    let _ = shutdown_tx.send(true);
    scheduler_handle.await?;
    if let Some(handle) = http_handle {
        handle.abort();
        // Cancelled is the expected result; awaiting releases the API's relay handle
        let _ = handle.await;
    }

    // The dispatcher stops once the last relay handle is gone, after
    // delivering whatever is still queued
    drop(relay);
    if !dispatcher_handle.drain(DRAIN_GRACE).await {
        warn!("Some queued alerts may not have been delivered");
    }

    info!("feewatch stopped");
    Ok(())
}

async fn run_collect(config: &Config, format: OutputFormat) -> anyhow::Result<()> {
    let source = build_source(&config.source)?;
    let trap = VolatilityTrap::from_config(&config.trap)?;

    let snapshot = source.snapshot().await?;
    let payload = trap.collect(&snapshot);

    match format {
        OutputFormat::Text => {
            println!("Block:   {}", snapshot.number);
            println!("Basefee: {} wei", snapshot.base_fee);
            println!("Payload: {}", codec::to_hex(&payload));
        }
        OutputFormat::Json => {
            let out = json!({
                "block": snapshot.number,
                "sample": snapshot.base_fee,
                "payload": codec::to_hex(&payload),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }
    Ok(())
}

fn run_check(
    config: &Config,
    current: u64,
    previous: u64,
    threshold: Option<u32>,
    comparator: Option<Comparator>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let trap = VolatilityTrap::new(
        threshold.unwrap_or(config.trap.threshold_percent),
        comparator.unwrap_or(config.trap.comparator),
    )
    .context("invalid --threshold")?;

    let history = [codec::encode_uint(current), codec::encode_uint(previous)];
    let decision = trap.should_respond(&history)?;
    let reason = decision.reason_text()?;

    match format {
        OutputFormat::Text => {
            let verdict = if decision.triggered { "TRIGGER" } else { "hold" };
            println!("{verdict}: {reason}");
        }
        OutputFormat::Json => {
            let out = json!({
                "triggered": decision.triggered,
                "reason": reason,
                "reason_hex": codec::to_hex(&decision.reason),
                "percent_change": percent_change(current, previous).map(|p| p.to_string()),
                "threshold_percent": trap.threshold_percent(),
                "comparator": trap.comparator(),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }
    Ok(())
}

fn generate_completions(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "feewatch", &mut io::stdout());
}
