// # domwatchd - Domain Health Monitor Daemon
//
// This is a THIN integration layer. All alerting and incident logic lives
// in domwatch-core.
//
// The domwatchd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Opening the state store
// 4. Feeding check results from stdin to the monitor
// 5. Writing emitted alert events to the log as JSON
//
// ## Input
//
// One JSON `CheckResult` per line on stdin:
//
// ```json
// {"domain_id":42,"check_type":"http","status":"fail","finished_at":"2026-03-01T09:00:00Z","status_code":503}
// ```
//
// Malformed lines are logged and skipped. End of input stops the daemon.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### State Store
// - `DOMWATCH_STATE_STORE_TYPE`: Type of state store (file, memory)
// - `DOMWATCH_STATE_STORE_PATH`: Path to state file (for file store)
//
// ### Monitor
// - `DOMWATCH_ALERT_THRESHOLD`: Consecutive failures before http/ssl alert
// - `DOMWATCH_LEASE_TTL_SECS`: Lifetime of a per-key lease
// - `DOMWATCH_EVENT_CHANNEL_CAPACITY`: Buffered events before dropping
//
// ### Logging
// - `DOMWATCH_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export DOMWATCH_STATE_STORE_TYPE=file
// export DOMWATCH_STATE_STORE_PATH=/var/lib/domwatch/state.json
//
// probe-runner | domwatchd
// ```
//
// ## Remediation
//
// Auto-fix and record editing are request-driven, so the daemon does not
// start them. A host wires them from the same crates, with the DoH adapter
// as the CAA resolver and its own registrar factory:
//
// ```rust,ignore
// let engine = AutoFixEngine::new(
//     Arc::new(StaticCredentials::new(credentials)),
//     Arc::new(SynergyFactory::new()),
//     Arc::new(domwatch_doh::DohLookup::cloudflare()?),
//     RemediationConfig::default(),
// );
// let outcome = engine.apply_fix(&domain, "caa").await;
// ```

use anyhow::{Context, Result};
use domwatch_core::config::{AlertMode, CheckPolicy};
use domwatch_core::traits::{AlertStateStore, IncidentStore};
use domwatch_core::{
    ChannelEmitter, CheckResult, EmittedEvent, FileStateStore, MemoryStateStore, Monitor,
    MonitorConfig,
};
use std::env;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Buffered results between the stdin reader and the monitor
const RESULT_CHANNEL_CAPACITY: usize = 256;

/// How long blocking work (the stdin reader) may delay process exit
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DomwatchExitCode {
    CleanShutdown = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<DomwatchExitCode> for ExitCode {
    fn from(code: DomwatchExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    state_store_type: String,
    state_store_path: Option<String>,
    alert_threshold: Option<u32>,
    lease_ttl_secs: Option<u64>,
    event_channel_capacity: Option<usize>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            state_store_type: env::var("DOMWATCH_STATE_STORE_TYPE")
                .unwrap_or_else(|_| "file".to_string()),
            state_store_path: env::var("DOMWATCH_STATE_STORE_PATH").ok(),
            alert_threshold: parse_env("DOMWATCH_ALERT_THRESHOLD")?,
            lease_ttl_secs: parse_env("DOMWATCH_LEASE_TTL_SECS")?,
            event_channel_capacity: parse_env("DOMWATCH_EVENT_CHANNEL_CAPACITY")?,
            log_level: env::var("DOMWATCH_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        match self.state_store_type.as_str() {
            "file" | "memory" => {}
            _ => anyhow::bail!(
                "DOMWATCH_STATE_STORE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                self.state_store_type
            ),
        }

        if self.state_store_type == "file" {
            let Some(path) = self.state_store_path.as_deref() else {
                anyhow::bail!(
                    "DOMWATCH_STATE_STORE_PATH is required when DOMWATCH_STATE_STORE_TYPE=file. \
                    Set it via: export DOMWATCH_STATE_STORE_PATH=/var/lib/domwatch/state.json"
                );
            };

            if path.is_empty() {
                anyhow::bail!(
                    "DOMWATCH_STATE_STORE_PATH cannot be empty when DOMWATCH_STATE_STORE_TYPE=file"
                );
            }

            if let Some(parent) = std::path::Path::new(path).parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                anyhow::bail!(
                    "DOMWATCH_STATE_STORE_PATH parent directory does not exist: {}. \
                        Create it first: sudo mkdir -p {}",
                    parent.display(),
                    parent.display()
                );
            }
        }

        if let Some(threshold) = self.alert_threshold
            && !(1..=100).contains(&threshold)
        {
            anyhow::bail!(
                "DOMWATCH_ALERT_THRESHOLD must be between 1 and 100. Got: {}",
                threshold
            );
        }

        if let Some(ttl) = self.lease_ttl_secs
            && !(10..=3600).contains(&ttl)
        {
            anyhow::bail!(
                "DOMWATCH_LEASE_TTL_SECS must be between 10 and 3600 seconds. Got: {}",
                ttl
            );
        }

        if let Some(capacity) = self.event_channel_capacity
            && capacity == 0
        {
            anyhow::bail!("DOMWATCH_EVENT_CHANNEL_CAPACITY must be greater than 0");
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "DOMWATCH_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    /// Monitor settings with environment overrides applied
    fn monitor_config(&self) -> MonitorConfig {
        let mut monitor = MonitorConfig::default();

        if let Some(threshold) = self.alert_threshold {
            for policy in monitor.check_policies.values_mut() {
                if let AlertMode::Threshold { .. } = policy.alert {
                    *policy = CheckPolicy {
                        alert: AlertMode::Threshold { threshold },
                        ..*policy
                    };
                }
            }
        }
        if let Some(ttl) = self.lease_ttl_secs {
            monitor.lease_ttl_secs = ttl;
        }
        if let Some(capacity) = self.event_channel_capacity {
            monitor.event_channel_capacity = capacity;
        }

        monitor
    }
}

/// Read an optional numeric variable; a value that does not parse is an error
fn parse_env<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{} has invalid value '{}': {}", name, raw, e)),
        Err(_) => Ok(None),
    }
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return DomwatchExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return DomwatchExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr; stdin/stdout stay free for the result pipe
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DomwatchExitCode::ConfigError.into();
    }

    info!("Starting domwatchd daemon");
    info!("State store type: {}", config.state_store_type);

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DomwatchExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("Daemon error: {:#}", e);
            DomwatchExitCode::RuntimeError
        } else {
            DomwatchExitCode::CleanShutdown
        }
    });

    // The stdin reader may still be parked in a blocking read
    rt.shutdown_timeout(SHUTDOWN_TIMEOUT);

    result.into()
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<()> {
    let monitor_config = config.monitor_config();

    let (alert_store, incident_store): (Arc<dyn AlertStateStore>, Arc<dyn IncidentStore>) =
        match config.state_store_type.as_str() {
            "memory" => {
                warn!("Using in-memory state store; alert state is lost on restart");
                let store = Arc::new(MemoryStateStore::new());
                (store.clone(), store)
            }
            _ => {
                let path = config.state_store_path.as_deref().unwrap_or_default();
                let store = Arc::new(
                    FileStateStore::new(path)
                        .await
                        .with_context(|| format!("Failed to open state file {}", path))?,
                );
                info!("Using file state store at {}", path);
                (store.clone(), store)
            }
        };

    let (emitter, events) = ChannelEmitter::new(monitor_config.event_channel_capacity);
    let drain = tokio::spawn(drain_events(events));

    let monitor = Monitor::new(
        alert_store,
        incident_store,
        Arc::new(emitter),
        monitor_config,
    )
    .context("Invalid monitor configuration")?;

    let (results_tx, results_rx) = mpsc::channel(RESULT_CHANNEL_CAPACITY);
    let reader = tokio::spawn(read_results(results_tx));

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let signals = tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => info!("Received shutdown signal: {}", signal),
            Err(e) => error!("Signal handling error: {}", e),
        }
        let _ = shutdown_tx.send(());
    });

    info!("Ready to ingest check results from stdin");
    let run_result = monitor.run_with_shutdown(results_rx, shutdown_rx).await;

    signals.abort();
    reader.abort();

    // Dropping the monitor closes the event channel so the drain can finish
    drop(monitor);
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, drain).await.is_err() {
        warn!("Timed out flushing pending events");
    }

    run_result.context("Monitor stopped with an error")?;
    info!("Shutting down daemon");
    Ok(())
}

/// Parse NDJSON check results from stdin until end of input
async fn read_results(tx: mpsc::Sender<CheckResult>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_no = 0u64;

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("End of input after {} line(s)", line_no);
                return;
            }
            Err(e) => {
                error!("Failed to read stdin: {}", e);
                return;
            }
        };
        line_no += 1;

        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<CheckResult>(&line) {
            Ok(result) => {
                if tx.send(result).await.is_err() {
                    debug!("Monitor stopped, no longer reading input");
                    return;
                }
            }
            Err(e) => warn!("Skipping malformed check result on line {}: {}", line_no, e),
        }
    }
}

/// Write each emitted event to the log as one JSON line
async fn drain_events(events: mpsc::Receiver<EmittedEvent>) {
    let mut events = ReceiverStream::new(events);
    while let Some(event) = events.next().await {
        match serde_json::to_string(&event) {
            Ok(json) => info!(target: "domwatch::events", "{}", json),
            Err(e) => error!("Failed to serialize {} event: {}", event.event_type, e),
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
