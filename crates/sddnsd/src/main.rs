// # sddnsd - sddns Daemon
//
// This daemon is a THIN integration layer. All reconciliation logic lives
// in sddns-core; nothing here talks to a DNS provider directly.
//
// The sddnsd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing tracing and the runtime
// 3. Registering DNS providers
// 4. Running the engine until a signal or the optional deadline
//
// ## Configuration
//
// Daemon settings come from environment variables only. Services (hostnames,
// interfaces, credentials) live in YAML files inside the config directory.
//
// - `SDDNS_CONFIG_DIR`: Service directory (default `/etc/sddns/config.d`)
// - `SDDNS_INTERVAL_SECS`: Seconds between cycles (default 20, 1..=86400)
// - `SDDNS_TIMEOUT_SECS`: Stop starting new cycles after this many seconds
// - `SDDNS_MODE`: `apply` (default) or `dry-run`
// - `SDDNS_LOG_LEVEL`: trace, debug, info, warn, error (default info)
// - `SDDNS_EVENT_CHANNEL_CAPACITY`: Engine event buffer (default 1000)
//
// ## Example
//
// ```bash
// export SDDNS_CONFIG_DIR=/etc/sddns/config.d
// export SDDNS_INTERVAL_SECS=60
// export SDDNS_MODE=dry-run
//
// sddnsd
// ```

use anyhow::{Context, Result};
use sddns_core::{DdnsEngine, EngineConfig, EngineEvent, ProviderRegistry};
use sddns_ip_netlink::NetlinkInterfaceSource;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

const DEFAULT_INTERVAL_SECS: u64 = 20;
const MAX_INTERVAL_SECS: u64 = 86_400;

/// Daemon configuration
#[derive(Debug, Clone, PartialEq, Eq)]
struct Config {
    config_dir: PathBuf,
    interval_secs: u64,
    timeout_secs: Option<u64>,
    dry_run: bool,
    log_level: Level,
    event_channel_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, validating every value
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = EngineConfig::default();

        let config_dir = lookup("SDDNS_CONFIG_DIR")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.config_dir);

        let interval_secs = match lookup("SDDNS_INTERVAL_SECS") {
            Some(raw) => parse_number(&raw, "SDDNS_INTERVAL_SECS")?,
            None => DEFAULT_INTERVAL_SECS,
        };
        if !(1..=MAX_INTERVAL_SECS).contains(&interval_secs) {
            anyhow::bail!(
                "SDDNS_INTERVAL_SECS must be between 1 and {} seconds. Got: {}",
                MAX_INTERVAL_SECS,
                interval_secs
            );
        }

        let timeout_secs = lookup("SDDNS_TIMEOUT_SECS")
            .map(|raw| parse_number::<u64>(&raw, "SDDNS_TIMEOUT_SECS"))
            .transpose()?;
        if timeout_secs == Some(0) {
            anyhow::bail!("SDDNS_TIMEOUT_SECS must be greater than 0");
        }

        let dry_run = match lookup("SDDNS_MODE").as_deref().map(str::trim) {
            None | Some("") | Some("apply") => false,
            Some("dry-run") | Some("dry_run") => true,
            Some(other) => anyhow::bail!(
                "SDDNS_MODE '{}' is not valid. Valid modes: apply, dry-run",
                other
            ),
        };

        let log_level = match lookup("SDDNS_LOG_LEVEL")
            .unwrap_or_else(|| "info".to_string())
            .to_lowercase()
            .as_str()
        {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            other => anyhow::bail!(
                "SDDNS_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                other
            ),
        };

        let event_channel_capacity = match lookup("SDDNS_EVENT_CHANNEL_CAPACITY") {
            Some(raw) => parse_number(&raw, "SDDNS_EVENT_CHANNEL_CAPACITY")?,
            None => defaults.event_channel_capacity,
        };
        if event_channel_capacity == 0 {
            anyhow::bail!("SDDNS_EVENT_CHANNEL_CAPACITY must be greater than 0");
        }

        Ok(Self {
            config_dir,
            interval_secs,
            timeout_secs,
            dry_run,
            log_level,
            event_channel_capacity,
        })
    }

    fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            config_dir: self.config_dir.clone(),
            interval_secs: self.interval_secs,
            dry_run: self.dry_run,
            event_channel_capacity: self.event_channel_capacity,
        }
    }
}

fn parse_number<T: std::str::FromStr>(raw: &str, key: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("{} must be a positive integer. Got: '{}'", key, raw))
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    info!("Starting sddnsd daemon");

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run_daemon(config)).into()
}

/// Build the registry of every compiled-in provider
fn build_registry() -> ProviderRegistry {
    #[allow(unused_mut)]
    let mut registry = ProviderRegistry::with_builtin();

    #[cfg(feature = "porkbun")]
    sddns_provider_porkbun::register(&mut registry);

    #[cfg(feature = "cloudflare")]
    sddns_provider_cloudflare::register(&mut registry);

    registry
}

/// Run the daemon and map the outcome to an exit code
async fn run_daemon(config: Config) -> DdnsExitCode {
    let registry = Arc::new(build_registry());
    info!("Registered providers: {}", registry.list_providers().join(", "));

    let (engine, events) = match DdnsEngine::new(
        registry,
        Arc::new(NetlinkInterfaceSource::new()),
        config.engine_config(),
    ) {
        Ok(pair) => pair,
        Err(e) => {
            error!("Failed to create engine: {}", e);
            return DdnsExitCode::ConfigError;
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    if let Err(e) = spawn_signal_handler(shutdown_tx) {
        error!("Failed to install signal handlers: {:#}", e);
        return DdnsExitCode::RuntimeError;
    }

    let event_logger = tokio::spawn(log_events(events));

    let deadline = config
        .timeout_secs
        .map(|secs| tokio::time::Instant::now() + Duration::from_secs(secs));

    let result = engine.run_with_shutdown(shutdown_rx, deadline).await;

    // Dropping the engine closes the event channel and ends the logger.
    drop(engine);
    if let Err(e) = event_logger.await {
        warn!("Event logger ended abnormally: {}", e);
    }

    match result {
        Ok(()) => {
            info!("Shutting down daemon");
            DdnsExitCode::CleanShutdown
        }
        Err(e) if e.is_config() => {
            error!("Fatal configuration error: {}", e);
            DdnsExitCode::ConfigError
        }
        Err(e) => {
            error!("Daemon error: {}", e);
            DdnsExitCode::RuntimeError
        }
    }
}

/// Forward SIGTERM/SIGINT into the engine's shutdown channel
#[cfg(unix)]
fn spawn_signal_handler(shutdown: watch::Sender<bool>) -> Result<()> {
    let mut sigterm = signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

    tokio::spawn(async move {
        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        info!("Received shutdown signal: {}", name);
        let _ = shutdown.send(true);
        // Keep the sender alive so the engine sees the signal, not a drop.
        shutdown.closed().await;
    });

    Ok(())
}

/// Forward CTRL-C into the engine's shutdown channel
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
fn spawn_signal_handler(shutdown: watch::Sender<bool>) -> Result<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal: SIGINT");
            let _ = shutdown.send(true);
        }
        shutdown.closed().await;
    });
    Ok(())
}

/// Log engine events until the channel closes
async fn log_events(mut events: mpsc::Receiver<EngineEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            EngineEvent::CycleCompleted {
                cycle,
                applied,
                failures,
            } if failures > 0 => {
                warn!(
                    "Cycle {} completed with {} failure(s), {} action(s) applied",
                    cycle, failures, applied
                );
            }
            EngineEvent::CycleCompleted { cycle, applied, .. } => {
                info!("Cycle {} completed, {} action(s) applied", cycle, applied);
            }
            EngineEvent::ServiceSkipped { service, reason } => {
                warn!("Service {} skipped: {}", service, reason);
            }
            other => tracing::debug!("Engine event: {:?}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.interval_secs, 20);
        assert_eq!(config.timeout_secs, None);
        assert!(!config.dry_run);
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.config_dir, EngineConfig::default().config_dir);
    }

    #[test]
    fn test_full_environment() {
        let config = Config::from_lookup(lookup(&[
            ("SDDNS_CONFIG_DIR", "/tmp/sddns"),
            ("SDDNS_INTERVAL_SECS", "300"),
            ("SDDNS_TIMEOUT_SECS", "3600"),
            ("SDDNS_MODE", "dry-run"),
            ("SDDNS_LOG_LEVEL", "DEBUG"),
            ("SDDNS_EVENT_CHANNEL_CAPACITY", "16"),
        ]))
        .unwrap();

        assert_eq!(config.config_dir, PathBuf::from("/tmp/sddns"));
        assert_eq!(config.timeout_secs, Some(3600));
        assert!(config.dry_run);
        assert_eq!(config.log_level, Level::DEBUG);

        let engine = config.engine_config();
        assert_eq!(engine.interval_secs, 300);
        assert_eq!(engine.event_channel_capacity, 16);
    }

    #[test]
    fn test_interval_range() {
        assert!(Config::from_lookup(lookup(&[("SDDNS_INTERVAL_SECS", "0")])).is_err());
        assert!(Config::from_lookup(lookup(&[("SDDNS_INTERVAL_SECS", "86401")])).is_err());
        assert!(Config::from_lookup(lookup(&[("SDDNS_INTERVAL_SECS", "86400")])).is_ok());
        assert!(Config::from_lookup(lookup(&[("SDDNS_INTERVAL_SECS", "soon")])).is_err());
    }

    #[test]
    fn test_invalid_values() {
        assert!(Config::from_lookup(lookup(&[("SDDNS_MODE", "yolo")])).is_err());
        assert!(Config::from_lookup(lookup(&[("SDDNS_LOG_LEVEL", "loud")])).is_err());
        assert!(Config::from_lookup(lookup(&[("SDDNS_TIMEOUT_SECS", "0")])).is_err());
        assert!(Config::from_lookup(lookup(&[("SDDNS_EVENT_CHANNEL_CAPACITY", "0")])).is_err());
    }

    #[test]
    fn test_registry_has_compiled_providers() {
        let registry = build_registry();
        assert!(registry.has_provider("memory"));
        #[cfg(feature = "porkbun")]
        assert!(registry.has_provider("porkbun"));
        #[cfg(feature = "cloudflare")]
        assert!(registry.has_provider("cloudflare"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(DdnsExitCode::CleanShutdown as u8, 0);
        assert_eq!(DdnsExitCode::ConfigError as u8, 1);
        assert_eq!(DdnsExitCode::RuntimeError as u8, 2);
    }
}
