//! Core sddns engine
//!
//! The DdnsEngine is the scheduler loop. Each cycle it:
//! - Loads every service from the configuration directory
//! - Builds and authenticates a fresh DnsProvider per service
//! - Collects interface addresses and builds the desired record set
//! - Hands the desired set to the Reconciler
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────────┐
//!                 │ config.d/*.y │
//!                 └──────────────┘
//!                        │ load_services
//!                        ▼
//! ┌───────────────┐  ┌──────────────┐  ┌──────────────────┐
//! │InterfaceSource│─▶│ DdnsEngine   │─▶│ ProviderRegistry │
//! └───────────────┘  └──────────────┘  └──────────────────┘
//!                        │
//!         ┌──────────────┼──────────────┐
//!         ▼              ▼              ▼
//! ┌──────────────┐ ┌────────────┐ ┌──────────┐
//! │ build_desired│ │ Reconciler │ │  Events  │
//! └──────────────┘ └────────────┘ └──────────┘
//! ```
//!
//! ## Cycle Flow
//!
//! `Idle → Running-Cycle → Idle (after sleep) → …`, terminal on shutdown.
//!
//! Cycles never overlap. Shutdown and the optional deadline are checked
//! at cycle boundaries only: a cycle in flight finishes its provider calls.
//! The inter-cycle sleep is interrupted by either.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::collector::ResolvedAddresses;
use crate::config::{EngineConfig, Service, load_services};
use crate::desired::build_desired;
use crate::error::Result;
use crate::reconcile::{ActionKind, DomainFailure, ReconcileReport, Reconciler};
use crate::record::DomainName;
use crate::registry::ProviderRegistry;
use crate::traits::{DnsProvider, InterfaceSource};

/// Events emitted by the DdnsEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine started
    Started { config_dir: PathBuf, dry_run: bool },

    /// A cycle began
    CycleStarted { cycle: u64, services: usize },

    /// A service was not reconciled this cycle
    ServiceSkipped { service: String, reason: String },

    /// A planned action was not applied (dry run)
    ActionPlanned {
        service: String,
        name: DomainName,
        action: ActionKind,
        record: String,
    },

    /// An action was applied
    ActionApplied {
        service: String,
        name: DomainName,
        action: ActionKind,
        record: String,
    },

    /// Reconciliation of a domain name stopped on an error
    DomainFailed {
        service: String,
        name: DomainName,
        action: Option<ActionKind>,
        error: String,
    },

    /// A cycle finished
    CycleCompleted {
        cycle: u64,
        applied: usize,
        failures: usize,
    },

    /// Engine stopped
    Stopped { reason: String },
}

/// Outcome of one service within a cycle
#[derive(Debug, Clone)]
pub struct ServiceReport {
    /// Service name
    pub service: String,
    /// Provider type key
    pub provider: String,
    /// Per-domain outcomes
    pub reconcile: ReconcileReport,
}

/// A service left out of a cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedService {
    pub service: String,
    pub reason: String,
}

/// Outcome of one scheduler cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Cycle number, starting at 1
    pub cycle: u64,
    /// Wall-clock start of the cycle
    pub started_at: DateTime<Utc>,
    /// Services that were reconciled
    pub services: Vec<ServiceReport>,
    /// Services skipped (provider, authentication or validation errors)
    pub skipped: Vec<SkippedService>,
}

impl CycleReport {
    /// Failures across every reconciled service
    pub fn failures(&self) -> impl Iterator<Item = &DomainFailure> {
        self.services.iter().flat_map(|s| s.reconcile.failures())
    }

    /// Number of actions applied
    pub fn applied_count(&self) -> usize {
        self.services.iter().map(|s| s.reconcile.applied_count()).sum()
    }

    /// Whether every service was reconciled without failure
    pub fn is_success(&self) -> bool {
        self.skipped.is_empty() && self.failures().next().is_none()
    }
}

/// Core sddns engine
///
/// ## Lifecycle
///
/// 1. Create with [`DdnsEngine::new()`]
/// 2. Start with [`DdnsEngine::run()`], or drive single cycles with
///    [`DdnsEngine::run_cycle()`]
/// 3. Engine runs until shutdown signal received
///
/// ## Load Resistance
///
/// - **Bounded event channel**: Prevents unbounded memory growth
/// - **Event dropping**: When the channel is full, new events are dropped (logged)
/// - **One cycle at a time**: A slow provider delays the next cycle instead
///   of stacking cycles
pub struct DdnsEngine {
    /// Provider factories, frozen before the engine starts
    registry: Arc<ProviderRegistry>,

    /// Interface and address enumeration
    source: Arc<dyn InterfaceSource>,

    /// Engine configuration
    config: EngineConfig,

    /// Number of cycles started
    cycles: AtomicU64,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,

    /// Set once the event receiver is gone
    events_closed: AtomicBool,
}

impl DdnsEngine {
    /// Create a new engine
    ///
    /// # Parameters
    ///
    /// - `registry`: Registry holding every usable provider type
    /// - `source`: Interface source for address collection
    /// - `config`: Engine configuration
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        registry: Arc<ProviderRegistry>,
        source: Arc<dyn InterfaceSource>,
        config: EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let engine = Self {
            registry,
            source,
            config,
            cycles: AtomicU64::new(0),
            event_tx: tx,
            events_closed: AtomicBool::new(false),
        };

        Ok((engine, rx))
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run the engine until SIGINT
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    /// - `Err(Error)`: Fatal error (configuration directory unreadable)
    pub async fn run(&self) -> Result<()> {
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = tx.send(true);
            }
        });
        self.run_with_shutdown(rx, None).await
    }

    /// Run the engine until `shutdown` turns true or `deadline` passes
    ///
    /// Dropping the sending half of `shutdown` also stops the engine.
    ///
    /// # Parameters
    ///
    /// - `shutdown`: Watch receiver; `true` requests shutdown
    /// - `deadline`: Optional instant after which no new cycle starts
    pub async fn run_with_shutdown(
        &self,
        mut shutdown: watch::Receiver<bool>,
        deadline: Option<Instant>,
    ) -> Result<()> {
        info!(
            "Engine started (config: {}, interval: {}s{})",
            self.config.config_dir.display(),
            self.config.interval_secs,
            if self.config.dry_run { ", dry run" } else { "" }
        );
        self.emit_event(EngineEvent::Started {
            config_dir: self.config.config_dir.clone(),
            dry_run: self.config.dry_run,
        });

        let interval = Duration::from_secs(self.config.interval_secs);

        let reason = loop {
            if *shutdown.borrow() {
                break "Shutdown signal";
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                break "Deadline reached";
            }

            if let Err(e) = self.run_cycle().await {
                error!("Cycle failed: {}", e);
                self.emit_event(EngineEvent::Stopped {
                    reason: e.to_string(),
                });
                return Err(e);
            }

            let until_deadline = async {
                match deadline {
                    Some(d) => tokio::time::sleep_until(d).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break "Shutdown handle dropped";
                    }
                }
                _ = until_deadline => {}
            }
        };

        info!("Engine stopped: {}", reason);
        self.emit_event(EngineEvent::Stopped {
            reason: reason.to_string(),
        });

        Ok(())
    }

    /// Run a single cycle over every configured service
    ///
    /// # Returns
    ///
    /// - `Ok(CycleReport)`: The cycle ran; individual services may have
    ///   been skipped or failed
    /// - `Err(Error::Config)`: The configuration directory is unreadable
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let cycle = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
        let started_at = Utc::now();

        let services = load_services(&self.config.config_dir).await?;
        debug!("Cycle {} with {} service(s)", cycle, services.len());
        self.emit_event(EngineEvent::CycleStarted {
            cycle,
            services: services.len(),
        });

        let mut report = CycleReport {
            cycle,
            started_at,
            services: Vec::with_capacity(services.len()),
            skipped: Vec::new(),
        };

        for service in &services {
            match self.run_service(service).await {
                Ok(reconcile) => {
                    self.emit_outcomes(service, &reconcile);
                    report.services.push(ServiceReport {
                        service: service.name.clone(),
                        provider: service.provider.clone(),
                        reconcile,
                    });
                }
                Err(e) => {
                    error!("Skipping service {}: {}", service.name, e);
                    self.emit_event(EngineEvent::ServiceSkipped {
                        service: service.name.clone(),
                        reason: e.to_string(),
                    });
                    report.skipped.push(SkippedService {
                        service: service.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let failures = report.failures().count();
        let applied = report.applied_count();
        if failures > 0 || !report.skipped.is_empty() {
            warn!(
                "Cycle {} finished: {} applied, {} failed, {} skipped",
                cycle,
                applied,
                failures,
                report.skipped.len()
            );
        } else {
            info!("Cycle {} finished: {} applied", cycle, applied);
        }
        self.emit_event(EngineEvent::CycleCompleted {
            cycle,
            applied,
            failures,
        });

        Ok(report)
    }

    /// Reconcile one service with a freshly built provider
    async fn run_service(&self, service: &Service) -> Result<ReconcileReport> {
        let provider: Arc<dyn DnsProvider> = Arc::from(
            self.registry
                .create_provider(&service.provider, &service.credentials)?,
        );
        provider.authenticate().await?;

        // Enumeration failure skips the service rather than publishing nothing.
        let addrs = ResolvedAddresses::collect(self.source.as_ref(), service).await?;
        if addrs.is_empty() {
            warn!(
                "No addresses found for service {}, managed records will be removed",
                service.name
            );
        }

        let desired = build_desired(service, &addrs)?;
        debug!(
            "Service {}: {} desired record(s) across {} name(s)",
            service.name,
            desired.record_count(),
            desired.names.len()
        );

        Reconciler::new(provider)
            .with_dry_run(self.config.dry_run)
            .reconcile(&desired)
            .await
    }

    /// Translate a service's reconcile report into events
    fn emit_outcomes(&self, service: &Service, report: &ReconcileReport) {
        for outcome in &report.outcomes {
            if report.dry_run {
                for action in outcome.plan.changes() {
                    self.emit_event(EngineEvent::ActionPlanned {
                        service: service.name.clone(),
                        name: outcome.name().clone(),
                        action: action.kind(),
                        record: action.record().to_string(),
                    });
                }
            }
            for action in &outcome.applied {
                self.emit_event(EngineEvent::ActionApplied {
                    service: service.name.clone(),
                    name: outcome.name().clone(),
                    action: action.kind(),
                    record: action.record().to_string(),
                });
            }
            if let Some(failure) = &outcome.failure {
                self.emit_event(EngineEvent::DomainFailed {
                    service: service.name.clone(),
                    name: failure.name.clone(),
                    action: failure.action,
                    error: failure.error.clone(),
                });
            }
        }
    }

    /// Emit an engine event
    ///
    /// # Parameters
    ///
    /// - `event`: The event to emit
    fn emit_event(&self, event: EngineEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            Err(TrySendError::Closed(_)) => {
                if !self.events_closed.swap(true, Ordering::Relaxed) {
                    debug!("Event receiver dropped, no further events will be sent");
                }
            }
        }
    }
}
