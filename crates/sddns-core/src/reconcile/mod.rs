//! Record reconciler
//!
//! Converges a provider's record set toward a [`DesiredState`]. Each
//! domain name is reconciled on its own task:
//!
//! ```text
//! ┌──────────────┐    ┌────────────┐    ┌──────────────────────────┐
//! │ list_records │───▶│ Plan::     │───▶│ creates → deletes → edits│
//! │ (fetch)      │    │ compute    │    │ (stop at first failure)  │
//! └──────────────┘    └────────────┘    └──────────────────────────┘
//! ```
//!
//! A failed fetch is treated as "no existing records" so the name is still
//! converged from scratch. A failed apply stops that name only; every other
//! name proceeds and the failure is reported in the [`ReconcileReport`].
//!
//! Nothing is retried here. The next polling cycle starts from freshly
//! fetched state.

mod plan;

pub use plan::{Action, ActionKind, Plan};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::desired::DesiredState;
use crate::error::{Error, Result};
use crate::record::{DomainName, Record, RecordType};
use crate::traits::DnsProvider;

/// An action that could not be applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainFailure {
    /// Domain name whose reconciliation stopped
    pub name: DomainName,
    /// Kind of the failed action; `None` when the task itself died
    pub action: Option<ActionKind>,
    /// Error message
    pub error: String,
}

/// Result of reconciling one domain name
#[derive(Debug, Clone)]
pub struct DomainOutcome {
    /// The computed plan
    pub plan: Plan,
    /// Set when listing existing records failed
    pub fetch_error: Option<String>,
    /// Actions applied successfully, in order
    pub applied: Vec<Action>,
    /// The first failed action, if any
    pub failure: Option<DomainFailure>,
}

impl DomainOutcome {
    fn empty(name: DomainName) -> Self {
        Self {
            plan: Plan {
                name,
                actions: Vec::new(),
                orphans: Vec::new(),
            },
            fetch_error: None,
            applied: Vec::new(),
            failure: None,
        }
    }

    /// Domain name this outcome covers
    pub fn name(&self) -> &DomainName {
        &self.plan.name
    }
}

/// Result of one reconciliation pass over a desired state
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    /// One outcome per domain name, in name order
    pub outcomes: Vec<DomainOutcome>,
    /// Whether actions were planned only
    pub dry_run: bool,
}

impl ReconcileReport {
    /// Failures across every domain name
    pub fn failures(&self) -> impl Iterator<Item = &DomainFailure> {
        self.outcomes.iter().filter_map(|o| o.failure.as_ref())
    }

    /// Whether every planned action was applied
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Number of actions applied
    pub fn applied_count(&self) -> usize {
        self.outcomes.iter().map(|o| o.applied.len()).sum()
    }

    /// Number of state-changing actions planned
    pub fn planned_count(&self) -> usize {
        self.outcomes.iter().map(|o| o.plan.changes().count()).sum()
    }
}

/// Reconciles desired records against one provider
///
/// # Example
///
/// ```rust,ignore
/// let reconciler = Reconciler::new(provider).with_dry_run(false);
/// let report = reconciler.reconcile(&desired).await?;
/// for failure in report.failures() {
///     eprintln!("{}: {}", failure.name, failure.error);
/// }
/// ```
pub struct Reconciler {
    provider: Arc<dyn DnsProvider>,
    dry_run: bool,
}

impl Reconciler {
    /// Create a reconciler applying changes through `provider`
    pub fn new(provider: Arc<dyn DnsProvider>) -> Self {
        Self {
            provider,
            dry_run: false,
        }
    }

    /// Plan actions without applying them
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Reject record types the provider cannot store
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Every managed and desired type is supported
    /// - `Err(Error::UnsupportedRecordType)`: The first unsupported type
    pub fn validate(&self, desired: &DesiredState) -> Result<()> {
        let types = desired
            .managed_types
            .iter()
            .chain(desired.records().map(|r| &r.record_type));

        for record_type in types {
            if !self.provider.supports_record_type(record_type) {
                return Err(Error::unsupported_record_type(
                    self.provider.provider_name(),
                    record_type.as_str(),
                ));
            }
        }
        Ok(())
    }

    /// Reconcile every domain name in `desired`
    ///
    /// Names are reconciled concurrently and independently. The pass
    /// returns once every name has finished.
    ///
    /// # Returns
    ///
    /// - `Ok(ReconcileReport)`: Per-name outcomes, including apply failures
    /// - `Err(Error)`: Validation failed; no provider call was made
    pub async fn reconcile(&self, desired: &DesiredState) -> Result<ReconcileReport> {
        self.validate(desired)?;

        let managed: Arc<[RecordType]> = desired.managed_types.clone().into();
        let mut tasks = Vec::with_capacity(desired.names.len());

        let min_ttl = self.provider.min_ttl();

        for (name, records) in &desired.names {
            let provider = Arc::clone(&self.provider);
            let managed = Arc::clone(&managed);
            let task_name = name.clone();
            let records: Vec<Record> = records
                .iter()
                .map(|r| clamp_ttl(r.normalized(), min_ttl))
                .collect();
            let dry_run = self.dry_run;

            let handle = tokio::spawn(async move {
                reconcile_name(provider.as_ref(), task_name, &records, &managed, dry_run).await
            });
            tasks.push((name.clone(), handle));
        }

        let mut outcomes = Vec::with_capacity(tasks.len());
        for (name, handle) in tasks {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    error!("Reconcile task for {} died: {}", name, e);
                    let mut outcome = DomainOutcome::empty(name.clone());
                    outcome.failure = Some(DomainFailure {
                        name,
                        action: None,
                        error: e.to_string(),
                    });
                    outcomes.push(outcome);
                }
            }
        }

        Ok(ReconcileReport {
            outcomes,
            dry_run: self.dry_run,
        })
    }
}

fn clamp_ttl(mut record: Record, min_ttl: Option<u32>) -> Record {
    if let Some(min) = min_ttl
        && record.effective_ttl() < min
    {
        debug!("Raising TTL of {} to provider minimum {}", record, min);
        record.ttl = Some(min);
    }
    record
}

/// Fetch, plan and apply for a single domain name
async fn reconcile_name(
    provider: &dyn DnsProvider,
    name: DomainName,
    desired: &[Record],
    managed: &[RecordType],
    dry_run: bool,
) -> DomainOutcome {
    let mut fetch_error = None;
    let existing = match provider.list_records(&name).await {
        Ok(records) => records,
        Err(e) => {
            warn!(
                "Failed to list records for {} ({}), assuming none exist: {}",
                name,
                provider.provider_name(),
                e
            );
            fetch_error = Some(e.to_string());
            Vec::new()
        }
    };

    let plan = Plan::compute(&name, desired, &existing, managed);
    for orphan in &plan.orphans {
        warn!("Ignoring record without identifier: {}", orphan);
    }

    if plan.is_noop() {
        debug!("{} is up to date", name);
    }

    let mut applied = Vec::new();
    let mut failure = None;

    for action in plan.changes() {
        if dry_run {
            info!("[dry-run] Would {}", action);
            continue;
        }

        match apply(provider, action).await {
            Ok(()) => applied.push(action.clone()),
            Err(e) => {
                error!("Failed to {}: {}", action, e);
                failure = Some(DomainFailure {
                    name: name.clone(),
                    action: Some(action.kind()),
                    error: e.to_string(),
                });
                break;
            }
        }
    }

    DomainOutcome {
        plan,
        fetch_error,
        applied,
        failure,
    }
}

/// Apply a single action through the provider
async fn apply(provider: &dyn DnsProvider, action: &Action) -> Result<()> {
    match action {
        Action::Create { record } => {
            let id = provider.create_record(record).await?;
            info!("Created {} (id={})", record, id);
        }
        Action::Edit { id, current, record } => {
            provider.edit_record(id, record).await?;
            info!("Edited {} -> {}", current, record.content);
        }
        Action::Delete { id, record } => {
            provider.delete_record(&record.name, id).await?;
            info!("Deleted {}", record);
        }
        Action::Unchanged { .. } => {}
    }
    Ok(())
}
