// # Memory DNS Provider
//
// In-process implementation of DnsProvider.
//
// ## Purpose
//
// Holds records in a Vec behind a RwLock and assigns sequential numeric
// identifiers, the way a real provider account would. Clones share the
// same record set.
//
// ## When to Use
//
// - Testing the reconciler without network access
// - Dry runs of a configuration (`type: memory`)
//
// All records are lost when the process exits.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::Error;
use crate::record::{DomainName, Record, RecordType};
use crate::traits::{Credentials, DnsProvider, DnsProviderFactory};

/// Every type the memory provider accepts
const SUPPORTED_TYPES: &[RecordType] = &[
    RecordType::A,
    RecordType::Aaaa,
    RecordType::Alias,
    RecordType::Caa,
    RecordType::Cname,
    RecordType::Https,
    RecordType::Mx,
    RecordType::Ns,
    RecordType::Srv,
    RecordType::Sshfp,
    RecordType::Svcb,
    RecordType::Tlsa,
    RecordType::Txt,
];

#[derive(Debug)]
struct Inner {
    records: RwLock<Vec<Record>>,
    next_id: AtomicU64,
    mutations: AtomicUsize,
}

/// In-memory DNS provider
///
/// # Example
///
/// ```rust,no_run
/// use sddns_core::provider::MemoryProvider;
/// use sddns_core::{DnsProvider, DomainName, Record, RecordType};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let provider = MemoryProvider::new();
///     let name = DomainName::new("example.com", "host");
///
///     let id = provider
///         .create_record(&Record::new(name.clone(), RecordType::A, "192.0.2.1"))
///         .await?;
///
///     let records = provider.list_records(&name).await?;
///     assert_eq!(records[0].id.as_deref(), Some(id.as_str()));
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryProvider {
    inner: Arc<Inner>,
    supported: Arc<[RecordType]>,
}

impl MemoryProvider {
    /// Create an empty provider accepting every known record type
    pub fn new() -> Self {
        Self::with_supported_types(SUPPORTED_TYPES.to_vec())
    }

    /// Create an empty provider accepting only `types`
    pub fn with_supported_types(types: Vec<RecordType>) -> Self {
        Self {
            inner: Arc::new(Inner {
                records: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(1),
                mutations: AtomicUsize::new(0),
            }),
            supported: types.into(),
        }
    }

    /// Store `record` directly, bypassing the mutation counter
    ///
    /// Returns the assigned identifier.
    pub async fn insert(&self, record: Record) -> String {
        let id = self.next_id();
        let mut records = self.inner.records.write().await;
        records.push(Record {
            id: Some(id.clone()),
            ..record
        });
        id
    }

    /// Snapshot of every stored record
    pub async fn records(&self) -> Vec<Record> {
        self.inner.records.read().await.clone()
    }

    /// Number of create/edit/delete calls that succeeded
    pub fn mutation_count(&self) -> usize {
        self.inner.mutations.load(Ordering::SeqCst)
    }

    fn next_id(&self) -> String {
        self.inner.next_id.fetch_add(1, Ordering::SeqCst).to_string()
    }

    fn mutated(&self) {
        self.inner.mutations.fetch_add(1, Ordering::SeqCst);
    }
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DnsProvider for MemoryProvider {
    async fn authenticate(&self) -> Result<(), Error> {
        Ok(())
    }

    async fn list_records(&self, name: &DomainName) -> Result<Vec<Record>, Error> {
        let records = self.inner.records.read().await;
        Ok(records.iter().filter(|r| r.name == *name).cloned().collect())
    }

    async fn create_record(&self, record: &Record) -> Result<String, Error> {
        if !self.supports_record_type(&record.record_type) {
            return Err(Error::unsupported_record_type(
                self.provider_name(),
                record.record_type.as_str(),
            ));
        }
        let id = self.insert(record.clone()).await;
        self.mutated();
        Ok(id)
    }

    async fn edit_record(&self, id: &str, record: &Record) -> Result<(), Error> {
        let mut records = self.inner.records.write().await;
        let slot = records
            .iter_mut()
            .find(|r| r.id.as_deref() == Some(id))
            .ok_or_else(|| Error::not_found(format!("Record {} does not exist", id)))?;

        *slot = Record {
            id: Some(id.to_string()),
            ..record.clone()
        };
        self.mutated();
        Ok(())
    }

    async fn delete_record(&self, name: &DomainName, id: &str) -> Result<(), Error> {
        let mut records = self.inner.records.write().await;
        let pos = records
            .iter()
            .position(|r| r.id.as_deref() == Some(id) && r.name == *name)
            .ok_or_else(|| Error::not_found(format!("Record {} does not exist at {}", id, name)))?;

        records.remove(pos);
        self.mutated();
        Ok(())
    }

    fn supported_record_types(&self) -> &[RecordType] {
        &self.supported
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}

/// Factory handing out handles to one shared [`MemoryProvider`]
///
/// Every service configured with `type: memory` sees the same records,
/// for the lifetime of the factory.
#[derive(Debug, Clone, Default)]
pub struct MemoryProviderFactory {
    provider: MemoryProvider,
}

impl MemoryProviderFactory {
    /// Create a factory backed by a fresh provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a factory handing out `provider`
    pub fn with_provider(provider: MemoryProvider) -> Self {
        Self { provider }
    }

    /// The shared provider
    pub fn provider(&self) -> &MemoryProvider {
        &self.provider
    }
}

impl DnsProviderFactory for MemoryProviderFactory {
    fn create(&self, _credentials: &Credentials) -> Result<Box<dyn DnsProvider>, Error> {
        Ok(Box::new(self.provider.clone()))
    }
}
