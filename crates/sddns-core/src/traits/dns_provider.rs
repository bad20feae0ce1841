// # DNS Provider Trait
//
// Defines the interface to a remote DNS record store.
//
// ## Implementations
//
// - Porkbun: `sddns-provider-porkbun` crate
// - Cloudflare: `sddns-provider-cloudflare` crate
// - In-process: `sddns_core::provider::MemoryProvider`
//
// ## Usage
//
// ```rust,ignore
// use sddns_core::{DnsProvider, DomainName};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let provider = /* DnsProvider implementation */;
//     provider.authenticate().await?;
//
//     let name = DomainName::new("example.com", "host");
//     for record in provider.list_records(&name).await? {
//         println!("{}", record);
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::record::{DomainName, Record, RecordType};

/// Credentials handed to a provider factory
///
/// Providers use whichever fields their API needs. The Debug
/// implementation never prints secret values.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret_key: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redact(s: &str) -> &'static str {
            if s.is_empty() { "<EMPTY>" } else { "<REDACTED>" }
        }
        f.debug_struct("Credentials")
            .field("api_key", &redact(&self.api_key))
            .field("api_secret_key", &redact(&self.api_secret_key))
            .field("username", &redact(&self.username))
            .field("password", &redact(&self.password))
            .finish()
    }
}

/// Trait for DNS provider implementations
///
/// The reconciler treats every provider identically: it lists the records
/// for a name, then creates, edits and deletes individual records by the
/// identifier the provider assigned.
///
/// # Thread Safety
///
/// One instance is shared by all per-domain tasks of a reconciliation pass,
/// so every method may be called concurrently.
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS API calls to their endpoints only
/// - ✅ Bound their own in-flight request count
/// - ✅ Parse provider-specific responses
///
/// ## Forbidden Capabilities
/// - ❌ Spawn tasks or threads
/// - ❌ Retry or back off (the next polling cycle is the retry)
/// - ❌ Cache records between calls (every pass starts from fresh state)
/// - ❌ Decide which records should exist (owned by the reconciler)
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Verify the credentials this instance was built with
    async fn authenticate(&self) -> Result<(), crate::Error>;

    /// List the records whose owner name is exactly `name`
    ///
    /// Every returned record carries its provider identifier.
    async fn list_records(&self, name: &DomainName) -> Result<Vec<Record>, crate::Error>;

    /// Create a record, returning the identifier the provider assigned
    async fn create_record(&self, record: &Record) -> Result<String, crate::Error>;

    /// Replace the record identified by `id` with `record`
    async fn edit_record(&self, id: &str, record: &Record) -> Result<(), crate::Error>;

    /// Delete the record identified by `id` under `name`
    async fn delete_record(&self, name: &DomainName, id: &str) -> Result<(), crate::Error>;

    /// Record types this provider can store
    fn supported_record_types(&self) -> &[RecordType];

    /// Lowest TTL the provider stores; lower values are raised to it
    ///
    /// Desired records are clamped before comparison so a provider that
    /// silently raises TTLs does not cause an edit every cycle.
    fn min_ttl(&self) -> Option<u32> {
        None
    }

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;

    /// Check whether `record_type` is in [`supported_record_types`](Self::supported_record_types)
    fn supports_record_type(&self, record_type: &RecordType) -> bool {
        self.supported_record_types().contains(record_type)
    }
}

/// Helper trait for constructing DNS providers from service credentials
///
/// A fresh provider is built for every service on every cycle, so a
/// provider never holds credentials for more than one service.
pub trait DnsProviderFactory: Send + Sync {
    /// Create a DnsProvider instance
    ///
    /// # Parameters
    ///
    /// - `credentials`: Credentials of the service being reconciled
    ///
    /// # Returns
    ///
    /// A boxed DnsProvider trait object
    fn create(&self, credentials: &Credentials) -> Result<Box<dyn DnsProvider>, crate::Error>;
}
