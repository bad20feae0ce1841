// # Porkbun DNS Provider
//
// This crate provides a Porkbun DNS provider implementation for sddns.
//
// ## Implementation Status
//
// - ✅ One HTTP request per provider call
// - ✅ Full error propagation to the reconciler
// - ✅ HTTP timeout configured (30 seconds)
// - ✅ In-flight requests bounded per instance
// - ✅ Specific error handling for HTTP status codes (401/403, 404, 429, 5xx)
// - ✅ Provider-level `"status": "ERROR"` responses mapped to errors
// - ❌ NO retry logic (the next cycle is the retry)
// - ❌ NO caching (records are fetched fresh every pass)
// - ❌ NO background tasks
//
// ### Trust Level: Untrusted (DNS Provider)
//
// **Allowed Capabilities**:
// - ✅ Perform HTTPS API calls to api.porkbun.com only
// - ✅ Parse provider-specific responses
//
// **Forbidden Capabilities**:
// - ❌ Spawn tasks or threads
// - ❌ Implement retry logic
// - ❌ Decide which records should exist
//
// ## Security Requirements
//
// - API keys NEVER appear in logs (redacted Debug)
// - Provider MUST fail fast if either key is empty
//
// ## API Reference
//
// Porkbun JSON API v3: https://porkbun.com/api/json/v3/documentation
// Every call is a POST whose body carries `apikey` and `secretapikey`.
//
// - Ping: `/ping`
// - Retrieve records: `/dns/retrieve/:domain`
// - Create record: `/dns/create/:domain`
// - Edit record: `/dns/edit/:domain/:id`
// - Delete record: `/dns/delete/:domain/:id`

mod types;

use async_trait::async_trait;
use reqwest::StatusCode;
use sddns_core::traits::{Credentials, DnsProvider, DnsProviderFactory};
use sddns_core::{DomainName, Error, ProviderRegistry, Record, RecordType, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::Semaphore;

use types::{Auth, CreateResponse, Envelope, RecordRequest, RetrieveResponse, records_for};

/// Porkbun API base URL
const PORKBUN_API_BASE: &str = "https://api.porkbun.com/api/json/v3";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Concurrent requests per provider instance
const MAX_IN_FLIGHT: usize = 4;

/// Porkbun stores no TTL below 600 seconds
const PORKBUN_MIN_TTL: u32 = 600;

const SUPPORTED_TYPES: &[RecordType] = &[
    RecordType::A,
    RecordType::Aaaa,
    RecordType::Mx,
    RecordType::Cname,
    RecordType::Alias,
    RecordType::Txt,
    RecordType::Ns,
    RecordType::Srv,
    RecordType::Tlsa,
    RecordType::Caa,
];

const PROVIDER: &str = "porkbun";

/// Porkbun DNS provider
///
/// # Trust Level: Untrusted
///
/// This provider is isolated and single-shot. All coordination is owned
/// by the reconciler.
///
/// # Security
///
/// The Debug implementation does NOT expose the API keys.
pub struct PorkbunProvider {
    /// ⚠️ NEVER log this value
    api_key: String,

    /// ⚠️ NEVER log this value
    secret_api_key: String,

    /// API base URL, overridable for tests
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Bounds concurrent requests from the per-domain tasks
    permits: Semaphore,
}

impl std::fmt::Debug for PorkbunProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PorkbunProvider")
            .field("api_key", &"<REDACTED>")
            .field("secret_api_key", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl PorkbunProvider {
    /// Create a new Porkbun provider
    ///
    /// # Parameters
    ///
    /// - `api_key`: Porkbun API key (`pk1_...`)
    /// - `secret_api_key`: Porkbun secret API key (`sk1_...`)
    ///
    /// # Returns
    ///
    /// - `Err(Error::Config)`: If either key is empty
    /// - `Err(Error::Http)`: If the HTTP client cannot be built
    pub fn new(api_key: impl Into<String>, secret_api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        let secret_api_key = secret_api_key.into();

        if api_key.is_empty() || secret_api_key.is_empty() {
            return Err(Error::config(
                "Porkbun requires both api_key and api_secret_key",
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            secret_api_key,
            base_url: PORKBUN_API_BASE.to_string(),
            client,
            permits: Semaphore::new(MAX_IN_FLIGHT),
        })
    }

    /// Point the provider at another API endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn auth(&self) -> Auth<'_> {
        Auth {
            apikey: &self.api_key,
            secretapikey: &self.secret_api_key,
        }
    }

    /// POST `body` to `path` and decode a successful response
    ///
    /// # API Call
    ///
    /// ```http
    /// POST /dns/retrieve/example.com
    /// Content-Type: application/json
    ///
    /// {"apikey": "...", "secretapikey": "..."}
    /// ```
    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| Error::provider(PROVIDER, "request limiter closed"))?;

        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::http(format!("Porkbun request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read Porkbun response: {}", e)))?;

        decode(status, &text)
    }
}

/// Map a Porkbun response to a value or an error
fn decode<T: DeserializeOwned>(status: StatusCode, text: &str) -> Result<T> {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(_) if !status.is_success() => return Err(status_error(status, text)),
        Err(e) => {
            return Err(Error::provider(
                PROVIDER,
                format!("Failed to parse response: {}", e),
            ));
        }
    };

    let envelope: Envelope = serde_json::from_value(value.clone())?;
    if !status.is_success() || !envelope.is_success() {
        let message = envelope.message.unwrap_or_else(|| text.to_string());
        return Err(status_error(status, &message));
    }

    Ok(serde_json::from_value(value)?)
}

/// Map an HTTP status and error message to a core error
fn status_error(status: StatusCode, message: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::auth(format!("Porkbun rejected the API keys: {}", message)),
        404 => Error::not_found(format!("Porkbun: {}", message)),
        429 => Error::rate_limited(format!("Porkbun: {}", message)),
        500..=599 => Error::http(format!(
            "Porkbun server error (transient): {} - {}",
            status, message
        )),
        _ if message.contains("Invalid API key") => Error::auth(message.to_string()),
        _ => Error::provider(PROVIDER, message.to_string()),
    }
}

#[async_trait]
impl DnsProvider for PorkbunProvider {
    async fn authenticate(&self) -> Result<()> {
        let _: Envelope = self.post("/ping", &self.auth()).await?;
        tracing::debug!("Porkbun credentials verified");
        Ok(())
    }

    async fn list_records(&self, name: &DomainName) -> Result<Vec<Record>> {
        let response: RetrieveResponse = self
            .post(&format!("/dns/retrieve/{}", name.domain), &self.auth())
            .await?;
        let records = records_for(name, response.records);
        tracing::debug!("Porkbun holds {} record(s) at {}", records.len(), name);
        Ok(records)
    }

    async fn create_record(&self, record: &Record) -> Result<String> {
        let body = RecordRequest::new(self.auth(), record);
        let response: CreateResponse = self
            .post(&format!("/dns/create/{}", record.name.domain), &body)
            .await?;
        response
            .id()
            .ok_or_else(|| Error::provider(PROVIDER, "create response carried no record id"))
    }

    async fn edit_record(&self, id: &str, record: &Record) -> Result<()> {
        let body = RecordRequest::new(self.auth(), record);
        let _: Envelope = self
            .post(&format!("/dns/edit/{}/{}", record.name.domain, id), &body)
            .await?;
        Ok(())
    }

    async fn delete_record(&self, name: &DomainName, id: &str) -> Result<()> {
        let _: Envelope = self
            .post(&format!("/dns/delete/{}/{}", name.domain, id), &self.auth())
            .await?;
        Ok(())
    }

    fn supported_record_types(&self) -> &[RecordType] {
        SUPPORTED_TYPES
    }

    fn min_ttl(&self) -> Option<u32> {
        Some(PORKBUN_MIN_TTL)
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

/// Factory for creating Porkbun providers
///
/// Uses `api_key` and `api_secret_key` from the service credentials.
pub struct PorkbunFactory;

impl DnsProviderFactory for PorkbunFactory {
    fn create(&self, credentials: &Credentials) -> Result<Box<dyn DnsProvider>> {
        Ok(Box::new(PorkbunProvider::new(
            credentials.api_key.clone(),
            credentials.api_secret_key.clone(),
        )?))
    }
}

/// Register the Porkbun provider with a registry
///
/// # Example
///
/// ```rust
/// use sddns_core::ProviderRegistry;
///
/// let mut registry = ProviderRegistry::new();
/// sddns_provider_porkbun::register(&mut registry);
/// assert!(registry.has_provider("porkbun"));
/// ```
pub fn register(registry: &mut ProviderRegistry) {
    registry.register_provider(PROVIDER, Box::new(PorkbunFactory));
}
