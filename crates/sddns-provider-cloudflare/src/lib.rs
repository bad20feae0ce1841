// # Cloudflare DNS Provider
//
// This crate provides a Cloudflare DNS provider implementation for sddns.
//
// ## Implementation Status
//
// - ✅ One HTTP request per provider call (plus one zone lookup per domain)
// - ✅ Full error propagation to the reconciler
// - ✅ HTTP timeout configured (30 seconds)
// - ✅ In-flight requests bounded per instance
// - ✅ Specific error handling for HTTP status codes (401/403, 404, 409, 429, 5xx)
// - ✅ Zone auto-discovery from the record's domain
// - ❌ NO retry logic (the next cycle is the retry)
// - ❌ NO record caching (records are fetched fresh every pass)
// - ❌ NO background tasks
//
// ### Trust Level: Untrusted (DNS Provider)
//
// **Allowed Capabilities**:
// - ✅ Perform HTTPS API calls to api.cloudflare.com only
// - ✅ Parse provider-specific responses
// - ✅ Remember zone identifiers for the lifetime of one instance
//
// **Forbidden Capabilities**:
// - ❌ Spawn tasks or threads
// - ❌ Implement retry logic
// - ❌ Decide which records should exist
//
// ## Security Requirements
//
// - API token NEVER appears in logs
// - Provider MUST fail fast if the token is empty
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - Verify token: GET `/user/tokens/verify`
// - List zones: GET `/zones?name=...`
// - List DNS records: GET `/zones/:zone_id/dns_records?name=...`
// - Create DNS record: POST `/zones/:zone_id/dns_records`
// - Overwrite DNS record: PUT `/zones/:zone_id/dns_records/:record_id`
// - Delete DNS record: DELETE `/zones/:zone_id/dns_records/:record_id`

mod types;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use sddns_core::traits::{Credentials, DnsProvider, DnsProviderFactory};
use sddns_core::{DomainName, Error, ProviderRegistry, Record, RecordType, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};

use types::{
    CloudflareDnsRecord, CloudflareResponse, CloudflareZone, CreatedRecord, DnsRecordRequest,
    TokenStatus,
};

/// Cloudflare API base URL
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Concurrent requests per provider instance
const MAX_IN_FLIGHT: usize = 4;

/// Lowest explicit TTL Cloudflare accepts (1 means "automatic")
const CLOUDFLARE_MIN_TTL: u32 = 60;

const SUPPORTED_TYPES: &[RecordType] = &[
    RecordType::A,
    RecordType::Aaaa,
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

const PROVIDER: &str = "cloudflare";

/// Cloudflare DNS provider
///
/// # Trust Level: Untrusted
///
/// This provider is isolated and single-shot. All coordination is owned
/// by the reconciler.
///
/// # Security
///
/// The Debug implementation does NOT expose the API token.
pub struct CloudflareProvider {
    /// ⚠️ NEVER log this value
    api_token: String,

    /// API base URL, overridable for tests
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Bounds concurrent requests from the per-domain tasks
    permits: Semaphore,

    /// Zone identifiers resolved so far, keyed by domain
    zones: Mutex<HashMap<String, String>>,
}

impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with `Zone:DNS:Edit` permission
    ///
    /// # Returns
    ///
    /// - `Err(Error::Config)`: If the token is empty
    /// - `Err(Error::Http)`: If the HTTP client cannot be built
    pub fn new(api_token: impl Into<String>) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.is_empty() {
            return Err(Error::config("Cloudflare requires an API token in api_key"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token,
            base_url: CLOUDFLARE_API_BASE.to_string(),
            client,
            permits: Semaphore::new(MAX_IN_FLIGHT),
            zones: Mutex::new(HashMap::new()),
        })
    }

    /// Point the provider at another API endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Send one request and decode the `result` field
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /zones/:zone_id/dns_records?name=host.example.com
    /// Authorization: Bearer <token>
    /// ```
    async fn request<B, T>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<Option<T>>
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
        tracing::debug!("{} {}", method, url);

        let mut builder = self
            .client
            .request(method, &url)
            .bearer_auth(&self.api_token)
            .query(query);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::http(format!("Cloudflare request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read Cloudflare response: {}", e)))?;

        decode(status, &text)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        self.request::<(), T>(Method::GET, path, query, None)
            .await?
            .ok_or_else(|| Error::provider(PROVIDER, format!("empty result from {}", path)))
    }

    /// Resolve the zone identifier for `domain`
    async fn zone_id(&self, domain: &str) -> Result<String> {
        let key = domain.to_ascii_lowercase();
        if let Some(id) = self.zones.lock().await.get(&key) {
            return Ok(id.clone());
        }

        let zones: Vec<CloudflareZone> = self.get("/zones", &[("name", key.as_str())]).await?;
        let zone = zones
            .into_iter()
            .find(|z| z.name.eq_ignore_ascii_case(&key))
            .ok_or_else(|| {
                Error::not_found(format!("Cloudflare zone not found for domain: {}", domain))
            })?;

        tracing::debug!("Cloudflare zone {} is {}", zone.name, zone.id);
        self.zones.lock().await.insert(key, zone.id.clone());
        Ok(zone.id)
    }
}

/// Map a Cloudflare response to its `result` or an error
fn decode<T: DeserializeOwned>(status: StatusCode, text: &str) -> Result<Option<T>> {
    let response: CloudflareResponse<T> = match serde_json::from_str(text) {
        Ok(response) => response,
        Err(_) if !status.is_success() => return Err(status_error(status, text)),
        Err(e) => {
            return Err(Error::provider(
                PROVIDER,
                format!("Failed to parse response: {}", e),
            ));
        }
    };

    if !status.is_success() || !response.success {
        return Err(status_error(status, &response.error_message()));
    }

    Ok(response.result)
}

/// Map an HTTP status and error message to a core error
fn status_error(status: StatusCode, message: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::auth(format!("Cloudflare rejected the API token: {}", message)),
        404 => Error::not_found(format!("Cloudflare: {}", message)),
        409 => Error::provider(PROVIDER, format!("Conflict: {}", message)),
        429 => Error::rate_limited(format!("Cloudflare: {}", message)),
        500..=599 => Error::http(format!(
            "Cloudflare server error (transient): {} - {}",
            status, message
        )),
        _ => Error::provider(PROVIDER, message.to_string()),
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    async fn authenticate(&self) -> Result<()> {
        let token: TokenStatus = self.get("/user/tokens/verify", &[]).await?;
        if token.status != "active" {
            return Err(Error::auth(format!(
                "Cloudflare API token is {}",
                token.status
            )));
        }
        tracing::debug!("Cloudflare token verified");
        Ok(())
    }

    async fn list_records(&self, name: &DomainName) -> Result<Vec<Record>> {
        let zone_id = self.zone_id(&name.domain).await?;
        let fqdn = name.fqdn();
        let records: Vec<CloudflareDnsRecord> = self
            .get(
                &format!("/zones/{}/dns_records", zone_id),
                &[("name", fqdn.as_str()), ("per_page", "5000")],
            )
            .await?;

        let records: Vec<Record> = records
            .into_iter()
            .filter(|r| r.name.eq_ignore_ascii_case(&fqdn))
            .map(|r| r.into_record(name))
            .collect();
        tracing::debug!("Cloudflare holds {} record(s) at {}", records.len(), name);
        Ok(records)
    }

    async fn create_record(&self, record: &Record) -> Result<String> {
        let zone_id = self.zone_id(&record.name.domain).await?;
        let created: Option<CreatedRecord> = self
            .request(
                Method::POST,
                &format!("/zones/{}/dns_records", zone_id),
                &[],
                Some(&DnsRecordRequest::new(record)),
            )
            .await?;
        created
            .map(|c| c.id)
            .ok_or_else(|| Error::provider(PROVIDER, "create response carried no record id"))
    }

    async fn edit_record(&self, id: &str, record: &Record) -> Result<()> {
        let zone_id = self.zone_id(&record.name.domain).await?;
        let _: Option<serde_json::Value> = self
            .request(
                Method::PUT,
                &format!("/zones/{}/dns_records/{}", zone_id, id),
                &[],
                Some(&DnsRecordRequest::new(record)),
            )
            .await?;
        Ok(())
    }

    async fn delete_record(&self, name: &DomainName, id: &str) -> Result<()> {
        let zone_id = self.zone_id(&name.domain).await?;
        let _: Option<serde_json::Value> = self
            .request::<(), _>(
                Method::DELETE,
                &format!("/zones/{}/dns_records/{}", zone_id, id),
                &[],
                None,
            )
            .await?;
        Ok(())
    }

    fn supported_record_types(&self) -> &[RecordType] {
        SUPPORTED_TYPES
    }

    fn min_ttl(&self) -> Option<u32> {
        Some(CLOUDFLARE_MIN_TTL)
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

/// Factory for creating Cloudflare providers
///
/// The service's `api_key` carries the API token.
pub struct CloudflareFactory;

impl DnsProviderFactory for CloudflareFactory {
    fn create(&self, credentials: &Credentials) -> Result<Box<dyn DnsProvider>> {
        Ok(Box::new(CloudflareProvider::new(
            credentials.api_key.clone(),
        )?))
    }
}

/// Register the Cloudflare provider with a registry
///
/// # Example
///
/// ```rust
/// use sddns_core::ProviderRegistry;
///
/// let mut registry = ProviderRegistry::new();
/// sddns_provider_cloudflare::register(&mut registry);
/// assert!(registry.has_provider("cloudflare"));
/// ```
pub fn register(registry: &mut ProviderRegistry) {
    registry.register_provider(PROVIDER, Box::new(CloudflareFactory));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(api_key: &str) -> Credentials {
        Credentials {
            api_key: api_key.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_factory_creation() {
        let provider = CloudflareFactory.create(&token("cf_token")).unwrap();
        assert_eq!(provider.provider_name(), "cloudflare");
        assert_eq!(provider.min_ttl(), Some(60));
    }

    #[test]
    fn test_factory_empty_token() {
        let err = CloudflareFactory.create(&token("")).err().unwrap();
        assert!(err.is_config());
    }

    #[test]
    fn test_token_not_exposed_in_debug() {
        let provider = CloudflareProvider::new("secret_token_12345").unwrap();
        let debug_str = format!("{:?}", provider);
        assert!(!debug_str.contains("secret_token_12345"));
        assert!(debug_str.contains("<REDACTED>"));
    }

    #[test]
    fn test_supported_types() {
        let provider = CloudflareProvider::new("token").unwrap();
        assert!(provider.supports_record_type(&RecordType::Https));
        assert!(!provider.supports_record_type(&RecordType::Alias));
    }

    #[test]
    fn test_decode_result() {
        let zones: Option<Vec<CloudflareZone>> = decode(
            StatusCode::OK,
            r#"{"success":true,"errors":[],"result":[{"id":"z1","name":"example.com"}]}"#,
        )
        .unwrap();
        let zones = zones.unwrap();
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].id, "z1");
    }

    #[test]
    fn test_decode_errors() {
        let err = decode::<TokenStatus>(
            StatusCode::UNAUTHORIZED,
            r#"{"success":false,"errors":[{"code":1000,"message":"Invalid API Token"}],"result":null}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));

        let err = decode::<CreatedRecord>(
            StatusCode::BAD_REQUEST,
            r#"{"success":false,"errors":[{"code":81057,"message":"Record already exists."}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Provider { .. }));

        let err = decode::<CreatedRecord>(StatusCode::BAD_GATEWAY, "<html>").unwrap_err();
        assert!(matches!(err, Error::Http(_)));
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, "gone"),
            Error::NotFound(_)
        ));
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, "slow down"),
            Error::RateLimited(_)
        ));
        assert!(matches!(
            status_error(StatusCode::CONFLICT, "busy"),
            Error::Provider { .. }
        ));
    }

    #[tokio::test]
    async fn test_zone_id_memoized() {
        let provider = CloudflareProvider::new("token")
            .unwrap()
            .with_base_url("http://127.0.0.1:9");
        provider
            .zones
            .lock()
            .await
            .insert("example.com".to_string(), "z1".to_string());

        assert_eq!(provider.zone_id("Example.COM").await.unwrap(), "z1");
    }

    #[test]
    fn test_register() {
        let mut registry = ProviderRegistry::new();
        register(&mut registry);
        assert!(registry.has_provider("cloudflare"));
    }
}
