//! Configuration types for sddns
//!
//! Two layers of configuration exist:
//!
//! - [`Service`] descriptors, loaded fresh from a directory of YAML files at
//!   the start of every cycle ([`load_services`]).
//! - [`EngineConfig`], fixed for the lifetime of the engine.
//!
//! ## Service file format
//!
//! ```yaml
//! services:
//!   - name: home
//!     type: porkbun
//!     hostnames:
//!       - nas.example.com
//!       - { domain: example.com, subdomain: "" }
//!     ipv4_type: interfaces
//!     ipv4_interfaces: [eth0]
//!     ipv6_type: interfaces
//!     ipv6_interfaces: [eth0, enp3s0]
//!     ttl: 600
//!     api_key: pk1_...
//!     api_secret_key: sk1_...
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReadDirStream;
use tracing::{debug, error, warn};

use crate::collector::AddressFamily;
use crate::error::{Error, Result};
use crate::record::{DomainName, RecordType};
use crate::traits::Credentials;

/// Per-family address mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressMode {
    /// No records of this family are managed
    #[default]
    Disabled,
    /// Addresses are read from the listed interfaces
    Interfaces,
}

/// A hostname entry in a service
///
/// Either a plain name, split with [`DomainName::parse_hostname`], or an
/// explicit zone/subdomain pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Hostname {
    /// `host.example.com`
    Name(String),
    /// `{ domain: example.com, subdomain: host }`
    Parts {
        domain: String,
        #[serde(default)]
        subdomain: String,
    },
}

impl Hostname {
    /// Resolve to a domain name
    pub fn to_domain_name(&self) -> Result<DomainName> {
        match self {
            Hostname::Name(name) => DomainName::parse_hostname(name),
            Hostname::Parts { domain, subdomain } => {
                if domain.trim().is_empty() {
                    return Err(Error::config("Hostname domain cannot be empty"));
                }
                Ok(DomainName::new(domain.as_str(), subdomain.as_str()))
            }
        }
    }
}

/// A unit of configuration: one provider account and the hostnames it keeps
/// pointed at this machine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    /// Logical name (for logging)
    pub name: String,

    /// Provider type key, looked up in the provider registry
    #[serde(rename = "type")]
    pub provider: String,

    /// Hostnames to manage
    #[serde(default)]
    pub hostnames: Vec<Hostname>,

    #[serde(default, deserialize_with = "deserialize_mode")]
    pub ipv4_type: AddressMode,

    #[serde(default)]
    pub ipv4_interfaces: Vec<String>,

    #[serde(default, deserialize_with = "deserialize_mode")]
    pub ipv6_type: AddressMode,

    #[serde(default)]
    pub ipv6_interfaces: Vec<String>,

    /// TTL for every managed record; empty means the default
    #[serde(default, deserialize_with = "deserialize_ttl")]
    pub ttl: Option<u32>,

    /// Notes stamped onto every managed record
    #[serde(default)]
    pub notes: Option<String>,

    /// Provider credentials
    #[serde(flatten)]
    pub credentials: Credentials,
}

impl Service {
    /// Create a service with both families disabled
    pub fn new(name: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider: provider.into(),
            hostnames: Vec::new(),
            ipv4_type: AddressMode::Disabled,
            ipv4_interfaces: Vec::new(),
            ipv6_type: AddressMode::Disabled,
            ipv6_interfaces: Vec::new(),
            ttl: None,
            notes: None,
            credentials: Credentials::default(),
        }
    }

    /// Add a hostname
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostnames.push(Hostname::Name(hostname.into()));
        self
    }

    /// Read addresses of `family` from `interfaces`
    pub fn with_interfaces(mut self, family: AddressFamily, interfaces: &[&str]) -> Self {
        let names = interfaces.iter().map(|s| s.to_string()).collect();
        match family {
            AddressFamily::V4 => {
                self.ipv4_type = AddressMode::Interfaces;
                self.ipv4_interfaces = names;
            }
            AddressFamily::V6 => {
                self.ipv6_type = AddressMode::Interfaces;
                self.ipv6_interfaces = names;
            }
        }
        self
    }

    /// Set the TTL
    pub fn with_ttl(mut self, ttl: Option<u32>) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the credentials
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Mode configured for `family`
    pub fn mode(&self, family: AddressFamily) -> AddressMode {
        match family {
            AddressFamily::V4 => self.ipv4_type,
            AddressFamily::V6 => self.ipv6_type,
        }
    }

    /// Interfaces configured for `family`
    pub fn interfaces(&self, family: AddressFamily) -> &[String] {
        match family {
            AddressFamily::V4 => &self.ipv4_interfaces,
            AddressFamily::V6 => &self.ipv6_interfaces,
        }
    }

    /// Record types this service owns at each of its hostnames
    pub fn managed_record_types(&self) -> Vec<RecordType> {
        let mut types = Vec::new();
        if self.ipv4_type == AddressMode::Interfaces {
            types.push(RecordType::A);
        }
        if self.ipv6_type == AddressMode::Interfaces {
            types.push(RecordType::Aaaa);
        }
        types
    }

    /// Resolve every hostname, deduplicated in configuration order
    pub fn domain_names(&self) -> Result<Vec<DomainName>> {
        let mut names: Vec<DomainName> = Vec::with_capacity(self.hostnames.len());
        for hostname in &self.hostnames {
            let name = hostname.to_domain_name()?;
            if !names.contains(&name) {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Validate the service
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::config("Service name cannot be empty"));
        }
        if self.provider.trim().is_empty() {
            return Err(Error::config(format!(
                "Service {} has no provider type",
                self.name
            )));
        }
        if self.hostnames.is_empty() {
            return Err(Error::config(format!(
                "Service {} has no hostnames",
                self.name
            )));
        }
        self.domain_names()?;

        for family in [AddressFamily::V4, AddressFamily::V6] {
            if self.mode(family) == AddressMode::Interfaces && self.interfaces(family).is_empty() {
                return Err(Error::config(format!(
                    "Service {} uses interfaces for {} but lists none",
                    self.name, family
                )));
            }
        }

        if self.ttl == Some(0) {
            return Err(Error::config(format!(
                "Service {} has a TTL of 0",
                self.name
            )));
        }

        Ok(())
    }
}

/// Accept `disabled`, `interfaces`, an empty string and null (disabled)
fn deserialize_mode<'de, D>(deserializer: D) -> std::result::Result<AddressMode, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(AddressMode::Disabled),
        Some(s) => match s.trim().to_ascii_lowercase().as_str() {
            "" | "disabled" => Ok(AddressMode::Disabled),
            "interfaces" => Ok(AddressMode::Interfaces),
            other => Err(serde::de::Error::custom(format!(
                "invalid address mode: {} (expected disabled or interfaces)",
                other
            ))),
        },
    }
}

/// Accept `ttl: 600`, `ttl: "600"` and `ttl: ""`
fn deserialize_ttl<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Ttl {
        Number(u32),
        Text(String),
    }

    match Option::<Ttl>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Ttl::Number(n)) => Ok(Some(n)),
        Some(Ttl::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(Ttl::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid TTL: {}", s))),
    }
}

/// Top-level layout of a service file
#[derive(Debug, Default, Deserialize)]
struct ServiceFile {
    #[serde(default)]
    services: Vec<serde_yml::Value>,
}

/// Parse the services in one YAML document
///
/// Entries that fail to parse or validate are logged and skipped; the
/// returned error covers only a document that is not YAML at all.
pub fn parse_services(source: &str, origin: &str) -> Result<Vec<Service>> {
    if source.trim().is_empty() {
        return Ok(Vec::new());
    }

    let file: ServiceFile = serde_yml::from_str(source)?;
    let mut services = Vec::with_capacity(file.services.len());

    for (i, value) in file.services.into_iter().enumerate() {
        let service: Service = match serde_yml::from_value(value) {
            Ok(service) => service,
            Err(e) => {
                error!("Skipping service #{} in {}: {}", i, origin, e);
                continue;
            }
        };

        if let Err(e) = service.validate() {
            error!("Skipping service #{} in {}: {}", i, origin, e);
            continue;
        }

        services.push(service);
    }

    Ok(services)
}

/// Load every service from the `*.yaml`/`*.yml` files in `dir`
///
/// Files are read in name order. Unreadable or unparseable files are logged
/// and skipped.
///
/// # Returns
///
/// - `Ok(Vec<Service>)`: All valid services
/// - `Err(Error::Config)`: If the directory itself cannot be read
pub async fn load_services(dir: &Path) -> Result<Vec<Service>> {
    let read_dir = tokio::fs::read_dir(dir).await.map_err(|e| {
        Error::config(format!(
            "Failed to read config directory {}: {}",
            dir.display(),
            e
        ))
    })?;

    let mut paths = Vec::new();
    let mut entries = ReadDirStream::new(read_dir);
    while let Some(entry) = entries.next().await {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Failed to read entry in {}: {}", dir.display(), e);
                continue;
            }
        };
        // Symlinks are followed, so a link to a file still loads.
        match tokio::fs::metadata(entry.path()).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => paths.push(entry.path()),
            Err(e) => warn!("Skipping {}: {}", entry.path().display(), e),
        }
    }
    paths.sort();

    let mut services = Vec::new();
    for path in paths {
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        if !is_yaml {
            continue;
        }

        let source = match tokio::fs::read_to_string(&path).await {
            Ok(source) => source,
            Err(e) => {
                error!("Failed to read {}: {}", path.display(), e);
                continue;
            }
        };

        match parse_services(&source, &path.display().to_string()) {
            Ok(loaded) => {
                debug!("Loaded {} service(s) from {}", loaded.len(), path.display());
                services.extend(loaded);
            }
            Err(e) => error!("Failed to parse {}: {}", path.display(), e),
        }
    }

    Ok(services)
}

/// Platform default for the service configuration directory
pub fn default_config_dir() -> PathBuf {
    let base = if cfg!(any(target_os = "freebsd", target_os = "macos")) {
        "/usr/local/etc"
    } else {
        "/etc"
    };
    Path::new(base).join("sddns").join("config.d")
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding service files
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,

    /// Sleep between the end of one cycle and the start of the next (in seconds)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Plan actions but never apply them
    #[serde(default)]
    pub dry_run: bool,

    /// Capacity of the internal event channel
    ///
    /// When full, new events are dropped (with a warning log).
    ///
    /// Default: 1000 events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Create a configuration reading services from `config_dir`
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            ..Self::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            return Err(Error::config("Polling interval must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            interval_secs: default_interval_secs(),
            dry_run: false,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_interval_secs() -> u64 {
    20
}

fn default_event_channel_capacity() -> usize {
    1000
}
