//! DNS record model
//!
//! A [`Record`] is one resource record under management. Records built from
//! local network state never carry a provider identifier; records fetched
//! from a provider always do.
//!
//! ## Identity
//!
//! Two records describe the same remote state when their name, type,
//! content, TTL, priority and notes match after normalization
//! ([`Record::same_as`]). The provider identifier and the `disabled` flag
//! do not take part in the comparison.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// TTL substituted for records that do not specify one
pub const DEFAULT_TTL: u32 = 300;

/// Second-level labels that act as public suffixes (`example.co.uk`)
const SHORT_SECOND_LEVEL: &[&str] = &["co", "com", "net", "org", "gov", "edu", "ac", "ne", "or"];

/// A fully-qualified name split into registered domain and subdomain
///
/// An empty `subdomain` denotes the apex of `domain`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DomainName {
    /// Registered domain (zone), e.g. `example.com`
    pub domain: String,
    /// Label(s) below the zone, e.g. `host`; empty for the apex
    #[serde(default)]
    pub subdomain: String,
}

impl DomainName {
    /// Create a domain name from its parts
    pub fn new(domain: impl Into<String>, subdomain: impl Into<String>) -> Self {
        Self {
            domain: normalize_label(&domain.into()),
            subdomain: normalize_label(&subdomain.into()),
        }
    }

    /// Create the apex name of a zone
    pub fn apex(domain: impl Into<String>) -> Self {
        Self::new(domain, "")
    }

    /// Split a hostname into zone and subdomain
    ///
    /// The zone is the last two labels, or the last three when the
    /// second-level label is a short public suffix (`host.example.co.uk`).
    /// Use [`DomainName::new`] when the zone boundary is known.
    pub fn parse_hostname(hostname: &str) -> crate::Result<Self> {
        let hostname = normalize_label(hostname);
        if hostname.is_empty() {
            return Err(crate::Error::config("Hostname cannot be empty"));
        }

        let labels: Vec<&str> = hostname.split('.').collect();
        if labels.iter().any(|l| l.is_empty()) {
            return Err(crate::Error::config(format!(
                "Hostname has empty label: '{}'",
                hostname
            )));
        }
        if labels.len() < 2 {
            return Err(crate::Error::config(format!(
                "Hostname '{}' has no registered domain",
                hostname
            )));
        }

        let zone_labels = if labels.len() >= 3
            && labels[labels.len() - 1].len() == 2
            && SHORT_SECOND_LEVEL.contains(&labels[labels.len() - 2])
        {
            3
        } else {
            2
        };

        let split = labels.len() - zone_labels;
        Ok(Self {
            domain: labels[split..].join("."),
            subdomain: labels[..split].join("."),
        })
    }

    /// The full name as a provider would display it
    pub fn fqdn(&self) -> String {
        match (self.subdomain.is_empty(), self.domain.is_empty()) {
            (true, _) => self.domain.clone(),
            (false, true) => self.subdomain.clone(),
            (false, false) => format!("{}.{}", self.subdomain, self.domain),
        }
    }

    /// Whether this name is the zone apex
    pub fn is_apex(&self) -> bool {
        self.subdomain.is_empty()
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fqdn())
    }
}

fn normalize_label(s: &str) -> String {
    s.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// DNS record type
///
/// Types the system does not know by name are carried verbatim in
/// [`RecordType::Other`] so fetched records round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RecordType {
    A,
    Aaaa,
    Alias,
    Caa,
    Cname,
    Https,
    Mx,
    Ns,
    Srv,
    Sshfp,
    Svcb,
    Tlsa,
    Txt,
    Other(String),
}

impl RecordType {
    /// Canonical upper-case mnemonic
    pub fn as_str(&self) -> &str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Alias => "ALIAS",
            RecordType::Caa => "CAA",
            RecordType::Cname => "CNAME",
            RecordType::Https => "HTTPS",
            RecordType::Mx => "MX",
            RecordType::Ns => "NS",
            RecordType::Srv => "SRV",
            RecordType::Sshfp => "SSHFP",
            RecordType::Svcb => "SVCB",
            RecordType::Tlsa => "TLSA",
            RecordType::Txt => "TXT",
            RecordType::Other(s) => s,
        }
    }

    /// Address record type for an IP address
    pub fn for_addr(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => RecordType::A,
            IpAddr::V6(_) => RecordType::Aaaa,
        }
    }

    /// Whether records of this type hold an IP address
    pub fn is_address(&self) -> bool {
        matches!(self, RecordType::A | RecordType::Aaaa)
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for RecordType {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => RecordType::A,
            "AAAA" => RecordType::Aaaa,
            "ALIAS" => RecordType::Alias,
            "CAA" => RecordType::Caa,
            "CNAME" => RecordType::Cname,
            "HTTPS" => RecordType::Https,
            "MX" => RecordType::Mx,
            "NS" => RecordType::Ns,
            "SRV" => RecordType::Srv,
            "SSHFP" => RecordType::Sshfp,
            "SVCB" => RecordType::Svcb,
            "TLSA" => RecordType::Tlsa,
            "TXT" => RecordType::Txt,
            other => RecordType::Other(other.to_string()),
        }
    }
}

impl From<String> for RecordType {
    fn from(s: String) -> Self {
        RecordType::from(s.as_str())
    }
}

impl From<RecordType> for String {
    fn from(t: RecordType) -> Self {
        t.as_str().to_string()
    }
}

impl FromStr for RecordType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(RecordType::from(s))
    }
}

/// A DNS resource record under management
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Provider-assigned identifier, present only for fetched records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Owner name
    pub name: DomainName,
    /// Record type
    #[serde(rename = "type")]
    pub record_type: RecordType,
    /// Record data (an address for A/AAAA)
    pub content: String,
    /// Time-to-live in seconds; `None` means [`DEFAULT_TTL`]
    #[serde(default)]
    pub ttl: Option<u32>,
    /// Priority (MX/SRV)
    #[serde(default)]
    pub priority: Option<u32>,
    /// Free-form notes stored alongside the record
    #[serde(default)]
    pub notes: Option<String>,
    /// Whether the record is disabled at the provider
    #[serde(default)]
    pub disabled: bool,
}

impl Record {
    /// Create a record without TTL, priority or notes
    pub fn new(name: DomainName, record_type: RecordType, content: impl Into<String>) -> Self {
        Self {
            id: None,
            name,
            record_type,
            content: content.into(),
            ttl: None,
            priority: None,
            notes: None,
            disabled: false,
        }
    }

    /// Create the address record for `addr`
    pub fn address(name: DomainName, addr: IpAddr) -> Self {
        Self::new(name, RecordType::for_addr(&addr), addr.to_string())
    }

    /// Set the TTL
    pub fn with_ttl(mut self, ttl: Option<u32>) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: Option<u32>) -> Self {
        self.priority = priority;
        self
    }

    /// Set the notes
    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }

    /// Attach a provider identifier
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// TTL after default substitution
    pub fn effective_ttl(&self) -> u32 {
        self.ttl.unwrap_or(DEFAULT_TTL)
    }

    /// Return a copy with defaults applied and content in canonical form
    ///
    /// - missing TTL becomes [`DEFAULT_TTL`]
    /// - empty notes become `None`
    /// - A/AAAA content is re-rendered from the parsed address
    pub fn normalized(&self) -> Self {
        let mut record = self.clone();
        record.ttl = Some(self.effective_ttl());
        record.notes = self.notes.clone().filter(|n| !n.is_empty());
        record.content = self.content.trim().to_string();
        if record.record_type.is_address()
            && let Ok(addr) = record.content.parse::<IpAddr>()
        {
            record.content = addr.to_string();
        }
        record
    }

    /// Identity comparison used by the reconciler
    ///
    /// Ignores the provider identifier and the disabled flag; both sides
    /// are normalized first.
    pub fn same_as(&self, other: &Record) -> bool {
        let a = self.normalized();
        let b = other.normalized();
        a.name == b.name
            && a.record_type == b.record_type
            && a.content == b.content
            && a.ttl == b.ttl
            && a.priority == b.priority
            && a.notes == b.notes
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} ttl={}",
            self.name,
            self.record_type,
            self.content,
            self.effective_ttl()
        )?;
        if let Some(id) = &self.id {
            write!(f, " id={}", id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> DomainName {
        DomainName::new("example.com", "host")
    }

    #[test]
    fn test_fqdn() {
        assert_eq!(host().fqdn(), "host.example.com");
        assert_eq!(DomainName::apex("example.com").fqdn(), "example.com");
        assert_eq!(DomainName::new("", "host").fqdn(), "host");
    }

    #[test]
    fn test_parse_hostname() {
        let name = DomainName::parse_hostname("Host.Example.com.").unwrap();
        assert_eq!(name, host());

        let apex = DomainName::parse_hostname("example.com").unwrap();
        assert!(apex.is_apex());

        let deep = DomainName::parse_hostname("a.b.example.org").unwrap();
        assert_eq!(deep.domain, "example.org");
        assert_eq!(deep.subdomain, "a.b");

        let uk = DomainName::parse_hostname("nas.example.co.uk").unwrap();
        assert_eq!(uk.domain, "example.co.uk");
        assert_eq!(uk.subdomain, "nas");
    }

    #[test]
    fn test_parse_hostname_rejects_bad_input() {
        assert!(DomainName::parse_hostname("").is_err());
        assert!(DomainName::parse_hostname("localhost").is_err());
        assert!(DomainName::parse_hostname("a..example.com").is_err());
    }

    #[test]
    fn test_record_type_parsing() {
        assert_eq!(RecordType::from("aaaa"), RecordType::Aaaa);
        assert_eq!(RecordType::from("A"), RecordType::A);
        assert_eq!(
            RecordType::from("HINFO"),
            RecordType::Other("HINFO".to_string())
        );
        assert_eq!(RecordType::Aaaa.to_string(), "AAAA");
    }

    #[test]
    fn test_ttl_defaulting_in_identity() {
        let implicit = Record::new(host(), RecordType::A, "1.2.3.4");
        let explicit = Record::new(host(), RecordType::A, "1.2.3.4").with_ttl(Some(DEFAULT_TTL));
        assert!(implicit.same_as(&explicit));
        assert_eq!(implicit.normalized().ttl, Some(300));

        let other_ttl = Record::new(host(), RecordType::A, "1.2.3.4").with_ttl(Some(600));
        assert!(!implicit.same_as(&other_ttl));
    }

    #[test]
    fn test_identity_ignores_id_and_disabled() {
        let desired = Record::new(host(), RecordType::A, "1.2.3.4");
        let mut existing = desired.clone().with_id("42");
        existing.disabled = true;
        assert!(desired.same_as(&existing));
    }

    #[test]
    fn test_ipv6_content_is_canonicalized() {
        let a = Record::new(host(), RecordType::Aaaa, "2001:0db8:0000:0000::0001");
        let b = Record::new(host(), RecordType::Aaaa, "2001:db8::1");
        assert!(a.same_as(&b));
    }

    #[test]
    fn test_empty_notes_equal_missing_notes() {
        let a = Record::new(host(), RecordType::A, "1.2.3.4").with_notes(Some(String::new()));
        let b = Record::new(host(), RecordType::A, "1.2.3.4");
        assert!(a.same_as(&b));
    }

    #[test]
    fn test_record_type_serde() {
        let json = serde_json::to_string(&RecordType::Aaaa).unwrap();
        assert_eq!(json, "\"AAAA\"");
        let parsed: RecordType = serde_json::from_str("\"mx\"").unwrap();
        assert_eq!(parsed, RecordType::Mx);
    }
}
