//! Porkbun JSON API v3 wire types

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use sddns_core::{DomainName, Record, RecordType};

/// Credentials carried in every request body
#[derive(Debug, Serialize)]
pub struct Auth<'a> {
    pub apikey: &'a str,
    pub secretapikey: &'a str,
}

/// Body of `/dns/create` and `/dns/edit`
#[derive(Debug, Serialize)]
pub struct RecordRequest<'a> {
    #[serde(flatten)]
    pub auth: Auth<'a>,
    /// Subdomain only; empty for the apex
    pub name: &'a str,
    #[serde(rename = "type")]
    pub record_type: &'a str,
    pub content: &'a str,
    pub ttl: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<&'a str>,
}

impl<'a> RecordRequest<'a> {
    pub fn new(auth: Auth<'a>, record: &'a Record) -> Self {
        Self {
            auth,
            name: &record.name.subdomain,
            record_type: record.record_type.as_str(),
            content: &record.content,
            ttl: record.effective_ttl().to_string(),
            prio: record.priority.map(|p| p.to_string()),
            notes: record.notes.as_deref(),
        }
    }
}

/// Every response carries `status`; errors add `message`
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl Envelope {
    pub fn is_success(&self) -> bool {
        self.status.eq_ignore_ascii_case("SUCCESS")
    }
}

/// `/dns/retrieve/{domain}` response
#[derive(Debug, Deserialize)]
pub struct RetrieveResponse {
    #[serde(default)]
    pub records: Vec<PorkbunRecord>,
}

/// `/dns/create/{domain}` response
#[derive(Debug, Deserialize)]
pub struct CreateResponse {
    pub id: Value,
}

impl CreateResponse {
    /// The new record's identifier, whether sent as number or string
    pub fn id(&self) -> Option<String> {
        match &self.id {
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        }
    }
}

/// A record as returned by `/dns/retrieve`
#[derive(Debug, Clone, Deserialize)]
pub struct PorkbunRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// Fully-qualified owner name
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub content: String,
    #[serde(default, deserialize_with = "opt_u32")]
    pub ttl: Option<u32>,
    #[serde(default, deserialize_with = "opt_u32")]
    pub prio: Option<u32>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl PorkbunRecord {
    /// Convert to a core record owned by `name`
    ///
    /// A priority of 0 means "unset" and empty notes become `None`.
    pub fn into_record(self, name: &DomainName) -> Record {
        Record {
            id: Some(self.id),
            name: name.clone(),
            record_type: RecordType::from(self.record_type.as_str()),
            content: self.content,
            ttl: self.ttl,
            priority: self.prio.filter(|p| *p != 0),
            notes: self.notes.filter(|n| !n.is_empty()),
            disabled: false,
        }
    }
}

/// Keep the records owned by exactly `name`
///
/// `/dns/retrieve` returns the whole zone.
pub fn records_for(name: &DomainName, records: Vec<PorkbunRecord>) -> Vec<Record> {
    let fqdn = name.fqdn();
    records
        .into_iter()
        .filter(|r| r.name.trim_end_matches('.').eq_ignore_ascii_case(&fqdn))
        .map(|r| r.into_record(name))
        .collect()
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

/// Accept `"600"`, `600`, `""` and `null`
fn opt_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("out of range: {}", n))),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("not a number: {}", s))),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}
