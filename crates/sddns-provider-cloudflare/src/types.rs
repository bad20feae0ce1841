//! Cloudflare API v4 wire types

use serde::{Deserialize, Serialize};

use sddns_core::{DomainName, Record, RecordType};

/// Common response envelope
#[derive(Debug, Deserialize)]
pub struct CloudflareResponse<T> {
    pub success: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub errors: Vec<CloudflareError>,
}

impl<T> CloudflareResponse<T> {
    /// All error messages joined for display
    pub fn error_message(&self) -> String {
        if self.errors.is_empty() {
            return "unknown error".to_string();
        }
        self.errors
            .iter()
            .map(|e| format!("{} ({})", e.message, e.code))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Deserialize)]
pub struct CloudflareError {
    pub code: i64,
    pub message: String,
}

/// Entry of `GET /zones`
#[derive(Debug, Deserialize)]
pub struct CloudflareZone {
    pub id: String,
    pub name: String,
}

/// Result of `GET /user/tokens/verify`
#[derive(Debug, Deserialize)]
pub struct TokenStatus {
    pub status: String,
}

/// Record as returned by `GET /zones/:zone_id/dns_records`
#[derive(Debug, Deserialize)]
pub struct CloudflareDnsRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    pub content: String,
    pub ttl: u32,
    #[serde(default)]
    pub priority: Option<u32>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl CloudflareDnsRecord {
    /// Convert to a core record owned by `name`
    pub fn into_record(self, name: &DomainName) -> Record {
        Record {
            id: Some(self.id),
            name: name.clone(),
            record_type: RecordType::from(self.record_type.as_str()),
            content: self.content,
            ttl: Some(self.ttl),
            priority: self.priority,
            notes: self.comment.filter(|c| !c.is_empty()),
            disabled: false,
        }
    }
}

/// Only the identifier of a created record
#[derive(Debug, Deserialize)]
pub struct CreatedRecord {
    pub id: String,
}

/// Body of record create (`POST`) and overwrite (`PUT`)
#[derive(Debug, Serialize)]
pub struct DnsRecordRequest<'a> {
    #[serde(rename = "type")]
    pub record_type: &'a str,
    /// Fully-qualified owner name
    pub name: String,
    pub content: &'a str,
    pub ttl: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<&'a str>,
    /// Address records are published unproxied so they resolve to this host
    pub proxied: bool,
}

impl<'a> DnsRecordRequest<'a> {
    pub fn new(record: &'a Record) -> Self {
        Self {
            record_type: record.record_type.as_str(),
            name: record.name.fqdn(),
            content: &record.content,
            ttl: record.effective_ttl(),
            priority: record.priority,
            comment: record.notes.as_deref(),
            proxied: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_response() {
        let json = r#"{
            "success": true,
            "errors": [],
            "messages": [],
            "result": [{
                "id": "372e67954025e0ba6aaa6d586b9e0b59",
                "type": "AAAA",
                "name": "host.example.com",
                "content": "2001:db8::1",
                "proxiable": true,
                "proxied": false,
                "ttl": 300,
                "comment": null,
                "zone_id": "023e105f4ecef8ad9ca31a8372d0c353"
            }],
            "result_info": {"page": 1, "per_page": 100, "count": 1, "total_count": 1}
        }"#;
        let response: CloudflareResponse<Vec<CloudflareDnsRecord>> =
            serde_json::from_str(json).unwrap();
        assert!(response.success);

        let name = DomainName::new("example.com", "host");
        let record = response.result.unwrap().remove(0).into_record(&name);
        assert_eq!(record.record_type, RecordType::Aaaa);
        assert_eq!(record.ttl, Some(300));
        assert_eq!(record.notes, None);
        assert_eq!(record.id.as_deref(), Some("372e67954025e0ba6aaa6d586b9e0b59"));
    }

    #[test]
    fn test_error_message() {
        let json = r#"{
            "success": false,
            "errors": [{"code": 9109, "message": "Invalid access token"}],
            "result": null
        }"#;
        let response: CloudflareResponse<TokenStatus> = serde_json::from_str(json).unwrap();
        assert!(!response.success);
        assert_eq!(response.error_message(), "Invalid access token (9109)");
    }

    #[test]
    fn test_request_uses_fqdn_and_notes() {
        let record = Record::new(DomainName::apex("example.com"), RecordType::A, "192.0.2.1")
            .with_notes(Some("sddns".to_string()));
        let body = serde_json::to_value(DnsRecordRequest::new(&record)).unwrap();

        assert_eq!(body["name"], "example.com");
        assert_eq!(body["ttl"], 300);
        assert_eq!(body["comment"], "sddns");
        assert_eq!(body["proxied"], false);
        assert!(body.get("priority").is_none());
    }
}
