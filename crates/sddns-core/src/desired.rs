//! Desired-state builder
//!
//! Turns a service and the addresses resolved for it into the record set
//! the provider should hold: one `A` record per hostname and IPv4 address,
//! one `AAAA` record per hostname and IPv6 address.
//!
//! Every configured hostname gets an entry, even when no address was found
//! for it, so the reconciler removes stale records for that name.

use std::collections::BTreeMap;

use crate::collector::ResolvedAddresses;
use crate::config::Service;
use crate::error::Result;
use crate::record::{DomainName, Record, RecordType};

/// Target record set of one service, grouped by domain name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredState {
    /// Record types the service owns; existing records of other types are
    /// left alone
    pub managed_types: Vec<RecordType>,
    /// Desired records per domain name
    pub names: BTreeMap<DomainName, Vec<Record>>,
}

impl DesiredState {
    /// Create an empty state managing `managed_types`
    pub fn new(managed_types: Vec<RecordType>) -> Self {
        Self {
            managed_types,
            names: BTreeMap::new(),
        }
    }

    /// Declare `name` managed, with no records yet
    pub fn add_name(&mut self, name: DomainName) {
        self.names.entry(name).or_default();
    }

    /// Add a desired record under its own name
    pub fn push(&mut self, record: Record) {
        self.names.entry(record.name.clone()).or_default().push(record);
    }

    /// Total number of desired records
    pub fn record_count(&self) -> usize {
        self.names.values().map(Vec::len).sum()
    }

    /// Iterate over every desired record
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.names.values().flatten()
    }
}

/// Build the desired record set for `service`
///
/// Pure function: no I/O, no logging. TTL defaulting is applied to every
/// record, so the result compares directly against normalized provider
/// records.
pub fn build_desired(service: &Service, addrs: &ResolvedAddresses) -> Result<DesiredState> {
    let mut state = DesiredState::new(service.managed_record_types());

    for name in service.domain_names()? {
        state.add_name(name.clone());

        for addr in addrs.v6.iter().chain(addrs.v4.iter()) {
            let record_type = RecordType::for_addr(addr);
            if !state.managed_types.contains(&record_type) {
                continue;
            }
            let record = Record::address(name.clone(), *addr)
                .with_ttl(service.ttl)
                .with_notes(service.notes.clone())
                .normalized();
            state.push(record);
        }
    }

    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::AddressFamily;
    use crate::record::DEFAULT_TTL;

    fn service() -> Service {
        Service::new("home", "memory")
            .with_hostname("a.example.com")
            .with_hostname("b.example.com")
            .with_interfaces(AddressFamily::V4, &["eth0"])
            .with_interfaces(AddressFamily::V6, &["eth0"])
    }

    fn addrs() -> ResolvedAddresses {
        ResolvedAddresses {
            v4: vec!["192.0.2.1".parse().unwrap()],
            v6: vec!["2001:db8::1".parse().unwrap(), "2001:db8::2".parse().unwrap()],
        }
    }

    #[test]
    fn test_one_record_per_host_and_address() {
        let state = build_desired(&service(), &addrs()).unwrap();
        assert_eq!(state.names.len(), 2);
        assert_eq!(state.record_count(), 6);

        let a = &state.names[&DomainName::new("example.com", "a")];
        assert_eq!(a.iter().filter(|r| r.record_type == RecordType::A).count(), 1);
        assert_eq!(a.iter().filter(|r| r.record_type == RecordType::Aaaa).count(), 2);
        assert!(state.records().all(|r| r.id.is_none()));
    }

    #[test]
    fn test_ttl_is_defaulted() {
        let state = build_desired(&service(), &addrs()).unwrap();
        assert!(state.records().all(|r| r.ttl == Some(DEFAULT_TTL)));

        let custom = build_desired(&service().with_ttl(Some(900)), &addrs()).unwrap();
        assert!(custom.records().all(|r| r.ttl == Some(900)));
    }

    #[test]
    fn test_hostnames_without_addresses_are_kept() {
        let state = build_desired(&service(), &ResolvedAddresses::default()).unwrap();
        assert_eq!(state.names.len(), 2);
        assert_eq!(state.record_count(), 0);
        assert_eq!(state.managed_types, vec![RecordType::A, RecordType::Aaaa]);
    }

    #[test]
    fn test_disabled_family_contributes_nothing() {
        let svc = Service::new("v4only", "memory")
            .with_hostname("a.example.com")
            .with_interfaces(AddressFamily::V4, &["eth0"]);
        let state = build_desired(&svc, &addrs()).unwrap();
        assert_eq!(state.record_count(), 1);
        assert_eq!(state.managed_types, vec![RecordType::A]);
    }
}
