//! Test doubles and common utilities for contract tests
//!
//! `RecordingProvider` keeps records in memory like a provider account,
//! logs every call, and can be told to fail specific calls.

#![allow(dead_code)]

use sddns_core::error::{Error, Result};
use sddns_core::reconcile::ActionKind;
use sddns_core::traits::{
    Credentials, DnsProvider, DnsProviderFactory, InterfaceSource, NetworkInterface,
    StaticInterfaceSource,
};
use sddns_core::{DomainName, Record, RecordType};
use std::collections::HashSet;
use std::net::IpAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A provider call, as observed by `RecordingProvider`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Authenticate,
    List(DomainName),
    Create(Record),
    Edit(String, Record),
    Delete(DomainName, String),
}

#[derive(Default)]
struct State {
    records: Vec<Record>,
    calls: Vec<Call>,
    next_id: u64,
    fail_fetch: HashSet<DomainName>,
    fail_apply: HashSet<(DomainName, ActionKind)>,
    fail_auth: bool,
    in_flight: HashSet<DomainName>,
    overlapped: bool,
}

/// In-memory provider that records calls and injects failures
#[derive(Clone, Default)]
pub struct RecordingProvider {
    state: Arc<Mutex<State>>,
    latency: Option<Duration>,
    max_in_flight: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
}

impl RecordingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Seed an existing record, returning its identifier
    pub fn seed(&self, record: Record) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id.to_string();
        state.records.push(Record {
            id: Some(id.clone()),
            ..record
        });
        id
    }

    /// Make `list_records` fail for `name`
    pub fn fail_fetch(&self, name: DomainName) {
        self.state.lock().unwrap().fail_fetch.insert(name);
    }

    /// Make every `kind` call for `name` fail
    pub fn fail_apply(&self, name: DomainName, kind: ActionKind) {
        self.state.lock().unwrap().fail_apply.insert((name, kind));
    }

    /// Make `authenticate` fail
    pub fn fail_auth(&self) {
        self.state.lock().unwrap().fail_auth = true;
    }

    /// Records currently stored under `name`
    pub fn records_at(&self, name: &DomainName) -> Vec<Record> {
        let state = self.state.lock().unwrap();
        state
            .records
            .iter()
            .filter(|r| r.name == *name)
            .cloned()
            .collect()
    }

    /// Every record currently stored
    pub fn all_records(&self) -> Vec<Record> {
        self.state.lock().unwrap().records.clone()
    }

    /// Every call observed so far
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Number of create/edit/delete calls observed
    pub fn mutation_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Create(_) | Call::Edit(..) | Call::Delete(..)))
            .count()
    }

    /// Highest number of concurrent calls observed
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Whether two calls for the same name ever overlapped
    pub fn saw_same_name_overlap(&self) -> bool {
        self.state.lock().unwrap().overlapped
    }

    async fn enter(&self, name: &DomainName, call: Call) {
        {
            let mut state = self.state.lock().unwrap();
            state.calls.push(call);
            if !state.in_flight.insert(name.clone()) {
                state.overlapped = true;
            }
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn leave(&self, name: &DomainName) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.state.lock().unwrap().in_flight.remove(name);
    }

    fn should_fail(&self, name: &DomainName, kind: ActionKind) -> bool {
        self.state
            .lock()
            .unwrap()
            .fail_apply
            .contains(&(name.clone(), kind))
    }
}

#[async_trait::async_trait]
impl DnsProvider for RecordingProvider {
    async fn authenticate(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Authenticate);
        if state.fail_auth {
            return Err(Error::auth("invalid API key"));
        }
        Ok(())
    }

    async fn list_records(&self, name: &DomainName) -> Result<Vec<Record>> {
        self.enter(name, Call::List(name.clone())).await;
        let result = {
            let state = self.state.lock().unwrap();
            if state.fail_fetch.contains(name) {
                Err(Error::http("connection reset"))
            } else {
                Ok(state
                    .records
                    .iter()
                    .filter(|r| r.name == *name)
                    .cloned()
                    .collect())
            }
        };
        self.leave(name);
        result
    }

    async fn create_record(&self, record: &Record) -> Result<String> {
        self.enter(&record.name, Call::Create(record.clone())).await;
        let result = if self.should_fail(&record.name, ActionKind::Create) {
            Err(Error::provider("recording", "create rejected"))
        } else {
            Ok(self.seed(record.clone()))
        };
        self.leave(&record.name);
        result
    }

    async fn edit_record(&self, id: &str, record: &Record) -> Result<()> {
        self.enter(&record.name, Call::Edit(id.to_string(), record.clone()))
            .await;
        let result = if self.should_fail(&record.name, ActionKind::Edit) {
            Err(Error::provider("recording", "edit rejected"))
        } else {
            let mut state = self.state.lock().unwrap();
            match state
                .records
                .iter_mut()
                .find(|r| r.id.as_deref() == Some(id))
            {
                Some(slot) => {
                    *slot = Record {
                        id: Some(id.to_string()),
                        ..record.clone()
                    };
                    Ok(())
                }
                None => Err(Error::not_found(format!("record {}", id))),
            }
        };
        self.leave(&record.name);
        result
    }

    async fn delete_record(&self, name: &DomainName, id: &str) -> Result<()> {
        self.enter(name, Call::Delete(name.clone(), id.to_string()))
            .await;
        let result = if self.should_fail(name, ActionKind::Delete) {
            Err(Error::provider("recording", "delete rejected"))
        } else {
            let mut state = self.state.lock().unwrap();
            let before = state.records.len();
            state.records.retain(|r| r.id.as_deref() != Some(id));
            if state.records.len() == before {
                Err(Error::not_found(format!("record {}", id)))
            } else {
                Ok(())
            }
        };
        self.leave(name);
        result
    }

    fn supported_record_types(&self) -> &[RecordType] {
        &[RecordType::A, RecordType::Aaaa, RecordType::Txt, RecordType::Mx]
    }

    fn provider_name(&self) -> &'static str {
        "recording"
    }
}

/// Factory handing out clones of one `RecordingProvider`
pub struct RecordingFactory {
    pub provider: RecordingProvider,
    pub created: Arc<Mutex<Vec<Credentials>>>,
}

impl RecordingFactory {
    pub fn new(provider: RecordingProvider) -> Self {
        Self {
            provider,
            created: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl DnsProviderFactory for RecordingFactory {
    fn create(&self, credentials: &Credentials) -> Result<Box<dyn DnsProvider>> {
        self.created.lock().unwrap().push(credentials.clone());
        Ok(Box::new(self.provider.clone()))
    }
}

pub fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

pub fn host(sub: &str) -> DomainName {
    DomainName::new("example.com", sub)
}

pub fn a(name: &DomainName, content: &str) -> Record {
    Record::new(name.clone(), RecordType::A, content)
}

pub fn aaaa(name: &DomainName, content: &str) -> Record {
    Record::new(name.clone(), RecordType::Aaaa, content)
}

/// `eth0` with one public address per family
pub fn lan_source() -> StaticInterfaceSource {
    StaticInterfaceSource::new().with_interface(
        NetworkInterface::new(2, "eth0").with_alt_name("enp3s0"),
        vec![ip("192.0.2.10"), ip("2001:db8::10"), ip("fe80::10")],
    )
}

/// Interface source whose interface list cannot be read at all
pub struct UnreadableSource;

#[async_trait::async_trait]
impl InterfaceSource for UnreadableSource {
    async fn interfaces(&self) -> Result<Vec<NetworkInterface>> {
        Err(Error::collector("Netlink socket failed: permission denied"))
    }

    async fn addresses(&self, _interface: &NetworkInterface) -> Result<Vec<IpAddr>> {
        Ok(Vec::new())
    }
}

/// Write a service file with a single service into `dir`
pub fn write_service(dir: &Path, file: &str, name: &str, provider: &str, hostnames: &[&str]) {
    let hosts = hostnames
        .iter()
        .map(|h| format!("      - {}", h))
        .collect::<Vec<_>>()
        .join("\n");
    let yaml = format!(
        "services:\n  - name: {name}\n    type: {provider}\n    hostnames:\n{hosts}\n    ipv4_type: interfaces\n    ipv4_interfaces: [eth0]\n    ipv6_type: interfaces\n    ipv6_interfaces: [enp3s0]\n    api_key: pk1_{name}\n    api_secret_key: sk1_{name}\n"
    );
    std::fs::write(dir.join(file), yaml).unwrap();
}
