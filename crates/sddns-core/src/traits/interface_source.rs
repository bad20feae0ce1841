// # Interface Source Trait
//
// Defines the interface for enumerating network interfaces and the
// addresses currently bound to them.
//
// ## Implementations
//
// - Netlink-based (Linux): `sddns-ip-netlink` crate
// - Fixed tables for tests: `StaticInterfaceSource`
//
// The collector in `crate::collector` sits on top of this trait and turns
// "interface names + address family" into a set of addresses.

use async_trait::async_trait;
use std::collections::HashMap;
use std::net::IpAddr;

/// A network interface as reported by the OS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInterface {
    /// Kernel interface index
    pub index: u32,
    /// Primary name (e.g. `eth0`)
    pub name: String,
    /// Registered alternate names (e.g. `enp3s0`)
    pub alt_names: Vec<String>,
}

impl NetworkInterface {
    /// Create an interface without alternate names
    pub fn new(index: u32, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            alt_names: Vec::new(),
        }
    }

    /// Add an alternate name
    pub fn with_alt_name(mut self, alt_name: impl Into<String>) -> Self {
        self.alt_names.push(alt_name.into());
        self
    }

    /// Whether the primary name or any alternate name equals `name`
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.alt_names.iter().any(|alt| alt == name)
    }
}

/// Trait for interface enumeration backends
///
/// # Trust Level: Semi-Trusted
///
/// ## Allowed Capabilities
/// - ✅ Perform platform-specific I/O (Netlink, sysfs, /proc)
/// - ✅ Run blocking socket work on the blocking thread pool
///
/// ## Forbidden Capabilities
/// - ❌ Filter by address family (owned by the collector)
/// - ❌ Perform DNS updates
#[async_trait]
pub trait InterfaceSource: Send + Sync {
    /// List all interfaces currently known to the OS
    async fn interfaces(&self) -> Result<Vec<NetworkInterface>, crate::Error>;

    /// List the addresses bound to one interface
    ///
    /// Returns an error when the interface vanished or its addresses could
    /// not be read; the collector treats that as "no addresses".
    async fn addresses(&self, interface: &NetworkInterface) -> Result<Vec<IpAddr>, crate::Error>;
}

/// Interface source backed by a fixed table
///
/// Useful on platforms without a native backend and in tests.
#[derive(Debug, Clone, Default)]
pub struct StaticInterfaceSource {
    interfaces: Vec<NetworkInterface>,
    addresses: HashMap<u32, Vec<IpAddr>>,
}

impl StaticInterfaceSource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an interface and its addresses
    pub fn with_interface(mut self, interface: NetworkInterface, addrs: Vec<IpAddr>) -> Self {
        self.addresses.insert(interface.index, addrs);
        self.interfaces.push(interface);
        self
    }
}

#[async_trait]
impl InterfaceSource for StaticInterfaceSource {
    async fn interfaces(&self) -> Result<Vec<NetworkInterface>, crate::Error> {
        Ok(self.interfaces.clone())
    }

    async fn addresses(&self, interface: &NetworkInterface) -> Result<Vec<IpAddr>, crate::Error> {
        self.addresses
            .get(&interface.index)
            .cloned()
            .ok_or_else(|| crate::Error::collector(format!("Interface {} vanished", interface.name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answers_to_alt_names() {
        let iface = NetworkInterface::new(2, "eth0").with_alt_name("enp3s0");
        assert!(iface.answers_to("eth0"));
        assert!(iface.answers_to("enp3s0"));
        assert!(!iface.answers_to("wlan0"));
    }

    #[tokio::test]
    async fn test_static_source_unknown_interface() {
        let source = StaticInterfaceSource::new();
        let ghost = NetworkInterface::new(9, "ghost0");
        assert!(source.addresses(&ghost).await.is_err());
    }
}
