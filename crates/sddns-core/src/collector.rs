//! Network state collector
//!
//! Resolves configured interface names to the addresses currently bound to
//! them. An interface matches when its primary name or any alternate name
//! is requested.
//!
//! A vanished interface or an unreadable address list is logged and
//! contributes nothing. Only a failure to enumerate interfaces at all is
//! an error, so a broken backend never reads as "no addresses".

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::IpAddr;
use tracing::{debug, warn};

use crate::config::{AddressMode, Service};
use crate::error::Result;
use crate::traits::InterfaceSource;

/// Address family filter applied to collected addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    /// Unicast, non-loopback IPv4
    V4,
    /// Unicast, non-loopback IPv6
    V6,
}

impl AddressFamily {
    /// Whether `addr` belongs to this family and is publishable
    ///
    /// Loopback, unspecified, multicast and link-local addresses are
    /// rejected. IPv4-mapped IPv6 addresses count as IPv4.
    pub fn accepts(&self, addr: &IpAddr) -> bool {
        match (self, addr.to_canonical()) {
            (AddressFamily::V4, IpAddr::V4(v4)) => {
                !(v4.is_loopback()
                    || v4.is_unspecified()
                    || v4.is_multicast()
                    || v4.is_broadcast()
                    || v4.is_link_local())
            }
            (AddressFamily::V6, IpAddr::V6(v6)) => {
                let unicast_link_local = (v6.segments()[0] & 0xffc0) == 0xfe80;
                !(v6.is_loopback() || v6.is_unspecified() || v6.is_multicast() || unicast_link_local)
            }
            _ => false,
        }
    }
}

impl std::fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressFamily::V4 => f.write_str("IPv4"),
            AddressFamily::V6 => f.write_str("IPv6"),
        }
    }
}

/// Collect the addresses of `family` bound to any interface named in `names`
///
/// Addresses are returned in discovery order without duplicates.
///
/// # Returns
///
/// - `Ok(Vec<IpAddr>)`: Matching addresses; empty when nothing matches
/// - `Err(Error::Collector)`: The interface list could not be read
pub async fn collect_addresses(
    source: &dyn InterfaceSource,
    names: &[String],
    family: AddressFamily,
) -> Result<Vec<IpAddr>> {
    if names.is_empty() {
        return Ok(Vec::new());
    }

    let interfaces = source.interfaces().await?;

    let mut found = HashSet::new();
    let mut seen = HashSet::new();
    let mut addrs = Vec::new();

    for interface in &interfaces {
        let Some(requested) = names.iter().find(|n| interface.answers_to(n)) else {
            continue;
        };
        found.insert(requested.as_str());

        let bound = match source.addresses(interface).await {
            Ok(bound) => bound,
            Err(e) => {
                warn!("Skipping interface {}: {}", interface.name, e);
                continue;
            }
        };

        for addr in bound {
            let addr = addr.to_canonical();
            if family.accepts(&addr) && seen.insert(addr) {
                addrs.push(addr);
            }
        }
    }

    for name in names {
        if !found.contains(name.as_str()) {
            warn!("Interface {} not found, skipping", name);
        }
    }

    debug!("Collected {} {} address(es) from {:?}", addrs.len(), family, names);
    Ok(addrs)
}

/// Addresses resolved for one service, per family
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedAddresses {
    pub v4: Vec<IpAddr>,
    pub v6: Vec<IpAddr>,
}

impl ResolvedAddresses {
    /// Collect the addresses of every family the service enables
    pub async fn collect(source: &dyn InterfaceSource, service: &Service) -> Result<Self> {
        let mut resolved = Self::default();
        if service.ipv4_type == AddressMode::Interfaces {
            resolved.v4 =
                collect_addresses(source, &service.ipv4_interfaces, AddressFamily::V4).await?;
        }
        if service.ipv6_type == AddressMode::Interfaces {
            resolved.v6 =
                collect_addresses(source, &service.ipv6_interfaces, AddressFamily::V6).await?;
        }
        Ok(resolved)
    }

    /// Whether no address was found for any family
    pub fn is_empty(&self) -> bool {
        self.v4.is_empty() && self.v6.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{NetworkInterface, StaticInterfaceSource};

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn source() -> StaticInterfaceSource {
        StaticInterfaceSource::new()
            .with_interface(NetworkInterface::new(1, "lo"), vec![ip("127.0.0.1"), ip("::1")])
            .with_interface(
                NetworkInterface::new(2, "eth0").with_alt_name("enp3s0"),
                vec![
                    ip("192.0.2.10"),
                    ip("169.254.1.1"),
                    ip("2001:db8::10"),
                    ip("fe80::1"),
                ],
            )
            .with_interface(NetworkInterface::new(3, "wg0"), vec![ip("10.8.0.1")])
    }

    #[test]
    fn test_family_filters() {
        assert!(AddressFamily::V4.accepts(&ip("192.0.2.1")));
        assert!(!AddressFamily::V4.accepts(&ip("127.0.0.1")));
        assert!(!AddressFamily::V4.accepts(&ip("2001:db8::1")));
        assert!(AddressFamily::V4.accepts(&ip("::ffff:192.0.2.1")));

        assert!(AddressFamily::V6.accepts(&ip("2001:db8::1")));
        assert!(!AddressFamily::V6.accepts(&ip("::1")));
        assert!(!AddressFamily::V6.accepts(&ip("fe80::1")));
        assert!(!AddressFamily::V6.accepts(&ip("ff02::1")));
        assert!(!AddressFamily::V6.accepts(&ip("192.0.2.1")));
    }

    #[tokio::test]
    async fn test_collect_by_alt_name() {
        let addrs =
            collect_addresses(&source(), &["enp3s0".to_string()], AddressFamily::V4)
                .await
                .unwrap();
        assert_eq!(addrs, vec![ip("192.0.2.10")]);
    }

    #[tokio::test]
    async fn test_collect_v6_excludes_loopback_and_link_local() {
        let names = vec!["lo".to_string(), "eth0".to_string()];
        let addrs = collect_addresses(&source(), &names, AddressFamily::V6)
            .await
            .unwrap();
        assert_eq!(addrs, vec![ip("2001:db8::10")]);
    }

    #[tokio::test]
    async fn test_missing_interface_is_skipped() {
        let names = vec!["ghost0".to_string(), "wg0".to_string()];
        let addrs = collect_addresses(&source(), &names, AddressFamily::V4)
            .await
            .unwrap();
        assert_eq!(addrs, vec![ip("10.8.0.1")]);
    }

    #[tokio::test]
    async fn test_resolved_addresses_respect_modes() {
        let service = Service::new("s", "memory")
            .with_hostname("h.example.com")
            .with_interfaces(AddressFamily::V6, &["eth0"]);
        let resolved = ResolvedAddresses::collect(&source(), &service)
            .await
            .unwrap();
        assert!(resolved.v4.is_empty());
        assert_eq!(resolved.v6, vec![ip("2001:db8::10")]);
    }

    struct UnreadableSource;

    #[async_trait::async_trait]
    impl InterfaceSource for UnreadableSource {
        async fn interfaces(&self) -> Result<Vec<NetworkInterface>> {
            Err(crate::Error::collector("socket unavailable"))
        }

        async fn addresses(&self, _interface: &NetworkInterface) -> Result<Vec<IpAddr>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_enumeration_failure_is_an_error() {
        let names = vec!["eth0".to_string()];
        let err = collect_addresses(&UnreadableSource, &names, AddressFamily::V4)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::Collector(_)));

        let service = Service::new("s", "memory")
            .with_hostname("h.example.com")
            .with_interfaces(AddressFamily::V4, &["eth0"]);
        assert!(ResolvedAddresses::collect(&UnreadableSource, &service).await.is_err());
    }

    #[tokio::test]
    async fn test_disabled_families_skip_enumeration() {
        let service = Service::new("s", "memory").with_hostname("h.example.com");
        let resolved = ResolvedAddresses::collect(&UnreadableSource, &service)
            .await
            .unwrap();
        assert!(resolved.is_empty());
    }

    #[tokio::test]
    async fn test_no_match_is_empty() {
        let addrs =
            collect_addresses(&source(), &["ghost0".to_string()], AddressFamily::V4)
                .await
                .unwrap();
        assert!(addrs.is_empty());
    }
}
