// # Netlink Interface Source
//
// This crate provides a Netlink-based interface source for Linux systems.
//
// ## Implementation
//
// Every call opens a `NETLINK_ROUTE` socket, sends one dump request
// (`RTM_GETLINK` or `RTM_GETADDR`) and reads until `NLMSG_DONE`. The socket
// is blocking and lives on the blocking thread pool for the duration of
// the dump, so nothing outlives the call.
//
// - Interfaces carry their `IFLA_IFNAME` and every `IFLA_ALT_IFNAME`
// - Addresses prefer `IFA_LOCAL` over `IFA_ADDRESS` (they differ on
//   point-to-point links, where `IFA_ADDRESS` is the peer)
//
// ## Platform Support
//
// Netlink is Linux-specific. On other platforms the source compiles but
// every call returns `Error::Collector`.

use async_trait::async_trait;
use sddns_core::traits::{InterfaceSource, NetworkInterface};
use sddns_core::{Error, Result};
use std::net::IpAddr;

/// Interface source reading the kernel routing tables over Netlink
#[derive(Debug, Clone, Copy, Default)]
pub struct NetlinkInterfaceSource;

impl NetlinkInterfaceSource {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(target_os = "linux")]
#[async_trait]
impl InterfaceSource for NetlinkInterfaceSource {
    async fn interfaces(&self) -> Result<Vec<NetworkInterface>> {
        let messages = linux::dump(linux::Request::Links).await?;
        let interfaces: Vec<NetworkInterface> =
            messages.iter().filter_map(linux::interface_from).collect();
        tracing::debug!("Netlink reported {} interface(s)", interfaces.len());
        Ok(interfaces)
    }

    async fn addresses(&self, interface: &NetworkInterface) -> Result<Vec<IpAddr>> {
        let messages = linux::dump(linux::Request::Addresses).await?;
        let addrs: Vec<IpAddr> = messages
            .iter()
            .filter_map(|m| linux::address_from(m, interface.index))
            .collect();
        tracing::debug!("{} holds {} address(es)", interface.name, addrs.len());
        Ok(addrs)
    }
}

#[cfg(not(target_os = "linux"))]
#[async_trait]
impl InterfaceSource for NetlinkInterfaceSource {
    async fn interfaces(&self) -> Result<Vec<NetworkInterface>> {
        Err(Error::collector("Netlink is only supported on Linux"))
    }

    async fn addresses(&self, _interface: &NetworkInterface) -> Result<Vec<IpAddr>> {
        Err(Error::collector("Netlink is only supported on Linux"))
    }
}

#[cfg(target_os = "linux")]
mod linux {
    use super::*;
    use netlink_packet_core::{
        NLM_F_DUMP, NLM_F_REQUEST, NetlinkHeader, NetlinkMessage, NetlinkPayload,
    };
    use netlink_packet_route::nlas::address::Nla as AddressNla;
    use netlink_packet_route::nlas::link::{Nla as LinkNla, Prop};
    use netlink_packet_route::{AddressMessage, LinkMessage, RtnlMessage};
    use netlink_sys::{Socket, SocketAddr, protocols::NETLINK_ROUTE};
    use std::net::{Ipv4Addr, Ipv6Addr};

    const RECV_BUFFER: usize = 64 * 1024;

    #[derive(Debug, Clone, Copy)]
    pub(super) enum Request {
        Links,
        Addresses,
    }

    impl Request {
        fn message(self) -> RtnlMessage {
            match self {
                Request::Links => RtnlMessage::GetLink(LinkMessage::default()),
                Request::Addresses => RtnlMessage::GetAddress(AddressMessage::default()),
            }
        }
    }

    /// Run one dump request on the blocking pool
    pub(super) async fn dump(request: Request) -> Result<Vec<RtnlMessage>> {
        tokio::task::spawn_blocking(move || dump_blocking(request))
            .await
            .map_err(|e| Error::collector(format!("Netlink task failed: {}", e)))?
    }

    fn dump_blocking(request: Request) -> Result<Vec<RtnlMessage>> {
        let io_err = |what: &str, e: std::io::Error| {
            Error::collector(format!("Netlink {} failed: {}", what, e))
        };

        let mut socket = Socket::new(NETLINK_ROUTE).map_err(|e| io_err("socket", e))?;
        socket.bind_auto().map_err(|e| io_err("bind", e))?;
        socket
            .connect(&SocketAddr::new(0, 0))
            .map_err(|e| io_err("connect", e))?;

        let mut header = NetlinkHeader::default();
        header.flags = NLM_F_REQUEST | NLM_F_DUMP;
        header.sequence_number = 1;
        let mut packet = NetlinkMessage::new(header, NetlinkPayload::InnerMessage(request.message()));
        packet.finalize();

        let mut out = vec![0u8; packet.buffer_len()];
        packet.serialize(&mut out[..]);
        socket.send(&out, 0).map_err(|e| io_err("send", e))?;

        let mut messages = Vec::new();
        let mut buf: Vec<u8> = Vec::with_capacity(RECV_BUFFER);
        loop {
            buf.clear();
            let received = socket.recv(&mut buf, 0).map_err(|e| io_err("recv", e))?;
            if received == 0 {
                return Err(Error::collector("Netlink socket closed mid-dump"));
            }

            let mut offset = 0;
            while offset < buf.len() {
                let message = NetlinkMessage::<RtnlMessage>::deserialize(&buf[offset..])
                    .map_err(|e| Error::collector(format!("Malformed Netlink message: {}", e)))?;
                let length = message.header.length as usize;

                match message.payload {
                    NetlinkPayload::Done(_) => return Ok(messages),
                    NetlinkPayload::Error(err) => {
                        return Err(Error::collector(format!("Netlink error: {:?}", err)));
                    }
                    NetlinkPayload::InnerMessage(inner) => messages.push(inner),
                    _ => {}
                }

                if length == 0 {
                    break;
                }
                offset += length;
            }
        }
    }

    /// Build an interface from an `RTM_NEWLINK` message
    pub(super) fn interface_from(message: &RtnlMessage) -> Option<NetworkInterface> {
        let RtnlMessage::NewLink(link) = message else {
            return None;
        };

        let mut name = None;
        let mut alt_names = Vec::new();
        for nla in &link.nlas {
            match nla {
                LinkNla::IfName(n) => name = Some(n.clone()),
                LinkNla::PropList(props) => {
                    for prop in props {
                        if let Prop::AltIfName(alt) = prop {
                            alt_names.push(alt.clone());
                        }
                    }
                }
                _ => {}
            }
        }

        Some(NetworkInterface {
            index: link.header.index,
            name: name?,
            alt_names,
        })
    }

    /// Extract the local address of an `RTM_NEWADDR` message on `index`
    pub(super) fn address_from(message: &RtnlMessage, index: u32) -> Option<IpAddr> {
        let RtnlMessage::NewAddress(addr) = message else {
            return None;
        };
        if addr.header.index != index {
            return None;
        }

        let mut local = None;
        let mut address = None;
        for nla in &addr.nlas {
            match nla {
                AddressNla::Local(bytes) => local = ip_from_bytes(bytes),
                AddressNla::Address(bytes) => address = ip_from_bytes(bytes),
                _ => {}
            }
        }
        local.or(address)
    }

    pub(super) fn ip_from_bytes(bytes: &[u8]) -> Option<IpAddr> {
        match bytes.len() {
            4 => {
                let octets: [u8; 4] = bytes.try_into().ok()?;
                Some(IpAddr::V4(Ipv4Addr::from(octets)))
            }
            16 => {
                let octets: [u8; 16] = bytes.try_into().ok()?;
                Some(IpAddr::V6(Ipv6Addr::from(octets)))
            }
            _ => None,
        }
    }

}
