//! Core traits for sddns
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`DnsProvider`]: Remote DNS record store
//! - [`InterfaceSource`]: OS interface and address enumeration

pub mod dns_provider;
pub mod interface_source;

pub use dns_provider::{Credentials, DnsProvider, DnsProviderFactory};
pub use interface_source::{InterfaceSource, NetworkInterface, StaticInterfaceSource};
