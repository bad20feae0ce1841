// # sddns-core
//
// Core library for the sddns dynamic DNS daemon.
//
// ## Architecture Overview
//
// Data flows strictly downward, once per polling cycle:
//
// - **InterfaceSource**: Trait for enumerating interfaces and their addresses
// - **collector**: Resolves configured interface names to publishable addresses
// - **desired**: Builds the record set a service should have at its provider
// - **reconcile**: Plans and applies create/edit/delete actions per domain name
// - **DnsProvider**: Trait for reading and writing records via provider APIs
// - **DdnsEngine**: Scheduler loop driving the cycles
// - **ProviderRegistry**: Plugin-based registry for DNS providers
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from implementations
// 2. **Stateless Cycles**: Configuration and provider state are re-read every cycle
// 3. **Plugin-Based**: Providers are registered by name, no hard-coded if-else
// 4. **Library-First**: All core functionality can be used as a library
// 5. **Convergence**: Repeated cycles against an unchanged network apply nothing

pub mod collector;
pub mod config;
pub mod desired;
pub mod engine;
pub mod error;
pub mod provider;
pub mod reconcile;
pub mod record;
pub mod registry;
pub mod traits;

// Re-export core types for convenience
pub use collector::{AddressFamily, ResolvedAddresses, collect_addresses};
pub use config::{AddressMode, EngineConfig, Hostname, Service, load_services};
pub use desired::{DesiredState, build_desired};
pub use engine::{CycleReport, DdnsEngine, EngineEvent};
pub use error::{Error, Result};
pub use reconcile::{Action, ActionKind, Plan, ReconcileReport, Reconciler};
pub use record::{DEFAULT_TTL, DomainName, Record, RecordType};
pub use registry::ProviderRegistry;
pub use traits::{Credentials, DnsProvider, DnsProviderFactory, InterfaceSource, NetworkInterface};
