//! Plugin-based provider registry
//!
//! Maps the `type:` key of a service to the factory that builds its DNS
//! provider, avoiding hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sddns_core::registry::ProviderRegistry;
//! use std::sync::Arc;
//!
//! let mut registry = ProviderRegistry::new();
//! sddns_provider_porkbun::register(&mut registry);
//!
//! // Frozen from here on; share it with the engine
//! let registry = Arc::new(registry);
//! let provider = registry.create_provider("porkbun", &service.credentials)?;
//! ```
//!
//! ## Registration
//!
//! Provider crates expose a `register` function:
//!
//! ```rust,ignore
//! # use sddns_core::registry::ProviderRegistry;
//! // In sddns-provider-porkbun crate
//! pub fn register(registry: &mut ProviderRegistry) {
//!     registry.register_provider("porkbun", Box::new(PorkbunFactory));
//! }
//! ```
//!
//! Registration takes `&mut self`, so the table is filled before it is
//! shared and never changes while cycles run.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::provider::MemoryProviderFactory;
use crate::traits::{Credentials, DnsProvider, DnsProviderFactory};

/// Provider registry for plugin-based DNS provider creation
#[derive(Default)]
pub struct ProviderRegistry {
    /// Registered DNS provider factories, keyed by type name
    providers: BTreeMap<String, Box<dyn DnsProviderFactory>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in `memory` provider
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register_provider("memory", Box::new(MemoryProviderFactory::new()));
        registry
    }

    /// Register a DNS provider factory
    ///
    /// A later registration under the same name replaces the earlier one.
    ///
    /// # Parameters
    ///
    /// - `name`: Provider type name (e.g., "porkbun", "cloudflare")
    /// - `factory`: Factory object for creating provider instances
    pub fn register_provider(
        &mut self,
        name: impl Into<String>,
        factory: Box<dyn DnsProviderFactory>,
    ) {
        self.providers.insert(name.into(), factory);
    }

    /// Create a DNS provider for one service
    ///
    /// # Parameters
    ///
    /// - `provider_type`: The service's `type:` key
    /// - `credentials`: The service's credentials
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn DnsProvider>)`: Created provider instance
    /// - `Err(Error::Config)`: If the type is not registered
    /// - `Err(Error)`: If the factory rejects the credentials
    pub fn create_provider(
        &self,
        provider_type: &str,
        credentials: &Credentials,
    ) -> Result<Box<dyn DnsProvider>> {
        let factory = self
            .providers
            .get(provider_type)
            .ok_or_else(|| Error::config(format!("Unknown provider type: {}", provider_type)))?;

        factory.create(credentials)
    }

    /// List all registered provider types, sorted
    pub fn list_providers(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    /// Check if a provider type is registered
    pub fn has_provider(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }
}
