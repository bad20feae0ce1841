//! Built-in DNS providers
//!
//! Only the in-process [`MemoryProvider`] lives here. Providers backed by a
//! remote API live in their own crates and register with the
//! [`ProviderRegistry`](crate::registry::ProviderRegistry).

pub mod memory;

pub use memory::{MemoryProvider, MemoryProviderFactory};
