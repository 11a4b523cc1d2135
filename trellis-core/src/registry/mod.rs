//! Extension registries.
//!
//! - [`MutableExtensionRegistry`]: extensions are set directly
//! - [`ProviderExtensionRegistry`]: extensions come from an ordered roster of providers
//! - [`PluginExtensionRegistry`]: the providers are a plugin manager's plugins

mod listeners;
mod mutable;
mod plugin;
mod provider;

pub use mutable::MutableExtensionRegistry;
pub use plugin::PluginExtensionRegistry;
pub use provider::ProviderExtensionRegistry;
