//! Plugin management for trellis
//!
//! This module provides the infrastructure for running plugins:
//!
//! - [`PluginHandle`]: A plugin under management, with its lifecycle state
//! - [`PluginActivator`] / [`DefaultActivator`]: The start and stop sequences
//! - [`PluginHost`]: Operations shared by plugin managers
//! - [`PluginManager`]: An ordered roster behind an include/exclude [`PluginFilter`]
//! - [`CompositePluginManager`]: Several managers presented as one
//! - [`CorePlugin`]: Registers contributed service offers
//!
//! # Lifecycle
//!
//! Starting a plugin connects a view for each extension point it consumes,
//! registers its service offers and then calls its `start` hook. Stopping
//! runs the same steps backwards.
//!
//! # Example
//!
//! ```ignore
//! use trellis_core::plugins::{PluginHost, PluginManager, PluginEnvironment};
//!
//! let manager = PluginManager::with_plugins(vec![Arc::new(CorePlugin::new())]);
//! manager.set_environment(PluginEnvironment::new(extensions, services, home));
//!
//! manager.start()?;
//! manager.stop_plugin("trellis.core")?;
//! ```

mod activator;
mod composite;
mod core_plugin;
mod error;
mod filter;
mod handle;
mod manager;

pub use activator::{DefaultActivator, PluginActivator};
pub use composite::CompositePluginManager;
pub use core_plugin::{CORE_PLUGIN_ID, CorePlugin, SERVICE_OFFERS};
pub use error::{ActivationError, PluginManagerError};
pub use filter::PluginFilter;
pub use handle::{PluginHandle, PluginState};
pub use manager::{PluginEnvironment, PluginEvent, PluginHost, PluginManager};
