//! trellis-core: the engine behind trellis applications
//!
//! This crate provides everything between plugins and the application that
//! hosts them:
//!
//! - **Extension registries** - [`MutableExtensionRegistry`], [`ProviderExtensionRegistry`]
//!   and [`PluginExtensionRegistry`] collect contributions to extension points
//! - **Services** - [`LocalServiceRegistry`] with a small query language for discovery
//! - **Plugins** - [`PluginManager`], [`CompositePluginManager`] and the
//!   [`DefaultActivator`] driving the plugin lifecycle
//! - **Application** - [`Application`] wiring it all together from an [`ApplicationConfig`]
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use trellis_core::{Application, ApplicationConfig, CorePlugin};
//!
//! fn example() -> Result<(), trellis_core::TrellisError> {
//!     let app = Application::with_plugins(
//!         ApplicationConfig::new("acme"),
//!         vec![Arc::new(CorePlugin::new())],
//!     )?;
//!     app.run()?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────── Application ─────────────────────────┐
//! │                                                               │
//! │  PluginManager ──roster──▶ PluginExtensionRegistry            │
//! │       │                        ▲                              │
//! │       │ start/stop             │ contributions                │
//! │       ▼                        │                              │
//! │  DefaultActivator ──▶ PluginHandle(plugin) ──▶ LocalService-  │
//! │                                                  Registry     │
//! └───────────────────────────────────────────────────────────────┘
//! ```

pub mod application;
pub mod config;
pub mod error;
pub mod plugins;
pub mod registry;
pub mod services;

// Re-export key types for convenience
pub use application::{Application, ApplicationEvent};
pub use config::{ApplicationConfig, ConfigLoader, PluginsConfig};
pub use error::{ConfigError, TrellisError};
pub use plugins::{
    ActivationError, CORE_PLUGIN_ID, CompositePluginManager, CorePlugin, DefaultActivator,
    PluginActivator, PluginEnvironment, PluginEvent, PluginFilter, PluginHandle, PluginHost,
    PluginManager, PluginManagerError, PluginState, SERVICE_OFFERS,
};
pub use registry::{MutableExtensionRegistry, PluginExtensionRegistry, ProviderExtensionRegistry};
pub use services::{LocalServiceRegistry, Query, QueryError, SymbolResolver, TypeResolver};
