//! trellis-plugin-api - Plugin API for the trellis application framework
//!
//! This crate provides the traits and types needed to write trellis plugins.
//! A plugin declares extension points, contributes extensions to other
//! plugins' extension points and offers services. Everything is in-process:
//! an application hands each plugin a [`PluginContext`] when it starts.
//!
//! # Example
//!
//! ```ignore
//! use trellis_plugin_api::{
//!     Contributions, Extension, ExtensionChangeEvent, ExtensionProvider, Notifier, Plugin,
//! };
//!
//! pub struct QuotesPlugin {
//!     contributions: Contributions,
//! }
//!
//! impl QuotesPlugin {
//!     pub fn new() -> Self {
//!         Self {
//!             contributions: Contributions::new()
//!                 .with("acme.motd.messages", vec![Extension::new("Hello!")]),
//!         }
//!     }
//! }
//!
//! impl ExtensionProvider for QuotesPlugin {
//!     fn extensions(&self, id: &str) -> Result<Vec<Extension>, PluginError> {
//!         self.contributions.extensions(id)
//!     }
//!
//!     fn extension_changes(&self) -> &Notifier<ExtensionChangeEvent> {
//!         self.contributions.changes()
//!     }
//! }
//!
//! impl Plugin for QuotesPlugin {
//!     fn id(&self) -> &str {
//!         "acme.motd.quotes"
//!     }
//! }
//! ```

pub mod context;
pub mod error;
pub mod event;
pub mod extension;
pub mod provider;
pub mod registry;
pub mod service;
pub mod view;

pub use context::PluginContext;
pub use error::{ExtensionError, PluginError, ServiceError};
pub use event::{ExtensionChangeEvent, Index, Listener, Notifier, listener};
pub use extension::{Extension, ExtensionPoint};
pub use provider::{ContributionFn, Contributions, ExtensionProvider};
pub use registry::{ExtensionListener, ExtensionRegistry};
pub use service::{
    AsAny, Properties, Protocol, Service, ServiceEvent, ServiceFactory, ServiceId, ServiceObject,
    ServiceOffer, ServiceQuery, ServiceRegistry, ServiceValue, downcast_service, service_type_id,
};
pub use view::{ExtensionPointView, ViewEvent};

/// The core plugin trait - implement this to create a trellis plugin.
///
/// A plugin is an [`ExtensionProvider`] with an identity and a lifecycle.
/// Lifecycle hooks have default no-op implementations, so plugins only
/// need to override what they care about.
pub trait Plugin: ExtensionProvider {
    /// Unique id, e.g. `acme.motd`
    fn id(&self) -> &str;

    /// Human readable name (defaults to the id)
    fn name(&self) -> &str {
        self.id()
    }

    /// Extension points the plugin follows while started.
    ///
    /// Defaults to the points the plugin declares itself. Each one gets an
    /// [`ExtensionPointView`] and changes arrive in [`Plugin::extensions_changed`].
    fn consumed_extension_points(&self) -> Vec<String> {
        self.extension_points()
            .iter()
            .map(|point| point.id().to_string())
            .collect()
    }

    /// Services registered for the plugin before `start` and unregistered after `stop`.
    fn service_offers(&self, _ctx: &PluginContext) -> Vec<ServiceOffer> {
        Vec::new()
    }

    // ─── Lifecycle (default no-ops) ──────────────────────────────────

    /// Called once the plugin's views are connected and its services registered
    fn start(&self, _ctx: &PluginContext) -> Result<(), PluginError> {
        Ok(())
    }

    /// Called before the plugin's services are unregistered
    fn stop(&self, _ctx: &PluginContext) -> Result<(), PluginError> {
        Ok(())
    }

    /// Called when a consumed extension point changes while started
    fn extensions_changed(
        &self,
        _ctx: &PluginContext,
        _extension_point_id: &str,
        _event: &ViewEvent,
    ) -> Result<(), PluginError> {
        Ok(())
    }
}
