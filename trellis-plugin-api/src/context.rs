//! Plugin context - what a started plugin can reach.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::PluginError;
use crate::extension::Extension;
use crate::registry::ExtensionRegistry;
use crate::service::{
    Properties, Protocol, ServiceId, ServiceObject, ServiceQuery, ServiceRegistry, ServiceValue,
};
use crate::view::ExtensionPointView;

/// Context handed to a plugin while it is started.
///
/// Gives access to the application's extension and service registries and to
/// the plugin's own home directory. Services registered through
/// [`PluginContext::register_owned_service`] are unregistered automatically
/// when the plugin stops.
///
/// # Example
///
/// ```ignore
/// fn start(&self, ctx: &PluginContext) -> Result<(), PluginError> {
///     let messages = ctx.extensions("acme.motd.messages")?;
///     ctx.log_info(&format!("{} messages available", messages.len()));
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct PluginContext {
    plugin_id: String,
    home: PathBuf,
    extension_registry: Arc<dyn ExtensionRegistry>,
    service_registry: Arc<dyn ServiceRegistry>,
    owned_services: Arc<Mutex<Vec<ServiceId>>>,
}

impl PluginContext {
    pub fn new(
        plugin_id: impl Into<String>,
        home: PathBuf,
        extension_registry: Arc<dyn ExtensionRegistry>,
        service_registry: Arc<dyn ServiceRegistry>,
    ) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            home,
            extension_registry,
            service_registry,
            owned_services: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Share the list that records services owned by the plugin.
    pub fn with_owned_services(mut self, owned_services: Arc<Mutex<Vec<ServiceId>>>) -> Self {
        self.owned_services = owned_services;
        self
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    /// The plugin's home directory path (may not exist yet).
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// The plugin's home directory, created if it does not exist.
    pub fn home_dir(&self) -> Result<PathBuf, PluginError> {
        if !self.home.exists() {
            std::fs::create_dir_all(&self.home)?;
        }
        Ok(self.home.clone())
    }

    pub fn extension_registry(&self) -> &Arc<dyn ExtensionRegistry> {
        &self.extension_registry
    }

    pub fn service_registry(&self) -> &Arc<dyn ServiceRegistry> {
        &self.service_registry
    }

    // ─── Extensions ──────────────────────────────────────────────────

    pub fn extensions(&self, extension_point_id: &str) -> Result<Vec<Extension>, PluginError> {
        Ok(self.extension_registry.get_extensions(extension_point_id)?)
    }

    /// A live view of an extension point, owned by this plugin.
    pub fn extension_point(&self, extension_point_id: &str) -> Result<ExtensionPointView, PluginError> {
        Ok(ExtensionPointView::connect(
            self.extension_registry.clone(),
            extension_point_id,
            self.plugin_id.clone(),
        )?)
    }

    // ─── Services ────────────────────────────────────────────────────

    /// Register a service that is unregistered when the plugin stops.
    pub fn register_owned_service(
        &self,
        protocol: Protocol,
        value: ServiceValue,
        properties: Properties,
    ) -> Result<ServiceId, PluginError> {
        let service_id = self
            .service_registry
            .register_service(protocol, value, properties)?;
        self.owned_services.lock().push(service_id);
        Ok(service_id)
    }

    /// Ids of the services registered on behalf of the plugin, in order.
    pub fn owned_services(&self) -> Vec<ServiceId> {
        self.owned_services.lock().clone()
    }

    pub fn get_service(
        &self,
        protocol: &Protocol,
        query: &ServiceQuery,
    ) -> Result<Option<ServiceObject>, PluginError> {
        Ok(self.service_registry.get_service(protocol, query)?)
    }

    // ─── Logging ─────────────────────────────────────────────────────

    /// Log an info message (automatically tagged with the plugin id)
    pub fn log_info(&self, message: &str) {
        tracing::info!(plugin = %self.plugin_id, "{}", message);
    }

    /// Log a warning message
    pub fn log_warn(&self, message: &str) {
        tracing::warn!(plugin = %self.plugin_id, "{}", message);
    }

    /// Log a debug message
    pub fn log_debug(&self, message: &str) {
        tracing::debug!(plugin = %self.plugin_id, "{}", message);
    }
}

impl fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginContext")
            .field("plugin_id", &self.plugin_id)
            .field("home", &self.home)
            .finish_non_exhaustive()
    }
}
