//! The application: a plugin manager, its extension registry and a service
//! registry wired together, with a vetoable start/stop lifecycle.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use trellis_plugin_api::{
    Extension, ExtensionError, ExtensionListener, ExtensionPoint, ExtensionRegistry, Notifier,
    Plugin, Properties, Protocol, ServiceError, ServiceId, ServiceObject, ServiceQuery,
    ServiceRegistry, ServiceValue,
};

use crate::config::ApplicationConfig;
use crate::error::TrellisError;
use crate::plugins::{
    PluginEnvironment, PluginHandle, PluginHost, PluginManager, PluginManagerError,
};
use crate::registry::PluginExtensionRegistry;
use crate::services::LocalServiceRegistry;

/// Fired around application start and stop.
///
/// Listeners of `starting` and `stopping` may call [`veto`](Self::veto) to
/// cancel the transition.
#[derive(Debug)]
pub struct ApplicationEvent {
    pub application_id: String,
    vetoed: AtomicBool,
}

impl ApplicationEvent {
    fn new(application_id: &str) -> Self {
        Self {
            application_id: application_id.to_string(),
            vetoed: AtomicBool::new(false),
        }
    }

    pub fn veto(&self) {
        self.vetoed.store(true, Ordering::SeqCst);
    }

    pub fn is_vetoed(&self) -> bool {
        self.vetoed.load(Ordering::SeqCst)
    }
}

pub struct Application {
    id: String,
    home: PathBuf,
    plugin_manager: Arc<dyn PluginHost>,
    extension_registry: PluginExtensionRegistry,
    service_registry: Arc<LocalServiceRegistry>,
    starting: Notifier<ApplicationEvent>,
    started: Notifier<ApplicationEvent>,
    stopping: Notifier<ApplicationEvent>,
    stopped: Notifier<ApplicationEvent>,
}

impl Application {
    /// An application without plugins.
    pub fn new(config: ApplicationConfig) -> Result<Self, TrellisError> {
        Self::with_plugins(config, Vec::new())
    }

    /// An application over `plugins`, filtered by the configured include and
    /// exclude patterns.
    pub fn with_plugins(
        config: ApplicationConfig,
        plugins: Vec<Arc<dyn Plugin>>,
    ) -> Result<Self, TrellisError> {
        let manager = PluginManager::with_plugins(plugins).with_filter(config.plugins.filter()?);
        Self::with_plugin_manager(config, Arc::new(manager))
    }

    pub fn with_plugin_manager(
        config: ApplicationConfig,
        plugin_manager: Arc<dyn PluginHost>,
    ) -> Result<Self, TrellisError> {
        Self::with_registries(
            config,
            plugin_manager,
            Arc::new(LocalServiceRegistry::new()),
        )
    }

    /// Full control over the pieces, e.g. a service registry with a resolver.
    pub fn with_registries(
        config: ApplicationConfig,
        plugin_manager: Arc<dyn PluginHost>,
        service_registry: Arc<LocalServiceRegistry>,
    ) -> Result<Self, TrellisError> {
        let home = config.resolved_home();
        let extension_registry = PluginExtensionRegistry::with_plugin_manager(plugin_manager.clone())?;

        plugin_manager.set_environment(PluginEnvironment::new(
            Arc::new(extension_registry.clone()),
            service_registry.clone(),
            home.clone(),
        ));

        tracing::debug!(application = %config.id, home = %home.display(), "Application created");
        Ok(Self {
            id: config.id,
            home,
            plugin_manager,
            extension_registry,
            service_registry,
            starting: Notifier::new(),
            started: Notifier::new(),
            stopping: Notifier::new(),
            stopped: Notifier::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn plugin_manager(&self) -> &Arc<dyn PluginHost> {
        &self.plugin_manager
    }

    pub fn extension_registry(&self) -> &PluginExtensionRegistry {
        &self.extension_registry
    }

    pub fn service_registry(&self) -> &Arc<LocalServiceRegistry> {
        &self.service_registry
    }

    pub fn starting(&self) -> &Notifier<ApplicationEvent> {
        &self.starting
    }

    pub fn started(&self) -> &Notifier<ApplicationEvent> {
        &self.started
    }

    pub fn stopping(&self) -> &Notifier<ApplicationEvent> {
        &self.stopping
    }

    pub fn stopped(&self) -> &Notifier<ApplicationEvent> {
        &self.stopped
    }

    /// Start every plugin. Returns `false` if a `starting` listener vetoed.
    pub fn start(&self) -> Result<bool, TrellisError> {
        let event = ApplicationEvent::new(&self.id);
        self.starting.notify(&event)?;
        if event.is_vetoed() {
            tracing::info!(application = %self.id, "Application start vetoed");
            return Ok(false);
        }

        tracing::info!(application = %self.id, "Starting application");
        self.plugin_manager.start()?;
        self.started.notify(&ApplicationEvent::new(&self.id))?;
        Ok(true)
    }

    /// Stop every plugin. Returns `false` if a `stopping` listener vetoed.
    pub fn stop(&self) -> Result<bool, TrellisError> {
        let event = ApplicationEvent::new(&self.id);
        self.stopping.notify(&event)?;
        if event.is_vetoed() {
            tracing::info!(application = %self.id, "Application stop vetoed");
            return Ok(false);
        }

        tracing::info!(application = %self.id, "Stopping application");
        self.plugin_manager.stop()?;
        self.stopped.notify(&ApplicationEvent::new(&self.id))?;
        Ok(true)
    }

    /// Start, then stop. Returns whether both happened.
    pub fn run(&self) -> Result<bool, TrellisError> {
        Ok(self.start()? && self.stop()?)
    }

    pub fn plugins(&self) -> Vec<Arc<PluginHandle>> {
        self.plugin_manager.plugins()
    }

    pub fn get_plugin(&self, plugin_id: &str) -> Option<Arc<PluginHandle>> {
        self.plugin_manager.get_plugin(plugin_id)
    }

    pub fn add_plugin(&self, plugin: Arc<dyn Plugin>) -> Result<Arc<PluginHandle>, PluginManagerError> {
        self.plugin_manager.add_plugin(plugin)
    }

    pub fn remove_plugin(&self, plugin_id: &str) -> Result<Arc<PluginHandle>, PluginManagerError> {
        self.plugin_manager.remove_plugin(plugin_id)
    }

    pub fn start_plugin(&self, plugin_id: &str) -> Result<(), PluginManagerError> {
        self.plugin_manager.start_plugin(plugin_id)
    }

    pub fn stop_plugin(&self, plugin_id: &str) -> Result<(), PluginManagerError> {
        self.plugin_manager.stop_plugin(plugin_id)
    }
}

impl ExtensionRegistry for Application {
    fn add_extension_point(&self, extension_point: ExtensionPoint) {
        self.extension_registry.add_extension_point(extension_point);
    }

    fn get_extension_point(&self, extension_point_id: &str) -> Option<ExtensionPoint> {
        self.extension_registry.get_extension_point(extension_point_id)
    }

    fn get_extension_points(&self) -> Vec<ExtensionPoint> {
        self.extension_registry.get_extension_points()
    }

    fn get_extensions(&self, extension_point_id: &str) -> Result<Vec<Extension>, ExtensionError> {
        self.extension_registry.get_extensions(extension_point_id)
    }

    fn set_extensions(
        &self,
        extension_point_id: &str,
        extensions: Vec<Extension>,
    ) -> Result<(), ExtensionError> {
        self.extension_registry
            .set_extensions(extension_point_id, extensions)
    }

    fn remove_extension_point(&self, extension_point_id: &str) -> Result<(), ExtensionError> {
        self.extension_registry
            .remove_extension_point(extension_point_id)
    }

    fn add_extension_point_listener(&self, listener: &ExtensionListener, extension_point_id: Option<&str>) {
        self.extension_registry
            .add_extension_point_listener(listener, extension_point_id);
    }

    fn remove_extension_point_listener(
        &self,
        listener: &ExtensionListener,
        extension_point_id: Option<&str>,
    ) -> Result<(), ExtensionError> {
        self.extension_registry
            .remove_extension_point_listener(listener, extension_point_id)
    }
}

impl ServiceRegistry for Application {
    fn register_service(
        &self,
        protocol: Protocol,
        value: ServiceValue,
        properties: Properties,
    ) -> Result<ServiceId, ServiceError> {
        self.service_registry
            .register_service(protocol, value, properties)
    }

    fn unregister_service(&self, service_id: ServiceId) -> Result<(), ServiceError> {
        self.service_registry.unregister_service(service_id)
    }

    fn get_services(
        &self,
        protocol: &Protocol,
        query: &ServiceQuery,
    ) -> Result<Vec<ServiceObject>, ServiceError> {
        self.service_registry.get_services(protocol, query)
    }

    fn get_service_from_id(&self, service_id: ServiceId) -> Result<ServiceObject, ServiceError> {
        self.service_registry.get_service_from_id(service_id)
    }

    fn get_service_properties(&self, service_id: ServiceId) -> Result<Properties, ServiceError> {
        self.service_registry.get_service_properties(service_id)
    }

    fn set_service_properties(
        &self,
        service_id: ServiceId,
        properties: Properties,
    ) -> Result<(), ServiceError> {
        self.service_registry
            .set_service_properties(service_id, properties)
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("id", &self.id)
            .field("home", &self.home)
            .field("plugins", &self.plugin_manager.plugins().len())
            .finish_non_exhaustive()
    }
}
