//! Plugin managers: ordered plugin rosters with lifecycle control.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use trellis_plugin_api::{ExtensionRegistry, Notifier, Plugin, PluginContext, ServiceRegistry};

use super::activator::{DefaultActivator, PluginActivator};
use super::error::PluginManagerError;
use super::filter::PluginFilter;
use super::handle::{PluginHandle, PluginState};

/// Fired when a plugin joins or leaves a manager's roster.
#[derive(Debug, Clone)]
pub struct PluginEvent {
    pub plugin: Arc<PluginHandle>,
}

/// What started plugins are given access to.
#[derive(Clone)]
pub struct PluginEnvironment {
    pub extension_registry: Arc<dyn ExtensionRegistry>,
    pub service_registry: Arc<dyn ServiceRegistry>,
    /// Application home; plugin homes live under `<home>/plugins/<id>`.
    pub home: PathBuf,
}

impl PluginEnvironment {
    pub fn new(
        extension_registry: Arc<dyn ExtensionRegistry>,
        service_registry: Arc<dyn ServiceRegistry>,
        home: PathBuf,
    ) -> Self {
        Self {
            extension_registry,
            service_registry,
            home,
        }
    }

    pub fn context_for(&self, plugin: &PluginHandle) -> PluginContext {
        PluginContext::new(
            plugin.id(),
            trellis_paths::plugin_home(&self.home, plugin.id()),
            self.extension_registry.clone(),
            self.service_registry.clone(),
        )
    }
}

impl fmt::Debug for PluginEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginEnvironment")
            .field("home", &self.home)
            .finish_non_exhaustive()
    }
}

/// Operations shared by every plugin manager.
///
/// Iteration and lookup only see plugins that pass the manager's filter.
pub trait PluginHost: Send + Sync {
    /// Visible plugins, in roster order.
    fn plugins(&self) -> Vec<Arc<PluginHandle>>;

    /// First visible plugin with this id.
    fn get_plugin(&self, plugin_id: &str) -> Option<Arc<PluginHandle>> {
        self.plugins()
            .into_iter()
            .find(|plugin| plugin.id() == plugin_id)
    }

    fn add_plugin(&self, plugin: Arc<dyn Plugin>) -> Result<Arc<PluginHandle>, PluginManagerError>;

    fn remove_plugin(&self, plugin_id: &str) -> Result<Arc<PluginHandle>, PluginManagerError>;

    /// Start every visible plugin that is not started, in order.
    fn start(&self) -> Result<(), PluginManagerError>;

    /// Stop every started visible plugin, in reverse order.
    fn stop(&self) -> Result<(), PluginManagerError>;

    fn start_plugin(&self, plugin_id: &str) -> Result<(), PluginManagerError>;

    fn stop_plugin(&self, plugin_id: &str) -> Result<(), PluginManagerError>;

    fn set_environment(&self, environment: PluginEnvironment);

    fn plugin_added(&self) -> &Notifier<PluginEvent>;

    fn plugin_removed(&self) -> &Notifier<PluginEvent>;
}

pub(crate) fn start_plugins(
    plugins: &[Arc<PluginHandle>],
    activator: &dyn PluginActivator,
    environment: Option<&PluginEnvironment>,
) -> Result<(), PluginManagerError> {
    let environment = environment.ok_or(PluginManagerError::NoEnvironment)?;
    for plugin in plugins {
        if plugin.state() == PluginState::Started {
            tracing::debug!(plugin = %plugin.id(), "Plugin already started, skipping");
            continue;
        }
        activator.start_plugin(plugin, environment.context_for(plugin))?;
    }
    Ok(())
}

pub(crate) fn stop_plugins(
    plugins: &[Arc<PluginHandle>],
    activator: &dyn PluginActivator,
) -> Result<(), PluginManagerError> {
    for plugin in plugins.iter().rev() {
        if plugin.state() != PluginState::Started {
            tracing::debug!(plugin = %plugin.id(), "Plugin not started, skipping");
            continue;
        }
        activator.stop_plugin(plugin)?;
    }
    Ok(())
}

/// The standard plugin manager: an ordered roster behind a filter.
pub struct PluginManager {
    plugins: RwLock<Vec<Arc<PluginHandle>>>,
    filter: PluginFilter,
    activator: Arc<dyn PluginActivator>,
    environment: RwLock<Option<PluginEnvironment>>,
    plugin_added: Notifier<PluginEvent>,
    plugin_removed: Notifier<PluginEvent>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self {
            plugins: RwLock::new(Vec::new()),
            filter: PluginFilter::allow_all(),
            activator: Arc::new(DefaultActivator),
            environment: RwLock::new(None),
            plugin_added: Notifier::new(),
            plugin_removed: Notifier::new(),
        }
    }

    /// A manager over `plugins`, in the given order.
    pub fn with_plugins(plugins: Vec<Arc<dyn Plugin>>) -> Self {
        let manager = Self::new();
        *manager.plugins.write() = plugins.into_iter().map(PluginHandle::new).collect();
        manager
    }

    pub fn with_filter(mut self, filter: PluginFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_activator(mut self, activator: Arc<dyn PluginActivator>) -> Self {
        self.activator = activator;
        self
    }

    pub fn filter(&self) -> &PluginFilter {
        &self.filter
    }

    /// Every managed plugin, including filtered ones.
    pub fn all_plugins(&self) -> Vec<Arc<PluginHandle>> {
        self.plugins.read().clone()
    }

    fn require(&self, plugin_id: &str) -> Result<Arc<PluginHandle>, PluginManagerError> {
        self.get_plugin(plugin_id)
            .ok_or_else(|| PluginManagerError::NoSuchPlugin(plugin_id.to_string()))
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginHost for PluginManager {
    fn plugins(&self) -> Vec<Arc<PluginHandle>> {
        self.plugins
            .read()
            .iter()
            .filter(|plugin| self.filter.allows(plugin.id()))
            .cloned()
            .collect()
    }

    fn add_plugin(&self, plugin: Arc<dyn Plugin>) -> Result<Arc<PluginHandle>, PluginManagerError> {
        let handle = PluginHandle::new(plugin);
        self.plugins.write().push(handle.clone());
        tracing::debug!(plugin = %handle.id(), "Plugin added");
        self.plugin_added.notify(&PluginEvent {
            plugin: handle.clone(),
        })?;
        Ok(handle)
    }

    fn remove_plugin(&self, plugin_id: &str) -> Result<Arc<PluginHandle>, PluginManagerError> {
        let handle = {
            let mut plugins = self.plugins.write();
            let position = plugins
                .iter()
                .position(|plugin| plugin.id() == plugin_id)
                .ok_or_else(|| PluginManagerError::NoSuchPlugin(plugin_id.to_string()))?;
            plugins.remove(position)
        };
        tracing::debug!(plugin = %plugin_id, "Plugin removed");
        self.plugin_removed.notify(&PluginEvent {
            plugin: handle.clone(),
        })?;
        Ok(handle)
    }

    fn start(&self) -> Result<(), PluginManagerError> {
        let environment = self.environment.read().clone();
        start_plugins(&self.plugins(), self.activator.as_ref(), environment.as_ref())
    }

    fn stop(&self) -> Result<(), PluginManagerError> {
        stop_plugins(&self.plugins(), self.activator.as_ref())
    }

    fn start_plugin(&self, plugin_id: &str) -> Result<(), PluginManagerError> {
        let plugin = self.require(plugin_id)?;
        let environment = self
            .environment
            .read()
            .clone()
            .ok_or(PluginManagerError::NoEnvironment)?;
        self.activator
            .start_plugin(&plugin, environment.context_for(&plugin))?;
        Ok(())
    }

    fn stop_plugin(&self, plugin_id: &str) -> Result<(), PluginManagerError> {
        let plugin = self.require(plugin_id)?;
        self.activator.stop_plugin(&plugin)?;
        Ok(())
    }

    fn set_environment(&self, environment: PluginEnvironment) {
        *self.environment.write() = Some(environment);
    }

    fn plugin_added(&self) -> &Notifier<PluginEvent> {
        &self.plugin_added
    }

    fn plugin_removed(&self) -> &Notifier<PluginEvent> {
        &self.plugin_removed
    }
}
