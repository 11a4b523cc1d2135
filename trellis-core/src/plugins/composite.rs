//! A plugin manager made of other plugin managers.

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use trellis_plugin_api::{Listener, Notifier, Plugin};

use super::activator::{DefaultActivator, PluginActivator};
use super::error::PluginManagerError;
use super::handle::PluginHandle;
use super::manager::{PluginEnvironment, PluginEvent, PluginHost, start_plugins, stop_plugins};

/// Presents the plugins of several managers as one roster.
///
/// Plugins are listed manager by manager, each through its own filter.
/// Roster events of the members are re-fired unchanged. Starting and
/// stopping act on the plugins directly, not through the members.
pub struct CompositePluginManager {
    managers: Vec<Arc<dyn PluginHost>>,
    activator: Arc<dyn PluginActivator>,
    environment: RwLock<Option<PluginEnvironment>>,
    plugin_added: Notifier<PluginEvent>,
    plugin_removed: Notifier<PluginEvent>,
    _forwarders: Vec<Listener<PluginEvent>>,
}

impl CompositePluginManager {
    pub fn new(managers: Vec<Arc<dyn PluginHost>>) -> Arc<Self> {
        Self::with_activator(managers, Arc::new(DefaultActivator))
    }

    pub fn with_activator(
        managers: Vec<Arc<dyn PluginHost>>,
        activator: Arc<dyn PluginActivator>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|composite: &Weak<Self>| {
            let mut forwarders = Vec::with_capacity(managers.len() * 2);
            for manager in &managers {
                let target = composite.clone();
                let added: Listener<PluginEvent> = Arc::new(move |event: &PluginEvent| {
                    match target.upgrade() {
                        Some(composite) => composite.plugin_added.notify(event),
                        None => Ok(()),
                    }
                });
                manager.plugin_added().subscribe(&added);

                let target = composite.clone();
                let removed: Listener<PluginEvent> = Arc::new(move |event: &PluginEvent| {
                    match target.upgrade() {
                        Some(composite) => composite.plugin_removed.notify(event),
                        None => Ok(()),
                    }
                });
                manager.plugin_removed().subscribe(&removed);

                forwarders.push(added);
                forwarders.push(removed);
            }

            Self {
                managers,
                activator,
                environment: RwLock::new(None),
                plugin_added: Notifier::new(),
                plugin_removed: Notifier::new(),
                _forwarders: forwarders,
            }
        })
    }

    pub fn managers(&self) -> &[Arc<dyn PluginHost>] {
        &self.managers
    }

    fn require(&self, plugin_id: &str) -> Result<Arc<PluginHandle>, PluginManagerError> {
        self.get_plugin(plugin_id)
            .ok_or_else(|| PluginManagerError::NoSuchPlugin(plugin_id.to_string()))
    }
}

impl PluginHost for CompositePluginManager {
    fn plugins(&self) -> Vec<Arc<PluginHandle>> {
        self.managers
            .iter()
            .flat_map(|manager| manager.plugins())
            .collect()
    }

    fn add_plugin(&self, _plugin: Arc<dyn Plugin>) -> Result<Arc<PluginHandle>, PluginManagerError> {
        Err(PluginManagerError::Unsupported("add_plugin"))
    }

    fn remove_plugin(&self, _plugin_id: &str) -> Result<Arc<PluginHandle>, PluginManagerError> {
        Err(PluginManagerError::Unsupported("remove_plugin"))
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

    /// Also hands the environment to every member manager.
    fn set_environment(&self, environment: PluginEnvironment) {
        for manager in &self.managers {
            manager.set_environment(environment.clone());
        }
        *self.environment.write() = Some(environment);
    }

    fn plugin_added(&self) -> &Notifier<PluginEvent> {
        &self.plugin_added
    }

    fn plugin_removed(&self) -> &Notifier<PluginEvent> {
        &self.plugin_removed
    }
}
