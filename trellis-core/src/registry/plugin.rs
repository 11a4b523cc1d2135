//! A provider registry that follows a plugin manager's roster.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use trellis_plugin_api::{
    Extension, ExtensionError, ExtensionListener, ExtensionPoint, ExtensionProvider,
    ExtensionRegistry, Listener,
};

use super::provider::ProviderExtensionRegistry;
use crate::plugins::{PluginEvent, PluginHandle, PluginHost};

struct Binding {
    manager: Weak<dyn PluginHost>,
    sourced: Arc<Mutex<Vec<Arc<PluginHandle>>>>,
    on_added: Listener<PluginEvent>,
    on_removed: Listener<PluginEvent>,
}

/// Extension registry whose providers are the plugins of a plugin manager.
///
/// Plugins the manager exposes become providers when the registry is bound
/// and whenever they are added later; removed plugins stop being providers.
/// Rebinding to another manager retracts every plugin of the previous one.
#[derive(Clone, Default)]
pub struct PluginExtensionRegistry {
    registry: ProviderExtensionRegistry,
    binding: Arc<Mutex<Option<Binding>>>,
}

impl PluginExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plugin_manager(manager: Arc<dyn PluginHost>) -> Result<Self, ExtensionError> {
        let registry = Self::new();
        registry.set_plugin_manager(Some(manager))?;
        Ok(registry)
    }

    /// The underlying provider registry.
    pub fn providers(&self) -> Vec<Arc<dyn ExtensionProvider>> {
        self.registry.providers()
    }

    pub fn plugin_manager(&self) -> Option<Arc<dyn PluginHost>> {
        self.binding
            .lock()
            .as_ref()
            .and_then(|binding| binding.manager.upgrade())
    }

    pub fn set_plugin_manager(&self, manager: Option<Arc<dyn PluginHost>>) -> Result<(), ExtensionError> {
        let previous = self.binding.lock().take();
        if let Some(previous) = previous {
            if let Some(old_manager) = previous.manager.upgrade() {
                old_manager.plugin_added().unsubscribe(&previous.on_added);
                old_manager.plugin_removed().unsubscribe(&previous.on_removed);
            }
            let sourced = std::mem::take(&mut *previous.sourced.lock());
            for plugin in sourced {
                let provider: Arc<dyn ExtensionProvider> = plugin;
                self.registry.remove_provider(&provider)?;
            }
        }

        let Some(manager) = manager else {
            return Ok(());
        };

        let sourced: Arc<Mutex<Vec<Arc<PluginHandle>>>> = Arc::new(Mutex::new(Vec::new()));
        let weak_manager: Weak<dyn PluginHost> = Arc::downgrade(&manager);

        let on_added: Listener<PluginEvent> = {
            let registry = self.registry.clone();
            let sourced = sourced.clone();
            let manager = weak_manager.clone();
            Arc::new(move |event: &PluginEvent| {
                let Some(manager) = manager.upgrade() else {
                    return Ok(());
                };
                let visible = manager
                    .plugins()
                    .iter()
                    .any(|plugin| Arc::ptr_eq(plugin, &event.plugin));
                if !visible {
                    tracing::debug!(plugin = %event.plugin.id(), "Filtered plugin is not a provider");
                    return Ok(());
                }
                registry.add_provider(event.plugin.clone())?;
                sourced.lock().push(event.plugin.clone());
                Ok(())
            })
        };

        let on_removed: Listener<PluginEvent> = {
            let registry = self.registry.clone();
            let sourced = sourced.clone();
            Arc::new(move |event: &PluginEvent| {
                let removed = {
                    let mut sourced = sourced.lock();
                    sourced
                        .iter()
                        .position(|plugin| Arc::ptr_eq(plugin, &event.plugin))
                        .map(|position| sourced.remove(position))
                };
                if let Some(plugin) = removed {
                    let provider: Arc<dyn ExtensionProvider> = plugin;
                    registry.remove_provider(&provider)?;
                }
                Ok(())
            })
        };

        manager.plugin_added().subscribe(&on_added);
        manager.plugin_removed().subscribe(&on_removed);
        *self.binding.lock() = Some(Binding {
            manager: weak_manager,
            sourced: sourced.clone(),
            on_added,
            on_removed,
        });

        for plugin in manager.plugins() {
            self.registry.add_provider(plugin.clone())?;
            sourced.lock().push(plugin);
        }
        Ok(())
    }
}

impl ExtensionRegistry for PluginExtensionRegistry {
    fn add_extension_point(&self, extension_point: ExtensionPoint) {
        self.registry.add_extension_point(extension_point);
    }

    fn get_extension_point(&self, extension_point_id: &str) -> Option<ExtensionPoint> {
        self.registry.get_extension_point(extension_point_id)
    }

    fn get_extension_points(&self) -> Vec<ExtensionPoint> {
        self.registry.get_extension_points()
    }

    fn get_extensions(&self, extension_point_id: &str) -> Result<Vec<Extension>, ExtensionError> {
        self.registry.get_extensions(extension_point_id)
    }

    fn set_extensions(
        &self,
        extension_point_id: &str,
        extensions: Vec<Extension>,
    ) -> Result<(), ExtensionError> {
        self.registry.set_extensions(extension_point_id, extensions)
    }

    fn remove_extension_point(&self, extension_point_id: &str) -> Result<(), ExtensionError> {
        self.registry.remove_extension_point(extension_point_id)
    }

    fn add_extension_point_listener(&self, listener: &ExtensionListener, extension_point_id: Option<&str>) {
        self.registry
            .add_extension_point_listener(listener, extension_point_id);
    }

    fn remove_extension_point_listener(
        &self,
        listener: &ExtensionListener,
        extension_point_id: Option<&str>,
    ) -> Result<(), ExtensionError> {
        self.registry
            .remove_extension_point_listener(listener, extension_point_id)
    }
}

impl fmt::Debug for PluginExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginExtensionRegistry")
            .field("providers", &self.registry.providers().len())
            .field("bound", &self.plugin_manager().is_some())
            .finish()
    }
}
