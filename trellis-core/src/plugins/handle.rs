//! A managed plugin: the plugin object plus its lifecycle bookkeeping.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use trellis_plugin_api::{
    Extension, ExtensionChangeEvent, ExtensionError, ExtensionPoint, ExtensionPointView,
    ExtensionProvider, Listener, Notifier, Plugin, PluginContext, PluginError, ServiceError,
    ServiceId, ViewEvent,
};

/// Lifecycle state of a managed plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    /// Never started
    Inert,
    /// Started and not yet stopped
    Started,
    /// Stopped after having been started
    Stopped,
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PluginState::Inert => "inert",
            PluginState::Started => "started",
            PluginState::Stopped => "stopped",
        })
    }
}

struct ConnectedView {
    view: ExtensionPointView,
    _observer: Listener<ViewEvent>,
}

struct Activation {
    state: PluginState,
    context: Option<PluginContext>,
    views: Vec<ConnectedView>,
}

/// A plugin under management.
///
/// The handle is what managers hand out and what extension registries use
/// as a provider; it forwards [`ExtensionProvider`] to the plugin.
pub struct PluginHandle {
    plugin: Arc<dyn Plugin>,
    activation: Mutex<Activation>,
    owned_services: Arc<Mutex<Vec<ServiceId>>>,
}

impl PluginHandle {
    pub fn new(plugin: Arc<dyn Plugin>) -> Arc<Self> {
        Arc::new(Self {
            plugin,
            activation: Mutex::new(Activation {
                state: PluginState::Inert,
                context: None,
                views: Vec::new(),
            }),
            owned_services: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn id(&self) -> &str {
        self.plugin.id()
    }

    pub fn name(&self) -> &str {
        self.plugin.name()
    }

    pub fn plugin(&self) -> &Arc<dyn Plugin> {
        &self.plugin
    }

    pub fn state(&self) -> PluginState {
        self.activation.lock().state
    }

    pub fn is_started(&self) -> bool {
        self.state() == PluginState::Started
    }

    /// The context the plugin was started with, while it is started.
    pub fn context(&self) -> Option<PluginContext> {
        self.activation.lock().context.clone()
    }

    /// Ids of services registered on the plugin's behalf.
    pub fn service_ids(&self) -> Vec<ServiceId> {
        self.owned_services.lock().clone()
    }

    /// Extension point ids the plugin currently follows.
    pub fn connected_extension_points(&self) -> Vec<String> {
        self.activation
            .lock()
            .views
            .iter()
            .map(|connected| connected.view.extension_point_id().to_string())
            .collect()
    }

    /// Bind the context used for the rest of this activation.
    ///
    /// The context shares the handle's service id list, so services the
    /// plugin registers through it are unregistered on stop.
    pub fn attach_context(&self, context: PluginContext) -> PluginContext {
        let context = context.with_owned_services(self.owned_services.clone());
        self.activation.lock().context = Some(context.clone());
        context
    }

    pub fn set_state(&self, state: PluginState) {
        let mut activation = self.activation.lock();
        activation.state = state;
        if state != PluginState::Started {
            activation.context = None;
        }
    }

    /// Connect a view for every consumed extension point.
    ///
    /// View changes are forwarded to [`Plugin::extensions_changed`].
    pub fn connect_extension_points(self: &Arc<Self>, context: &PluginContext) -> Result<(), ExtensionError> {
        let mut connected = Vec::new();
        for extension_point_id in self.plugin.consumed_extension_points() {
            let view = ExtensionPointView::connect(
                context.extension_registry().clone(),
                extension_point_id.clone(),
                self.id().to_string(),
            )?;

            let handle: Weak<PluginHandle> = Arc::downgrade(self);
            let observer: Listener<ViewEvent> = Arc::new(move |event: &ViewEvent| {
                let Some(handle) = handle.upgrade() else {
                    return Ok(());
                };
                let Some(context) = handle.context() else {
                    return Ok(());
                };
                handle
                    .plugin
                    .extensions_changed(&context, &extension_point_id, event)
            });
            view.subscribe(&observer);
            connected.push(ConnectedView {
                view,
                _observer: observer,
            });
        }

        tracing::debug!(plugin = %self.id(), views = connected.len(), "Extension points connected");
        self.activation.lock().views = connected;
        Ok(())
    }

    pub fn disconnect_extension_points(&self) {
        let views = std::mem::take(&mut self.activation.lock().views);
        tracing::debug!(plugin = %self.id(), views = views.len(), "Extension points disconnected");
        drop(views);
    }

    /// Register the plugin's service offers, recording their ids.
    pub fn register_services(&self, context: &PluginContext) -> Result<(), ServiceError> {
        for offer in self.plugin.service_offers(context) {
            let service_id = context.service_registry().register_service(
                offer.protocol,
                offer.value,
                offer.properties,
            )?;
            tracing::debug!(plugin = %self.id(), service_id, "Service offer registered");
            self.owned_services.lock().push(service_id);
        }
        Ok(())
    }

    /// Unregister every recorded service, newest first.
    ///
    /// Services that were already unregistered elsewhere are skipped.
    pub fn unregister_services(&self, context: &PluginContext) -> Result<(), ServiceError> {
        let service_ids = std::mem::take(&mut *self.owned_services.lock());
        for service_id in service_ids.into_iter().rev() {
            match context.service_registry().unregister_service(service_id) {
                Ok(()) => {
                    tracing::debug!(plugin = %self.id(), service_id, "Service unregistered");
                }
                Err(ServiceError::UnknownService(_)) => {
                    tracing::debug!(plugin = %self.id(), service_id, "Service was already unregistered");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

impl ExtensionProvider for PluginHandle {
    fn extension_points(&self) -> Vec<ExtensionPoint> {
        self.plugin.extension_points()
    }

    fn extensions(&self, extension_point_id: &str) -> Result<Vec<Extension>, PluginError> {
        self.plugin.extensions(extension_point_id)
    }

    fn extension_changes(&self) -> &Notifier<ExtensionChangeEvent> {
        self.plugin.extension_changes()
    }
}

impl fmt::Debug for PluginHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginHandle")
            .field("id", &self.id())
            .field("state", &self.state())
            .finish()
    }
}
