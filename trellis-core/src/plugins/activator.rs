//! Plugin activation: the fixed start and stop sequences.

use std::sync::Arc;

use trellis_plugin_api::PluginContext;

use super::error::ActivationError;
use super::handle::{PluginHandle, PluginState};

/// Starts and stops individual plugins.
pub trait PluginActivator: Send + Sync {
    fn start_plugin(&self, plugin: &Arc<PluginHandle>, context: PluginContext) -> Result<(), ActivationError>;

    fn stop_plugin(&self, plugin: &Arc<PluginHandle>) -> Result<(), ActivationError>;
}

/// The standard activation order.
///
/// Start: follow consumed extension points, register service offers, then
/// call the plugin's `start`. Stop: call `stop`, unregister the recorded
/// services (newest first), then disconnect the views. A failed start is
/// rolled back and leaves the plugin in its previous state.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultActivator;

impl DefaultActivator {
    fn rollback(plugin: &Arc<PluginHandle>, context: &PluginContext, previous: PluginState) {
        if let Err(e) = plugin.unregister_services(context) {
            tracing::warn!(plugin = %plugin.id(), error = %e, "Failed to unregister services after a failed start");
        }
        plugin.disconnect_extension_points();
        plugin.set_state(previous);
    }
}

impl PluginActivator for DefaultActivator {
    fn start_plugin(&self, plugin: &Arc<PluginHandle>, context: PluginContext) -> Result<(), ActivationError> {
        let previous = plugin.state();
        if previous == PluginState::Started {
            return Err(ActivationError::InvalidTransition {
                id: plugin.id().to_string(),
                from: previous,
                to: PluginState::Started,
            });
        }

        tracing::debug!(plugin = %plugin.id(), "Starting plugin");
        let context = plugin.attach_context(context);

        if let Err(source) = plugin.connect_extension_points(&context) {
            Self::rollback(plugin, &context, previous);
            return Err(ActivationError::Extensions {
                id: plugin.id().to_string(),
                source,
            });
        }

        if let Err(source) = plugin.register_services(&context) {
            Self::rollback(plugin, &context, previous);
            return Err(ActivationError::Services {
                id: plugin.id().to_string(),
                source,
            });
        }

        if let Err(source) = plugin.plugin().start(&context) {
            Self::rollback(plugin, &context, previous);
            return Err(ActivationError::Plugin {
                id: plugin.id().to_string(),
                source,
            });
        }

        plugin.set_state(PluginState::Started);
        tracing::info!(plugin = %plugin.id(), "Plugin started");
        Ok(())
    }

    fn stop_plugin(&self, plugin: &Arc<PluginHandle>) -> Result<(), ActivationError> {
        let state = plugin.state();
        let context = match (state, plugin.context()) {
            (PluginState::Started, Some(context)) => context,
            _ => {
                return Err(ActivationError::InvalidTransition {
                    id: plugin.id().to_string(),
                    from: state,
                    to: PluginState::Stopped,
                });
            }
        };

        tracing::debug!(plugin = %plugin.id(), "Stopping plugin");
        plugin
            .plugin()
            .stop(&context)
            .map_err(|source| ActivationError::Plugin {
                id: plugin.id().to_string(),
                source,
            })?;

        plugin
            .unregister_services(&context)
            .map_err(|source| ActivationError::Services {
                id: plugin.id().to_string(),
                source,
            })?;

        plugin.disconnect_extension_points();
        plugin.set_state(PluginState::Stopped);
        tracing::info!(plugin = %plugin.id(), "Plugin stopped");
        Ok(())
    }
}
