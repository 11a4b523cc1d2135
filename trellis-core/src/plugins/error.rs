//! Plugin lifecycle error types

use thiserror::Error;
use trellis_plugin_api::{ExtensionError, PluginError, ServiceError};

use super::handle::PluginState;

/// Errors raised while starting or stopping a single plugin
#[derive(Error, Debug)]
pub enum ActivationError {
    /// Start of a started plugin, or stop of a plugin that is not started
    #[error("Plugin '{id}' cannot go from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: PluginState,
        to: PluginState,
    },

    /// Connecting the plugin's extension point views failed
    #[error("Plugin '{id}' could not follow its extension points: {source}")]
    Extensions {
        id: String,
        #[source]
        source: ExtensionError,
    },

    /// Registering or unregistering the plugin's services failed
    #[error("Plugin '{id}' service bookkeeping failed: {source}")]
    Services {
        id: String,
        #[source]
        source: ServiceError,
    },

    /// The plugin's own start/stop hook failed
    #[error("Plugin '{id}' failed: {source}")]
    Plugin {
        id: String,
        #[source]
        source: PluginError,
    },
}

/// Errors that can occur in a plugin manager
#[derive(Error, Debug)]
pub enum PluginManagerError {
    /// No (visible) plugin with that id
    #[error("No such plugin: {0}")]
    NoSuchPlugin(String),

    /// An include/exclude pattern is not a valid glob
    #[error("Invalid plugin pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    /// The manager was asked to start plugins before being given registries
    #[error("Plugin manager has no environment; attach it to an application first")]
    NoEnvironment,

    /// Operation a composite manager does not provide
    #[error("{0} is not supported by a composite plugin manager")]
    Unsupported(&'static str),

    #[error("Activation error: {0}")]
    Activation(#[from] ActivationError),

    /// A roster listener returned an error
    #[error("Plugin listener failed: {0}")]
    Listener(#[from] PluginError),
}
