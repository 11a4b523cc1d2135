//! Error types for plugin authors and registry consumers

use thiserror::Error;

use crate::service::ServiceId;

/// Errors that plugins can return
#[derive(Error, Debug)]
pub enum PluginError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Custom error with message
    #[error("{0}")]
    Custom(String),

    /// Invalid input error
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An extension registry operation failed
    #[error("Extension error: {0}")]
    Extension(#[from] ExtensionError),

    /// A service registry operation failed
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),
}

impl PluginError {
    /// Create a custom error with a message
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

/// Errors raised by extension registries and extension point views
#[derive(Error, Debug)]
pub enum ExtensionError {
    /// The extension point id was never registered
    #[error("Unknown extension point: {0}")]
    UnknownExtensionPoint(String),

    /// An extension to remove is not contributed to the extension point
    #[error("Extension not found in extension point {0}")]
    UnknownExtension(String),

    /// The registry only accepts contributions from providers
    #[error("Extensions of {0} cannot be set directly; contribute them through a provider")]
    SetNotSupported(String),

    /// Removing a listener that was never added (for that id)
    #[error("No such listener for extension point {0}")]
    ListenerNotFound(String),

    /// Removing a provider that is not in the roster
    #[error("Provider is not registered with this registry")]
    UnknownProvider,

    /// A contribution does not have the element type declared by the point
    #[error("Extension point {id} expects {expected}, found {found}")]
    TypeMismatch {
        id: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A provider failed to report its contributions
    #[error("Provider failed to report extensions for {id}: {source}")]
    Provider {
        id: String,
        #[source]
        source: Box<PluginError>,
    },

    /// A listener returned an error while being notified
    #[error("Extension listener failed: {0}")]
    Listener(#[source] Box<PluginError>),
}

impl ExtensionError {
    /// Wrap an error returned by a listener callback
    pub fn listener(error: PluginError) -> Self {
        Self::Listener(Box::new(error))
    }

    /// Wrap an error returned by a provider for one extension point
    pub fn provider(id: impl Into<String>, error: PluginError) -> Self {
        Self::Provider {
            id: id.into(),
            source: Box::new(error),
        }
    }
}

/// Errors raised by the service registry
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The service id is not (or no longer) registered
    #[error("No service with id <{0}>")]
    UnknownService(ServiceId),

    /// A required service query matched nothing
    #[error("No service for protocol {protocol} matching '{query}'")]
    NoSuchService { protocol: String, query: String },

    /// A named factory could not be resolved
    #[error("Cannot resolve service factory <{0}>")]
    UnresolvedFactory(String),

    /// A service factory returned an error
    #[error("Service factory for <{service_id}> failed: {source}")]
    Factory {
        service_id: ServiceId,
        #[source]
        source: Box<PluginError>,
    },

    /// A registration listener returned an error
    #[error("Service listener failed: {0}")]
    Listener(#[source] Box<PluginError>),
}

impl ServiceError {
    /// Wrap an error returned by a listener callback
    pub fn listener(error: PluginError) -> Self {
        Self::Listener(Box::new(error))
    }
}
