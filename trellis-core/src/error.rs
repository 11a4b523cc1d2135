//! Error types for trellis-core

use std::path::PathBuf;

use thiserror::Error;
use trellis_plugin_api::{ExtensionError, PluginError, ServiceError};

use crate::plugins::{ActivationError, PluginManagerError};

/// Top-level error type for trellis-core
#[derive(Error, Debug)]
pub enum TrellisError {
    #[error("Extension error: {0}")]
    Extension(#[from] ExtensionError),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),

    #[error("Activation error: {0}")]
    Activation(#[from] ActivationError),

    #[error("Plugin manager error: {0}")]
    PluginManager(#[from] PluginManagerError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors loading application configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_read_error_names_path() {
        let err = ConfigError::Read {
            path: PathBuf::from("/etc/trellis/config.toml"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/etc/trellis/config.toml"));
    }

    #[test]
    fn test_subsystem_errors_convert() {
        let err: TrellisError = ExtensionError::UnknownExtensionPoint("x".into()).into();
        assert!(matches!(err, TrellisError::Extension(_)));

        let err: TrellisError = PluginManagerError::NoSuchPlugin("acme".into()).into();
        assert!(err.to_string().contains("acme"));
    }
}
