//! Application configuration, layered from TOML files.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::plugins::{PluginFilter, PluginManagerError};

/// Application id used when no configuration names one.
pub const DEFAULT_APPLICATION_ID: &str = "trellis";

/// Configuration as stored in TOML files (optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawApplicationConfig {
    pub id: Option<String>,
    pub home: Option<PathBuf>,

    #[serde(default)]
    pub plugins: RawPluginsConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawPluginsConfig {
    pub include: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
}

/// Final configuration with defaults applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    pub id: String,

    /// Application home; `data_dir()/<id>` when unset.
    pub home: Option<PathBuf>,

    #[serde(default)]
    pub plugins: PluginsConfig,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            id: DEFAULT_APPLICATION_ID.to_string(),
            home: None,
            plugins: PluginsConfig::default(),
        }
    }
}

impl ApplicationConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    /// The configured home, or the default home for this application id.
    pub fn resolved_home(&self) -> PathBuf {
        self.home
            .clone()
            .unwrap_or_else(|| trellis_paths::application_home(&self.id))
    }
}

/// Which plugins a manager exposes.
///
/// An empty `include` list includes everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginsConfig {
    #[serde(default)]
    pub include: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,
}

impl PluginsConfig {
    pub fn filter(&self) -> Result<PluginFilter, PluginManagerError> {
        PluginFilter::new(&self.include, &self.exclude)
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (user + project)
    pub fn load() -> Result<ApplicationConfig, ConfigError> {
        Self::load_with(None)
    }

    /// Load merged configuration, with `extra` layered over user and project config.
    pub fn load_with(extra: Option<&Path>) -> Result<ApplicationConfig, ConfigError> {
        let mut raw = RawApplicationConfig::default();

        // Layer 1: User config
        let user_path = Self::user_config_path();
        if user_path.exists() {
            raw = Self::merge_raw(raw, Self::read_raw(&user_path)?);
        }

        // Layer 2: Project config
        let project_path = Self::project_config_path();
        if project_path.exists() {
            raw = Self::merge_raw(raw, Self::read_raw(&project_path)?);
        }

        // Layer 3: explicitly requested file, which must exist
        if let Some(path) = extra {
            raw = Self::merge_raw(raw, Self::read_raw(path)?);
        }

        Ok(Self::finalize(raw))
    }

    /// Load a single file, applying defaults.
    pub fn load_file(path: &Path) -> Result<ApplicationConfig, ConfigError> {
        Ok(Self::finalize(Self::read_raw(path)?))
    }

    pub fn user_config_path() -> PathBuf {
        trellis_paths::config_dir().join("config.toml")
    }

    /// Get project config path
    /// Can be overridden with TRELLIS_PROJECT_CONFIG_DIR env var
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var("TRELLIS_PROJECT_CONFIG_DIR") {
            PathBuf::from(dir).join("config.toml")
        } else {
            PathBuf::from(".trellis/config.toml")
        }
    }

    fn read_raw(path: &Path) -> Result<RawApplicationConfig, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let raw = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Loaded configuration layer");
        Ok(raw)
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawApplicationConfig, overlay: RawApplicationConfig) -> RawApplicationConfig {
        RawApplicationConfig {
            id: overlay.id.or(base.id),
            home: overlay.home.or(base.home),
            plugins: RawPluginsConfig {
                include: overlay.plugins.include.or(base.plugins.include),
                exclude: overlay.plugins.exclude.or(base.plugins.exclude),
            },
        }
    }

    fn finalize(raw: RawApplicationConfig) -> ApplicationConfig {
        ApplicationConfig {
            id: raw
                .id
                .unwrap_or_else(|| DEFAULT_APPLICATION_ID.to_string()),
            home: raw.home,
            plugins: PluginsConfig {
                include: raw.plugins.include.unwrap_or_default(),
                exclude: raw.plugins.exclude.unwrap_or_default(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_default_values() {
        let config = ApplicationConfig::default();
        assert_eq!(config.id, "trellis");
        assert!(config.home.is_none());
        assert!(config.plugins.include.is_empty());
        assert!(config.plugins.exclude.is_empty());
    }

    #[test]
    fn test_load_file_applies_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[plugins]\nexclude = [\"acme.*\"]\n").unwrap();

        let config = ConfigLoader::load_file(&path).unwrap();

        assert_eq!(config.id, DEFAULT_APPLICATION_ID);
        assert_eq!(config.plugins.exclude, vec!["acme.*".to_string()]);
        assert!(config.plugins.include.is_empty());
    }

    #[test]
    fn test_load_file_missing_is_read_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing.toml");

        let err = ConfigLoader::load_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_invalid_toml_is_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "this is not valid toml {{{{").unwrap();

        let err = ConfigLoader::load_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_merge_raw_overlay_overrides_base() {
        let base = RawApplicationConfig {
            id: Some("base".to_string()),
            home: Some(PathBuf::from("/base")),
            plugins: RawPluginsConfig {
                include: Some(vec!["acme.*".to_string()]),
                exclude: Some(vec!["acme.debug".to_string()]),
            },
        };
        let overlay = RawApplicationConfig {
            id: Some("overlay".to_string()),
            home: None,
            plugins: RawPluginsConfig {
                include: None,
                exclude: Some(Vec::new()),
            },
        };

        let merged = ConfigLoader::merge_raw(base, overlay);

        assert_eq!(merged.id.as_deref(), Some("overlay"));
        assert_eq!(merged.home, Some(PathBuf::from("/base")));
        assert_eq!(merged.plugins.include, Some(vec!["acme.*".to_string()]));
        // An explicitly empty list still overrides.
        assert_eq!(merged.plugins.exclude, Some(Vec::new()));
    }

    #[test]
    #[serial]
    fn test_project_config_path_default() {
        // SAFETY: serialized with every other test touching the environment
        unsafe { std::env::remove_var("TRELLIS_PROJECT_CONFIG_DIR") };
        assert_eq!(
            ConfigLoader::project_config_path(),
            PathBuf::from(".trellis/config.toml")
        );
    }

    #[test]
    #[serial]
    fn test_load_layers_project_over_user() {
        let user_dir = TempDir::new().unwrap();
        let project_dir = TempDir::new().unwrap();
        let extra_dir = TempDir::new().unwrap();

        let user_config = user_dir.path().join("trellis").join("config.toml");
        std::fs::create_dir_all(user_config.parent().unwrap()).unwrap();
        std::fs::write(&user_config, "id = \"from-user\"\nhome = \"/srv/user\"\n").unwrap();
        std::fs::write(
            project_dir.path().join("config.toml"),
            "id = \"from-project\"\n",
        )
        .unwrap();
        let extra = extra_dir.path().join("extra.toml");
        std::fs::write(&extra, "[plugins]\ninclude = [\"acme.motd\"]\n").unwrap();

        // SAFETY: serialized with every other test touching the environment
        unsafe {
            std::env::set_var("XDG_CONFIG_HOME", user_dir.path());
            std::env::set_var("TRELLIS_PROJECT_CONFIG_DIR", project_dir.path());
        }

        let config = ConfigLoader::load_with(Some(&extra));

        unsafe {
            std::env::remove_var("XDG_CONFIG_HOME");
            std::env::remove_var("TRELLIS_PROJECT_CONFIG_DIR");
        }

        let config = config.unwrap();
        assert_eq!(config.id, "from-project");
        assert_eq!(config.home, Some(PathBuf::from("/srv/user")));
        assert_eq!(config.plugins.include, vec!["acme.motd".to_string()]);
    }

    #[test]
    fn test_resolved_home_prefers_configured() {
        let config = ApplicationConfig::new("acme").with_home("/srv/acme");
        assert_eq!(config.resolved_home(), PathBuf::from("/srv/acme"));

        let config = ApplicationConfig::new("acme");
        assert!(config.resolved_home().ends_with("acme"));
    }

    #[test]
    fn test_plugins_config_builds_filter() {
        let plugins = PluginsConfig {
            include: vec!["acme.*".to_string()],
            exclude: vec!["acme.debug".to_string()],
        };
        let filter = plugins.filter().unwrap();
        assert!(filter.allows("acme.motd"));
        assert!(!filter.allows("acme.debug"));
        assert!(!filter.allows("other.plugin"));
    }
}
