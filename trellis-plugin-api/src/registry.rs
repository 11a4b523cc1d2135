//! The extension registry interface.

use crate::error::ExtensionError;
use crate::event::{ExtensionChangeEvent, Listener};
use crate::extension::{Extension, ExtensionPoint};

/// Listener for extension point changes.
pub type ExtensionListener = Listener<ExtensionChangeEvent>;

/// Maps extension point ids to extension points and their extensions.
///
/// Listeners may be registered for one extension point id or, with `None`,
/// for every id. Id-specific listeners are called before catch-all ones, and
/// the set of listeners called for a change is fixed when the change starts.
pub trait ExtensionRegistry: Send + Sync {
    fn add_extension_point(&self, extension_point: ExtensionPoint);

    fn get_extension_point(&self, extension_point_id: &str) -> Option<ExtensionPoint>;

    fn get_extension_points(&self) -> Vec<ExtensionPoint>;

    fn get_extensions(&self, extension_point_id: &str) -> Result<Vec<Extension>, ExtensionError>;

    fn set_extensions(
        &self,
        extension_point_id: &str,
        extensions: Vec<Extension>,
    ) -> Result<(), ExtensionError>;

    fn remove_extension_point(&self, extension_point_id: &str) -> Result<(), ExtensionError>;

    fn add_extension_point_listener(
        &self,
        listener: &ExtensionListener,
        extension_point_id: Option<&str>,
    );

    fn remove_extension_point_listener(
        &self,
        listener: &ExtensionListener,
        extension_point_id: Option<&str>,
    ) -> Result<(), ExtensionError>;
}
