//! An extension registry whose extensions are set directly.

use std::collections::HashMap;

use indexmap::IndexMap;
use parking_lot::Mutex;
use trellis_plugin_api::{
    Extension, ExtensionChangeEvent, ExtensionError, ExtensionListener, ExtensionPoint,
    ExtensionRegistry, Index,
};

use super::listeners::{ListenerTable, dispatch};

#[derive(Default)]
struct State {
    extension_points: IndexMap<String, ExtensionPoint>,
    extensions: HashMap<String, Vec<Extension>>,
}

/// Extension registry that stores extension lists itself.
///
/// Useful on its own for tests and simple hosts; applications use the
/// provider-backed registries instead.
#[derive(Default)]
pub struct MutableExtensionRegistry {
    state: Mutex<State>,
    listeners: ListenerTable,
}

impl MutableExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_extension(&self, extension_point_id: &str, extension: Extension) -> Result<(), ExtensionError> {
        self.add_extensions(extension_point_id, vec![extension])
    }

    /// Append extensions, firing one change at the old end of the list.
    pub fn add_extensions(
        &self,
        extension_point_id: &str,
        extensions: Vec<Extension>,
    ) -> Result<(), ExtensionError> {
        let (listeners, event) = {
            let mut state = self.state.lock();
            if !state.extension_points.contains_key(extension_point_id) {
                return Err(ExtensionError::UnknownExtensionPoint(extension_point_id.to_string()));
            }
            let list = state.extensions.entry(extension_point_id.to_string()).or_default();
            let index = Index::At(list.len());
            list.extend(extensions.iter().cloned());
            (
                self.listeners.snapshot(extension_point_id),
                ExtensionChangeEvent::items(extension_point_id, extensions, Vec::new(), index),
            )
        };

        tracing::debug!(extension_point = %extension_point_id, added = event.added.len(), "Extensions added");
        dispatch(&listeners, &event)
    }

    pub fn remove_extension(&self, extension_point_id: &str, extension: &Extension) -> Result<(), ExtensionError> {
        self.remove_extensions(extension_point_id, std::slice::from_ref(extension))
    }

    /// Remove extensions by identity. Nothing is removed if any is missing.
    pub fn remove_extensions(
        &self,
        extension_point_id: &str,
        extensions: &[Extension],
    ) -> Result<(), ExtensionError> {
        let (listeners, event) = {
            let mut state = self.state.lock();
            if !state.extension_points.contains_key(extension_point_id) {
                return Err(ExtensionError::UnknownExtensionPoint(extension_point_id.to_string()));
            }
            let list = state.extensions.entry(extension_point_id.to_string()).or_default();

            let mut remaining = list.clone();
            for extension in extensions {
                let position = remaining
                    .iter()
                    .position(|candidate| candidate.ptr_eq(extension))
                    .ok_or_else(|| ExtensionError::UnknownExtension(extension_point_id.to_string()))?;
                remaining.remove(position);
            }
            *list = remaining;

            (
                self.listeners.snapshot(extension_point_id),
                ExtensionChangeEvent::replaced(extension_point_id, Vec::new(), extensions.to_vec()),
            )
        };

        tracing::debug!(extension_point = %extension_point_id, removed = event.removed.len(), "Extensions removed");
        dispatch(&listeners, &event)
    }
}

impl ExtensionRegistry for MutableExtensionRegistry {
    fn add_extension_point(&self, extension_point: ExtensionPoint) {
        tracing::debug!(extension_point = %extension_point.id(), "Extension point added");
        self.state
            .lock()
            .extension_points
            .insert(extension_point.id().to_string(), extension_point);
    }

    fn get_extension_point(&self, extension_point_id: &str) -> Option<ExtensionPoint> {
        self.state.lock().extension_points.get(extension_point_id).cloned()
    }

    fn get_extension_points(&self) -> Vec<ExtensionPoint> {
        self.state.lock().extension_points.values().cloned().collect()
    }

    fn get_extensions(&self, extension_point_id: &str) -> Result<Vec<Extension>, ExtensionError> {
        Ok(self
            .state
            .lock()
            .extensions
            .get(extension_point_id)
            .cloned()
            .unwrap_or_default())
    }

    fn set_extensions(
        &self,
        extension_point_id: &str,
        extensions: Vec<Extension>,
    ) -> Result<(), ExtensionError> {
        let (listeners, event) = {
            let mut state = self.state.lock();
            if !state.extension_points.contains_key(extension_point_id) {
                return Err(ExtensionError::UnknownExtensionPoint(extension_point_id.to_string()));
            }
            let old = state
                .extensions
                .insert(extension_point_id.to_string(), extensions.clone())
                .unwrap_or_default();
            (
                self.listeners.snapshot(extension_point_id),
                ExtensionChangeEvent::replaced(extension_point_id, extensions, old),
            )
        };

        tracing::debug!(extension_point = %extension_point_id, "Extensions replaced");
        dispatch(&listeners, &event)
    }

    fn remove_extension_point(&self, extension_point_id: &str) -> Result<(), ExtensionError> {
        let (listeners, event) = {
            let mut state = self.state.lock();
            if state.extension_points.shift_remove(extension_point_id).is_none() {
                return Err(ExtensionError::UnknownExtensionPoint(extension_point_id.to_string()));
            }
            let old = state.extensions.remove(extension_point_id).unwrap_or_default();
            (
                self.listeners.snapshot(extension_point_id),
                ExtensionChangeEvent::items(extension_point_id, Vec::new(), old, Index::At(0)),
            )
        };

        tracing::debug!(extension_point = %extension_point_id, "Extension point removed");
        dispatch(&listeners, &event)
    }

    fn add_extension_point_listener(&self, listener: &ExtensionListener, extension_point_id: Option<&str>) {
        self.listeners.add(listener, extension_point_id);
    }

    fn remove_extension_point_listener(
        &self,
        listener: &ExtensionListener,
        extension_point_id: Option<&str>,
    ) -> Result<(), ExtensionError> {
        self.listeners.remove(listener, extension_point_id)
    }
}
