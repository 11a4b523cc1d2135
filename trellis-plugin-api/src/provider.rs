//! Extension providers and a ready-made contribution store.

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::PluginError;
use crate::event::{ExtensionChangeEvent, Index, Notifier};
use crate::extension::{Extension, ExtensionPoint};

/// Something that declares extension points and contributes extensions.
///
/// Providers report their own changes through [`ExtensionProvider::extension_changes`]
/// using provider-local indices; registries translate them.
pub trait ExtensionProvider: Send + Sync {
    /// Extension points this provider declares.
    fn extension_points(&self) -> Vec<ExtensionPoint> {
        Vec::new()
    }

    /// Extensions this provider contributes to `extension_point_id`.
    fn extensions(&self, extension_point_id: &str) -> Result<Vec<Extension>, PluginError> {
        let _ = extension_point_id;
        Ok(Vec::new())
    }

    /// Notifier the provider fires after its contributions change.
    fn extension_changes(&self) -> &Notifier<ExtensionChangeEvent>;
}

/// Computes contributions on demand.
pub type ContributionFn = dyn Fn() -> Result<Vec<Extension>, PluginError> + Send + Sync;

#[derive(Clone)]
enum Source {
    Values(Vec<Extension>),
    Lazy(Arc<ContributionFn>),
}

/// Per-extension-point contribution lists with change notification.
///
/// Plugins embed one of these and forward [`ExtensionProvider`] to it. Every
/// mutation emits an [`ExtensionChangeEvent`] with indices local to this store.
#[derive(Default)]
pub struct Contributions {
    sources: Mutex<HashMap<String, Source>>,
    changes: Notifier<ExtensionChangeEvent>,
}

impl Contributions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: contribute fixed values to an extension point.
    pub fn with(self, extension_point_id: impl Into<String>, values: Vec<Extension>) -> Self {
        self.sources
            .lock()
            .insert(extension_point_id.into(), Source::Values(values));
        self
    }

    /// Builder: compute contributions when they are first asked for.
    pub fn lazy<F>(self, extension_point_id: impl Into<String>, compute: F) -> Self
    where
        F: Fn() -> Result<Vec<Extension>, PluginError> + Send + Sync + 'static,
    {
        self.sources
            .lock()
            .insert(extension_point_id.into(), Source::Lazy(Arc::new(compute)));
        self
    }

    /// Ids this store has contributions (or a contribution function) for.
    pub fn extension_point_ids(&self) -> Vec<String> {
        self.sources.lock().keys().cloned().collect()
    }

    pub fn extensions(&self, extension_point_id: &str) -> Result<Vec<Extension>, PluginError> {
        let source = self.sources.lock().get(extension_point_id).cloned();
        match source {
            Some(Source::Values(values)) => Ok(values),
            Some(Source::Lazy(compute)) => compute(),
            None => Ok(Vec::new()),
        }
    }

    pub fn changes(&self) -> &Notifier<ExtensionChangeEvent> {
        &self.changes
    }

    /// Replace the contributions to an extension point.
    pub fn set(&self, extension_point_id: &str, values: Vec<Extension>) -> Result<(), PluginError> {
        let old = self.extensions(extension_point_id)?;
        self.sources
            .lock()
            .insert(extension_point_id.to_string(), Source::Values(values.clone()));
        if old.is_empty() && values.is_empty() {
            return Ok(());
        }

        let end = old.len().max(values.len());
        self.changes.notify(&ExtensionChangeEvent::items(
            extension_point_id,
            values,
            old,
            Index::Range { start: 0, end },
        ))
    }

    pub fn push(&self, extension_point_id: &str, value: Extension) -> Result<(), PluginError> {
        let len = self.extensions(extension_point_id)?.len();
        self.insert(extension_point_id, len, value)
    }

    pub fn insert(
        &self,
        extension_point_id: &str,
        index: usize,
        value: Extension,
    ) -> Result<(), PluginError> {
        self.splice(extension_point_id, index..index, vec![value])?;
        Ok(())
    }

    pub fn remove(&self, extension_point_id: &str, index: usize) -> Result<Extension, PluginError> {
        let mut removed = self.splice(extension_point_id, index..index + 1, Vec::new())?;
        removed
            .pop()
            .ok_or_else(|| PluginError::invalid_input(format!("no extension at {index}")))
    }

    /// Replace `range` with `values`, returning what was removed.
    pub fn splice(
        &self,
        extension_point_id: &str,
        range: Range<usize>,
        values: Vec<Extension>,
    ) -> Result<Vec<Extension>, PluginError> {
        let mut current = self.extensions(extension_point_id)?;
        if range.start > range.end || range.end > current.len() {
            return Err(PluginError::invalid_input(format!(
                "range {}..{} out of bounds for {} extensions of {}",
                range.start,
                range.end,
                current.len(),
                extension_point_id
            )));
        }
        if range.is_empty() && values.is_empty() {
            return Ok(Vec::new());
        }

        let index = if range.len() == 1 || (range.is_empty() && values.len() == 1) {
            Index::At(range.start)
        } else {
            Index::Range {
                start: range.start,
                end: range.start + range.len().max(values.len()),
            }
        };

        let removed: Vec<Extension> = current.splice(range, values.iter().cloned()).collect();
        self.sources
            .lock()
            .insert(extension_point_id.to_string(), Source::Values(current));

        self.changes.notify(&ExtensionChangeEvent::items(
            extension_point_id,
            values,
            removed.clone(),
            index,
        ))?;
        Ok(removed)
    }
}

impl fmt::Debug for Contributions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Contributions")
            .field("extension_points", &self.extension_point_ids())
            .finish()
    }
}
