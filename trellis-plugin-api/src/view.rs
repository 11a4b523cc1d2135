//! Live, read-only views of one extension point.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::{ExtensionError, PluginError};
use crate::event::{ExtensionChangeEvent, Index, Listener, Notifier};
use crate::extension::Extension;
use crate::registry::{ExtensionListener, ExtensionRegistry};

/// What changed in a view.
#[derive(Debug, Clone)]
pub enum ViewEvent {
    /// Some items were spliced in place at `index`.
    Items {
        added: Vec<Extension>,
        removed: Vec<Extension>,
        index: Index,
    },
    /// The whole contents were rebuilt.
    Replaced {
        old: Vec<Extension>,
        new: Vec<Extension>,
    },
}

struct ViewInner {
    registry: Arc<dyn ExtensionRegistry>,
    extension_point_id: String,
    owner: String,
    snapshot: RwLock<Vec<Extension>>,
    observers: Notifier<ViewEvent>,
}

impl ViewInner {
    fn validate(&self, extensions: &[Extension]) -> Result<(), ExtensionError> {
        match self.registry.get_extension_point(&self.extension_point_id) {
            Some(point) => point.validate(extensions),
            None => Ok(()),
        }
    }

    fn on_registry_change(&self, event: &ExtensionChangeEvent) -> Result<(), PluginError> {
        let Some(index) = event.index else {
            return self.rebuild().map_err(PluginError::from);
        };

        // The registry has already applied the change, so the snapshot takes it
        // too and stays aligned; the mismatch is still reported to the caller.
        let invalid = self.validate(&event.added).err();

        let start = index.start();
        {
            let mut snapshot = self.snapshot.write();
            if start + event.removed.len() > snapshot.len() {
                drop(snapshot);
                debug!(
                    extension_point = %self.extension_point_id,
                    "Change does not line up with the view, rebuilding"
                );
                return self.rebuild().map_err(PluginError::from);
            }
            snapshot.splice(start..start + event.removed.len(), event.added.iter().cloned());
        }

        self.observers.notify(&ViewEvent::Items {
            added: event.added.clone(),
            removed: event.removed.clone(),
            index,
        })?;
        match invalid {
            Some(e) => {
                warn!(
                    extension_point = %self.extension_point_id,
                    owner = %self.owner,
                    error = %e,
                    "Extension point received contributions of the wrong type"
                );
                Err(e.into())
            }
            None => Ok(()),
        }
    }

    fn rebuild(&self) -> Result<(), ExtensionError> {
        let new = self.registry.get_extensions(&self.extension_point_id)?;
        let invalid = self.validate(&new).err();
        let old = std::mem::replace(&mut *self.snapshot.write(), new.clone());
        self.observers
            .notify(&ViewEvent::Replaced { old, new })
            .map_err(ExtensionError::listener)?;
        invalid.map_or(Ok(()), Err)
    }
}

/// A read-only list mirroring the extensions of one extension point.
///
/// The view subscribes to its registry on creation and unsubscribes when it
/// is dropped. Attempts to mutate it are refused with a warning: contributions
/// change through providers, never through a consumer's view.
///
/// On an element-typed extension point, connecting fails if the current
/// contents have the wrong type. Later changes always reach the snapshot, so
/// it keeps mirroring the registry position for position; a change that adds
/// items of the wrong type is returned as an error to whoever made it, and
/// [`values`](Self::values) skips those items.
pub struct ExtensionPointView {
    inner: Arc<ViewInner>,
    listener: ExtensionListener,
}

impl ExtensionPointView {
    /// Connect a view to `extension_point_id` on behalf of `owner`.
    pub fn connect(
        registry: Arc<dyn ExtensionRegistry>,
        extension_point_id: impl Into<String>,
        owner: impl Into<String>,
    ) -> Result<Self, ExtensionError> {
        let inner = Arc::new(ViewInner {
            registry,
            extension_point_id: extension_point_id.into(),
            owner: owner.into(),
            snapshot: RwLock::new(Vec::new()),
            observers: Notifier::new(),
        });
        let extensions = inner.registry.get_extensions(&inner.extension_point_id)?;
        inner.validate(&extensions)?;
        *inner.snapshot.write() = extensions;

        let weak: Weak<ViewInner> = Arc::downgrade(&inner);
        let listener: ExtensionListener = Arc::new(move |event: &ExtensionChangeEvent| {
            match weak.upgrade() {
                Some(inner) => inner.on_registry_change(event),
                None => Ok(()),
            }
        });
        inner
            .registry
            .add_extension_point_listener(&listener, Some(&inner.extension_point_id));

        Ok(Self { inner, listener })
    }

    pub fn extension_point_id(&self) -> &str {
        &self.inner.extension_point_id
    }

    /// Id of the plugin (or other consumer) that owns this view.
    pub fn owner(&self) -> &str {
        &self.inner.owner
    }

    pub fn len(&self) -> usize {
        self.inner.snapshot.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Extension> {
        self.inner.snapshot.read().get(index).cloned()
    }

    pub fn to_vec(&self) -> Vec<Extension> {
        self.inner.snapshot.read().clone()
    }

    /// Extensions that are `T`, as shared handles.
    pub fn values<T: Any + Send + Sync>(&self) -> Vec<Arc<T>> {
        self.inner
            .snapshot
            .read()
            .iter()
            .filter_map(Extension::downcast::<T>)
            .collect()
    }

    /// Re-read the extension point from the registry.
    pub fn refresh(&self) -> Result<(), ExtensionError> {
        self.inner.rebuild()
    }

    pub fn subscribe(&self, observer: &Listener<ViewEvent>) {
        self.inner.observers.subscribe(observer);
    }

    pub fn unsubscribe(&self, observer: &Listener<ViewEvent>) -> bool {
        self.inner.observers.unsubscribe(observer)
    }

    pub fn push(&self, _extension: Extension) {
        self.refuse("push");
    }

    pub fn insert(&self, _index: usize, _extension: Extension) {
        self.refuse("insert");
    }

    pub fn remove(&self, _index: usize) {
        self.refuse("remove");
    }

    pub fn clear(&self) {
        self.refuse("clear");
    }

    pub fn set(&self, _extensions: Vec<Extension>) {
        self.refuse("set");
    }

    pub fn sort_by<F>(&self, _compare: F)
    where
        F: FnMut(&Extension, &Extension) -> std::cmp::Ordering,
    {
        self.refuse("sort_by");
    }

    fn refuse(&self, operation: &str) {
        warn!(
            extension_point = %self.inner.extension_point_id,
            owner = %self.inner.owner,
            operation,
            "Extension point views are read-only; change a provider's contributions instead"
        );
    }

    /// Stop following the registry.
    pub fn disconnect(self) {}
}

impl Drop for ExtensionPointView {
    fn drop(&mut self) {
        if let Err(e) = self
            .inner
            .registry
            .remove_extension_point_listener(&self.listener, Some(&self.inner.extension_point_id))
        {
            debug!(
                extension_point = %self.inner.extension_point_id,
                error = %e,
                "View listener was already gone"
            );
        }
    }
}

impl fmt::Debug for ExtensionPointView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionPointView")
            .field("extension_point_id", &self.inner.extension_point_id)
            .field("owner", &self.inner.owner)
            .field("extensions", &*self.inner.snapshot.read())
            .finish()
    }
}
