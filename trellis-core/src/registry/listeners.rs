//! Listener bookkeeping shared by the extension registries.

use std::collections::HashMap;

use parking_lot::Mutex;
use trellis_plugin_api::{ExtensionChangeEvent, ExtensionError, ExtensionListener, Notifier};

/// Listeners keyed by extension point id, `None` meaning "every id".
#[derive(Default)]
pub(crate) struct ListenerTable {
    by_id: Mutex<HashMap<Option<String>, Notifier<ExtensionChangeEvent>>>,
}

impl ListenerTable {
    pub(crate) fn add(&self, listener: &ExtensionListener, extension_point_id: Option<&str>) {
        self.by_id
            .lock()
            .entry(extension_point_id.map(str::to_string))
            .or_default()
            .subscribe(listener);
    }

    pub(crate) fn remove(
        &self,
        listener: &ExtensionListener,
        extension_point_id: Option<&str>,
    ) -> Result<(), ExtensionError> {
        let key = extension_point_id.map(str::to_string);
        let found = self
            .by_id
            .lock()
            .get(&key)
            .is_some_and(|notifier| notifier.unsubscribe(listener));
        if found {
            Ok(())
        } else {
            Err(ExtensionError::ListenerNotFound(
                extension_point_id.unwrap_or("<all>").to_string(),
            ))
        }
    }

    /// Live listeners for `extension_point_id`: id-specific ones first.
    pub(crate) fn snapshot(&self, extension_point_id: &str) -> Vec<ExtensionListener> {
        let by_id = self.by_id.lock();
        let mut listeners = by_id
            .get(&Some(extension_point_id.to_string()))
            .map(Notifier::live)
            .unwrap_or_default();
        if let Some(all) = by_id.get(&None) {
            listeners.extend(all.live());
        }
        listeners
    }
}

/// Call `listeners` in order. The first error aborts the dispatch.
pub(crate) fn dispatch(
    listeners: &[ExtensionListener],
    event: &ExtensionChangeEvent,
) -> Result<(), ExtensionError> {
    for listener in listeners {
        listener(event).map_err(ExtensionError::listener)?;
    }
    Ok(())
}
