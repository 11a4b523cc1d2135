//! An extension registry whose extensions come from providers.
//!
//! Extensions of an extension point are the concatenation, in roster order,
//! of what each provider contributes. An id is *materialized* the first time
//! it is read; from then on the registry keeps one sub-list per provider for
//! it and translates provider-local change indices into global ones.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use trellis_plugin_api::{
    Extension, ExtensionChangeEvent, ExtensionError, ExtensionListener, ExtensionPoint,
    ExtensionProvider, ExtensionRegistry, Index, PluginError,
};

use super::listeners::{ListenerTable, dispatch};

/// Identity of a provider: the address of its shared allocation.
fn same_provider(a: &Arc<dyn ExtensionProvider>, b: &Arc<dyn ExtensionProvider>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

struct ProviderEntry {
    provider: Arc<dyn ExtensionProvider>,
    subscription: ExtensionListener,
}

#[derive(Default)]
struct State {
    extension_points: IndexMap<String, ExtensionPoint>,
    providers: Vec<ProviderEntry>,
    /// Materialized ids; `lists[k]` is what `providers[k]` contributes.
    extensions: IndexMap<String, Vec<Vec<Extension>>>,
}

impl State {
    fn position(&self, provider: &Arc<dyn ExtensionProvider>) -> Option<usize> {
        self.providers
            .iter()
            .position(|entry| same_provider(&entry.provider, provider))
    }

    fn roster(&self) -> Vec<Arc<dyn ExtensionProvider>> {
        self.providers.iter().map(|entry| entry.provider.clone()).collect()
    }
}

fn flatten(lists: &[Vec<Extension>]) -> Vec<Extension> {
    lists.iter().flatten().cloned().collect()
}

fn offset_of(lists: &[Vec<Extension>], position: usize) -> usize {
    lists[..position].iter().map(Vec::len).sum()
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    listeners: ListenerTable,
}

impl Inner {
    fn provider_changed(
        &self,
        provider: &Arc<dyn ExtensionProvider>,
        event: &ExtensionChangeEvent,
    ) -> Result<(), PluginError> {
        let id = event.extension_point_id.as_str();
        {
            let state = self.state.lock();
            if state.position(provider).is_none() {
                return Ok(());
            }
            if !state.extensions.contains_key(id) {
                tracing::debug!(extension_point = %id, "Change to an unread extension point ignored");
                return Ok(());
            }
        }

        let contributed = provider
            .extensions(id)
            .map_err(|e| ExtensionError::provider(id, e))?;

        let (listeners, translated) = {
            let mut state = self.state.lock();
            let Some(position) = state.position(provider) else {
                return Ok(());
            };
            let Some(lists) = state.extensions.get_mut(id) else {
                return Ok(());
            };
            lists[position] = contributed;
            let offset = offset_of(lists, position);
            (self.listeners.snapshot(id), event.translated(offset))
        };

        tracing::debug!(
            extension_point = %id,
            added = translated.added.len(),
            removed = translated.removed.len(),
            "Provider contributions changed"
        );
        dispatch(&listeners, &translated)?;
        Ok(())
    }
}

/// Extension registry backed by an ordered roster of providers.
///
/// Cloning gives another handle to the same registry.
#[derive(Clone, Default)]
pub struct ProviderExtensionRegistry {
    inner: Arc<Inner>,
}

impl ProviderExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Providers in roster order.
    pub fn providers(&self) -> Vec<Arc<dyn ExtensionProvider>> {
        self.inner.state.lock().roster()
    }

    /// Append a provider to the roster.
    ///
    /// Its extension points are registered, and for every materialized id its
    /// contributions are appended and announced. Contributions are gathered
    /// before anything changes, so a failing provider leaves the registry as
    /// it was.
    pub fn add_provider(&self, provider: Arc<dyn ExtensionProvider>) -> Result<(), ExtensionError> {
        let extension_points = provider.extension_points();
        let mut gathered: HashMap<String, Vec<Extension>> = HashMap::new();

        let mut state = loop {
            let missing: Vec<String> = {
                let state = self.inner.state.lock();
                if state.position(&provider).is_some() {
                    tracing::debug!("Provider already registered");
                    return Ok(());
                }
                let missing: Vec<String> = state
                    .extensions
                    .keys()
                    .filter(|id| !gathered.contains_key(*id))
                    .cloned()
                    .collect();
                if missing.is_empty() {
                    break state;
                }
                missing
            };
            for id in missing {
                let contributed = provider
                    .extensions(&id)
                    .map_err(|e| ExtensionError::provider(&id, e))?;
                gathered.insert(id, contributed);
            }
        };

        for extension_point in extension_points {
            state
                .extension_points
                .insert(extension_point.id().to_string(), extension_point);
        }

        let mut events = Vec::new();
        for (id, lists) in state.extensions.iter_mut() {
            let contributed = gathered.remove(id).unwrap_or_default();
            if !contributed.is_empty() {
                let index = Index::At(lists.iter().map(Vec::len).sum());
                events.push(ExtensionChangeEvent::items(id, contributed.clone(), Vec::new(), index));
            }
            lists.push(contributed);
        }

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let source: Weak<dyn ExtensionProvider> = Arc::downgrade(&provider);
        let subscription: ExtensionListener = Arc::new(move |event: &ExtensionChangeEvent| {
            match (weak.upgrade(), source.upgrade()) {
                (Some(inner), Some(provider)) => inner.provider_changed(&provider, event),
                _ => Ok(()),
            }
        });
        provider.extension_changes().subscribe(&subscription);
        state.providers.push(ProviderEntry {
            provider,
            subscription,
        });

        let pending: Vec<_> = events
            .into_iter()
            .map(|event| (self.inner.listeners.snapshot(&event.extension_point_id), event))
            .collect();
        drop(state);

        tracing::debug!(announced = pending.len(), "Provider added");
        for (listeners, event) in pending {
            dispatch(&listeners, &event)?;
        }
        Ok(())
    }

    /// Remove a provider, retracting its contributions and its extension points.
    pub fn remove_provider(&self, provider: &Arc<dyn ExtensionProvider>) -> Result<(), ExtensionError> {
        let extension_points = provider.extension_points();

        let pending = {
            let mut state = self.inner.state.lock();
            let position = state
                .position(provider)
                .ok_or(ExtensionError::UnknownProvider)?;

            let mut events = Vec::new();
            for (id, lists) in state.extensions.iter_mut() {
                let removed = lists.remove(position);
                if !removed.is_empty() {
                    let index = Index::At(offset_of(lists, position));
                    events.push(ExtensionChangeEvent::items(id, Vec::new(), removed, index));
                }
            }

            for extension_point in &extension_points {
                state.extension_points.shift_remove(extension_point.id());
            }

            let entry = state.providers.remove(position);
            entry.provider.extension_changes().unsubscribe(&entry.subscription);

            events
                .into_iter()
                .map(|event| (self.inner.listeners.snapshot(&event.extension_point_id), event))
                .collect::<Vec<_>>()
        };

        tracing::debug!(retracted = pending.len(), "Provider removed");
        for (listeners, event) in pending {
            dispatch(&listeners, &event)?;
        }
        Ok(())
    }
}

impl ExtensionRegistry for ProviderExtensionRegistry {
    fn add_extension_point(&self, extension_point: ExtensionPoint) {
        tracing::debug!(extension_point = %extension_point.id(), "Extension point added");
        self.inner
            .state
            .lock()
            .extension_points
            .insert(extension_point.id().to_string(), extension_point);
    }

    fn get_extension_point(&self, extension_point_id: &str) -> Option<ExtensionPoint> {
        self.inner
            .state
            .lock()
            .extension_points
            .get(extension_point_id)
            .cloned()
    }

    fn get_extension_points(&self) -> Vec<ExtensionPoint> {
        self.inner
            .state
            .lock()
            .extension_points
            .values()
            .cloned()
            .collect()
    }

    fn get_extensions(&self, extension_point_id: &str) -> Result<Vec<Extension>, ExtensionError> {
        loop {
            let roster = {
                let state = self.inner.state.lock();
                if let Some(lists) = state.extensions.get(extension_point_id) {
                    return Ok(flatten(lists));
                }
                if !state.extension_points.contains_key(extension_point_id) {
                    tracing::warn!(
                        extension_point = %extension_point_id,
                        "No provider declares this extension point"
                    );
                    return Ok(Vec::new());
                }
                state.roster()
            };

            let mut lists = Vec::with_capacity(roster.len());
            for provider in &roster {
                let contributed = provider
                    .extensions(extension_point_id)
                    .map_err(|e| ExtensionError::provider(extension_point_id, e))?;
                lists.push(contributed);
            }

            let mut state = self.inner.state.lock();
            if let Some(existing) = state.extensions.get(extension_point_id) {
                return Ok(flatten(existing));
            }
            let unchanged = state.providers.len() == roster.len()
                && state
                    .providers
                    .iter()
                    .zip(&roster)
                    .all(|(entry, provider)| same_provider(&entry.provider, provider));
            if unchanged {
                let extensions = flatten(&lists);
                state.extensions.insert(extension_point_id.to_string(), lists);
                tracing::debug!(extension_point = %extension_point_id, "Extension point materialized");
                return Ok(extensions);
            }
        }
    }

    fn set_extensions(
        &self,
        extension_point_id: &str,
        _extensions: Vec<Extension>,
    ) -> Result<(), ExtensionError> {
        Err(ExtensionError::SetNotSupported(extension_point_id.to_string()))
    }

    fn remove_extension_point(&self, extension_point_id: &str) -> Result<(), ExtensionError> {
        let (listeners, event) = {
            let mut state = self.inner.state.lock();
            if state.extension_points.shift_remove(extension_point_id).is_none() {
                return Err(ExtensionError::UnknownExtensionPoint(extension_point_id.to_string()));
            }
            let old = state
                .extensions
                .shift_remove(extension_point_id)
                .map(|lists| flatten(&lists))
                .unwrap_or_default();
            (
                self.inner.listeners.snapshot(extension_point_id),
                ExtensionChangeEvent::items(extension_point_id, Vec::new(), old, Index::At(0)),
            )
        };

        tracing::debug!(extension_point = %extension_point_id, "Extension point removed");
        dispatch(&listeners, &event)
    }

    fn add_extension_point_listener(&self, listener: &ExtensionListener, extension_point_id: Option<&str>) {
        self.inner.listeners.add(listener, extension_point_id);
    }

    fn remove_extension_point_listener(
        &self,
        listener: &ExtensionListener,
        extension_point_id: Option<&str>,
    ) -> Result<(), ExtensionError> {
        self.inner.listeners.remove(listener, extension_point_id)
    }
}
