//! Change events and the listener plumbing shared by registries, providers and views.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::error::PluginError;
use crate::extension::Extension;

/// A callback notified with events of type `E`.
///
/// Notifiers only keep weak references, so whoever subscribes must keep the
/// `Arc` alive for as long as it wants to hear about changes.
pub type Listener<E> = Arc<dyn Fn(&E) -> Result<(), PluginError> + Send + Sync>;

/// Wrap a closure as a [`Listener`].
pub fn listener<E, F>(callback: F) -> Listener<E>
where
    F: Fn(&E) -> Result<(), PluginError> + Send + Sync + 'static,
{
    Arc::new(callback)
}

/// Position of a change inside an extension list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Index {
    /// A single position.
    At(usize),
    /// A half-open span of positions.
    Range { start: usize, end: usize },
}

impl Index {
    /// First position touched by the change.
    pub fn start(&self) -> usize {
        match self {
            Index::At(at) => *at,
            Index::Range { start, .. } => *start,
        }
    }

    /// Shift the index by `by` positions (used to translate a provider-local
    /// index into a registry-global one).
    pub fn offset(&self, by: usize) -> Self {
        match self {
            Index::At(at) => Index::At(at + by),
            Index::Range { start, end } => Index::Range {
                start: start + by,
                end: end + by,
            },
        }
    }
}

/// Describes a change to the extensions of one extension point.
///
/// `index` is `None` when the whole list was replaced, otherwise it locates
/// the splice in the (registry-global) extension list.
#[derive(Debug, Clone)]
pub struct ExtensionChangeEvent {
    pub extension_point_id: String,
    pub added: Vec<Extension>,
    pub removed: Vec<Extension>,
    pub index: Option<Index>,
}

impl ExtensionChangeEvent {
    /// An in-place change at `index`.
    pub fn items(
        extension_point_id: impl Into<String>,
        added: Vec<Extension>,
        removed: Vec<Extension>,
        index: Index,
    ) -> Self {
        Self {
            extension_point_id: extension_point_id.into(),
            added,
            removed,
            index: Some(index),
        }
    }

    /// A wholesale replacement of the list.
    pub fn replaced(
        extension_point_id: impl Into<String>,
        added: Vec<Extension>,
        removed: Vec<Extension>,
    ) -> Self {
        Self {
            extension_point_id: extension_point_id.into(),
            added,
            removed,
            index: None,
        }
    }

    pub fn is_replacement(&self) -> bool {
        self.index.is_none()
    }

    /// Same change with its index shifted by `offset`.
    pub fn translated(&self, offset: usize) -> Self {
        Self {
            extension_point_id: self.extension_point_id.clone(),
            added: self.added.clone(),
            removed: self.removed.clone(),
            index: self.index.map(|index| index.offset(offset)),
        }
    }
}

/// A list of weakly held listeners.
///
/// Dispatch snapshots the live listeners first and calls them with no lock
/// held, so a listener may subscribe, unsubscribe or trigger further
/// notifications. The first listener error stops the dispatch.
pub struct Notifier<E> {
    listeners: Mutex<Vec<Weak<dyn Fn(&E) -> Result<(), PluginError> + Send + Sync>>>,
}

impl<E> Notifier<E> {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, listener: &Listener<E>) {
        let mut listeners = self.listeners.lock();
        listeners.retain(|weak| weak.strong_count() > 0);
        listeners.push(Arc::downgrade(listener));
    }

    /// Remove one subscription of `listener`. Returns whether it was found.
    pub fn unsubscribe(&self, listener: &Listener<E>) -> bool {
        let mut listeners = self.listeners.lock();
        listeners.retain(|weak| weak.strong_count() > 0);
        let target = Arc::as_ptr(listener);
        match listeners
            .iter()
            .position(|weak| std::ptr::addr_eq(weak.as_ptr(), target))
        {
            Some(position) => {
                listeners.remove(position);
                true
            }
            None => false,
        }
    }

    /// Upgrade and return the listeners that are still alive, pruning the rest.
    pub fn live(&self) -> Vec<Listener<E>> {
        let mut listeners = self.listeners.lock();
        listeners.retain(|weak| weak.strong_count() > 0);
        listeners.iter().filter_map(Weak::upgrade).collect()
    }

    pub fn len(&self) -> usize {
        self.live().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn notify(&self, event: &E) -> Result<(), PluginError> {
        for listener in self.live() {
            listener(event)?;
        }
        Ok(())
    }
}

impl<E> Default for Notifier<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Notifier<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("listeners", &self.listeners.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_index_offset() {
        assert_eq!(Index::At(2).offset(3), Index::At(5));
        assert_eq!(
            Index::Range { start: 0, end: 2 }.offset(4),
            Index::Range { start: 4, end: 6 }
        );
        assert_eq!(Index::Range { start: 1, end: 3 }.start(), 1);
    }

    #[test]
    fn test_translated_keeps_replacements_unindexed() {
        let event = ExtensionChangeEvent::replaced("x", vec![], vec![]);
        assert!(event.translated(10).is_replacement());

        let event = ExtensionChangeEvent::items("x", vec![Extension::new(1)], vec![], Index::At(0));
        assert_eq!(event.translated(10).index, Some(Index::At(10)));
    }

    #[test]
    fn test_notify_reaches_live_listeners() {
        let notifier = Notifier::<u32>::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let l = listener(move |value: &u32| {
            counter.fetch_add(*value as usize, Ordering::SeqCst);
            Ok(())
        });

        notifier.subscribe(&l);
        notifier.notify(&3).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_dropped_listener_is_pruned() {
        let notifier = Notifier::<u32>::new();
        let l = listener(|_: &u32| Ok(()));
        notifier.subscribe(&l);
        assert_eq!(notifier.len(), 1);

        drop(l);
        assert!(notifier.is_empty());
    }

    #[test]
    fn test_unsubscribe_unknown_listener() {
        let notifier = Notifier::<u32>::new();
        let l = listener(|_: &u32| Ok(()));
        assert!(!notifier.unsubscribe(&l));

        notifier.subscribe(&l);
        assert!(notifier.unsubscribe(&l));
        assert!(notifier.is_empty());
    }

    #[test]
    fn test_first_error_stops_dispatch() {
        let notifier = Notifier::<u32>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let failing = listener(|_: &u32| Err(PluginError::custom("nope")));
        let counter = calls.clone();
        let counting = listener(move |_: &u32| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        notifier.subscribe(&failing);
        notifier.subscribe(&counting);

        assert!(notifier.notify(&1).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_listener_may_unsubscribe_itself_during_dispatch() {
        let notifier = Arc::new(Notifier::<u32>::new());
        let slot: Arc<Mutex<Option<Listener<u32>>>> = Arc::new(Mutex::new(None));

        let n = notifier.clone();
        let s = slot.clone();
        let l = listener(move |_: &u32| {
            if let Some(me) = s.lock().as_ref() {
                n.unsubscribe(me);
            }
            Ok(())
        });
        *slot.lock() = Some(l.clone());
        notifier.subscribe(&l);

        notifier.notify(&1).unwrap();
        assert!(notifier.is_empty());
    }
}
