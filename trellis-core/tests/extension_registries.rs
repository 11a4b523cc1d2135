//! Provider registries, offsets and views working together.

use std::sync::Arc;

use parking_lot::Mutex;
use trellis_core::{MutableExtensionRegistry, ProviderExtensionRegistry};
use trellis_plugin_api::{
    Contributions, Extension, ExtensionChangeEvent, ExtensionListener, ExtensionPoint,
    ExtensionPointView, ExtensionProvider, ExtensionRegistry, Index, Listener, Notifier,
    PluginError, ViewEvent, listener,
};

const NUMBERS: &str = "acme.numbers";

struct Contributor {
    points: Vec<ExtensionPoint>,
    contributions: Contributions,
}

impl Contributor {
    fn new(values: &[i64]) -> Arc<Self> {
        Arc::new(Self {
            points: Vec::new(),
            contributions: Contributions::new().with(NUMBERS, ints(values)),
        })
    }

    fn declaring(point: ExtensionPoint, values: &[i64]) -> Arc<Self> {
        Arc::new(Self {
            points: vec![point],
            contributions: Contributions::new().with(NUMBERS, ints(values)),
        })
    }
}

impl ExtensionProvider for Contributor {
    fn extension_points(&self) -> Vec<ExtensionPoint> {
        self.points.clone()
    }

    fn extensions(&self, extension_point_id: &str) -> Result<Vec<Extension>, PluginError> {
        self.contributions.extensions(extension_point_id)
    }

    fn extension_changes(&self) -> &Notifier<ExtensionChangeEvent> {
        self.contributions.changes()
    }
}

fn ints(values: &[i64]) -> Vec<Extension> {
    values.iter().copied().map(Extension::new).collect()
}

fn numbers(extensions: &[Extension]) -> Vec<i64> {
    extensions
        .iter()
        .filter_map(|e| e.downcast_ref::<i64>().copied())
        .collect()
}

fn record(
    registry: &dyn ExtensionRegistry,
) -> (Arc<Mutex<Vec<ExtensionChangeEvent>>>, ExtensionListener) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let listener = listener(move |event: &ExtensionChangeEvent| {
        sink.lock().push(event.clone());
        Ok(())
    });
    registry.add_extension_point_listener(&listener, Some(NUMBERS));
    (events, listener)
}

/// Two providers contributing `[1, 2]` and `[3]` to a declared point.
fn two_providers() -> (ProviderExtensionRegistry, Arc<Contributor>, Arc<Contributor>) {
    let registry = ProviderExtensionRegistry::new();
    let first = Contributor::declaring(ExtensionPoint::of::<i64>(NUMBERS), &[1, 2]);
    let second = Contributor::new(&[3]);
    registry.add_provider(first.clone()).unwrap();
    registry.add_provider(second.clone()).unwrap();
    (registry, first, second)
}

#[test]
fn contributions_concatenate_in_roster_order() {
    let (registry, _first, _second) = two_providers();
    assert_eq!(numbers(&registry.get_extensions(NUMBERS).unwrap()), vec![1, 2, 3]);
}

#[test]
fn provider_changes_are_translated_to_registry_positions() {
    let (registry, first, second) = two_providers();
    registry.get_extensions(NUMBERS).unwrap();
    let (events, _listener) = record(&registry);

    second.contributions.push(NUMBERS, Extension::new(4i64)).unwrap();
    first.contributions.insert(NUMBERS, 0, Extension::new(0i64)).unwrap();
    second.contributions.remove(NUMBERS, 0).unwrap();

    let events = events.lock();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].index, Some(Index::At(3)));
    assert_eq!(numbers(&events[0].added), vec![4]);
    assert_eq!(events[1].index, Some(Index::At(0)));
    // The first provider now holds three items, so the second starts at 3.
    assert_eq!(events[2].index, Some(Index::At(3)));
    assert_eq!(numbers(&events[2].removed), vec![3]);

    assert_eq!(numbers(&registry.get_extensions(NUMBERS).unwrap()), vec![0, 1, 2, 4]);
}

#[test]
fn adding_and_removing_providers_announces_their_slice() {
    let (registry, first, second) = two_providers();
    registry.get_extensions(NUMBERS).unwrap();
    let (events, _listener) = record(&registry);

    let third = Contributor::new(&[7, 8]);
    registry.add_provider(third.clone()).unwrap();
    let first_provider: Arc<dyn ExtensionProvider> = first;
    registry.remove_provider(&first_provider).unwrap();

    let events = events.lock();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].index, Some(Index::At(3)));
    assert_eq!(numbers(&events[0].added), vec![7, 8]);
    assert_eq!(events[1].index, Some(Index::At(0)));
    assert_eq!(numbers(&events[1].removed), vec![1, 2]);

    assert_eq!(numbers(&registry.get_extensions(NUMBERS).unwrap()), vec![3, 7, 8]);
    assert_eq!(registry.providers().len(), 2);
    drop(second);
}

#[test]
fn removed_provider_changes_are_ignored() {
    let (registry, _first, second) = two_providers();
    registry.get_extensions(NUMBERS).unwrap();
    let (events, _listener) = record(&registry);

    let provider: Arc<dyn ExtensionProvider> = second.clone();
    registry.remove_provider(&provider).unwrap();
    events.lock().clear();

    second.contributions.push(NUMBERS, Extension::new(9i64)).unwrap();
    assert!(events.lock().is_empty());
    assert_eq!(numbers(&registry.get_extensions(NUMBERS).unwrap()), vec![1, 2]);
}

#[test]
fn view_tracks_provider_changes() {
    let (registry, first, _second) = two_providers();
    let view = ExtensionPointView::connect(Arc::new(registry.clone()), NUMBERS, "acme.test").unwrap();
    assert_eq!(view.len(), 3);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let observer: Listener<ViewEvent> = listener(move |event: &ViewEvent| {
        sink.lock().push(event.clone());
        Ok(())
    });
    view.subscribe(&observer);

    first.contributions.push(NUMBERS, Extension::new(5i64)).unwrap();
    let values: Vec<i64> = view.values::<i64>().iter().map(|v| **v).collect();
    assert_eq!(values, vec![1, 2, 5, 3]);

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert!(matches!(&seen[0], ViewEvent::Items { index: Index::At(2), .. }));
}

#[test]
fn view_refuses_mutation() {
    let (registry, _first, _second) = two_providers();
    let view = ExtensionPointView::connect(Arc::new(registry.clone()), NUMBERS, "acme.test").unwrap();

    view.push(Extension::new(99i64));
    view.insert(0, Extension::new(99i64));
    view.remove(0);
    view.clear();
    view.set(Vec::new());

    assert_eq!(numbers(&view.to_vec()), vec![1, 2, 3]);
    assert_eq!(numbers(&registry.get_extensions(NUMBERS).unwrap()), vec![1, 2, 3]);
}

#[test]
fn view_rejects_items_of_the_wrong_type() {
    let (registry, first, _second) = two_providers();
    let _view = ExtensionPointView::connect(Arc::new(registry.clone()), NUMBERS, "acme.test").unwrap();

    let result = first.contributions.push(NUMBERS, Extension::new("not a number"));
    assert!(result.is_err());
}

#[test]
fn view_rebuilds_on_replacement() {
    let registry = Arc::new(MutableExtensionRegistry::new());
    registry.add_extension_point(ExtensionPoint::new(NUMBERS));
    registry.set_extensions(NUMBERS, ints(&[1, 2])).unwrap();

    let view = ExtensionPointView::connect(registry.clone(), NUMBERS, "acme.test").unwrap();
    let replaced = Arc::new(Mutex::new(false));
    let flag = replaced.clone();
    let observer: Listener<ViewEvent> = listener(move |event: &ViewEvent| {
        if let ViewEvent::Replaced { old, new } = event {
            assert_eq!(numbers(old), vec![1, 2]);
            assert_eq!(numbers(new), vec![9]);
            *flag.lock() = true;
        }
        Ok(())
    });
    view.subscribe(&observer);

    registry.set_extensions(NUMBERS, ints(&[9])).unwrap();
    assert!(*replaced.lock());
    assert_eq!(numbers(&view.to_vec()), vec![9]);
}

#[test]
fn dropped_view_stops_listening() {
    let registry = Arc::new(MutableExtensionRegistry::new());
    registry.add_extension_point(ExtensionPoint::of::<i64>(NUMBERS));

    let view = ExtensionPointView::connect(registry.clone(), NUMBERS, "acme.test").unwrap();
    assert!(registry.add_extension(NUMBERS, Extension::new("text")).is_err());

    drop(view);
    registry.add_extension(NUMBERS, Extension::new("more text")).unwrap();
    assert_eq!(registry.get_extensions(NUMBERS).unwrap().len(), 2);
}

#[test]
fn unread_extension_points_are_never_fetched() {
    let registry = ProviderExtensionRegistry::new();
    let broken = Arc::new(Contributor {
        points: vec![ExtensionPoint::new(NUMBERS), ExtensionPoint::new("acme.broken")],
        contributions: Contributions::new()
            .with(NUMBERS, ints(&[1]))
            .lazy("acme.broken", || Err(PluginError::custom("unavailable"))),
    });
    registry.add_provider(broken).unwrap();
    registry.add_provider(Contributor::new(&[2])).unwrap();
    assert_eq!(numbers(&registry.get_extensions(NUMBERS).unwrap()), vec![1, 2]);

    // Reading the failing point surfaces the error without poisoning the rest.
    assert!(registry.get_extensions("acme.broken").is_err());
    registry.add_provider(Contributor::new(&[3])).unwrap();
    assert_eq!(numbers(&registry.get_extensions(NUMBERS).unwrap()), vec![1, 2, 3]);
}

#[test]
fn readding_a_provider_appends_its_slice() {
    let (registry, first, _second) = two_providers();
    registry.get_extensions(NUMBERS).unwrap();
    let (events, _listener) = record(&registry);

    let provider: Arc<dyn ExtensionProvider> = first.clone();
    registry.remove_provider(&provider).unwrap();
    assert_eq!(numbers(&registry.get_extensions(NUMBERS).unwrap()), vec![3]);
    registry.add_provider(first).unwrap();

    assert_eq!(numbers(&registry.get_extensions(NUMBERS).unwrap()), vec![3, 1, 2]);
    let events = events.lock();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].index, Some(Index::At(0)));
    assert_eq!(numbers(&events[0].removed), vec![1, 2]);
    assert_eq!(events[1].index, Some(Index::At(1)));
    assert_eq!(numbers(&events[1].added), vec![1, 2]);
}

#[test]
fn registry_always_equals_the_concatenation_of_live_providers() {
    let registry = ProviderExtensionRegistry::new();
    registry.add_extension_point(ExtensionPoint::new(NUMBERS));
    let view = ExtensionPointView::connect(Arc::new(registry.clone()), NUMBERS, "acme.test").unwrap();
    let providers: Vec<Arc<Contributor>> = (0..4).map(|i| Contributor::new(&[i * 10])).collect();

    let check = |registry: &ProviderExtensionRegistry| {
        let expected: Vec<i64> = registry
            .providers()
            .iter()
            .flat_map(|p| numbers(&p.extensions(NUMBERS).unwrap()))
            .collect();
        assert_eq!(numbers(&registry.get_extensions(NUMBERS).unwrap()), expected);
        assert_eq!(numbers(&view.to_vec()), expected);
    };

    for round in 0..3_i64 {
        for (i, provider) in providers.iter().enumerate() {
            registry.add_provider(provider.clone()).unwrap();
            check(&registry);
            provider
                .contributions
                .push(NUMBERS, Extension::new(round * 100 + i as i64))
                .unwrap();
            check(&registry);
        }

        providers[1].contributions.insert(NUMBERS, 0, Extension::new(-1_i64)).unwrap();
        check(&registry);
        providers[2].contributions.remove(NUMBERS, 0).unwrap();
        check(&registry);
        providers[3].contributions.set(NUMBERS, ints(&[7, 8, 9])).unwrap();
        check(&registry);

        for provider in providers.iter().step_by(2) {
            let provider: Arc<dyn ExtensionProvider> = provider.clone();
            registry.remove_provider(&provider).unwrap();
            check(&registry);
        }
        providers[0].contributions.push(NUMBERS, Extension::new(5_i64)).unwrap();
        check(&registry);
        for provider in providers.iter().skip(1).step_by(2) {
            let provider: Arc<dyn ExtensionProvider> = provider.clone();
            registry.remove_provider(&provider).unwrap();
            check(&registry);
        }
    }
}

#[test]
fn view_stays_aligned_after_a_wrong_type_contribution() {
    let registry = ProviderExtensionRegistry::new();
    let first = Contributor::declaring(ExtensionPoint::of::<i64>(NUMBERS), &[1, 2]);
    let second = Contributor::new(&[3]);
    registry.add_provider(first.clone()).unwrap();
    registry.add_provider(second.clone()).unwrap();
    let view = ExtensionPointView::connect(Arc::new(registry.clone()), NUMBERS, "acme.test").unwrap();

    assert!(first.contributions.push(NUMBERS, Extension::new("text")).is_err());
    assert_eq!(view.len(), 4);

    // Unrelated providers keep working.
    second.contributions.push(NUMBERS, Extension::new(4_i64)).unwrap();
    second.contributions.remove(NUMBERS, 0).unwrap();
    assert_eq!(view.len(), registry.get_extensions(NUMBERS).unwrap().len());
    let values: Vec<i64> = view.values::<i64>().iter().map(|v| **v).collect();
    assert_eq!(values, vec![1, 2, 4]);

    first.contributions.remove(NUMBERS, 2).unwrap();
    view.refresh().unwrap();
    assert_eq!(numbers(&view.to_vec()), vec![1, 2, 4]);
}
