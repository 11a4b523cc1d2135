//! The in-process service registry.

use std::any::TypeId;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use trellis_plugin_api::{
    Notifier, Properties, Protocol, ServiceError, ServiceEvent, ServiceId, ServiceObject,
    ServiceQuery, ServiceRegistry, ServiceValue, service_type_id,
};

use super::query::{Query, compare_values};
use super::resolver::SymbolResolver;

struct ServiceRecord {
    protocol: String,
    value: ServiceValue,
    properties: Properties,
}

#[derive(Default)]
struct State {
    services: BTreeMap<ServiceId, ServiceRecord>,
    last_id: ServiceId,
    resolved_protocols: HashMap<String, TypeId>,
}

/// Service registry holding every registration in memory.
///
/// Factories run on first lookup, outside the registry lock, and the object
/// they build replaces the factory for later lookups.
#[derive(Default)]
pub struct LocalServiceRegistry {
    state: Mutex<State>,
    resolver: Option<Arc<dyn SymbolResolver>>,
    registered: Notifier<ServiceEvent>,
    unregistered: Notifier<ServiceEvent>,
}

impl LocalServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve protocol names and named factories through `resolver`.
    pub fn with_resolver(resolver: Arc<dyn SymbolResolver>) -> Self {
        Self {
            resolver: Some(resolver),
            ..Self::default()
        }
    }

    pub fn registered(&self) -> &Notifier<ServiceEvent> {
        &self.registered
    }

    pub fn unregistered(&self) -> &Notifier<ServiceEvent> {
        &self.unregistered
    }

    /// Ids of every registered service, in registration order.
    pub fn service_ids(&self) -> Vec<ServiceId> {
        self.state.lock().services.keys().copied().collect()
    }

    /// Type a protocol's services must have, if known.
    ///
    /// Named protocols are resolved on their first lookup only; successful
    /// resolutions are cached.
    fn expected_type(&self, protocol: &Protocol) -> Option<TypeId> {
        if let Some(type_id) = protocol.type_id() {
            return Some(type_id);
        }
        let name = protocol.name();
        if let Some(type_id) = self.state.lock().resolved_protocols.get(name) {
            return Some(*type_id);
        }
        let type_id = self.resolver.as_ref()?.resolve_protocol(name)?;
        self.state
            .lock()
            .resolved_protocols
            .insert(name.to_string(), type_id);
        Some(type_id)
    }

    fn realize(
        &self,
        service_id: ServiceId,
        value: ServiceValue,
        properties: &Properties,
    ) -> Result<ServiceObject, ServiceError> {
        let factory = match value {
            ServiceValue::Object(object) => return Ok(object),
            ServiceValue::Factory(factory) => factory,
            ServiceValue::NamedFactory(name) => self
                .resolver
                .as_ref()
                .and_then(|resolver| resolver.resolve_factory(&name))
                .ok_or(ServiceError::UnresolvedFactory(name))?,
        };

        let object = factory(properties).map_err(|source| ServiceError::Factory {
            service_id,
            source: Box::new(source),
        })?;

        let mut state = self.state.lock();
        if let Some(record) = state.services.get_mut(&service_id) {
            if let ServiceValue::Object(existing) = &record.value {
                return Ok(existing.clone());
            }
            record.value = ServiceValue::Object(object.clone());
        }
        tracing::debug!(service_id, "Service factory realized");
        Ok(object)
    }

    fn record(&self, service_id: ServiceId) -> Result<(ServiceValue, Properties), ServiceError> {
        self.state
            .lock()
            .services
            .get(&service_id)
            .map(|record| (record.value.clone(), record.properties.clone()))
            .ok_or(ServiceError::UnknownService(service_id))
    }
}

/// The value a query sees for `name`: properties first, then attributes.
fn lookup(object: &ServiceObject, properties: &Properties, name: &str) -> Option<Value> {
    properties
        .get(name)
        .cloned()
        .or_else(|| object.attribute(name))
}

/// Services with the key sort before those without it.
fn by_key(a: &Option<Value>, b: &Option<Value>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => {
            let ordering = compare_values(a, b).unwrap_or(Ordering::Equal);
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl ServiceRegistry for LocalServiceRegistry {
    fn register_service(
        &self,
        protocol: Protocol,
        value: ServiceValue,
        properties: Properties,
    ) -> Result<ServiceId, ServiceError> {
        let service_id = {
            let mut state = self.state.lock();
            state.last_id += 1;
            let service_id = state.last_id;
            state.services.insert(
                service_id,
                ServiceRecord {
                    protocol: protocol.name().to_string(),
                    value,
                    properties,
                },
            );
            service_id
        };

        tracing::debug!(service_id, protocol = %protocol, "Service registered");
        self.registered
            .notify(&ServiceEvent {
                service_id,
                protocol: protocol.name().to_string(),
            })
            .map_err(ServiceError::listener)?;
        Ok(service_id)
    }

    fn unregister_service(&self, service_id: ServiceId) -> Result<(), ServiceError> {
        let record = self
            .state
            .lock()
            .services
            .remove(&service_id)
            .ok_or(ServiceError::UnknownService(service_id))?;

        tracing::debug!(service_id, protocol = %record.protocol, "Service unregistered");
        self.unregistered
            .notify(&ServiceEvent {
                service_id,
                protocol: record.protocol,
            })
            .map_err(ServiceError::listener)
    }

    fn get_services(
        &self,
        protocol: &Protocol,
        query: &ServiceQuery,
    ) -> Result<Vec<ServiceObject>, ServiceError> {
        let filter = if query.filter.trim().is_empty() {
            None
        } else {
            match Query::parse(&query.filter) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    tracing::warn!(query = %query.filter, error = %e, "Service query does not parse, nothing matches");
                    return Ok(Vec::new());
                }
            }
        };
        let expected = self.expected_type(protocol);

        let candidates: Vec<(ServiceId, ServiceValue, Properties)> = self
            .state
            .lock()
            .services
            .iter()
            .filter(|(_, record)| record.protocol == protocol.name())
            .map(|(id, record)| (*id, record.value.clone(), record.properties.clone()))
            .collect();

        let sort_key = query.minimize.as_ref().or(query.maximize.as_ref());
        let mut matches: Vec<(ServiceObject, Option<Value>)> = Vec::new();
        for (service_id, value, properties) in candidates {
            let object = self.realize(service_id, value, &properties)?;

            if let Some(expected) = expected
                && service_type_id(&object) != expected
            {
                tracing::warn!(
                    service_id,
                    protocol = %protocol,
                    found = (*object).concrete_type_name(),
                    "Service does not implement its protocol, skipping"
                );
                continue;
            }

            if let Some(filter) = &filter {
                match filter.matches(|name| lookup(&object, &properties, name)) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(e) => {
                        tracing::debug!(service_id, query = %filter.source(), error = %e, "Query failed for service, excluded");
                        continue;
                    }
                }
            }

            let key = sort_key.and_then(|key| lookup(&object, &properties, key));
            matches.push((object, key));
        }

        if query.minimize.is_some() {
            matches.sort_by(|(_, a), (_, b)| by_key(a, b, false));
        } else if query.maximize.is_some() {
            matches.sort_by(|(_, a), (_, b)| by_key(a, b, true));
        }

        Ok(matches.into_iter().map(|(object, _)| object).collect())
    }

    fn get_service_from_id(&self, service_id: ServiceId) -> Result<ServiceObject, ServiceError> {
        let (value, properties) = self.record(service_id)?;
        self.realize(service_id, value, &properties)
    }

    fn get_service_properties(&self, service_id: ServiceId) -> Result<Properties, ServiceError> {
        self.record(service_id).map(|(_, properties)| properties)
    }

    fn set_service_properties(
        &self,
        service_id: ServiceId,
        properties: Properties,
    ) -> Result<(), ServiceError> {
        let mut state = self.state.lock();
        let record = state
            .services
            .get_mut(&service_id)
            .ok_or(ServiceError::UnknownService(service_id))?;
        record.properties = properties;
        Ok(())
    }
}

impl fmt::Debug for LocalServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalServiceRegistry")
            .field("services", &self.state.lock().services.len())
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use trellis_plugin_api::{PluginError, Service, listener};

    struct Quote {
        price: i64,
    }

    impl Service for Quote {
        fn attribute(&self, name: &str) -> Option<Value> {
            (name == "price").then(|| json!(self.price))
        }
    }

    fn props(value: Value) -> Properties {
        match value {
            Value::Object(map) => map,
            _ => Properties::new(),
        }
    }

    #[test]
    fn test_ids_start_at_one_and_are_not_reused() {
        let registry = LocalServiceRegistry::new();
        let p = Protocol::named("acme.Quote");
        let a = registry
            .register_service(p.clone(), ServiceValue::object(Quote { price: 1 }), Properties::new())
            .unwrap();
        registry.unregister_service(a).unwrap();
        let b = registry
            .register_service(p, ServiceValue::object(Quote { price: 2 }), Properties::new())
            .unwrap();
        assert_eq!(a, 1);
        assert_eq!(b, 2);
    }

    #[test]
    fn test_unknown_ids() {
        let registry = LocalServiceRegistry::new();
        assert!(matches!(registry.unregister_service(9), Err(ServiceError::UnknownService(9))));
        assert!(matches!(registry.get_service_properties(9), Err(ServiceError::UnknownService(9))));
        assert!(matches!(registry.get_service_from_id(9), Err(ServiceError::UnknownService(9))));
        assert!(registry.set_service_properties(9, Properties::new()).is_err());
    }

    #[test]
    fn test_attribute_and_property_namespace() {
        let registry = LocalServiceRegistry::new();
        let p = Protocol::of::<Quote>();
        registry
            .register_service(p.clone(), ServiceValue::object(Quote { price: 50 }), Properties::new())
            .unwrap();
        // The property shadows the attribute.
        registry
            .register_service(
                p.clone(),
                ServiceValue::object(Quote { price: 500 }),
                props(json!({"price": 5})),
            )
            .unwrap();

        let cheap = registry
            .get_services(&p, &ServiceQuery::filter("price < 10"))
            .unwrap();
        assert_eq!(cheap.len(), 1);
        let quote = trellis_plugin_api::downcast_service::<Quote>(&cheap[0]).unwrap();
        assert_eq!(quote.price, 500);
    }

    #[test]
    fn test_factory_runs_once() {
        let registry = LocalServiceRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let id = registry
            .register_service(
                Protocol::named("acme.Quote"),
                ServiceValue::factory(move |properties: &Properties| {
                    counter.fetch_add(1, AtomicOrdering::SeqCst);
                    let price = properties.get("price").and_then(Value::as_i64).unwrap_or(0);
                    Ok(Arc::new(Quote { price }) as ServiceObject)
                }),
                props(json!({"price": 7})),
            )
            .unwrap();

        let first = registry.get_service_from_id(id).unwrap();
        let second = registry.get_service_from_id(id).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn test_factory_error_propagates() {
        let registry = LocalServiceRegistry::new();
        let id = registry
            .register_service(
                Protocol::named("acme.Quote"),
                ServiceValue::factory(|_: &Properties| Err(PluginError::custom("no quotes today"))),
                Properties::new(),
            )
            .unwrap();
        assert!(matches!(
            registry.get_service_from_id(id),
            Err(ServiceError::Factory { service_id, .. }) if service_id == id
        ));
    }

    #[test]
    fn test_named_factory_needs_resolver() {
        let registry = LocalServiceRegistry::new();
        let id = registry
            .register_service(
                Protocol::named("acme.Quote"),
                ServiceValue::named_factory("acme.make_quote"),
                Properties::new(),
            )
            .unwrap();
        assert!(matches!(
            registry.get_service_from_id(id),
            Err(ServiceError::UnresolvedFactory(name)) if name == "acme.make_quote"
        ));
    }

    #[test]
    fn test_registration_events() {
        let registry = LocalServiceRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let on_registered = listener(move |event: &ServiceEvent| {
            sink.lock().push(("registered", event.service_id));
            Ok(())
        });
        let sink = seen.clone();
        let on_unregistered = listener(move |event: &ServiceEvent| {
            sink.lock().push(("unregistered", event.service_id));
            Ok(())
        });
        registry.registered().subscribe(&on_registered);
        registry.unregistered().subscribe(&on_unregistered);

        let id = registry
            .register_service(
                Protocol::named("acme.Quote"),
                ServiceValue::object(Quote { price: 1 }),
                Properties::new(),
            )
            .unwrap();
        registry.unregister_service(id).unwrap();

        assert_eq!(*seen.lock(), vec![("registered", id), ("unregistered", id)]);
    }

    #[test]
    fn test_bad_query_matches_nothing() {
        let registry = LocalServiceRegistry::new();
        let p = Protocol::named("acme.Quote");
        registry
            .register_service(p.clone(), ServiceValue::object(Quote { price: 1 }), Properties::new())
            .unwrap();
        assert!(registry
            .get_services(&p, &ServiceQuery::filter("price <"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_deeply_nested_query_matches_nothing() {
        let registry = LocalServiceRegistry::new();
        let p = Protocol::named("acme.Quote");
        registry
            .register_service(p.clone(), ServiceValue::object(Quote { price: 1 }), Properties::new())
            .unwrap();
        let deep = format!("{}price", "not ".repeat(10_000));
        assert_eq!(
            registry
                .get_services(&p, &ServiceQuery::filter(deep))
                .unwrap()
                .len(),
            0
        );
    }
}
