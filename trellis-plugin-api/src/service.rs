//! Service protocols, values, offers and the service registry interface.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{PluginError, ServiceError};

/// Registry-assigned service id. Ids start at 1 and are never reused.
pub type ServiceId = u64;

/// Arbitrary key/value metadata attached to a registration.
pub type Properties = serde_json::Map<String, Value>;

/// Object-safe access to the concrete type behind a service.
pub trait AsAny: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
    fn concrete_type_name(&self) -> &'static str;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn concrete_type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// A service object.
///
/// `attribute` exposes values that service queries can refer to by name;
/// registration properties take precedence over attributes.
pub trait Service: AsAny {
    fn attribute(&self, name: &str) -> Option<Value> {
        let _ = name;
        None
    }
}

pub type ServiceObject = Arc<dyn Service>;

/// Type id of the concrete value behind a service object.
pub fn service_type_id(service: &ServiceObject) -> TypeId {
    (**service).as_any().type_id()
}

/// Shared handle to the concrete service, if it is a `T`.
pub fn downcast_service<T: Any + Send + Sync>(service: &ServiceObject) -> Option<Arc<T>> {
    Arc::clone(service).into_any().downcast::<T>().ok()
}

/// Builds a service object from its registration properties.
pub type ServiceFactory = Arc<dyn Fn(&Properties) -> Result<ServiceObject, PluginError> + Send + Sync>;

/// What was registered: an object, or a way to build one on first lookup.
#[derive(Clone)]
pub enum ServiceValue {
    Object(ServiceObject),
    Factory(ServiceFactory),
    /// A factory looked up by name through the registry's resolver.
    NamedFactory(String),
}

impl ServiceValue {
    pub fn object<S: Service>(service: S) -> Self {
        Self::Object(Arc::new(service))
    }

    pub fn factory<F>(factory: F) -> Self
    where
        F: Fn(&Properties) -> Result<ServiceObject, PluginError> + Send + Sync + 'static,
    {
        Self::Factory(Arc::new(factory))
    }

    pub fn named_factory(name: impl Into<String>) -> Self {
        Self::NamedFactory(name.into())
    }

    pub fn is_realized(&self) -> bool {
        matches!(self, Self::Object(_))
    }
}

impl fmt::Debug for ServiceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object(service) => {
                write!(f, "Object(<{}>)", (**service).concrete_type_name())
            }
            Self::Factory(_) => write!(f, "Factory(..)"),
            Self::NamedFactory(name) => write!(f, "NamedFactory({name:?})"),
        }
    }
}

/// The interface a service is registered under.
///
/// Registrations are matched by protocol *name*. A typed protocol also
/// checks that the realized service has the expected concrete type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Protocol {
    Typed { name: String, type_id: TypeId },
    Named(String),
}

impl Protocol {
    /// Protocol named after the Rust type `T`.
    pub fn of<T: Any>() -> Self {
        Self::Typed {
            name: std::any::type_name::<T>().to_string(),
            type_id: TypeId::of::<T>(),
        }
    }

    /// Protocol for `T` registered under a custom name.
    pub fn of_named<T: Any>(name: impl Into<String>) -> Self {
        Self::Typed {
            name: name.into(),
            type_id: TypeId::of::<T>(),
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Typed { name, .. } | Self::Named(name) => name,
        }
    }

    pub fn type_id(&self) -> Option<TypeId> {
        match self {
            Self::Typed { type_id, .. } => Some(*type_id),
            Self::Named(_) => None,
        }
    }
}

impl From<&str> for Protocol {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A service a plugin offers: registered when the plugin starts.
#[derive(Debug, Clone)]
pub struct ServiceOffer {
    pub protocol: Protocol,
    pub value: ServiceValue,
    pub properties: Properties,
}

impl ServiceOffer {
    pub fn new(protocol: Protocol, value: ServiceValue) -> Self {
        Self {
            protocol,
            value,
            properties: Properties::new(),
        }
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }
}

/// Fired when a service is registered or unregistered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEvent {
    pub service_id: ServiceId,
    pub protocol: String,
}

/// Filtering and ordering for service lookups.
///
/// An empty filter matches everything. `minimize`/`maximize` name a property
/// (or attribute) to sort by; services without it sort last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceQuery {
    pub filter: String,
    pub minimize: Option<String>,
    pub maximize: Option<String>,
}

impl ServiceQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn filter(expression: impl Into<String>) -> Self {
        Self {
            filter: expression.into(),
            ..Self::default()
        }
    }

    pub fn minimize(mut self, key: impl Into<String>) -> Self {
        self.minimize = Some(key.into());
        self
    }

    pub fn maximize(mut self, key: impl Into<String>) -> Self {
        self.maximize = Some(key.into());
        self
    }
}

/// Registry of services keyed by protocol.
pub trait ServiceRegistry: Send + Sync {
    fn register_service(
        &self,
        protocol: Protocol,
        value: ServiceValue,
        properties: Properties,
    ) -> Result<ServiceId, ServiceError>;

    fn unregister_service(&self, service_id: ServiceId) -> Result<(), ServiceError>;

    /// All services for `protocol` matching `query`, realizing factories as needed.
    fn get_services(
        &self,
        protocol: &Protocol,
        query: &ServiceQuery,
    ) -> Result<Vec<ServiceObject>, ServiceError>;

    fn get_service_from_id(&self, service_id: ServiceId) -> Result<ServiceObject, ServiceError>;

    fn get_service_properties(&self, service_id: ServiceId) -> Result<Properties, ServiceError>;

    fn set_service_properties(
        &self,
        service_id: ServiceId,
        properties: Properties,
    ) -> Result<(), ServiceError>;

    fn get_service(
        &self,
        protocol: &Protocol,
        query: &ServiceQuery,
    ) -> Result<Option<ServiceObject>, ServiceError> {
        Ok(self.get_services(protocol, query)?.into_iter().next())
    }

    fn get_required_service(
        &self,
        protocol: &Protocol,
        query: &ServiceQuery,
    ) -> Result<ServiceObject, ServiceError> {
        self.get_service(protocol, query)?
            .ok_or_else(|| ServiceError::NoSuchService {
                protocol: protocol.name().to_string(),
                query: query.filter.clone(),
            })
    }
}

impl dyn ServiceRegistry + '_ {
    /// Like [`ServiceRegistry::get_service`], downcast to `T`.
    pub fn get_service_as<T: Any + Send + Sync>(
        &self,
        protocol: &Protocol,
        query: &ServiceQuery,
    ) -> Result<Option<Arc<T>>, ServiceError> {
        Ok(self
            .get_service(protocol, query)?
            .as_ref()
            .and_then(downcast_service::<T>))
    }

    /// Like [`ServiceRegistry::get_required_service`], downcast to `T`.
    ///
    /// A service of the wrong concrete type counts as missing.
    pub fn get_required_service_as<T: Any + Send + Sync>(
        &self,
        protocol: &Protocol,
        query: &ServiceQuery,
    ) -> Result<Arc<T>, ServiceError> {
        self.get_service_as::<T>(protocol, query)?
            .ok_or_else(|| ServiceError::NoSuchService {
                protocol: protocol.name().to_string(),
                query: query.filter.clone(),
            })
    }
}
