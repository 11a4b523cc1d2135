//! Resolution of protocol and factory names registered ahead of time.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use parking_lot::RwLock;
use trellis_plugin_api::{PluginError, Properties, ServiceFactory, ServiceObject};

/// Turns names into types and factories.
///
/// Lets services be registered under a protocol name, or with a named
/// factory, before (or without) the code that defines them being linked in
/// by the registering plugin.
pub trait SymbolResolver: Send + Sync {
    fn resolve_protocol(&self, name: &str) -> Option<TypeId>;

    fn resolve_factory(&self, name: &str) -> Option<ServiceFactory>;
}

/// A [`SymbolResolver`] backed by explicit registrations.
#[derive(Default)]
pub struct TypeResolver {
    protocols: RwLock<HashMap<String, TypeId>>,
    factories: RwLock<HashMap<String, ServiceFactory>>,
}

impl TypeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `name` resolve to the type `T`.
    pub fn register_protocol<T: Any>(&self, name: impl Into<String>) {
        self.protocols.write().insert(name.into(), TypeId::of::<T>());
    }

    pub fn register_factory<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Properties) -> Result<ServiceObject, PluginError> + Send + Sync + 'static,
    {
        self.factories
            .write()
            .insert(name.into(), std::sync::Arc::new(factory));
    }
}

impl SymbolResolver for TypeResolver {
    fn resolve_protocol(&self, name: &str) -> Option<TypeId> {
        self.protocols.read().get(name).copied()
    }

    fn resolve_factory(&self, name: &str) -> Option<ServiceFactory> {
        self.factories.read().get(name).cloned()
    }
}
