//! Extension values and extension point declarations.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::error::ExtensionError;

/// A single contribution to an extension point.
///
/// Extensions are opaque, shared values. Two extensions are the *same*
/// extension when they share the same allocation (see [`Extension::ptr_eq`]),
/// which is how removal by identity works.
#[derive(Clone)]
pub struct Extension {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Extension {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            value,
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Shared handle to the value, if it is a `T`.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.value.clone().downcast::<T>().ok()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    pub fn value_type_id(&self) -> TypeId {
        (*self.value).type_id()
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Identity comparison: true only for clones of the same extension.
    pub fn ptr_eq(&self, other: &Extension) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.value), Arc::as_ptr(&other.value))
    }
}

impl fmt::Debug for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(s) = self.downcast_ref::<&'static str>() {
            write!(f, "Extension({s:?})")
        } else if let Some(s) = self.downcast_ref::<String>() {
            write!(f, "Extension({s:?})")
        } else if let Some(n) = self.downcast_ref::<i64>() {
            write!(f, "Extension({n})")
        } else if let Some(n) = self.downcast_ref::<i32>() {
            write!(f, "Extension({n})")
        } else {
            write!(f, "Extension(<{}>)", self.type_name)
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ElementType {
    type_id: TypeId,
    type_name: &'static str,
}

/// A named slot that providers contribute extensions to.
///
/// An extension point may declare the element type its extensions must have;
/// views validate their contents against it.
#[derive(Debug, Clone)]
pub struct ExtensionPoint {
    id: String,
    description: String,
    element: Option<ElementType>,
}

impl ExtensionPoint {
    /// An extension point that accepts any value.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            element: None,
        }
    }

    /// An extension point whose extensions must all be `T`.
    pub fn of<T: Any>(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            element: Some(ElementType {
                type_id: TypeId::of::<T>(),
                type_name: std::any::type_name::<T>(),
            }),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn element_type_name(&self) -> Option<&'static str> {
        self.element.map(|element| element.type_name)
    }

    pub fn accepts(&self, extension: &Extension) -> bool {
        match self.element {
            Some(element) => extension.value_type_id() == element.type_id,
            None => true,
        }
    }

    /// Check every extension against the declared element type.
    pub fn validate(&self, extensions: &[Extension]) -> Result<(), ExtensionError> {
        let Some(element) = self.element else {
            return Ok(());
        };
        match extensions.iter().find(|extension| !self.accepts(extension)) {
            Some(bad) => Err(ExtensionError::TypeMismatch {
                id: self.id.clone(),
                expected: element.type_name,
                found: bad.type_name(),
            }),
            None => Ok(()),
        }
    }
}
