use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::{cipher::value_kind, error::StoreError};

/// Shared, insertion-ordered property map.
///
/// Clones alias the same map, so a caller holding a `Container` sees every
/// commit made through a view and the view sees every direct mutation.
#[derive(Debug, Default, Clone)]
pub struct Container {
    inner: Arc<RwLock<Map<String, Value>>>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(map)),
        }
    }

    /// Accepts only JSON objects; anything else is not a usable mapping.
    pub fn from_value(value: Value) -> Result<Self, StoreError> {
        match value {
            Value::Object(map) => Ok(Self::from_map(map)),
            other => Err(StoreError::invalid_key(format!(
                "container must be an object, got {}",
                value_kind(&other)
            ))),
        }
    }

    pub fn get(&self, property: &str) -> Option<Value> {
        self.read().get(property).cloned()
    }

    /// Replace the value for a property, returning the previous one.
    pub fn insert(&self, property: impl Into<String>, value: Value) -> Option<Value> {
        self.write().insert(property.into(), value)
    }

    pub fn remove(&self, property: &str) -> Option<Value> {
        self.write().shift_remove(property)
    }

    pub fn contains(&self, property: &str) -> bool {
        self.read().contains_key(property)
    }

    pub fn keys(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Copy of the current contents (ciphertext, not plaintext).
    pub fn snapshot(&self) -> Map<String, Value> {
        self.read().clone()
    }

    /// Whether two handles alias the same map.
    pub fn ptr_eq(&self, other: &Container) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // A poisoned lock still guards a consistent map: every mutation is a
    // single insert or remove.
    fn read(&self) -> RwLockReadGuard<'_, Map<String, Value>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Map<String, Value>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl From<Map<String, Value>> for Container {
    fn from(map: Map<String, Value>) -> Self {
        Self::from_map(map)
    }
}

/// Redirects raw reads and writes to another backing store while the
/// encryption layer stays unaware of it. Defaults access the container
/// directly.
#[async_trait]
pub trait Delegate: Send + Sync {
    /// Raw stored value for a property, if any.
    async fn get(
        &self,
        container: &Container,
        property: &str,
    ) -> Result<Option<Value>, StoreError> {
        Ok(container.get(property))
    }

    /// Commit an already-encrypted value.
    async fn set(
        &self,
        container: &Container,
        property: &str,
        value: Value,
    ) -> Result<(), StoreError> {
        container.insert(property, value);
        Ok(())
    }
}

/// Plain property access on the container.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectAccess;

impl Delegate for DirectAccess {}
