//! 服务注入：按类型存放的服务仓库，供激活时未绑定的服务型参数取用。
use parking_lot::RwLock;
use std::{any::TypeId, collections::HashMap, fmt, sync::Arc};

use crate::value::{TypeKey, Value};

/// `None` means "not available"; it is never an error at this layer.
pub trait ServiceProvider: Send + Sync {
    fn get_service(&self, key: TypeKey) -> Option<Value>;
}

impl dyn ServiceProvider + '_ {
    pub fn get<R: ?Sized + 'static>(&self) -> Option<Arc<R>> {
        self.get_service(TypeKey::of::<R>()).and_then(|v| v.shared::<R>())
    }
}

/// Services keyed by type. `R` is usually a `dyn Trait`.
#[derive(Default)]
pub struct ServiceContainer {
    inner: RwLock<HashMap<TypeId, Value>>,
}

impl ServiceContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<R: ?Sized + Send + Sync + 'static>(&self, service: Arc<R>) {
        self.insert_value(TypeKey::of::<R>(), Value::from_shared(service));
    }

    pub fn insert_value(&self, key: TypeKey, value: Value) {
        let prev = self.inner.write().insert(key.id(), value);
        if prev.is_some() {
            tracing::warn!(service = %key, "service registered multiple times; overriding");
        }
    }

    pub fn with<R: ?Sized + Send + Sync + 'static>(self, service: Arc<R>) -> Self {
        self.insert(service);
        self
    }

    pub fn get<R: ?Sized + 'static>(&self) -> Option<Arc<R>> {
        self.get_service(TypeKey::of::<R>()).and_then(|v| v.shared::<R>())
    }

    pub fn contains(&self, key: TypeKey) -> bool {
        self.inner.read().contains_key(&key.id())
    }

    /// Every registered service, in no particular order.
    pub fn values(&self) -> Vec<Value> {
        self.inner.read().values().cloned().collect()
    }
}

impl ServiceProvider for ServiceContainer {
    fn get_service(&self, key: TypeKey) -> Option<Value> {
        self.inner.read().get(&key.id()).cloned()
    }
}

impl fmt::Debug for ServiceContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceContainer")
            .field("services", &self.inner.read().len())
            .finish()
    }
}

/// Per-call provider first, then the runtime-level container.
pub(crate) struct Layered<'a> {
    pub(crate) first: Option<&'a dyn ServiceProvider>,
    pub(crate) fallback: &'a dyn ServiceProvider,
}

impl ServiceProvider for Layered<'_> {
    fn get_service(&self, key: TypeKey) -> Option<Value> {
        self.first
            .and_then(|p| p.get_service(key))
            .or_else(|| self.fallback.get_service(key))
    }
}
