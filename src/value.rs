//! 类型擦除的值模型：`TypeKey` 标识类型（含 `dyn Trait` 角色），`Value` 为共享只读值，
//! `Instance` 为激活过程中可变的对象，完成初始化后冻结为 `Value`。
use std::{
    any::{Any, TypeId},
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

/// Identity of a Rust type known to the runtime. Works for sized types and
/// for unsized roles such as `dyn Formatter`.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        TypeKey {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }
    pub fn id(&self) -> TypeId {
        self.id
    }
    /// Full Rust path of the type, as reported by `type_name`.
    pub fn name(&self) -> &'static str {
        self.name
    }
    /// Last path segment without generics, e.g. `Widget` for `app::Widget`.
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        base.rsplit("::").next().unwrap_or(base)
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for TypeKey {}
impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.name)
    }
}
impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Shared, immutable, type-erased value.
///
/// The payload is always stored as `Arc<X>` inside the `Any`, where `X` is the
/// type named by [`Value::type_key`]. That lets the same accessor work for
/// concrete values (`X = Widget`) and role views (`X = dyn Formatter`).
#[derive(Clone)]
pub struct Value {
    inner: Arc<dyn Any + Send + Sync>,
    key: TypeKey,
}

impl Value {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_shared(Arc::new(value))
    }
    pub fn from_shared<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Value {
            inner: Arc::new(value),
            key: TypeKey::of::<T>(),
        }
    }
    pub fn text(s: impl Into<String>) -> Self {
        Self::new(s.into())
    }
    pub fn type_key(&self) -> TypeKey {
        self.key
    }
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.inner.is::<Arc<T>>()
    }
    pub fn downcast_ref<T: ?Sized + 'static>(&self) -> Option<&T> {
        self.inner.downcast_ref::<Arc<T>>().map(|a| &**a)
    }
    /// Shared handle to the payload when it is stored as `T`.
    pub fn shared<T: ?Sized + 'static>(&self) -> Option<Arc<T>> {
        self.inner.downcast_ref::<Arc<T>>().cloned()
    }
    pub fn as_text(&self) -> Option<&str> {
        self.downcast_ref::<String>().map(String::as_str)
    }
    pub fn ptr_eq(&self, other: &Value) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_text() {
            Some(s) => write!(f, "Value({s:?})"),
            None => write!(f, "Value(<{}>)", self.key.name),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::text(s)
    }
}
impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::new(s)
    }
}

macro_rules! value_from {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::new(v)
            }
        })*
    };
}
value_from!(bool, i8, i16, i32, i64, u8, u16, u32, u64, usize, isize, f32, f64, char);

type FreezeFn = fn(Box<dyn Any + Send + Sync>) -> Option<Value>;

fn freeze<T: Any + Send + Sync>(boxed: Box<dyn Any + Send + Sync>) -> Option<Value> {
    boxed
        .downcast::<T>()
        .ok()
        .map(|b| Value::from_shared(Arc::<T>::from(b)))
}

/// Object under construction: owned and mutable so that property setters and
/// activation providers can touch it before it becomes a shared [`Value`].
pub struct Instance {
    inner: Box<dyn Any + Send + Sync>,
    key: TypeKey,
    freeze: FreezeFn,
}

impl Instance {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Instance {
            inner: Box::new(value),
            key: TypeKey::of::<T>(),
            freeze: freeze::<T>,
        }
    }
    pub fn type_key(&self) -> TypeKey {
        self.key
    }
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.inner.downcast_mut::<T>()
    }
    pub fn as_any(&self) -> &dyn Any {
        &*self.inner
    }
    pub fn as_any_mut(&mut self) -> &mut dyn Any {
        &mut *self.inner
    }
    /// Freezes the instance. `None` only if the payload was swapped for a
    /// different type, which the public API does not allow.
    pub fn into_value(self) -> Option<Value> {
        (self.freeze)(self.inner)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instance(<{}>)", self.key.name)
    }
}
