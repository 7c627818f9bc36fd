//! Explicit type registry standing in for reflection: constructors, property
//! accessor tables, role casts and capabilities, described once per type.
use std::{
    any::{Any, TypeId},
    collections::HashMap,
    fmt,
    marker::PhantomData,
    sync::Arc,
};

use anyhow::{anyhow, bail};

use crate::{
    name::QualifiedName,
    service::ServiceProvider,
    text::ParseFn,
    value::{Instance, TypeKey, Value},
};

/// Constructor or factory-method parameter.
#[derive(Clone, Debug)]
pub struct Param {
    name: String,
    key: TypeKey,
    service: bool,
    optional: bool,
    default: Option<Value>,
}

impl Param {
    pub fn new<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Param {
            name: name.into(),
            key: TypeKey::of::<T>(),
            service: false,
            optional: false,
            default: None,
        }
    }
    /// Parameter filled from the ambient service provider when not bound
    /// explicitly. `R` is usually a `dyn Trait`; the slot then holds `Arc<R>`.
    pub fn service<R: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Param {
            service: true,
            ..Param::new::<R>(name)
        }
    }
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn type_key(&self) -> TypeKey {
        self.key
    }
    pub fn is_service(&self) -> bool {
        self.service
    }
    pub fn is_optional(&self) -> bool {
        self.optional
    }
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }
}

/// Bound argument slots handed to a constructor.
#[derive(Debug, Default)]
pub struct Args {
    slots: Vec<Option<Value>>,
}

impl Args {
    pub fn new(slots: Vec<Option<Value>>) -> Self {
        Args { slots }
    }
    pub fn len(&self) -> usize {
        self.slots.len()
    }
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
    pub fn value(&self, index: usize) -> Option<&Value> {
        self.slots.get(index).and_then(Option::as_ref)
    }
    pub fn is_bound(&self, index: usize) -> bool {
        self.value(index).is_some()
    }
    pub fn get<T: Clone + 'static>(&self, index: usize) -> anyhow::Result<T> {
        let v = self
            .value(index)
            .ok_or_else(|| anyhow!("argument {index} is not bound"))?;
        v.downcast_ref::<T>().cloned().ok_or_else(|| {
            anyhow!(
                "argument {index} is {}, expected {}",
                v.type_key(),
                std::any::type_name::<T>()
            )
        })
    }
    pub fn optional<T: Clone + 'static>(&self, index: usize) -> Option<T> {
        self.value(index).and_then(|v| v.downcast_ref::<T>().cloned())
    }
    pub fn shared<T: ?Sized + 'static>(&self, index: usize) -> anyhow::Result<Arc<T>> {
        let v = self
            .value(index)
            .ok_or_else(|| anyhow!("argument {index} is not bound"))?;
        v.shared::<T>().ok_or_else(|| {
            anyhow!(
                "argument {index} is {}, expected {}",
                v.type_key(),
                std::any::type_name::<T>()
            )
        })
    }
}

pub type ConstructFn = Arc<dyn Fn(&Args) -> anyhow::Result<Instance> + Send + Sync>;

/// Constructor or static factory method.
#[derive(Clone)]
pub struct Constructor {
    params: Vec<Param>,
    construct: ConstructFn,
    activation: bool,
}

impl Constructor {
    pub fn new<T, F>(params: Vec<Param>, f: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&Args) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Self::from_fn(params, move |args| f(args).map(Instance::new))
    }
    pub fn from_fn<F>(params: Vec<Param>, f: F) -> Self
    where
        F: Fn(&Args) -> anyhow::Result<Instance> + Send + Sync + 'static,
    {
        Constructor {
            params,
            construct: Arc::new(f),
            activation: false,
        }
    }
    /// Marks this constructor as the preferred activation constructor.
    pub fn activation(mut self) -> Self {
        self.activation = true;
        self
    }
    pub fn params(&self) -> &[Param] {
        &self.params
    }
    pub fn is_activation(&self) -> bool {
        self.activation
    }
    pub fn invoke(&self, args: &Args) -> anyhow::Result<Instance> {
        (self.construct)(args)
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor")
            .field("params", &self.params.iter().map(Param::name).collect::<Vec<_>>())
            .field("activation", &self.activation)
            .finish()
    }
}

type GetFn = Arc<dyn Fn(&dyn Any) -> Option<Value> + Send + Sync>;
type ReadFn = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;
type SetFn = Arc<dyn Fn(&mut dyn Any, Value) -> anyhow::Result<()> + Send + Sync>;

/// Entry of a type's property accessor table.
#[derive(Clone)]
pub struct Property {
    name: String,
    key: TypeKey,
    element: Option<TypeKey>,
    get: Option<GetFn>,
    read: Option<ReadFn>,
    set: Option<SetFn>,
    add: Option<SetFn>,
}

fn target_mut<T: Any>(target: &mut dyn Any) -> anyhow::Result<&mut T> {
    target
        .downcast_mut::<T>()
        .ok_or_else(|| anyhow!("target is not {}", std::any::type_name::<T>()))
}

fn payload<P: Any + Clone>(v: &Value) -> anyhow::Result<P> {
    v.downcast_ref::<P>()
        .cloned()
        .ok_or_else(|| anyhow!("value is {}, expected {}", v.type_key(), std::any::type_name::<P>()))
}

impl Property {
    pub fn read_write<T, P>(
        name: impl Into<String>,
        get: impl Fn(&T) -> P + Send + Sync + 'static,
        set: impl Fn(&mut T, P) + Send + Sync + 'static,
    ) -> Self
    where
        T: Any,
        P: Any + Send + Sync + Clone,
    {
        Self::try_read_write::<T, P>(name, get, move |t, p| {
            set(t, p);
            Ok(())
        })
    }

    pub fn try_read_write<T, P>(
        name: impl Into<String>,
        get: impl Fn(&T) -> P + Send + Sync + 'static,
        set: impl Fn(&mut T, P) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self
    where
        T: Any,
        P: Any + Send + Sync + Clone,
    {
        let mut prop = Self::read_only::<T, P>(name, get);
        prop.set = Some(Arc::new(move |target: &mut dyn Any, v: Value| {
            let p = payload::<P>(&v)?;
            set(target_mut::<T>(target)?, p)
        }));
        prop
    }

    pub fn read_only<T, P>(name: impl Into<String>, get: impl Fn(&T) -> P + Send + Sync + 'static) -> Self
    where
        T: Any,
        P: Any + Send + Sync,
    {
        let get = Arc::new(get);
        let read = get.clone();
        Property {
            name: name.into(),
            key: TypeKey::of::<P>(),
            element: None,
            get: Some(Arc::new(move |target: &dyn Any| {
                target.downcast_ref::<T>().map(|t| Value::new((*get)(t)))
            })),
            read: Some(Arc::new(move |v: &Value| {
                v.downcast_ref::<T>().map(|t| Value::new((*read)(t)))
            })),
            set: None,
            add: None,
        }
    }

    /// Read-only collection whose contents can be extended in place.
    pub fn collection<T, E>(
        name: impl Into<String>,
        items: impl Fn(&mut T) -> &mut Vec<E> + Send + Sync + 'static,
        view: impl Fn(&T) -> &Vec<E> + Send + Sync + 'static,
    ) -> Self
    where
        T: Any,
        E: Any + Send + Sync + Clone,
    {
        let mut prop = Self::read_only::<T, Vec<E>>(name, move |t| view(t).clone());
        prop.element = Some(TypeKey::of::<E>());
        prop.add = Some(Arc::new(move |target: &mut dyn Any, v: Value| {
            let list = items(target_mut::<T>(target)?);
            if let Some(more) = v.downcast_ref::<Vec<E>>() {
                list.extend(more.iter().cloned());
            } else if let Some(one) = v.downcast_ref::<E>() {
                list.push(one.clone());
            } else {
                bail!("cannot add {} to Vec<{}>", v.type_key(), std::any::type_name::<E>());
            }
            Ok(())
        }));
        prop
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn type_key(&self) -> TypeKey {
        self.key
    }
    /// Item type for aggregatable collections.
    pub fn element_type(&self) -> Option<TypeKey> {
        self.element
    }
    pub fn can_read(&self) -> bool {
        self.get.is_some()
    }
    pub fn can_write(&self) -> bool {
        self.set.is_some()
    }
    pub fn can_add(&self) -> bool {
        self.add.is_some()
    }
    pub fn get_value(&self, target: &dyn Any) -> Option<Value> {
        self.get.as_ref().and_then(|g| g(target))
    }
    /// Reads the property off a frozen value.
    pub fn read(&self, value: &Value) -> Option<Value> {
        self.read.as_ref().and_then(|r| r(value))
    }
    pub fn set_value(&self, target: &mut dyn Any, value: Value) -> anyhow::Result<()> {
        match &self.set {
            Some(set) => set(target, value),
            None => bail!("property `{}` is read-only", self.name),
        }
    }
    pub fn add_value(&self, target: &mut dyn Any, value: Value) -> anyhow::Result<()> {
        match &self.add {
            Some(add) => add(target, value),
            None => bail!("property `{}` is not a collection", self.name),
        }
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("type", &self.key)
            .field("read", &self.can_read())
            .field("write", &self.can_write())
            .finish()
    }
}

/// Substitutes a concrete type for an abstract one at activation time.
pub trait ConcreteClassProvider: Send + Sync {
    fn concrete_class(&self, requested: TypeKey, services: Option<&dyn ServiceProvider>) -> Option<TypeKey>;
}

struct FixedConcreteClass(TypeKey);

impl ConcreteClassProvider for FixedConcreteClass {
    fn concrete_class(&self, _requested: TypeKey, _services: Option<&dyn ServiceProvider>) -> Option<TypeKey> {
        Some(self.0)
    }
}

pub type CastFn = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;
pub type AdaptFn = Arc<dyn Fn(&Value, TypeKey) -> Option<Value> + Send + Sync>;
pub type BuildFn =
    Arc<dyn Fn(&dyn Any, Option<&dyn ServiceProvider>) -> anyhow::Result<Option<Instance>> + Send + Sync>;

/// "Builder" capability: the described type can produce instances of `output`.
#[derive(Clone)]
pub struct BuildCapability {
    output: TypeKey,
    build: BuildFn,
}

impl BuildCapability {
    pub fn output(&self) -> TypeKey {
        self.output
    }
    pub fn build(
        &self,
        builder: &dyn Any,
        services: Option<&dyn ServiceProvider>,
    ) -> anyhow::Result<Option<Instance>> {
        (self.build)(builder, services)
    }
}

/// Everything the runtime knows about one type.
pub struct TypeDescriptor {
    key: TypeKey,
    name: QualifiedName,
    is_abstract: bool,
    service_type: bool,
    constructors: Vec<Constructor>,
    properties: Vec<Property>,
    property_index: HashMap<String, usize>,
    casts: HashMap<TypeId, (TypeKey, CastFn)>,
    build: Option<BuildCapability>,
    adapt: Option<AdaptFn>,
    from_text: Option<ParseFn>,
    concrete_class: Option<Arc<dyn ConcreteClassProvider>>,
    adapters: Vec<(String, TypeKey)>,
    module: Option<String>,
}

impl TypeDescriptor {
    pub fn builder<T: Any + Send + Sync>(name: QualifiedName) -> TypeBuilder<T> {
        let mut b = TypeBuilder::blank(name);
        // 具体类型总能以自身身份读取
        b.desc.casts.insert(
            TypeId::of::<T>(),
            (TypeKey::of::<T>(), Arc::new(|v: &Value| v.is::<T>().then(|| v.clone()))),
        );
        b
    }

    /// Abstract role (usually a `dyn Trait`). Never activatable directly.
    pub fn role<R: ?Sized + 'static>(name: QualifiedName) -> TypeBuilder<R> {
        let mut b = TypeBuilder::blank(name);
        b.desc.is_abstract = true;
        b
    }

    pub fn type_key(&self) -> TypeKey {
        self.key
    }
    pub fn name(&self) -> &QualifiedName {
        &self.name
    }
    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }
    pub fn is_service_type(&self) -> bool {
        self.service_type
    }
    pub fn constructors(&self) -> &[Constructor] {
        &self.constructors
    }
    /// Preferred activation constructor, else the first declared one.
    pub fn activation_constructor(&self) -> Option<&Constructor> {
        self.constructors
            .iter()
            .find(|c| c.is_activation())
            .or_else(|| self.constructors.first())
    }
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }
    /// Case-insensitive lookup through the cached accessor table.
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.property_index
            .get(&name.to_ascii_lowercase())
            .map(|&i| &self.properties[i])
    }
    pub fn implemented_roles(&self) -> impl Iterator<Item = TypeKey> + '_ {
        self.casts.values().map(|(k, _)| *k)
    }
    pub fn implements(&self, role: TypeKey) -> bool {
        self.casts.contains_key(&role.id())
    }
    pub fn cast(&self, value: &Value, role: TypeKey) -> Option<Value> {
        self.casts.get(&role.id()).and_then(|(_, cast)| cast(value))
    }
    pub fn build_capability(&self) -> Option<&BuildCapability> {
        self.build.as_ref()
    }
    pub fn adapt(&self, value: &Value, target: TypeKey) -> Option<Value> {
        self.adapt.as_ref().and_then(|a| a(value, target))
    }
    pub fn text_parser(&self) -> Option<ParseFn> {
        self.from_text
    }
    pub fn concrete_class_provider(&self) -> Option<&Arc<dyn ConcreteClassProvider>> {
        self.concrete_class.as_ref()
    }
    /// Adapters declared on the type itself, as `(role, adapter)` pairs.
    pub fn declared_adapters(&self) -> &[(String, TypeKey)] {
        &self.adapters
    }
    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }
    pub(crate) fn set_module(&mut self, module: &str) {
        if self.module.is_none() {
            self.module = Some(module.to_string());
        }
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("type", &self.key)
            .field("abstract", &self.is_abstract)
            .field("constructors", &self.constructors.len())
            .field("properties", &self.properties)
            .finish()
    }
}

pub struct TypeBuilder<T: ?Sized> {
    desc: TypeDescriptor,
    _marker: PhantomData<fn() -> Box<T>>,
}

impl<T: ?Sized + 'static> TypeBuilder<T> {
    fn blank(name: QualifiedName) -> Self {
        TypeBuilder {
            desc: TypeDescriptor {
                key: TypeKey::of::<T>(),
                name,
                is_abstract: false,
                service_type: false,
                constructors: Vec::new(),
                properties: Vec::new(),
                property_index: HashMap::new(),
                casts: HashMap::new(),
                build: None,
                adapt: None,
                from_text: None,
                concrete_class: None,
                adapters: Vec::new(),
                module: None,
            },
            _marker: PhantomData,
        }
    }
    pub fn abstract_type(mut self) -> Self {
        self.desc.is_abstract = true;
        self
    }
    /// Parameters of this type are injected from services when left unbound.
    pub fn service_type(mut self) -> Self {
        self.desc.service_type = true;
        self
    }
    pub fn concrete_class(mut self, provider: Arc<dyn ConcreteClassProvider>) -> Self {
        self.desc.concrete_class = Some(provider);
        self
    }
    pub fn concrete_type<C: ?Sized + 'static>(self) -> Self {
        self.concrete_class(Arc::new(FixedConcreteClass(TypeKey::of::<C>())))
    }
    /// Explicit adapter declaration, consulted before any convention.
    pub fn adapter(mut self, role: impl Into<String>, adapter: TypeKey) -> Self {
        self.desc.adapters.push((role.into(), adapter));
        self
    }
    pub fn from_text(mut self, parse: ParseFn) -> Self {
        self.desc.from_text = Some(parse);
        self
    }
    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.desc.module = Some(module.into());
        self
    }
    pub fn constructor(mut self, ctor: Constructor) -> Self {
        self.desc.constructors.push(ctor);
        self
    }
    pub fn property(mut self, prop: Property) -> Self {
        let key = prop.name().to_ascii_lowercase();
        match self.desc.property_index.get(&key) {
            Some(&i) => self.desc.properties[i] = prop,
            None => {
                self.desc.property_index.insert(key, self.desc.properties.len());
                self.desc.properties.push(prop);
            }
        }
        self
    }
    pub fn adaptable(mut self, adapt: impl Fn(&Value, TypeKey) -> Option<Value> + Send + Sync + 'static) -> Self {
        self.desc.adapt = Some(Arc::new(adapt));
        self
    }
    pub fn build(self) -> TypeDescriptor {
        self.desc
    }
}

impl<T: Any + Send + Sync> TypeBuilder<T> {
    pub fn default_constructor(self) -> Self
    where
        T: Default,
    {
        self.constructor(Constructor::new(Vec::new(), |_| Ok(T::default())))
    }

    /// Declares that `T` can be viewed as role `R`.
    pub fn implements<R: ?Sized + Send + Sync + 'static>(mut self, upcast: fn(Arc<T>) -> Arc<R>) -> Self {
        let cast: CastFn = Arc::new(move |v: &Value| v.shared::<T>().map(|t| Value::from_shared(upcast(t))));
        self.desc.casts.insert(TypeId::of::<R>(), (TypeKey::of::<R>(), cast));
        self
    }

    /// Declares `T` as a builder of `O`.
    pub fn builds<O: Any + Send + Sync>(
        mut self,
        build: impl Fn(&T, Option<&dyn ServiceProvider>) -> anyhow::Result<Option<O>> + Send + Sync + 'static,
    ) -> Self {
        let f: BuildFn = Arc::new(move |builder: &dyn Any, services| {
            let b = builder
                .downcast_ref::<T>()
                .ok_or_else(|| anyhow!("builder is not {}", std::any::type_name::<T>()))?;
            Ok(build(b, services)?.map(Instance::new))
        });
        self.desc.build = Some(BuildCapability {
            output: TypeKey::of::<O>(),
            build: f,
        });
        self
    }
}

/// Types that describe themselves, usually through `#[derive(Describe)]`.
pub trait Describe: Any + Send + Sync {
    fn describe() -> TypeDescriptor;
}

/// Registry of described types, grown as modules are integrated.
#[derive(Default)]
pub struct TypeTable {
    by_key: HashMap<TypeId, Arc<TypeDescriptor>>,
    by_name: HashMap<QualifiedName, TypeKey>,
    order: Vec<TypeKey>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// First registration of a type wins; later duplicates are ignored.
    pub fn insert(&mut self, desc: impl Into<Arc<TypeDescriptor>>) -> Arc<TypeDescriptor> {
        let desc: Arc<TypeDescriptor> = desc.into();
        let key = desc.type_key();
        if let Some(existing) = self.by_key.get(&key.id()) {
            tracing::debug!(type_name = %key, "type already described; keeping first description");
            return existing.clone();
        }
        self.by_name.entry(desc.name().clone()).or_insert(key);
        self.by_key.insert(key.id(), desc.clone());
        self.order.push(key);
        desc
    }

    pub fn get(&self, key: TypeKey) -> Option<Arc<TypeDescriptor>> {
        self.by_key.get(&key.id()).cloned()
    }

    pub fn by_name(&self, name: &QualifiedName) -> Option<Arc<TypeDescriptor>> {
        self.by_name.get(name).and_then(|k| self.get(*k))
    }

    pub fn by_local_name(&self, local_name: &str) -> Vec<Arc<TypeDescriptor>> {
        self.iter()
            .filter(|d| d.name().matches_local_name(local_name))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = Arc<TypeDescriptor>> + '_ {
        self.order.iter().filter_map(|k| self.get(*k))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Whether a value of type `from` can be viewed as `to`.
    pub fn is_assignable(&self, to: TypeKey, from: TypeKey) -> bool {
        to == from || self.get(from).is_some_and(|d| d.implements(to))
    }

    pub fn is_service_type(&self, key: TypeKey) -> bool {
        self.get(key).is_some_and(|d| d.is_service_type())
    }
}
