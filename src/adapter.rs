//! Adapter roles and the factories that map `(adaptee type, role)` to an
//! adapter type.
use std::{fmt, sync::Arc, sync::OnceLock};

use crate::{
    activation::ActivationProvider,
    error::{ActivationError, Result},
    module::Module,
    runtime::Runtime,
    streaming::StreamingSource,
    template::Template,
    types::{TypeDescriptor, TypeTable},
    util,
    value::TypeKey,
};

pub const BUILDER: &str = "Builder";
pub const STREAMING_SOURCE: &str = "StreamingSource";
pub const ACTIVATION_PROVIDER: &str = "ActivationProvider";
pub const TEMPLATE: &str = "Template";
pub const NULL: &str = "Null";

/// A named role plus the naming convention used to find adapters for it.
#[derive(Clone, Debug)]
pub struct AdapterRoleInfo {
    name: String,
    adapter_type: Option<TypeKey>,
    suffix: Option<String>,
    module: Option<String>,
}

impl AdapterRoleInfo {
    /// Untyped role; the convention suffix defaults to the role name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        AdapterRoleInfo {
            suffix: Some(name.clone()),
            name,
            adapter_type: None,
            module: None,
        }
    }

    /// Role whose adapters must be assignable to `R`.
    pub fn of<R: ?Sized + 'static>(name: impl Into<String>) -> Self {
        AdapterRoleInfo {
            adapter_type: Some(TypeKey::of::<R>()),
            ..Self::new(name)
        }
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    /// No naming convention; only factories can supply adapters.
    pub fn without_suffix(mut self) -> Self {
        self.suffix = None;
        self
    }

    pub(crate) fn with_module(mut self, module: &str) -> Self {
        self.module = Some(module.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn adapter_type(&self) -> Option<TypeKey> {
        self.adapter_type
    }
    pub fn suffix(&self) -> Option<&str> {
        self.suffix.as_deref()
    }
    /// Module that defined the role.
    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Structural check applied to convention matches.
    pub fn is_valid_adapter(&self, table: &TypeTable, adaptee: TypeKey, candidate: &TypeDescriptor) -> bool {
        if self.is_named(NULL) {
            return false;
        }
        if self.is_named(BUILDER) {
            return candidate
                .build_capability()
                .is_some_and(|b| table.is_assignable(adaptee, b.output()));
        }
        match self.adapter_type {
            Some(t) => table.is_assignable(t, candidate.type_key()),
            None => true,
        }
    }
}

/// Roles every runtime knows about, owned by `module`.
pub(crate) fn builtin_roles(module: &str) -> Vec<AdapterRoleInfo> {
    vec![
        AdapterRoleInfo::new(BUILDER),
        AdapterRoleInfo::of::<dyn StreamingSource>(STREAMING_SOURCE).with_suffix("Source"),
        AdapterRoleInfo::of::<dyn ActivationProvider>(ACTIVATION_PROVIDER),
        AdapterRoleInfo::of::<dyn Template>(TEMPLATE),
        AdapterRoleInfo::new(NULL).without_suffix(),
    ]
    .into_iter()
    .map(|r| r.with_module(module))
    .collect()
}

pub trait AdapterFactory: Send + Sync {
    /// `None` when this factory has no adapter for the pair.
    fn get_adapter_type(&self, adaptee: TypeKey, role: &str) -> Option<TypeKey>;
}

struct NullAdapterFactory;

impl AdapterFactory for NullAdapterFactory {
    fn get_adapter_type(&self, _adaptee: TypeKey, _role: &str) -> Option<TypeKey> {
        None
    }
}

struct CompositeAdapterFactory {
    items: Vec<Arc<dyn AdapterFactory>>,
}

impl AdapterFactory for CompositeAdapterFactory {
    fn get_adapter_type(&self, adaptee: TypeKey, role: &str) -> Option<TypeKey> {
        util::first_match(&self.items, |f| f.get_adapter_type(adaptee, role))
    }
}

/// The shared factory that never finds anything.
pub fn null() -> Arc<dyn AdapterFactory> {
    static NULL_FACTORY: OnceLock<Arc<dyn AdapterFactory>> = OnceLock::new();
    NULL_FACTORY.get_or_init(|| Arc::new(NullAdapterFactory)).clone()
}

/// First-match-wins over `factories`: none gives [`null`], one gives itself.
pub fn compose(factories: Vec<Arc<dyn AdapterFactory>>) -> Arc<dyn AdapterFactory> {
    util::optimal_composite(factories, null, |items| Arc::new(CompositeAdapterFactory { items }))
}

pub(crate) fn same_factory(a: &Arc<dyn AdapterFactory>, b: &Arc<dyn AdapterFactory>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Explicit `(adaptee, role) -> adapter` table, for modules that map adapters
/// without descriptors of their own.
#[derive(Clone, Debug, Default)]
pub struct AdapterTable {
    entries: Vec<(TypeKey, String, TypeKey)>,
}

impl AdapterTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, adaptee: TypeKey, role: impl Into<String>, adapter: TypeKey) -> Self {
        self.entries.push((adaptee, role.into(), adapter));
        self
    }

    pub fn map<A: ?Sized + 'static, T: ?Sized + 'static>(self, role: impl Into<String>) -> Self {
        self.with(TypeKey::of::<A>(), role, TypeKey::of::<T>())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl AdapterFactory for AdapterTable {
    fn get_adapter_type(&self, adaptee: TypeKey, role: &str) -> Option<TypeKey> {
        self.entries
            .iter()
            .find(|(a, r, _)| *a == adaptee && r.eq_ignore_ascii_case(role))
            .map(|(_, _, t)| *t)
    }
}

/// Per-module factory: adapters declared on the module's own type
/// descriptors, then the module's custom factory.
pub struct ModuleAdapterFactory;

impl ModuleAdapterFactory {
    pub(crate) fn for_module(module: &Module) -> Arc<dyn AdapterFactory> {
        let mut declared = AdapterTable::new();
        for desc in module.types() {
            for (role, adapter) in desc.declared_adapters() {
                declared = declared.with(desc.type_key(), role, *adapter);
            }
        }
        let mut items: Vec<Arc<dyn AdapterFactory>> = Vec::new();
        if !declared.is_empty() {
            items.push(Arc::new(declared));
        }
        if let Some(custom) = module.adapter_factory() {
            items.push(custom.clone());
        }
        compose(items)
    }
}

/// Full resolution over every factory the runtime knows about.
pub struct DefaultAdapterFactory<'rt> {
    rt: &'rt Runtime,
}

impl<'rt> DefaultAdapterFactory<'rt> {
    pub fn new(rt: &'rt Runtime) -> Self {
        DefaultAdapterFactory { rt }
    }

    /// Order: the adaptee's module factory, the role-defining module's
    /// factory, every `dyn AdapterFactory` provider not consulted yet, then
    /// the `{Name}{Suffix}` sibling convention.
    pub fn get_adapter_type(&self, adaptee: TypeKey, role: &str) -> Result<Option<TypeKey>> {
        let data = self.rt.provider_data();
        let info = data
            .adapter_role(role)?
            .ok_or_else(|| ActivationError::AdapterRoleNotDefined(role.to_string()))?;
        if info.is_named(NULL) {
            return Ok(None);
        }
        let desc = data.type_descriptor(adaptee)?;
        let mut consulted: Vec<Arc<dyn AdapterFactory>> = Vec::new();

        let modules = [desc.as_ref().and_then(|d| d.module()), info.module()];
        for module in modules.into_iter().flatten() {
            let Some(factory) = data.module_adapter_factory(module)? else {
                continue;
            };
            if consulted.iter().any(|c| same_factory(c, &factory)) {
                continue;
            }
            if let Some(t) = factory.get_adapter_type(adaptee, info.name()) {
                return Ok(Some(t));
            }
            consulted.push(factory);
        }

        for source in data.providers(TypeKey::of::<dyn AdapterFactory>())? {
            let value = source.get_value(self.rt)?;
            let Some(factory) = self.rt.cast::<dyn AdapterFactory>(&value) else {
                tracing::warn!(provider = %source.name(), "adapter factory provider is not an AdapterFactory");
                continue;
            };
            if consulted.iter().any(|c| same_factory(c, &factory)) {
                continue;
            }
            if let Some(t) = factory.get_adapter_type(adaptee, info.name()) {
                return Ok(Some(t));
            }
            consulted.push(factory);
        }

        match desc {
            Some(desc) => self.by_convention(&info, adaptee, &desc),
            None => Ok(None),
        }
    }

    fn by_convention(&self, info: &AdapterRoleInfo, adaptee: TypeKey, desc: &TypeDescriptor) -> Result<Option<TypeKey>> {
        let Some(suffix) = info.suffix() else {
            return Ok(None);
        };
        let sibling = desc
            .name()
            .with_local_name(format!("{}{}", desc.name().local_name(), suffix));
        let base = adaptee.name().split('<').next().unwrap_or(adaptee.name());
        let path = format!("{base}{suffix}");
        self.rt.provider_data().with_types(|table| {
            table
                .by_name(&sibling)
                .or_else(|| table.iter().find(|d| d.type_key().name() == path))
                .filter(|candidate| info.is_valid_adapter(table, adaptee, candidate))
                .map(|candidate| candidate.type_key())
        })
    }
}

impl fmt::Debug for DefaultAdapterFactory<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultAdapterFactory").finish_non_exhaustive()
    }
}
