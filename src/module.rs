//! Modules: the unit of discovery. A module exports type descriptors, declares
//! providers (through a `register` start function or declarative entries),
//! may define adapter roles, and names the modules it references.
use parking_lot::RwLock;
use std::{
    fmt,
    path::{Path, PathBuf},
    sync::{Arc, OnceLock},
};

use crate::{
    adapter::{AdapterFactory, AdapterRoleInfo},
    config::RuntimeConfig,
    error::LoadError,
    provider::{Metadata, ProviderRegistrationContext, ProviderTarget},
    name::QualifiedName,
    types::{Describe, TypeDescriptor},
    value::TypeKey,
};

/// "Start class" registration entry point (fast path).
pub type RegisterFn = fn(&mut ProviderRegistrationContext) -> anyhow::Result<()>;

/// Declarative provider entry, scanned when a module has no start function.
#[derive(Clone)]
pub enum Declaration {
    RootProvider(TypeKey),
    Provider {
        name: QualifiedName,
        root: TypeKey,
        target: ProviderTarget,
        metadata: Metadata,
    },
}

pub struct Module {
    name: String,
    references: Vec<String>,
    types: Vec<Arc<TypeDescriptor>>,
    register: Option<RegisterFn>,
    declarations: Vec<Declaration>,
    roles: Vec<AdapterRoleInfo>,
    adapter_factory: Option<Arc<dyn AdapterFactory>>,
}

impl Module {
    pub fn builder(name: impl Into<String>) -> ModuleBuilder {
        ModuleBuilder {
            module: Module {
                name: name.into(),
                references: Vec::new(),
                types: Vec::new(),
                register: None,
                declarations: Vec::new(),
                roles: Vec::new(),
                adapter_factory: None,
            },
        }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn references(&self) -> &[String] {
        &self.references
    }
    pub fn types(&self) -> &[Arc<TypeDescriptor>] {
        &self.types
    }
    pub fn register_fn(&self) -> Option<RegisterFn> {
        self.register
    }
    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }
    pub fn defined_roles(&self) -> &[AdapterRoleInfo] {
        &self.roles
    }
    pub fn adapter_factory(&self) -> Option<&Arc<dyn AdapterFactory>> {
        self.adapter_factory.as_ref()
    }
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("references", &self.references)
            .field("types", &self.types.len())
            .finish()
    }
}

pub struct ModuleBuilder {
    module: Module,
}

impl ModuleBuilder {
    pub fn reference(mut self, name: impl Into<String>) -> Self {
        self.module.references.push(name.into());
        self
    }
    pub fn describe<T: Describe>(self) -> Self {
        self.type_descriptor(T::describe())
    }
    pub fn type_descriptor(mut self, mut desc: TypeDescriptor) -> Self {
        desc.set_module(&self.module.name);
        self.module.types.push(Arc::new(desc));
        self
    }
    pub fn register(mut self, f: RegisterFn) -> Self {
        self.module.register = Some(f);
        self
    }
    pub fn declare(mut self, d: Declaration) -> Self {
        self.module.declarations.push(d);
        self
    }
    pub fn declare_root<R: ?Sized + 'static>(self) -> Self {
        self.declare(Declaration::RootProvider(TypeKey::of::<R>()))
    }
    pub fn declare_provider(
        self,
        name: QualifiedName,
        root: TypeKey,
        target: ProviderTarget,
        metadata: Metadata,
    ) -> Self {
        self.declare(Declaration::Provider {
            name,
            root,
            target,
            metadata,
        })
    }
    /// Defines a custom adapter role owned by this module.
    pub fn define_role(mut self, role: AdapterRoleInfo) -> Self {
        let role = role.with_module(&self.module.name);
        self.module.roles.push(role);
        self
    }
    pub fn adapter_factory(mut self, f: Arc<dyn AdapterFactory>) -> Self {
        self.module.adapter_factory = Some(f);
        self
    }
    pub fn build(self) -> Module {
        self.module
    }
}

/// Compile-time module registration, collected with `inventory`.
pub struct ModuleRegistration {
    pub create: fn() -> Module,
}

inventory::collect!(ModuleRegistration);

/// Submits a `fn() -> Module` to the inventory-backed loader.
#[macro_export]
macro_rules! register_module {
    ($create:path) => {
        $crate::inventory::submit! {
            $crate::module::ModuleRegistration { create: $create }
        }
    };
}

pub type LoadListener = Box<dyn Fn(Arc<Module>) + Send + Sync>;

/// Host module loader. `load` may be called for referenced or probed names.
pub trait ModuleLoader: Send + Sync {
    /// Modules loaded right now.
    fn loaded_modules(&self) -> Vec<Arc<Module>>;

    fn load(&self, name: &str) -> Result<Arc<Module>, LoadError>;

    /// Names found by a (one-time) filesystem probe.
    fn probe(&self) -> Vec<String> {
        Vec::new()
    }

    /// Registers a callback for modules loaded later. Callbacks may fire on any thread.
    fn subscribe(&self, _listener: LoadListener) {}
}

/// Modules submitted through [`register_module!`]; all of them count as loaded.
#[derive(Default)]
pub struct InventoryLoader {
    modules: OnceLock<Vec<Arc<Module>>>,
}

impl InventoryLoader {
    pub fn new() -> Self {
        Self::default()
    }
    fn modules(&self) -> &[Arc<Module>] {
        self.modules.get_or_init(|| {
            inventory::iter::<ModuleRegistration>
                .into_iter()
                .map(|reg| Arc::new((reg.create)()))
                .collect()
        })
    }
}

impl ModuleLoader for InventoryLoader {
    fn loaded_modules(&self) -> Vec<Arc<Module>> {
        self.modules().to_vec()
    }

    fn load(&self, name: &str) -> Result<Arc<Module>, LoadError> {
        self.modules()
            .iter()
            .find(|m| m.is_named(name))
            .cloned()
            .ok_or_else(|| LoadError::NotFound(name.to_string()))
    }
}

pub type ModuleFactory = Arc<dyn Fn() -> Result<Module, LoadError> + Send + Sync>;

/// Extension of marker files recognized by the filesystem probe.
pub const DEFAULT_MODULE_EXTENSION: &str = "module";

/// Host-controlled loader: modules are "available" until loaded on demand,
/// explicitly by the host (firing load events) or by the observer.
pub struct ModuleCatalog {
    available: RwLock<Vec<(String, ModuleFactory)>>,
    loaded: RwLock<Vec<Arc<Module>>>,
    listeners: RwLock<Vec<LoadListener>>,
    probe_paths: Vec<PathBuf>,
    extension: String,
}

impl Default for ModuleCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleCatalog {
    pub fn new() -> Self {
        ModuleCatalog {
            available: RwLock::new(Vec::new()),
            loaded: RwLock::new(Vec::new()),
            listeners: RwLock::new(Vec::new()),
            probe_paths: Vec::new(),
            extension: DEFAULT_MODULE_EXTENSION.to_string(),
        }
    }

    /// Empty catalog probing the configured paths.
    pub fn from_config(cfg: &RuntimeConfig) -> Self {
        Self::new().with_probe_paths(cfg.probe_paths.iter().cloned(), cfg.module_extension.clone())
    }

    pub fn with_probe_paths(mut self, paths: impl IntoIterator<Item = PathBuf>, extension: impl Into<String>) -> Self {
        self.probe_paths = paths.into_iter().collect();
        self.extension = extension.into();
        self
    }

    /// Makes a module loadable by name without loading it.
    pub fn add_available(&self, name: impl Into<String>, factory: ModuleFactory) {
        self.available.write().push((name.into(), factory));
    }

    pub fn add_available_fn(&self, name: impl Into<String>, create: fn() -> Module) {
        self.add_available(name, Arc::new(move || Ok(create())));
    }

    /// Loads `module` immediately, as if the host loaded it, firing load events.
    pub fn add_loaded(&self, module: Module) -> Arc<Module> {
        let module = Arc::new(module);
        self.loaded.write().push(module.clone());
        self.notify(&module);
        module
    }

    fn notify(&self, module: &Arc<Module>) {
        for listener in self.listeners.read().iter() {
            listener(module.clone());
        }
    }

    fn find_loaded(&self, name: &str) -> Option<Arc<Module>> {
        self.loaded.read().iter().find(|m| m.is_named(name)).cloned()
    }

    fn probe_dir(&self, dir: &Path, out: &mut Vec<String>) {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(path = %dir.display(), error = %e, "probe path unreadable; skipping");
                return;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let matches = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(self.extension.as_str()));
            if !matches {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                out.push(stem.to_string());
            }
        }
    }
}

impl ModuleLoader for ModuleCatalog {
    fn loaded_modules(&self) -> Vec<Arc<Module>> {
        self.loaded.read().clone()
    }

    fn load(&self, name: &str) -> Result<Arc<Module>, LoadError> {
        if let Some(m) = self.find_loaded(name) {
            return Ok(m);
        }
        let factory = self
            .available
            .read()
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, f)| f.clone())
            .ok_or_else(|| LoadError::NotFound(name.to_string()))?;
        let module = factory()?;
        Ok(self.add_loaded(module))
    }

    fn probe(&self) -> Vec<String> {
        let mut names = Vec::new();
        for dir in &self.probe_paths {
            self.probe_dir(dir, &mut names);
        }
        names.sort();
        names
    }

    fn subscribe(&self, listener: LoadListener) {
        self.listeners.write().push(listener);
    }
}
