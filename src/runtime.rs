//! 运行时上下文：模块观察器、提供者缓存、服务仓库与激活工厂的唯一持有者。
//! 所有查找与激活都经由 `Runtime` 进行，不存在进程级全局状态。
use std::{fmt, sync::Arc};

use crate::{
    activation::{
        self, ActivationArgs, ActivationContext, ActivationFactory, ActivationProvider, BuildActivationFactory,
        DefaultActivationFactory, ExceptionHandler, IntoActivationArgs, LoggingExceptionHandler,
    },
    adapter::{self, AdapterRoleInfo, DefaultAdapterFactory, ACTIVATION_PROVIDER, STREAMING_SOURCE, TEMPLATE},
    builtin::{self, CORE_MODULE, CORE_NAMESPACE},
    config::RuntimeConfig,
    error::{ActivationError, Result},
    module::{InventoryLoader, Module, ModuleCatalog, ModuleLoader},
    name::QualifiedName,
    observer::ModuleObserver,
    properties::Properties,
    provider::{Criteria, ProviderData, ProviderValueSource},
    service::{Layered, ServiceContainer, ServiceProvider},
    streaming::{StreamSource, StreamingSource},
    template::{self, Template},
    text::{ParseFn, TextConversion},
    types::TypeDescriptor,
    value::{Instance, TypeKey, Value},
};

pub struct Runtime {
    cfg: RuntimeConfig,
    observer: ModuleObserver,
    data: ProviderData,
    services: Arc<ServiceContainer>,
    text: TextConversion,
    handler: Option<Arc<dyn ExceptionHandler>>,
    factory: Arc<dyn ActivationFactory>,
}

pub struct RuntimeBuilder {
    cfg: RuntimeConfig,
    loader: Option<Arc<dyn ModuleLoader>>,
    services: Arc<ServiceContainer>,
    handler: Option<Arc<dyn ExceptionHandler>>,
    factory: Option<Arc<dyn ActivationFactory>>,
    modules: Vec<Module>,
    text: TextConversion,
}

impl RuntimeBuilder {
    pub fn new(cfg: RuntimeConfig) -> Self {
        RuntimeBuilder {
            cfg,
            loader: None,
            services: Arc::new(ServiceContainer::new()),
            handler: None,
            factory: None,
            modules: Vec::new(),
            text: TextConversion::with_builtins(),
        }
    }

    /// Host module loader. Defaults to the inventory loader, or to an empty
    /// probing catalog when `use_inventory` is off.
    pub fn loader(mut self, loader: Arc<dyn ModuleLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Runtime-level service, consulted after any per-call provider.
    pub fn service<R: ?Sized + Send + Sync + 'static>(self, service: Arc<R>) -> Self {
        self.services.insert(service);
        self
    }

    pub fn services(mut self, services: Arc<ServiceContainer>) -> Self {
        self.services = services;
        self
    }

    pub fn exception_handler(mut self, handler: Arc<dyn ExceptionHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn activation_factory(mut self, factory: Arc<dyn ActivationFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Module discovered ahead of the loader's; its references are loaded too.
    pub fn module(mut self, module: Module) -> Self {
        self.modules.push(module);
        self
    }

    pub fn text_parser(mut self, target: TypeKey, parse: ParseFn) -> Self {
        self.text.register_fn(target, parse);
        self
    }

    pub fn build(self) -> Result<Runtime> {
        let cfg = self.cfg;
        let loader: Arc<dyn ModuleLoader> = match self.loader {
            Some(loader) => loader,
            None if cfg.use_inventory => Arc::new(InventoryLoader::new()),
            None => Arc::new(ModuleCatalog::from_config(&cfg)),
        };
        let observer = ModuleObserver::new(loader, cfg.probe);
        observer.add(Arc::new(builtin::core_module()));
        for module in self.modules {
            observer.add(Arc::new(module));
        }
        let data = ProviderData::new(&observer, adapter::builtin_roles(CORE_MODULE));
        data.refresh()?;
        let handler = self.handler.or_else(|| {
            cfg.log_diagnostics
                .then(|| Arc::new(LoggingExceptionHandler) as Arc<dyn ExceptionHandler>)
        });
        let factory = self.factory.unwrap_or_else(|| {
            if cfg.use_builders {
                Arc::new(BuildActivationFactory::default())
            } else {
                Arc::new(DefaultActivationFactory)
            }
        });
        tracing::debug!(
            probe = cfg.probe,
            use_builders = cfg.use_builders,
            handler = handler.is_some(),
            "runtime created"
        );
        Ok(Runtime {
            cfg,
            observer,
            data,
            services: self.services,
            text: self.text,
            handler,
            factory,
        })
    }
}

impl Runtime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new(RuntimeConfig::default())
    }

    pub fn new(cfg: RuntimeConfig) -> Result<Self> {
        RuntimeBuilder::new(cfg).build()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.cfg
    }
    pub fn observer(&self) -> &ModuleObserver {
        &self.observer
    }
    pub fn provider_data(&self) -> &ProviderData {
        &self.data
    }
    pub fn services(&self) -> &ServiceContainer {
        &self.services
    }
    pub fn text_conversion(&self) -> &TextConversion {
        &self.text
    }
    pub fn exception_handler(&self) -> Option<&dyn ExceptionHandler> {
        self.handler.as_deref()
    }

    /// Integrates modules discovered since the last lookup.
    pub fn refresh(&self) -> Result<()> {
        self.data.refresh()
    }

    pub(crate) fn layered<'a>(&'a self, services: Option<&'a dyn ServiceProvider>) -> Layered<'a> {
        Layered {
            first: services,
            fallback: &*self.services,
        }
    }

    // ---- types ----

    pub fn descriptor(&self, key: TypeKey) -> Result<Option<Arc<TypeDescriptor>>> {
        self.data.type_descriptor(key)
    }

    pub fn is_assignable(&self, to: TypeKey, from: TypeKey) -> Result<bool> {
        if to == from {
            return Ok(true);
        }
        self.data.with_types(|t| t.is_assignable(to, from))
    }

    pub(crate) fn is_service_type(&self, key: TypeKey) -> bool {
        matches!(self.descriptor(key), Ok(Some(d)) if d.is_service_type())
    }

    /// Resolves `{namespace}Local` exactly, or a bare local name when it is unique.
    pub fn resolve_type(&self, name: &str) -> Result<Option<TypeKey>> {
        let qn = QualifiedName::parse(name)?;
        self.data.with_types(|table| {
            if let Some(desc) = table.by_name(&qn) {
                return Ok(Some(desc.type_key()));
            }
            if !qn.namespace().is_empty() {
                return Ok(None);
            }
            match table.by_local_name(qn.local_name()).as_slice() {
                [] => Ok(None),
                [one] => Ok(Some(one.type_key())),
                _ => Err(ActivationError::AmbiguousType(name.to_string())),
            }
        })?
    }

    /// Text to `target`: the runtime's conversion table, then the type's own parser.
    pub fn convert_text(&self, text: &str, target: TypeKey) -> Result<Option<Value>> {
        if self.text.can_convert(target) {
            return self.text.convert(text, target);
        }
        let Some(parse) = self.descriptor(target)?.and_then(|d| d.text_parser()) else {
            return Ok(None);
        };
        parse(text).map(Some).map_err(|source| ActivationError::Conversion {
            text: text.to_string(),
            target: target.name().to_string(),
            source,
        })
    }

    /// Identity, a declared role cast, or the type's adaptation hook.
    pub fn try_adapt(&self, value: &Value, target: TypeKey) -> Option<Value> {
        if value.type_key() == target {
            return Some(value.clone());
        }
        let desc = match self.descriptor(value.type_key()) {
            Ok(Some(desc)) => desc,
            Ok(None) => return None,
            Err(e) => {
                tracing::debug!(type_name = %value.type_key(), error = %e, "adaptation skipped");
                return None;
            }
        };
        desc.cast(value, target).or_else(|| desc.adapt(value, target))
    }

    pub fn cast<R: ?Sized + 'static>(&self, value: &Value) -> Option<Arc<R>> {
        value.shared::<R>().or_else(|| {
            self.try_adapt(value, TypeKey::of::<R>())
                .and_then(|v| v.shared::<R>())
        })
    }

    fn cast_or_err<R: ?Sized + 'static>(&self, value: &Value) -> Result<Arc<R>> {
        self.cast::<R>(value).ok_or_else(|| ActivationError::NotAssignable {
            from: value.type_key().name().to_string(),
            to: std::any::type_name::<R>().to_string(),
        })
    }

    // ---- activation ----

    pub fn create_instance(&self, ty: TypeKey, args: impl IntoActivationArgs) -> Result<Value> {
        self.create_instance_with(ty, args, None)
    }

    /// Activation with a per-call service provider ahead of the runtime's own.
    pub fn create_instance_with(
        &self,
        ty: TypeKey,
        args: impl IntoActivationArgs,
        services: Option<&dyn ServiceProvider>,
    ) -> Result<Value> {
        let layered = self.layered(services);
        self.factory
            .create_instance(self, ty, args.into_activation_args(), ActivationContext::full(&layered))
    }

    pub fn create_default(&self, ty: TypeKey) -> Result<Value> {
        self.create_instance(ty, ActivationArgs::new())
    }

    /// Activates `T` and views the result as `T` (a role result is cast).
    pub fn create<T: ?Sized + 'static>(&self, args: impl IntoActivationArgs) -> Result<Arc<T>> {
        let value = self.create_instance(TypeKey::of::<T>(), args)?;
        self.cast_or_err::<T>(&value)
    }

    pub fn create_by_name(&self, name: &str, args: impl IntoActivationArgs) -> Result<Value> {
        let ty = self
            .resolve_type(name)?
            .ok_or_else(|| ActivationError::UnknownType(name.to_string()))?;
        self.create_instance(ty, args)
    }

    /// Property initialization on its own.
    pub fn initialize(&self, instance: &mut Instance, args: impl IntoActivationArgs) -> Result<()> {
        let layered = self.layered(None);
        activation::initialize(self, instance, args.into_activation_args(), &layered)
    }

    /// Singleton-style construction for provider values and adapters: no
    /// arguments, no post-activation providers.
    pub(crate) fn create_provider_value(&self, ty: TypeKey) -> Result<Value> {
        let layered = self.layered(None);
        self.factory
            .create_instance(self, ty, ActivationArgs::new(), ActivationContext::plain(&layered))
    }

    pub(crate) fn activation_providers_for(&self, key: TypeKey) -> Result<Vec<Arc<dyn ActivationProvider>>> {
        let mut out = Vec::new();
        if let Some(own) = self.get_adapter::<dyn ActivationProvider>(key, ACTIVATION_PROVIDER)? {
            out.push(own);
        }
        for source in self.data.providers(TypeKey::of::<dyn ActivationProvider>())? {
            out.push(self.provider_value::<dyn ActivationProvider>(&source)?);
        }
        Ok(out)
    }

    // ---- providers ----

    fn provider_value<R: ?Sized + 'static>(&self, source: &ProviderValueSource) -> Result<Arc<R>> {
        let value = source.get_value(self)?;
        self.cast_or_err::<R>(&value)
    }

    fn provider_values<R: ?Sized + 'static>(&self, source: Option<ProviderValueSource>) -> Result<Option<Arc<R>>> {
        source.map(|s| self.provider_value::<R>(&s)).transpose()
    }

    /// Provider of role `R` by case-insensitive local name.
    pub fn get_provider<R: ?Sized + 'static>(&self, local_name: &str) -> Result<Option<Arc<R>>> {
        self.provider_values(self.data.provider_by_local_name(TypeKey::of::<R>(), local_name)?)
    }

    pub fn get_provider_by_name<R: ?Sized + 'static>(&self, name: &QualifiedName) -> Result<Option<Arc<R>>> {
        self.provider_values(self.data.provider_by_name(TypeKey::of::<R>(), name)?)
    }

    pub fn get_provider_by_criteria<R: ?Sized + 'static>(&self, criteria: &Criteria) -> Result<Option<Arc<R>>> {
        self.provider_values(self.data.provider_by_criteria(TypeKey::of::<R>(), criteria)?)
    }

    pub fn get_providers<R: ?Sized + 'static>(&self) -> Result<Vec<Arc<R>>> {
        self.data
            .providers(TypeKey::of::<R>())?
            .iter()
            .map(|s| self.provider_value::<R>(s))
            .collect()
    }

    pub fn get_provider_type<R: ?Sized + 'static>(&self, local_name: &str) -> Result<Option<TypeKey>> {
        Ok(self
            .data
            .provider_by_local_name(TypeKey::of::<R>(), local_name)?
            .and_then(|s| s.value_type()))
    }

    /// A fresh value from the named provider rather than its memoized one.
    pub fn create_provider<R: ?Sized + 'static>(
        &self,
        local_name: &str,
        args: impl IntoActivationArgs,
    ) -> Result<Option<Arc<R>>> {
        let Some(source) = self.data.provider_by_local_name(TypeKey::of::<R>(), local_name)? else {
            return Ok(None);
        };
        let value = source.activate(self, args.into_activation_args(), None)?;
        self.cast_or_err::<R>(&value).map(Some)
    }

    // ---- adapters ----

    pub fn adapter_roles(&self) -> Result<Vec<AdapterRoleInfo>> {
        self.data.adapter_roles()
    }

    pub fn adapter_role(&self, name: &str) -> Result<Option<AdapterRoleInfo>> {
        self.data.adapter_role(name)
    }

    /// `Err(AdapterRoleNotDefined)` for unknown roles, `Ok(None)` when no adapter exists.
    pub fn get_adapter_type(&self, adaptee: TypeKey, role: &str) -> Result<Option<TypeKey>> {
        DefaultAdapterFactory::new(self).get_adapter_type(adaptee, role)
    }

    /// An adapter instance for `adaptee`, viewed as `R`.
    pub fn get_adapter<R: ?Sized + 'static>(&self, adaptee: TypeKey, role: &str) -> Result<Option<Arc<R>>> {
        let Some(ty) = self.get_adapter_type(adaptee, role)? else {
            return Ok(None);
        };
        let value = self.create_provider_value(ty)?;
        self.cast_or_err::<R>(&value).map(Some)
    }

    // ---- templates ----

    pub fn template_for(&self, ty: TypeKey) -> Result<Option<Arc<dyn Template>>> {
        self.get_adapter::<dyn Template>(ty, TEMPLATE)
    }

    /// Constructs `ty` without arguments, then applies `template` before
    /// post-activation providers run.
    pub fn create_from_template(&self, ty: TypeKey, template: &dyn Template) -> Result<Value> {
        let layered = self.layered(None);
        let desc = activation::resolve_concrete(self, ty, &layered)?;
        let ctor = desc
            .activation_constructor()
            .ok_or_else(|| ActivationError::CannotActivateNoConstructor(desc.name().to_string()))?;
        let (mut instance, _) = activation::construct(self, &desc.name().to_string(), ctor, Vec::new(), &layered)?;
        template.apply(self, &mut instance)?;
        activation::finish(self, instance, Vec::new(), ActivationContext::full(&layered))
    }

    pub fn properties_of(&self, value: &Value) -> Result<Properties> {
        template::properties_of(self, value)
    }

    pub fn copy_properties(&self, source: &Value, target: &mut Instance) -> Result<usize> {
        template::copy_properties(self, source, target)
    }

    /// Copy construction through activation: constructor parameters and
    /// settable properties are taken from `value`.
    pub fn clone_value(&self, value: &Value) -> Result<Value> {
        let desc = self
            .descriptor(value.type_key())?
            .ok_or_else(|| ActivationError::UnknownType(value.type_key().name().to_string()))?;
        let ctor = desc.activation_constructor();
        let props: Properties = template::properties_of(self, value)?
            .into_iter()
            .filter(|(k, _)| {
                let settable = desc.property(k).is_some_and(|p| p.can_write() || p.can_add());
                settable || ctor.is_some_and(|c| c.params().iter().any(|p| p.name().eq_ignore_ascii_case(k)))
            })
            .collect();
        self.create_instance(value.type_key(), props)
    }

    // ---- streaming ----

    /// The type's `StreamingSource` adapter, else the provider matching
    /// `extension`, else JSON.
    pub fn streaming_source_for(&self, ty: TypeKey, extension: Option<&str>) -> Result<Arc<dyn StreamingSource>> {
        if let Some(own) = self.get_adapter::<dyn StreamingSource>(ty, STREAMING_SOURCE)? {
            return Ok(own);
        }
        let root = TypeKey::of::<dyn StreamingSource>();
        let source = match extension {
            Some(ext) => {
                let criteria = Criteria::new().with("extension", ext.to_ascii_lowercase());
                self.data.provider_by_criteria(root, &criteria)?
            }
            None => self
                .data
                .provider_by_name(root, &QualifiedName::new(CORE_NAMESPACE, "Json"))?,
        };
        match source {
            Some(s) => self.provider_value::<dyn StreamingSource>(&s),
            None => Err(ActivationError::NoStreamingSource(match extension {
                Some(ext) => format!("{ty} (.{ext})"),
                None => ty.name().to_string(),
            })),
        }
    }

    pub fn load(&self, source: &StreamSource, ty: TypeKey) -> Result<Value> {
        let text = source.read_to_string()?;
        self.streaming_source_for(ty, source.extension().as_deref())?
            .load(self, &text, ty)
    }

    pub async fn load_async(&self, source: &StreamSource, ty: TypeKey) -> Result<Value> {
        let text = source.read_to_string_async().await?;
        self.streaming_source_for(ty, source.extension().as_deref())?
            .load(self, &text, ty)
    }

    pub fn load_as<T: ?Sized + 'static>(&self, source: &StreamSource) -> Result<Arc<T>> {
        let value = self.load(source, TypeKey::of::<T>())?;
        self.cast_or_err::<T>(&value)
    }

    pub fn save(&self, value: &Value, extension: Option<&str>) -> Result<String> {
        self.streaming_source_for(value.type_key(), extension)?
            .save(self, value)
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.cfg)
            .field("providers", &self.data)
            .field("services", &self.services)
            .finish_non_exhaustive()
    }
}
