//! Provider discovery: root provider types, their named value sources, and
//! the per-module state (types, adapter roles, adapter factories) integrated
//! lazily from the module observer.
//!
//! Every lookup first integrates modules discovered since the previous call,
//! so a module loaded late becomes visible on the next lookup.
mod context;
mod metadata;
mod source;

pub use context::ProviderRegistrationContext;
pub use metadata::{Criteria, Member, MetaValue, Metadata};
pub use source::{
    ComposedSource, FieldFn, FieldSource, MethodSource, ProviderTarget, ProviderValueSource, TypeSource,
};

use parking_lot::{Mutex, RwLock};
use std::{any::TypeId, collections::HashMap, fmt, sync::Arc};

use crate::{
    adapter::{AdapterFactory, AdapterRoleInfo, ModuleAdapterFactory},
    error::{ActivationError, Result},
    module::{Declaration, Module},
    name::QualifiedName,
    observer::{ModuleCursor, ModuleObserver},
    types::{TypeDescriptor, TypeTable},
    value::TypeKey,
};

#[derive(Default)]
struct ProviderState {
    roots: Vec<TypeKey>,
    sources: HashMap<TypeId, Vec<ProviderValueSource>>,
    roles: Vec<AdapterRoleInfo>,
    // 键为小写模块名
    factories: HashMap<String, Arc<dyn AdapterFactory>>,
    modules: Vec<Arc<Module>>,
}

impl ProviderState {
    fn merge(&mut self, source: ProviderValueSource) {
        let list = self.sources.entry(source.provider_type().id()).or_default();
        if list.iter().any(|s| s.is_duplicate_of(&source)) {
            tracing::debug!(provider = %source.name(), "provider declared twice; keeping the first");
            return;
        }
        match list.iter().position(|s| s.shares_name_with(&source)) {
            Some(i) => {
                let existing = list.remove(i);
                list.insert(i, existing.append_one(source));
            }
            None => list.push(source),
        }
    }
}

pub struct ProviderData {
    cursor: Mutex<ModuleCursor>,
    types: RwLock<TypeTable>,
    state: RwLock<ProviderState>,
    // 注册失败后保持失败：模块名与错误信息
    failure: RwLock<Option<(String, String)>>,
}

impl ProviderData {
    pub fn new(observer: &ModuleObserver, roles: Vec<AdapterRoleInfo>) -> Self {
        ProviderData {
            cursor: Mutex::new(observer.iter()),
            types: RwLock::new(TypeTable::new()),
            state: RwLock::new(ProviderState {
                roles,
                ..ProviderState::default()
            }),
            failure: RwLock::new(None),
        }
    }

    /// Integrates every module the observer has produced since the last call.
    ///
    /// A module whose registration failed leaves nothing behind, and every
    /// later refresh reports the same failure.
    pub fn refresh(&self) -> Result<()> {
        let mut cursor = self.cursor.lock();
        if let Some(err) = self.sticky_failure() {
            return Err(err);
        }
        while let Some(module) = cursor.next() {
            self.integrate(&module?)?;
        }
        Ok(())
    }

    fn sticky_failure(&self) -> Option<ActivationError> {
        self.failure
            .read()
            .as_ref()
            .map(|(module, message)| ActivationError::Registration {
                module: module.clone(),
                source: anyhow::anyhow!("{message}"),
            })
    }

    /// Integrates one module. Modules already integrated under the same name
    /// are skipped.
    fn integrate(&self, module: &Arc<Module>) -> Result<()> {
        if self.state.read().modules.iter().any(|m| m.is_named(module.name())) {
            tracing::debug!(module = %module.name(), "module already integrated");
            return Ok(());
        }

        let mut ctx = ProviderRegistrationContext::new(module.name());
        match module.register_fn() {
            Some(register) => {
                if let Err(source) = register(&mut ctx) {
                    tracing::error!(module = %module.name(), error = %source, "provider registration failed");
                    *self.failure.write() = Some((module.name().to_string(), format!("{source:#}")));
                    return Err(ActivationError::Registration {
                        module: module.name().to_string(),
                        source,
                    });
                }
            }
            None => {
                for decl in module.declarations() {
                    match decl {
                        Declaration::RootProvider(root) => {
                            ctx.define_root_provider_key(*root);
                        }
                        Declaration::Provider {
                            name,
                            root,
                            target,
                            metadata,
                        } => {
                            ctx.define_provider(name.clone(), *root, target.clone(), metadata.clone());
                        }
                    }
                }
            }
        }
        let (roots, sources) = ctx.into_parts();
        let provider_count = sources.len();
        let factory = ModuleAdapterFactory::for_module(module);
        {
            let mut types = self.types.write();
            for desc in module.types() {
                types.insert(desc.clone());
            }
        }

        let mut state = self.state.write();
        for root in roots {
            if !state.roots.contains(&root) {
                state.roots.push(root);
            }
        }
        for source in sources {
            state.merge(source);
        }
        for role in module.defined_roles() {
            if state.roles.iter().any(|r| r.is_named(role.name())) {
                tracing::warn!(module = %module.name(), role = %role.name(), "adapter role already defined; ignoring redefinition");
                continue;
            }
            state.roles.push(role.clone());
        }
        state.factories.insert(module.name().to_ascii_lowercase(), factory);
        state.modules.push(module.clone());
        tracing::debug!(
            module = %module.name(),
            types = module.types().len(),
            providers = provider_count,
            "module integrated"
        );
        Ok(())
    }

    pub fn modules(&self) -> Result<Vec<Arc<Module>>> {
        self.refresh()?;
        Ok(self.state.read().modules.clone())
    }

    pub fn type_descriptor(&self, key: TypeKey) -> Result<Option<Arc<TypeDescriptor>>> {
        if let Some(desc) = self.types.read().get(key) {
            return Ok(Some(desc));
        }
        self.refresh()?;
        Ok(self.types.read().get(key))
    }

    pub fn with_types<R>(&self, f: impl FnOnce(&TypeTable) -> R) -> Result<R> {
        self.refresh()?;
        Ok(f(&self.types.read()))
    }

    pub fn root_provider_types(&self) -> Result<Vec<TypeKey>> {
        self.refresh()?;
        Ok(self.state.read().roots.clone())
    }

    /// Sources of `root` in registration order; empty for unknown roots.
    pub fn providers(&self, root: TypeKey) -> Result<Vec<ProviderValueSource>> {
        self.refresh()?;
        Ok(self
            .state
            .read()
            .sources
            .get(&root.id())
            .cloned()
            .unwrap_or_default())
    }

    pub fn provider_by_name(&self, root: TypeKey, name: &QualifiedName) -> Result<Option<ProviderValueSource>> {
        Ok(self.providers(root)?.into_iter().find(|s| s.is_match_name(name)))
    }

    /// Case-insensitive local-name lookup. Two distinct sources answering to
    /// the same local name are an ambiguity error.
    pub fn provider_by_local_name(&self, root: TypeKey, local_name: &str) -> Result<Option<ProviderValueSource>> {
        if local_name.is_empty() {
            return Err(ActivationError::EmptyArgument("local_name"));
        }
        let mut found = self
            .providers(root)?
            .into_iter()
            .filter(|s| s.is_match_local_name(local_name));
        let first = found.next();
        if first.is_some() && found.next().is_some() {
            return Err(ActivationError::MultipleProviders {
                root: root.name().to_string(),
                name: local_name.to_string(),
            });
        }
        Ok(first)
    }

    pub fn provider_by_member(&self, root: TypeKey, member: &Member) -> Result<Option<ProviderValueSource>> {
        Ok(self.providers(root)?.into_iter().find(|s| s.precise_match(member)))
    }

    /// Sources with a positive score, best first. Equal scores keep
    /// registration order.
    pub fn providers_by_criteria(
        &self,
        root: TypeKey,
        criteria: &Criteria,
    ) -> Result<Vec<(i32, ProviderValueSource)>> {
        let sources = self.providers(root)?;
        let types = self.types.read();
        let mut scored: Vec<(i32, ProviderValueSource)> = sources
            .into_iter()
            .map(|s| (s.match_criteria(criteria, &types), s))
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(scored)
    }

    pub fn provider_by_criteria(&self, root: TypeKey, criteria: &Criteria) -> Result<Option<ProviderValueSource>> {
        Ok(self
            .providers_by_criteria(root, criteria)?
            .into_iter()
            .next()
            .map(|(_, s)| s))
    }

    /// Like [`ProviderData::provider_by_criteria`], but a tie at the top score
    /// is an ambiguity error.
    pub fn single_provider_by_criteria(
        &self,
        root: TypeKey,
        criteria: &Criteria,
    ) -> Result<Option<ProviderValueSource>> {
        let scored = self.providers_by_criteria(root, criteria)?;
        if let [(a, first), (b, _), ..] = scored.as_slice() {
            if a == b {
                return Err(ActivationError::MultipleProviders {
                    root: root.name().to_string(),
                    name: format!("{criteria:?} (first: {})", first.name()),
                });
            }
        }
        Ok(scored.into_iter().next().map(|(_, s)| s))
    }

    pub fn adapter_roles(&self) -> Result<Vec<AdapterRoleInfo>> {
        self.refresh()?;
        Ok(self.state.read().roles.clone())
    }

    pub fn adapter_role(&self, name: &str) -> Result<Option<AdapterRoleInfo>> {
        if name.is_empty() {
            return Err(ActivationError::EmptyArgument("role"));
        }
        self.refresh()?;
        Ok(self.state.read().roles.iter().find(|r| r.is_named(name)).cloned())
    }

    /// Adapter factory contributed by the named module, if it was integrated.
    pub fn module_adapter_factory(&self, module: &str) -> Result<Option<Arc<dyn AdapterFactory>>> {
        self.refresh()?;
        Ok(self
            .state
            .read()
            .factories
            .get(&module.to_ascii_lowercase())
            .cloned())
    }
}

impl fmt::Debug for ProviderData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("ProviderData")
            .field("modules", &state.modules.len())
            .field("types", &self.types.read().len())
            .field("roots", &state.roots)
            .finish()
    }
}
