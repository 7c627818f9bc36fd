use crate::{
    name::QualifiedName,
    value::TypeKey,
};

use super::{
    metadata::Metadata,
    source::{ProviderTarget, ProviderValueSource},
};

/// Handed to a module's `register` function (or filled from its
/// declarations) to collect root provider types and provider declarations.
pub struct ProviderRegistrationContext {
    module: String,
    roots: Vec<TypeKey>,
    sources: Vec<ProviderValueSource>,
}

impl ProviderRegistrationContext {
    pub(crate) fn new(module: impl Into<String>) -> Self {
        ProviderRegistrationContext {
            module: module.into(),
            roots: Vec::new(),
            sources: Vec::new(),
        }
    }

    /// Name of the module being registered.
    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn define_root_provider<R: ?Sized + 'static>(&mut self) -> &mut Self {
        self.define_root_provider_key(TypeKey::of::<R>())
    }

    pub fn define_root_provider_key(&mut self, root: TypeKey) -> &mut Self {
        if !self.roots.contains(&root) {
            self.roots.push(root);
        }
        self
    }

    /// Declares a provider of `root`. An undeclared root is declared implicitly.
    pub fn define_provider(
        &mut self,
        name: QualifiedName,
        root: TypeKey,
        target: ProviderTarget,
        metadata: Metadata,
    ) -> &mut Self {
        self.define_root_provider_key(root);
        self.sources.push(ProviderValueSource::new(
            name,
            root,
            target,
            metadata,
            Some(self.module.clone()),
        ));
        self
    }

    pub fn define_type_provider<R: ?Sized + 'static, T: ?Sized + 'static>(
        &mut self,
        name: QualifiedName,
        metadata: Metadata,
    ) -> &mut Self {
        self.define_provider(name, TypeKey::of::<R>(), ProviderTarget::of_type::<T>(), metadata)
    }

    pub fn roots(&self) -> &[TypeKey] {
        &self.roots
    }

    pub fn sources(&self) -> &[ProviderValueSource] {
        &self.sources
    }

    pub(crate) fn into_parts(self) -> (Vec<TypeKey>, Vec<ProviderValueSource>) {
        (self.roots, self.sources)
    }
}
