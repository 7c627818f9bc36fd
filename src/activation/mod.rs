//! Object activation: concrete-type resolution, constructor selection,
//! argument binding with service injection, property initialization and
//! post-activation providers.
mod binding;
mod init;

pub use binding::{ActivationArgs, ActivationBinding, IntoActivationArgs};
pub(crate) use binding::bind;
pub(crate) use init::initialize;

use std::{fmt, sync::Arc};

use crate::{
    adapter::BUILDER,
    error::{ActivationError, Result},
    runtime::Runtime,
    service::ServiceProvider,
    types::{Constructor, TypeDescriptor},
    value::{Instance, TypeKey, Value},
};

/// Receives recoverable, per-item activation failures.
pub trait ExceptionHandler: Send + Sync {
    fn handle(&self, error: &ActivationError);
}

/// Swallows everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct IgnoreExceptions;

impl ExceptionHandler for IgnoreExceptions {
    fn handle(&self, _error: &ActivationError) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingExceptionHandler;

impl ExceptionHandler for LoggingExceptionHandler {
    fn handle(&self, error: &ActivationError) {
        tracing::warn!(error = %error, "activation diagnostic");
    }
}

/// Runs against every freshly activated instance.
pub trait ActivationProvider: Send + Sync {
    fn on_activated(&self, rt: &Runtime, instance: &mut Instance) -> anyhow::Result<()>;
}

/// Per-call activation settings. Provider values and adapters are activated
/// with both flags off.
#[derive(Clone, Copy)]
pub struct ActivationContext<'a> {
    pub services: &'a dyn ServiceProvider,
    pub post_activation: bool,
    pub builders: bool,
}

impl<'a> ActivationContext<'a> {
    pub fn full(services: &'a dyn ServiceProvider) -> Self {
        ActivationContext {
            services,
            post_activation: true,
            builders: true,
        }
    }

    pub fn plain(services: &'a dyn ServiceProvider) -> Self {
        ActivationContext {
            services,
            post_activation: false,
            builders: false,
        }
    }
}

impl fmt::Debug for ActivationContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivationContext")
            .field("post_activation", &self.post_activation)
            .field("builders", &self.builders)
            .finish_non_exhaustive()
    }
}

pub trait ActivationFactory: Send + Sync {
    fn create_instance(
        &self,
        rt: &Runtime,
        ty: TypeKey,
        args: ActivationArgs,
        cx: ActivationContext<'_>,
    ) -> Result<Value>;
}

/// Descriptor to construct for `ty`. Abstract types are replaced by their
/// concrete class; without a concrete-class provider they cannot be activated.
pub(crate) fn resolve_concrete(
    rt: &Runtime,
    ty: TypeKey,
    services: &dyn ServiceProvider,
) -> Result<Arc<TypeDescriptor>> {
    let desc = rt
        .descriptor(ty)?
        .ok_or_else(|| ActivationError::UnknownType(ty.name().to_string()))?;
    if !desc.is_abstract() {
        return Ok(desc);
    }
    let Some(provider) = desc.concrete_class_provider() else {
        return Err(ActivationError::CannotActivateNoConstructor(desc.name().to_string()));
    };
    let concrete = provider.concrete_class(ty, Some(services));
    let resolved = match concrete {
        Some(c) => rt.descriptor(c)?,
        None => None,
    };
    match resolved {
        Some(c) if !c.is_abstract() && rt.is_assignable(ty, c.type_key())? => Ok(c),
        _ => Err(ActivationError::ConcreteClass {
            requested: ty.name().to_string(),
            returned: concrete.map_or("nothing", |c| c.name()).to_string(),
        }),
    }
}

/// Binds and invokes `ctor`, returning the instance and unconsumed pairs.
pub(crate) fn construct(
    rt: &Runtime,
    owner: &str,
    ctor: &Constructor,
    args: ActivationArgs,
    services: &dyn ServiceProvider,
) -> Result<(Instance, ActivationArgs)> {
    let binding = bind(rt, owner, ctor.params(), args, services)?;
    let instance = ctor
        .invoke(&binding.args)
        .map_err(|source| ActivationError::Construction {
            type_name: owner.to_string(),
            source,
        })?;
    Ok((instance, binding.leftovers))
}

pub(crate) fn freeze(instance: Instance) -> Result<Value> {
    instance
        .into_value()
        .ok_or(ActivationError::Internal("instance payload changed type"))
}

/// Initialization, post-activation and freezing.
pub(crate) fn finish(
    rt: &Runtime,
    mut instance: Instance,
    leftovers: ActivationArgs,
    cx: ActivationContext<'_>,
) -> Result<Value> {
    initialize(rt, &mut instance, leftovers, cx.services)?;
    if cx.post_activation {
        post_activate(rt, &mut instance)?;
    }
    freeze(instance)
}

/// Critical failures always propagate. Others go to the exception handler,
/// or propagate when none is configured.
pub(crate) fn post_activate(rt: &Runtime, instance: &mut Instance) -> Result<()> {
    for provider in rt.activation_providers_for(instance.type_key())? {
        let Err(source) = provider.on_activated(rt, instance) else {
            continue;
        };
        let err = ActivationError::ActivationProvider {
            type_name: instance.type_key().name().to_string(),
            source,
        };
        if err.is_critical() {
            return Err(err);
        }
        match rt.exception_handler() {
            Some(handler) => handler.handle(&err),
            None => return Err(err),
        }
    }
    Ok(())
}

/// Activation through a static factory method (method providers).
pub(crate) fn invoke_factory(
    rt: &Runtime,
    owner: &str,
    ctor: &Constructor,
    args: ActivationArgs,
    services: Option<&dyn ServiceProvider>,
    post_activation: bool,
) -> Result<Value> {
    let layered = rt.layered(services);
    let cx = if post_activation {
        ActivationContext::full(&layered)
    } else {
        ActivationContext::plain(&layered)
    };
    let (instance, leftovers) = construct(rt, owner, ctor, args, cx.services)?;
    finish(rt, instance, leftovers, cx)
}

/// Constructor-based activation.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultActivationFactory;

impl ActivationFactory for DefaultActivationFactory {
    fn create_instance(
        &self,
        rt: &Runtime,
        ty: TypeKey,
        args: ActivationArgs,
        cx: ActivationContext<'_>,
    ) -> Result<Value> {
        let desc = resolve_concrete(rt, ty, cx.services)?;
        let ctor = desc
            .activation_constructor()
            .ok_or_else(|| ActivationError::CannotActivateNoConstructor(desc.name().to_string()))?;
        let (instance, leftovers) = construct(rt, &desc.name().to_string(), ctor, args, cx.services)?;
        finish(rt, instance, leftovers, cx)
    }
}

/// Activation through a `Builder` adapter when one exists, constructor-based
/// otherwise.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuildActivationFactory {
    fallback: DefaultActivationFactory,
}

impl ActivationFactory for BuildActivationFactory {
    fn create_instance(
        &self,
        rt: &Runtime,
        ty: TypeKey,
        args: ActivationArgs,
        cx: ActivationContext<'_>,
    ) -> Result<Value> {
        if !cx.builders {
            return self.fallback.create_instance(rt, ty, args, cx);
        }
        let Some(builder_ty) = rt.get_adapter_type(ty, BUILDER)? else {
            return self.fallback.create_instance(rt, ty, args, cx);
        };
        let no_builder = || ActivationError::CannotActivateNoConstructorOrBuilder(ty.name().to_string());
        let builder_desc = rt.descriptor(builder_ty)?.ok_or_else(no_builder)?;
        let capability = builder_desc.build_capability().ok_or_else(no_builder)?;
        let ctor = builder_desc.activation_constructor().ok_or_else(no_builder)?;
        let owner = builder_desc.name().to_string();
        let (mut builder, leftovers) = construct(rt, &owner, ctor, args, cx.services)?;

        let (for_builder, for_result): (ActivationArgs, ActivationArgs) =
            leftovers.into_iter().partition(|(k, _)| {
                builder_desc
                    .property(k)
                    .is_some_and(|p| p.can_write() || p.can_add())
            });
        initialize(rt, &mut builder, for_builder, cx.services)?;

        let built = capability
            .build(builder.as_any(), Some(cx.services))
            .map_err(|source| ActivationError::Construction {
                type_name: owner.clone(),
                source,
            })?;
        let instance = built.ok_or_else(no_builder)?;
        tracing::debug!(type_name = %ty, builder = %owner, "built through builder adapter");
        finish(rt, instance, for_result, cx)
    }
}
