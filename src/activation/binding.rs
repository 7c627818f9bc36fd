//! Argument binding: positional and named keys, service injection, defaults.
use crate::{
    error::{ActivationError, Result},
    properties::Properties,
    runtime::Runtime,
    service::ServiceProvider,
    types::{Args, Param},
    value::{TypeKey, Value},
};

/// Loosely-typed activation input, in iteration order.
pub type ActivationArgs = Vec<(String, Value)>;

/// Constructor arguments plus the pairs left for property initialization.
#[derive(Debug, Default)]
pub struct ActivationBinding {
    pub args: Args,
    pub leftovers: ActivationArgs,
}

/// Converts `value` to `target`: identity, text conversion, nested
/// activation from a property bag, then adaptation. `Ok(None)` when nothing applies.
pub(crate) fn coerce(
    rt: &Runtime,
    value: Value,
    target: TypeKey,
    services: &dyn ServiceProvider,
) -> Result<Option<Value>> {
    if value.type_key() == target {
        return Ok(Some(value));
    }
    if let Some(text) = value.as_text() {
        if let Some(v) = rt.convert_text(text, target)? {
            return Ok(Some(v));
        }
    }
    if let Some(props) = value.downcast_ref::<Properties>() {
        if rt.descriptor(target)?.is_some() {
            return rt
                .create_instance_with(target, props.clone(), Some(services))
                .map(Some);
        }
    }
    Ok(rt.try_adapt(&value, target))
}

fn coerce_param(
    rt: &Runtime,
    owner: &str,
    param: &Param,
    value: Value,
    services: &dyn ServiceProvider,
) -> Result<Value> {
    let actual = value.type_key();
    coerce(rt, value, param.type_key(), services)?.ok_or_else(|| ActivationError::ArgumentType {
        owner: owner.to_string(),
        param: param.name().to_string(),
        expected: param.type_key().name().to_string(),
        actual: actual.name().to_string(),
    })
}

/// Service for an unbound parameter: direct lookup (adapted when the provider
/// hands back some other type), then any runtime-level service that adapts to
/// the parameter type.
fn inject(rt: &Runtime, param: &Param, services: &dyn ServiceProvider) -> Option<Value> {
    let key = param.type_key();
    let direct = services.get_service(key).and_then(|service| {
        if service.type_key() == key {
            return Some(service);
        }
        let adapted = rt.try_adapt(&service, key);
        if adapted.is_none() {
            tracing::debug!(service = %service.type_key(), param = %param.name(), "service does not adapt to the parameter type");
        }
        adapted
    });
    direct.or_else(|| {
        rt.services()
            .values()
            .iter()
            .find_map(|candidate| rt.try_adapt(candidate, key))
    })
}

pub(crate) fn bind(
    rt: &Runtime,
    owner: &str,
    params: &[Param],
    input: ActivationArgs,
    services: &dyn ServiceProvider,
) -> Result<ActivationBinding> {
    let mut slots: Vec<Option<Value>> = vec![None; params.len()];
    let mut leftovers: ActivationArgs = Vec::new();

    for (key, value) in input {
        let index = match key.trim().parse::<usize>() {
            Ok(i) if i < params.len() => Some(i),
            _ => params.iter().position(|p| p.name().eq_ignore_ascii_case(&key)),
        };
        match index {
            Some(i) => slots[i] = Some(coerce_param(rt, owner, &params[i], value, services)?),
            // 重复键不合并，按输入顺序逐个交给属性初始化
            None => leftovers.push((key, value)),
        }
    }

    for (slot, param) in slots.iter_mut().zip(params) {
        if slot.is_some() {
            continue;
        }
        if param.is_service() || rt.is_service_type(param.type_key()) {
            if let Some(service) = inject(rt, param, services) {
                *slot = Some(service);
                continue;
            }
        }
        if let Some(default) = param.default_value() {
            *slot = Some(default.clone());
            continue;
        }
        if !param.is_optional() {
            return Err(ActivationError::MissingArgument {
                owner: owner.to_string(),
                param: param.name().to_string(),
                type_name: param.type_key().name().to_string(),
            });
        }
    }

    Ok(ActivationBinding {
        args: Args::new(slots),
        leftovers,
    })
}

/// Anything usable as activation input: property bags, arrays or vectors of
/// `(key, value)` pairs.
pub trait IntoActivationArgs {
    fn into_activation_args(self) -> ActivationArgs;
}

impl<I, K, V> IntoActivationArgs for I
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    fn into_activation_args(self) -> ActivationArgs {
        self.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
    }
}
