//! Property initialization from leftover pairs.
use anyhow::anyhow;

use super::{binding::coerce, ExceptionHandler};
use crate::{
    error::{ActivationError, Result},
    runtime::Runtime,
    service::ServiceProvider,
    types::Property,
    value::{Instance, Value},
};

/// Per-item failures go to the handler (or are dropped with a debug log when
/// there is none); critical ones always propagate.
pub(crate) fn report(err: ActivationError, handler: Option<&dyn ExceptionHandler>) -> Result<()> {
    if err.is_critical() {
        return Err(err);
    }
    match handler {
        Some(h) => h.handle(&err),
        None => tracing::debug!(error = %err, "activation diagnostic ignored"),
    }
    Ok(())
}

pub(crate) fn initialize(
    rt: &Runtime,
    instance: &mut Instance,
    pairs: Vec<(String, Value)>,
    services: &dyn ServiceProvider,
) -> Result<()> {
    if pairs.is_empty() {
        return Ok(());
    }
    let type_name = instance.type_key().name();
    let desc = rt.descriptor(instance.type_key())?;
    for (name, value) in pairs {
        let outcome = match desc.as_deref().and_then(|d| d.property(&name)) {
            Some(prop) => set_property(rt, instance, prop, value, services),
            None => Err(ActivationError::PropertyNotFound {
                type_name: type_name.to_string(),
                property: name,
            }),
        };
        if let Err(err) = outcome {
            report(err, rt.exception_handler())?;
        }
    }
    Ok(())
}

fn set_failed(instance: &Instance, prop: &Property, source: anyhow::Error) -> ActivationError {
    ActivationError::PropertySet {
        type_name: instance.type_key().name().to_string(),
        property: prop.name().to_string(),
        source,
    }
}

fn set_property(
    rt: &Runtime,
    instance: &mut Instance,
    prop: &Property,
    value: Value,
    services: &dyn ServiceProvider,
) -> Result<()> {
    if prop.can_write() {
        let actual = value.type_key();
        let value = coerce(rt, value, prop.type_key(), services)?.ok_or_else(|| {
            set_failed(instance, prop, anyhow!("expected {}, got {}", prop.type_key(), actual))
        })?;
        return prop
            .set_value(instance.as_any_mut(), value)
            .map_err(|e| set_failed(instance, prop, e));
    }
    // 只读集合：把输入当作序列，逐项追加
    if let Some(element) = prop.element_type().filter(|_| prop.can_add()) {
        if value.type_key() == prop.type_key() {
            return prop
                .add_value(instance.as_any_mut(), value)
                .map_err(|e| set_failed(instance, prop, e));
        }
        let items = match value.downcast_ref::<Vec<Value>>() {
            Some(list) => list.clone(),
            None => vec![value],
        };
        for item in items {
            let actual = item.type_key();
            let item = coerce(rt, item, element, services)?.ok_or_else(|| {
                set_failed(instance, prop, anyhow!("cannot add {actual} to {}", prop.type_key()))
            })?;
            prop.add_value(instance.as_any_mut(), item)
                .map_err(|e| set_failed(instance, prop, e))?;
        }
        return Ok(());
    }
    Err(ActivationError::PropertyReadOnly {
        type_name: instance.type_key().name().to_string(),
        property: prop.name().to_string(),
    })
}
