//! Templates: reusable initializers applied to instances, and property-wise
//! copy construction.
use std::fmt;

use crate::{
    error::{ActivationError, Result},
    properties::Properties,
    runtime::Runtime,
    value::{Instance, Value},
};

pub trait Template: Send + Sync {
    fn apply(&self, rt: &Runtime, target: &mut Instance) -> Result<()>;
}

/// Applies a fixed property bag, with the usual initialization rules.
#[derive(Clone, Default)]
pub struct PropertiesTemplate {
    values: Properties,
}

impl PropertiesTemplate {
    pub fn new(values: Properties) -> Self {
        PropertiesTemplate { values }
    }
    pub fn values(&self) -> &Properties {
        &self.values
    }
}

impl Template for PropertiesTemplate {
    fn apply(&self, rt: &Runtime, target: &mut Instance) -> Result<()> {
        rt.initialize(target, self.values.clone())
    }
}

impl fmt::Debug for PropertiesTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PropertiesTemplate").field(&self.values).finish()
    }
}

/// Readable properties of `source`, by declared name.
pub fn properties_of(rt: &Runtime, source: &Value) -> Result<Properties> {
    let desc = rt
        .descriptor(source.type_key())?
        .ok_or_else(|| ActivationError::UnknownType(source.type_key().name().to_string()))?;
    let mut out = Properties::new();
    for prop in desc.properties() {
        if let Some(v) = prop.read(source) {
            out.set(prop.name(), v);
        }
    }
    Ok(out)
}

/// Copies every readable property of `source` onto the matching writable
/// (or aggregatable) property of `target`. Returns how many were copied.
pub fn copy_properties(rt: &Runtime, source: &Value, target: &mut Instance) -> Result<usize> {
    let target_desc = rt
        .descriptor(target.type_key())?
        .ok_or_else(|| ActivationError::UnknownType(target.type_key().name().to_string()))?;
    let pairs: Vec<(String, Value)> = properties_of(rt, source)?
        .into_iter()
        .filter(|(k, _)| {
            target_desc
                .property(k)
                .is_some_and(|p| p.can_write() || p.can_add())
        })
        .collect();
    let copied = pairs.len();
    rt.initialize(target, pairs)?;
    Ok(copied)
}
