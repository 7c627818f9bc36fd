//! Text conversion: turns string inputs into typed values for parameters and properties.
use std::{any::TypeId, collections::HashMap, fmt::Display, path::PathBuf, str::FromStr};

use crate::{
    error::{ActivationError, Result},
    name::QualifiedName,
    value::{TypeKey, Value},
};

pub type ParseFn = fn(&str) -> anyhow::Result<Value>;

pub fn parse_from_str<T>(text: &str) -> anyhow::Result<Value>
where
    T: FromStr + Send + Sync + 'static,
    T::Err: Display,
{
    text.trim()
        .parse::<T>()
        .map(Value::new)
        .map_err(|e| anyhow::anyhow!("{e}"))
}

fn parse_string(text: &str) -> anyhow::Result<Value> {
    Ok(Value::text(text))
}

fn parse_path(text: &str) -> anyhow::Result<Value> {
    Ok(Value::new(PathBuf::from(text)))
}

/// Table of parsers keyed by target type. Types described with a custom
/// `from_text` parser are handled by the type table, not here.
#[derive(Clone)]
pub struct TextConversion {
    parsers: HashMap<TypeId, ParseFn>,
}

impl Default for TextConversion {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl TextConversion {
    pub fn empty() -> Self {
        TextConversion {
            parsers: HashMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut t = Self::empty();
        t.register_fn(TypeKey::of::<String>(), parse_string);
        t.register_fn(TypeKey::of::<PathBuf>(), parse_path);
        t.register::<bool>();
        t.register::<char>();
        t.register::<i8>();
        t.register::<i16>();
        t.register::<i32>();
        t.register::<i64>();
        t.register::<isize>();
        t.register::<u8>();
        t.register::<u16>();
        t.register::<u32>();
        t.register::<u64>();
        t.register::<usize>();
        t.register::<f32>();
        t.register::<f64>();
        t.register::<QualifiedName>();
        t
    }

    pub fn register<T>(&mut self)
    where
        T: FromStr + Send + Sync + 'static,
        T::Err: Display,
    {
        self.register_fn(TypeKey::of::<T>(), parse_from_str::<T>);
    }

    pub fn register_fn(&mut self, target: TypeKey, parse: ParseFn) {
        self.parsers.insert(target.id(), parse);
    }

    pub fn can_convert(&self, target: TypeKey) -> bool {
        self.parsers.contains_key(&target.id())
    }

    /// `Ok(None)` when no parser is known for `target`.
    pub fn convert(&self, text: &str, target: TypeKey) -> Result<Option<Value>> {
        match self.parsers.get(&target.id()) {
            None => Ok(None),
            Some(parse) => parse(text)
                .map(Some)
                .map_err(|source| ActivationError::Conversion {
                    text: text.to_string(),
                    target: target.name().to_string(),
                    source,
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_parse_trimmed_input() {
        let t = TextConversion::with_builtins();
        let v = t.convert(" 42 ", TypeKey::of::<i32>()).unwrap().unwrap();
        assert_eq!(v.downcast_ref::<i32>(), Some(&42));
        let b = t.convert("true", TypeKey::of::<bool>()).unwrap().unwrap();
        assert_eq!(b.downcast_ref::<bool>(), Some(&true));
    }

    #[test]
    fn unknown_target_is_not_an_error() {
        struct Opaque;
        let t = TextConversion::with_builtins();
        assert!(t.convert("x", TypeKey::of::<Opaque>()).unwrap().is_none());
    }

    #[test]
    fn parse_failure_reports_target() {
        let t = TextConversion::with_builtins();
        let err = t.convert("abc", TypeKey::of::<u8>()).unwrap_err();
        assert!(matches!(err, ActivationError::Conversion { ref target, .. } if target == "u8"));
    }
}
