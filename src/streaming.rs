//! Streaming sources: load described objects from text and save them back.
use std::{
    fmt::Write as _,
    path::{Path, PathBuf},
};

use crate::{
    error::{ActivationError, Result},
    properties::Properties,
    runtime::Runtime,
    template,
    value::{TypeKey, Value},
};

/// Reads and writes one text format.
pub trait StreamingSource: Send + Sync {
    fn load(&self, rt: &Runtime, text: &str, ty: TypeKey) -> Result<Value>;

    fn save(&self, rt: &Runtime, value: &Value) -> Result<String>;
}

/// JSON objects map onto property bags; scalars go through text conversion.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonStreamingSource;

impl StreamingSource for JsonStreamingSource {
    fn load(&self, rt: &Runtime, text: &str, ty: TypeKey) -> Result<Value> {
        let json: serde_json::Value = serde_json::from_str(text)?;
        match json {
            serde_json::Value::Object(map) => rt.create_instance(ty, Properties::from_json(&map)),
            serde_json::Value::String(s) => scalar(rt, &s, ty),
            other => scalar(rt, &other.to_string(), ty),
        }
    }

    fn save(&self, rt: &Runtime, value: &Value) -> Result<String> {
        let json = to_json(rt, value)?;
        Ok(serde_json::to_string_pretty(&json)?)
    }
}

fn scalar(rt: &Runtime, text: &str, ty: TypeKey) -> Result<Value> {
    rt.convert_text(text, ty)?
        .ok_or_else(|| ActivationError::Conversion {
            text: text.to_string(),
            target: ty.name().to_string(),
            source: anyhow::anyhow!("no text conversion for the target type"),
        })
}

macro_rules! json_scalar {
    ($value:expr, $($t:ty),*) => {
        $(if let Some(n) = $value.downcast_ref::<$t>() {
            return Ok(Some(serde_json::json!(n)));
        })*
    };
}

fn scalar_to_json(value: &Value) -> Result<Option<serde_json::Value>> {
    if let Some(s) = value.as_text() {
        return Ok(Some(serde_json::Value::String(s.to_string())));
    }
    json_scalar!(value, bool, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, char);
    if let Some(p) = value.downcast_ref::<PathBuf>() {
        return Ok(Some(serde_json::Value::String(p.display().to_string())));
    }
    if let Some(list) = value.downcast_ref::<Vec<String>>() {
        return Ok(Some(serde_json::json!(list)));
    }
    Ok(None)
}

fn bag_to_json(rt: &Runtime, props: &Properties) -> Result<serde_json::Value> {
    let mut map = serde_json::Map::new();
    for (k, v) in props.iter() {
        match to_json(rt, v) {
            Ok(j) => {
                map.insert(k.to_string(), j);
            }
            Err(e) => tracing::debug!(property = %k, error = %e, "property skipped while saving"),
        }
    }
    Ok(serde_json::Value::Object(map))
}

/// JSON rendering of scalars, lists, bags and described objects.
pub fn to_json(rt: &Runtime, value: &Value) -> Result<serde_json::Value> {
    if let Some(j) = scalar_to_json(value)? {
        return Ok(j);
    }
    if let Some(props) = value.downcast_ref::<Properties>() {
        return bag_to_json(rt, props);
    }
    if let Some(items) = value.downcast_ref::<Vec<Value>>() {
        return items
            .iter()
            .map(|v| to_json(rt, v))
            .collect::<Result<Vec<_>>>()
            .map(serde_json::Value::Array);
    }
    let props = template::properties_of(rt, value)?;
    bag_to_json(rt, &props)
}

/// `key = value` lines; `#` and `!` start comments.
#[derive(Debug, Default, Clone, Copy)]
pub struct PropertiesStreamingSource;

impl PropertiesStreamingSource {
    pub fn parse(text: &str) -> Properties {
        let mut props = Properties::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let (key, value) = match line.split_once(['=', ':']) {
                Some((k, v)) => (k.trim(), v.trim()),
                None => (line, ""),
            };
            if !key.is_empty() {
                props.set(key, value);
            }
        }
        props
    }
}

impl StreamingSource for PropertiesStreamingSource {
    fn load(&self, rt: &Runtime, text: &str, ty: TypeKey) -> Result<Value> {
        rt.create_instance(ty, Self::parse(text))
    }

    fn save(&self, rt: &Runtime, value: &Value) -> Result<String> {
        let props = template::properties_of(rt, value)?;
        let mut out = String::new();
        for (k, v) in props.iter() {
            let text = match scalar_to_json(v)? {
                Some(serde_json::Value::String(s)) => s,
                Some(j @ (serde_json::Value::Bool(_) | serde_json::Value::Number(_))) => j.to_string(),
                _ => {
                    tracing::debug!(property = %k, "non-scalar property skipped while saving");
                    continue;
                }
            };
            // String 写入不会失败
            let _ = writeln!(out, "{k}={text}");
        }
        Ok(out)
    }
}

/// Where text comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamSource {
    Text(String),
    File(PathBuf),
    /// `file://` and `data:` URIs.
    Uri(String),
}

enum Resolved<'a> {
    Inline(&'a str),
    Path(PathBuf),
}

impl StreamSource {
    pub fn file(path: impl AsRef<Path>) -> Self {
        StreamSource::File(path.as_ref().to_path_buf())
    }

    fn resolve(&self) -> Result<Resolved<'_>> {
        match self {
            StreamSource::Text(t) => Ok(Resolved::Inline(t)),
            StreamSource::File(p) => Ok(Resolved::Path(p.clone())),
            StreamSource::Uri(uri) => {
                if let Some(path) = uri.strip_prefix("file://") {
                    return Ok(Resolved::Path(PathBuf::from(path)));
                }
                if let Some(rest) = uri.strip_prefix("data:") {
                    let (meta, data) = rest
                        .split_once(',')
                        .ok_or_else(|| ActivationError::UnsupportedUri(uri.clone()))?;
                    if meta.ends_with(";base64") {
                        return Err(ActivationError::UnsupportedUri(uri.clone()));
                    }
                    return Ok(Resolved::Inline(data));
                }
                Err(ActivationError::UnsupportedUri(uri.clone()))
            }
        }
    }

    pub fn read_to_string(&self) -> Result<String> {
        match self.resolve()? {
            Resolved::Inline(t) => Ok(t.to_string()),
            Resolved::Path(p) => Ok(std::fs::read_to_string(p)?),
        }
    }

    pub async fn read_to_string_async(&self) -> Result<String> {
        match self.resolve()? {
            Resolved::Inline(t) => Ok(t.to_string()),
            Resolved::Path(p) => Ok(tokio::fs::read_to_string(p).await?),
        }
    }

    /// Lowercase file extension, or the content type's subtype for data URIs.
    pub fn extension(&self) -> Option<String> {
        match self {
            StreamSource::Text(_) => None,
            StreamSource::File(p) => p
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase),
            StreamSource::Uri(uri) => {
                if let Some(path) = uri.strip_prefix("file://") {
                    return Path::new(path)
                        .extension()
                        .and_then(|e| e.to_str())
                        .map(str::to_ascii_lowercase);
                }
                let meta = uri.strip_prefix("data:")?.split(',').next()?;
                let mime = meta.split(';').next()?;
                let subtype = mime.rsplit('/').next()?;
                (!subtype.is_empty()).then(|| subtype.to_ascii_lowercase())
            }
        }
    }
}
