//! Provider metadata and criteria scoring.
use std::fmt;

use crate::{types::TypeTable, value::TypeKey};

/// Identity of the member a provider was declared on.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Member {
    Type(TypeKey),
    Field(String),
    Method(String),
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Member::Type(k) => write!(f, "type {k}"),
            Member::Field(n) => write!(f, "field {n}"),
            Member::Method(n) => write!(f, "method {n}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum MetaValue {
    Json(serde_json::Value),
    Type(TypeKey),
}

impl MetaValue {
    /// Criteria-side match: equal JSON, or a candidate type assignable to the
    /// requested one.
    pub fn matches(&self, candidate: &MetaValue, table: &TypeTable) -> bool {
        match (self, candidate) {
            (MetaValue::Json(a), MetaValue::Json(b)) => a == b,
            (MetaValue::Type(want), MetaValue::Type(have)) => table.is_assignable(*want, *have),
            _ => false,
        }
    }
}

impl From<TypeKey> for MetaValue {
    fn from(k: TypeKey) -> Self {
        MetaValue::Type(k)
    }
}
impl From<serde_json::Value> for MetaValue {
    fn from(v: serde_json::Value) -> Self {
        MetaValue::Json(v)
    }
}
impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        MetaValue::Json(s.into())
    }
}
impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        MetaValue::Json(s.into())
    }
}
impl From<bool> for MetaValue {
    fn from(b: bool) -> Self {
        MetaValue::Json(b.into())
    }
}
impl From<i64> for MetaValue {
    fn from(n: i64) -> Self {
        MetaValue::Json(n.into())
    }
}
impl From<i32> for MetaValue {
    fn from(n: i32) -> Self {
        MetaValue::Json(n.into())
    }
}
impl From<u64> for MetaValue {
    fn from(n: u64) -> Self {
        MetaValue::Json(n.into())
    }
}

/// Criteria-matchable key/value metadata with case-insensitive keys.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Metadata {
    entries: Vec<(String, MetaValue)>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetaValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&key)) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetaValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Top-level members of a JSON object; other JSON values yield nothing.
    pub fn from_json(value: &serde_json::Value) -> Self {
        let mut m = Metadata::new();
        if let serde_json::Value::Object(map) = value {
            for (k, v) in map {
                m.insert(k.clone(), MetaValue::Json(v.clone()));
            }
        }
        m
    }
}

/// Shape a provider is scored against.
#[derive(Clone, Debug, Default)]
pub struct Criteria {
    member: Option<Member>,
    module: Option<String>,
    properties: Metadata,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn member(mut self, member: Member) -> Self {
        self.member = Some(member);
        self
    }
    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }
    pub fn with(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.properties.insert(key, value);
        self
    }
    pub fn is_empty(&self) -> bool {
        self.member.is_none() && self.module.is_none() && self.properties.is_empty()
    }

    /// One point for a matching member, one for a matching module, one per
    /// criteria property matching the candidate's metadata. Never negative.
    pub fn score(
        &self,
        member: &Member,
        module: Option<&str>,
        metadata: &Metadata,
        table: &TypeTable,
    ) -> i32 {
        let mut score = 0;
        if self.member.as_ref() == Some(member) {
            score += 1;
        }
        if let (Some(want), Some(have)) = (&self.module, module) {
            if want.eq_ignore_ascii_case(have) {
                score += 1;
            }
        }
        for (key, want) in self.properties.iter() {
            if metadata.get(key).is_some_and(|have| want.matches(have, table)) {
                score += 1;
            }
        }
        score
    }
}
