//! Namespace-qualified names: the canonical identity of described types and providers.
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::ActivationError;

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NamespaceUri(String);

impl NamespaceUri {
    pub fn new(uri: impl Into<String>) -> Self {
        NamespaceUri(uri.into())
    }
    /// The empty namespace.
    pub fn none() -> Self {
        NamespaceUri(String::new())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn name(&self, local_name: impl Into<String>) -> QualifiedName {
        QualifiedName {
            namespace: self.clone(),
            local_name: local_name.into(),
        }
    }
}

impl fmt::Display for NamespaceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Namespace URI plus local name. Equality is exact; use
/// [`QualifiedName::matches_local_name`] for the case-insensitive local lookup.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QualifiedName {
    namespace: NamespaceUri,
    local_name: String,
}

impl QualifiedName {
    pub fn new(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        QualifiedName {
            namespace: NamespaceUri::new(namespace),
            local_name: local_name.into(),
        }
    }
    pub fn local(local_name: impl Into<String>) -> Self {
        NamespaceUri::none().name(local_name)
    }
    pub fn namespace(&self) -> &NamespaceUri {
        &self.namespace
    }
    pub fn local_name(&self) -> &str {
        &self.local_name
    }
    pub fn matches_local_name(&self, local_name: &str) -> bool {
        self.local_name.eq_ignore_ascii_case(local_name)
    }
    /// Same namespace, different local name.
    pub fn with_local_name(&self, local_name: impl Into<String>) -> Self {
        self.namespace.name(local_name)
    }
    /// Parses `{namespace}local` or a bare `local` name.
    pub fn parse(text: &str) -> Result<Self, ActivationError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ActivationError::EmptyArgument("name"));
        }
        match text.strip_prefix('{') {
            Some(rest) => {
                let (ns, local) = rest
                    .split_once('}')
                    .ok_or_else(|| ActivationError::InvalidName(text.to_string()))?;
                if local.is_empty() {
                    return Err(ActivationError::InvalidName(text.to_string()));
                }
                Ok(QualifiedName::new(ns, local))
            }
            None if text.contains(['{', '}']) => Err(ActivationError::InvalidName(text.to_string())),
            None => Ok(QualifiedName::local(text)),
        }
    }
}

impl FromStr for QualifiedName {
    type Err = ActivationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QualifiedName::parse(s)
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            f.write_str(&self.local_name)
        } else {
            write!(f, "{{{}}}{}", self.namespace, self.local_name)
        }
    }
}
