//! Provider value sources: where a declared provider gets its value from.
use smallvec::SmallVec;
use std::{
    fmt,
    sync::{Arc, OnceLock},
};

use super::metadata::{Criteria, Member, Metadata};
use crate::{
    activation::{self, ActivationArgs},
    error::Result,
    name::QualifiedName,
    runtime::Runtime,
    service::ServiceProvider,
    types::{Constructor, TypeTable},
    value::{TypeKey, Value},
};

pub type FieldFn = Arc<dyn Fn() -> Value + Send + Sync>;

/// What a provider declaration points at.
#[derive(Clone)]
pub enum ProviderTarget {
    /// A described type, activated on demand.
    Type(TypeKey),
    /// A static value, read once.
    Field { name: String, get: FieldFn },
    /// A static factory method.
    Method { name: String, constructor: Constructor },
}

impl ProviderTarget {
    pub fn of_type<T: ?Sized + 'static>() -> Self {
        ProviderTarget::Type(TypeKey::of::<T>())
    }

    pub fn field(name: impl Into<String>, get: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        ProviderTarget::Field {
            name: name.into(),
            get: Arc::new(get),
        }
    }

    pub fn method(name: impl Into<String>, constructor: Constructor) -> Self {
        ProviderTarget::Method {
            name: name.into(),
            constructor,
        }
    }

    pub fn member(&self) -> Member {
        match self {
            ProviderTarget::Type(k) => Member::Type(*k),
            ProviderTarget::Field { name, .. } => Member::Field(name.clone()),
            ProviderTarget::Method { name, .. } => Member::Method(name.clone()),
        }
    }
}

impl fmt::Debug for ProviderTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.member(), f)
    }
}

#[derive(Clone, Debug)]
struct ProviderInfo {
    name: QualifiedName,
    provider_type: TypeKey,
    metadata: Metadata,
    member: Member,
    module: Option<String>,
}

#[derive(Clone)]
pub struct TypeSource {
    info: ProviderInfo,
    concrete: TypeKey,
    value: Arc<OnceLock<Value>>,
}

#[derive(Clone)]
pub struct FieldSource {
    info: ProviderInfo,
    get: FieldFn,
    value: Arc<OnceLock<Value>>,
}

#[derive(Clone)]
pub struct MethodSource {
    info: ProviderInfo,
    constructor: Constructor,
    value: Arc<OnceLock<Value>>,
}

/// Two or more sources answering to overlapping names.
#[derive(Clone)]
pub struct ComposedSource {
    items: Vec<ProviderValueSource>,
}

#[derive(Clone)]
pub enum ProviderValueSource {
    Type(TypeSource),
    Field(FieldSource),
    Method(MethodSource),
    Composed(ComposedSource),
}

impl ProviderValueSource {
    pub(crate) fn new(
        name: QualifiedName,
        root: TypeKey,
        target: ProviderTarget,
        metadata: Metadata,
        module: Option<String>,
    ) -> Self {
        let info = ProviderInfo {
            name,
            provider_type: root,
            metadata,
            member: target.member(),
            module,
        };
        let value = Arc::new(OnceLock::new());
        match target {
            ProviderTarget::Type(concrete) => ProviderValueSource::Type(TypeSource { info, concrete, value }),
            ProviderTarget::Field { get, .. } => ProviderValueSource::Field(FieldSource { info, get, value }),
            ProviderTarget::Method { constructor, .. } => ProviderValueSource::Method(MethodSource {
                info,
                constructor,
                value,
            }),
        }
    }

    fn info(&self) -> &ProviderInfo {
        match self {
            ProviderValueSource::Type(s) => &s.info,
            ProviderValueSource::Field(s) => &s.info,
            ProviderValueSource::Method(s) => &s.info,
            ProviderValueSource::Composed(c) => c.items[0].info(),
        }
    }

    /// Primary name.
    pub fn name(&self) -> &QualifiedName {
        &self.info().name
    }

    /// Every name this source answers to; a union for composed sources.
    pub fn names(&self) -> SmallVec<[&QualifiedName; 2]> {
        let mut out: SmallVec<[&QualifiedName; 2]> = SmallVec::new();
        match self {
            ProviderValueSource::Composed(c) => {
                for item in &c.items {
                    for n in item.names() {
                        if !out.contains(&n) {
                            out.push(n);
                        }
                    }
                }
            }
            _ => out.push(self.name()),
        }
        out
    }

    pub fn provider_type(&self) -> TypeKey {
        self.info().provider_type
    }

    pub fn metadata(&self) -> &Metadata {
        &self.info().metadata
    }

    pub fn member(&self) -> &Member {
        &self.info().member
    }

    pub fn module(&self) -> Option<&str> {
        self.info().module.as_deref()
    }

    /// Statically known type of the produced value.
    pub fn value_type(&self) -> Option<TypeKey> {
        match self {
            ProviderValueSource::Type(s) => Some(s.concrete),
            ProviderValueSource::Field(s) => s.value.get().map(Value::type_key),
            ProviderValueSource::Method(s) => s.value.get().map(Value::type_key),
            ProviderValueSource::Composed(c) => c.items[0].value_type(),
        }
    }

    pub fn precise_match(&self, member: &Member) -> bool {
        match self {
            ProviderValueSource::Composed(c) => c.items.iter().any(|s| s.precise_match(member)),
            _ => self.member() == member,
        }
    }

    pub fn is_match_local_name(&self, local_name: &str) -> bool {
        self.names().iter().any(|n| n.matches_local_name(local_name))
    }

    pub fn is_match_name(&self, name: &QualifiedName) -> bool {
        self.names().iter().any(|n| *n == name)
    }

    pub fn match_criteria(&self, criteria: &Criteria, table: &TypeTable) -> i32 {
        match self {
            ProviderValueSource::Composed(c) => c
                .items
                .iter()
                .map(|s| s.match_criteria(criteria, table))
                .max()
                .unwrap_or(0),
            _ => {
                let info = self.info();
                criteria.score(&info.member, info.module.as_deref(), &info.metadata, table)
            }
        }
    }

    /// A fresh value. Field sources always return their single value.
    pub fn activate(
        &self,
        rt: &Runtime,
        args: ActivationArgs,
        services: Option<&dyn ServiceProvider>,
    ) -> Result<Value> {
        match self {
            ProviderValueSource::Type(s) => rt.create_instance_with(s.concrete, args, services),
            ProviderValueSource::Field(s) => {
                if !args.is_empty() {
                    tracing::debug!(provider = %s.info.name, "field provider ignores activation arguments");
                }
                Ok(s.value.get_or_init(|| (s.get)()).clone())
            }
            ProviderValueSource::Method(s) => {
                let owner = s.info.name.to_string();
                activation::invoke_factory(rt, &owner, &s.constructor, args, services, true)
            }
            ProviderValueSource::Composed(c) => c.items[0].activate(rt, args, services),
        }
    }

    /// The memoized provider value. Created without post-activation providers,
    /// since those are themselves provider values.
    pub fn get_value(&self, rt: &Runtime) -> Result<Value> {
        let cell = match self {
            ProviderValueSource::Type(s) => &s.value,
            ProviderValueSource::Field(s) => return Ok(s.value.get_or_init(|| (s.get)()).clone()),
            ProviderValueSource::Method(s) => &s.value,
            ProviderValueSource::Composed(c) => return c.items[0].get_value(rt),
        };
        if let Some(v) = cell.get() {
            return Ok(v.clone());
        }
        let value = match self {
            ProviderValueSource::Type(s) => rt.create_provider_value(s.concrete)?,
            ProviderValueSource::Method(s) => {
                let owner = s.info.name.to_string();
                activation::invoke_factory(rt, &owner, &s.constructor, Vec::new(), None, false)?
            }
            _ => return Err(crate::error::ActivationError::Internal("unreachable provider source")),
        };
        // 并发首次取值时以先写入者为准
        Ok(cell.get_or_init(|| value).clone())
    }

    /// Folds `other` into this source, producing a composite.
    pub fn append_one(self, other: ProviderValueSource) -> ProviderValueSource {
        let mut items = match self {
            ProviderValueSource::Composed(c) => c.items,
            single => vec![single],
        };
        match other {
            ProviderValueSource::Composed(c) => items.extend(c.items),
            single => items.push(single),
        }
        ProviderValueSource::Composed(ComposedSource { items })
    }

    /// Same declaring member and same names: a re-declaration, not a new source.
    pub(crate) fn is_duplicate_of(&self, other: &ProviderValueSource) -> bool {
        match self {
            ProviderValueSource::Composed(c) => c.items.iter().any(|s| s.is_duplicate_of(other)),
            _ => self.member() == other.member() && self.names() == other.names(),
        }
    }

    pub(crate) fn shares_name_with(&self, other: &ProviderValueSource) -> bool {
        let theirs = other.names();
        self.names().iter().any(|n| theirs.contains(n))
    }
}

impl fmt::Debug for ProviderValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            ProviderValueSource::Type(_) => "Type",
            ProviderValueSource::Field(_) => "Field",
            ProviderValueSource::Method(_) => "Method",
            ProviderValueSource::Composed(_) => "Composed",
        };
        f.debug_struct("ProviderValueSource")
            .field("kind", &kind)
            .field("names", &self.names())
            .field("provider_type", &self.provider_type())
            .field("member", self.member())
            .finish()
    }
}
