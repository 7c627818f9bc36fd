//! 框架统一错误类型：配置错误与歧义错误直接返回，逐项可恢复错误交给 `ExceptionHandler`。
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ActivationError {
    #[error("argument `{0}` must not be empty")]
    EmptyArgument(&'static str),
    #[error("invalid qualified name: {0}")]
    InvalidName(String),
    #[error("unknown type: {0}")]
    UnknownType(String),
    #[error("adapter role not defined: {0}")]
    AdapterRoleNotDefined(String),
    #[error("concrete class for {requested} is unusable: {returned} is abstract or not assignable")]
    ConcreteClass { requested: String, returned: String },
    #[error("cannot activate {0}: no activation constructor")]
    CannotActivateNoConstructor(String),
    #[error("cannot activate {0}: no activation constructor or builder")]
    CannotActivateNoConstructorOrBuilder(String),
    #[error("multiple providers of {root} match `{name}`")]
    MultipleProviders { root: String, name: String },
    #[error("multiple types match `{0}`")]
    AmbiguousType(String),
    #[error("missing argument `{param}` ({type_name}) for {owner}")]
    MissingArgument {
        owner: String,
        param: String,
        type_name: String,
    },
    #[error("argument `{param}` of {owner} expects {expected}, got {actual}")]
    ArgumentType {
        owner: String,
        param: String,
        expected: String,
        actual: String,
    },
    #[error("cannot convert {text:?} to {target}")]
    Conversion {
        text: String,
        target: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("no property `{property}` on {type_name}")]
    PropertyNotFound { type_name: String, property: String },
    #[error("property `{property}` on {type_name} is read-only")]
    PropertyReadOnly { type_name: String, property: String },
    #[error("failed to set property `{property}` on {type_name}")]
    PropertySet {
        type_name: String,
        property: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("construction of {type_name} failed")]
    Construction {
        type_name: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("activation provider failed on {type_name}")]
    ActivationProvider {
        type_name: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("provider registration in module `{module}` failed")]
    Registration {
        module: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("module `{name}` failed to load")]
    ModuleLoad {
        name: String,
        #[source]
        source: LoadError,
    },
    #[error("{from} cannot be viewed as {to}")]
    NotAssignable { from: String, to: String },
    #[error("no streaming source for {0}")]
    NoStreamingSource(String),
    #[error("unsupported uri: {0}")]
    UnsupportedUri(String),
    #[error(transparent)]
    Critical(#[from] CriticalError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("internal error: {0}")]
    Internal(&'static str),
}

impl ActivationError {
    /// Critical failures are never handed to an exception handler.
    pub fn is_critical(&self) -> bool {
        match self {
            ActivationError::Critical(_) => true,
            ActivationError::PropertySet { source, .. }
            | ActivationError::Construction { source, .. }
            | ActivationError::ActivationProvider { source, .. } => is_critical(source),
            _ => false,
        }
    }
}

/// Host-level module loading failures. The first three kinds only drop the
/// candidate during discovery; `Other` aborts the enumeration step.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("module not found: {0}")]
    NotFound(String),
    #[error("bad module image `{name}`: {reason}")]
    BadImage { name: String, reason: String },
    #[error("loading `{0}` denied")]
    Security(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LoadError {
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, LoadError::Other(_))
    }
}

/// Marker for failures that must propagate regardless of handler configuration
/// (the counterpart of out-of-memory or stack exhaustion).
#[derive(Debug, Error)]
#[error("critical failure: {0}")]
pub struct CriticalError(pub String);

pub fn is_critical(err: &anyhow::Error) -> bool {
    err.chain().any(|e| e.is::<CriticalError>())
}

pub type Result<T = ()> = std::result::Result<T, ActivationError>;
