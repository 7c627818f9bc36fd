pub mod activation;
pub mod adapter;
pub mod buffer;
pub mod builtin;
pub mod config;
pub mod error;
pub mod module;
pub mod name;
pub mod observer;
pub mod properties;
pub mod provider;
pub mod runtime;
pub mod service;
pub mod streaming;
pub mod template;
pub mod text;
pub mod types;
pub mod util;
pub mod value;

// 允许在本 crate 内通过 `mmg_activator::...` 自引用（供 derive 宏展开使用）
extern crate self as mmg_activator;

#[doc(hidden)]
pub use inventory;

pub mod prelude {
    pub use crate::activation::{ActivationProvider, ExceptionHandler, IntoActivationArgs};
    pub use crate::adapter::{AdapterFactory, AdapterRoleInfo, AdapterTable};
    pub use crate::config::RuntimeConfig;
    pub use crate::error::{ActivationError, Result};
    pub use crate::module::{Module, ModuleCatalog, ModuleLoader};
    pub use crate::name::{NamespaceUri, QualifiedName};
    pub use crate::properties::Properties;
    pub use crate::provider::{Criteria, Metadata, ProviderRegistrationContext, ProviderTarget};
    pub use crate::runtime::{Runtime, RuntimeBuilder};
    pub use crate::service::ServiceContainer;
    pub use crate::streaming::{StreamSource, StreamingSource};
    pub use crate::template::Template;
    pub use crate::types::{Args, Constructor, Describe, Param, Property, TypeDescriptor};
    pub use crate::value::{Instance, TypeKey, Value};
    pub use activator_macros::Describe;
}

pub use activator_macros::*;
// 运行时为显式上下文对象，不提供进程级全局实例
