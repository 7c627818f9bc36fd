use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{error::Result, module::DEFAULT_MODULE_EXTENSION};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Run one filesystem probe once every other module source is drained.
    pub probe: bool,
    pub probe_paths: Vec<PathBuf>,
    pub module_extension: String,
    /// Use the `inventory` loader when no loader is supplied.
    pub use_inventory: bool,
    /// Prefer `Builder` adapters during activation.
    pub use_builders: bool,
    /// Log swallowed activation diagnostics when no handler is supplied.
    pub log_diagnostics: bool,
}

pub const RUNTIME_DEFAULT_PROBE: bool = false;
pub const RUNTIME_DEFAULT_USE_BUILDERS: bool = true;

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            probe: RUNTIME_DEFAULT_PROBE,
            probe_paths: Vec::new(),
            module_extension: DEFAULT_MODULE_EXTENSION.to_string(),
            use_inventory: true,
            use_builders: RUNTIME_DEFAULT_USE_BUILDERS,
            log_diagnostics: false,
        }
    }
}

impl RuntimeConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}
// 配置只在构建运行时时读取一次；运行期不支持修改。
