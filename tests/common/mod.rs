#![allow(dead_code)]

use mmg_activator::{activation::ExceptionHandler, error::ActivationError, prelude::*};
use parking_lot::Mutex;
use std::sync::Arc;

/// Routes engine logs to the test harness output; safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Config that keeps the test binary's inventory modules out of the runtime.
pub fn isolated() -> RuntimeConfig {
    RuntimeConfig {
        use_inventory: false,
        ..RuntimeConfig::default()
    }
}

pub fn runtime_with(modules: Vec<Module>) -> Runtime {
    let mut builder = RuntimeBuilder::new(isolated());
    for m in modules {
        builder = builder.module(m);
    }
    builder.build().expect("runtime")
}

pub fn catalog_runtime(catalog: &Arc<ModuleCatalog>) -> Runtime {
    RuntimeBuilder::new(isolated())
        .loader(catalog.clone())
        .build()
        .expect("runtime")
}

/// Exception handler that keeps every message it is given.
#[derive(Default)]
pub struct Recorder {
    seen: Mutex<Vec<String>>,
}

impl Recorder {
    pub fn messages(&self) -> Vec<String> {
        self.seen.lock().clone()
    }
}

impl ExceptionHandler for Recorder {
    fn handle(&self, error: &ActivationError) {
        self.seen.lock().push(error.to_string());
    }
}
