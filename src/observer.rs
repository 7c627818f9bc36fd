//! Incremental, repeatable discovery of modules.
use parking_lot::Mutex;
use std::{collections::HashSet, collections::VecDeque, fmt, sync::Arc};

use crate::{
    buffer::{Buffer, BufferCursor, Pending},
    error::{ActivationError, Result},
    module::{Module, ModuleLoader},
};

#[derive(Default)]
struct Discovery {
    // 已见过的模块名（小写），避免重复加载
    seen: HashSet<String>,
    references: VecDeque<String>,
}

impl Discovery {
    /// Records a module and defers its references.
    fn note(&mut self, module: &Module) {
        self.seen.insert(module.name().to_ascii_lowercase());
        for r in module.references() {
            if !self.seen.contains(&r.to_ascii_lowercase()) {
                self.references.push_back(r.clone());
            }
        }
    }

    fn next_reference(&mut self) -> Option<String> {
        while let Some(name) = self.references.pop_front() {
            if self.seen.insert(name.to_ascii_lowercase()) {
                return Some(name);
            }
        }
        None
    }
}

fn load_thunk(
    loader: Arc<dyn ModuleLoader>,
    state: Arc<Mutex<Discovery>>,
    name: String,
) -> Pending<Arc<Module>> {
    Pending::deferred(move || match loader.load(&name) {
        Ok(module) => {
            state.lock().note(&module);
            tracing::debug!(module = %module.name(), "referenced module loaded");
            Ok(Some(module))
        }
        Err(e) if e.is_recoverable() => {
            tracing::debug!(module = %name, error = %e, "module candidate dropped");
            Ok(None)
        }
        Err(source) => Err(ActivationError::ModuleLoad { name, source }),
    })
}

/// Primary source: the loader's snapshot of loaded modules (taken on first
/// poll, after the load-event subscription is in place), then deferred loads of
/// references as they are discovered. Never fused.
struct DiscoverySource {
    loaded: Option<std::vec::IntoIter<Arc<Module>>>,
    loader: Arc<dyn ModuleLoader>,
    state: Arc<Mutex<Discovery>>,
}

impl Iterator for DiscoverySource {
    type Item = Pending<Arc<Module>>;

    fn next(&mut self) -> Option<Self::Item> {
        let loader = &self.loader;
        let loaded = self
            .loaded
            .get_or_insert_with(|| loader.loaded_modules().into_iter());
        if let Some(module) = loaded.next() {
            self.state.lock().note(&module);
            return Some(Pending::Ready(module));
        }
        let name = self.state.lock().next_reference()?;
        Some(load_thunk(self.loader.clone(), self.state.clone(), name))
    }
}

/// Deduplicated, monotonically growing sequence of modules. Clones share the
/// same underlying buffer; every [`ModuleObserver::iter`] starts from the first
/// module discovered.
#[derive(Clone)]
pub struct ModuleObserver {
    buffer: Buffer<Arc<Module>>,
    state: Arc<Mutex<Discovery>>,
}

impl ModuleObserver {
    pub fn new(loader: Arc<dyn ModuleLoader>, probe: bool) -> Self {
        let state = Arc::new(Mutex::new(Discovery::default()));
        let source = DiscoverySource {
            loaded: None,
            loader: loader.clone(),
            state: state.clone(),
        };
        let mut buffer = Buffer::new(source, |a: &Arc<Module>, b: &Arc<Module>| a.is_named(b.name()));
        if probe {
            let loader = loader.clone();
            let state = state.clone();
            buffer = buffer.with_last_chance(move || {
                let names = loader.probe();
                tracing::debug!(candidates = names.len(), "probing for modules");
                let fresh: Vec<String> = {
                    let mut st = state.lock();
                    names
                        .into_iter()
                        .filter(|n| st.seen.insert(n.to_ascii_lowercase()))
                        .collect()
                };
                fresh
                    .into_iter()
                    .map(|n| load_thunk(loader.clone(), state.clone(), n))
                    .collect()
            });
        }
        let pusher = buffer.pusher();
        let events_state = state.clone();
        loader.subscribe(Box::new(move |module: Arc<Module>| {
            let st = events_state.clone();
            pusher.push_deferred(move || {
                st.lock().note(&module);
                Ok(Some(module))
            });
        }));
        ModuleObserver { buffer, state }
    }

    /// Queues a module handed over by the host. It is discovered ahead of the
    /// loader's modules and its references are loaded like any other's.
    pub fn add(&self, module: Arc<Module>) {
        let st = self.state.clone();
        self.buffer.push_deferred(move || {
            st.lock().note(&module);
            Ok(Some(module))
        });
    }

    pub fn iter(&self) -> ModuleCursor {
        ModuleCursor {
            inner: self.buffer.cursor(),
        }
    }

    /// Modules discovered so far, without pulling.
    pub fn discovered(&self) -> Vec<Arc<Module>> {
        self.buffer.snapshot()
    }

    /// Pulls every reachable module.
    pub fn fill(&self) -> Result<usize> {
        self.buffer.fill()
    }
}

impl fmt::Debug for ModuleObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleObserver")
            .field("discovered", &self.buffer.len())
            .finish()
    }
}

#[derive(Clone)]
pub struct ModuleCursor {
    inner: BufferCursor<Arc<Module>>,
}

impl ModuleCursor {
    pub fn position(&self) -> usize {
        self.inner.position()
    }
}

impl Iterator for ModuleCursor {
    type Item = Result<Arc<Module>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}
