//! Registry of compiled-in solver backends.
//!
//! Optional backends are loaded lazily. Each one has a loader closure and a
//! write-once slot: the first `is_available` or `resolve` call runs the
//! loader, and every later call reads the cached outcome, success or
//! failure. A failed load is logged once and never retried.

use crate::backend::{BuiltinBackend, SolverBackend};
use hts_solver_common::{BackendId, SolverError, SolverResult};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, OnceLock};
use tracing::{debug, warn};

type Loader = Box<dyn Fn() -> Result<Arc<dyn SolverBackend>, String> + Send + Sync>;

struct Entry {
    loader: Loader,
    slot: OnceLock<Result<Arc<dyn SolverBackend>, String>>,
}

impl Entry {
    fn new(loader: Loader) -> Self {
        Self {
            loader,
            slot: OnceLock::new(),
        }
    }

    fn load(&self, id: BackendId) -> &Result<Arc<dyn SolverBackend>, String> {
        self.slot.get_or_init(|| {
            debug!(backend = %id, "loading solver backend");
            let outcome = (self.loader)();
            if let Err(reason) = &outcome {
                warn!(
                    backend = %id,
                    reason = %reason,
                    hint = %id.install_hint(),
                    "solver backend failed to load"
                );
            }
            outcome
        })
    }
}

/// Capabilities of one backend, as reported by [`SolverRegistry::list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendInfo {
    pub id: BackendId,
    pub description: &'static str,
    pub compiled: bool,
    pub available: bool,
    pub duals: bool,
    pub conflict: bool,
    pub warm_start: bool,
    pub hint: Option<String>,
}

/// Holds the backends this build can run.
///
/// Create with [`SolverRegistry::with_compiled_backends`] for everything the
/// enabled Cargo features provide, or [`SolverRegistry::new`] for a registry
/// with only the builtin backend, then [`register`](Self::register) custom
/// loaders.
pub struct SolverRegistry {
    builtin: Arc<dyn SolverBackend>,
    entries: HashMap<BackendId, Entry>,
    /// Backends already reported as not compiled in.
    absent: Mutex<HashSet<BackendId>>,
}

impl Default for SolverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SolverRegistry {
    /// Registry holding only the builtin backend.
    pub fn new() -> Self {
        Self {
            builtin: Arc::new(BuiltinBackend::new()),
            entries: HashMap::new(),
            absent: Mutex::new(HashSet::new()),
        }
    }

    /// Registry with a loader for every backend compiled into this build.
    pub fn with_compiled_backends() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();
        #[cfg(feature = "solver-microlp")]
        registry.register(BackendId::Microlp, || {
            Ok(Arc::new(crate::backend::microlp::MicrolpBackend::new()) as Arc<dyn SolverBackend>)
        });
        #[cfg(feature = "solver-highs")]
        registry.register(BackendId::Highs, || {
            crate::backend::highs::HighsBackend::probe()
                .map(|b| Arc::new(b) as Arc<dyn SolverBackend>)
        });
        registry
    }

    /// Process-wide registry, built on first use.
    pub fn global() -> Arc<SolverRegistry> {
        static GLOBAL: OnceLock<Arc<SolverRegistry>> = OnceLock::new();
        GLOBAL
            .get_or_init(|| Arc::new(SolverRegistry::with_compiled_backends()))
            .clone()
    }

    /// Register a loader for `id`. The loader runs at most once.
    ///
    /// Registering `Builtin` is ignored: the builtin backend cannot be replaced.
    pub fn register<F>(&mut self, id: BackendId, loader: F)
    where
        F: Fn() -> Result<Arc<dyn SolverBackend>, String> + Send + Sync + 'static,
    {
        if id == BackendId::Builtin {
            debug!("ignoring registration for the builtin backend");
            return;
        }
        self.entries.insert(id, Entry::new(Box::new(loader)));
    }

    pub fn is_compiled(&self, id: BackendId) -> bool {
        id == BackendId::Builtin || self.entries.contains_key(&id)
    }

    /// Whether `id` can be resolved. Triggers the one-time load; a backend
    /// missing from this build is logged once with its install hint.
    pub fn is_available(&self, id: BackendId) -> bool {
        if id == BackendId::Builtin {
            return true;
        }
        match self.entries.get(&id) {
            Some(entry) => entry.load(id).is_ok(),
            None => {
                self.note_absent(id);
                false
            }
        }
    }

    /// Warn about a backend that is not compiled in, the first time only.
    fn note_absent(&self, id: BackendId) -> bool {
        let mut absent = self.absent.lock().unwrap_or_else(|e| e.into_inner());
        let first = absent.insert(id);
        if first {
            warn!(
                backend = %id,
                hint = %id.install_hint(),
                "solver backend is not compiled into this build"
            );
        }
        first
    }

    pub fn resolve(&self, id: BackendId) -> SolverResult<Arc<dyn SolverBackend>> {
        if id == BackendId::Builtin {
            return Ok(self.builtin.clone());
        }
        let Some(entry) = self.entries.get(&id) else {
            return Err(SolverError::BackendUnavailable {
                backend: id,
                hint: format!("It is not compiled into this build. {}", id.install_hint()),
            });
        };
        match entry.load(id) {
            Ok(backend) => Ok(backend.clone()),
            Err(reason) => Err(SolverError::BackendUnavailable {
                backend: id,
                hint: format!("{reason}. {}", id.install_hint()),
            }),
        }
    }

    pub fn default_backend(&self) -> Arc<dyn SolverBackend> {
        self.builtin.clone()
    }

    /// Every known backend with its state, in `BackendId` order.
    pub fn list(&self) -> Vec<BackendInfo> {
        BackendId::all()
            .iter()
            .map(|&id| {
                let backend = self.resolve(id).ok();
                BackendInfo {
                    id,
                    description: id.description(),
                    compiled: self.is_compiled(id),
                    available: backend.is_some(),
                    duals: backend.as_ref().is_some_and(|b| b.supports_duals()),
                    conflict: backend.as_ref().is_some_and(|b| b.supports_conflict()),
                    warm_start: backend.as_ref().is_some_and(|b| b.supports_warm_start()),
                    hint: backend.is_none().then(|| id.install_hint()),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn builtin_always_available() {
        let registry = SolverRegistry::new();
        assert!(registry.is_available(BackendId::Builtin));
        assert_eq!(registry.resolve(BackendId::Builtin).unwrap().id(), BackendId::Builtin);
    }

    #[test]
    fn missing_backend_has_rebuild_hint() {
        let registry = SolverRegistry::new();
        assert!(!registry.is_available(BackendId::Highs));
        let err = registry.resolve(BackendId::Highs).err().unwrap();
        assert!(matches!(err, SolverError::BackendUnavailable { backend: BackendId::Highs, .. }));
        assert!(err.to_string().contains("--features solver-highs"));
    }

    #[test]
    fn absent_backend_is_reported_once() {
        let registry = SolverRegistry::new();
        assert!(!registry.is_available(BackendId::Highs));
        assert!(!registry.is_available(BackendId::Highs));
        assert!(!registry.is_available(BackendId::Microlp));
        let absent = registry.absent.lock().unwrap();
        assert_eq!(absent.len(), 2);
        assert!(absent.contains(&BackendId::Highs));
        drop(absent);
        assert!(!registry.note_absent(BackendId::Highs));
    }

    #[test]
    fn loader_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut registry = SolverRegistry::new();
        registry.register(BackendId::Microlp, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(BuiltinBackend::new()) as Arc<dyn SolverBackend>)
        });
        assert!(registry.is_available(BackendId::Microlp));
        assert!(registry.is_available(BackendId::Microlp));
        assert!(registry.resolve(BackendId::Microlp).is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_load_is_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut registry = SolverRegistry::new();
        registry.register(BackendId::Highs, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err("libhighs not found".to_string())
        });
        assert!(!registry.is_available(BackendId::Highs));
        let err = registry.resolve(BackendId::Highs).err().unwrap();
        assert!(err.to_string().contains("libhighs not found"));
        assert!(!registry.is_available(BackendId::Highs));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn builtin_registration_is_ignored() {
        let mut registry = SolverRegistry::new();
        registry.register(BackendId::Builtin, || Err("nope".to_string()));
        assert!(registry.is_available(BackendId::Builtin));
    }

    #[test]
    fn list_reports_every_backend() {
        let list = SolverRegistry::new().list();
        assert_eq!(list.len(), BackendId::all().len());
        let builtin = &list[0];
        assert!(builtin.compiled && builtin.available && builtin.duals && builtin.conflict);
        assert!(builtin.hint.is_none());
        let highs = list.iter().find(|b| b.id == BackendId::Highs).unwrap();
        assert!(!highs.compiled);
        assert!(highs.hint.as_deref().unwrap().contains("solver-highs"));
    }
}
