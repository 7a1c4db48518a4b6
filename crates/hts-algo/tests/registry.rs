//! Backend resolution through the orchestrator.

mod common;

use hts_algo::backend::SolverBackend;
use hts_algo::{BuiltinBackend, Orchestrator, SolveStatus, SolverError, SolverRegistry};
use hts_solver_common::status::STATUS_TABLE;
use hts_solver_common::{BackendId, SolveOptions};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn counting_registry(ok: bool) -> (SolverRegistry, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let mut registry = SolverRegistry::new();
    registry.register(BackendId::Highs, move || {
        counter.fetch_add(1, Ordering::SeqCst);
        if ok {
            Ok(Arc::new(BuiltinBackend::new()) as Arc<dyn SolverBackend>)
        } else {
            Err("shared library not found".to_string())
        }
    });
    (registry, calls)
}

#[test]
fn failed_backend_loads_once_across_solves() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, calls) = counting_registry(false);
    let orch = Orchestrator::new(Arc::new(registry));
    let options = common::options(dir.path()).with_backend(BackendId::Highs);

    for _ in 0..3 {
        let mut model = common::hydrothermal();
        let result = orch.solve(&mut model, &options).unwrap();
        assert_eq!(result.commitment.termination.backend, BackendId::Builtin);
        assert_eq!(result.commitment.status, SolveStatus::Optimal);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn failed_backend_without_fallback_carries_reason() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, _) = counting_registry(false);
    let orch = Orchestrator::new(Arc::new(registry));
    let options = common::options(dir.path())
        .with_backend(BackendId::Highs)
        .with_fallback(false);

    let err = orch.solve(&mut common::hydrothermal(), &options).unwrap_err();
    match err {
        SolverError::BackendUnavailable { backend, hint } => {
            assert_eq!(backend, BackendId::Highs);
            assert!(hint.contains("shared library not found"));
            assert!(hint.contains("--features solver-highs"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn available_backend_is_used() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, calls) = counting_registry(true);
    let orch = Orchestrator::new(Arc::new(registry));
    assert!(orch.registry().is_available(BackendId::Highs));

    let options = SolveOptions::default()
        .with_backend(BackendId::Highs)
        .with_fallback(false)
        .with_log_dir(dir.path());
    let result = orch.solve(&mut common::hydrothermal(), &options).unwrap();
    assert_eq!(result.commitment.status, SolveStatus::Optimal);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn builtin_codes_are_all_mapped() {
    let backend = BuiltinBackend::new();
    for code in backend.native_codes() {
        assert!(
            SolveStatus::lookup(BackendId::Builtin, code).is_some(),
            "builtin code {code} has no mapping"
        );
    }
    let table_codes = STATUS_TABLE
        .iter()
        .filter(|(b, _, _)| *b == BackendId::Builtin)
        .count();
    assert_eq!(table_codes, backend.native_codes().len());
}

#[cfg(feature = "solver-microlp")]
#[test]
fn microlp_codes_are_all_mapped() {
    let backend = hts_algo::backend::microlp::MicrolpBackend::new();
    for code in backend.native_codes() {
        assert!(SolveStatus::lookup(BackendId::Microlp, code).is_some(), "{code}");
    }
}

#[cfg(feature = "solver-highs")]
#[test]
fn highs_codes_are_all_mapped() {
    let backend = hts_algo::backend::highs::HighsBackend::new();
    for code in backend.native_codes() {
        assert!(SolveStatus::lookup(BackendId::Highs, code).is_some(), "{code}");
    }
}
