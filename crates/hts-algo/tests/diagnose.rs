//! Conflict search on infeasible commitment models.

mod common;

use hts_algo::backend::{RawOutcome, SolveRequest, SolverBackend};
use hts_algo::{write_report, ConflictKind, IisStatus, Orchestrator, SolveStatus, SolverRegistry};
use hts_core::LinearModel;
use hts_solver_common::{BackendId, SolveOptions, SolverResult};
use std::sync::Arc;

fn orchestrator() -> Orchestrator {
    Orchestrator::new(Arc::new(SolverRegistry::new()))
}

#[test]
fn finds_balance_and_capacity_bound() {
    let dir = tempfile::tempdir().unwrap();
    let options = common::options(dir.path());
    let mut model = common::short_of_capacity();
    let orch = orchestrator();
    let result = orch.solve(&mut model, &options).unwrap();
    assert_eq!(result.commitment.status, SolveStatus::Infeasible);

    let iis = orch.diagnose(&model, &options);
    assert_eq!(iis.status, IisStatus::Found);
    assert_eq!(iis.conflicts.len(), 2, "{:?}", iis.conflicts);

    let balance = iis
        .conflicts
        .iter()
        .find(|c| c.kind == ConflictKind::Constraint)
        .unwrap();
    assert_eq!(balance.name, "market_balance[north,0]");
    assert_eq!(balance.expression, "generation[g1,0] == 1000");

    let bound = iis
        .conflicts
        .iter()
        .find(|c| c.kind == ConflictKind::UpperBound)
        .unwrap();
    assert_eq!(bound.name, "generation[g1,0]");
    assert_eq!(bound.bound, 150.0);
    assert_eq!(bound.expression, "generation[g1,0] <= 150");

    let report = dir.path().join("iis.txt");
    write_report(&iis, &report).unwrap();
    let text = std::fs::read_to_string(&report).unwrap();
    assert!(text.contains("conflicting items: 2"));
    assert!(text.contains("constraint market_balance[north,0]"));
    assert!(text.contains("TROUBLESHOOTING CHECKLIST"));
}

#[test]
fn diagnose_leaves_model_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let options = common::options(dir.path());
    let mut model = common::short_of_capacity();
    let orch = orchestrator();
    orch.solve(&mut model, &options).unwrap();

    let fixes = model.fix_state();
    let termination = model.last_termination().cloned();
    orch.diagnose(&model, &options);
    assert_eq!(model.fix_state(), fixes);
    assert_eq!(model.last_termination().cloned(), termination);
}

#[test]
fn feasible_model_is_not_infeasible() {
    let dir = tempfile::tempdir().unwrap();
    let options = common::options(dir.path());
    let mut model = common::hydrothermal();
    let orch = orchestrator();
    orch.solve(&mut model, &options).unwrap();

    let iis = orch.diagnose(&model, &options);
    assert_eq!(iis.status, IisStatus::NotInfeasible);
    assert!(iis.conflicts.is_empty());
}

#[test]
fn unsolved_model_is_not_infeasible() {
    let dir = tempfile::tempdir().unwrap();
    let iis = orchestrator().diagnose(&common::short_of_capacity(), &common::options(dir.path()));
    assert_eq!(iis.status, IisStatus::NotInfeasible);
    assert!(iis.note.unwrap().contains("not been solved"));
}

#[test]
fn exhausted_budget_reports_not_supported() {
    let dir = tempfile::tempdir().unwrap();
    let mut model = common::short_of_capacity();
    let orch = orchestrator();
    orch.solve(&mut model, &common::options(dir.path())).unwrap();

    let tight = common::options(dir.path()).with_time_limit(1e-9);
    let iis = orch.diagnose(&model, &tight);
    assert_eq!(iis.status, IisStatus::NotSupportedByBackend);
    assert!(iis.conflicts.is_empty());
    assert!(iis.note.unwrap().contains("time budget"));
}

/// Reports every model infeasible and offers no conflict search.
struct AlwaysInfeasible;

impl SolverBackend for AlwaysInfeasible {
    fn id(&self) -> BackendId {
        BackendId::Microlp
    }
    fn native_codes(&self) -> &'static [&'static str] {
        &["infeasible"]
    }
    fn supports_duals(&self) -> bool {
        false
    }
    fn solve(&self, _model: &LinearModel, _request: &SolveRequest<'_>) -> SolverResult<RawOutcome> {
        Ok(RawOutcome::with_code("infeasible"))
    }
}

#[test]
fn backend_without_conflict_search() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = SolverRegistry::new();
    registry.register(BackendId::Microlp, || {
        Ok(Arc::new(AlwaysInfeasible) as Arc<dyn SolverBackend>)
    });
    let orch = Orchestrator::new(Arc::new(registry));
    let options = SolveOptions::default()
        .with_backend(BackendId::Microlp)
        .with_fallback(false)
        .with_log_dir(dir.path());

    let mut model = common::short_of_capacity();
    let result = orch.solve(&mut model, &options).unwrap();
    assert_eq!(result.commitment.status, SolveStatus::Infeasible);

    let iis = orch.diagnose(&model, &options);
    assert_eq!(iis.status, IisStatus::NotSupportedByBackend);
    assert!(iis.note.unwrap().contains("microlp"));
}
