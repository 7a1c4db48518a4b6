//! Single entry point tying registry, pricing and extraction together.

use crate::backend::SolverBackend;
use crate::diagnose::{diagnose_with, IisResult};
use crate::extract::{cost_breakdown, CostParameters};
use crate::log::SolveLog;
use crate::pricing::{PricingCoordinator, TwoStageResult};
use crate::registry::SolverRegistry;
use hts_core::LinearModel;
use hts_solver_common::{SolveOptions, SolverResult};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Validates options, resolves the backend and runs the two-stage solve.
///
/// `Orchestrator::default()` uses the process-wide registry; tests and
/// embedders inject their own with [`Orchestrator::new`].
#[derive(Clone)]
pub struct Orchestrator {
    registry: Arc<SolverRegistry>,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(SolverRegistry::global())
    }
}

impl Orchestrator {
    pub fn new(registry: Arc<SolverRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SolverRegistry {
        &self.registry
    }

    /// Resolve the requested backend, falling back to builtin when allowed.
    ///
    /// On fallback the passthrough options are dropped: they were written
    /// for the backend that is missing.
    fn select<'o>(
        &self,
        options: &'o SolveOptions,
    ) -> SolverResult<(Arc<dyn SolverBackend>, Cow<'o, SolveOptions>)> {
        match self.registry.resolve(options.backend) {
            Ok(backend) => Ok((backend, Cow::Borrowed(options))),
            Err(err) if options.fallback_to_default => {
                let fallback = self.registry.default_backend();
                warn!(
                    requested = %options.backend,
                    using = %fallback.id(),
                    reason = %err,
                    "requested backend unavailable, falling back"
                );
                let mut effective = options.clone().with_backend(fallback.id());
                if !effective.backend_options.is_empty() {
                    warn!(
                        count = effective.backend_options.len(),
                        "dropping passthrough options of the unavailable backend"
                    );
                    effective.backend_options = BTreeMap::new();
                }
                Ok((fallback, Cow::Owned(effective)))
            }
            Err(err) => Err(err),
        }
    }

    /// Solve `model` with commitment and, unless disabled, pricing.
    ///
    /// Configuration problems are errors; every solver outcome, including
    /// infeasibility, is reported in the returned statuses. The model's fix
    /// state is the same on return as on entry.
    pub fn solve(&self, model: &mut LinearModel, options: &SolveOptions) -> SolverResult<TwoStageResult> {
        options.validate()?;
        model.validate()?;
        let (backend, effective) = self.select(options)?;

        let mut log = SolveLog::create(&effective)?;
        log.event(
            "solve_start",
            &[
                ("model", model.name().to_string()),
                ("backend", backend.id().to_string()),
                ("requested", options.backend.to_string()),
                ("variables", model.num_variables().to_string()),
                ("constraints", model.num_constraints().to_string()),
                ("free_integers", model.free_integer_count().to_string()),
                ("time_limit_s", effective.time_limit_seconds.to_string()),
                ("mip_gap", effective.mip_gap.to_string()),
                ("pricing", effective.pricing.to_string()),
            ],
        );
        if effective.verbosity >= 1 {
            info!(
                model = model.name(),
                backend = %backend.id(),
                variables = model.num_variables(),
                constraints = model.num_constraints(),
                "solving"
            );
        }

        let mut result = PricingCoordinator::new(backend.as_ref(), &effective).run(model, &mut log)?;

        let params = CostParameters::from_objective(model, &effective.cost_categories);
        result.costs = cost_breakdown(&result.commitment, &params);
        log.event("costs", &[("total", result.costs.total.to_string())]);
        Ok(result)
    }

    /// Conflict search on a model whose last solve was infeasible.
    pub fn diagnose(&self, model: &LinearModel, options: &SolveOptions) -> IisResult {
        diagnose_with(&self.registry, model, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hts_core::{EntryKey, Sense, Term, VarKind};
    use hts_solver_common::{BackendId, SolveStatus, SolverError};

    fn model() -> LinearModel {
        let mut m = LinearModel::new("one-bus");
        let g = m.add_variable("generation", EntryKey::new("g1", 0), VarKind::Continuous, 0.0, 150.0, 25.0);
        m.add_constraint("market_balance", EntryKey::new("z", 0), vec![Term::new(g, 1.0)], Sense::Eq, 100.0)
            .unwrap();
        m
    }

    #[test]
    fn falls_back_when_backend_missing() {
        let dir = tempfile::tempdir().unwrap();
        let orch = Orchestrator::new(Arc::new(SolverRegistry::new()));
        let options = SolveOptions::default()
            .with_backend(BackendId::Highs)
            .with_option("threads", 4i64)
            .with_log_dir(dir.path());
        let r = orch.solve(&mut model(), &options).unwrap();
        assert_eq!(r.commitment.termination.backend, BackendId::Builtin);
        assert_eq!(r.commitment.status, SolveStatus::Optimal);
    }

    #[test]
    fn no_fallback_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let orch = Orchestrator::new(Arc::new(SolverRegistry::new()));
        let options = SolveOptions::default()
            .with_backend(BackendId::Highs)
            .with_fallback(false)
            .with_log_dir(dir.path());
        let err = orch.solve(&mut model(), &options).unwrap_err();
        assert!(matches!(err, SolverError::BackendUnavailable { .. }));
        assert!(err.to_string().contains("solver-highs"));
    }

    #[test]
    fn invalid_options_rejected_before_solving() {
        let dir = tempfile::tempdir().unwrap();
        let orch = Orchestrator::new(Arc::new(SolverRegistry::new()));
        let options = SolveOptions::default().with_time_limit(-1.0).with_log_dir(dir.path());
        assert!(matches!(
            orch.solve(&mut model(), &options),
            Err(SolverError::InvalidOptions(_))
        ));
        // nothing was logged
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn costs_match_objective() {
        let dir = tempfile::tempdir().unwrap();
        let orch = Orchestrator::new(Arc::new(SolverRegistry::new()));
        let options = SolveOptions::default()
            .with_cost_category("fuel", ["generation"])
            .with_log_dir(dir.path());
        let r = orch.solve(&mut model(), &options).unwrap();
        let objective = r.commitment.objective.unwrap();
        assert!((r.costs.total - objective).abs() <= 1e-6 * objective.abs());
        assert!(r.costs.component("fuel").is_some());
        assert!(r.log_file.as_ref().unwrap().starts_with(dir.path()));
    }
}
