//! Single solve attempt: one backend call, normalised into a [`SolveResult`].

use crate::backend::{SolveRequest, SolverBackend};
use crate::log::SolveLog;
use hts_core::{LastTermination, LinearModel};
use hts_solver_common::{RawTermination, SolveOptions, SolveResult, SolveStatus, SolverResult};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Run `backend` once on `model`.
///
/// Primal values are kept only for statuses that carry a solution, and
/// duals only for an `Optimal` continuous solve on a backend that reports
/// them. A limit status with no incumbent becomes `NotSolved`. The raw
/// termination and the solution vectors are recorded on the model.
pub fn execute(
    model: &mut LinearModel,
    backend: &dyn SolverBackend,
    options: &SolveOptions,
    warm_start: Option<&SolveResult>,
    log: &mut SolveLog,
) -> SolverResult<SolveResult> {
    backend.check_options(&options.backend_options)?;

    let initial = warm_start.map(|prior| warm_start_values(model, prior));
    if initial.is_some() && !backend.supports_warm_start() {
        debug!(backend = %backend.id(), "backend ignores warm start values");
    }

    let request = SolveRequest::new(options.time_limit(), &options.backend_options)
        .with_mip_gap(options.mip_gap)
        .with_verbosity(options.verbosity)
        .with_initial(initial.as_deref());

    let started = Instant::now();
    let raw = backend.solve(model, &request)?;
    let elapsed = started.elapsed().as_secs_f64();

    let termination = RawTermination::new(backend.id(), raw.code.as_str());
    let mut status = termination.status();

    let primal = raw
        .primal
        .filter(|x| status.has_solution() && x.len() == model.num_variables());
    if primal.is_none() {
        status = match status {
            SolveStatus::FeasibleNonOptimal => SolveStatus::NotSolved,
            SolveStatus::Optimal => {
                warn!(
                    backend = %backend.id(),
                    code = %raw.code,
                    "backend reported optimal without a solution vector"
                );
                SolveStatus::Error
            }
            other => other,
        };
    }

    let continuous = model.free_integer_count() == 0;
    let duals = raw.duals.filter(|y| {
        continuous
            && status == SolveStatus::Optimal
            && backend.supports_duals()
            && y.len() == model.num_constraints()
    });

    model.record_termination(LastTermination {
        backend: backend.id().to_string(),
        raw_code: raw.code.clone(),
        duals_valid: duals.is_some(),
    });

    let objective = primal
        .as_ref()
        .map(|x| raw.objective.unwrap_or_else(|| model.objective_value(x)));
    let values = primal
        .as_deref()
        .map(|x| model.variable_tables(x))
        .unwrap_or_default();
    let dual_tables = duals
        .as_deref()
        .map(|y| model.constraint_tables(y))
        .unwrap_or_default();
    model.record_solution(primal, duals);

    log.event(
        "termination",
        &[
            ("backend", backend.id().to_string()),
            ("code", raw.code.clone()),
            ("status", status.to_string()),
            ("objective", fmt_opt(objective)),
            ("elapsed_s", format!("{elapsed:.3}")),
        ],
    );
    if options.verbosity >= 1 {
        info!(
            backend = %backend.id(),
            status = %status,
            objective = ?objective,
            elapsed_s = elapsed,
            "solve finished"
        );
    }

    Ok(SolveResult {
        status,
        termination,
        objective,
        solve_time_seconds: elapsed,
        values,
        duals: dual_tables,
        log_file: Some(log.path().to_path_buf()),
        mip_gap: raw.mip_gap.filter(|_| objective.is_some()),
        nodes: raw.nodes,
    })
}

/// Per-variable initial values taken from a prior result by group and key.
pub fn warm_start_values(model: &LinearModel, prior: &SolveResult) -> Vec<Option<f64>> {
    model
        .variables()
        .iter()
        .map(|v| prior.values.get(&v.group).and_then(|t| t.get(&v.key)))
        .collect()
}

pub(crate) fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "none".to_string(), |v| v.to_string())
}
