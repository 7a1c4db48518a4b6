//! HiGHS backend, linked through the `highs` crate.
//!
//! Native codes are the `HighsModelStatus` variant names. Passthrough
//! options are forwarded verbatim to `Highs_setOption`, so any HiGHS option
//! name is accepted; the value type must match what HiGHS expects.

use super::{RawOutcome, SolveRequest, SolverBackend};
use highs::{RowProblem, Sense as HighsSense};
use hts_core::{LinearModel, Sense, VarKind};
use hts_solver_common::{BackendId, OptionValue, SolverError, SolverResult};
use std::collections::BTreeMap;
use tracing::{debug, warn};

const NATIVE_CODES: &[&str] = &[
    "NotSet",
    "LoadError",
    "ModelError",
    "PresolveError",
    "SolveError",
    "PostsolveError",
    "ModelEmpty",
    "Optimal",
    "Infeasible",
    "UnboundedOrInfeasible",
    "Unbounded",
    "ObjectiveBound",
    "ObjectiveTarget",
    "ReachedTimeLimit",
    "ReachedIterationLimit",
    "Unknown",
];

/// Options the engine sets itself from `SolveOptions`.
const RESERVED: &[&str] = &["time_limit", "mip_rel_gap", "output_flag"];

/// Accepted violation for a primal returned with a non-optimal status.
const ACCEPT_TOL: f64 = 1e-6;

#[derive(Debug, Default, Clone, Copy)]
pub struct HighsBackend;

impl HighsBackend {
    pub fn new() -> Self {
        Self
    }

    /// Solve a one-column problem to confirm the native library loads.
    pub fn probe() -> Result<Self, String> {
        let mut pb = RowProblem::default();
        let x = pb.add_column(1.0, 0.0..=1.0);
        pb.add_row(0.5.., [(x, 1.0)]);
        let mut model = pb.optimise(HighsSense::Minimise);
        model.set_option("output_flag", false);
        let solved = model
            .try_solve()
            .map_err(|status| format!("HiGHS probe failed: {status:?}"))?;
        match format!("{:?}", solved.status()).as_str() {
            "Optimal" => Ok(Self),
            other => Err(format!("HiGHS probe returned {other}")),
        }
    }
}

impl SolverBackend for HighsBackend {
    fn id(&self) -> BackendId {
        BackendId::Highs
    }

    fn native_codes(&self) -> &'static [&'static str] {
        NATIVE_CODES
    }

    fn supports_duals(&self) -> bool {
        true
    }

    fn supports_conflict(&self) -> bool {
        true
    }

    fn check_options(&self, options: &BTreeMap<String, OptionValue>) -> SolverResult<()> {
        for (key, value) in options {
            if RESERVED.contains(&key.as_str()) {
                return Err(SolverError::InvalidOptions(format!(
                    "option '{key}' is controlled by the solve options; set it there instead"
                )));
            }
            if let OptionValue::Int(i) = value {
                if i32::try_from(*i).is_err() {
                    return Err(SolverError::InvalidOptions(format!(
                        "option '{key}' value {i} does not fit a HiGHS integer"
                    )));
                }
            }
        }
        Ok(())
    }

    fn solve(&self, model: &LinearModel, request: &SolveRequest<'_>) -> SolverResult<RawOutcome> {
        self.check_options(request.options)?;

        let mut pb = RowProblem::default();
        let mut cols = Vec::with_capacity(model.num_variables());
        for (id, v) in model.var_ids().zip(model.variables()) {
            let (lo, hi) = model.effective_bounds(id);
            if lo > hi {
                return Ok(RawOutcome::with_code("Infeasible"));
            }
            let col = if v.kind == VarKind::Continuous {
                pb.add_column(v.objective, lo..=hi)
            } else {
                pb.add_integer_column(v.objective, lo..=hi)
            };
            cols.push(col);
        }
        for c in model.constraints() {
            let factors: Vec<_> = c.terms.iter().map(|t| (cols[t.var.0], t.coef)).collect();
            match c.sense {
                Sense::Le => pb.add_row(..=c.rhs, factors),
                Sense::Ge => pb.add_row(c.rhs.., factors),
                Sense::Eq => pb.add_row(c.rhs..=c.rhs, factors),
            }
        }

        let mut highs = pb.optimise(HighsSense::Minimise);
        highs.set_option("output_flag", request.verbosity >= 2);
        highs.set_option("time_limit", request.remaining().as_secs_f64());
        highs.set_option("mip_rel_gap", request.mip_gap);
        for (key, value) in request.options {
            match value {
                OptionValue::Bool(b) => highs.set_option(key.as_str(), *b),
                OptionValue::Int(i) => {
                    let i = i32::try_from(*i).map_err(|_| {
                        SolverError::InvalidOptions(format!("option '{key}' out of range"))
                    })?;
                    highs.set_option(key.as_str(), i)
                }
                OptionValue::Float(f) => highs.set_option(key.as_str(), *f),
                OptionValue::Str(s) => highs.set_option(key.as_str(), s.as_str()),
            }
        }

        let solved = match highs.try_solve() {
            Ok(solved) => solved,
            Err(status) => {
                warn!(status = ?status, "HiGHS run failed");
                return Ok(RawOutcome::with_code("SolveError"));
            }
        };
        let code = format!("{:?}", solved.status());
        debug!(code = %code, "HiGHS finished");

        let mut outcome = RawOutcome::with_code(code.as_str());
        if matches!(
            code.as_str(),
            "Optimal" | "ModelEmpty" | "ObjectiveBound" | "ObjectiveTarget" | "ReachedTimeLimit" | "ReachedIterationLimit"
        ) {
            let solution = solved.get_solution();
            let x = solution.columns().to_vec();
            let usable = x.len() == model.num_variables()
                && (code == "Optimal"
                    || code == "ModelEmpty"
                    || model.max_violation(&x) <= ACCEPT_TOL);
            if usable {
                outcome.objective = Some(model.objective_value(&x));
                outcome.primal = Some(x);
                if code == "Optimal" && model.free_integer_count() == 0 {
                    outcome.duals = Some(solution.dual_rows().to_vec());
                }
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hts_core::{EntryKey, Term};
    use std::time::Duration;

    fn dispatch() -> LinearModel {
        let mut m = LinearModel::new("dispatch");
        let g1 = m.add_variable("generation", EntryKey::new("g1", 0), VarKind::Continuous, 0.0, 80.0, 10.0);
        let g2 = m.add_variable("generation", EntryKey::new("g2", 0), VarKind::Continuous, 0.0, 100.0, 30.0);
        m.add_constraint(
            "market_balance",
            EntryKey::new("z", 0),
            vec![Term::new(g1, 1.0), Term::new(g2, 1.0)],
            Sense::Eq,
            100.0,
        )
        .unwrap();
        m
    }

    #[test]
    fn probe_succeeds() {
        assert!(HighsBackend::probe().is_ok());
    }

    #[test]
    fn lp_duals_are_marginal_costs() {
        let options = BTreeMap::new();
        let request = SolveRequest::new(Duration::from_secs(10), &options);
        let out = HighsBackend.solve(&dispatch(), &request).unwrap();
        assert_eq!(out.code, "Optimal");
        assert!((out.objective.unwrap() - 1400.0).abs() < 1e-6);
        assert!((out.duals.unwrap()[0] - 30.0).abs() < 1e-6);
    }

    #[test]
    fn reserved_options_rejected() {
        let mut options = BTreeMap::new();
        options.insert("time_limit".to_string(), OptionValue::Float(1.0));
        assert!(HighsBackend.check_options(&options).is_err());
    }

    #[test]
    fn every_code_is_mapped() {
        for code in HighsBackend.native_codes() {
            assert!(hts_solver_common::SolveStatus::lookup(BackendId::Highs, code).is_some());
        }
    }
}
