//! microlp backend, driven through `good_lp`.
//!
//! microlp is a pure-Rust simplex with its own branch-and-bound. It reports
//! no duals, honours no time limit and accepts no passthrough options, so
//! its only native codes are the four `good_lp` outcomes below.

use super::{reject_unknown_options, RawOutcome, SolveRequest, SolverBackend};
use good_lp::solvers::microlp::microlp;
use good_lp::{
    constraint, variable, variables, Expression, ResolutionError, Solution, SolverModel, Variable,
};
use hts_core::{LinearModel, Sense, VarKind};
use hts_solver_common::{BackendId, OptionValue, SolverResult};
use std::collections::BTreeMap;
use tracing::debug;

const NATIVE_CODES: &[&str] = &["optimal", "infeasible", "unbounded", "error"];

#[derive(Debug, Default, Clone, Copy)]
pub struct MicrolpBackend;

impl MicrolpBackend {
    pub fn new() -> Self {
        Self
    }
}

impl SolverBackend for MicrolpBackend {
    fn id(&self) -> BackendId {
        BackendId::Microlp
    }

    fn native_codes(&self) -> &'static [&'static str] {
        NATIVE_CODES
    }

    fn supports_duals(&self) -> bool {
        false
    }

    fn check_options(&self, options: &BTreeMap<String, OptionValue>) -> SolverResult<()> {
        reject_unknown_options(BackendId::Microlp, options, &[])
    }

    fn solve(&self, model: &LinearModel, request: &SolveRequest<'_>) -> SolverResult<RawOutcome> {
        self.check_options(request.options)?;
        if request.verbosity >= 2 {
            debug!("microlp ignores the time limit and gap tolerance");
        }

        let mut vars = variables!();
        let mut handles: Vec<Variable> = Vec::with_capacity(model.num_variables());
        let mut objective = Expression::from(model.objective_offset());
        for (id, v) in model.var_ids().zip(model.variables()) {
            let (lo, hi) = model.effective_bounds(id);
            if lo > hi {
                return Ok(RawOutcome::with_code("infeasible"));
            }
            let mut def = variable();
            if lo.is_finite() {
                def = def.min(lo);
            }
            if hi.is_finite() {
                def = def.max(hi);
            }
            if v.kind != VarKind::Continuous {
                def = def.integer();
            }
            let handle = vars.add(def);
            objective += v.objective * handle;
            handles.push(handle);
        }

        let mut problem = vars.minimise(objective).using(microlp);
        for c in model.constraints() {
            let mut lhs = Expression::from(0.0);
            for term in &c.terms {
                lhs += term.coef * handles[term.var.0];
            }
            let rhs = c.rhs;
            problem = match c.sense {
                Sense::Le => problem.with(constraint!(lhs <= rhs)),
                Sense::Ge => problem.with(constraint!(lhs >= rhs)),
                Sense::Eq => problem.with(constraint!(lhs == rhs)),
            };
        }

        let outcome = match problem.solve() {
            Ok(solution) => {
                let x: Vec<f64> = handles.iter().map(|h| solution.value(*h)).collect();
                let mut out = RawOutcome::with_code("optimal");
                out.objective = Some(model.objective_value(&x));
                out.primal = Some(x);
                out
            }
            Err(ResolutionError::Infeasible) => RawOutcome::with_code("infeasible"),
            Err(ResolutionError::Unbounded) => RawOutcome::with_code("unbounded"),
            Err(err) => {
                debug!(error = %err, "microlp failed");
                RawOutcome::with_code("error")
            }
        };
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hts_core::{EntryKey, Term};
    use std::time::Duration;

    #[test]
    fn solves_integer_dispatch() {
        let mut m = LinearModel::new("units");
        let n = m.add_variable("units", EntryKey::new("g", 0), VarKind::Integer, 0.0, 10.0, 7.0);
        m.add_constraint("demand", EntryKey::new("z", 0), vec![Term::new(n, 40.0)], Sense::Ge, 100.0)
            .unwrap();
        let options = BTreeMap::new();
        let request = SolveRequest::new(Duration::from_secs(5), &options);
        let out = MicrolpBackend.solve(&m, &request).unwrap();
        assert_eq!(out.code, "optimal");
        assert_eq!(out.primal.unwrap(), vec![3.0]);
        assert!(out.duals.is_none());
    }

    #[test]
    fn infeasible_maps_to_native_code() {
        let mut m = LinearModel::new("short");
        let g = m.add_variable("generation", EntryKey::new("g", 0), VarKind::Continuous, 0.0, 150.0, 1.0);
        m.add_constraint("market_balance", EntryKey::new("z", 0), vec![Term::new(g, 1.0)], Sense::Eq, 1000.0)
            .unwrap();
        let options = BTreeMap::new();
        let request = SolveRequest::new(Duration::from_secs(5), &options);
        assert_eq!(MicrolpBackend.solve(&m, &request).unwrap().code, "infeasible");
    }

    #[test]
    fn rejects_every_option() {
        let mut options = BTreeMap::new();
        options.insert("threads".to_string(), OptionValue::Int(2));
        assert!(MicrolpBackend.check_options(&options).is_err());
    }
}
