//! Infeasibility diagnosis: irreducible infeasible subsystem (IIS) search.
//!
//! The search is a deletion filter. Every constraint and every finite
//! variable bound starts as a candidate. Candidates are dropped one at a
//! time; if the rest stays infeasible the candidate is discarded for good,
//! otherwise it is part of the conflict and goes back in. Each test solves a
//! fresh copy of the model with a zero objective, so the caller's model is
//! never touched.

use crate::backend::{deadline_after, SolveRequest, SolverBackend};
use crate::registry::SolverRegistry;
use hts_core::{ConstraintId, HtsResult, LinearModel, VarId, VarKind};
use hts_solver_common::{BackendId, OptionValue, SolveOptions, SolveStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IisStatus {
    Found,
    NotSupportedByBackend,
    NotInfeasible,
}

impl IisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IisStatus::Found => "found",
            IisStatus::NotSupportedByBackend => "not-supported-by-backend",
            IisStatus::NotInfeasible => "not-infeasible",
        }
    }
}

impl fmt::Display for IisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    Constraint,
    LowerBound,
    UpperBound,
}

impl ConflictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::Constraint => "constraint",
            ConflictKind::LowerBound => "lower bound",
            ConflictKind::UpperBound => "upper bound",
        }
    }
}

/// One member of the conflicting subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IisConflict {
    pub kind: ConflictKind,
    /// Constraint or variable name, e.g. `market_balance[north,3]`.
    pub name: String,
    /// The literal relation, e.g. `generation[g1,3] <= 150`.
    pub expression: String,
    pub bound: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IisResult {
    pub status: IisStatus,
    pub conflicts: Vec<IisConflict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl IisResult {
    fn empty(status: IisStatus, note: impl Into<String>) -> Self {
        Self {
            status,
            conflicts: Vec::new(),
            note: Some(note.into()),
        }
    }

    pub fn is_found(&self) -> bool {
        self.status == IisStatus::Found
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Candidate {
    Constraint(ConstraintId),
    Lower(VarId),
    Upper(VarId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Feasibility {
    Feasible,
    Infeasible,
    Unknown(SolveStatus),
}

/// Find a minimal conflicting subsystem of `model`'s last infeasible solve.
pub fn diagnose_with(registry: &SolverRegistry, model: &LinearModel, options: &SolveOptions) -> IisResult {
    let Some(last) = model.last_termination() else {
        warn!(model = model.name(), "diagnose called on a model that was never solved");
        return IisResult::empty(IisStatus::NotInfeasible, "model has not been solved");
    };
    let backend_id = match last.backend.parse::<BackendId>() {
        Ok(id) => id,
        Err(err) => {
            warn!(backend = %last.backend, "diagnose: {err}");
            return IisResult::empty(IisStatus::NotSupportedByBackend, err.to_string());
        }
    };
    let status = SolveStatus::from_raw(backend_id, &last.raw_code);
    if status != SolveStatus::Infeasible {
        warn!(status = %status, "diagnose called on a model whose last solve was not infeasible");
        return IisResult::empty(
            IisStatus::NotInfeasible,
            format!("last solve terminated {status}"),
        );
    }

    let backend = match registry.resolve(backend_id) {
        Ok(b) if b.supports_conflict() => b,
        Ok(_) => {
            return IisResult::empty(
                IisStatus::NotSupportedByBackend,
                format!("backend {backend_id} has no conflict search"),
            )
        }
        Err(err) => return IisResult::empty(IisStatus::NotSupportedByBackend, err.to_string()),
    };

    DeletionFilter::new(model, backend.as_ref(), options).run()
}

struct DeletionFilter<'a> {
    model: &'a LinearModel,
    backend: &'a dyn SolverBackend,
    deadline: Instant,
    time_limit: std::time::Duration,
    candidates: Vec<Candidate>,
    solves: usize,
}

impl<'a> DeletionFilter<'a> {
    fn new(model: &'a LinearModel, backend: &'a dyn SolverBackend, options: &SolveOptions) -> Self {
        let mut candidates: Vec<Candidate> = model.constraint_ids().map(Candidate::Constraint).collect();
        for (id, v) in model.var_ids().zip(model.variables()) {
            let (lo, hi) = model.effective_bounds(id);
            let intrinsic = v.kind == VarKind::Binary && v.fixed.is_none();
            if intrinsic {
                continue;
            }
            if lo.is_finite() {
                candidates.push(Candidate::Lower(id));
            }
            if hi.is_finite() {
                candidates.push(Candidate::Upper(id));
            }
        }
        let time_limit = options.time_limit();
        Self {
            model,
            backend,
            deadline: deadline_after(time_limit),
            time_limit,
            candidates,
            solves: 0,
        }
    }

    fn run(mut self) -> IisResult {
        let started = Instant::now();
        let mut active = vec![true; self.candidates.len()];
        info!(
            backend = %self.backend.id(),
            candidates = self.candidates.len(),
            "starting conflict search"
        );

        match self.check(&active) {
            Feasibility::Infeasible => {}
            Feasibility::Feasible => {
                warn!("working copy is feasible, nothing to diagnose");
                return IisResult::empty(
                    IisStatus::NotInfeasible,
                    "working copy proved feasible on confirmation",
                );
            }
            Feasibility::Unknown(status) => return self.inconclusive(status),
        }

        for i in 0..self.candidates.len() {
            if Instant::now() >= self.deadline {
                return self.timed_out();
            }
            active[i] = false;
            match self.check(&active) {
                Feasibility::Infeasible => {}
                Feasibility::Feasible => active[i] = true,
                Feasibility::Unknown(status) => return self.inconclusive(status),
            }
        }

        let conflicts: Vec<IisConflict> = self
            .candidates
            .iter()
            .zip(&active)
            .filter(|(_, keep)| **keep)
            .map(|(c, _)| self.conflict(*c))
            .collect();
        info!(
            conflicts = conflicts.len(),
            solves = self.solves,
            elapsed_s = started.elapsed().as_secs_f64(),
            "conflict search finished"
        );
        IisResult {
            status: IisStatus::Found,
            conflicts,
            note: None,
        }
    }

    fn timed_out(&self) -> IisResult {
        warn!(
            time_limit_s = self.time_limit.as_secs_f64(),
            solves = self.solves,
            "conflict search exceeded time budget"
        );
        IisResult::empty(
            IisStatus::NotSupportedByBackend,
            format!(
                "conflict search exceeded time budget of {:.3} s",
                self.time_limit.as_secs_f64()
            ),
        )
    }

    fn inconclusive(&self, status: SolveStatus) -> IisResult {
        if Instant::now() >= self.deadline {
            return self.timed_out();
        }
        warn!(status = %status, "feasibility check was inconclusive");
        IisResult::empty(
            IisStatus::NotSupportedByBackend,
            format!("feasibility check terminated {status}"),
        )
    }

    /// Copy of the model restricted to the active candidates, zero objective.
    fn working_copy(&self, active: &[bool]) -> HtsResult<LinearModel> {
        let n = self.model.num_variables();
        let mut keep_lower = vec![true; n];
        let mut keep_upper = vec![true; n];
        for (candidate, on) in self.candidates.iter().zip(active) {
            match *candidate {
                Candidate::Lower(id) => keep_lower[id.0] = *on,
                Candidate::Upper(id) => keep_upper[id.0] = *on,
                Candidate::Constraint(_) => {}
            }
        }

        let mut copy = LinearModel::new(format!("{}-iis", self.model.name()));
        for (id, v) in self.model.var_ids().zip(self.model.variables()) {
            let (lo, hi) = self.model.effective_bounds(id);
            let mut var = v.clone();
            var.fixed = None;
            var.objective = 0.0;
            var.lower = if keep_lower[id.0] { lo } else { f64::NEG_INFINITY };
            var.upper = if keep_upper[id.0] { hi } else { f64::INFINITY };
            if var.kind == VarKind::Binary && v.fixed.is_some() {
                // a pinned binary is modelled by its bound candidates
                var.kind = VarKind::Integer;
            }
            copy.push_variable(var);
        }
        for (candidate, on) in self.candidates.iter().zip(active) {
            if let (Candidate::Constraint(cid), true) = (*candidate, *on) {
                copy.push_constraint(self.model.constraint(cid)?.clone())?;
            }
        }
        Ok(copy)
    }

    fn check(&mut self, active: &[bool]) -> Feasibility {
        let copy = match self.working_copy(active) {
            Ok(copy) => copy,
            Err(err) => {
                debug!(error = %err, "could not build working copy");
                return Feasibility::Unknown(SolveStatus::Error);
            }
        };
        let options: BTreeMap<String, OptionValue> = BTreeMap::new();
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        let request = SolveRequest::new(remaining, &options).with_mip_gap(1.0);
        self.solves += 1;
        let outcome = match self.backend.solve(&copy, &request) {
            Ok(outcome) => outcome,
            Err(err) => {
                debug!(error = %err, "feasibility check failed");
                return Feasibility::Unknown(SolveStatus::Error);
            }
        };
        let status = SolveStatus::from_raw(self.backend.id(), &outcome.code);
        match status {
            SolveStatus::Infeasible => Feasibility::Infeasible,
            s if s.has_solution() && outcome.primal.is_some() => Feasibility::Feasible,
            s => Feasibility::Unknown(s),
        }
    }

    fn conflict(&self, candidate: Candidate) -> IisConflict {
        match candidate {
            Candidate::Constraint(cid) => {
                let (name, bound) = self
                    .model
                    .constraint(cid)
                    .map(|c| (c.name(), c.rhs))
                    .unwrap_or_else(|_| (format!("c{}", cid.0), f64::NAN));
                IisConflict {
                    kind: ConflictKind::Constraint,
                    name,
                    expression: self.model.expression(cid),
                    bound,
                }
            }
            Candidate::Lower(id) | Candidate::Upper(id) => {
                let name = self
                    .model
                    .variable(id)
                    .map(|v| v.name())
                    .unwrap_or_else(|_| format!("x{}", id.0));
                let (lo, hi) = self.model.effective_bounds(id);
                let (kind, op, bound) = match candidate {
                    Candidate::Lower(_) => (ConflictKind::LowerBound, ">=", lo),
                    _ => (ConflictKind::UpperBound, "<=", hi),
                };
                IisConflict {
                    kind,
                    expression: format!("{name} {op} {bound}"),
                    name,
                    bound,
                }
            }
        }
    }
}

/// Plain-text report: one section per conflict, then a fixed checklist.
pub fn write_report(iis: &IisResult, path: impl AsRef<Path>) -> io::Result<()> {
    let mut out = BufWriter::new(File::create(path.as_ref())?);
    writeln!(out, "INFEASIBILITY REPORT")?;
    writeln!(out, "====================")?;
    writeln!(out, "status: {}", iis.status)?;
    if let Some(note) = &iis.note {
        writeln!(out, "note: {note}")?;
    }
    writeln!(out, "conflicting items: {}", iis.conflicts.len())?;
    writeln!(out)?;

    for (i, c) in iis.conflicts.iter().enumerate() {
        writeln!(out, "[{}] {} {}", i + 1, c.kind.as_str(), c.name)?;
        writeln!(out, "    expression: {}", c.expression)?;
        writeln!(out, "    bound:      {}", c.bound)?;
        writeln!(out)?;
    }

    writeln!(out, "TROUBLESHOOTING CHECKLIST")?;
    writeln!(out, "-------------------------")?;
    writeln!(out, "[ ] Tightened bounds: check limits recently narrowed on the variables listed above (minimum generation, reservoir volume, ramp limits).")?;
    writeln!(out, "[ ] Relaxed demand: allow unmet demand (a deficit variable with a penalty cost) in the balance constraints listed above.")?;
    writeln!(out, "[ ] Missing capacity: confirm every unit that should serve the listed zones and periods is present and available.")?;
    writeln!(out, "[ ] Equality pins: look for fixed values or equality constraints (initial storage, must-run status) that contradict each other.")?;
    out.flush()
}
