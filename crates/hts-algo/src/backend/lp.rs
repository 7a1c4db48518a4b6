//! Linear relaxations solved with Clarabel.
//!
//! Clarabel solves the conic program
//!
//! ```text
//!   minimize    q'x
//!   subject to  Ax + s = b,   s ∈ K
//! ```
//!
//! with `K` a product of zero cones (equalities) and nonnegative cones
//! (inequalities). A model constraint `a'x >= b` is stored as `-a'x <= -b`, so
//! each row carries a sign `σ` and the reported dual is `-σ·z`, which is
//! d(objective)/d(rhs) in the model's own orientation.
//!
//! Variable bounds become extra rows; bound rows never produce model duals.

use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus as ClarabelStatus,
    SupportedConeT,
};
use hts_core::{LinearModel, Sense};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LpStatus {
    Optimal,
    Infeasible,
    Unbounded,
    TimeLimit,
    IterationLimit,
    Numerical,
}

#[derive(Debug, Clone)]
pub(crate) struct LpSettings {
    pub max_iter: u32,
    pub tol_feas: f64,
    /// Seconds; `None` lets the solve run to completion.
    pub time_limit: Option<f64>,
    pub verbose: bool,
}

impl Default for LpSettings {
    fn default() -> Self {
        Self {
            max_iter: 200,
            tol_feas: 1e-8,
            time_limit: None,
            verbose: false,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct LpSolution {
    pub status: LpStatus,
    /// Primal iterate (meaningful for `Optimal`, best effort for limits).
    pub x: Vec<f64>,
    /// One dual per model constraint; zeros unless `Optimal`.
    pub duals: Vec<f64>,
    pub objective: f64,
}

impl LpSolution {
    fn terminal(status: LpStatus, model: &LinearModel) -> Self {
        Self {
            status,
            x: vec![0.0; model.num_variables()],
            duals: vec![0.0; model.num_constraints()],
            objective: f64::NAN,
        }
    }
}

/// Rows of `Ax + s = b` collected column-wise, with consecutive cones merged.
struct ConicRows {
    columns: Vec<Vec<(usize, f64)>>,
    rhs: Vec<f64>,
    cones: Vec<SupportedConeT<f64>>,
}

impl ConicRows {
    fn new(n_var: usize) -> Self {
        Self {
            columns: vec![Vec::new(); n_var],
            rhs: Vec::new(),
            cones: Vec::new(),
        }
    }

    /// Σ coeffᵢ·xᵢ = b
    fn push_eq(&mut self, coeffs: impl IntoIterator<Item = (usize, f64)>, b: f64) -> usize {
        let row = self.push(coeffs, b);
        match self.cones.last_mut() {
            Some(SupportedConeT::ZeroConeT(n)) => *n += 1,
            _ => self.cones.push(SupportedConeT::ZeroConeT(1)),
        }
        row
    }

    /// Σ coeffᵢ·xᵢ ≤ b
    fn push_leq(&mut self, coeffs: impl IntoIterator<Item = (usize, f64)>, b: f64) -> usize {
        let row = self.push(coeffs, b);
        match self.cones.last_mut() {
            Some(SupportedConeT::NonnegativeConeT(n)) => *n += 1,
            _ => self.cones.push(SupportedConeT::NonnegativeConeT(1)),
        }
        row
    }

    fn push(&mut self, coeffs: impl IntoIterator<Item = (usize, f64)>, b: f64) -> usize {
        let row = self.rhs.len();
        for (col, val) in coeffs {
            self.columns[col].push((row, val));
        }
        self.rhs.push(b);
        row
    }

    fn matrix(mut self) -> (CscMatrix<f64>, Vec<f64>, Vec<SupportedConeT<f64>>) {
        let n_rows = self.rhs.len();
        let n_var = self.columns.len();
        let mut col_ptr = Vec::with_capacity(n_var + 1);
        let mut row_idx = Vec::new();
        let mut values = Vec::new();
        for column in &mut self.columns {
            let start = row_idx.len();
            col_ptr.push(start);
            column.sort_by_key(|(r, _)| *r);
            for &(r, v) in column.iter() {
                // repeated terms on the same variable are summed
                if row_idx.len() > start && row_idx.last() == Some(&r) {
                    if let Some(last) = values.last_mut() {
                        *last += v;
                    }
                } else {
                    row_idx.push(r);
                    values.push(v);
                }
            }
        }
        col_ptr.push(row_idx.len());
        (
            CscMatrix::new(n_rows, n_var, col_ptr, row_idx, values),
            self.rhs,
            self.cones,
        )
    }
}

/// Solve the continuous relaxation of `model` under the given bounds.
pub(crate) fn solve_lp(model: &LinearModel, bounds: &[(f64, f64)], settings: &LpSettings) -> LpSolution {
    let n_var = model.num_variables();
    if bounds.iter().any(|(lo, hi)| lo > hi) {
        return LpSolution::terminal(LpStatus::Infeasible, model);
    }

    let mut rows = ConicRows::new(n_var);
    // (row index, σ) per model constraint
    let mut constraint_rows: Vec<Option<(usize, f64)>> = Vec::with_capacity(model.num_constraints());

    for c in model.constraints() {
        if c.terms.is_empty() {
            let satisfied = match c.sense {
                Sense::Le => 0.0 <= c.rhs,
                Sense::Ge => 0.0 >= c.rhs,
                Sense::Eq => c.rhs == 0.0,
            };
            if !satisfied {
                return LpSolution::terminal(LpStatus::Infeasible, model);
            }
            constraint_rows.push(None);
            continue;
        }
        let coeffs = c.terms.iter().map(|t| (t.var.0, t.coef));
        let entry = match c.sense {
            Sense::Eq => (rows.push_eq(coeffs, c.rhs), 1.0),
            Sense::Le => (rows.push_leq(coeffs, c.rhs), 1.0),
            Sense::Ge => (rows.push_leq(coeffs.map(|(j, a)| (j, -a)), -c.rhs), -1.0),
        };
        constraint_rows.push(Some(entry));
    }

    for (j, &(lo, hi)) in bounds.iter().enumerate() {
        if lo == hi {
            rows.push_eq([(j, 1.0)], lo);
            continue;
        }
        if hi.is_finite() {
            rows.push_leq([(j, 1.0)], hi);
        }
        if lo.is_finite() {
            rows.push_leq([(j, -1.0)], -lo);
        }
    }

    if n_var == 0 {
        let mut out = LpSolution::terminal(LpStatus::Optimal, model);
        out.objective = model.objective_offset();
        return out;
    }

    let q: Vec<f64> = model.variables().iter().map(|v| v.objective).collect();
    let p_mat = CscMatrix::new(n_var, n_var, vec![0; n_var + 1], Vec::new(), Vec::new());
    let (a_mat, b, cones) = rows.matrix();

    let settings = match DefaultSettingsBuilder::default()
        .verbose(settings.verbose)
        .max_iter(settings.max_iter)
        .tol_feas(settings.tol_feas)
        .time_limit(settings.time_limit.unwrap_or(f64::INFINITY))
        .build()
    {
        Ok(s) => s,
        Err(e) => {
            debug!(error = ?e, "clarabel settings rejected");
            return LpSolution::terminal(LpStatus::Numerical, model);
        }
    };

    let mut solver = match DefaultSolver::new(&p_mat, &q, &a_mat, &b, &cones, settings) {
        Ok(s) => s,
        Err(e) => {
            debug!(error = ?e, "clarabel initialization failed");
            return LpSolution::terminal(LpStatus::Numerical, model);
        }
    };
    solver.solve();

    let sol = solver.solution;
    let status = match sol.status {
        ClarabelStatus::Solved | ClarabelStatus::AlmostSolved => LpStatus::Optimal,
        ClarabelStatus::PrimalInfeasible | ClarabelStatus::AlmostPrimalInfeasible => {
            LpStatus::Infeasible
        }
        ClarabelStatus::DualInfeasible | ClarabelStatus::AlmostDualInfeasible => {
            LpStatus::Unbounded
        }
        ClarabelStatus::MaxTime => LpStatus::TimeLimit,
        ClarabelStatus::MaxIterations => LpStatus::IterationLimit,
        other => {
            debug!(status = ?other, "clarabel stopped without a usable answer");
            LpStatus::Numerical
        }
    };

    let duals = if status == LpStatus::Optimal {
        constraint_rows
            .iter()
            .map(|entry| entry.map(|(row, sigma)| -sigma * sol.z[row]).unwrap_or(0.0))
            .collect()
    } else {
        vec![0.0; model.num_constraints()]
    };
    let mut x = sol.x;
    // pinned variables are reported exactly
    for (xj, &(lo, hi)) in x.iter_mut().zip(bounds) {
        if lo == hi {
            *xj = lo;
        }
    }
    let objective = model.objective_value(&x);
    LpSolution {
        status,
        x,
        duals,
        objective,
    }
}
